mod audio;
mod audio_api;
mod error;
mod loader;
mod pipeline;
mod shared;

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use audio_api::{AudioCommand, EventSink};
use pipeline::analysis::HttpAnalysisClient;
use pipeline::config;
use pipeline::note;
use pipeline::recorder::RecordingPipeline;
use pipeline::scheduler::LoopScheduler;
use pipeline::segment::{SegmentPatch, SegmentStore};
use shared::{Mode, ScaleMode, SessionSettings};

fn main() {
    env_logger::init();
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let project_dir: PathBuf = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default());

    let cfg = config::load_config(&project_dir);
    // write the file back so the calibration knobs are there to edit
    if let Err(e) = config::save_config(&project_dir, &cfg) {
        log::warn!("could not persist config: {e}");
    }

    let audio = Arc::new(audio::start_audio()?);
    let kit = loader::sample_loader::load_drum_kit(&project_dir, &*audio, audio.sample_rate());

    let settings = Arc::new(RwLock::new(SessionSettings::default()));
    let store = SegmentStore::new_shared();
    let client = Arc::new(HttpAnalysisClient::new(&cfg.api_base_url));

    let recorder = Arc::new(RecordingPipeline::new(
        audio.clone(),
        settings.clone(),
        store.clone(),
        client,
        cfg,
    ));
    let mut scheduler = LoopScheduler::new(
        audio.clone() as Arc<dyn EventSink>,
        settings.clone(),
        store.clone(),
        kit,
    );
    scheduler.sync_from_transport();

    println!("looplab — rec | stoprec | play | stop | tempo N | bars N | mode M | scale S | drums P | chords P | volume V | segments | edit I L | status | quit");

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let mut parts = line.split_whitespace();
        let cmd = parts.next().unwrap_or("");
        let arg = parts.next().unwrap_or("");

        match cmd {
            "rec" => {
                // record() blocks for the whole count-in + capture window,
                // so it runs off-thread; a second `rec` while busy is
                // rejected by the pipeline's state guard.
                let rec = recorder.clone();
                std::thread::spawn(move || {
                    if let Err(e) = rec.record() {
                        log::error!("{e}");
                    }
                });
            }
            "stoprec" => recorder.request_stop(),
            "play" => scheduler.loop_play(),
            "stop" => scheduler.stop(),
            "tempo" => match arg.parse::<f64>() {
                Ok(t) => settings.write().unwrap().set_tempo(t),
                Err(_) => println!("usage: tempo <20-240>"),
            },
            "bars" => match arg.parse::<u32>() {
                Ok(b) => settings.write().unwrap().set_bar_count(b),
                Err(_) => println!("usage: bars <1|2|4>"),
            },
            "mode" => match Mode::parse(arg) {
                Some(m) => settings.write().unwrap().mode = m,
                None => println!("usage: mode <rhythm|melody>"),
            },
            "scale" => match ScaleMode::parse(arg) {
                Some(s) => settings.write().unwrap().scale = s,
                None => println!("usage: scale <major|minor|chromatic>"),
            },
            "drums" => settings.write().unwrap().drum_pattern = arg.to_string(),
            "chords" => settings.write().unwrap().chord_pattern = arg.to_string(),
            "volume" => match arg.parse::<f32>() {
                Ok(v) => audio.send(AudioCommand::SetMasterGain(v)),
                Err(_) => println!("usage: volume <0.0-2.0>"),
            },
            "segments" => {
                let mode = settings.read().unwrap().mode;
                let g = store.read().unwrap();
                for (i, seg) in g.track(mode).iter().enumerate() {
                    println!("{i:3} {:6.2}s-{:6.2}s {}", seg.start, seg.end, seg.label);
                }
            }
            "edit" => match (arg.parse::<usize>(), parts.next()) {
                (Ok(index), Some(label)) => {
                    let mode = settings.read().unwrap().mode;
                    let patch = SegmentPatch {
                        label: Some(label.to_string()),
                        // only well-formed pitch names update the note
                        note: note::parse(label).map(|_| label.to_string()),
                    };
                    store.write().unwrap().update(mode, index, patch);
                }
                _ => println!("usage: edit <index> <label>"),
            },
            "status" => {
                let s = settings.read().unwrap().clone();
                let g = store.read().unwrap();
                println!(
                    "tempo {} | bars {} | {:?}/{:?} | looping: {} | recording: {} | segments r:{} m:{}",
                    s.tempo,
                    s.bar_count,
                    s.mode,
                    s.scale,
                    scheduler.is_playing(),
                    recorder.is_recording(),
                    g.rhythm.len(),
                    g.melody.len(),
                );
            }
            "quit" | "exit" => {
                scheduler.stop();
                return Ok(());
            }
            "" => {}
            other => println!("unknown command: {other}"),
        }
    }

    scheduler.stop();
    Ok(())
}
