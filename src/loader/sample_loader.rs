// Decodes the drum kit up front and registers it with the engine — the
// engine itself can't load files (that would block the audio thread). WAV
// files win when present; otherwise each voice gets a synthesized stand-in
// so the app makes sound without any assets on disk.

use std::path::Path;

use rand::Rng;

use crate::audio::{next_sample_id, SampleBuffer, StereoFrame};
use crate::audio_api::{AudioCommand, EventSink};
use crate::pipeline::players::DrumKit;

/// Load (or synthesize) the fixed kick/snare/hihat set once, register each
/// buffer with the engine, and hand back the ids the drum player will use.
pub fn load_drum_kit(dir: &Path, sink: &dyn EventSink, sample_rate: u32) -> DrumKit {
    let samples_dir = dir.join("samples");
    let mut register = |file: &str, fallback: fn(u32) -> SampleBuffer| {
        let path = samples_dir.join(file);
        let buffer = match SampleBuffer::load_wav(&path, sample_rate) {
            Ok(buf) => {
                log::info!("loaded {}", path.display());
                buf
            }
            Err(_) => fallback(sample_rate),
        };
        let id = next_sample_id();
        sink.send(AudioCommand::RegisterSample { id, buffer });
        id
    };

    DrumKit {
        kick: register("kick.wav", synth_kick),
        snare: register("snare.wav", synth_snare),
        hihat: register("hihat.wav", synth_hihat),
    }
}

// A pitch-sweeping sine thump, 120Hz falling to 45Hz.
fn synth_kick(rate: u32) -> SampleBuffer {
    let n = (rate as f64 * 0.25) as usize;
    let mut phase = 0.0f32;
    let data = (0..n)
        .map(|i| {
            let t = i as f32 / rate as f32;
            let freq = 45.0 + 75.0 * (-t * 18.0).exp();
            phase += std::f32::consts::TAU * freq / rate as f32;
            let s = phase.sin() * (-t * 14.0).exp() * 0.9;
            StereoFrame::splat(s)
        })
        .collect();
    SampleBuffer::from_frames(data)
}

// Noise burst plus a short 180Hz body.
fn synth_snare(rate: u32) -> SampleBuffer {
    let mut rng = rand::rng();
    let n = (rate as f64 * 0.18) as usize;
    let data = (0..n)
        .map(|i| {
            let t = i as f32 / rate as f32;
            let noise: f32 = rng.random_range(-1.0..1.0);
            let body = (std::f32::consts::TAU * 180.0 * t).sin();
            let s = (0.6 * noise + 0.4 * body) * (-t * 28.0).exp() * 0.7;
            StereoFrame::splat(s)
        })
        .collect();
    SampleBuffer::from_frames(data)
}

// Very short bright noise tick.
fn synth_hihat(rate: u32) -> SampleBuffer {
    let mut rng = rand::rng();
    let n = (rate as f64 * 0.06) as usize;
    let mut last = 0.0f32;
    let data = (0..n)
        .map(|i| {
            let t = i as f32 / rate as f32;
            let noise: f32 = rng.random_range(-1.0..1.0);
            // crude highpass: difference against the previous sample
            let bright = noise - last;
            last = noise;
            StereoFrame::splat(bright * (-t * 90.0).exp() * 0.5)
        })
        .collect();
    SampleBuffer::from_frames(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_api::test_sink::TestSink;

    #[test]
    fn kit_registers_three_buffers_even_without_assets() {
        let sink = TestSink::default();
        let kit = load_drum_kit(Path::new("/nonexistent"), &sink, 44100);
        let cmds = sink.take();
        assert_eq!(cmds.len(), 3);
        assert!(cmds
            .iter()
            .all(|c| matches!(c, AudioCommand::RegisterSample { .. })));
        assert_ne!(kit.kick, kit.snare);
        assert_ne!(kit.snare, kit.hihat);
    }

    #[test]
    fn synthesized_voices_are_nonempty_and_bounded() {
        for buf in [synth_kick(44100), synth_snare(44100), synth_hihat(44100)] {
            assert!(!buf.data.is_empty());
            assert!(buf
                .data
                .iter()
                .all(|f| f.left.abs() <= 1.0 && f.right.abs() <= 1.0));
        }
    }
}
