// The recording pipeline: count-in clicks, fixed-duration capture, duration
// normalization, analysis dispatch, segment storage. One pipeline instance
// is the single writer for the segment store; re-triggering while busy is
// rejected rather than queued.

use std::sync::{Arc, Mutex, RwLock};
use std::thread;
use std::time::Duration;

use crate::audio::{next_capture_id, AudioHandle, CompletedCapture};
use crate::audio_api::{AudioCommand, EventSink};
use crate::error::{CaptureError, DecodeError};
use crate::shared::{Mode, SessionSettings, BEATS_PER_BAR, COUNT_IN_BEATS, MIN_CAPTURE_BYTES};

use super::analysis::{AnalysisClient, PitchPoint, RhythmMethod, RhythmSegment};
use super::config::Config;
use super::normalize::{decoded_len, encode_wav_mono, Normalizer};
use super::segment::{Segment, SegmentStore};

const CLICK_FREQ: f32 = 880.0;
const CLICK_ACCENT_FREQ: f32 = 1760.0;
const CLICK_DURATION: f64 = 0.05;
const CLICK_GAIN: f32 = 0.5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    CountingIn,
    Capturing,
    Processing,
}

pub struct RecordingPipeline {
    audio: Arc<AudioHandle>,
    settings: Arc<RwLock<SessionSettings>>,
    store: Arc<RwLock<SegmentStore>>,
    client: Arc<dyn AnalysisClient>,
    normalizer: Mutex<Normalizer>,
    config: Config,
    state: Mutex<PipelineState>,
}

impl RecordingPipeline {
    pub fn new(
        audio: Arc<AudioHandle>,
        settings: Arc<RwLock<SessionSettings>>,
        store: Arc<RwLock<SegmentStore>>,
        client: Arc<dyn AnalysisClient>,
        config: Config,
    ) -> Self {
        Self {
            audio,
            settings,
            store,
            client,
            normalizer: Mutex::new(Normalizer::new()),
            config,
            state: Mutex::new(PipelineState::Idle),
        }
    }

    pub fn state(&self) -> PipelineState {
        *self.state.lock().expect("pipeline state lock")
    }

    pub fn is_recording(&self) -> bool {
        self.state() == PipelineState::Capturing
    }

    fn set_state(&self, s: PipelineState) {
        *self.state.lock().expect("pipeline state lock") = s;
    }

    /// Run one full recording cycle: count-in, capture for exactly the
    /// expected duration, normalize, dispatch for analysis, store segments.
    /// Blocks the calling thread until done.
    pub fn record(&self) -> Result<(), CaptureError> {
        {
            let mut st = self.state.lock().expect("pipeline state lock");
            if *st != PipelineState::Idle {
                return Err(CaptureError::Busy);
            }
            *st = PipelineState::CountingIn;
        }

        let result = self.record_inner();
        self.set_state(PipelineState::Idle);
        result
    }

    fn record_inner(&self) -> Result<(), CaptureError> {
        if !self.audio.has_input() {
            return Err(CaptureError::NoInputDevice);
        }

        let snapshot = self.settings.read().expect("settings lock").clone();
        let tempo = snapshot.tempo;
        let beat = snapshot.beat_duration();
        let expected = snapshot.expected_duration();

        // Audible count-in; no capture happens during it. The wait below is
        // slightly shorter than four full beats to compensate for playback
        // device latency (see Config::count_in_delay).
        let now = self.audio.now_seconds();
        for i in 0..COUNT_IN_BEATS {
            self.audio.send(AudioCommand::ScheduleTone {
                freq: if i == 0 { CLICK_ACCENT_FREQ } else { CLICK_FREQ },
                at: now + i as f64 * beat,
                duration: CLICK_DURATION,
                gain: CLICK_GAIN,
            });
        }
        thread::sleep(Duration::from_secs_f64(self.config.count_in_delay(tempo)));

        self.set_state(PipelineState::Capturing);
        let id = next_capture_id();
        let frames = (self.audio.sample_rate() as f64 * expected).round() as usize;
        self.audio.send(AudioCommand::StartCapture { id, frames });
        log::info!(
            "recording {:.2}s ({} bars at {} bpm)",
            expected,
            snapshot.bar_count,
            tempo
        );

        // Beat counter feedback while the capture window runs.
        let total_beats = BEATS_PER_BAR * snapshot.bar_count;
        for b in 0..total_beats {
            thread::sleep(Duration::from_secs_f64(beat));
            log::info!("bar {} beat {}", b / 4 + 1, b % 4 + 1);
        }

        let capture = self
            .audio
            .wait_capture(id, Duration::from_secs_f64(expected + 2.0))?;

        self.set_state(PipelineState::Processing);
        let mut normalizer = self.normalizer.lock().expect("normalizer lock");
        match process_capture(
            &capture,
            &snapshot,
            self.rhythm_method(),
            &mut normalizer,
            &*self.client,
            &self.store,
        ) {
            Ok(()) => {}
            // recoverable: the take is lost but prior segments stand
            Err(e) => log::warn!("capture processing failed: {e}"),
        }
        Ok(())
    }

    /// Manual stop. Finalizes the in-flight capture early; the normalizer
    /// pads the shortfall with silence so the duration invariant still holds.
    pub fn request_stop(&self) {
        if self.state() == PipelineState::Capturing {
            self.audio.send(AudioCommand::StopCapture);
        }
    }

    fn rhythm_method(&self) -> RhythmMethod {
        RhythmMethod::parse(&self.config.rhythm_method).unwrap_or(RhythmMethod::Energy)
    }
}

/// Normalize a finished capture and dispatch it for analysis. On analysis
/// failure the previous segment list stays as it was; only a decode failure
/// aborts (and even that leaves prior segments untouched).
pub fn process_capture(
    capture: &CompletedCapture,
    settings: &SessionSettings,
    method: RhythmMethod,
    normalizer: &mut Normalizer,
    client: &dyn AnalysisClient,
    store: &RwLock<SegmentStore>,
) -> Result<(), DecodeError> {
    let expected = settings.expected_duration();
    let wav = encode_wav_mono(&capture.frames, capture.sample_rate);
    let normalized = normalizer.normalize(capture.id, &wav, expected)?;

    // Nothing meaningful was recorded; don't bother the analysis service.
    if wav.len() < MIN_CAPTURE_BYTES {
        log::debug!(
            "capture {:?} below size guard ({} frames), skipping analysis",
            capture.id,
            decoded_len(&wav).unwrap_or(0)
        );
        return Ok(());
    }

    match settings.mode {
        Mode::Rhythm => {
            match client.analyze_rhythm(&normalized, settings.tempo, settings.bar_count, method) {
                Ok(segments) => {
                    let mapped = map_rhythm_segments(segments);
                    store
                        .write()
                        .expect("segment lock")
                        .replace(Mode::Rhythm, mapped);
                }
                Err(e) => log::warn!("rhythm analysis failed, keeping previous segments: {e}"),
            }
        }
        Mode::Melody => {
            match client.analyze_melody(&normalized, settings.tempo, settings.bar_count) {
                Ok(points) => {
                    let mapped = map_melody_segments(&points, expected);
                    store
                        .write()
                        .expect("segment lock")
                        .replace(Mode::Melody, mapped);
                }
                Err(e) => log::warn!("melody analysis failed, keeping previous segments: {e}"),
            }
        }
    }
    Ok(())
}

fn map_rhythm_segments(raw: Vec<RhythmSegment>) -> Vec<Segment> {
    raw.into_iter()
        .map(|s| Segment {
            label: s.label,
            start: s.start,
            end: s.end,
            note: None,
            hz: None,
            confidence: None,
            rms: None,
            confidence_rms: None,
        })
        .collect()
}

/// Slice `total_duration` evenly across the pitch series; the series length
/// decides the step size, not the other way round. Missing fields fall back
/// the same way the analyzer's older clients did: a rest label implies a
/// rest note, anything else unreadable becomes "error" / "—".
fn map_melody_segments(points: &[PitchPoint], total_duration: f64) -> Vec<Segment> {
    if points.is_empty() {
        return Vec::new();
    }
    let chunk = total_duration / points.len() as f64;
    points
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let note = match (&p.note, p.label.as_deref()) {
                (Some(n), _) => n.clone(),
                (None, Some("rest")) => "rest".to_string(),
                (None, _) => "error".to_string(),
            };
            let label = match (&p.label, note.as_str()) {
                (Some(l), _) => l.clone(),
                (None, "rest") => "—".to_string(),
                (None, _) => "error".to_string(),
            };
            Segment {
                label,
                start: chunk * i as f64,
                end: chunk * (i + 1) as f64,
                note: Some(note),
                hz: p.hz,
                confidence: p.confidence,
                rms: p.rms,
                confidence_rms: p.confidence_rms,
            }
        })
        .collect()
}
