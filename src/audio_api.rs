pub use crate::audio::{CaptureId, SampleBuffer, SampleId};

/// Everything the rest of the app may ask the realtime engine to do. The
/// engine can't touch the filesystem or block (it runs inside the cpal
/// callback), so samples are decoded up front (see loader/sample_loader.rs)
/// and registered by id before they can be scheduled.
#[derive(Clone, Debug)]
pub enum AudioCommand {
    RegisterSample { id: SampleId, buffer: SampleBuffer },

    /// One-shot playback of a registered sample, starting at an absolute
    /// transport time in seconds. Times in the past play immediately.
    ScheduleSample { id: SampleId, at: f64, gain: f32 },

    /// A synthesized pitched tone (chords, melody, metronome click).
    ScheduleTone { freq: f32, at: f64, duration: f64, gain: f32 },

    /// Drop every event that hasn't started sounding yet. Sent by the loop
    /// scheduler's stop() so playback halts at once instead of draining a
    /// whole scheduled iteration.
    ClearPending,

    /// Begin collecting mic input. The engine finalizes the capture on its
    /// own once `frames` input frames have been gathered.
    StartCapture { id: CaptureId, frames: usize },

    /// Finalize an in-flight capture early (manual stop). The duration
    /// normalizer pads whatever shortfall this leaves.
    StopCapture,

    SetMasterGain(f32),
}

/// The seam between schedulers/players and the engine. Production code uses
/// the cpal-backed AudioHandle; tests use a recording sink.
pub trait EventSink: Send + Sync {
    fn send(&self, cmd: AudioCommand);

    /// Current transport time in seconds, derived from frames rendered so
    /// far. Monotonic for the lifetime of the engine.
    fn now_seconds(&self) -> f64;
}
