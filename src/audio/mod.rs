use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender};

use crate::audio_api::{AudioCommand, EventSink};
use crate::error::CaptureError;

mod engine;
mod frame;
mod ids;
mod sample_buffer;
mod tone;
mod voice;

pub use engine::CompletedCapture;
pub use frame::StereoFrame;
pub use ids::{next_capture_id, next_sample_id, CaptureId, SampleId};
pub use sample_buffer::SampleBuffer;

use engine::Engine;

/// The process-wide handle to the audio device. Created once at startup and
/// kept alive for the whole run so playback survives page-level transitions;
/// everything that makes sound goes through this one object.
pub struct AudioHandle {
    tx: Sender<AudioCommand>,
    completed_rx: Receiver<CompletedCapture>,
    clock: Arc<AtomicU64>,
    sample_rate: u32,
    has_input: bool,
    _output_stream: cpal::Stream,
    _input_stream: Option<cpal::Stream>, // None when no mic available
}

impl AudioHandle {
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn has_input(&self) -> bool {
        self.has_input
    }

    /// Block until the engine hands back the capture with this id.
    pub fn wait_capture(
        &self,
        id: CaptureId,
        timeout: Duration,
    ) -> Result<CompletedCapture, CaptureError> {
        recv_capture(&self.completed_rx, id, timeout)
    }
}

impl EventSink for AudioHandle {
    fn send(&self, cmd: AudioCommand) {
        let _ = self.tx.try_send(cmd);
    }

    fn now_seconds(&self) -> f64 {
        self.clock.load(Ordering::Relaxed) as f64 / self.sample_rate as f64
    }
}

/// Pop completed captures until the awaited id arrives. A take whose wait
/// timed out can still be finalized later (late input frames, a late stop)
/// and sit in the channel; it must not be mistaken for the next recording.
fn recv_capture(
    rx: &Receiver<CompletedCapture>,
    id: CaptureId,
    timeout: Duration,
) -> Result<CompletedCapture, CaptureError> {
    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline
            .checked_duration_since(Instant::now())
            .ok_or(CaptureError::Timeout(timeout.as_secs_f64()))?;
        let done = rx
            .recv_timeout(remaining)
            .map_err(|_| CaptureError::Timeout(timeout.as_secs_f64()))?;
        if done.id == id {
            return Ok(done);
        }
        log::warn!("discarding stale capture {:?}", done.id);
    }
}

pub fn start_audio() -> anyhow::Result<AudioHandle> {
    let (tx, rx) = crossbeam_channel::bounded::<AudioCommand>(1024);

    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .context("no default output device")?;
    let config = device
        .default_output_config()
        .context("no default output config")?;

    let sample_rate = config.sample_rate();
    let channels = config.channels() as usize;
    // the render path writes StereoFrame pairs straight into the device buffer
    if channels != 2 {
        anyhow::bail!("unsupported output layout: {channels} channels (stereo only)");
    }
    let clock = Arc::new(AtomicU64::new(0));

    let (input_tx, input_rx) = crossbeam_channel::bounded::<Vec<StereoFrame>>(2048);
    let (completed_tx, completed_rx) = crossbeam_channel::bounded::<CompletedCapture>(16);

    match config.sample_format() {
        cpal::SampleFormat::F32 => {
            let output_stream = build_output_stream_f32(
                &device,
                &config.into(),
                rx,
                input_rx,
                completed_tx,
                clock.clone(),
            )?;
            output_stream
                .play()
                .context("failed to play output stream")?;

            let input_stream = try_build_input_stream(&host, sample_rate, input_tx);
            let has_input = input_stream.is_some();

            Ok(AudioHandle {
                tx,
                completed_rx,
                clock,
                sample_rate,
                has_input,
                _output_stream: output_stream,
                _input_stream: input_stream,
            })
        }
        _ => anyhow::bail!("unsupported sample format (only f32 supported for now)"),
    }
}

// ── Output stream ─────────────────────────────────────────────────

// StereoFrame is #[repr(C)] { f32, f32 }, identical layout to an interleaved
// stereo f32 buffer. start_audio rejects non-stereo devices before this can
// see their data.
fn as_frames(data: &mut [f32]) -> &mut [StereoFrame] {
    let n = data.len() / 2;
    unsafe { std::slice::from_raw_parts_mut(data.as_mut_ptr() as *mut StereoFrame, n) }
}

fn build_output_stream_f32(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    rx: Receiver<AudioCommand>,
    input_rx: Receiver<Vec<StereoFrame>>,
    completed_tx: Sender<CompletedCapture>,
    clock: Arc<AtomicU64>,
) -> anyhow::Result<cpal::Stream> {
    let mut engine = Engine::new(config.sample_rate, clock);
    engine.set_input_rx(input_rx);
    engine.set_completed_tx(completed_tx);

    let err_fn = |err| log::error!("audio output stream error: {err}");

    let stream = device.build_output_stream(
        config,
        move |data: &mut [f32], _info| {
            while let Ok(cmd) = rx.try_recv() {
                engine.handle_cmd(cmd);
            }

            // Drain mic input into the capture state machine
            engine.drain_input();

            engine.render_block(as_frames(data));
        },
        err_fn,
        None,
    )?;

    Ok(stream)
}

fn try_build_input_stream(
    host: &cpal::Host,
    target_sample_rate: cpal::SampleRate,
    tx: Sender<Vec<StereoFrame>>,
) -> Option<cpal::Stream> {
    let device = match host.default_input_device() {
        Some(d) => d,
        None => {
            log::warn!("no default input device — mic recording disabled");
            return None;
        }
    };

    let supported = device.default_input_config().ok()?;
    let mut stream_config: cpal::StreamConfig = supported.into();
    stream_config.sample_rate = target_sample_rate;

    let in_channels = stream_config.channels as usize;

    let err_fn = |err| log::error!("audio input stream error: {err}");

    let stream = device
        .build_input_stream(
            &stream_config,
            move |data: &[f32], _info: &cpal::InputCallbackInfo| {
                let frames: Vec<StereoFrame> = if in_channels == 1 {
                    data.iter().map(|&s| StereoFrame::splat(s)).collect()
                } else {
                    data.chunks_exact(in_channels)
                        .map(|c| StereoFrame {
                            left: c[0],
                            right: if c.len() > 1 { c[1] } else { c[0] },
                        })
                        .collect()
                };

                let _ = tx.try_send(frames);
            },
            err_fn,
            None,
        )
        .ok()?;

    if let Err(e) = stream.play() {
        log::warn!("could not start input stream: {e}");
        return None;
    }

    Some(stream)
}
