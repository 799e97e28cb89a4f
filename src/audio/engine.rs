use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use std::collections::HashMap;

use crate::audio_api::AudioCommand;

use super::frame::StereoFrame;
use super::ids::{CaptureId, SampleId};
use super::sample_buffer::SampleBuffer;
use super::tone::ToneVoice;
use super::voice::SampleVoice;

const MAX_VOICES: usize = 64; // chords + melody + drums + click, all polyphonic

/// Mic audio collected for one recording, handed back to the pipeline once
/// the requested frame count has been reached (or a manual stop arrived).
#[derive(Clone, Debug)]
pub struct CompletedCapture {
    pub id: CaptureId,
    pub frames: Vec<StereoFrame>,
    pub sample_rate: u32,
}

#[derive(Clone, Debug)]
enum VoiceKind {
    Sample { id: SampleId, voice: SampleVoice },
    Tone(ToneVoice),
}

#[derive(Clone, Debug)]
struct ActiveVoice {
    kind: VoiceKind,
    // frame offset into the *current* block only; zero after the first render
    offset: usize,
}

#[derive(Clone, Debug)]
enum PendingEvent {
    Sample { id: SampleId, gain: f32 },
    Tone { freq: f32, duration: f64, gain: f32 },
}

struct CaptureState {
    id: CaptureId,
    target_frames: usize,
    frames: Vec<StereoFrame>,
}

/// The realtime mixer. Lives inside the cpal output callback: it may only
/// pop channels and push samples, never block or touch the filesystem.
/// `clock` counts frames rendered since startup and is the transport
/// reference every scheduled event is expressed against.
pub struct Engine {
    sample_rate: f32,
    clock: Arc<AtomicU64>,
    master_gain: f32,
    samples: HashMap<SampleId, SampleBuffer>,
    pending: Vec<(u64, PendingEvent)>, // (absolute frame, event)
    voices: Vec<ActiveVoice>,
    capture: Option<CaptureState>,
    input_rx: Option<Receiver<Vec<StereoFrame>>>,
    completed_tx: Option<Sender<CompletedCapture>>,
}

impl Engine {
    pub fn new(sample_rate: u32, clock: Arc<AtomicU64>) -> Self {
        Self {
            sample_rate: sample_rate as f32,
            clock,
            master_gain: 1.0,
            samples: HashMap::new(),
            pending: Vec::with_capacity(256),
            voices: Vec::with_capacity(MAX_VOICES),
            capture: None,
            input_rx: None,
            completed_tx: None,
        }
    }

    pub fn set_input_rx(&mut self, rx: Receiver<Vec<StereoFrame>>) {
        self.input_rx = Some(rx);
    }

    pub fn set_completed_tx(&mut self, tx: Sender<CompletedCapture>) {
        self.completed_tx = Some(tx);
    }

    fn seconds_to_frame(&self, at: f64) -> u64 {
        (at.max(0.0) * self.sample_rate as f64).round() as u64
    }

    pub fn handle_cmd(&mut self, cmd: AudioCommand) {
        match cmd {
            AudioCommand::RegisterSample { id, buffer } => {
                self.samples.insert(id, buffer);
            }
            AudioCommand::ScheduleSample { id, at, gain } => {
                self.pending
                    .push((self.seconds_to_frame(at), PendingEvent::Sample { id, gain }));
            }
            AudioCommand::ScheduleTone {
                freq,
                at,
                duration,
                gain,
            } => {
                self.pending.push((
                    self.seconds_to_frame(at),
                    PendingEvent::Tone {
                        freq,
                        duration,
                        gain,
                    },
                ));
            }
            AudioCommand::ClearPending => self.pending.clear(),
            AudioCommand::StartCapture { id, frames } => {
                self.capture = Some(CaptureState {
                    id,
                    target_frames: frames,
                    frames: Vec::with_capacity(frames),
                });
            }
            AudioCommand::StopCapture => self.finalize_capture(),
            AudioCommand::SetMasterGain(g) => self.master_gain = g.clamp(0.0, 2.0),
        }
    }

    /// Pull queued mic frames into the active capture. Input not being
    /// captured is dropped so the channel never backs up.
    pub fn drain_input(&mut self) {
        let Some(rx) = &self.input_rx else { return };
        while let Ok(chunk) = rx.try_recv() {
            if let Some(cap) = &mut self.capture {
                cap.frames.extend_from_slice(&chunk);
            }
        }
        let done = self
            .capture
            .as_ref()
            .is_some_and(|c| c.frames.len() >= c.target_frames);
        if done {
            self.finalize_capture();
        }
    }

    fn finalize_capture(&mut self) {
        let Some(mut cap) = self.capture.take() else {
            return;
        };
        cap.frames.truncate(cap.target_frames);
        if let Some(tx) = &self.completed_tx {
            let _ = tx.try_send(CompletedCapture {
                id: cap.id,
                frames: cap.frames,
                sample_rate: self.sample_rate as u32,
            });
        }
    }

    /// Mix one output block and advance the transport clock.
    pub fn render_block(&mut self, out: &mut [StereoFrame]) {
        for f in out.iter_mut() {
            *f = StereoFrame::zero();
        }

        let clock = self.clock.load(Ordering::Relaxed);
        let block_end = clock + out.len() as u64;

        // Promote events whose onset lands in this block.
        let mut i = 0;
        while i < self.pending.len() {
            if self.pending[i].0 < block_end {
                let (at_frame, ev) = self.pending.swap_remove(i);
                let offset = at_frame.saturating_sub(clock) as usize;
                self.spawn_voice(ev, offset);
            } else {
                i += 1;
            }
        }

        let mut v = 0;
        while v < self.voices.len() {
            let offset = self.voices[v].offset;
            self.voices[v].offset = 0;
            let alive = match &mut self.voices[v].kind {
                VoiceKind::Sample { id, voice } => {
                    if let Some(buf) = self.samples.get(id) {
                        voice.render_into(buf, out, offset);
                        voice.active
                    } else {
                        false
                    }
                }
                VoiceKind::Tone(t) => {
                    t.render_into(out, offset);
                    t.active
                }
            };
            if alive {
                v += 1;
            } else {
                self.voices.swap_remove(v);
            }
        }

        for f in out.iter_mut() {
            f.left *= self.master_gain;
            f.right *= self.master_gain;
        }

        self.clock.store(block_end, Ordering::Relaxed);
    }

    fn spawn_voice(&mut self, ev: PendingEvent, offset: usize) {
        if self.voices.len() >= MAX_VOICES {
            // steal the oldest slot rather than dropping the new event
            self.voices.remove(0);
        }
        let kind = match ev {
            PendingEvent::Sample { id, gain } => VoiceKind::Sample {
                id,
                voice: SampleVoice::new(gain),
            },
            PendingEvent::Tone {
                freq,
                duration,
                gain,
            } => VoiceKind::Tone(ToneVoice::new(freq, duration, gain, self.sample_rate)),
        };
        self.voices.push(ActiveVoice { kind, offset });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::ids::{next_capture_id, next_sample_id};

    fn engine() -> (Engine, Arc<AtomicU64>) {
        let clock = Arc::new(AtomicU64::new(0));
        (Engine::new(44100, clock.clone()), clock)
    }

    #[test]
    fn clock_advances_with_rendered_frames() {
        let (mut e, clock) = engine();
        let mut out = vec![StereoFrame::zero(); 512];
        e.render_block(&mut out);
        e.render_block(&mut out);
        assert_eq!(clock.load(Ordering::Relaxed), 1024);
    }

    #[test]
    fn scheduled_sample_starts_at_its_frame_offset() {
        let (mut e, _) = engine();
        let id = next_sample_id();
        e.handle_cmd(AudioCommand::RegisterSample {
            id,
            buffer: SampleBuffer::from_frames(vec![StereoFrame::splat(1.0); 4]),
        });
        // onset 100 frames in
        e.handle_cmd(AudioCommand::ScheduleSample {
            id,
            at: 100.0 / 44100.0,
            gain: 1.0,
        });
        let mut out = vec![StereoFrame::zero(); 512];
        e.render_block(&mut out);
        assert_eq!(out[99].left, 0.0);
        assert!((out[100].left - 1.0).abs() < 1e-6);
    }

    #[test]
    fn clear_pending_drops_unstarted_events() {
        let (mut e, _) = engine();
        e.handle_cmd(AudioCommand::ScheduleTone {
            freq: 440.0,
            at: 10.0, // far future
            duration: 0.5,
            gain: 0.5,
        });
        e.handle_cmd(AudioCommand::ClearPending);
        let mut out = vec![StereoFrame::zero(); 512];
        e.render_block(&mut out);
        assert!(out.iter().all(|f| f.left == 0.0 && f.right == 0.0));
    }

    #[test]
    fn capture_finalizes_at_target_frame_count() {
        let (mut e, _) = engine();
        let (in_tx, in_rx) = crossbeam_channel::bounded(8);
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        e.set_input_rx(in_rx);
        e.set_completed_tx(done_tx);

        let id = next_capture_id();
        e.handle_cmd(AudioCommand::StartCapture { id, frames: 100 });
        in_tx
            .send(vec![StereoFrame::splat(0.25); 150])
            .unwrap();
        e.drain_input();

        let done = done_rx.try_recv().expect("capture should complete");
        assert_eq!(done.id, id);
        assert_eq!(done.frames.len(), 100);
        assert!(e.capture.is_none());
    }

    #[test]
    fn manual_stop_finalizes_short_capture() {
        let (mut e, _) = engine();
        let (in_tx, in_rx) = crossbeam_channel::bounded(8);
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        e.set_input_rx(in_rx);
        e.set_completed_tx(done_tx);

        let id = next_capture_id();
        e.handle_cmd(AudioCommand::StartCapture { id, frames: 1000 });
        in_tx.send(vec![StereoFrame::splat(0.1); 300]).unwrap();
        e.drain_input();
        e.handle_cmd(AudioCommand::StopCapture);

        let done = done_rx.try_recv().expect("stopped capture should flush");
        assert_eq!(done.frames.len(), 300);
    }
}
