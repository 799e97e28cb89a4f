// The loop transport: single owner of "is a loop playing". Repetition works
// by anchoring every iteration to one aligned start time and scheduling all
// three players from the same instant, so tracks cannot drift apart. The
// period is a fixed two measures — the drum and chord grids are defined over
// 16 half-beat slots, and deriving the period from segment counts would let
// tracks of different lengths fall out of phase.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::audio_api::{AudioCommand, EventSink};
use crate::shared::SessionSettings;

use super::players::{ChordPlayer, DrumKit, DrumPlayer, MelodyPlayer};
use super::quantize;
use super::segment::SegmentStore;

const STOP_POLL: Duration = Duration::from_millis(5);

// Each iteration is dispatched this many seconds before its onset, so slot-0
// events reach the engine while they are still in the future.
const DISPATCH_LEAD: f64 = 0.05;

/// The disposable repetition registered by `loop_play`. Dropping it through
/// `dispose` leaves zero pending callbacks.
struct LoopHandle {
    stop: Arc<AtomicBool>,
    join: JoinHandle<()>,
}

impl LoopHandle {
    fn dispose(self) {
        self.stop.store(true, Ordering::SeqCst);
        let _ = self.join.join();
    }
}

pub struct LoopScheduler {
    sink: Arc<dyn EventSink>,
    settings: Arc<RwLock<SessionSettings>>,
    store: Arc<RwLock<SegmentStore>>,
    kit: DrumKit,
    playing: Arc<AtomicBool>,
    handle: Option<LoopHandle>,
}

impl LoopScheduler {
    pub fn new(
        sink: Arc<dyn EventSink>,
        settings: Arc<RwLock<SessionSettings>>,
        store: Arc<RwLock<SegmentStore>>,
        kit: DrumKit,
    ) -> Self {
        Self {
            sink,
            settings,
            store,
            kit,
            playing: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    /// Start looping. No-op when already playing; otherwise any stale
    /// schedule is cleared first, the current transport time becomes the
    /// alignment reference, and the repeat driver is registered.
    pub fn loop_play(&mut self) {
        if self.is_playing() {
            return;
        }
        if let Some(h) = self.handle.take() {
            h.dispose();
        }

        let stop = Arc::new(AtomicBool::new(false));

        let sink = self.sink.clone();
        let settings = self.settings.clone();
        let store = self.store.clone();
        let kit = self.kit;
        let stop_flag = stop.clone();

        let join = thread::spawn(move || {
            let mut next_time = sink.now_seconds() + DISPATCH_LEAD;
            loop {
                if stop_flag.load(Ordering::SeqCst) {
                    break;
                }
                // Tempo, patterns, scale and segments are re-read at every
                // invocation; nothing is captured stale from loop_play time.
                let snapshot = settings.read().expect("settings lock").clone();
                play_once(&*sink, &store, &snapshot, kit, next_time);

                let period = 8.0 * snapshot.beat_duration(); // two measures
                next_time += period;

                // Pace on the transport clock itself; wall time drifts
                // against the device clock over long sessions.
                while sink.now_seconds() < next_time - DISPATCH_LEAD {
                    if stop_flag.load(Ordering::SeqCst) {
                        return;
                    }
                    thread::sleep(STOP_POLL);
                }
            }
        });

        self.handle = Some(LoopHandle { stop, join });
        self.playing.store(true, Ordering::SeqCst);
    }

    /// Stop looping and drop every not-yet-sounding event. Safe to call from
    /// any state, any number of times.
    pub fn stop(&mut self) {
        if let Some(h) = self.handle.take() {
            h.dispose();
        }
        self.sink.send(AudioCommand::ClearPending);
        self.playing.store(false, Ordering::SeqCst);
    }

    /// Re-read the driver's actual liveness into the flag. Protects against
    /// flag desync after a view transition rather than assuming Stopped.
    pub fn sync_from_transport(&mut self) {
        let alive = self
            .handle
            .as_ref()
            .is_some_and(|h| !h.join.is_finished());
        self.playing.store(alive, Ordering::SeqCst);
    }
}

impl Drop for LoopScheduler {
    fn drop(&mut self) {
        if let Some(h) = self.handle.take() {
            h.dispose();
        }
    }
}

/// Emit one loop iteration: drums, chords and melody all relative to the
/// same `time`, with slot durations derived from the current tempo.
fn play_once(
    sink: &dyn EventSink,
    store: &RwLock<SegmentStore>,
    settings: &SessionSettings,
    kit: DrumKit,
    time: f64,
) {
    let beat = settings.beat_duration();
    let chord_duration = beat / 2.0;
    let melody_duration = beat / 4.0;

    DrumPlayer::new(kit).play(sink, &settings.drum_pattern, time, beat);
    ChordPlayer.play(sink, &settings.chord_pattern, time, chord_duration);

    let raw = store.read().expect("segment lock").raw_melody();
    let notes = quantize::extract_quantized_notes(&raw, settings.scale);
    MelodyPlayer.play(sink, &notes, settings.scale, time, melody_duration);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::next_sample_id;
    use crate::audio_api::test_sink::TestSink;
    use crate::shared::LOOP_SLOTS;

    fn scheduler(sink: Arc<TestSink>) -> LoopScheduler {
        let kit = DrumKit {
            kick: next_sample_id(),
            snare: next_sample_id(),
            hihat: next_sample_id(),
        };
        let mut settings = SessionSettings::default();
        settings.chord_pattern = "none".into(); // falls back to pattern1
        LoopScheduler::new(
            sink,
            Arc::new(RwLock::new(settings)),
            SegmentStore::new_shared(),
            kit,
        )
    }

    fn drum_hits(sink: &TestSink) -> usize {
        sink.commands
            .lock()
            .unwrap()
            .iter()
            .filter(|c| matches!(c, AudioCommand::ScheduleSample { .. }))
            .count()
    }

    #[test]
    fn double_loop_play_registers_exactly_one_schedule() {
        let sink = Arc::new(TestSink::default());
        let mut s = scheduler(sink.clone());
        s.loop_play();
        s.loop_play(); // must be a no-op
        // 120 bpm -> 4s period; well inside the first iteration
        thread::sleep(Duration::from_millis(100));
        s.stop();
        assert_eq!(drum_hits(&sink), LOOP_SLOTS);
    }

    #[test]
    fn stop_leaves_no_pending_callbacks() {
        let sink = Arc::new(TestSink::default());
        let mut s = scheduler(sink.clone());
        s.loop_play();
        thread::sleep(Duration::from_millis(50));
        s.stop();
        assert!(!s.is_playing());
        let count_after_stop = sink.len();
        thread::sleep(Duration::from_millis(150));
        assert_eq!(sink.len(), count_after_stop, "events fired after stop()");
        // stop flushed the engine's pending queue too
        assert!(sink
            .commands
            .lock()
            .unwrap()
            .iter()
            .any(|c| matches!(c, AudioCommand::ClearPending)));
    }

    #[test]
    fn stop_is_safe_when_never_started() {
        let sink = Arc::new(TestSink::default());
        let mut s = scheduler(sink);
        s.stop();
        s.stop();
        assert!(!s.is_playing());
    }

    #[test]
    fn sync_from_transport_reflects_driver_liveness() {
        let sink = Arc::new(TestSink::default());
        let mut s = scheduler(sink);
        s.sync_from_transport();
        assert!(!s.is_playing());
        s.loop_play();
        s.sync_from_transport();
        assert!(s.is_playing());
        s.stop();
        s.sync_from_transport();
        assert!(!s.is_playing());
    }

    #[test]
    fn events_are_scheduled_ahead_of_the_transport() {
        let sink = Arc::new(TestSink::default());
        let mut s = scheduler(sink.clone());
        s.loop_play();
        thread::sleep(Duration::from_millis(50));
        s.stop();
        // TestSink's transport never advances past 0.0, so every onset must
        // carry at least the dispatch lead
        for (_, at, _) in sink.tones() {
            assert!(at > 0.0, "tone onset {at} not ahead of the transport");
        }
        let cmds = sink.commands.lock().unwrap();
        for c in cmds.iter() {
            if let AudioCommand::ScheduleSample { at, .. } = c {
                assert!(*at > 0.0, "drum onset {at} not ahead of the transport");
            }
        }
    }

    // A transport running 100x wall speed; lets pacing be observed without
    // waiting out real multi-second periods.
    struct FastClock {
        events: TestSink,
        start: std::time::Instant,
    }

    impl EventSink for FastClock {
        fn send(&self, cmd: AudioCommand) {
            self.events.send(cmd);
        }

        fn now_seconds(&self) -> f64 {
            self.start.elapsed().as_secs_f64() * 100.0
        }
    }

    #[test]
    fn driver_paces_iterations_on_the_transport_clock() {
        let sink = Arc::new(FastClock {
            events: TestSink::default(),
            start: std::time::Instant::now(),
        });
        let kit = DrumKit {
            kick: next_sample_id(),
            snare: next_sample_id(),
            hihat: next_sample_id(),
        };
        let mut s = LoopScheduler::new(
            sink.clone(),
            Arc::new(RwLock::new(SessionSettings::default())),
            SegmentStore::new_shared(),
            kit,
        );
        s.loop_play();
        // 120 bpm -> 4s transport period = 40ms wall at 100x
        thread::sleep(Duration::from_millis(150));
        s.stop();
        let hits = sink
            .events
            .commands
            .lock()
            .unwrap()
            .iter()
            .filter(|c| matches!(c, AudioCommand::ScheduleSample { .. }))
            .count();
        assert!(
            hits >= 2 * LOOP_SLOTS,
            "expected repeated iterations, got {hits} drum hits"
        );
    }

    #[test]
    fn melody_events_follow_the_segment_store() {
        let sink = Arc::new(TestSink::default());
        let kit = DrumKit {
            kick: next_sample_id(),
            snare: next_sample_id(),
            hihat: next_sample_id(),
        };
        let store = SegmentStore::new_shared();
        {
            use super::super::segment::Segment;
            let mut g = store.write().unwrap();
            g.melody = vec![Segment {
                label: "C4".into(),
                start: 0.0,
                end: 0.125,
                note: Some("C4".into()),
                hz: None,
                confidence: None,
                rms: None,
                confidence_rms: None,
            }];
        }
        let settings = SessionSettings::default();
        play_once(&*sink, &store, &settings, kit, 0.0);
        assert_eq!(sink.tones().len(), {
            let chords: usize = super::super::players::chord_slots("pattern1")
                .iter()
                .map(|c| c.len())
                .sum();
            chords + 1 // plus the single melody note
        });
    }
}
