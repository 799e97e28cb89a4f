// Per-instrument playback primitives. Each player turns its pattern into
// concrete engine events relative to one start time and does nothing else —
// repetition belongs to the loop scheduler alone. Calling a player twice
// with overlapping ranges overlaps audibly; the scheduler guarantees
// non-overlapping invocations.

use crate::audio::SampleId;
use crate::audio_api::{AudioCommand, EventSink};
use crate::shared::{ScaleMode, LOOP_SLOTS};

use super::note;
use super::quantize::{self, QuantizedNote};

const DRUM_GAIN: f32 = 0.9;
const CHORD_GAIN: f32 = 0.09;
const MELODY_GAIN: f32 = 0.18;

// Short phrases come back from the analyzer around octave 3-4; lift them so
// the melody sits above the chord bed.
const MELODY_TRANSPOSE_OCTAVES: i32 = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrumVoice {
    Kick,
    Snare,
    Hihat,
}

/// The preloaded one-shot sample set. Decoded and registered with the
/// engine once at startup (see loader/sample_loader.rs).
#[derive(Clone, Copy, Debug)]
pub struct DrumKit {
    pub kick: SampleId,
    pub snare: SampleId,
    pub hihat: SampleId,
}

impl DrumKit {
    fn id(&self, voice: DrumVoice) -> SampleId {
        match voice {
            DrumVoice::Kick => self.kick,
            DrumVoice::Snare => self.snare,
            DrumVoice::Hihat => self.hihat,
        }
    }
}

/// Drum hits as (offset in beats, voice) over the 16-slot half-beat grid.
/// Unknown keys fall back to the basic pattern.
pub fn drum_events(pattern: &str) -> Vec<(f64, DrumVoice)> {
    use DrumVoice::*;
    let slot = |i: usize| i as f64 * 0.5;
    match pattern {
        "hiphop" => {
            let voices = [
                Kick, Hihat, Snare, Hihat, Hihat, Kick, Snare, Hihat, Kick, Kick, Snare, Hihat,
                Hihat, Kick, Snare, Hihat,
            ];
            voices.iter().enumerate().map(|(i, &v)| (slot(i), v)).collect()
        }
        _ => (0..LOOP_SLOTS)
            .map(|i| (slot(i), [Kick, Hihat, Snare, Hihat][i % 4]))
            .collect(),
    }
}

pub struct DrumPlayer {
    pub kit: DrumKit,
}

impl DrumPlayer {
    pub fn new(kit: DrumKit) -> Self {
        Self { kit }
    }

    pub fn play(&self, sink: &dyn EventSink, pattern: &str, start: f64, beat_duration: f64) {
        for (beats, voice) in drum_events(pattern) {
            sink.send(AudioCommand::ScheduleSample {
                id: self.kit.id(voice),
                at: start + beats * beat_duration,
                gain: DRUM_GAIN,
            });
        }
    }
}

/// One chord-or-note set per half-beat slot; single-note slots are the
/// bass pickup before the full chord lands.
pub fn chord_slots(pattern: &str) -> &'static [&'static [&'static str]] {
    match pattern {
        "pattern2" => &[
            &["C4"], &["C4", "E4", "G4"], &["C4"], &["C4", "E4", "G4"],
            &["G3"], &["G3", "B3", "D4"], &["G3"], &["G3", "B3", "D4"],
            &["A3"], &["A3", "C4", "E4"], &["A3"], &["A3", "C4", "E4"],
            &["F3"], &["F3", "A3", "C4"], &["F3"], &["F3", "A3", "C4"],
        ],
        "pattern3" => &[
            &["F4"], &["F4", "A4", "C5"], &["F4"], &["F4", "A4", "C5"],
            &["G4"], &["G4", "B4", "D5"], &["G4"], &["G4", "B4", "D5"],
            &["A4"], &["A4", "C5", "E5"], &["A4"], &["A4", "C5", "E5"],
            &["A4"], &["A4", "C5", "E5"], &["A4"], &["A4", "C5", "E5"],
        ],
        "pattern4" => &[
            &["F4"], &["F4", "A4", "C5"], &["F4"], &["F4", "A4", "C5"],
            &["G4"], &["G4", "B4", "D5"], &["G4"], &["G4", "B4", "D5"],
            &["E4"], &["E4", "G4", "B4"], &["E4"], &["E4", "G4", "B4"],
            &["A4"], &["A4", "C5", "E5"], &["A4"], &["A4", "C5", "E5"],
        ],
        "pattern5" => &[
            &["A4"], &["A4", "C5", "E5"], &["A4"], &["A4", "C5", "E5"],
            &["F4"], &["F4", "A4", "C5"], &["F4"], &["F4", "A4", "C5"],
            &["G4"], &["G4", "B4", "D5"], &["G4"], &["G4", "B4", "D5"],
            &["C5"], &["C5", "E5", "G5"], &["C5"], &["C5", "E5", "G5"],
        ],
        "pattern6" => &[
            &["A4"], &["A4", "C5", "E5"], &["F4"], &["F4", "A4", "C5"],
            &["C5"], &["C5", "E5", "G5"], &["G4"], &["G4", "B4", "D5"],
            &["A4"], &["A4", "C5", "E5"], &["F4"], &["F4", "A4", "C5"],
            &["C5"], &["C5", "E5", "G5"], &["G4"], &["G4", "B4", "D5"],
        ],
        "pattern7" => &[
            &["C4"], &["C4", "E4", "G4"], &["G3"], &["G3", "B3", "D4"],
            &["A3"], &["A3", "C4", "E4"], &["E3"], &["E3", "B3", "G4"],
            &["F3"], &["F3", "A3", "C4"], &["E3"], &["E3", "C4", "G4"],
            &["F3"], &["F3", "A3", "C4"], &["G3"], &["G3", "B3", "D4"],
        ],
        // "pattern1" and anything unknown
        _ => &[
            &["F4"], &["F4", "A4", "C5", "E5"], &["F4"], &["F4", "A4", "C5", "E5"],
            &["E4"], &["E4", "G#4", "B4", "D5"], &["E4"], &["E4", "G#4", "B4", "D5"],
            &["A3"], &["A3", "C4", "E4", "G4"], &["A3"], &["A3", "C4", "E4", "G4"],
            &["G3"], &["G3", "A#3", "D4", "F4"], &["C4"], &["C4", "E4", "G4", "A#4"],
        ],
    }
}

pub struct ChordPlayer;

impl ChordPlayer {
    pub fn play(&self, sink: &dyn EventSink, pattern: &str, start: f64, chord_duration: f64) {
        for (i, chord) in chord_slots(pattern).iter().enumerate() {
            let at = start + i as f64 * chord_duration;
            for name in chord.iter() {
                if let Some(freq) = note::to_freq(name) {
                    sink.send(AudioCommand::ScheduleTone {
                        freq,
                        at,
                        duration: chord_duration,
                        gain: CHORD_GAIN,
                    });
                }
            }
        }
    }
}

pub struct MelodyPlayer;

impl MelodyPlayer {
    /// Schedule one tone per quantized note, applying the shared scale
    /// correction and the fixed register lift. Rests never reach here, but
    /// an unparseable note is skipped rather than detuned.
    pub fn play(
        &self,
        sink: &dyn EventSink,
        notes: &[QuantizedNote],
        scale: ScaleMode,
        start: f64,
        melody_duration: f64,
    ) {
        for n in notes {
            if n.note == "rest" {
                continue;
            }
            let corrected = quantize::correct_note(scale, &n.note);
            let lifted = note::transpose_octaves(&corrected, MELODY_TRANSPOSE_OCTAVES);
            let Some(freq) = note::to_freq(&lifted) else {
                continue;
            };
            sink.send(AudioCommand::ScheduleTone {
                freq,
                at: start + n.start_index as f64 * melody_duration,
                duration: n.length as f64 * melody_duration,
                gain: MELODY_GAIN,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::next_sample_id;
    use crate::audio_api::test_sink::TestSink;

    fn kit() -> DrumKit {
        DrumKit {
            kick: next_sample_id(),
            snare: next_sample_id(),
            hihat: next_sample_id(),
        }
    }

    #[test]
    fn drum_player_emits_sixteen_hits_on_the_half_beat_grid() {
        let sink = TestSink::default();
        let player = DrumPlayer::new(kit());
        // 120 bpm -> beat 0.5s, slots every 0.25s
        player.play(&sink, "basic", 10.0, 0.5);
        let cmds = sink.take();
        assert_eq!(cmds.len(), LOOP_SLOTS);
        let times: Vec<f64> = cmds
            .iter()
            .map(|c| match c {
                AudioCommand::ScheduleSample { at, .. } => *at,
                other => panic!("unexpected command {other:?}"),
            })
            .collect();
        assert!((times[0] - 10.0).abs() < 1e-9);
        assert!((times[1] - 10.25).abs() < 1e-9);
        assert!((times[15] - 13.75).abs() < 1e-9);
    }

    #[test]
    fn unknown_drum_pattern_falls_back_to_basic() {
        assert_eq!(drum_events("nope"), drum_events("basic"));
        assert_ne!(drum_events("hiphop"), drum_events("basic"));
    }

    #[test]
    fn unknown_chord_pattern_falls_back_to_pattern1() {
        assert_eq!(chord_slots("nope"), chord_slots("pattern1"));
        assert_eq!(chord_slots("pattern1").len(), LOOP_SLOTS);
        for key in ["pattern2", "pattern3", "pattern4", "pattern5", "pattern6", "pattern7"] {
            assert_eq!(chord_slots(key).len(), LOOP_SLOTS, "{key}");
        }
    }

    #[test]
    fn chord_player_spaces_slots_by_chord_duration() {
        let sink = TestSink::default();
        ChordPlayer.play(&sink, "pattern2", 0.0, 0.25);
        let tones = sink.tones();
        // pattern2: 4 single-note slots + 12... each slot is 1 or 3 notes
        let expected: usize = chord_slots("pattern2").iter().map(|c| c.len()).sum();
        assert_eq!(tones.len(), expected);
        // first slot single note at t=0, second slot starts at 0.25
        assert!((tones[0].1 - 0.0).abs() < 1e-9);
        assert!((tones[1].1 - 0.25).abs() < 1e-9);
    }

    #[test]
    fn melody_player_lifts_notes_three_octaves() {
        let sink = TestSink::default();
        let notes = vec![QuantizedNote {
            note: "A1".into(),
            start_index: 4,
            length: 2,
        }];
        MelodyPlayer.play(&sink, &notes, ScaleMode::Chromatic, 1.0, 0.125);
        let tones = sink.tones();
        assert_eq!(tones.len(), 1);
        let (freq, at, dur) = tones[0];
        assert!((freq - 440.0).abs() < 1e-2); // A1 + 3 octaves = A4
        assert!((at - 1.5).abs() < 1e-9);
        assert!((dur - 0.25).abs() < 1e-9);
    }

    #[test]
    fn melody_player_applies_scale_correction_before_lifting() {
        let sink = TestSink::default();
        let notes = vec![QuantizedNote {
            note: "C#1".into(),
            start_index: 0,
            length: 1,
        }];
        MelodyPlayer.play(&sink, &notes, ScaleMode::Major, 0.0, 0.125);
        let tones = sink.tones();
        // C#1 -> D1 -> D4
        let d4 = note::to_freq("D4").unwrap();
        assert!((tones[0].0 - d4).abs() < 1e-2);
    }
}
