// Shared constants and session types. Everything here is plain data; the
// audio engine, the recording pipeline, and the loop scheduler all read from
// these but the ownership rules are strict:
//   - SessionSettings: written by the control loop, read everywhere else.
//   - SegmentStore (pipeline/segment.rs): written by one recording pipeline
//     at a time, read by the scheduler.
//   - The loop-playing flag: owned by the scheduler, read-only elsewhere.

pub const BEATS_PER_BAR: u32 = 4;
pub const LOOP_SLOTS: usize = 16; // drum/chord grid: 16 half-beat slots = 2 measures
pub const COUNT_IN_BEATS: u32 = 4;

// Captures smaller than this are noise (a click of the mic, an empty take);
// they never reach the analysis service.
pub const MIN_CAPTURE_BYTES: usize = 1000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Rhythm,
    Melody,
}

impl Mode {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "rhythm" => Some(Mode::Rhythm),
            "melody" => Some(Mode::Melody),
            _ => None,
        }
    }
}

/// Which scale recorded pitches are corrected onto. Chromatic is the
/// pass-through mode; the pentatonic modes snap every pitch class onto the
/// scale (see pipeline/quantize.rs for the maps).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScaleMode {
    Major,
    Minor,
    Chromatic,
}

impl ScaleMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "major" => Some(ScaleMode::Major),
            "minor" => Some(ScaleMode::Minor),
            "chromatic" => Some(ScaleMode::Chromatic),
            _ => None,
        }
    }
}

/// Tempo, bar count and the current editing mode for one recording session.
/// `tempo` and `bar_count` are inputs from the settings surface; the pipeline
/// and scheduler only ever read them.
#[derive(Clone, Debug)]
pub struct SessionSettings {
    pub tempo: f64,     // beats per minute
    pub bar_count: u32, // 1, 2 or 4
    pub mode: Mode,
    pub scale: ScaleMode,
    pub drum_pattern: String,
    pub chord_pattern: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            tempo: 120.0,
            bar_count: 1,
            mode: Mode::Rhythm,
            scale: ScaleMode::Chromatic,
            drum_pattern: "basic".to_string(),
            chord_pattern: "pattern1".to_string(),
        }
    }
}

impl SessionSettings {
    /// The authoritative length of one recording at the current settings.
    /// Every capture is trimmed or padded to exactly this many seconds.
    pub fn expected_duration(&self) -> f64 {
        (60.0 / self.tempo) * BEATS_PER_BAR as f64 * self.bar_count as f64
    }

    pub fn beat_duration(&self) -> f64 {
        60.0 / self.tempo
    }

    pub fn set_tempo(&mut self, tempo: f64) {
        self.tempo = tempo.clamp(20.0, 240.0);
    }

    pub fn set_bar_count(&mut self, bars: u32) {
        if matches!(bars, 1 | 2 | 4) {
            self.bar_count = bars;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expected_duration_follows_tempo_and_bars() {
        let mut s = SessionSettings::default();
        s.tempo = 120.0;
        s.bar_count = 1;
        assert!((s.expected_duration() - 2.0).abs() < 1e-9);
        s.bar_count = 4;
        assert!((s.expected_duration() - 8.0).abs() < 1e-9);
        s.tempo = 60.0;
        s.bar_count = 2;
        assert!((s.expected_duration() - 8.0).abs() < 1e-9);
    }

    #[test]
    fn bar_count_only_accepts_supported_values() {
        let mut s = SessionSettings::default();
        s.set_bar_count(3);
        assert_eq!(s.bar_count, 1);
        s.set_bar_count(2);
        assert_eq!(s.bar_count, 2);
    }
}
