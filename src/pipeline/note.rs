// Note-name arithmetic: "C#4" <-> pitch class + octave <-> frequency.
// Shared by the quantizer (scale correction) and the players (synth tuning).

const PITCH_CLASSES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Split a note name like "C#4" into its pitch class and octave. Accepts
/// exactly `[A-G]#?digit`; anything else (including "rest") is None.
pub fn parse(name: &str) -> Option<(&str, i32)> {
    // labels can be analyzer placeholders like "—"; never split mid-char
    if !name.is_ascii() {
        return None;
    }
    let digit_at = name.len().checked_sub(1)?;
    let (class, octave) = name.split_at(digit_at);
    let octave: i32 = octave.parse().ok()?;
    if PITCH_CLASSES.contains(&class) {
        Some((class, octave))
    } else {
        None
    }
}

pub fn semitone(class: &str) -> Option<i32> {
    PITCH_CLASSES.iter().position(|&c| c == class).map(|i| i as i32)
}

/// MIDI note number; C4 = 60.
pub fn to_midi(name: &str) -> Option<i32> {
    let (class, octave) = parse(name)?;
    Some(semitone(class)? + (octave + 1) * 12)
}

pub fn midi_to_freq(midi: i32) -> f32 {
    440.0 * 2f32.powf((midi - 69) as f32 / 12.0)
}

pub fn to_freq(name: &str) -> Option<f32> {
    Some(midi_to_freq(to_midi(name)?))
}

/// Shift a note by whole octaves, e.g. `transpose_octaves("C4", 3) == "C7"`.
/// Recorded phrases sit low; the melody player lifts them into an audible
/// register with this.
pub fn transpose_octaves(name: &str, octaves: i32) -> String {
    match parse(name) {
        Some((class, octave)) => format!("{class}{}", octave + octaves),
        None => name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sharps_and_rejects_garbage() {
        assert_eq!(parse("C#4"), Some(("C#", 4)));
        assert_eq!(parse("A0"), Some(("A", 0)));
        assert_eq!(parse("rest"), None);
        assert_eq!(parse("H4"), None);
        assert_eq!(parse(""), None);
        assert_eq!(parse("4"), None);
    }

    #[test]
    fn midi_and_frequency_anchors() {
        assert_eq!(to_midi("C4"), Some(60));
        assert_eq!(to_midi("A4"), Some(69));
        assert!((to_freq("A4").unwrap() - 440.0).abs() < 1e-3);
        assert!((to_freq("A5").unwrap() - 880.0).abs() < 1e-3);
    }

    #[test]
    fn octave_transposition() {
        assert_eq!(transpose_octaves("C4", 3), "C7");
        assert_eq!(transpose_octaves("rest", 3), "rest");
    }
}
