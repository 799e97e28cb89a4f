// Step-to-note quantization: collapse a per-sixteenth pitch label sequence
// into discrete note events, with rests as segment boundaries. Scale
// correction happens *before* comparison, so two steps that differ only
// pre-correction still merge into one note.

use crate::shared::ScaleMode;

use super::note;

/// One merged melodic event. `start_index` and `length` are in sixteenth
/// steps (16 per bar).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuantizedNote {
    pub note: String,
    pub start_index: usize,
    pub length: usize,
}

/// Snap a pitch class onto the pentatonic scale. Identity for anything the
/// map doesn't know (matches the lookup-or-fallthrough in the players).
fn pentatonic_class(scale: ScaleMode, class: &str) -> &str {
    match scale {
        ScaleMode::Chromatic => class,
        ScaleMode::Major => match class {
            "C#" => "D",
            "D#" => "E",
            "F" | "F#" => "G",
            "G#" => "A",
            "A#" | "B" => "C",
            other => other,
        },
        ScaleMode::Minor => match class {
            "C#" | "D" => "D#",
            "E" => "F",
            "F#" => "G",
            "G#" | "A" => "A#",
            "B" => "C",
            other => other,
        },
    }
}

/// Apply scale correction to a full note name, keeping the octave. Labels
/// that don't parse as a note come back verbatim.
pub fn correct_note(scale: ScaleMode, name: &str) -> String {
    if scale == ScaleMode::Chromatic {
        return name.to_string();
    }
    match note::parse(name) {
        Some((class, octave)) => format!("{}{octave}", pentatonic_class(scale, class)),
        None => name.to_string(),
    }
}

/// Walk the step sequence once, merging runs of identical corrected pitches
/// into notes and closing the open note at every rest. O(n), no backtracking.
pub fn extract_quantized_notes(steps: &[String], scale: ScaleMode) -> Vec<QuantizedNote> {
    let mut result = Vec::new();
    let mut open: Option<(String, usize)> = None; // (corrected pitch, start index)

    for (i, step) in steps.iter().enumerate() {
        if step == "rest" {
            if let Some((n, start)) = open.take() {
                result.push(QuantizedNote {
                    note: n,
                    start_index: start,
                    length: i - start,
                });
            }
            continue;
        }

        let corrected = correct_note(scale, step);
        match &open {
            None => open = Some((corrected, i)),
            Some((current, start)) if *current != corrected => {
                result.push(QuantizedNote {
                    note: current.clone(),
                    start_index: *start,
                    length: i - start,
                });
                open = Some((corrected, i));
            }
            Some(_) => {} // same pitch continues
        }
    }

    if let Some((n, start)) = open {
        result.push(QuantizedNote {
            note: n,
            start_index: start,
            length: steps.len() - start,
        });
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steps(labels: &[&str]) -> Vec<String> {
        labels.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn merges_runs_and_splits_on_rest() {
        let out = extract_quantized_notes(
            &steps(&["C4", "C4", "rest", "D4"]),
            ScaleMode::Chromatic,
        );
        assert_eq!(
            out,
            vec![
                QuantizedNote {
                    note: "C4".into(),
                    start_index: 0,
                    length: 2
                },
                QuantizedNote {
                    note: "D4".into(),
                    start_index: 3,
                    length: 1
                },
            ]
        );
    }

    #[test]
    fn empty_and_all_rest_inputs_yield_nothing() {
        assert!(extract_quantized_notes(&[], ScaleMode::Chromatic).is_empty());
        assert!(extract_quantized_notes(&steps(&["rest", "rest"]), ScaleMode::Major).is_empty());
    }

    #[test]
    fn single_step_becomes_length_one_note() {
        let out = extract_quantized_notes(&steps(&["G3"]), ScaleMode::Chromatic);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].length, 1);
        assert_eq!(out[0].start_index, 0);
    }

    #[test]
    fn trailing_open_note_closes_at_sequence_end() {
        let out = extract_quantized_notes(&steps(&["rest", "E4", "E4", "E4"]), ScaleMode::Chromatic);
        assert_eq!(
            out,
            vec![QuantizedNote {
                note: "E4".into(),
                start_index: 1,
                length: 3
            }]
        );
    }

    #[test]
    fn correction_happens_before_comparison() {
        // C# and D both correct to D in major pentatonic, so they merge.
        let out = extract_quantized_notes(&steps(&["C#4", "D4"]), ScaleMode::Major);
        assert_eq!(
            out,
            vec![QuantizedNote {
                note: "D4".into(),
                start_index: 0,
                length: 2
            }]
        );
    }

    #[test]
    fn minor_map_differs_from_major() {
        assert_eq!(correct_note(ScaleMode::Minor, "D4"), "D#4");
        assert_eq!(correct_note(ScaleMode::Major, "D4"), "D4");
        assert_eq!(correct_note(ScaleMode::Chromatic, "D4"), "D4");
    }

    #[test]
    fn lengths_plus_rests_cover_every_step() {
        // totality: sum of note lengths + rest count == steps.len()
        let inputs = [
            vec!["C4", "C4", "rest", "D4", "D4", "D4", "rest", "rest"],
            vec!["A3", "B3", "C4"],
            vec!["rest"],
            vec![],
        ];
        for labels in inputs {
            let s = steps(&labels);
            let notes = extract_quantized_notes(&s, ScaleMode::Minor);
            let note_total: usize = notes.iter().map(|n| n.length).sum();
            let rest_total = s.iter().filter(|l| *l == "rest").count();
            assert_eq!(note_total + rest_total, s.len());
        }
    }
}
