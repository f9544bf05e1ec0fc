//! Textual rendering of a sequence.
//!
//! Produces a line-oriented, commented procedural script: one statement per
//! note in original order, `play(frequency, duration)` for pitched notes and
//! `wait(duration)` for rests, each annotated with the note's name. Unlike
//! the MIDI export this form has no layout constraints; it exists for human
//! inspection and copy-paste.

use crate::pitch;
use crate::score::{Note, Sequence};

/// Display label for a note: its stored name, the name of its nearest
/// semitone, or the raw frequency when naming fails.
fn note_label(note: &Note) -> String {
    if let Some(name) = &note.name {
        return name.clone();
    }
    match pitch::frequency_to_name(note.frequency) {
        Ok(name) => name,
        Err(_) => format!("{:.2} Hz", note.frequency),
    }
}

/// Render a sequence as a commented procedural script.
pub fn sequence_to_script(sequence: &Sequence) -> String {
    let mut out = String::new();

    let title = if sequence.title.is_empty() {
        "untitled"
    } else {
        &sequence.title
    };
    out.push_str(&format!("# {title} ({} BPM", sequence.tempo_bpm));
    if !sequence.key.is_empty() {
        out.push_str(&format!(", key: {}", sequence.key));
    }
    out.push_str(")\n");

    for note in &sequence.notes {
        if note.is_silent() {
            out.push_str(&format!("wait({:.3})  # rest\n", note.duration));
        } else {
            out.push_str(&format!(
                "play({:.3}, {:.3})  # {}\n",
                note.frequency,
                note.duration,
                note_label(note)
            ));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_line_per_note_in_order() {
        let seq = Sequence::new(120.0)
            .with_title("Scale")
            .with_key("C major")
            .with_note(Note::new(440.0, 0.5))
            .with_note(Note::rest(0.25))
            .with_note(Note::new(523.25, 0.5));
        let script = sequence_to_script(&seq);
        let lines: Vec<&str> = script.lines().collect();

        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "# Scale (120 BPM, key: C major)");
        assert_eq!(lines[1], "play(440.000, 0.500)  # A4");
        assert_eq!(lines[2], "wait(0.250)  # rest");
        assert_eq!(lines[3], "play(523.250, 0.500)  # C5");
    }

    #[test]
    fn test_stored_name_wins_over_derived_name() {
        let seq = Sequence::new(120.0).with_note(Note::new(440.0, 0.5).with_name("La"));
        assert!(sequence_to_script(&seq).contains("# La"));
    }

    #[test]
    fn test_unnameable_frequency_falls_back_to_numeric() {
        let mut note = Note::new(440.0, 0.5);
        note.frequency = -3.0;
        // A negative frequency cannot be named; the line still renders.
        let label = note_label(&note);
        assert_eq!(label, "-3.00 Hz");
    }

    #[test]
    fn test_empty_sequence_is_header_only() {
        let script = sequence_to_script(&Sequence::new(90.0));
        assert_eq!(script.lines().count(), 1);
        assert!(script.starts_with("# untitled (90 BPM)"));
    }
}
