//! Pitch and frequency conversion.
//!
//! Bidirectional mapping between note names (`C4`, `F#3`, `Bb-1`) and
//! frequencies in equal temperament, anchored at A4 = 440 Hz = MIDI 69.
//! Every semitone is a fixed ratio of 2^(1/12); there is no microtonal
//! support. Conversions that start from a frequency snap to the nearest
//! semitone, so they are lossy by design for arbitrary input.

use crate::error::{Error, Result};

/// Chromatic note names, sharp-spelled, indexed by `midi % 12`.
const CHROMATIC: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Semitone offset within an octave for a natural note letter.
fn letter_semitone(letter: char) -> Option<i32> {
    match letter {
        'C' => Some(0),
        'D' => Some(2),
        'E' => Some(4),
        'F' => Some(5),
        'G' => Some(7),
        'A' => Some(9),
        'B' => Some(11),
        _ => None,
    }
}

/// Parse a note name into its MIDI note number.
///
/// The accepted form is `<letter>[#|b]<octave>` where the letter is A-G
/// (case-insensitive), the accidental is optional, and the octave is an
/// integer (possibly negative, e.g. `C-1`).
pub fn note_to_midi(name: &str) -> Result<i32> {
    let mut chars = name.trim().chars().peekable();

    let letter = chars
        .next()
        .ok_or_else(|| Error::InvalidNoteName(name.to_string()))?
        .to_ascii_uppercase();
    let base = letter_semitone(letter).ok_or_else(|| Error::InvalidNoteName(name.to_string()))?;

    // Optional accidental
    let mut accidental = 0;
    if let Some(&c) = chars.peek() {
        if c == '#' {
            accidental = 1;
            chars.next();
        } else if c == 'b' {
            accidental = -1;
            chars.next();
        }
    }

    // Octave: optional leading minus, then digits only
    let octave_str: String = chars.collect();
    if octave_str.is_empty() {
        return Err(Error::InvalidNoteName(name.to_string()));
    }
    let octave: i32 = octave_str
        .parse()
        .map_err(|_| Error::InvalidNoteName(name.to_string()))?;

    Ok((octave + 1) * 12 + base + accidental)
}

/// Convert a note name to its frequency in Hz.
///
/// `freq = 440 * 2^((midi - 69) / 12)` with `midi` from [`note_to_midi`].
pub fn note_to_frequency(name: &str) -> Result<f64> {
    let midi = note_to_midi(name)?;
    Ok(440.0 * 2.0_f64.powf((midi - 69) as f64 / 12.0))
}

/// Round a frequency to the nearest MIDI note number.
///
/// `midi = round(69 + 12 * log2(freq / 440))`. Fails for non-finite or
/// non-positive frequencies.
pub fn frequency_to_midi(frequency: f64) -> Result<i32> {
    if !frequency.is_finite() || frequency <= 0.0 {
        return Err(Error::InvalidNoteName(format!(
            "{frequency} Hz has no nearest note"
        )));
    }
    Ok((69.0 + 12.0 * (frequency / 440.0).log2()).round() as i32)
}

/// Convert a frequency to the name of the nearest semitone.
///
/// Round-trips exactly for frequencies produced by [`note_to_frequency`]
/// (sharp spellings); anything else snaps to the nearest semitone.
pub fn frequency_to_name(frequency: f64) -> Result<String> {
    let midi = frequency_to_midi(frequency)?;
    let name = CHROMATIC[midi.rem_euclid(12) as usize];
    let octave = midi.div_euclid(12) - 1;
    Ok(format!("{name}{octave}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_pitch_is_exact() {
        assert_eq!(note_to_frequency("A4").unwrap(), 440.0);
        assert_eq!(note_to_midi("A4").unwrap(), 69);
    }

    #[test]
    fn test_middle_c() {
        let freq = note_to_frequency("C4").unwrap();
        assert!((freq - 261.63).abs() < 0.01, "C4 was {freq}");
        assert_eq!(note_to_midi("C4").unwrap(), 60);
    }

    #[test]
    fn test_accidentals() {
        assert_eq!(note_to_midi("C#4").unwrap(), 61);
        assert_eq!(note_to_midi("Db4").unwrap(), 61);
        assert_eq!(note_to_midi("Bb3").unwrap(), 58);
    }

    #[test]
    fn test_negative_octave() {
        assert_eq!(note_to_midi("C-1").unwrap(), 0);
    }

    #[test]
    fn test_lowercase_letter() {
        assert_eq!(note_to_midi("g3").unwrap(), note_to_midi("G3").unwrap());
    }

    #[test]
    fn test_invalid_names() {
        for bad in ["", "H4", "C", "4", "C#", "Cx4", "A4.5", "A 4x"] {
            assert!(note_to_midi(bad).is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn test_round_trip_all_sharp_names() {
        for octave in 0..=8 {
            for name in CHROMATIC {
                let full = format!("{name}{octave}");
                let freq = note_to_frequency(&full).unwrap();
                assert_eq!(frequency_to_name(freq).unwrap(), full);
            }
        }
    }

    #[test]
    fn test_flat_input_renders_sharp() {
        let freq = note_to_frequency("Bb4").unwrap();
        assert_eq!(frequency_to_name(freq).unwrap(), "A#4");
    }

    #[test]
    fn test_nearest_semitone_snapping() {
        // A quarter-tone above A4 still names as A4 or A#4, never an error
        assert_eq!(frequency_to_name(440.0).unwrap(), "A4");
        assert_eq!(frequency_to_name(446.0).unwrap(), "A4");
        assert_eq!(frequency_to_name(460.0).unwrap(), "A#4");
    }

    #[test]
    fn test_frequency_to_midi_rejects_bad_input() {
        assert!(frequency_to_midi(0.0).is_err());
        assert!(frequency_to_midi(-10.0).is_err());
        assert!(frequency_to_midi(f64::NAN).is_err());
        assert!(frequency_to_midi(f64::INFINITY).is_err());
    }
}
