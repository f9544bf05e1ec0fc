//! Defensive sequence validation.
//!
//! The upstream generator range-validates sequences before they reach the
//! core, so these checks only guard against data that would corrupt
//! scheduling or export: non-finite numbers, non-positive durations,
//! negative frequencies, unusable tempos. Softer data-quality findings are
//! reported as warnings and never block anything.

use crate::error::{Error, Result};
use crate::score::Sequence;

/// A single finding, tied to a note index where applicable.
#[derive(Clone, Debug)]
pub struct ValidationIssue {
    /// Index of the offending note, or `None` for sequence-level findings.
    pub index: Option<usize>,
    /// Human-readable description.
    pub message: String,
}

/// Result of validating a sequence.
#[derive(Clone, Debug, Default)]
pub struct ValidationResult {
    /// Findings that make the sequence unusable.
    pub errors: Vec<ValidationIssue>,
    /// Advisory findings; the sequence is still usable.
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Check if the validation passed (no hard errors).
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Validate a sequence, collecting hard errors and advisory warnings.
pub fn validate_sequence(sequence: &Sequence) -> ValidationResult {
    let mut result = ValidationResult::default();

    if !sequence.tempo_bpm.is_finite() || sequence.tempo_bpm <= 0.0 {
        result.errors.push(ValidationIssue {
            index: None,
            message: format!("tempo {} BPM is unusable", sequence.tempo_bpm),
        });
    } else if !(60.0..=200.0).contains(&sequence.tempo_bpm) {
        result.warnings.push(ValidationIssue {
            index: None,
            message: format!("tempo {} BPM is outside the expected 60-200 range", sequence.tempo_bpm),
        });
    }

    for (i, note) in sequence.notes.iter().enumerate() {
        if !note.duration.is_finite() || note.duration <= 0.0 {
            result.errors.push(ValidationIssue {
                index: Some(i),
                message: format!("duration {} is not a positive finite number", note.duration),
            });
        }
        if !note.frequency.is_finite() || note.frequency < 0.0 {
            result.errors.push(ValidationIssue {
                index: Some(i),
                message: format!("frequency {} Hz is not a non-negative finite number", note.frequency),
            });
        }
        if note.is_rest && note.frequency != 0.0 && note.frequency.is_finite() {
            result.warnings.push(ValidationIssue {
                index: Some(i),
                message: format!("rest carries a stored frequency of {} Hz", note.frequency),
            });
        }
    }

    result
}

/// Run the hard checks, mapping the first failure to
/// [`Error::MalformedSequence`]. Called before any voice is scheduled.
pub fn ensure_playable(sequence: &Sequence) -> Result<()> {
    let result = validate_sequence(sequence);
    match result.errors.first() {
        None => Ok(()),
        Some(issue) => {
            let detail = match issue.index {
                Some(i) => format!("note {}: {}", i, issue.message),
                None => issue.message.clone(),
            };
            Err(Error::MalformedSequence(detail))
        }
    }
}
