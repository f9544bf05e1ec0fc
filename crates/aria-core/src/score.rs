//! Musical sequence data model.
//!
//! This module defines the value types handed to the core by the upstream
//! generator:
//!
//! - [`Note`] - a single event: frequency, duration, rest flag
//! - [`Sequence`] - an ordered list of notes plus tempo and metadata
//! - [`EnvelopeParams`] - caller-owned amplitude envelope settings
//!
//! Notes are immutable once constructed; the scheduler and the exporters
//! only ever read them.

use serde::{Deserialize, Serialize};

/// A single musical event.
///
/// A frequency of 0 means silence, and a note with `is_rest` set is silent
/// regardless of its stored frequency.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// Frequency in Hz (>= 0; 0 means silence).
    pub frequency: f64,
    /// Duration in seconds (> 0).
    pub duration: f64,
    /// Optional display label, e.g. "C4".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Whether this event is a rest.
    #[serde(default)]
    pub is_rest: bool,
}

impl Note {
    /// Create a pitched note.
    pub fn new(frequency: f64, duration: f64) -> Self {
        Self {
            frequency,
            duration,
            name: None,
            is_rest: false,
        }
    }

    /// Create a rest of the given duration.
    pub fn rest(duration: f64) -> Self {
        Self {
            frequency: 0.0,
            duration,
            name: None,
            is_rest: true,
        }
    }

    /// Attach a display label.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Whether this note produces no sound.
    ///
    /// True for explicit rests and for notes whose frequency is 0.
    pub fn is_silent(&self) -> bool {
        self.is_rest || self.frequency == 0.0
    }
}

/// An ordered sequence of notes with tempo and pass-through metadata.
///
/// The upstream generator range-validates the numeric fields before the
/// sequence reaches the core; the scheduler and exporters re-check only the
/// invariants that would corrupt scheduling or output (see
/// [`crate::validation`]).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sequence {
    /// Title of the piece (opaque).
    #[serde(default)]
    pub title: String,
    /// Key description (opaque), e.g. "A minor".
    #[serde(default)]
    pub key: String,
    /// Tempo in beats per minute (60-200 by upstream contract).
    pub tempo_bpm: f64,
    /// The notes, in playback order.
    pub notes: Vec<Note>,
}

impl Sequence {
    /// Create an empty sequence at the given tempo.
    pub fn new(tempo_bpm: f64) -> Self {
        Self {
            title: String::new(),
            key: String::new(),
            tempo_bpm,
            notes: Vec::new(),
        }
    }

    /// Set the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set the key description.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Append a note.
    pub fn with_note(mut self, note: Note) -> Self {
        self.notes.push(note);
        self
    }

    /// Number of notes (rests included).
    pub fn len(&self) -> usize {
        self.notes.len()
    }

    /// Whether the sequence has no notes.
    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Total duration in seconds (sum of all note durations).
    pub fn total_duration(&self) -> f64 {
        self.notes.iter().map(|n| n.duration).sum()
    }

    /// Cumulative start offset of each note, in seconds.
    ///
    /// `offsets()[i]` is the prefix sum of the durations of notes `0..i`;
    /// rests contribute to the offsets exactly like pitched notes.
    pub fn start_offsets(&self) -> Vec<f64> {
        let mut offsets = Vec::with_capacity(self.notes.len());
        let mut cursor = 0.0;
        for note in &self.notes {
            offsets.push(cursor);
            cursor += note.duration;
        }
        offsets
    }
}

/// Amplitude envelope settings, owned by the caller.
///
/// `attack`, `decay` and `release` are in seconds; `sustain` is a level in
/// 0-1. The settings are read once per playback start and never change
/// mid-note.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeParams {
    pub attack: f64,
    pub decay: f64,
    pub sustain: f64,
    pub release: f64,
}

impl Default for EnvelopeParams {
    fn default() -> Self {
        Self {
            attack: 0.01,
            decay: 0.05,
            sustain: 0.7,
            release: 0.05,
        }
    }
}
