//! Error types for aria-core.

use thiserror::Error;

/// Result type alias for aria-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in aria-core
#[derive(Debug, Error)]
pub enum Error {
    /// A pitch string did not match `<letter>[#|b]<octave>`
    #[error("Invalid note name: {0}")]
    InvalidNoteName(String),

    /// `start()` was called while a playback run is active
    #[error("Playback is already running")]
    AlreadyPlaying,

    /// The sound subsystem failed to initialize
    #[error("Audio engine unavailable: {0}")]
    EngineUnavailable(String),

    /// A sequence failed the defensive pre-scheduling checks
    #[error("Malformed sequence: {0}")]
    MalformedSequence(String),

    /// An export was rejected as a whole rather than emitting a corrupt buffer
    #[error("Export rejected: {0}")]
    ExportRejected(String),

    /// WAV writing error
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
}
