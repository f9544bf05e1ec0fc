//! Aria Core - Note sequencing, playback and MIDI export.
//!
//! This crate provides the building blocks for playing and serializing
//! musical sequences:
//!
//! - **Score** - Notes, sequences, envelope parameters
//! - **Pitch** - Note-name/frequency conversion in equal temperament
//! - **Envelope** - Per-note amplitude curve planning and evaluation
//! - **Timing** - Monotonic transport clock with pause support
//! - **Scheduler** - Voice scheduling, start/pause/resume/stop, progress
//! - **Engine** - cpal-backed audio output with a silent no-op twin
//! - **MIDI** - Type-0 Standard MIDI File export
//! - **Script** - Line-oriented textual rendering
//! - **Render** - Offline WAV rendering
//!
//! # Architecture
//!
//! A validated [`Sequence`] arrives from an upstream generator. The
//! [`PlaybackScheduler`] prefix-sums note durations into a timeline, plans
//! one voice per pitched note (rests advance time only) and submits the
//! batch to its [`AudioEngine`] at absolute sample positions. A periodic
//! reporter publishes progress into the shared [`PlaybackState`], whose only
//! writer is the scheduler; every other component reads snapshots.
//! Independently, the same sequence can be serialized by [`midi`],
//! [`script`] or [`render`].

pub mod audio_device;
pub mod engine;
pub mod envelope;
pub mod error;
pub mod midi;
pub mod pitch;
pub mod render;
pub mod scheduler;
pub mod score;
pub mod script;
pub mod state;
pub mod timing;
pub mod validation;

mod voice;

// Re-export main types for convenience
pub use audio_device::{default_output_device_name, list_output_devices, OutputDeviceInfo};
pub use engine::{AudioEngine, EngineConfig, VoicePlan};
pub use envelope::EnvelopeCurve;
pub use error::{Error, Result};
pub use midi::sequence_to_midi;
pub use pitch::{frequency_to_midi, frequency_to_name, note_to_frequency, note_to_midi};
pub use render::{render_samples, render_wav, RenderOptions};
pub use scheduler::{PlaybackPhase, PlaybackScheduler};
pub use score::{EnvelopeParams, Note, Sequence};
pub use script::sequence_to_script;
pub use state::{PlaybackState, StateManager};
pub use timing::TransportClock;
pub use validation::{validate_sequence, ValidationIssue, ValidationResult};
pub use voice::Waveform;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_flows_through_every_exporter() {
        let sequence = Sequence::new(120.0)
            .with_title("Smoke")
            .with_note(Note::new(note_to_frequency("A4").unwrap(), 0.5).with_name("A4"))
            .with_note(Note::rest(0.25))
            .with_note(Note::new(note_to_frequency("C5").unwrap(), 0.5));

        let bytes = sequence_to_midi(&sequence).unwrap();
        assert_eq!(&bytes[0..4], b"MThd");

        let script = sequence_to_script(&sequence);
        assert_eq!(script.lines().count(), 1 + sequence.len());

        let samples = render_samples(&sequence, &RenderOptions::default()).unwrap();
        assert!(!samples.is_empty());
    }

    #[test]
    fn test_scheduler_round_trip_with_noop_engine() {
        let mut scheduler = PlaybackScheduler::new(AudioEngine::noop());
        let sequence = Sequence::new(120.0).with_note(Note::new(440.0, 5.0));

        scheduler.start(&sequence).unwrap();
        assert!(scheduler.state().is_playing());
        scheduler.stop();
        assert_eq!(scheduler.engine().active_voices(), 0);
        assert!(!scheduler.state().is_playing());
    }
}
