//! Playback scheduling engine.
//!
//! The [`PlaybackScheduler`] owns the single logical playback timeline. It
//! converts a [`Sequence`] into a batch of time-stamped voices, hands the
//! batch to the [`AudioEngine`] in one atomic pass, and drives a periodic
//! reporter tick that publishes progress into the shared
//! [`StateManager`](crate::state::StateManager), reaps finished voices and
//! detects natural completion.
//!
//! Lifecycle: `Idle -> Playing -> (Stopped | Completed)`, with
//! `Playing <-> Paused` preserving the cumulative position so that resume
//! continues mid-note rather than restarting it.
//!
//! The reporter is the only polling loop in the system. It runs on its own
//! thread with a bounded tick interval and terminates itself the moment
//! playback is stopped, paused or complete, so no perpetual timer is ever
//! leaked. Actual audio timing never depends on the reporter: voices are
//! scheduled at absolute positions on the engine's sample clock up front.

use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};

use crate::engine::{AudioEngine, VoicePlan};
use crate::envelope::EnvelopeCurve;
use crate::error::{Error, Result};
use crate::score::{EnvelopeParams, Sequence};
use crate::state::StateManager;
use crate::timing::TransportClock;
use crate::validation;
use crate::voice::Waveform;

/// Reporter tick interval. A tuning parameter, not a contract; progress
/// observers see updates at least this often.
const REPORT_INTERVAL: Duration = Duration::from_millis(50);

/// Lifecycle phase of the scheduler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackPhase {
    /// No sequence has been started yet.
    Idle,
    /// A run is sounding.
    Playing,
    /// A run is frozen mid-sequence.
    Paused,
    /// The last run was cancelled.
    Stopped,
    /// The last run played to its end.
    Completed,
}

/// Precomputed timeline of one run: per-note start offsets and durations.
#[derive(Clone, Debug)]
struct Timeline {
    offsets: Vec<f64>,
    total: f64,
}

impl Timeline {
    fn from_sequence(sequence: &Sequence) -> Self {
        Self {
            offsets: sequence.start_offsets(),
            total: sequence.total_duration(),
        }
    }

    /// Index of the note whose `[offset, offset + duration)` window contains
    /// `elapsed`. An instant exactly on a boundary belongs to the note being
    /// entered. `None` once the timeline is exhausted.
    fn note_index_at(&self, elapsed: f64) -> Option<usize> {
        if self.offsets.is_empty() || elapsed >= self.total {
            return None;
        }
        let idx = self.offsets.partition_point(|&offset| offset <= elapsed);
        Some(idx.saturating_sub(1))
    }
}

/// Handle to a running reporter thread.
struct Reporter {
    shutdown_tx: Sender<()>,
    handle: JoinHandle<()>,
}

/// The playback scheduler.
///
/// Owns the engine handle, the transport clock and the shared playback
/// state; it is the state's only writer.
pub struct PlaybackScheduler {
    engine: AudioEngine,
    state: StateManager,
    clock: TransportClock,
    phase: PlaybackPhase,
    envelope: EnvelopeParams,
    waveform: Waveform,
    current: Option<(Sequence, Timeline)>,
    reporter: Option<Reporter>,
}

impl PlaybackScheduler {
    /// Create a scheduler around an explicitly constructed engine handle.
    pub fn new(engine: AudioEngine) -> Self {
        Self {
            engine,
            state: StateManager::new(),
            clock: TransportClock::new(),
            phase: PlaybackPhase::Idle,
            envelope: EnvelopeParams::default(),
            waveform: Waveform::default(),
            current: None,
            reporter: None,
        }
    }

    /// Set the envelope used for subsequent runs. Read once per `start()`;
    /// never applied mid-note.
    pub fn set_envelope(&mut self, params: EnvelopeParams) {
        self.envelope = params;
    }

    /// Set the oscillator waveform for subsequent runs.
    pub fn set_waveform(&mut self, waveform: Waveform) {
        self.waveform = waveform;
    }

    /// A read handle onto the shared playback state.
    pub fn state(&self) -> StateManager {
        self.state.clone()
    }

    /// The engine handle (read-only access, e.g. voice counts).
    pub fn engine(&self) -> &AudioEngine {
        &self.engine
    }

    /// Current lifecycle phase.
    pub fn phase(&mut self) -> PlaybackPhase {
        self.refresh_phase();
        self.phase
    }

    /// Start playing a sequence.
    ///
    /// Fails with [`Error::AlreadyPlaying`] unless the scheduler is idle,
    /// stopped or completed, with [`Error::MalformedSequence`] if the
    /// defensive checks reject the input (no voice is scheduled in that
    /// case and the published state keeps its last-known-good value), and
    /// with [`Error::EngineUnavailable`] if the sound subsystem cannot be
    /// brought up.
    pub fn start(&mut self, sequence: &Sequence) -> Result<()> {
        self.refresh_phase();
        if matches!(self.phase, PlaybackPhase::Playing | PlaybackPhase::Paused) {
            return Err(Error::AlreadyPlaying);
        }

        validation::ensure_playable(sequence)?;
        self.engine.ensure_started()?;

        // A previous run may still hold voices that never fired; the new
        // pass must not overlap with them.
        self.engine.cancel_all();

        let timeline = Timeline::from_sequence(sequence);
        let plans = self.plan_voices(sequence, &timeline, 0.0);
        self.engine.schedule(&plans);

        let now = Instant::now();
        self.clock.start(now);

        let first = if sequence.is_empty() { None } else { Some(0) };
        let total = timeline.total;
        self.state.with_state_write(|s| {
            s.is_playing = true;
            s.current_note = first;
            s.elapsed = 0.0;
            s.total_duration = total;
        });

        self.spawn_reporter(timeline.clone(), now, 0.0);
        self.current = Some((sequence.clone(), timeline));
        self.phase = PlaybackPhase::Playing;
        log::info!(
            "playback started: {} notes, {:.3}s at {} BPM",
            sequence.len(),
            total,
            sequence.tempo_bpm
        );
        Ok(())
    }

    /// Freeze the current run, preserving the cumulative position.
    ///
    /// All engine voices are cancelled; nothing sounds while paused. Calling
    /// `pause` when nothing is playing is a no-op.
    pub fn pause(&mut self) -> Result<()> {
        self.refresh_phase();
        if self.phase != PlaybackPhase::Playing {
            log::debug!("pause ignored: phase is {:?}", self.phase);
            return Ok(());
        }

        let now = Instant::now();
        self.stop_reporter();
        self.engine.cancel_all();
        self.clock.pause(now);

        let elapsed = self.clock.elapsed_at(now);
        let index = self
            .current
            .as_ref()
            .and_then(|(_, timeline)| timeline.note_index_at(elapsed));
        self.state.with_state_write(|s| {
            s.is_playing = false;
            s.current_note = index;
            s.elapsed = elapsed;
        });
        self.phase = PlaybackPhase::Paused;
        log::info!("playback paused at {elapsed:.3}s");
        Ok(())
    }

    /// Resume a paused run from its frozen position.
    ///
    /// The remaining tail of the sequence is re-planned; a note that was
    /// interrupted mid-curve continues with an envelope time offset instead
    /// of restarting. Calling `resume` when not paused is a no-op.
    pub fn resume(&mut self) -> Result<()> {
        self.refresh_phase();
        if self.phase != PlaybackPhase::Paused {
            log::debug!("resume ignored: phase is {:?}", self.phase);
            return Ok(());
        }
        let Some((sequence, timeline)) = self.current.clone() else {
            return Ok(());
        };

        let now = Instant::now();
        let elapsed = self.clock.elapsed_at(now);
        let plans = self.plan_voices(&sequence, &timeline, elapsed);
        self.engine.schedule(&plans);
        self.clock.resume(now);

        let index = timeline.note_index_at(elapsed);
        self.state.with_state_write(|s| {
            s.is_playing = true;
            s.current_note = index;
            s.elapsed = elapsed;
        });
        self.spawn_reporter(timeline, now, elapsed);
        self.phase = PlaybackPhase::Playing;
        log::info!("playback resumed at {elapsed:.3}s");
        Ok(())
    }

    /// Cancel the current run immediately.
    ///
    /// Every live and pending voice is removed before this returns; the
    /// published state resets to idle. Stopping when nothing is playing is a
    /// no-op.
    pub fn stop(&mut self) {
        self.stop_reporter();
        self.engine.cancel_all();
        self.clock.stop();
        self.state.with_state_write(|s| {
            s.is_playing = false;
            s.current_note = None;
            s.elapsed = 0.0;
        });
        self.phase = PlaybackPhase::Stopped;
        log::info!("playback stopped");
    }

    /// Plan one voice per non-rest note whose window ends after `from`.
    ///
    /// Rests contribute only to the offsets. When `from` falls inside a
    /// note, that note is planned with its remaining duration and an
    /// envelope offset so its curve continues where it was interrupted.
    fn plan_voices(&self, sequence: &Sequence, timeline: &Timeline, from: f64) -> Vec<VoicePlan> {
        let mut plans = Vec::new();
        for (i, note) in sequence.notes.iter().enumerate() {
            if note.is_silent() {
                continue;
            }
            let offset = timeline.offsets[i];
            let end = offset + note.duration;
            if end <= from {
                continue;
            }
            let envelope = EnvelopeCurve::plan(&self.envelope, note.duration);
            if offset >= from {
                plans.push(VoicePlan {
                    frequency: note.frequency,
                    start_offset: offset - from,
                    duration: note.duration,
                    envelope,
                    envelope_offset: 0.0,
                    waveform: self.waveform,
                });
            } else {
                plans.push(VoicePlan {
                    frequency: note.frequency,
                    start_offset: 0.0,
                    duration: end - from,
                    envelope,
                    envelope_offset: from - offset,
                    waveform: self.waveform,
                });
            }
        }
        plans
    }

    /// Pick up a completion published by the reporter thread.
    fn refresh_phase(&mut self) {
        if self.phase == PlaybackPhase::Playing && !self.state.is_playing() {
            self.phase = PlaybackPhase::Completed;
            self.stop_reporter();
        }
    }

    fn spawn_reporter(&mut self, timeline: Timeline, epoch: Instant, base_elapsed: f64) {
        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);
        let state = self.state.clone();
        let engine_shared = self.engine.shared();
        let handle = thread::spawn(move || {
            run_reporter(
                shutdown_rx,
                state,
                engine_shared,
                timeline,
                epoch,
                base_elapsed,
            );
        });
        self.reporter = Some(Reporter {
            shutdown_tx,
            handle,
        });
    }

    fn stop_reporter(&mut self) {
        if let Some(reporter) = self.reporter.take() {
            // Dropping the sender disconnects the channel and wakes the
            // reporter immediately.
            drop(reporter.shutdown_tx);
            let _ = reporter.handle.join();
        }
    }
}

impl Drop for PlaybackScheduler {
    fn drop(&mut self) {
        self.stop_reporter();
        self.engine.cancel_all();
    }
}

impl std::fmt::Debug for PlaybackScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackScheduler")
            .field("phase", &self.phase)
            .field("state", &self.state.snapshot())
            .finish()
    }
}

/// Reporter loop: publish progress, reap finished voices, detect natural
/// completion. Terminates on shutdown signal or when the timeline runs out.
fn run_reporter(
    shutdown_rx: Receiver<()>,
    state: StateManager,
    engine_shared: std::sync::Arc<std::sync::Mutex<crate::engine::EngineShared>>,
    timeline: Timeline,
    epoch: Instant,
    base_elapsed: f64,
) {
    loop {
        match shutdown_rx.recv_timeout(REPORT_INTERVAL) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                let elapsed = base_elapsed + epoch.elapsed().as_secs_f64();

                if elapsed >= timeline.total {
                    if let Ok(mut shared) = engine_shared.lock() {
                        shared.reap_finished();
                    }
                    state.with_state_write(|s| {
                        s.is_playing = false;
                        s.current_note = None;
                        s.elapsed = 0.0;
                    });
                    log::debug!("playback completed after {:.3}s", timeline.total);
                    break;
                }

                let index = timeline.note_index_at(elapsed);
                state.with_state_write(|s| {
                    s.elapsed = elapsed;
                    s.current_note = index;
                });
                if let Ok(mut shared) = engine_shared.lock() {
                    shared.reap_finished();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::Note;

    fn scheduler() -> PlaybackScheduler {
        PlaybackScheduler::new(AudioEngine::noop())
    }

    fn three_notes() -> Sequence {
        Sequence::new(120.0)
            .with_note(Note::new(440.0, 0.5))
            .with_note(Note::new(494.0, 0.25))
            .with_note(Note::new(523.25, 0.75))
    }

    fn long_sequence() -> Sequence {
        Sequence::new(120.0)
            .with_note(Note::new(440.0, 10.0))
            .with_note(Note::new(523.25, 10.0))
    }

    #[test]
    fn test_note_index_windows() {
        let timeline = Timeline::from_sequence(&three_notes());
        assert_eq!(timeline.note_index_at(0.0), Some(0));
        assert_eq!(timeline.note_index_at(0.3), Some(0));
        assert_eq!(timeline.note_index_at(0.6), Some(1));
        assert_eq!(timeline.note_index_at(1.0), Some(2));
        assert_eq!(timeline.note_index_at(1.5), None);
        assert_eq!(timeline.note_index_at(99.0), None);
    }

    #[test]
    fn test_boundary_belongs_to_entered_note() {
        let timeline = Timeline::from_sequence(&three_notes());
        assert_eq!(timeline.note_index_at(0.5), Some(1));
        assert_eq!(timeline.note_index_at(0.75), Some(2));
    }

    #[test]
    fn test_start_schedules_only_non_rest_notes() {
        let mut scheduler = scheduler();
        let sequence = Sequence::new(120.0)
            .with_note(Note::new(440.0, 10.0))
            .with_note(Note::rest(10.0))
            .with_note(Note::new(523.25, 10.0));
        scheduler.start(&sequence).unwrap();
        assert_eq!(scheduler.engine().active_voices(), 2);
        scheduler.stop();
    }

    #[test]
    fn test_second_start_rejected_while_playing() {
        let mut scheduler = scheduler();
        scheduler.start(&long_sequence()).unwrap();
        let err = scheduler.start(&long_sequence()).unwrap_err();
        assert!(matches!(err, Error::AlreadyPlaying));
        scheduler.stop();
    }

    #[test]
    fn test_stop_immediately_after_start() {
        let mut scheduler = scheduler();
        scheduler.start(&long_sequence()).unwrap();
        scheduler.stop();

        assert_eq!(scheduler.engine().active_voices(), 0);
        let state = scheduler.state().snapshot();
        assert!(!state.is_playing);
        assert_eq!(state.current_note, None);
        assert_eq!(state.elapsed, 0.0);
        assert_eq!(scheduler.phase(), PlaybackPhase::Stopped);
    }

    #[test]
    fn test_restart_after_stop_is_allowed() {
        let mut scheduler = scheduler();
        scheduler.start(&long_sequence()).unwrap();
        scheduler.stop();
        scheduler.start(&long_sequence()).unwrap();
        assert_eq!(scheduler.phase(), PlaybackPhase::Playing);
        scheduler.stop();
    }

    #[test]
    fn test_malformed_sequence_leaves_state_untouched() {
        let mut scheduler = scheduler();
        let before = scheduler.state().snapshot();

        let bad = Sequence::new(120.0).with_note(Note::new(440.0, -1.0));
        let err = scheduler.start(&bad).unwrap_err();
        assert!(matches!(err, Error::MalformedSequence(_)));

        assert_eq!(scheduler.state().snapshot(), before);
        assert_eq!(scheduler.engine().active_voices(), 0);
        assert_eq!(scheduler.phase(), PlaybackPhase::Idle);
    }

    #[test]
    fn test_progress_reports_mid_sequence_index() {
        let mut scheduler = scheduler();
        scheduler.start(&three_notes()).unwrap();

        // At ~0.6s into [0.5, 0.25, 0.75] the second note is sounding.
        std::thread::sleep(Duration::from_millis(620));
        let state = scheduler.state().snapshot();
        assert!(state.is_playing);
        assert_eq!(state.current_note, Some(1));
        scheduler.stop();
    }

    #[test]
    fn test_natural_completion() {
        let mut scheduler = scheduler();
        let sequence = Sequence::new(120.0)
            .with_note(Note::new(440.0, 0.05))
            .with_note(Note::new(523.25, 0.05));
        scheduler.start(&sequence).unwrap();

        std::thread::sleep(Duration::from_millis(400));
        let state = scheduler.state().snapshot();
        assert!(!state.is_playing);
        assert_eq!(state.current_note, None);
        assert_eq!(scheduler.phase(), PlaybackPhase::Completed);

        // A completed scheduler accepts a new run.
        scheduler.start(&long_sequence()).unwrap();
        scheduler.stop();
    }

    #[test]
    fn test_pause_preserves_position_and_silences_voices() {
        let mut scheduler = scheduler();
        scheduler.start(&long_sequence()).unwrap();

        std::thread::sleep(Duration::from_millis(300));
        scheduler.pause().unwrap();
        assert_eq!(scheduler.phase(), PlaybackPhase::Paused);
        assert_eq!(scheduler.engine().active_voices(), 0);

        let frozen = scheduler.state().snapshot();
        assert!(!frozen.is_playing);
        assert!(frozen.elapsed > 0.1 && frozen.elapsed < 5.0);
        assert_eq!(frozen.current_note, Some(0));

        // Position does not advance while paused.
        std::thread::sleep(Duration::from_millis(200));
        assert_eq!(scheduler.state().snapshot().elapsed, frozen.elapsed);

        scheduler.resume().unwrap();
        std::thread::sleep(Duration::from_millis(200));
        let resumed = scheduler.state().snapshot();
        assert!(resumed.is_playing);
        assert!(resumed.elapsed > frozen.elapsed);
        scheduler.stop();
    }

    #[test]
    fn test_resume_replans_tail_mid_note() {
        let mut scheduler = scheduler();
        let sequence = long_sequence();
        let timeline = Timeline::from_sequence(&sequence);

        // Pause 2s into the first 10s note: the in-flight note resumes with
        // its remaining duration and an envelope offset, the second note
        // keeps its relative distance.
        let plans = scheduler.plan_voices(&sequence, &timeline, 2.0);
        assert_eq!(plans.len(), 2);
        assert_eq!(plans[0].start_offset, 0.0);
        assert!((plans[0].duration - 8.0).abs() < 1e-9);
        assert!((plans[0].envelope_offset - 2.0).abs() < 1e-9);
        assert!((plans[1].start_offset - 8.0).abs() < 1e-9);
        assert_eq!(plans[1].envelope_offset, 0.0);
    }

    #[test]
    fn test_empty_sequence_completes() {
        let mut scheduler = scheduler();
        scheduler.start(&Sequence::new(120.0)).unwrap();
        std::thread::sleep(Duration::from_millis(200));
        assert_eq!(scheduler.phase(), PlaybackPhase::Completed);
    }

    #[test]
    fn test_pause_when_idle_is_a_noop() {
        let mut scheduler = scheduler();
        scheduler.pause().unwrap();
        scheduler.resume().unwrap();
        assert_eq!(scheduler.phase(), PlaybackPhase::Idle);
    }
}
