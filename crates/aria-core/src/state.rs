//! Playback state and thread-safe access to it.
//!
//! [`PlaybackState`] is the single cross-component shared value: the
//! scheduler (and its reporter tick) is its only writer, while the UI layer
//! and any other observers read snapshots through a [`StateManager`] clone.
//! Readers are never handed a mutable reference.

use std::sync::{Arc, RwLock};

/// Snapshot of the current playback position.
#[derive(Clone, Debug, PartialEq)]
pub struct PlaybackState {
    /// Whether a playback run is currently sounding.
    pub is_playing: bool,
    /// Index of the note whose time window contains the elapsed time;
    /// `None` when idle, stopped or completed.
    pub current_note: Option<usize>,
    /// Elapsed playback time in seconds, measured from the monotonic clock
    /// captured at `start()`.
    pub elapsed: f64,
    /// Total duration of the sequence being played, in seconds.
    pub total_duration: f64,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackState {
    /// Create an idle state.
    pub fn new() -> Self {
        Self {
            is_playing: false,
            current_note: None,
            elapsed: 0.0,
            total_duration: 0.0,
        }
    }
}

/// Thread-safe manager for the shared playback state.
///
/// Cloning a StateManager clones the handle, not the state: all clones read
/// the same underlying value. Write access is crate-private, which keeps the
/// single-writer invariant enforceable at the API boundary.
#[derive(Clone)]
pub struct StateManager {
    state: Arc<RwLock<PlaybackState>>,
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

impl StateManager {
    /// Create a manager holding an idle state.
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(PlaybackState::new())),
        }
    }

    /// Read the state with a closure.
    pub fn with_state_read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&PlaybackState) -> R,
    {
        let state = self.state.read().expect("State lock poisoned");
        f(&state)
    }

    /// Write to the state with a closure. Scheduler-only.
    pub(crate) fn with_state_write<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut PlaybackState) -> R,
    {
        let mut state = self.state.write().expect("State lock poisoned");
        f(&mut state)
    }

    /// Get a copy of the current state.
    pub fn snapshot(&self) -> PlaybackState {
        self.with_state_read(|s| s.clone())
    }

    /// Whether a playback run is currently sounding.
    pub fn is_playing(&self) -> bool {
        self.with_state_read(|s| s.is_playing)
    }

    /// Index of the note currently sounding, if any.
    pub fn current_note(&self) -> Option<usize> {
        self.with_state_read(|s| s.current_note)
    }

    /// Elapsed playback seconds.
    pub fn elapsed(&self) -> f64 {
        self.with_state_read(|s| s.elapsed)
    }
}

impl std::fmt::Debug for StateManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateManager")
            .field("state", &self.snapshot())
            .finish()
    }
}
