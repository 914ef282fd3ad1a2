use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

/// Top-level recorder state.
///
/// State transitions:
/// ```text
///        start-record            stop-record / overflow
/// idle ──────────────→ recording ───────────────────────→ idle
///   │        play                  playback finished
///   └──────────────────→ playing ───────────────────────→ idle
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemState {
    Idle,
    Recording,
    Playing,
}

impl SystemState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_recording(&self) -> bool {
        matches!(self, Self::Recording)
    }

    pub fn is_playing(&self) -> bool {
        matches!(self, Self::Playing)
    }
}

impl fmt::Display for SystemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Recording => f.write_str("recording"),
            Self::Playing => f.write_str("playing"),
        }
    }
}

/// Snapshot of the observable state flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateFlags {
    pub state: SystemState,
    /// Set when the last capture has been handed to storage.
    pub record_done: bool,
    /// Set when the last playback session ended (successfully or not).
    pub playback_done: bool,
}

impl Default for StateFlags {
    fn default() -> Self {
        Self {
            state: SystemState::Idle,
            record_done: false,
            playback_done: false,
        }
    }
}

/// Shared state flags. Only the control state machine holds the writable
/// handle; pipelines receive a [`StateView`].
#[derive(Debug, Clone, Default)]
pub(crate) struct SharedState {
    inner: Arc<RwLock<StateFlags>>,
}

impl SharedState {
    pub(crate) fn snapshot(&self) -> StateFlags {
        *self.inner.read()
    }

    pub(crate) fn update(&self, f: impl FnOnce(&mut StateFlags)) -> StateFlags {
        let mut flags = self.inner.write();
        f(&mut flags);
        *flags
    }

    pub(crate) fn view(&self) -> StateView {
        StateView {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Read-only view of the recorder state.
#[derive(Debug, Clone)]
pub struct StateView {
    inner: Arc<RwLock<StateFlags>>,
}

impl StateView {
    pub fn flags(&self) -> StateFlags {
        *self.inner.read()
    }

    pub fn state(&self) -> SystemState {
        self.inner.read().state
    }
}
