use crate::models::error::RecorderError;
use crate::models::records::{CaptureEnd, PlaybackOutcome, SaveReport};
use crate::models::state::SystemState;

/// Event delegate for recorder notifications.
///
/// All methods are called from the thread driving the recorder (the one
/// calling `handle`, `run` or `poll_events`), never from a pipeline thread.
/// Implementations should marshal elsewhere if they do real work.
pub trait RecorderDelegate: Send + Sync {
    /// Called on every state transition.
    fn on_state_changed(&self, state: SystemState);

    /// Called when a capture has been handed to storage.
    fn on_capture_completed(&self, _end: CaptureEnd, _sample_count: usize) {}

    /// Called when a recording has been written and closed.
    fn on_recording_saved(&self, report: &SaveReport);

    /// Called once per playback session.
    fn on_playback_finished(&self, _outcome: &PlaybackOutcome) {}

    /// Called when a pipeline failed in the background.
    fn on_error(&self, error: &RecorderError);
}
