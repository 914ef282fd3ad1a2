use crate::models::error::RecorderError;
use crate::models::records::{CaptureEnd, PlaybackOutcome, SaveReport};

/// Notifications from the pipelines to the control state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum RecorderEvent {
    /// The capture source halted and the capture was handed to storage.
    ///
    /// `generation` identifies the capture; it grows by one per start-record.
    CaptureCompleted {
        generation: u64,
        end: CaptureEnd,
        sample_count: usize,
    },
    RecordingSaved(SaveReport),
    SaveFailed(RecorderError),
    PlaybackFinished(PlaybackOutcome),
}
