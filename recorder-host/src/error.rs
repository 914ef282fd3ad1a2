use recorder_core::RecorderError;
use thiserror::Error;

/// Errors raised while setting up the host front end.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Recorder(#[from] RecorderError),

    #[error("invalid store directory {path}: {reason}")]
    InvalidStore { path: String, reason: String },

    #[error("failed to spawn {0} thread")]
    Spawn(String),
}
