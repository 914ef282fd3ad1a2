use thiserror::Error;

/// Errors produced by the recorder core.
///
/// Every variant is recoverable at the process level: the control state
/// machine reports it and returns to idle.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecorderError {
    #[error("invalid sound file: {0}")]
    Validation(#[from] WavError),

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("no available file name after {attempts} attempts")]
    NamingExhausted { attempts: u32 },

    #[error("'{command}' is not valid while {state}")]
    InvalidState { command: String, state: String },

    #[error("{0}")]
    Usage(String),

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),

    #[error("capture failed: {0}")]
    Capture(String),

    #[error("playback failed: {0}")]
    Playback(String),
}

/// Container header encode/decode failures.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum WavError {
    #[error("missing RIFF tag")]
    InvalidRiff,

    #[error("missing WAVE tag")]
    InvalidWave,

    #[error("only uncompressed PCM is supported (format {0})")]
    UnsupportedFormat(u16),

    #[error("expected {expected} channels, found {found}")]
    ChannelMismatch { expected: u16, found: u16 },

    #[error("expected {expected}-bit samples, found {found}-bit")]
    BitDepthMismatch { expected: u16, found: u16 },

    #[error("invalid channel count: {0} (must be 1-8)")]
    InvalidChannelCount(u16),

    #[error("unsupported bits per sample: {0} (must be 8 or 16)")]
    UnsupportedBitDepth(u16),

    #[error("payload does not fit in a 32-bit size field")]
    PayloadTooLarge,

    #[error("header truncated ({0} of 44 bytes)")]
    Truncated(usize),
}

/// Byte Store failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("file not found: {0}")]
    NotFound(String),

    #[error("file already open for writing: {0}")]
    AlreadyOpen(String),

    #[error("i/o error: {0}")]
    Io(String),

    #[error("short write ({written} of {expected} bytes)")]
    ShortWrite { expected: usize, written: usize },

    #[error("file handle is closed")]
    Closed,
}

impl StoreError {
    /// Whether this is the "name does not exist" failure the naming policy
    /// relies on.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
