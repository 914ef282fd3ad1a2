use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::error::RecorderError;
use crate::processing::capture_buffer::CaptureBuffer;

/// Why a capture ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureEnd {
    /// stop-record was issued.
    Stopped,
    /// The buffer filled up and the capture stopped itself.
    Overflow,
}

/// A finished capture, handed from the capture pipeline to storage exactly once.
///
/// The capture source is halted before this is created, so the referenced
/// buffer is read-only from here on.
#[derive(Debug, Clone)]
pub struct CompletedCapture {
    pub buffer: Arc<CaptureBuffer>,
    /// Total samples, both channels counted.
    pub sample_count: usize,
    pub sample_rate: u32,
    pub channels: u16,
    pub end: CaptureEnd,
}

impl CompletedCapture {
    pub fn samples_per_channel(&self) -> usize {
        self.sample_count / self.channels as usize
    }

    pub fn duration_secs(&self) -> f64 {
        self.samples_per_channel() as f64 / self.sample_rate as f64
    }
}

/// Result of persisting a capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveReport {
    pub id: String,
    pub file_name: String,
    /// Samples written, both channels counted.
    pub sample_count: usize,
    pub sample_rate: u32,
    pub channels: u16,
    /// Header plus payload.
    pub bytes_written: u64,
    pub duration_secs: f64,
    pub created_at: String,
    /// SHA-256 of every byte written, hex encoded.
    pub checksum: String,
    pub end: CaptureEnd,
}

/// Which of the two playback chunk buffers a chunk lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BufferId {
    Ping,
    Pong,
}

impl BufferId {
    pub fn other(self) -> Self {
        match self {
            Self::Ping => Self::Pong,
            Self::Pong => Self::Ping,
        }
    }
}

/// One chunk as seen by the feeder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkTrace {
    pub buffer: BufferId,
    pub samples: usize,
    pub is_last: bool,
}

/// Summary of a completed playback session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackReport {
    pub file_name: String,
    /// Total samples declared by the header, both channels counted.
    pub declared_samples: usize,
    /// Samples fed to the sink.
    pub samples_played: usize,
    /// Chunks in delivery order.
    pub chunks: Vec<ChunkTrace>,
}

impl PlaybackReport {
    pub fn buffer_sequence(&self) -> Vec<BufferId> {
        self.chunks.iter().map(|c| c.buffer).collect()
    }
}

/// Reason a playback session aborted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackAbort {
    Timeout(String),
    ReadError(RecorderError),
    ValidationError(RecorderError),
    Cancelled,
}

impl PlaybackAbort {
    pub fn into_error(self) -> RecorderError {
        match self {
            Self::Timeout(what) => RecorderError::Timeout(what),
            Self::ReadError(e) | Self::ValidationError(e) => e,
            Self::Cancelled => RecorderError::Playback("cancelled".into()),
        }
    }
}

/// Terminal outcome of a playback session. Every session ends in exactly one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackOutcome {
    Completed(PlaybackReport),
    Aborted(PlaybackAbort),
}

impl PlaybackOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

/// A stored recording found by `list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    pub size_bytes: u64,
}
