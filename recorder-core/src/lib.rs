//! # recorder-core
//!
//! Streaming core of a PCM recorder/player.
//!
//! Captures interleaved 16-bit audio into a fixed buffer, writes it to a byte
//! store as a WAV file, and plays WAV files back through a ping-pong pair of
//! chunk buffers. Hardware and storage plug in through the `CaptureSource`,
//! `PlaybackSink` and `ByteStore` traits; `Recorder` drives everything.
//!
//! ## Architecture
//!
//! ```text
//! recorder-core (this crate)
//! ├── traits/       ← CaptureSource, PlaybackSink, ByteStore, RecorderDelegate
//! ├── models/       ← RecorderError, SystemState, RecorderConfig, reports
//! ├── processing/   ← WAV header codec, CaptureBuffer, PlaybackCursor
//! ├── session/      ← capture pipeline, playback reader/feeder, Recorder
//! └── storage/      ← file naming, WAV writer, in-memory store
//! ```

pub mod models;
pub mod processing;
pub mod session;
pub mod storage;
pub mod traits;

#[cfg(test)]
mod testing;

// Re-export key types at crate root for convenience.
pub use models::config::{NamingConfig, NamingScheme, RecorderConfig, TimeSource};
pub use models::error::{RecorderError, StoreError, WavError};
pub use models::records::{
    BufferId, CaptureEnd, ChunkTrace, CompletedCapture, FileEntry, PlaybackAbort, PlaybackOutcome, PlaybackReport,
    SaveReport,
};
pub use models::state::{StateFlags, StateView, SystemState};
pub use processing::capture_buffer::CaptureBuffer;
pub use processing::playback_cursor::PlaybackCursor;
pub use processing::wav_format::{decode_header, encode_header, DecodedHeader, ExpectedFormat, WavHeader, WAV_HEADER_SIZE};
pub use session::command::{Command, CommandOutcome, USAGE};
pub use session::events::RecorderEvent;
pub use session::recorder::Recorder;
pub use storage::memory_store::{MemoryStore, StoreFaults};
pub use storage::naming::{AvailableName, FileNamer};
pub use traits::byte_store::{ByteStore, OpenMode, StoreFile};
pub use traits::capture_source::CaptureSource;
pub use traits::playback_sink::PlaybackSink;
pub use traits::recorder_delegate::RecorderDelegate;
