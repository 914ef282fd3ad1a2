use std::sync::Arc;

use crate::models::error::RecorderError;
use crate::processing::playback_cursor::PlaybackCursor;

/// A consumer of interleaved 16-bit samples at a fixed rate, typically an
/// audio output driver.
///
/// While started, the sink repeatedly pulls from the cursor with
/// [`PlaybackCursor::drain_into`] and emits silence whenever nothing is active.
pub trait PlaybackSink: Send {
    fn start(&mut self, cursor: Arc<PlaybackCursor>) -> Result<(), RecorderError>;

    fn stop(&mut self) -> Result<(), RecorderError>;
}
