use std::sync::Arc;

use crate::models::error::RecorderError;
use crate::processing::capture_buffer::CaptureBuffer;

/// A producer of interleaved 16-bit samples, typically a microphone driver.
///
/// Implemented by:
/// - `SimulatedSource` (recorder-host)
/// - test doubles in this crate
pub trait CaptureSource: Send {
    /// Begin delivering samples into `destination`.
    ///
    /// Deliveries arrive in fixed units of [`delivery_unit`](Self::delivery_unit)
    /// samples on the source's own thread. The buffer drops anything pushed
    /// past its capacity or after it was disarmed.
    fn start(&mut self, destination: Arc<CaptureBuffer>) -> Result<(), RecorderError>;

    /// Halt delivery. No samples may be pushed once this returns.
    fn stop(&mut self) -> Result<(), RecorderError>;

    /// Samples per delivery, all channels counted.
    fn delivery_unit(&self) -> usize;
}
