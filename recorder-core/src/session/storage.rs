use std::sync::Arc;
use std::thread;

use crossbeam_channel::{Receiver, Sender};

use super::events::RecorderEvent;
use crate::models::error::{RecorderError, StoreError};
use crate::models::records::CompletedCapture;
use crate::storage::naming::FileNamer;
use crate::storage::wav_writer;
use crate::traits::byte_store::ByteStore;

/// Spawn the storage writer.
///
/// Persists each completed capture in arrival order and reports the result.
/// Exits when every capture sender has been dropped.
pub(crate) fn spawn_writer<S: ByteStore + ?Sized + 'static>(
    store: Arc<S>,
    namer: FileNamer,
    chunk_bytes: usize,
    captures: Receiver<CompletedCapture>,
    events_tx: Sender<RecorderEvent>,
) -> Result<thread::JoinHandle<()>, RecorderError> {
    thread::Builder::new()
        .name("storage-writer".into())
        .spawn(move || {
            for capture in captures.iter() {
                log::debug!("Saving capture of {} samples", capture.sample_count);
                let event = match wav_writer::save_capture(store.as_ref(), &namer, &capture, chunk_bytes) {
                    Ok(report) => RecorderEvent::RecordingSaved(report),
                    Err(e) => {
                        log::error!("Failed to save recording: {}", e);
                        RecorderEvent::SaveFailed(e)
                    }
                };
                capture.buffer.release();
                if events_tx.send(event).is_err() {
                    log::debug!("Controller is gone; save result not reported");
                }
            }
            log::debug!("Storage writer exiting");
        })
        .map_err(|e| StoreError::Io(format!("failed to spawn storage writer: {}", e)).into())
}
