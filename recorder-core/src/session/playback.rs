use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;

use super::events::RecorderEvent;
use crate::models::config::RecorderConfig;
use crate::models::error::{RecorderError, StoreError};
use crate::models::records::{BufferId, ChunkTrace, PlaybackAbort, PlaybackOutcome, PlaybackReport};
use crate::models::state::StateView;
use crate::processing::playback_cursor::{ChunkBuffer, DrainWait, PlaybackCursor};
use crate::processing::wav_format::{self, ExpectedFormat, WAV_HEADER_SIZE};
use crate::traits::byte_store::{ByteStore, OpenMode, StoreFile};

/// Timing and format parameters for one playback session.
#[derive(Debug, Clone)]
pub struct PlaybackParams {
    pub file_name: String,
    pub expected: ExpectedFormat,
    pub chunk_samples: usize,
    pub handoff_timeout: Duration,
    pub reader_wait_timeout: Duration,
    pub drain_poll: Duration,
    pub drain_max_polls: u32,
}

impl PlaybackParams {
    pub fn from_config(file_name: &str, config: &RecorderConfig) -> Self {
        Self {
            file_name: file_name.to_string(),
            expected: config.expected_format(),
            chunk_samples: config.playback_chunk_samples,
            handoff_timeout: config.handoff_timeout(),
            reader_wait_timeout: config.reader_wait_timeout(),
            drain_poll: config.drain_poll_interval(),
            drain_max_polls: config.drain_max_polls,
        }
    }
}

enum ReaderMessage {
    Header { total_samples: usize },
    Chunk { buffer: ChunkBuffer, samples: usize, is_last: bool },
}

/// First failure recorded by the reader, picked up by the feeder.
type AbortSlot = Arc<Mutex<Option<PlaybackAbort>>>;

/// A running playback session.
///
/// ```text
///            free buffers (Ping, Pong, Ping, ...)
///   ┌──────────────────────────────────────────────┐
///   ↓                                              │
/// [reader] ──{buffer, samples, is_last}──→ [feeder] ──install──→ [PlaybackCursor] ←── sink
/// ```
///
/// The feeder is the only thread that reports the outcome, so every session
/// ends with exactly one [`RecorderEvent::PlaybackFinished`].
pub struct PlaybackSession {
    cursor: Arc<PlaybackCursor>,
    reader: Option<thread::JoinHandle<()>>,
    feeder: Option<thread::JoinHandle<()>>,
}

impl PlaybackSession {
    pub fn start<S: ByteStore + ?Sized + 'static>(
        store: Arc<S>,
        params: PlaybackParams,
        cursor: Arc<PlaybackCursor>,
        state: StateView,
        events_tx: Sender<RecorderEvent>,
    ) -> Result<Self, RecorderError> {
        let (free_tx, free_rx) = bounded::<ChunkBuffer>(2);
        let (chunk_tx, chunk_rx) = bounded::<ReaderMessage>(1);
        let abort_slot: AbortSlot = Arc::new(Mutex::new(None));

        for id in [BufferId::Ping, BufferId::Pong] {
            let _ = free_tx.send(ChunkBuffer::new(id, params.chunk_samples));
        }

        let feeder = {
            let cursor = Arc::clone(&cursor);
            let abort_slot = Arc::clone(&abort_slot);
            let params = params.clone();
            thread::Builder::new()
                .name("playback-feeder".into())
                .spawn(move || {
                    let outcome = run_feeder(&params, &cursor, &chunk_rx, &free_tx, &abort_slot);
                    cursor.finish();
                    match &outcome {
                        PlaybackOutcome::Completed(report) => log::info!(
                            "Finished playing {} ({} samples in {} chunks)",
                            report.file_name,
                            report.samples_played,
                            report.chunks.len()
                        ),
                        PlaybackOutcome::Aborted(reason) => {
                            log::warn!("Playback of {} aborted: {:?}", params.file_name, reason)
                        }
                    }
                    let _ = events_tx.send(RecorderEvent::PlaybackFinished(outcome));
                })
                .map_err(|e| RecorderError::Playback(format!("failed to spawn feeder: {}", e)))?
        };

        let reader = {
            let cursor = Arc::clone(&cursor);
            thread::Builder::new()
                .name("playback-reader".into())
                .spawn(move || {
                    if let Err(abort) = run_reader(store.as_ref(), &params, &free_rx, &chunk_tx, &state, &cursor) {
                        *abort_slot.lock() = Some(abort);
                    }
                })
        };

        match reader {
            Ok(handle) => Ok(Self {
                cursor,
                reader: Some(handle),
                feeder: Some(feeder),
            }),
            Err(e) => {
                // The feeder sees the reader's channel close and reports on its own.
                if feeder.join().is_err() {
                    log::error!("Playback feeder panicked");
                }
                Err(RecorderError::Playback(format!("failed to spawn reader: {}", e)))
            }
        }
    }

    /// Interrupt the session. The feeder still reports an outcome.
    pub fn cancel(&self) {
        self.cursor.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.feeder.as_ref().is_none_or(|h| h.is_finished())
    }

    pub fn join(&mut self) {
        for handle in [self.feeder.take(), self.reader.take()].into_iter().flatten() {
            if handle.join().is_err() {
                log::error!("Playback thread panicked");
            }
        }
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        if !self.is_finished() {
            self.cancel();
        }
        self.join();
    }
}

fn run_reader<S: ByteStore + ?Sized>(
    store: &S,
    params: &PlaybackParams,
    free_rx: &Receiver<ChunkBuffer>,
    chunk_tx: &Sender<ReaderMessage>,
    state: &StateView,
    cursor: &PlaybackCursor,
) -> Result<(), PlaybackAbort> {
    let mut file = store
        .open(&params.file_name, OpenMode::Read)
        .map_err(|e| PlaybackAbort::ReadError(e.into()))?;

    let result = stream_file(file.as_mut(), params, free_rx, chunk_tx, state, cursor);
    if let Err(e) = file.close() {
        log::warn!("Failed to close {}: {}", params.file_name, e);
    }
    result
}

fn stream_file(
    file: &mut dyn StoreFile,
    params: &PlaybackParams,
    free_rx: &Receiver<ChunkBuffer>,
    chunk_tx: &Sender<ReaderMessage>,
    state: &StateView,
    cursor: &PlaybackCursor,
) -> Result<(), PlaybackAbort> {
    let mut header = [0u8; WAV_HEADER_SIZE];
    let got = file
        .read_full(&mut header)
        .map_err(|e| PlaybackAbort::ReadError(e.into()))?;
    let decoded = wav_format::decode_header(&header[..got], &params.expected)
        .map_err(|e| PlaybackAbort::ValidationError(e.into()))?;
    log::debug!(
        "Playing {}: {} Hz, {} channels, {} samples",
        params.file_name,
        decoded.header.sample_rate,
        decoded.header.channels,
        decoded.total_samples
    );

    send(
        chunk_tx,
        ReaderMessage::Header {
            total_samples: decoded.total_samples,
        },
        params.handoff_timeout,
    )?;

    let mut remaining = decoded.total_samples;
    let mut bytes = vec![0u8; params.chunk_samples * 2];
    while remaining > 0 {
        if !state.state().is_playing() || cursor.is_cancelled() {
            return Err(PlaybackAbort::Cancelled);
        }

        let mut buffer = match free_rx.recv_timeout(params.reader_wait_timeout) {
            Ok(buffer) => buffer,
            Err(RecvTimeoutError::Timeout) => {
                return Err(PlaybackAbort::Timeout("no free playback buffer".into()));
            }
            Err(RecvTimeoutError::Disconnected) => return Err(PlaybackAbort::Cancelled),
        };

        let want = remaining.min(buffer.capacity());
        let got = file
            .read_full(&mut bytes[..want * 2])
            .map_err(|e| PlaybackAbort::ReadError(e.into()))?;
        let samples = wav_format::le_bytes_to_samples(&bytes[..got], buffer.as_mut_slice());
        if samples == 0 {
            return Err(PlaybackAbort::ReadError(
                StoreError::Io(format!("{} ended {} samples early", params.file_name, remaining)).into(),
            ));
        }

        let is_last = remaining <= samples;
        remaining -= samples;
        send(
            chunk_tx,
            ReaderMessage::Chunk {
                buffer,
                samples,
                is_last,
            },
            params.handoff_timeout,
        )?;
    }
    Ok(())
}

fn send(chunk_tx: &Sender<ReaderMessage>, message: ReaderMessage, timeout: Duration) -> Result<(), PlaybackAbort> {
    chunk_tx.send_timeout(message, timeout).map_err(|e| {
        if e.is_timeout() {
            PlaybackAbort::Timeout("feeder did not accept chunk".into())
        } else {
            PlaybackAbort::Cancelled
        }
    })
}

fn run_feeder(
    params: &PlaybackParams,
    cursor: &PlaybackCursor,
    chunk_rx: &Receiver<ReaderMessage>,
    free_tx: &Sender<ChunkBuffer>,
    abort_slot: &AbortSlot,
) -> PlaybackOutcome {
    let mut report = PlaybackReport {
        file_name: params.file_name.clone(),
        ..Default::default()
    };
    let mut header_seen = false;

    loop {
        if cursor.is_cancelled() {
            return PlaybackOutcome::Aborted(PlaybackAbort::Cancelled);
        }

        let message = match chunk_rx.recv_timeout(params.handoff_timeout) {
            Ok(message) => message,
            Err(RecvTimeoutError::Timeout) => {
                return PlaybackOutcome::Aborted(PlaybackAbort::Timeout("no chunk from reader".into()));
            }
            Err(RecvTimeoutError::Disconnected) => {
                if let Some(abort) = abort_slot.lock().take() {
                    return PlaybackOutcome::Aborted(abort);
                }
                if header_seen && report.declared_samples == 0 {
                    return PlaybackOutcome::Completed(report);
                }
                return PlaybackOutcome::Aborted(PlaybackAbort::ReadError(RecorderError::Playback(
                    "reader stopped before the last chunk".into(),
                )));
            }
        };

        let (buffer, samples, is_last) = match message {
            ReaderMessage::Header { total_samples } => {
                header_seen = true;
                report.declared_samples = total_samples;
                continue;
            }
            ReaderMessage::Chunk {
                buffer,
                samples,
                is_last,
            } => (buffer, samples, is_last),
        };

        report.chunks.push(ChunkTrace {
            buffer: buffer.id(),
            samples,
            is_last,
        });
        if let Err(buffer) = cursor.install(buffer, samples, is_last) {
            log::error!("Playback buffer {:?} installed before the previous one drained", buffer.id());
            return PlaybackOutcome::Aborted(PlaybackAbort::Timeout("sink still draining".into()));
        }

        match cursor.wait_drained(params.drain_poll, params.drain_max_polls) {
            DrainWait::Drained => report.samples_played += samples,
            DrainWait::Cancelled => return PlaybackOutcome::Aborted(PlaybackAbort::Cancelled),
            DrainWait::TimedOut => {
                return PlaybackOutcome::Aborted(PlaybackAbort::Timeout("sink did not drain chunk".into()));
            }
        }

        if is_last {
            return PlaybackOutcome::Completed(report);
        }
        if let Some(drained) = cursor.reclaim() {
            // The reader may already have failed; its error is picked up on the next receive.
            let _ = free_tx.send(drained);
        }
    }
}
