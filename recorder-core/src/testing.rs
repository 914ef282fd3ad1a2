//! Test doubles for the capture source and playback sink.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::{Condvar, Mutex};

use crate::models::error::{RecorderError, StoreError};
use crate::processing::capture_buffer::CaptureBuffer;
use crate::processing::playback_cursor::PlaybackCursor;
use crate::processing::wav_format;
use crate::storage::memory_store::MemoryStore;
use crate::traits::byte_store::{ByteStore, OpenMode, StoreFile};
use crate::traits::capture_source::CaptureSource;
use crate::traits::playback_sink::PlaybackSink;

/// A complete WAV file holding `samples`.
pub(crate) fn wav_file(samples: &[i16], sample_rate: u32, channels: u16) -> Vec<u8> {
    let per_channel = (samples.len() / channels as usize) as u32;
    let mut bytes = wav_format::encode_header(sample_rate, channels, 16, per_channel)
        .unwrap()
        .to_vec();
    wav_format::samples_to_le_bytes(samples, &mut bytes);
    bytes
}

#[derive(Debug, Default)]
struct TapState {
    burst_done: bool,
    stopped: bool,
    fail_next_start: bool,
    next_stop_delay: Option<Duration>,
}

/// Observes a [`BurstSource`] from the test thread.
#[derive(Debug, Clone, Default)]
pub(crate) struct SourceTap {
    state: Arc<(Mutex<TapState>, Condvar)>,
}

impl SourceTap {
    /// Wait until the current burst has been delivered.
    pub(crate) fn wait_started(&self) {
        let (lock, cv) = &*self.state;
        let mut state = lock.lock();
        while !state.burst_done {
            if cv.wait_for(&mut state, Duration::from_secs(5)).timed_out() {
                panic!("capture burst never finished");
            }
        }
    }

    pub(crate) fn stopped(&self) -> bool {
        self.state.0.lock().stopped
    }

    pub(crate) fn fail_next_start(&self) {
        self.state.0.lock().fail_next_start = true;
    }

    /// Make the next `stop` take `delay` before it halts delivery.
    pub(crate) fn slow_next_stop(&self, delay: Duration) {
        self.state.0.lock().next_stop_delay = Some(delay);
    }
}

/// Delivers `total` samples (values 0, 1, 2, ...) in units of `unit`, then
/// idles. With `usize::MAX` it keeps delivering until stopped.
pub(crate) struct BurstSource {
    unit: usize,
    total: usize,
    tap: SourceTap,
    running: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl BurstSource {
    pub(crate) fn new(unit: usize, total: usize) -> (Self, SourceTap) {
        let tap = SourceTap::default();
        let source = Self {
            unit,
            total,
            tap: tap.clone(),
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        };
        (source, tap)
    }
}

impl CaptureSource for BurstSource {
    fn start(&mut self, destination: Arc<CaptureBuffer>) -> Result<(), RecorderError> {
        {
            let mut state = self.tap.state.0.lock();
            if state.fail_next_start {
                state.fail_next_start = false;
                return Err(RecorderError::Capture("device unavailable".into()));
            }
            state.burst_done = false;
            state.stopped = false;
        }

        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let tap = self.tap.clone();
        let unit = self.unit;
        let total = self.total;

        self.handle = Some(thread::spawn(move || {
            let mut sent = 0usize;
            let mut chunk = vec![0i16; unit];
            while running.load(Ordering::SeqCst) && sent < total {
                let n = unit.min(total - sent);
                for (i, s) in chunk[..n].iter_mut().enumerate() {
                    *s = (sent + i) as i16;
                }
                if destination.push(&chunk[..n]) == 0 {
                    thread::sleep(Duration::from_millis(1));
                }
                sent += n;
            }
            let (lock, cv) = &*tap.state;
            lock.lock().burst_done = true;
            cv.notify_all();
        }));
        Ok(())
    }

    fn stop(&mut self) -> Result<(), RecorderError> {
        let delay = self.tap.state.0.lock().next_stop_delay.take();
        if let Some(delay) = delay {
            thread::sleep(delay);
        }
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            handle.join().map_err(|_| RecorderError::Capture("source thread panicked".into()))?;
        }
        self.tap.state.0.lock().stopped = true;
        Ok(())
    }

    fn delivery_unit(&self) -> usize {
        self.unit
    }
}

/// Drains the cursor as fast as it can and records every sample.
pub(crate) struct DrainingSink {
    played: Arc<Mutex<Vec<i16>>>,
    running: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl DrainingSink {
    pub(crate) fn new() -> Self {
        Self {
            played: Arc::new(Mutex::new(Vec::new())),
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    pub(crate) fn played(&self) -> Vec<i16> {
        self.played.lock().clone()
    }

    /// Shared view of the played samples, for when the sink is moved away.
    pub(crate) fn played_handle(&self) -> Arc<Mutex<Vec<i16>>> {
        Arc::clone(&self.played)
    }
}

/// A sink that never drains anything.
pub(crate) struct StalledSink;

impl PlaybackSink for StalledSink {
    fn start(&mut self, _cursor: Arc<PlaybackCursor>) -> Result<(), RecorderError> {
        Ok(())
    }

    fn stop(&mut self) -> Result<(), RecorderError> {
        Ok(())
    }
}

impl PlaybackSink for DrainingSink {
    fn start(&mut self, cursor: Arc<PlaybackCursor>) -> Result<(), RecorderError> {
        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let played = Arc::clone(&self.played);
        self.handle = Some(thread::spawn(move || {
            let mut out = [0i16; 256];
            while running.load(Ordering::SeqCst) {
                let n = cursor.drain_into(&mut out);
                if n == 0 {
                    thread::sleep(Duration::from_millis(1));
                } else {
                    played.lock().extend_from_slice(&out[..n]);
                }
            }
        }));
        Ok(())
    }

    fn stop(&mut self) -> Result<(), RecorderError> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            handle.join().map_err(|_| RecorderError::Playback("sink thread panicked".into()))?;
        }
        Ok(())
    }
}

/// A [`MemoryStore`] whose write opens hang until the gate sender is used
/// or dropped.
pub(crate) struct GatedStore {
    inner: MemoryStore,
    gate: Receiver<()>,
}

impl GatedStore {
    pub(crate) fn new(inner: MemoryStore) -> (Self, Sender<()>) {
        let (gate_tx, gate) = bounded(0);
        (Self { inner, gate }, gate_tx)
    }
}

impl ByteStore for GatedStore {
    fn open(&self, name: &str, mode: OpenMode) -> Result<Box<dyn StoreFile>, StoreError> {
        if mode == OpenMode::Write {
            let _ = self.gate.recv_timeout(Duration::from_secs(10));
        }
        self.inner.open(name, mode)
    }

    fn remove(&self, name: &str) -> Result<(), StoreError> {
        self.inner.remove(name)
    }
}
