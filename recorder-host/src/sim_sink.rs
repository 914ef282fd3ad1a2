//! Simulated playback sink.
//!
//! Pulls fixed periods from the playback cursor on its own thread, the way
//! an I2S transmit interrupt drains the active chunk. Silence is emitted
//! whenever nothing is active.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use recorder_core::{PlaybackCursor, PlaybackSink, RecorderConfig, RecorderError};

const PERIOD_FRAMES: usize = 256;

/// Cursor-draining [`PlaybackSink`].
pub struct SimulatedSink {
    sample_rate: u32,
    channels: u16,
    /// Sleep one period after every pull.
    realtime: bool,
    samples_played: Arc<AtomicU64>,
    /// Every sample drained, when recording is enabled.
    recorded: Option<Arc<Mutex<Vec<i16>>>>,
    running: Arc<AtomicBool>,
    render_handle: Option<thread::JoinHandle<()>>,
}

impl SimulatedSink {
    pub fn new(config: &RecorderConfig, realtime: bool) -> Self {
        Self {
            sample_rate: config.sample_rate,
            channels: config.channels,
            realtime,
            samples_played: Arc::new(AtomicU64::new(0)),
            recorded: None,
            running: Arc::new(AtomicBool::new(false)),
            render_handle: None,
        }
    }

    /// Keep a copy of every sample played.
    pub fn recording(mut self) -> Self {
        self.recorded = Some(Arc::new(Mutex::new(Vec::new())));
        self
    }

    pub fn recorded(&self) -> Option<Arc<Mutex<Vec<i16>>>> {
        self.recorded.clone()
    }

    pub fn samples_played(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.samples_played)
    }

    fn period(&self) -> Duration {
        Duration::from_secs_f64(PERIOD_FRAMES as f64 / f64::from(self.sample_rate))
    }
}

impl PlaybackSink for SimulatedSink {
    fn start(&mut self, cursor: Arc<PlaybackCursor>) -> Result<(), RecorderError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let running = Arc::clone(&self.running);
        let played = Arc::clone(&self.samples_played);
        let recorded = self.recorded.clone();
        let period = self.realtime.then(|| self.period());
        let mut out = vec![0i16; PERIOD_FRAMES * self.channels as usize];

        let handle = thread::Builder::new()
            .name("sim-playback".into())
            .spawn(move || {
                while running.load(Ordering::SeqCst) {
                    let n = cursor.drain_into(&mut out);
                    if n > 0 {
                        played.fetch_add(n as u64, Ordering::SeqCst);
                        if let Some(recorded) = &recorded {
                            recorded.lock().extend_from_slice(&out[..n]);
                        }
                    }
                    match period {
                        Some(period) => thread::sleep(period),
                        None if n == 0 => thread::sleep(Duration::from_millis(1)),
                        None => {}
                    }
                }
            });

        match handle {
            Ok(handle) => {
                self.render_handle = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                Err(RecorderError::Playback(format!("failed to spawn playback thread: {}", e)))
            }
        }
    }

    fn stop(&mut self) -> Result<(), RecorderError> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.render_handle.take() {
            handle
                .join()
                .map_err(|_| RecorderError::Playback("playback thread panicked".into()))?;
        }
        Ok(())
    }
}
