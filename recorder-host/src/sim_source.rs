//! Simulated capture source.
//!
//! Generates a sine tone and delivers it in fixed units on its own thread,
//! the way a microphone interrupt fills the capture buffer.

use std::f64::consts::TAU;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use recorder_core::{CaptureBuffer, CaptureSource, RecorderConfig, RecorderError};

/// Tone-generating [`CaptureSource`].
pub struct SimulatedSource {
    sample_rate: u32,
    channels: u16,
    delivery_unit: usize,
    frequency_hz: f64,
    amplitude: f64,
    /// Sleep one delivery period between deliveries.
    realtime: bool,
    /// Stop delivering after this many samples per capture.
    limit: Option<usize>,
    delivered: Arc<AtomicUsize>,
    running: Arc<AtomicBool>,
    capture_handle: Mutex<Option<thread::JoinHandle<()>>>,
}

impl SimulatedSource {
    pub fn new(config: &RecorderConfig, frequency_hz: f64, realtime: bool) -> Self {
        Self {
            sample_rate: config.sample_rate,
            channels: config.channels,
            delivery_unit: config.delivery_unit,
            frequency_hz,
            amplitude: 0.25,
            realtime,
            limit: None,
            delivered: Arc::new(AtomicUsize::new(0)),
            running: Arc::new(AtomicBool::new(false)),
            capture_handle: Mutex::new(None),
        }
    }

    /// Deliver at most `samples` samples per capture, then go quiet.
    pub fn with_limit(mut self, samples: usize) -> Self {
        self.limit = Some(samples);
        self
    }

    /// Samples the source has handed over in the current capture,
    /// including any the buffer refused.
    pub fn delivered(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.delivered)
    }
}

impl CaptureSource for SimulatedSource {
    fn start(&mut self, destination: Arc<CaptureBuffer>) -> Result<(), RecorderError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(RecorderError::Capture("simulated capture already running".into()));
        }

        self.running.store(true, Ordering::SeqCst);
        self.delivered.store(0, Ordering::SeqCst);

        let tone = Tone {
            sample_rate: self.sample_rate,
            channels: self.channels as usize,
            frequency_hz: self.frequency_hz,
            amplitude: self.amplitude,
        };
        let running = Arc::clone(&self.running);
        let delivered = Arc::clone(&self.delivered);
        let unit = self.delivery_unit;
        let limit = self.limit.unwrap_or(usize::MAX);
        let period = self.realtime.then(|| tone.period_of(unit));

        let handle = thread::Builder::new()
            .name("sim-capture".into())
            .spawn(move || {
                let mut frame = 0u64;
                let mut chunk = vec![0i16; unit];
                while running.load(Ordering::SeqCst) {
                    let sent = delivered.load(Ordering::SeqCst);
                    if sent >= limit {
                        thread::sleep(Duration::from_millis(1));
                        continue;
                    }
                    let n = unit.min(limit - sent);
                    frame = tone.fill(&mut chunk[..n], frame);
                    destination.push(&chunk[..n]);
                    delivered.fetch_add(n, Ordering::SeqCst);

                    match period {
                        Some(period) => thread::sleep(period),
                        None => thread::yield_now(),
                    }
                }
            })
            .map_err(|e| RecorderError::Capture(format!("failed to spawn capture thread: {}", e)))?;

        *self.capture_handle.lock() = Some(handle);
        log::debug!("Simulated capture started ({} Hz tone)", self.frequency_hz);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), RecorderError> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.capture_handle.lock().take() {
            handle
                .join()
                .map_err(|_| RecorderError::Capture("capture thread panicked".into()))?;
        }
        Ok(())
    }

    fn delivery_unit(&self) -> usize {
        self.delivery_unit
    }
}

#[derive(Debug, Clone, Copy)]
struct Tone {
    sample_rate: u32,
    channels: usize,
    frequency_hz: f64,
    amplitude: f64,
}

impl Tone {
    /// Fill `out` with whole frames starting at `frame`; returns the next frame.
    fn fill(&self, out: &mut [i16], mut frame: u64) -> u64 {
        for samples in out.chunks_mut(self.channels) {
            let t = frame as f64 / f64::from(self.sample_rate);
            let value = (TAU * self.frequency_hz * t).sin() * self.amplitude * f64::from(i16::MAX);
            samples.fill(value as i16);
            frame += 1;
        }
        frame
    }

    fn period_of(&self, samples: usize) -> Duration {
        let frames = (samples / self.channels) as f64;
        Duration::from_secs_f64(frames / f64::from(self.sample_rate))
    }
}
