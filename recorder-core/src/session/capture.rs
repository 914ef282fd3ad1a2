use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use parking_lot::Mutex;

use super::events::RecorderEvent;
use crate::models::config::RecorderConfig;
use crate::models::error::RecorderError;
use crate::models::records::{CaptureEnd, CompletedCapture};
use crate::processing::capture_buffer::CaptureBuffer;
use crate::traits::capture_source::CaptureSource;

/// Handle to a running capture monitor.
struct ActiveCapture {
    stop_tx: Sender<()>,
    handle: thread::JoinHandle<()>,
}

/// Capture pipeline: moves samples from the capture source into the capture
/// buffer until stop-record or overflow, then hands the result to storage.
///
/// ```text
/// [CaptureSource] ──push──→ [CaptureBuffer] ──CompletedCapture──→ [storage writer]
///        ↑                        │
///        └──── stop ──── [capture-monitor] (polls fill level)
/// ```
pub struct CapturePipeline<C: CaptureSource> {
    source: Arc<Mutex<C>>,
    buffer: Arc<CaptureBuffer>,
    sample_rate: u32,
    channels: u16,
    poll_interval: Duration,
    release_timeout: Duration,
    generation: u64,
    active: Option<ActiveCapture>,
}

impl<C: CaptureSource + 'static> CapturePipeline<C> {
    pub fn new(source: C, config: &RecorderConfig) -> Self {
        Self {
            source: Arc::new(Mutex::new(source)),
            buffer: Arc::new(CaptureBuffer::new(config.capture_capacity)),
            sample_rate: config.sample_rate,
            channels: config.channels,
            poll_interval: config.capture_poll_interval(),
            release_timeout: config.release_timeout(),
            generation: 0,
            active: None,
        }
    }

    /// Generation of the most recently started capture; 0 before the first.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn buffer(&self) -> &Arc<CaptureBuffer> {
        &self.buffer
    }

    /// Samples at which the capture stops itself: one delivery short of full,
    /// so the delivery in flight always fits.
    pub fn overflow_threshold(&self) -> usize {
        let unit = self.source.lock().delivery_unit();
        self.buffer.capacity().saturating_sub(unit)
    }

    /// Arm the buffer, start the source and spawn the capture monitor.
    ///
    /// Waits (bounded) for storage to release the previous capture and fails
    /// with [`RecorderError::Timeout`] if it does not.
    pub fn start(
        &mut self,
        completed_tx: Sender<CompletedCapture>,
        events_tx: Sender<RecorderEvent>,
    ) -> Result<(), RecorderError> {
        self.join();

        let threshold = self.overflow_threshold();
        if !self.buffer.arm(self.release_timeout) {
            log::warn!("Storage still holds the previous capture after {:?}", self.release_timeout);
            return Err(RecorderError::Timeout("previous recording is still being saved".into()));
        }
        if let Err(e) = self.source.lock().start(Arc::clone(&self.buffer)) {
            self.buffer.disarm();
            return Err(e);
        }

        let (stop_tx, stop_rx) = bounded::<()>(1);
        let source = Arc::clone(&self.source);
        let buffer = Arc::clone(&self.buffer);
        let poll = self.poll_interval;
        let sample_rate = self.sample_rate;
        let channels = self.channels;
        let generation = self.generation + 1;

        let spawned = thread::Builder::new()
            .name("capture-monitor".into())
            .spawn(move || {
                let end = loop {
                    match stop_rx.recv_timeout(poll) {
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break CaptureEnd::Stopped,
                        Err(RecvTimeoutError::Timeout) => {
                            if buffer.delivered() >= threshold {
                                log::warn!("Capture buffer full ({} samples), stopping", buffer.delivered());
                                break CaptureEnd::Overflow;
                            }
                        }
                    }
                };

                if let Err(e) = source.lock().stop() {
                    log::error!("Failed to stop capture source: {}", e);
                }
                buffer.hand_off();

                let delivered = buffer.delivered();
                let sample_count = delivered - delivered % channels as usize;
                log::info!("Capture ended ({:?}) with {} samples", end, sample_count);

                // Completion goes out before the handoff so the controller
                // sees it ahead of any save result.
                let completed = RecorderEvent::CaptureCompleted {
                    generation,
                    end,
                    sample_count,
                };
                if events_tx.send(completed).is_err() {
                    log::debug!("Controller is gone; capture completion not reported");
                }
                let capture = CompletedCapture {
                    buffer: Arc::clone(&buffer),
                    sample_count,
                    sample_rate,
                    channels,
                    end,
                };
                if completed_tx.send(capture).is_err() {
                    log::error!("Storage writer is gone; capture dropped");
                    buffer.release();
                }
            });

        match spawned {
            Ok(handle) => {
                self.generation = generation;
                self.active = Some(ActiveCapture { stop_tx, handle });
                Ok(())
            }
            Err(e) => {
                if let Err(stop_err) = self.source.lock().stop() {
                    log::error!("Failed to stop capture source: {}", stop_err);
                }
                self.buffer.disarm();
                Err(RecorderError::Capture(format!("failed to spawn capture monitor: {}", e)))
            }
        }
    }

    /// Ask the monitor to stop. Returns false when no capture is running.
    pub fn request_stop(&self) -> bool {
        match &self.active {
            Some(active) => {
                let _ = active.stop_tx.try_send(());
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.active.as_ref().is_some_and(|a| !a.handle.is_finished())
    }

    /// Wait for the monitor thread of the last capture to exit.
    pub fn join(&mut self) {
        if let Some(active) = self.active.take() {
            let _ = active.stop_tx.try_send(());
            if active.handle.join().is_err() {
                log::error!("Capture monitor panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crossbeam_channel::unbounded;

    use super::*;
    use crate::testing::BurstSource;

    fn config(capacity: usize) -> RecorderConfig {
        RecorderConfig {
            capture_capacity: capacity,
            capture_poll_ms: 5,
            ..Default::default()
        }
    }

    #[test]
    fn stop_hands_over_delivered_samples() {
        let (source, tap) = BurstSource::new(64, 256);
        let mut pipeline = CapturePipeline::new(source, &config(4096));
        let (completed_tx, completed_rx) = unbounded();
        let (events_tx, events_rx) = unbounded();

        pipeline.start(completed_tx, events_tx).unwrap();
        tap.wait_started();
        assert!(pipeline.request_stop());

        let capture = completed_rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(capture.end, CaptureEnd::Stopped);
        assert_eq!(capture.sample_count, 256);
        capture.buffer.with_samples(capture.sample_count, |s| {
            assert!(s.iter().enumerate().all(|(i, &v)| v == i as i16));
        });

        let event = events_rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(
            event,
            RecorderEvent::CaptureCompleted {
                generation: 1,
                end: CaptureEnd::Stopped,
                sample_count: 256
            }
        );
        pipeline.join();
        assert!(tap.stopped());
    }

    #[test]
    fn overflow_stops_without_writing_past_capacity() {
        let (source, tap) = BurstSource::new(64, usize::MAX);
        let mut pipeline = CapturePipeline::new(source, &config(1024));
        assert_eq!(pipeline.overflow_threshold(), 960);
        let (completed_tx, completed_rx) = unbounded();
        let (events_tx, events_rx) = unbounded();

        pipeline.start(completed_tx, events_tx).unwrap();
        let capture = completed_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        assert_eq!(capture.end, CaptureEnd::Overflow);
        assert!(capture.sample_count >= 960);
        assert!(capture.sample_count <= 1024);
        assert!(tap.stopped());
        assert!(pipeline.buffer().is_pending());
        assert_eq!(pipeline.buffer().push(&[1, 2]), 0);

        // Exactly one record and one completion per capture.
        assert!(completed_rx.recv_timeout(Duration::from_millis(100)).is_err());
        pipeline.join();
        assert!(completed_rx.try_recv().is_err());
        let completions: Vec<RecorderEvent> = events_rx.try_iter().collect();
        assert_eq!(
            completions,
            vec![RecorderEvent::CaptureCompleted {
                generation: 1,
                end: CaptureEnd::Overflow,
                sample_count: capture.sample_count
            }]
        );
    }

    #[test]
    fn start_times_out_while_storage_holds_the_buffer() {
        let (source, tap) = BurstSource::new(64, 128);
        let config = RecorderConfig {
            release_timeout_ms: 30,
            ..config(4096)
        };
        let mut pipeline = CapturePipeline::new(source, &config);
        let (completed_tx, completed_rx) = unbounded();
        let (events_tx, _events_rx) = unbounded();

        pipeline.start(completed_tx.clone(), events_tx.clone()).unwrap();
        tap.wait_started();
        pipeline.request_stop();
        let capture = completed_rx.recv_timeout(Duration::from_secs(2)).unwrap();

        let err = pipeline.start(completed_tx.clone(), events_tx.clone()).unwrap_err();
        assert!(matches!(err, RecorderError::Timeout(_)));
        assert!(!pipeline.is_running());
        assert_eq!(pipeline.generation(), 1);

        capture.buffer.release();
        pipeline.start(completed_tx, events_tx).unwrap();
        assert_eq!(pipeline.generation(), 2);
        pipeline.join();
    }

    #[test]
    fn source_start_failure_leaves_buffer_disarmed() {
        let (source, tap) = BurstSource::new(64, 0);
        tap.fail_next_start();
        let mut pipeline = CapturePipeline::new(source, &config(1024));
        let (completed_tx, _completed_rx) = unbounded();
        let (events_tx, _events_rx) = unbounded();

        assert!(pipeline.start(completed_tx, events_tx).is_err());
        assert!(!pipeline.buffer().is_armed());
        assert!(!pipeline.is_running());
    }

    #[test]
    fn rearm_starts_from_zero() {
        let (source, tap) = BurstSource::new(64, 128);
        let mut pipeline = CapturePipeline::new(source, &config(4096));
        let mut counted = 0;

        for _ in 0..2 {
            let (completed_tx, completed_rx) = unbounded();
            let (events_tx, _events_rx) = unbounded();
            pipeline.start(completed_tx, events_tx).unwrap();
            tap.wait_started();
            pipeline.request_stop();
            let capture = completed_rx.recv_timeout(Duration::from_secs(2)).unwrap();
            counted += capture.sample_count;
            capture.buffer.release();
            pipeline.join();
        }
        assert_eq!(counted, 256);
        assert_eq!(pipeline.generation(), 2);
    }
}
