use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Fixed-capacity capture buffer of interleaved 16-bit samples.
///
/// Single writer (the capture source, only while armed), single reader
/// (storage, only after the capture completed). The write index only grows
/// during a capture and is reset by [`arm`](Self::arm) at the start of the
/// next one.
///
/// Share as `Arc<CaptureBuffer>`: the source pushes from its own thread and
/// the capture monitor reads [`delivered`](Self::delivered) without locking.
///
/// A completed capture is marked pending until storage releases it; arming
/// for the next capture waits for that.
#[derive(Debug)]
pub struct CaptureBuffer {
    slots: Mutex<Slots>,
    released: Condvar,
    write_index: AtomicUsize,
    armed: AtomicBool,
    capacity: usize,
}

#[derive(Debug)]
struct Slots {
    samples: Vec<i16>,
    pending: bool,
}

impl CaptureBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Mutex::new(Slots {
                samples: vec![0; capacity],
                pending: false,
            }),
            released: Condvar::new(),
            write_index: AtomicUsize::new(0),
            armed: AtomicBool::new(false),
            capacity,
        }
    }

    /// Reset the write index and accept deliveries.
    ///
    /// Waits up to `wait` while storage still holds the previous capture.
    /// Returns false, leaving the buffer untouched, if it was not released
    /// in time.
    pub fn arm(&self, wait: Duration) -> bool {
        let deadline = Instant::now() + wait;
        let mut slots = self.slots.lock();
        while slots.pending {
            if self.released.wait_until(&mut slots, deadline).timed_out() && slots.pending {
                return false;
            }
        }
        self.write_index.store(0, Ordering::SeqCst);
        self.armed.store(true, Ordering::SeqCst);
        true
    }

    /// Stop accepting deliveries. Anything pushed afterwards is dropped.
    pub fn disarm(&self) {
        let _slots = self.slots.lock();
        self.armed.store(false, Ordering::SeqCst);
    }

    /// Disarm and hold the contents for storage.
    pub fn hand_off(&self) {
        let mut slots = self.slots.lock();
        self.armed.store(false, Ordering::SeqCst);
        slots.pending = true;
    }

    /// Storage is done with the contents; the buffer may be armed again.
    pub fn release(&self) {
        let mut slots = self.slots.lock();
        slots.pending = false;
        self.released.notify_all();
    }

    pub fn is_pending(&self) -> bool {
        self.slots.lock().pending
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }

    /// Append delivered samples at the write index.
    ///
    /// Never writes past capacity. Returns how many samples were accepted.
    pub fn push(&self, delivered: &[i16]) -> usize {
        if delivered.is_empty() {
            return 0;
        }
        let mut slots = self.slots.lock();
        if !self.armed.load(Ordering::SeqCst) {
            return 0;
        }

        let start = self.write_index.load(Ordering::SeqCst);
        let accepted = delivered.len().min(self.capacity - start);
        slots.samples[start..start + accepted].copy_from_slice(&delivered[..accepted]);
        self.write_index.store(start + accepted, Ordering::SeqCst);
        accepted
    }

    /// Samples delivered so far in the current capture (all channels counted).
    pub fn delivered(&self) -> usize {
        self.write_index.load(Ordering::SeqCst)
    }

    /// Run `f` over the first `count` samples while holding the buffer.
    pub fn with_samples<R>(&self, count: usize, f: impl FnOnce(&[i16]) -> R) -> R {
        let slots = self.slots.lock();
        let count = count.min(self.write_index.load(Ordering::SeqCst));
        f(&slots.samples[..count])
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn remaining(&self) -> usize {
        self.capacity - self.delivered()
    }
}
