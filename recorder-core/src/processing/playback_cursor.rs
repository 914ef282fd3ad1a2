use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::models::records::BufferId;

/// One of the two fixed-capacity playback buffers.
#[derive(Debug)]
pub struct ChunkBuffer {
    id: BufferId,
    samples: Vec<i16>,
}

impl ChunkBuffer {
    pub fn new(id: BufferId, capacity: usize) -> Self {
        Self {
            id,
            samples: vec![0; capacity],
        }
    }

    pub fn id(&self) -> BufferId {
        self.id
    }

    pub fn capacity(&self) -> usize {
        self.samples.len()
    }

    pub fn as_mut_slice(&mut self) -> &mut [i16] {
        &mut self.samples
    }

    pub fn as_slice(&self) -> &[i16] {
        &self.samples
    }
}

/// Result of waiting for the sink to drain the active chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainWait {
    Drained,
    TimedOut,
    Cancelled,
}

#[derive(Debug, Default)]
struct CursorState {
    chunk: Option<ChunkBuffer>,
    position: usize,
    remaining: usize,
    active: bool,
    last_chunk: bool,
    cancelled: bool,
}

/// Playback cursor shared between the feeder and the playback sink.
///
/// Every mutation happens under one lock. The feeder installs a chunk and
/// waits; the sink copies samples out with [`drain_into`](Self::drain_into)
/// and the feeder is woken when the remaining count reaches zero.
#[derive(Debug, Default)]
pub struct PlaybackCursor {
    state: Mutex<CursorState>,
    drained: Condvar,
}

impl PlaybackCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `chunk` the active buffer with `samples` samples to play.
    ///
    /// Hands the chunk back if the previous one has not drained yet.
    pub(crate) fn install(&self, chunk: ChunkBuffer, samples: usize, is_last: bool) -> Result<Option<ChunkBuffer>, ChunkBuffer> {
        let mut state = self.state.lock();
        if state.remaining > 0 {
            return Err(chunk);
        }
        let previous = state.chunk.replace(chunk);
        state.position = 0;
        state.remaining = samples;
        state.active = true;
        state.last_chunk = is_last;
        if samples == 0 {
            self.drained.notify_all();
        }
        Ok(previous)
    }

    /// Sink side: copy up to `out.len()` samples of the active chunk.
    ///
    /// Returns the number of samples copied; zero when nothing is active.
    pub fn drain_into(&self, out: &mut [i16]) -> usize {
        let mut state = self.state.lock();
        if !state.active || state.remaining == 0 {
            return 0;
        }

        let count = out.len().min(state.remaining);
        let start = state.position;
        let Some(chunk) = state.chunk.as_ref() else {
            return 0;
        };
        out[..count].copy_from_slice(&chunk.as_slice()[start..start + count]);

        state.position += count;
        state.remaining -= count;
        if state.remaining == 0 {
            self.drained.notify_all();
        }
        count
    }

    /// Samples still to be played from the active chunk.
    pub fn remaining(&self) -> usize {
        self.state.lock().remaining
    }

    pub fn is_active(&self) -> bool {
        self.state.lock().active
    }

    pub fn is_last_chunk(&self) -> bool {
        self.state.lock().last_chunk
    }

    pub fn active_buffer(&self) -> Option<BufferId> {
        self.state.lock().chunk.as_ref().map(ChunkBuffer::id)
    }

    /// Block until the active chunk drained, polling every `poll` for at most
    /// `max_polls` intervals.
    pub(crate) fn wait_drained(&self, poll: Duration, max_polls: u32) -> DrainWait {
        let mut state = self.state.lock();
        for _ in 0..max_polls {
            if state.cancelled {
                return DrainWait::Cancelled;
            }
            if state.remaining == 0 {
                return DrainWait::Drained;
            }
            self.drained.wait_for(&mut state, poll);
        }
        if state.cancelled {
            DrainWait::Cancelled
        } else if state.remaining == 0 {
            DrainWait::Drained
        } else {
            DrainWait::TimedOut
        }
    }

    /// Take the drained chunk back so it can be refilled.
    pub(crate) fn reclaim(&self) -> Option<ChunkBuffer> {
        let mut state = self.state.lock();
        if state.remaining > 0 {
            return None;
        }
        state.chunk.take()
    }

    /// End the session: clear the active flag and the buffer reference.
    pub(crate) fn finish(&self) -> Option<ChunkBuffer> {
        let mut state = self.state.lock();
        state.active = false;
        state.last_chunk = false;
        state.position = 0;
        state.remaining = 0;
        state.chunk.take()
    }

    pub(crate) fn cancel(&self) {
        let mut state = self.state.lock();
        state.cancelled = true;
        self.drained.notify_all();
    }

    pub(crate) fn reset(&self) {
        let mut state = self.state.lock();
        *state = CursorState::default();
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.lock().cancelled
    }
}
