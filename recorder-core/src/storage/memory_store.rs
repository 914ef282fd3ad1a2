use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::error::StoreError;
use crate::traits::byte_store::{ByteStore, OpenMode, StoreFile};

/// Faults a [`MemoryStore`] injects, for exercising failure paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreFaults {
    /// Opening any file for writing fails.
    pub fail_write_open: bool,
    /// Bytes a single file accepts before writes come up short.
    pub write_limit: Option<usize>,
    pub fail_flush: bool,
    /// Largest read a handle serves per call.
    pub max_read: Option<usize>,
}

#[derive(Debug, Default)]
struct StoreInner {
    files: BTreeMap<String, Vec<u8>>,
    writers: HashSet<String>,
    faults: StoreFaults,
}

/// In-memory [`ByteStore`].
///
/// Clones share the same files, so a test can keep one handle for
/// inspection while the recorder owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<StoreInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, name: &str, bytes: Vec<u8>) {
        self.inner.lock().files.insert(name.to_string(), bytes);
    }

    pub fn contents(&self, name: &str) -> Option<Vec<u8>> {
        self.inner.lock().files.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.inner.lock().files.keys().cloned().collect()
    }

    pub fn set_faults(&self, faults: StoreFaults) {
        self.inner.lock().faults = faults;
    }

    /// Whether a write handle for `name` is still open.
    pub fn is_open_for_write(&self, name: &str) -> bool {
        self.inner.lock().writers.contains(name)
    }
}

impl ByteStore for MemoryStore {
    fn open(&self, name: &str, mode: OpenMode) -> Result<Box<dyn StoreFile>, StoreError> {
        let mut inner = self.inner.lock();
        match mode {
            OpenMode::Read => {
                if !inner.files.contains_key(name) {
                    return Err(StoreError::NotFound(name.to_string()));
                }
            }
            OpenMode::Write => {
                if inner.faults.fail_write_open {
                    return Err(StoreError::Io(format!("cannot create {}", name)));
                }
                if !inner.writers.insert(name.to_string()) {
                    return Err(StoreError::AlreadyOpen(name.to_string()));
                }
                inner.files.insert(name.to_string(), Vec::new());
            }
        }

        Ok(Box::new(MemoryFile {
            store: Arc::clone(&self.inner),
            name: name.to_string(),
            mode,
            position: 0,
        }))
    }

    fn remove(&self, name: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if inner.writers.contains(name) {
            return Err(StoreError::AlreadyOpen(name.to_string()));
        }
        inner
            .files
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }
}

struct MemoryFile {
    store: Arc<Mutex<StoreInner>>,
    name: String,
    mode: OpenMode,
    position: usize,
}

impl StoreFile for MemoryFile {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, StoreError> {
        let inner = self.store.lock();
        let data = inner
            .files
            .get(&self.name)
            .ok_or_else(|| StoreError::Io(format!("{} was removed", self.name)))?;

        let available = data.len().saturating_sub(self.position);
        let mut count = buf.len().min(available);
        if let Some(max) = inner.faults.max_read {
            count = count.min(max);
        }
        buf[..count].copy_from_slice(&data[self.position..self.position + count]);
        self.position += count;
        Ok(count)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, StoreError> {
        if self.mode != OpenMode::Write {
            return Err(StoreError::Io(format!("{} is open for reading", self.name)));
        }
        let mut inner = self.store.lock();
        let limit = inner.faults.write_limit;
        let data = inner
            .files
            .get_mut(&self.name)
            .ok_or_else(|| StoreError::Io(format!("{} was removed", self.name)))?;

        let accepted = match limit {
            Some(limit) => buf.len().min(limit.saturating_sub(data.len())),
            None => buf.len(),
        };
        data.extend_from_slice(&buf[..accepted]);
        Ok(accepted)
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        if self.store.lock().faults.fail_flush {
            return Err(StoreError::Io(format!("sync of {} failed", self.name)));
        }
        Ok(())
    }

    fn len(&self) -> Result<u64, StoreError> {
        let inner = self.store.lock();
        inner
            .files
            .get(&self.name)
            .map(|data| data.len() as u64)
            .ok_or_else(|| StoreError::Io(format!("{} was removed", self.name)))
    }

    fn close(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}

impl Drop for MemoryFile {
    fn drop(&mut self) {
        if self.mode == OpenMode::Write {
            self.store.lock().writers.remove(&self.name);
        }
    }
}
