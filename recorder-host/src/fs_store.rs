//! Directory-backed byte store.
//!
//! Each store file is a regular file directly inside the store directory.
//! Names are flat: separators and parent references are rejected.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use recorder_core::{ByteStore, OpenMode, StoreError, StoreFile};

use crate::error::HostError;

pub struct FsStore {
    root: PathBuf,
    writers: Arc<Mutex<HashSet<String>>>,
}

impl FsStore {
    /// Use `root` as the store, creating it if needed.
    pub fn open_dir(root: impl Into<PathBuf>) -> Result<Self, HostError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        if !root.is_dir() {
            return Err(HostError::InvalidStore {
                path: root.display().to_string(),
                reason: "not a directory".into(),
            });
        }
        log::debug!("Byte store at {}", root.display());
        Ok(Self {
            root,
            writers: Arc::new(Mutex::new(HashSet::new())),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, name: &str) -> Result<PathBuf, StoreError> {
        let flat = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\'])
            && !name.contains('\0');
        if !flat {
            return Err(StoreError::Io(format!("invalid file name: {:?}", name)));
        }
        Ok(self.root.join(name))
    }
}

fn store_error(name: &str, e: io::Error) -> StoreError {
    match e.kind() {
        ErrorKind::NotFound => StoreError::NotFound(name.to_string()),
        _ => StoreError::Io(format!("{}: {}", name, e)),
    }
}

impl ByteStore for FsStore {
    fn open(&self, name: &str, mode: OpenMode) -> Result<Box<dyn StoreFile>, StoreError> {
        let path = self.path_of(name)?;
        match mode {
            OpenMode::Read => {
                let file = File::open(&path).map_err(|e| store_error(name, e))?;
                if file.metadata().map_err(|e| store_error(name, e))?.is_dir() {
                    return Err(StoreError::NotFound(name.to_string()));
                }
                Ok(Box::new(FsFile {
                    file,
                    name: name.to_string(),
                    writers: None,
                }))
            }
            OpenMode::Write => {
                let mut writers = self.writers.lock();
                if writers.contains(name) {
                    return Err(StoreError::AlreadyOpen(name.to_string()));
                }
                let file = File::create(&path).map_err(|e| store_error(name, e))?;
                writers.insert(name.to_string());
                Ok(Box::new(FsFile {
                    file,
                    name: name.to_string(),
                    writers: Some(Arc::clone(&self.writers)),
                }))
            }
        }
    }

    fn remove(&self, name: &str) -> Result<(), StoreError> {
        let path = self.path_of(name)?;
        if self.writers.lock().contains(name) {
            return Err(StoreError::AlreadyOpen(name.to_string()));
        }
        fs::remove_file(path).map_err(|e| store_error(name, e))
    }
}

struct FsFile {
    file: File,
    name: String,
    /// Set for write handles; the name is unregistered on drop.
    writers: Option<Arc<Mutex<HashSet<String>>>>,
}

impl StoreFile for FsFile {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, StoreError> {
        loop {
            match self.file.read(buf) {
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(store_error(&self.name, e)),
            }
        }
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, StoreError> {
        let mut written = 0;
        while written < buf.len() {
            match self.file.write(&buf[written..]) {
                Ok(0) => break,
                Ok(n) => written += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(store_error(&self.name, e)),
            }
        }
        Ok(written)
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        self.file.flush().map_err(|e| store_error(&self.name, e))?;
        if self.writers.is_some() {
            self.file.sync_all().map_err(|e| store_error(&self.name, e))?;
        }
        Ok(())
    }

    fn len(&self) -> Result<u64, StoreError> {
        self.file
            .metadata()
            .map(|m| m.len())
            .map_err(|e| store_error(&self.name, e))
    }

    fn close(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}

impl Drop for FsFile {
    fn drop(&mut self) {
        if let Some(writers) = &self.writers {
            writers.lock().remove(&self.name);
        }
    }
}
