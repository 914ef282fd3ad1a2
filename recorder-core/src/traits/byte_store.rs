use crate::models::error::StoreError;

/// How a store file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Existing file, positioned at the start. Fails with
    /// [`StoreError::NotFound`] when the name does not exist.
    Read,
    /// Create or truncate.
    Write,
}

/// An open file in a [`ByteStore`].
pub trait StoreFile: Send {
    /// Read up to `buf.len()` bytes. Returns 0 at end of file.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, StoreError>;

    /// Write `buf`, returning how many bytes were accepted.
    fn write(&mut self, buf: &[u8]) -> Result<usize, StoreError>;

    fn flush(&mut self) -> Result<(), StoreError>;

    /// Current size in bytes.
    fn len(&self) -> Result<u64, StoreError>;

    fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    fn close(self: Box<Self>) -> Result<(), StoreError>;

    /// Write all of `buf`, treating a short write as an error.
    fn write_all(&mut self, buf: &[u8]) -> Result<(), StoreError> {
        let written = self.write(buf)?;
        if written != buf.len() {
            return Err(StoreError::ShortWrite {
                expected: buf.len(),
                written,
            });
        }
        Ok(())
    }

    /// Fill `buf` as far as the file allows, looping over short reads.
    fn read_full(&mut self, buf: &mut [u8]) -> Result<usize, StoreError> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.read(&mut buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled)
    }
}

/// A flat namespace of byte files, typically a FAT-formatted SD card.
///
/// Shared between the storage writer, the playback reader and the
/// controller, so implementations synchronize internally.
pub trait ByteStore: Send + Sync {
    fn open(&self, name: &str, mode: OpenMode) -> Result<Box<dyn StoreFile>, StoreError>;

    fn remove(&self, name: &str) -> Result<(), StoreError>;

    fn exists(&self, name: &str) -> Result<bool, StoreError> {
        match self.open(name, OpenMode::Read) {
            Ok(file) => {
                file.close()?;
                Ok(true)
            }
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}
