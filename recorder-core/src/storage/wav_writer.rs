use chrono::Utc;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::naming::FileNamer;
use crate::models::error::{RecorderError, StoreError, WavError};
use crate::models::records::{CompletedCapture, SaveReport};
use crate::processing::wav_format::{self, WAV_HEADER_SIZE};
use crate::traits::byte_store::{ByteStore, OpenMode, StoreFile};

/// Streaming WAV writer over a [`ByteStore`] file.
///
/// ## File Format
///
/// ```text
/// [44-byte WAV header]
/// [raw 16-bit little-endian PCM, interleaved]
/// ```
///
/// The header is written first with the final sizes, so the payload is never
/// patched afterwards. Every byte written feeds a SHA-256 digest.
pub struct WavFileWriter {
    file_name: String,
    file: Option<Box<dyn StoreFile>>,
    hasher: Sha256,
    total_bytes_written: u64,
}

impl WavFileWriter {
    /// Open `file_name` for writing and write `header`.
    pub fn create<S: ByteStore + ?Sized>(
        store: &S,
        file_name: &str,
        header: &[u8; WAV_HEADER_SIZE],
    ) -> Result<Self, RecorderError> {
        let file = store.open(file_name, OpenMode::Write)?;
        let mut writer = Self {
            file_name: file_name.to_string(),
            file: Some(file),
            hasher: Sha256::new(),
            total_bytes_written: 0,
        };
        if let Err(e) = writer.write(header) {
            writer.abandon();
            return Err(e);
        }
        Ok(writer)
    }

    pub fn write(&mut self, data: &[u8]) -> Result<(), RecorderError> {
        let file = self.file.as_mut().ok_or(StoreError::Closed)?;
        file.write_all(data)?;
        self.hasher.update(data);
        self.total_bytes_written += data.len() as u64;
        Ok(())
    }

    /// Write `samples` in pieces of at most `chunk_bytes` bytes.
    pub fn write_samples(&mut self, samples: &[i16], chunk_bytes: usize) -> Result<(), RecorderError> {
        let per_chunk = (chunk_bytes / 2).max(1);
        let mut scratch = Vec::with_capacity(per_chunk * 2);
        for chunk in samples.chunks(per_chunk) {
            scratch.clear();
            wav_format::samples_to_le_bytes(chunk, &mut scratch);
            self.write(&scratch)?;
        }
        Ok(())
    }

    /// Flush, close and return the hex SHA-256 of everything written.
    pub fn finish(mut self) -> Result<String, RecorderError> {
        let mut file = self.file.take().ok_or(StoreError::Closed)?;
        if let Err(e) = file.flush() {
            if let Err(close_err) = file.close() {
                log::warn!("Closing {} after failed sync: {}", self.file_name, close_err);
            }
            return Err(e.into());
        }
        file.close()?;
        Ok(hex_encode(&self.hasher.clone().finalize()))
    }

    /// Close without reporting. Used on failure paths.
    pub fn abandon(mut self) {
        if let Some(file) = self.file.take() {
            if let Err(e) = file.close() {
                log::warn!("Failed to close {}: {}", self.file_name, e);
            }
        }
    }

    /// Total bytes written so far (including WAV header).
    pub fn bytes_written(&self) -> u64 {
        self.total_bytes_written
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }
}

/// Persist a completed capture as a new uniquely named WAV file.
///
/// On any failure after the file was created the partial file is closed
/// and removed, so a failed save never leaves a file that looks complete.
pub fn save_capture<S: ByteStore + ?Sized>(
    store: &S,
    namer: &FileNamer,
    capture: &CompletedCapture,
    chunk_bytes: usize,
) -> Result<SaveReport, RecorderError> {
    let available = namer.find_available(store)?;
    let samples_per_channel = capture.samples_per_channel();
    let frame_samples = samples_per_channel * capture.channels as usize;
    let declared = u32::try_from(samples_per_channel).map_err(|_| WavError::PayloadTooLarge)?;
    let header = wav_format::encode_header(capture.sample_rate, capture.channels, 16, declared)?;

    let mut writer = WavFileWriter::create(store, &available.name, &header)?;
    let written = capture
        .buffer
        .with_samples(frame_samples, |samples| writer.write_samples(samples, chunk_bytes));

    let checksum = match written {
        Ok(()) => {
            let bytes_written = writer.bytes_written();
            writer.finish().map(|checksum| (checksum, bytes_written))
        }
        Err(e) => {
            writer.abandon();
            Err(e)
        }
    };

    let (checksum, bytes_written) = match checksum {
        Ok(done) => done,
        Err(e) => {
            if let Err(remove_err) = store.remove(&available.name) {
                log::warn!("Failed to remove partial file {}: {}", available.name, remove_err);
            }
            return Err(e);
        }
    };

    log::info!(
        "Saved {} ({} samples, {} bytes)",
        available.name,
        frame_samples,
        bytes_written
    );

    Ok(SaveReport {
        id: Uuid::new_v4().to_string(),
        file_name: available.name,
        sample_count: frame_samples,
        sample_rate: capture.sample_rate,
        channels: capture.channels,
        bytes_written,
        duration_secs: capture.duration_secs(),
        created_at: Utc::now().to_rfc3339(),
        checksum,
        end: capture.end,
    })
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::models::config::NamingConfig;
    use crate::models::records::CaptureEnd;
    use crate::processing::capture_buffer::CaptureBuffer;
    use crate::processing::wav_format::{decode_header, ExpectedFormat};
    use crate::storage::memory_store::{MemoryStore, StoreFaults};

    fn capture_of(samples: &[i16]) -> CompletedCapture {
        let buffer = Arc::new(CaptureBuffer::new(samples.len().max(2)));
        buffer.arm(std::time::Duration::from_secs(1));
        buffer.push(samples);
        buffer.disarm();
        CompletedCapture {
            buffer,
            sample_count: samples.len(),
            sample_rate: 16000,
            channels: 2,
            end: CaptureEnd::Stopped,
        }
    }

    fn expected() -> ExpectedFormat {
        ExpectedFormat {
            sample_rate: 16000,
            channels: 2,
            bits_per_sample: 16,
        }
    }

    #[test]
    fn writes_header_then_payload() {
        let store = MemoryStore::new();
        let namer = FileNamer::new(NamingConfig::default());
        let samples: Vec<i16> = (0..100).map(|i| i * 3 - 150).collect();

        let report = save_capture(&store, &namer, &capture_of(&samples), 16).unwrap();
        assert_eq!(report.file_name, "rec_0000.wav");
        assert_eq!(report.sample_count, 100);
        assert_eq!(report.bytes_written, 44 + 200);
        assert_eq!(report.checksum.len(), 64);

        let bytes = store.contents("rec_0000.wav").unwrap();
        assert_eq!(bytes.len(), 244);
        let decoded = decode_header(&bytes, &expected()).unwrap();
        assert_eq!(decoded.total_samples, 100);

        let mut read_back = vec![0i16; 100];
        wav_format::le_bytes_to_samples(&bytes[44..], &mut read_back);
        assert_eq!(read_back, samples);
        assert!(!store.is_open_for_write("rec_0000.wav"));
    }

    #[test]
    fn checksum_covers_the_whole_file() {
        let store = MemoryStore::new();
        let namer = FileNamer::new(NamingConfig::default());
        let report = save_capture(&store, &namer, &capture_of(&[1, 2, 3, 4]), 8192).unwrap();

        let bytes = store.contents(&report.file_name).unwrap();
        assert_eq!(report.checksum, hex_encode(&Sha256::digest(&bytes)));
    }

    #[test]
    fn empty_capture_is_header_only() {
        let store = MemoryStore::new();
        let namer = FileNamer::new(NamingConfig::default());
        let report = save_capture(&store, &namer, &capture_of(&[]), 8192).unwrap();

        let bytes = store.contents(&report.file_name).unwrap();
        assert_eq!(bytes.len(), 44);
        assert_eq!(decode_header(&bytes, &expected()).unwrap().total_samples, 0);
    }

    #[test]
    fn second_save_gets_next_name() {
        let store = MemoryStore::new();
        let namer = FileNamer::new(NamingConfig::default());
        save_capture(&store, &namer, &capture_of(&[1, 2]), 8192).unwrap();
        let report = save_capture(&store, &namer, &capture_of(&[3, 4]), 8192).unwrap();
        assert_eq!(report.file_name, "rec_0001.wav");
    }

    #[test]
    fn short_write_fails_and_removes_partial_file() {
        let store = MemoryStore::new();
        store.set_faults(StoreFaults {
            write_limit: Some(60),
            ..Default::default()
        });
        let namer = FileNamer::new(NamingConfig::default());

        let err = save_capture(&store, &namer, &capture_of(&[7; 64]), 16).unwrap_err();
        assert!(matches!(err, RecorderError::Storage(StoreError::ShortWrite { .. })));
        assert!(store.contents("rec_0000.wav").is_none());
        assert!(!store.is_open_for_write("rec_0000.wav"));
    }

    #[test]
    fn failed_sync_is_reported() {
        let store = MemoryStore::new();
        store.set_faults(StoreFaults {
            fail_flush: true,
            ..Default::default()
        });
        let namer = FileNamer::new(NamingConfig::default());

        let err = save_capture(&store, &namer, &capture_of(&[1, 2]), 8192).unwrap_err();
        assert!(matches!(err, RecorderError::Storage(StoreError::Io(_))));
        assert!(store.names().is_empty());
    }

    #[test]
    fn open_failure_creates_nothing() {
        let store = MemoryStore::new();
        store.set_faults(StoreFaults {
            fail_write_open: true,
            ..Default::default()
        });
        let namer = FileNamer::new(NamingConfig::default());

        assert!(save_capture(&store, &namer, &capture_of(&[1, 2]), 8192).is_err());
        assert!(store.names().is_empty());
    }
}
