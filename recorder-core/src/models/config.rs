use std::time::Duration;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::error::RecorderError;
use crate::processing::wav_format::ExpectedFormat;

/// Recorder configuration.
///
/// All durations are stored in milliseconds so the struct round-trips through
/// JSON unchanged; use the accessor methods to get `Duration`s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Sample rate in Hz of both the capture source and the playback sink (default: 16000).
    pub sample_rate: u32,

    /// Interleaved channel count (default: 2).
    pub channels: u16,

    /// Bits per stored sample (default: 16). Capture is always 16-bit.
    pub bits_per_sample: u16,

    /// Capture buffer capacity in samples, all channels counted (default: 4 s of stereo).
    pub capture_capacity: usize,

    /// Samples handed over by the capture source per delivery (default: 64).
    pub delivery_unit: usize,

    /// How often the capture monitor checks for overflow.
    pub capture_poll_ms: u64,

    /// Bounded wait for the capture-completed signal after stop-record.
    pub stop_timeout_ms: u64,

    /// How long start-record waits for storage to finish with the previous capture.
    pub release_timeout_ms: u64,

    /// Storage write chunk size in bytes.
    pub write_chunk_bytes: usize,

    /// Playback chunk size in samples (one ping or pong buffer).
    pub playback_chunk_samples: usize,

    /// Per-handoff timeout between the reader and the feeder.
    pub handoff_timeout_ms: u64,

    /// Poll interval while waiting for the sink to drain a chunk.
    pub drain_poll_ms: u64,

    /// Maximum number of drain polls before playback aborts.
    pub drain_max_polls: u32,

    /// Number of candidate names checked by `list`.
    pub list_limit: u32,

    pub naming: NamingConfig,
}

impl RecorderConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.sample_rate == 0 {
            return Err("sample rate must be positive".into());
        }
        if self.channels == 0 || self.channels > 8 {
            return Err(format!("unsupported channel count: {}", self.channels));
        }
        if self.bits_per_sample != 16 {
            return Err(format!("capture only produces 16-bit samples, got {}", self.bits_per_sample));
        }
        if self.delivery_unit == 0 || self.delivery_unit % self.channels as usize != 0 {
            return Err(format!(
                "delivery unit {} must be a positive multiple of the channel count",
                self.delivery_unit
            ));
        }
        if self.capture_capacity <= self.delivery_unit {
            return Err("capture capacity must exceed one delivery unit".into());
        }
        if self.capture_capacity % self.channels as usize != 0 {
            return Err("capture capacity must hold whole frames".into());
        }
        if self.write_chunk_bytes < 2 {
            return Err("write chunk must hold at least one sample".into());
        }
        if self.playback_chunk_samples == 0 || self.playback_chunk_samples % self.channels as usize != 0 {
            return Err("playback chunk must hold whole frames".into());
        }
        if self.drain_poll_ms == 0 || self.drain_max_polls == 0 {
            return Err("drain wait must be bounded and non-zero".into());
        }
        if self.naming.max_attempts == 0 {
            return Err("naming needs at least one attempt".into());
        }
        if self.naming.extension.is_empty() {
            return Err("file extension must not be empty".into());
        }
        Ok(())
    }

    /// Parse a JSON config; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, RecorderError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| RecorderError::ConfigurationFailed(format!("invalid config: {}", e)))?;
        config.validate().map_err(RecorderError::ConfigurationFailed)?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, RecorderError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| RecorderError::ConfigurationFailed(format!("failed to serialize config: {}", e)))
    }

    pub fn capture_poll_interval(&self) -> Duration {
        Duration::from_millis(self.capture_poll_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    pub fn release_timeout(&self) -> Duration {
        Duration::from_millis(self.release_timeout_ms)
    }

    pub fn handoff_timeout(&self) -> Duration {
        Duration::from_millis(self.handoff_timeout_ms)
    }

    pub fn drain_poll_interval(&self) -> Duration {
        Duration::from_millis(self.drain_poll_ms)
    }

    /// Longest time the feeder may wait for one chunk to drain.
    pub fn drain_budget(&self) -> Duration {
        self.drain_poll_interval() * self.drain_max_polls
    }

    /// The reader waits for a free buffer while the feeder drains the other one,
    /// so its back-pressure wait covers a full drain plus one handoff.
    pub fn reader_wait_timeout(&self) -> Duration {
        self.drain_budget() + self.handoff_timeout()
    }

    /// Header format the playback reader accepts.
    pub fn expected_format(&self) -> ExpectedFormat {
        ExpectedFormat {
            sample_rate: self.sample_rate,
            channels: self.channels,
            bits_per_sample: self.bits_per_sample,
        }
    }
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            channels: 2,
            bits_per_sample: 16,
            capture_capacity: 4 * 16000 * 2,
            delivery_unit: 64,
            capture_poll_ms: 100,
            stop_timeout_ms: 1000,
            release_timeout_ms: 5000,
            write_chunk_bytes: 8 * 1024,
            playback_chunk_samples: 4096,
            handoff_timeout_ms: 500,
            drain_poll_ms: 10,
            drain_max_polls: 1000,
            list_limit: 10,
            naming: NamingConfig::default(),
        }
    }
}

/// How recording file names are generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamingScheme {
    /// `rec_0000.wav`, `rec_0001.wav`, ...
    Counter,
    /// `20260121_120000.wav`, advanced one second per collision.
    Timestamp,
}

/// Where the timestamp scheme gets its base time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeSource {
    /// `base_time` if set, otherwise the built-in fallback time.
    Fixed,
    /// The host's UTC clock, shifted by the timezone offset.
    System,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    pub scheme: NamingScheme,
    pub prefix: String,
    pub extension: String,
    pub max_attempts: u32,
    pub time_source: TimeSource,
    /// UTC base time for the fixed time source.
    pub base_time: Option<NaiveDateTime>,
    /// Offset added to the base time, in seconds east of UTC.
    pub timezone_offset_secs: i32,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            scheme: NamingScheme::Counter,
            prefix: "rec_".into(),
            extension: ".wav".into(),
            max_attempts: 10,
            time_source: TimeSource::Fixed,
            base_time: None,
            timezone_offset_secs: 0,
        }
    }
}
