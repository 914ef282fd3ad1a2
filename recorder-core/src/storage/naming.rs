use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveDateTime, Utc};

use crate::models::config::{NamingConfig, NamingScheme, TimeSource};
use crate::models::error::RecorderError;
use crate::traits::byte_store::ByteStore;

/// A free file name and how many taken names were skipped to find it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailableName {
    pub name: String,
    pub collisions: u32,
}

/// Generates recording file names.
///
/// Counter scheme: `rec_0000.wav`, `rec_0001.wav`, ...
/// Timestamp scheme: `20260121_120000.wav`, one second later per collision.
///
/// The counter only moves forward: each search resumes where the last one
/// stopped. Clones share the counter.
#[derive(Debug, Clone)]
pub struct FileNamer {
    config: NamingConfig,
    next: Arc<AtomicU32>,
}

impl FileNamer {
    pub fn new(config: NamingConfig) -> Self {
        Self {
            config,
            next: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Counter value the next search starts from.
    pub fn next_counter(&self) -> u32 {
        self.next.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &NamingConfig {
        &self.config
    }

    /// The name for counter step `counter`.
    pub fn candidate(&self, counter: u32) -> String {
        self.candidate_at(self.base_time(), counter)
    }

    /// The first `limit` candidate names, in search order.
    pub fn candidates(&self, limit: u32) -> Vec<String> {
        let base = self.base_time();
        (0..limit).map(|counter| self.candidate_at(base, counter)).collect()
    }

    /// Check candidates against `store`, starting at the current counter,
    /// until one does not exist. The counter ends up past the returned name.
    ///
    /// A successful open-for-read counts as a collision and advances the
    /// counter. Fails with [`RecorderError::NamingExhausted`] once
    /// `max_attempts` names in a row were taken.
    pub fn find_available<S: ByteStore + ?Sized>(&self, store: &S) -> Result<AvailableName, RecorderError> {
        let base = self.base_time();
        for attempt in 0..self.config.max_attempts {
            let counter = self.next.load(Ordering::SeqCst);
            let name = self.candidate_at(base, counter);
            let taken = store.exists(&name)?;
            self.next.store(counter.saturating_add(1), Ordering::SeqCst);
            if !taken {
                if attempt > 0 {
                    log::debug!("Using {} after {} name collisions", name, attempt);
                }
                return Ok(AvailableName {
                    name,
                    collisions: attempt,
                });
            }
            log::warn!("File name {} is taken, trying the next one", name);
        }

        Err(RecorderError::NamingExhausted {
            attempts: self.config.max_attempts,
        })
    }

    fn candidate_at(&self, base: NaiveDateTime, counter: u32) -> String {
        match self.config.scheme {
            NamingScheme::Counter => format!("{}{:04}{}", self.config.prefix, counter, self.config.extension),
            NamingScheme::Timestamp => {
                let time = base
                    .checked_add_signed(Duration::seconds(i64::from(counter)))
                    .unwrap_or(base);
                format!("{}{}", time.format("%Y%m%d_%H%M%S"), self.config.extension)
            }
        }
    }

    /// Local base time: the configured source shifted by the timezone offset.
    fn base_time(&self) -> NaiveDateTime {
        let utc = match self.config.time_source {
            TimeSource::Fixed => self.config.base_time.unwrap_or_else(fallback_time),
            TimeSource::System => Utc::now().naive_utc(),
        };
        utc.checked_add_signed(Duration::seconds(i64::from(self.config.timezone_offset_secs)))
            .unwrap_or(utc)
    }
}

/// Used when no base time is configured and no clock is requested.
fn fallback_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 1, 21)
        .and_then(|date| date.and_hms_opt(12, 0, 0))
        .unwrap_or_default()
}
