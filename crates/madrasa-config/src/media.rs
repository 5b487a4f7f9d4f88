//! Media slot lifecycle configuration.
//!
//! # Environment Variables
//!
//! - `MEDIA_RETENTION_DAYS`: how long a superseded asset stays in its old slot
//!   before the sweeper deletes it (default: `30`, `0` disables retention)
//! - `MEDIA_TRASH_RETENTION_DAYS`: hint passed to the storage trash move
//!   (default: same as `MEDIA_RETENTION_DAYS`)
//! - `MEDIA_UPLOAD_TIMEOUT_SECS`: timeout around a single upload (default: `45`)
//! - `MEDIA_SWEEP_INTERVAL_SECS`: sweeper period (default: `3600`, `0` disables the task)
//! - `MEDIA_SWEEP_BATCH_SIZE`: due assets handled per sweep (default: `100`)
//! - `MEDIA_MAX_UPLOAD_BYTES`: per-file size cap (default: 5MB)

use std::time::Duration;

use crate::env_util::parse_or;

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaConfig {
    pub retention_days: u32,
    pub trash_retention_days: u32,
    pub upload_timeout: Duration,
    /// `None` disables the background sweeper.
    pub sweep_interval: Option<Duration>,
    pub sweep_batch_size: usize,
    pub max_upload_bytes: usize,
}

impl MediaConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let retention_days = parse_or("MEDIA_RETENTION_DAYS", defaults.retention_days);
        let sweep_secs: u64 = parse_or("MEDIA_SWEEP_INTERVAL_SECS", 3600);

        Self {
            retention_days,
            trash_retention_days: parse_or("MEDIA_TRASH_RETENTION_DAYS", retention_days),
            upload_timeout: Duration::from_secs(parse_or("MEDIA_UPLOAD_TIMEOUT_SECS", 45)),
            sweep_interval: (sweep_secs > 0).then(|| Duration::from_secs(sweep_secs)),
            sweep_batch_size: parse_or("MEDIA_SWEEP_BATCH_SIZE", defaults.sweep_batch_size)
                .max(1),
            max_upload_bytes: parse_or("MEDIA_MAX_UPLOAD_BYTES", defaults.max_upload_bytes),
        }
    }

    /// Retention window as a duration; zero when retention is disabled.
    pub fn retention_window(&self) -> Duration {
        Duration::from_secs(u64::from(self.retention_days) * SECONDS_PER_DAY)
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            retention_days: 30,
            trash_retention_days: 30,
            upload_timeout: Duration::from_secs(45),
            sweep_interval: Some(Duration::from_secs(3600)),
            sweep_batch_size: 100,
            max_upload_bytes: 5 * 1024 * 1024,
        }
    }
}
