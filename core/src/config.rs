//! Download settings loaded from a TOML file.
//!
//! Every field has a default, so a partial file only overrides what it names.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::link::LinkTiming;
use crate::serial::DEFAULT_BAUD_RATE;

/// Settings file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "sentinel.toml";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Serial character device the unit is attached to
    pub device: String,
    pub baud_rate: u32,
    /// Idle probes before giving up on a busy device
    pub idle_tries: u32,
    pub idle_poll_ms: u64,
    /// Empty polls allowed before the first response byte
    pub start_poll_cycles: u32,
    pub poll_interval_ms: u64,
    /// Pause after every byte read
    pub read_interval_ms: u64,
    /// Empty polls allowed once a response has started
    pub max_idle_polls: u32,
    /// Bytes skipped looking for a response before giving up
    pub max_preamble_bytes: u32,
    /// Run of wait or filler bytes that aborts a transfer
    pub noise_run: usize,
    /// Payload size below which the noise check is skipped
    pub noise_min_bytes: usize,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        let timing = LinkTiming::default();
        DownloadConfig {
            device: "/dev/ttyUSB0".to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            idle_tries: timing.idle_tries,
            idle_poll_ms: millis(timing.idle_poll),
            start_poll_cycles: timing.start_poll_cycles,
            poll_interval_ms: millis(timing.poll_interval),
            read_interval_ms: millis(timing.read_interval),
            max_idle_polls: timing.max_idle_polls,
            max_preamble_bytes: timing.max_preamble_bytes,
            noise_run: timing.noise_run,
            noise_min_bytes: timing.noise_min_bytes,
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

impl DownloadConfig {
    /// Load settings from `path`.
    /// Falls back to defaults if the file doesn't exist or is invalid.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<DownloadConfig>(&contents) {
                Ok(config) => {
                    info!(path = %path.display(), device = %config.device, "loaded configuration");
                    config
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "invalid config file, using defaults");
                    Self::default()
                }
            },
            Err(e) => {
                info!(path = %path.display(), error = %e, "no config file, using defaults");
                Self::default()
            }
        }
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        let contents = toml::to_string_pretty(self).context("failed to serialize configuration")?;
        fs::write(path, contents)
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!(path = %path.display(), "configuration saved");
        Ok(())
    }

    pub fn link_timing(&self) -> LinkTiming {
        LinkTiming {
            idle_tries: self.idle_tries,
            idle_poll: Duration::from_millis(self.idle_poll_ms),
            start_poll_cycles: self.start_poll_cycles,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            read_interval: Duration::from_millis(self.read_interval_ms),
            max_idle_polls: self.max_idle_polls,
            max_preamble_bytes: self.max_preamble_bytes,
            noise_run: self.noise_run,
            noise_min_bytes: self.noise_min_bytes,
        }
    }
}
