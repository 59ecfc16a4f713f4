//! Configuration management.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Main configuration structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Server listen address (e.g., "0.0.0.0:5000")
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Poll loop interval in milliseconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Per-subscriber send timeout in milliseconds (0 disables)
    #[serde(default = "default_send_timeout")]
    pub send_timeout_ms: u64,

    /// Snapshots that may wait for one subscriber before it is dropped
    #[serde(default = "default_send_queue_depth")]
    pub send_queue_depth: usize,

    /// WebSocket keep-alive ping interval in seconds (0 disables)
    #[serde(default = "default_keepalive")]
    pub keepalive_secs: u64,

    /// Log every snapshot as JSON at debug level
    #[serde(default)]
    pub log_snapshots: bool,

    /// Directory containing the `proc/` and `sys/` trees to sample
    #[serde(default = "default_sysfs_root")]
    pub sysfs_root: String,
}

// Default value functions
fn default_listen() -> String {
    "0.0.0.0:5000".to_string()
}

fn default_poll_interval() -> u64 {
    1000
}

fn default_send_timeout() -> u64 {
    10_000
}

fn default_send_queue_depth() -> usize {
    8
}

fn default_keepalive() -> u64 {
    120
}

fn default_sysfs_root() -> String {
    "/".to_string()
}

impl Config {
    /// Loads configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content =
            std::fs::read_to_string(path.as_ref()).context("Failed to read configuration file")?;
        let config: Config = toml::from_str(&content).context("Failed to parse configuration")?;
        Ok(config)
    }

    /// Loads configuration from a TOML file, or the defaults if it does not exist.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            info!(
                "No configuration at {}, using defaults",
                path.as_ref().display()
            );
            Ok(Self::default())
        }
    }

    /// Poll loop interval.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Per-subscriber send timeout, if enabled.
    pub fn send_timeout(&self) -> Option<Duration> {
        (self.send_timeout_ms > 0).then(|| Duration::from_millis(self.send_timeout_ms))
    }

    /// WebSocket keep-alive interval, if enabled.
    pub fn keepalive(&self) -> Option<Duration> {
        (self.keepalive_secs > 0).then(|| Duration::from_secs(self.keepalive_secs))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            poll_interval_ms: default_poll_interval(),
            send_timeout_ms: default_send_timeout(),
            send_queue_depth: default_send_queue_depth(),
            keepalive_secs: default_keepalive(),
            log_snapshots: false,
            sysfs_root: default_sysfs_root(),
        }
    }
}
