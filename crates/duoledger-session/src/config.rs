//! Engine configuration.
//!
//! Defaults match the production constants: 30 minute expiry threshold,
//! 60 second heartbeat, 5 second write-sync window. Values are plain
//! seconds in the file format; accessors convert to [`Duration`].

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::info;

use crate::error::SessionResult;

/// Tunables for the session lifecycle engine.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// A persisted record idle longer than this is expired.
    pub session_timeout_secs: u64,
    /// Interval between activity-timestamp heartbeats while active.
    pub heartbeat_interval_secs: u64,
    /// Minimum spacing between signal-driven persists while online.
    pub write_sync_interval_secs: u64,
    /// Capacity of the context signal bus.
    pub signal_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_timeout_secs: 30 * 60,
            heartbeat_interval_secs: 60,
            write_sync_interval_secs: 5,
            signal_buffer: 64,
        }
    }
}

impl SessionConfig {
    /// Expiry threshold as a [`Duration`].
    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs)
    }

    /// Heartbeat interval as a [`Duration`].
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    /// Write-sync coalescing window as a [`Duration`].
    pub fn write_sync_interval(&self) -> Duration {
        Duration::from_secs(self.write_sync_interval_secs)
    }

    /// Parse a configuration from TOML. Missing fields take defaults.
    pub fn from_toml_str(raw: &str) -> SessionResult<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Load a configuration file from disk.
    pub async fn load(path: impl AsRef<Path>) -> SessionResult<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path).await?;
        let config = Self::from_toml_str(&raw)?;
        info!(path = %path.display(), "session config loaded");
        Ok(config)
    }
}

// ── tests ────────────────────────────────────────────────────────────
