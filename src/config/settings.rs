//! Settings file management.
//!
//! Loads and saves `~/.charter-sync/config.json`. Missing fields take their
//! defaults, so an empty or partial file is valid.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::scheduler::SchedulerConfig;

/// Contents of `config.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Base URL of the remote store.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_url: Option<String>,
    /// Stable identifier of this device.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    pub refresh_interval_minutes: u64,
    pub request_timeout_secs: u64,
    /// Pause before the refreshing flag clears.
    pub settle_delay_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            remote_url: None,
            device_id: None,
            refresh_interval_minutes: 5,
            request_timeout_secs: 10,
            settle_delay_ms: 400,
        }
    }
}

impl Settings {
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Scheduler timing derived from these settings.
    #[must_use]
    pub const fn scheduler(&self) -> SchedulerConfig {
        SchedulerConfig::every_minutes(self.refresh_interval_minutes)
            .with_settle_delay(Duration::from_millis(self.settle_delay_ms))
    }
}

/// Get the config file path.
///
/// # Errors
///
/// Returns `Config` if the home directory cannot be determined.
pub fn config_path() -> Result<PathBuf> {
    super::global_dir()
        .map(|dir| dir.join("config.json"))
        .ok_or_else(|| Error::Config("Could not determine home directory".into()))
}

/// Load settings from the default location.
///
/// # Errors
///
/// Returns `Config` if the file exists but cannot be read or parsed.
pub fn load_settings() -> Result<Settings> {
    load_settings_from(&config_path()?)
}

/// Save settings to the default location.
///
/// # Errors
///
/// Returns `Config` if the file cannot be written.
pub fn save_settings(settings: &Settings) -> Result<()> {
    save_settings_to(&config_path()?, settings)
}

fn load_settings_from(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Ok(Settings::default());
    }

    let content = fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read config file: {e}")))?;

    serde_json::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse config file: {e}")))
}

fn save_settings_to(path: &Path, settings: &Settings) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| Error::Config(format!("Failed to create config directory: {e}")))?;
    }

    let content = serde_json::to_string_pretty(settings)
        .map_err(|e| Error::Config(format!("Failed to serialize config: {e}")))?;

    fs::write(path, content).map_err(|e| Error::Config(format!("Failed to write config file: {e}")))
}
