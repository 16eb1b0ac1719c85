//! Configuration management.
//!
//! This module provides functions for locating the Charter Sync directory,
//! resolving the cache database path, the remote store URL and the device
//! identity, and loading `config.json`.
//!
//! # Layout
//!
//! - **Database**: one per device at `~/.charter-sync/data/cache.db`
//! - **Settings**: `~/.charter-sync/config.json`

mod settings;

pub use settings::{Settings, config_path, load_settings, save_settings};

use crate::error::Result;

use std::path::{Path, PathBuf};

/// Get the global Charter Sync directory location.
#[must_use]
pub fn global_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".charter-sync"))
}

/// Check if test mode is enabled.
///
/// Test mode is enabled by setting `CHARTER_SYNC_TEST_DB=1` (or any
/// non-empty value other than `0`/`false`). It redirects the cache to an
/// isolated test database.
#[must_use]
pub fn is_test_mode() -> bool {
    std::env::var("CHARTER_SYNC_TEST_DB").is_ok_and(|v| is_truthy(&v))
}

fn is_truthy(value: &str) -> bool {
    !value.is_empty() && value != "0" && !value.eq_ignore_ascii_case("false")
}

/// Get the test database path (`~/.charter-sync/test/cache.db`).
#[must_use]
pub fn test_db_path() -> Option<PathBuf> {
    global_dir().map(|dir| dir.join("test").join("cache.db"))
}

/// Resolve the cache database path.
///
/// Priority:
/// 1. If `explicit_path` is provided, use it directly
/// 2. `CHARTER_SYNC_TEST_DB` environment variable → test database
/// 3. `CHARTER_SYNC_DB` environment variable
/// 4. Global location: `~/.charter-sync/data/cache.db`
#[must_use]
pub fn resolve_db_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return Some(path.to_path_buf());
    }

    if is_test_mode() {
        return test_db_path();
    }

    if let Ok(db_path) = std::env::var("CHARTER_SYNC_DB") {
        if !db_path.trim().is_empty() {
            return Some(PathBuf::from(db_path));
        }
    }

    global_dir().map(|dir| dir.join("data").join("cache.db"))
}

/// Resolve the remote store base URL.
///
/// Priority:
/// 1. Explicit `--remote` flag (clap also maps `CHARTER_SYNC_REMOTE` onto it)
/// 2. `remote_url` in `config.json`
///
/// `None` means no remote store: the sync layer works from the cache only.
#[must_use]
pub fn resolve_remote_url(explicit: Option<&str>, settings: &Settings) -> Option<String> {
    explicit
        .map(str::to_string)
        .or_else(|| settings.remote_url.clone())
        .filter(|url| !url.trim().is_empty())
}

/// Resolve this device's identifier.
///
/// Priority:
/// 1. Explicit `--device` flag
/// 2. `device_id` in `config.json`
/// 3. A new random id, persisted to `config.json` for next time
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be read.
pub fn resolve_device_id(explicit: Option<&str>) -> Result<String> {
    if let Some(id) = explicit.filter(|id| !id.trim().is_empty()) {
        return Ok(id.to_string());
    }

    let mut settings = load_settings()?;
    if let Some(id) = settings.device_id.clone() {
        return Ok(id);
    }

    let id = format!("dev_{}", uuid::Uuid::new_v4().simple());
    settings.device_id = Some(id.clone());
    if let Err(e) = save_settings(&settings) {
        // still usable for this run
        tracing::warn!(error = %e, "Could not persist device id");
    }
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_db_path_with_explicit() {
        let explicit = PathBuf::from("/custom/path/cache.db");
        let result = resolve_db_path(Some(&explicit));
        assert_eq!(result, Some(explicit));
    }

    #[test]
    fn test_test_db_path_is_separate() {
        let global = global_dir().unwrap();
        let test = test_db_path().unwrap();

        assert!(test.to_string_lossy().contains("/test/"));
        assert!(test.ends_with("cache.db"));
        assert_ne!(global.join("data").join("cache.db"), test);
    }

    #[test]
    fn test_truthy_values() {
        assert!(!is_truthy(""));
        assert!(!is_truthy("0"));
        assert!(!is_truthy("FALSE"));
        assert!(is_truthy("1"));
        assert!(is_truthy("yes"));
    }

    #[test]
    fn test_remote_url_priority() {
        let settings = Settings {
            remote_url: Some("https://config.example.com".to_string()),
            ..Settings::default()
        };

        assert_eq!(
            resolve_remote_url(Some("https://flag.example.com"), &settings).as_deref(),
            Some("https://flag.example.com")
        );
        assert_eq!(
            resolve_remote_url(None, &settings).as_deref(),
            Some("https://config.example.com")
        );
        assert_eq!(resolve_remote_url(None, &Settings::default()), None);
    }

    #[test]
    fn test_explicit_device_id_wins() {
        assert_eq!(resolve_device_id(Some("tablet-3")).unwrap(), "tablet-3");
    }
}
