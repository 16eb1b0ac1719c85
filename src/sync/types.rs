//! Sync types.
//!
//! Outcome and statistics types returned by the orchestrator and the
//! migration importer, plus the explicit context every sync call carries.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Identity of the caller making a sync call.
///
/// Passed explicitly instead of read from process-wide state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncContext {
    /// Stable identifier of this device, attached to remote writes.
    pub device_id: String,
    /// Booking currently selected in the UI, if any.
    pub booking: Option<String>,
}

impl SyncContext {
    #[must_use]
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            booking: None,
        }
    }

    #[must_use]
    pub fn with_booking(mut self, booking: impl Into<String>) -> Self {
        self.booking = Some(booking.into());
        self
    }
}

/// Result of a hybrid read.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutcome<T> {
    /// Fresh value from the remote store (now also cached).
    Remote(T),
    /// Remote unavailable or empty; value served from the local cache.
    Cached(T),
    /// Neither the remote store nor the cache has the record.
    NotFound,
}

impl<T> ReadOutcome<T> {
    /// The value, wherever it came from.
    #[must_use]
    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Remote(v) | Self::Cached(v) => Some(v),
            Self::NotFound => None,
        }
    }

    #[must_use]
    pub const fn value(&self) -> Option<&T> {
        match self {
            Self::Remote(v) | Self::Cached(v) => Some(v),
            Self::NotFound => None,
        }
    }

    #[must_use]
    pub const fn is_found(&self) -> bool {
        !matches!(self, Self::NotFound)
    }

    #[must_use]
    pub const fn is_cached(&self) -> bool {
        matches!(self, Self::Cached(_))
    }

    /// Short label for output: `remote`, `cache` or `not_found`.
    #[must_use]
    pub const fn origin(&self) -> &'static str {
        match self {
            Self::Remote(_) => "remote",
            Self::Cached(_) => "cache",
            Self::NotFound => "not_found",
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ReadOutcome<U> {
        match self {
            Self::Remote(v) => ReadOutcome::Remote(f(v)),
            Self::Cached(v) => ReadOutcome::Cached(f(v)),
            Self::NotFound => ReadOutcome::NotFound,
        }
    }
}

/// Result of a hybrid write.
///
/// A write never fails outright; these flags tell the caller how far it got.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SyncOutcome {
    /// The remote store acknowledged the write.
    pub synced: bool,
    /// The local cache holds the write.
    pub cached: bool,
}

impl SyncOutcome {
    /// Message to surface to the user, if the write did not fully sync.
    #[must_use]
    pub const fn warning(&self) -> Option<&'static str> {
        match (self.synced, self.cached) {
            (true, _) => None,
            (false, true) => Some("saved locally, not yet synced"),
            (false, false) => Some("not saved: cache and remote store both failed"),
        }
    }
}

/// Statistics for pushing dirty records.
#[derive(Debug, Default, Clone, Serialize)]
pub struct PushStats {
    /// Local versions accepted by the remote store.
    pub pushed: usize,
    /// Newer remote versions adopted into the cache instead.
    pub adopted: usize,
    /// Records still waiting for the remote store.
    pub failed: usize,
}

impl PushStats {
    #[must_use]
    pub fn total(&self) -> usize {
        self.pushed + self.adopted + self.failed
    }
}

/// Statistics for a full refresh.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshReport {
    pub push: PushStats,
    /// Records re-read from the remote store.
    pub refreshed: usize,
    /// Records whose content changed during the refresh.
    pub changed: usize,
    /// Records served from cache because the remote read failed.
    pub fell_back: usize,
    /// Records skipped because a local write is still unsynced.
    pub pending: usize,
    pub completed_at: DateTime<Utc>,
}

/// Statistics for a legacy migration run.
#[derive(Debug, Default, Clone, Serialize)]
pub struct MigrationStats {
    /// Legacy records found for the entity type.
    pub scanned: usize,
    /// Uploaded to the remote store.
    pub uploaded: usize,
    /// Already present remotely; left untouched.
    pub skipped: usize,
    /// Handled by an earlier run.
    pub already_migrated: usize,
    /// Legacy keys that do not follow the naming convention.
    pub invalid: usize,
    /// Remote errors; retried on the next run.
    pub failed: usize,
    /// `(legacy_key, error)` for every failed or invalid record.
    pub failures: Vec<(String, String)>,
}

impl MigrationStats {
    /// Returns true if every record was handled.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed == 0 && self.invalid == 0
    }
}
