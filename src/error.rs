//! Error types for Charter Sync.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=cache, 3=not_found, 4=validation, etc.)
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers
//!
//! Remote failures have their own [`RemoteError`] type. The sync layer never
//! lets them escape a hybrid read or write; they only surface through the
//! CLI when a command talks to the remote store directly.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Charter Sync operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Cache (exit 2)
    NotInitialized,
    AlreadyInitialized,
    CacheError,

    // Not Found (exit 3)
    RecordNotFound,

    // Validation (exit 4)
    InvalidKey,
    InvalidArgument,

    // Remote (exit 6)
    RemoteError,

    // Config (exit 7)
    ConfigError,

    // I/O (exit 8)
    IoError,
    JsonError,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::NotInitialized => "NOT_INITIALIZED",
            Self::AlreadyInitialized => "ALREADY_INITIALIZED",
            Self::CacheError => "CACHE_ERROR",
            Self::RecordNotFound => "RECORD_NOT_FOUND",
            Self::InvalidKey => "INVALID_KEY",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::RemoteError => "REMOTE_ERROR",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::NotInitialized | Self::AlreadyInitialized | Self::CacheError => 2,
            Self::RecordNotFound => 3,
            Self::InvalidKey | Self::InvalidArgument => 4,
            Self::RemoteError => 6,
            Self::ConfigError => 7,
            Self::IoError | Self::JsonError => 8,
        }
    }

    /// Whether retrying the same operation later may succeed.
    ///
    /// True for remote failures (connectivity comes back) and cache
    /// contention. False for bad input or missing records.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::RemoteError | Self::CacheError)
    }
}

// ── Remote Error ──────────────────────────────────────────────

/// Failures talking to the remote store.
///
/// All three variants are treated the same way by the orchestrator
/// (fall back to cache, report `synced: false`); they are kept apart so the
/// logs say which one happened.
#[derive(Error, Debug)]
pub enum RemoteError {
    /// Network error, timeout, or the store is switched off.
    #[error("remote store unreachable: {0}")]
    Unreachable(String),

    /// Non-success HTTP status other than 404.
    #[error("remote store returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body could not be decoded.
    #[error("malformed remote response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Malformed(err.to_string())
        } else if let Some(status) = err.status() {
            Self::Status {
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else {
            Self::Unreachable(err.to_string())
        }
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in Charter Sync operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Not initialized: run `csync init` first")]
    NotInitialized,

    #[error("Already initialized at {path}")]
    AlreadyInitialized { path: PathBuf },

    #[error("Record not found: {key}")]
    RecordNotFound { key: String },

    #[error("Invalid key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("Cache error: {0}")]
    Cache(#[from] rusqlite::Error),

    #[error("Cache lock poisoned")]
    CachePoisoned,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotInitialized => ErrorCode::NotInitialized,
            Self::AlreadyInitialized { .. } => ErrorCode::AlreadyInitialized,
            Self::Cache(_) | Self::CachePoisoned => ErrorCode::CacheError,
            Self::RecordNotFound { .. } => ErrorCode::RecordNotFound,
            Self::InvalidKey { .. } => ErrorCode::InvalidKey,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Remote(_) => ErrorCode::RemoteError,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Context-aware recovery hint.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::NotInitialized => Some("Run `csync init` to create the local cache".to_string()),

            Self::AlreadyInitialized { path } => Some(format!(
                "Cache already exists at {}. Use `--force` to reinitialize.",
                path.display()
            )),

            Self::RecordNotFound { key } => Some(format!(
                "No copy of '{key}' locally or remotely. Write it first with `csync write {key} <json>`."
            )),

            Self::InvalidKey { .. } => Some(
                "Keys look like `<type>:<id>[:<mode>]`, e.g. `checklist:NAY-001:entry`. \
                 Types: vessel, bookings, checklist, floorplan, archive, winterization"
                    .to_string(),
            ),

            Self::Remote(_) => Some(
                "The remote store could not be reached. Local data is still available; \
                 run `csync push` once connectivity returns."
                    .to_string(),
            ),

            Self::Config(_) => {
                Some("Check ~/.charter-sync/config.json or pass --remote explicitly".to_string())
            }

            Self::Cache(_)
            | Self::CachePoisoned
            | Self::Io(_)
            | Self::Json(_)
            | Self::InvalidArgument(_)
            | Self::Other(_) => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}
