//! Write provenance attached to every cached and remote record.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Where the last write of a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteSource {
    /// Written on this device and not yet confirmed by the remote store.
    Local,
    /// Fetched from, or acknowledged by, the remote store.
    Remote,
}

impl WriteSource {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
        }
    }
}

impl fmt::Display for WriteSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WriteSource {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(Self::Local),
            "remote" => Ok(Self::Remote),
            _ => Err(Error::Other(format!("Unknown write source: {s}"))),
        }
    }
}

/// Provenance of one version of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncMetadata {
    pub source: WriteSource,
    /// Unix milliseconds of the write that produced this version.
    pub updated_at: i64,
}

impl SyncMetadata {
    /// Metadata for a write made on this device right now.
    #[must_use]
    pub fn local_now() -> Self {
        Self {
            source: WriteSource::Local,
            updated_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    #[must_use]
    pub const fn remote(updated_at: i64) -> Self {
        Self {
            source: WriteSource::Remote,
            updated_at,
        }
    }
}
