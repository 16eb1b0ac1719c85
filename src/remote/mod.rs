//! Remote store client.
//!
//! The remote store is the system of record. Every call may fail; callers in
//! the sync layer turn failures into cache fallbacks instead of errors.
//!
//! # Backends
//!
//! - [`http::HttpRemote`] - REST backend over `reqwest`
//! - [`memory::MemoryRemote`] - in-process store with an offline switch, for
//!   tests and local demos

pub mod http;
pub mod memory;

pub use http::HttpRemote;
pub use memory::MemoryRemote;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RemoteError;
use crate::model::{Key, SyncMetadata};

/// Result type for remote calls.
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Envelope of a record as stored remotely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRecord {
    pub payload: Value,
    /// Unix milliseconds of the write that produced this version.
    pub updated_at: i64,
    /// Device that made the write, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
}

impl RemoteRecord {
    #[must_use]
    pub fn metadata(&self) -> SyncMetadata {
        SyncMetadata::remote(self.updated_at)
    }
}

/// Successful fetch: either the record or a definite "not there".
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched {
    Found(RemoteRecord),
    NotFound,
}

/// Trait for remote store backends.
///
/// Each entity endpoint supports fetch-by-key and upsert-by-key. The store
/// applies last-write-wins by `updated_at` on upsert.
pub trait RemoteStore: Send + Sync {
    /// Fetch the current version of a record.
    fn fetch(&self, key: &Key) -> impl std::future::Future<Output = RemoteResult<Fetched>> + Send;

    /// Create or replace a record.
    fn upsert(
        &self,
        key: &Key,
        record: &RemoteRecord,
    ) -> impl std::future::Future<Output = RemoteResult<()>> + Send;
}
