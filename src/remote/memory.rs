//! In-process remote store.
//!
//! Behaves like the REST backend (last-write-wins upserts, not-found on
//! missing keys) but keeps everything in memory. It can be switched offline
//! and told to fail individual keys, which is how the fallback paths of the
//! sync layer are exercised.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{Fetched, RemoteRecord, RemoteResult, RemoteStore};
use crate::error::RemoteError;
use crate::model::Key;

#[derive(Debug, Default)]
struct State {
    records: BTreeMap<String, RemoteRecord>,
    offline: bool,
    failing: HashSet<String>,
    fetches: usize,
    upserts: usize,
}

/// In-memory remote store. Clones share the same records.
#[derive(Debug, Clone, Default)]
pub struct MemoryRemote {
    state: Arc<Mutex<State>>,
}

impl MemoryRemote {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every call fail as unreachable (or recover).
    pub fn set_offline(&self, offline: bool) {
        self.state().offline = offline;
    }

    /// Make calls for one key fail with a server error.
    pub fn fail_key(&self, key: &Key) {
        self.state().failing.insert(key.canonical());
    }

    /// Store a record directly, bypassing last-write-wins.
    pub fn insert(&self, key: &Key, record: RemoteRecord) {
        self.state().records.insert(key.canonical(), record);
    }

    /// Current record for a key.
    #[must_use]
    pub fn get(&self, key: &Key) -> Option<RemoteRecord> {
        self.state().records.get(&key.canonical()).cloned()
    }

    /// All records, keyed by canonical key.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, RemoteRecord> {
        self.state().records.clone()
    }

    /// Number of fetch calls received.
    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.state().fetches
    }

    /// Number of upsert calls received.
    #[must_use]
    pub fn upsert_count(&self) -> usize {
        self.state().upserts
    }

    fn check(state: &State, raw_key: &str) -> RemoteResult<()> {
        if state.offline {
            return Err(RemoteError::Unreachable("remote store offline".to_string()));
        }
        if state.failing.contains(raw_key) {
            return Err(RemoteError::Status {
                status: 500,
                body: "injected failure".to_string(),
            });
        }
        Ok(())
    }
}

impl RemoteStore for MemoryRemote {
    async fn fetch(&self, key: &Key) -> RemoteResult<Fetched> {
        let raw_key = key.canonical();
        let mut state = self.state();
        state.fetches += 1;
        Self::check(&state, &raw_key)?;

        Ok(state
            .records
            .get(&raw_key)
            .cloned()
            .map_or(Fetched::NotFound, Fetched::Found))
    }

    async fn upsert(&self, key: &Key, record: &RemoteRecord) -> RemoteResult<()> {
        let raw_key = key.canonical();
        let mut state = self.state();
        state.upserts += 1;
        Self::check(&state, &raw_key)?;

        // stored version wins ties
        let keep_stored = state
            .records
            .get(&raw_key)
            .is_some_and(|stored| stored.updated_at >= record.updated_at);
        if !keep_stored {
            state.records.insert(raw_key, record.clone());
        }
        Ok(())
    }
}
