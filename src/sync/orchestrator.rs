//! Hybrid read/write orchestration.
//!
//! Reads try the remote store first and fall back to the local cache; writes
//! land in the cache first and are then pushed to the remote store. Remote
//! failures never surface as errors here: reads degrade to cached data,
//! writes report `synced: false` and stay dirty until a later push.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use super::merge::{Winner, merge_exit_checklist, resolve};
use super::migrate::Migrator;
use super::types::{
    MigrationStats, PushStats, ReadOutcome, RefreshReport, SyncContext, SyncOutcome,
};
use crate::bus::{EventBus, SyncEvent};
use crate::error::Result;
use crate::model::{Checklist, Entity, EntityType, Key, Mode, SyncMetadata, WriteSource};
use crate::remote::{Fetched, RemoteRecord, RemoteStore};
use crate::storage::log::{LogEntry, LogKind};
use crate::storage::SqliteCache;

/// Coordinates the local cache, the remote store and the event bus.
pub struct SyncOrchestrator<R> {
    cache: Arc<SqliteCache>,
    remote: R,
    bus: EventBus,
    migrated: Mutex<HashSet<EntityType>>,
}

/// Exit checklist produced by [`SyncOrchestrator::open_exit_checklist`].
#[derive(Debug, Clone)]
pub struct ExitChecklist {
    pub checklist: Checklist,
    /// The booking has an entry checklist to inherit from.
    pub has_entry: bool,
    /// Set when the merged checklist differed from the stored one and was saved.
    pub saved: Option<SyncOutcome>,
}

impl<R: RemoteStore> SyncOrchestrator<R> {
    pub fn new(cache: Arc<SqliteCache>, remote: R, bus: EventBus) -> Self {
        Self {
            cache,
            remote,
            bus,
            migrated: Mutex::new(HashSet::new()),
        }
    }

    #[must_use]
    pub fn cache(&self) -> &SqliteCache {
        &self.cache
    }

    #[must_use]
    pub const fn remote(&self) -> &R {
        &self.remote
    }

    #[must_use]
    pub const fn bus(&self) -> &EventBus {
        &self.bus
    }

    // ==================
    // Reads
    // ==================

    /// Read a record, preferring the remote store.
    ///
    /// A successful remote read replaces the cached copy. On remote failure,
    /// a malformed response or a remote miss, the cached copy is returned.
    pub async fn hybrid_read(&self, ctx: &SyncContext, key: &Key) -> ReadOutcome<Value> {
        self.read_with(ctx, key, |v| Ok(v.clone())).await.0
    }

    /// Read a record and decode it into a typed entity.
    ///
    /// A remote payload that does not decode is treated like a remote
    /// failure and never reaches the cache.
    pub async fn read_entity<T: DeserializeOwned>(
        &self,
        ctx: &SyncContext,
        key: &Key,
    ) -> ReadOutcome<T> {
        self.read_with(ctx, key, |v| Ok(serde_json::from_value(v.clone())?))
            .await
            .0
    }

    /// Core of every read. The flag reports whether the cached content changed.
    async fn read_with<T>(
        &self,
        ctx: &SyncContext,
        key: &Key,
        decode: impl Fn(&Value) -> Result<T> + Send,
    ) -> (ReadOutcome<T>, bool) {
        match self.remote.fetch(key).await {
            Ok(Fetched::Found(record)) => match decode(&record.payload) {
                Ok(value) => {
                    let changed = self.adopt_remote(ctx, key, &record);
                    return (ReadOutcome::Remote(value), changed);
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "Malformed remote record, using cache");
                    self.log_remote_failure(ctx, key, &e.to_string());
                }
            },
            Ok(Fetched::NotFound) => {
                debug!(key = %key, "Not found remotely, checking cache");
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Remote read failed, using cache");
                self.log_remote_failure(ctx, key, &e.to_string());
            }
        }

        (self.read_cached(key, &decode), false)
    }

    fn read_cached<T>(&self, key: &Key, decode: &impl Fn(&Value) -> Result<T>) -> ReadOutcome<T> {
        match self.cache.get(key) {
            Ok(Some(record)) => match decode(&record.payload) {
                Ok(value) => ReadOutcome::Cached(value),
                Err(e) => {
                    warn!(key = %key, error = %e, "Cached record does not decode");
                    ReadOutcome::NotFound
                }
            },
            Ok(None) => ReadOutcome::NotFound,
            Err(e) => {
                error!(key = %key, error = %e, "Cache read failed");
                ReadOutcome::NotFound
            }
        }
    }

    /// Store a remote version in the cache. Returns true if the content changed.
    fn adopt_remote(&self, ctx: &SyncContext, key: &Key, record: &RemoteRecord) -> bool {
        match self
            .cache
            .put(key, &record.payload, record.metadata(), false, &ctx.device_id)
        {
            Ok(outcome) => {
                if outcome.changed {
                    self.bus.publish(&SyncEvent::RecordChanged {
                        key: key.clone(),
                        source: WriteSource::Remote,
                    });
                }
                outcome.changed
            }
            Err(e) => {
                error!(key = %key, error = %e, "Failed to cache remote record");
                false
            }
        }
    }

    fn log_remote_failure(&self, ctx: &SyncContext, key: &Key, detail: &str) {
        let entry =
            LogEntry::new(&key.canonical(), LogKind::RemoteFailed, &ctx.device_id).with_detail(detail);
        if let Err(e) = self.cache.log(&entry) {
            debug!(error = %e, "Failed to append sync log");
        }
    }

    // ==================
    // Writes
    // ==================

    /// Write a record to the cache, then to the remote store.
    ///
    /// The cache write completes before the remote write starts, so a read on
    /// this device always sees at least its own latest write.
    pub async fn hybrid_write(&self, ctx: &SyncContext, key: &Key, payload: &Value) -> SyncOutcome {
        let metadata = SyncMetadata::local_now();

        let cached = match self.cache.put(key, payload, metadata, true, &ctx.device_id) {
            Ok(outcome) => {
                if outcome.changed {
                    self.bus.publish(&SyncEvent::RecordChanged {
                        key: key.clone(),
                        source: WriteSource::Local,
                    });
                }
                true
            }
            Err(e) => {
                error!(key = %key, error = %e, "Cache write failed");
                false
            }
        };

        let record = RemoteRecord {
            payload: payload.clone(),
            updated_at: metadata.updated_at,
            device_id: Some(ctx.device_id.clone()),
        };

        let synced = match self.remote.upsert(key, &record).await {
            Ok(()) => {
                if cached {
                    if let Err(e) = self.cache.mark_synced(key, &ctx.device_id) {
                        error!(key = %key, error = %e, "Failed to clear dirty flag");
                    }
                }
                true
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Remote write failed, kept locally");
                self.log_remote_failure(ctx, key, &e.to_string());
                false
            }
        };

        SyncOutcome { synced, cached }
    }

    /// Serialize an entity and write it under its own key.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity has no valid key or does not serialize.
    /// Cache and remote failures are reported in the outcome instead.
    pub async fn save<T: Entity + Serialize + Sync>(
        &self,
        ctx: &SyncContext,
        entity: &T,
    ) -> Result<SyncOutcome> {
        let key = entity.key()?;
        let payload = serde_json::to_value(entity)?;
        Ok(self.hybrid_write(ctx, &key, &payload).await)
    }

    /// Remove a record from the local cache only.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache delete fails.
    pub fn delete_local(&self, ctx: &SyncContext, key: &Key) -> Result<bool> {
        self.cache.delete(key, &ctx.device_id)
    }

    // ==================
    // Push and Refresh
    // ==================

    /// Push every dirty record to the remote store.
    ///
    /// When the remote store holds a newer version, that version replaces
    /// the local one instead (last-write-wins).
    ///
    /// # Errors
    ///
    /// Returns an error only if the cache cannot be scanned or a dirty
    /// record cannot be read back.
    pub async fn push_pending(&self, ctx: &SyncContext) -> Result<PushStats> {
        let mut stats = PushStats::default();

        for key in self.cache.dirty_keys()? {
            let Some(local) = self.cache.get(&key)? else {
                continue;
            };

            let remote = match self.remote.fetch(&key).await {
                Ok(Fetched::Found(record)) => Some(record),
                Ok(Fetched::NotFound) => None,
                Err(e) => {
                    warn!(key = %key, error = %e, "Remote unavailable, push deferred");
                    stats.failed += 1;
                    continue;
                }
            };

            if let Some(remote) = remote {
                if resolve(&local.metadata, &remote.metadata()) == Winner::Remote {
                    info!(key = %key, "Remote version is newer, adopting it");
                    self.adopt_remote(ctx, &key, &remote);
                    let entry =
                        LogEntry::new(&key.canonical(), LogKind::RemoteAdopted, &ctx.device_id);
                    if let Err(e) = self.cache.log(&entry) {
                        debug!(error = %e, "Failed to append sync log");
                    }
                    stats.adopted += 1;
                    continue;
                }
            }

            let record = RemoteRecord {
                payload: local.payload,
                updated_at: local.metadata.updated_at,
                device_id: Some(ctx.device_id.clone()),
            };
            match self.remote.upsert(&key, &record).await {
                Ok(()) => {
                    // stays dirty; the next push resolves it against the remote copy
                    if let Err(e) = self.cache.mark_synced(&key, &ctx.device_id) {
                        error!(key = %key, error = %e, "Failed to clear dirty flag");
                    }
                    stats.pushed += 1;
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "Push failed");
                    self.log_remote_failure(ctx, &key, &e.to_string());
                    stats.failed += 1;
                }
            }
        }

        if stats.total() > 0 {
            info!(
                pushed = stats.pushed,
                adopted = stats.adopted,
                failed = stats.failed,
                "Pushed pending writes"
            );
        }
        Ok(stats)
    }

    /// Push pending writes, then re-read every cached record from the remote
    /// store and announce the refreshed keys on the bus.
    ///
    /// Records whose local write is still unsynced are left alone so an
    /// offline edit is not replaced by the older remote copy.
    ///
    /// # Errors
    ///
    /// Returns an error only if the cache cannot be scanned.
    pub async fn refresh_all(&self, ctx: &SyncContext) -> Result<RefreshReport> {
        let push = self.push_pending(ctx).await?;
        let pending: HashSet<Key> = self.cache.dirty_keys()?.into_iter().collect();

        let mut refreshed = Vec::new();
        let mut changed = 0;
        let mut fell_back = 0;

        for key in self.cache.canonical_keys()? {
            if pending.contains(&key) {
                continue;
            }
            let (outcome, did_change) = self.read_with(ctx, &key, |_| Ok(())).await;
            match outcome {
                ReadOutcome::Remote(()) => refreshed.push(key),
                ReadOutcome::Cached(()) | ReadOutcome::NotFound => fell_back += 1,
            }
            if did_change {
                changed += 1;
            }
        }

        let report = RefreshReport {
            push,
            refreshed: refreshed.len(),
            changed,
            fell_back,
            pending: pending.len(),
            completed_at: chrono::Utc::now(),
        };

        info!(
            refreshed = report.refreshed,
            changed = report.changed,
            fell_back = report.fell_back,
            pending = report.pending,
            "Refresh completed"
        );
        self.bus.publish(&SyncEvent::RefreshCompleted {
            keys: refreshed,
            at: report.completed_at,
        });
        Ok(report)
    }

    // ==================
    // Checklists and Selection
    // ==================

    /// Load both checklists of a booking and derive the exit checklist.
    ///
    /// The merged result is saved when it differs from the stored exit
    /// checklist.
    ///
    /// # Errors
    ///
    /// Returns `InvalidKey` for an unusable booking code.
    pub async fn open_exit_checklist(
        &self,
        ctx: &SyncContext,
        booking: &str,
    ) -> Result<ExitChecklist> {
        let entry_key = Key::checklist(booking, Mode::Entry)?;
        let exit_key = Key::checklist(booking, Mode::Exit)?;

        let entry = self.read_entity::<Checklist>(ctx, &entry_key).await.into_option();
        let exit = self.read_entity::<Checklist>(ctx, &exit_key).await.into_option();

        let checklist = merge_exit_checklist(booking, entry.as_ref(), exit.as_ref());
        let unchanged = exit.as_ref() == Some(&checklist);
        let saved = if unchanged || (entry.is_none() && exit.is_none()) {
            None
        } else {
            Some(self.save(ctx, &checklist).await?)
        };

        Ok(ExitChecklist {
            checklist,
            has_entry: entry.is_some(),
            saved,
        })
    }

    /// Change the selected booking and announce it on the bus.
    pub fn select_booking(&self, ctx: &mut SyncContext, booking: Option<String>) {
        if ctx.booking == booking {
            return;
        }
        ctx.booking.clone_from(&booking);
        self.bus
            .publish(&SyncEvent::BookingSelectionChanged { booking });
    }

    // ==================
    // Legacy Migration
    // ==================

    /// Upload legacy records of one entity type, at most once per session.
    ///
    /// Returns `None` if this orchestrator already ran the migration for
    /// `entity_type`.
    ///
    /// # Errors
    ///
    /// Returns an error only if the cache cannot be scanned.
    pub async fn migrate_once(
        &self,
        ctx: &SyncContext,
        entity_type: EntityType,
    ) -> Result<Option<MigrationStats>> {
        let first = self
            .migrated
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(entity_type);
        if !first {
            debug!(%entity_type, "Legacy migration already ran this session");
            return Ok(None);
        }

        let stats = Migrator::new(&self.cache, &self.remote)
            .migrate_legacy_records(ctx, entity_type)
            .await;
        if stats.is_err() {
            // allow a retry after a scan failure
            self.migrated
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&entity_type);
        }
        stats.map(Some)
    }
}

impl<R> std::fmt::Debug for SyncOrchestrator<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncOrchestrator")
            .field("cache", &self.cache)
            .field("bus", &self.bus)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::Topic;
    use crate::model::{ChecklistItem, ChecklistSection, Vessel};
    use crate::remote::MemoryRemote;
    use serde_json::json;

    fn setup() -> (SyncOrchestrator<MemoryRemote>, MemoryRemote, SyncContext) {
        let cache = Arc::new(SqliteCache::open_memory().unwrap());
        let remote = MemoryRemote::new();
        let orchestrator = SyncOrchestrator::new(cache, remote.clone(), EventBus::new());
        (orchestrator, remote, SyncContext::new("dev-1"))
    }

    fn vessel_key(id: &str) -> Key {
        Key::new(EntityType::Vessel, id).unwrap()
    }

    fn remote_record(payload: Value, updated_at: i64) -> RemoteRecord {
        RemoteRecord {
            payload,
            updated_at,
            device_id: Some("dev-2".to_string()),
        }
    }

    #[tokio::test]
    async fn test_read_prefers_remote_and_caches_it() {
        let (orch, remote, ctx) = setup();
        let key = vessel_key("7");
        remote.insert(&key, remote_record(json!({"name": "Sea Breeze"}), 100));

        let outcome = orch.hybrid_read(&ctx, &key).await;
        assert_eq!(outcome, ReadOutcome::Remote(json!({"name": "Sea Breeze"})));

        let cached = orch.cache().get(&key).unwrap().unwrap();
        assert_eq!(cached.payload, json!({"name": "Sea Breeze"}));
        assert_eq!(cached.metadata, SyncMetadata::remote(100));
        assert!(!cached.dirty);
    }

    #[tokio::test]
    async fn test_read_falls_back_to_cache_when_offline() {
        let (orch, remote, ctx) = setup();
        let key = vessel_key("7");
        orch.hybrid_write(&ctx, &key, &json!({"name": "Sea Breeze"})).await;

        remote.set_offline(true);
        let outcome = orch.hybrid_read(&ctx, &key).await;
        assert_eq!(outcome, ReadOutcome::Cached(json!({"name": "Sea Breeze"})));

        let history = orch.cache().history(&key, None).unwrap();
        assert!(history.iter().any(|e| e.kind == LogKind::RemoteFailed));
    }

    #[tokio::test]
    async fn test_read_remote_miss_uses_cache() {
        let (orch, _remote, ctx) = setup();
        let key = vessel_key("7");
        orch.cache()
            .put(&key, &json!({"name": "Local"}), SyncMetadata::local_now(), true, "dev-1")
            .unwrap();

        let outcome = orch.hybrid_read(&ctx, &key).await;
        assert_eq!(outcome, ReadOutcome::Cached(json!({"name": "Local"})));
    }

    #[tokio::test]
    async fn test_read_missing_everywhere_is_not_found() {
        let (orch, remote, ctx) = setup();
        assert_eq!(orch.hybrid_read(&ctx, &vessel_key("1")).await, ReadOutcome::NotFound);

        remote.set_offline(true);
        assert_eq!(orch.hybrid_read(&ctx, &vessel_key("1")).await, ReadOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_malformed_remote_record_never_reaches_cache() {
        let (orch, remote, ctx) = setup();
        let key = vessel_key("7");
        let vessel = Vessel {
            id: "7".to_string(),
            name: "Sea Breeze".to_string(),
            model: None,
            home_port: None,
        };
        orch.cache()
            .put(&key, &serde_json::to_value(&vessel).unwrap(), SyncMetadata::remote(1), false, "dev-1")
            .unwrap();
        remote.insert(&key, remote_record(json!({"bogus": true}), 500));

        let outcome = orch.read_entity::<Vessel>(&ctx, &key).await;
        assert_eq!(outcome, ReadOutcome::Cached(vessel.clone()));

        let cached = orch.cache().get(&key).unwrap().unwrap();
        assert_eq!(cached.payload, serde_json::to_value(&vessel).unwrap());
    }

    #[tokio::test]
    async fn test_online_write_reaches_both_sides() {
        let (orch, remote, ctx) = setup();
        let key = vessel_key("7");

        let outcome = orch.hybrid_write(&ctx, &key, &json!({"name": "Sea Breeze"})).await;
        assert_eq!(outcome, SyncOutcome { synced: true, cached: true });
        assert!(outcome.warning().is_none());

        assert_eq!(remote.get(&key).unwrap().payload, json!({"name": "Sea Breeze"}));
        assert_eq!(remote.get(&key).unwrap().device_id.as_deref(), Some("dev-1"));
        assert!(!orch.cache().get(&key).unwrap().unwrap().dirty);
    }

    #[tokio::test]
    async fn test_offline_write_stays_dirty_until_pushed() {
        let (orch, remote, ctx) = setup();
        let key = vessel_key("7");

        remote.set_offline(true);
        let outcome = orch.hybrid_write(&ctx, &key, &json!({"name": "Sea Breeze"})).await;
        assert_eq!(outcome, SyncOutcome { synced: false, cached: true });
        assert_eq!(outcome.warning(), Some("saved locally, not yet synced"));
        assert!(orch.cache().get(&key).unwrap().unwrap().dirty);

        let stats = orch.push_pending(&ctx).await.unwrap();
        assert_eq!((stats.pushed, stats.failed), (0, 1));

        remote.set_offline(false);
        let stats = orch.push_pending(&ctx).await.unwrap();
        assert_eq!((stats.pushed, stats.adopted, stats.failed), (1, 0, 0));
        assert_eq!(remote.get(&key).unwrap().payload, json!({"name": "Sea Breeze"}));
        assert!(!orch.cache().get(&key).unwrap().unwrap().dirty);
    }

    #[tokio::test]
    async fn test_push_adopts_newer_remote_version() {
        let (orch, remote, ctx) = setup();
        let key = vessel_key("7");

        remote.set_offline(true);
        orch.hybrid_write(&ctx, &key, &json!({"name": "Local edit"})).await;
        let local_at = orch.cache().get(&key).unwrap().unwrap().metadata.updated_at;

        remote.insert(&key, remote_record(json!({"name": "Office edit"}), local_at + 60_000));
        remote.set_offline(false);

        let stats = orch.push_pending(&ctx).await.unwrap();
        assert_eq!((stats.pushed, stats.adopted), (0, 1));

        let cached = orch.cache().get(&key).unwrap().unwrap();
        assert_eq!(cached.payload, json!({"name": "Office edit"}));
        assert!(!cached.dirty);
        assert_eq!(remote.get(&key).unwrap().payload, json!({"name": "Office edit"}));
    }

    #[tokio::test]
    async fn test_push_overwrites_older_remote_version() {
        let (orch, remote, ctx) = setup();
        let key = vessel_key("7");

        remote.set_offline(true);
        orch.hybrid_write(&ctx, &key, &json!({"name": "Local edit"})).await;
        remote.insert(&key, remote_record(json!({"name": "Stale"}), 1));
        remote.set_offline(false);

        let stats = orch.push_pending(&ctx).await.unwrap();
        assert_eq!((stats.pushed, stats.adopted), (1, 0));
        assert_eq!(remote.get(&key).unwrap().payload, json!({"name": "Local edit"}));
    }

    #[tokio::test]
    async fn test_push_continues_when_dirty_flag_cannot_be_cleared() {
        let (orch, remote, ctx) = setup();
        remote.set_offline(true);
        orch.hybrid_write(&ctx, &vessel_key("1"), &json!({"name": "One"})).await;
        orch.hybrid_write(&ctx, &vessel_key("2"), &json!({"name": "Two"})).await;
        remote.set_offline(false);

        // every bookkeeping write now fails inside its transaction
        orch.cache()
            .mutate(|tx, _| Ok(tx.execute_batch("DROP TABLE sync_log")?))
            .unwrap();

        let stats = orch.push_pending(&ctx).await.unwrap();
        assert_eq!((stats.pushed, stats.failed), (2, 0));
        assert_eq!(remote.get(&vessel_key("1")).unwrap().payload, json!({"name": "One"}));
        assert_eq!(remote.get(&vessel_key("2")).unwrap().payload, json!({"name": "Two"}));
    }

    #[tokio::test]
    async fn test_offline_write_then_offline_read_returns_it() {
        let (orch, remote, ctx) = setup();
        let key: Key = "vessel:7:entry".parse().unwrap();
        let data = json!({"fuel": "full", "dinghy": true});

        remote.set_offline(true);
        let outcome = orch.hybrid_write(&ctx, &key, &data).await;
        assert!(!outcome.synced);
        assert!(outcome.cached);

        assert_eq!(orch.hybrid_read(&ctx, &key).await, ReadOutcome::Cached(data));
        assert_eq!(remote.upsert_count(), 1);
    }

    #[tokio::test]
    async fn test_later_write_wins_whatever_the_arrival_order() {
        let remote = MemoryRemote::new();
        let office = SyncOrchestrator::new(
            Arc::new(SqliteCache::open_memory().unwrap()),
            remote.clone(),
            EventBus::new(),
        );
        let tablet = SyncOrchestrator::new(
            Arc::new(SqliteCache::open_memory().unwrap()),
            remote.clone(),
            EventBus::new(),
        );
        let office_ctx = SyncContext::new("office");
        let tablet_ctx = SyncContext::new("tablet");
        let key = vessel_key("7");

        // T1: written on the tablet while the remote store is down
        remote.set_offline(true);
        tablet.hybrid_write(&tablet_ctx, &key, &json!({"name": "T1"})).await;
        remote.set_offline(false);
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        // T2: written in the office and delivered first
        let outcome = office.hybrid_write(&office_ctx, &key, &json!({"name": "T2"})).await;
        assert!(outcome.synced);

        // T1 reaches the remote store late
        let stats = tablet.push_pending(&tablet_ctx).await.unwrap();
        assert_eq!(stats.adopted, 1);
        let t1 = tablet.cache().get(&key).unwrap().unwrap();
        assert_eq!(t1.payload, json!({"name": "T2"}));

        let stale = RemoteRecord {
            payload: json!({"name": "T1"}),
            updated_at: 1,
            device_id: Some("tablet".to_string()),
        };
        remote.upsert(&key, &stale).await.unwrap();

        assert_eq!(
            office.hybrid_read(&office_ctx, &key).await,
            ReadOutcome::Remote(json!({"name": "T2"}))
        );
        assert_eq!(
            tablet.hybrid_read(&tablet_ctx, &key).await,
            ReadOutcome::Remote(json!({"name": "T2"}))
        );
    }

    #[tokio::test]
    async fn test_refresh_skips_pending_and_announces_keys() {
        let (orch, remote, ctx) = setup();
        let clean = vessel_key("1");
        let pending = vessel_key("2");

        orch.hybrid_write(&ctx, &clean, &json!({"name": "One"})).await;
        remote.fail_key(&pending);
        orch.hybrid_write(&ctx, &pending, &json!({"name": "Two"})).await;
        remote.insert(&clean, remote_record(json!({"name": "One, renamed"}), i64::MAX));

        let announced = Arc::new(Mutex::new(Vec::new()));
        let _sub = {
            let announced = Arc::clone(&announced);
            orch.bus().subscribe(Topic::RefreshCompleted, move |event| {
                if let SyncEvent::RefreshCompleted { keys, .. } = event {
                    announced.lock().unwrap().extend(keys.iter().cloned());
                }
            })
        };

        let report = orch.refresh_all(&ctx).await.unwrap();
        assert_eq!(report.push.failed, 1);
        assert_eq!(report.refreshed, 1);
        assert_eq!(report.changed, 1);
        assert_eq!(report.pending, 1);
        assert_eq!(report.fell_back, 0);
        assert_eq!(*announced.lock().unwrap(), vec![clean.clone()]);

        let cached = orch.cache().get(&pending).unwrap().unwrap();
        assert_eq!(cached.payload, json!({"name": "Two"}));
        assert!(cached.dirty);
        assert_eq!(
            orch.cache().get(&clean).unwrap().unwrap().payload,
            json!({"name": "One, renamed"})
        );
    }

    #[tokio::test]
    async fn test_record_changed_only_on_new_content() {
        let (orch, _remote, ctx) = setup();
        let key = vessel_key("7");
        let sources = Arc::new(Mutex::new(Vec::new()));
        let _sub = {
            let sources = Arc::clone(&sources);
            orch.bus().subscribe(Topic::RecordChanged, move |event| {
                if let SyncEvent::RecordChanged { source, .. } = event {
                    sources.lock().unwrap().push(*source);
                }
            })
        };

        orch.hybrid_write(&ctx, &key, &json!({"name": "A"})).await;
        orch.hybrid_write(&ctx, &key, &json!({"name": "A"})).await;
        orch.hybrid_read(&ctx, &key).await;
        assert_eq!(*sources.lock().unwrap(), vec![WriteSource::Local]);

        orch.hybrid_write(&ctx, &key, &json!({"name": "B"})).await;
        assert_eq!(sources.lock().unwrap().len(), 2);
    }

    fn entry_checklist() -> Checklist {
        let mut oil = ChecklistItem::new("oil", "Engine oil");
        oil.checked_at_entry = true;
        let filter = ChecklistItem::new("filter", "Fuel filter");
        Checklist {
            booking: "NAY-001".to_string(),
            mode: Mode::Entry,
            sections: vec![ChecklistSection {
                id: "engine".to_string(),
                title: "Engine room".to_string(),
                items: vec![oil, filter],
            }],
        }
    }

    #[tokio::test]
    async fn test_open_exit_checklist_inherits_and_saves_once() {
        let (orch, remote, ctx) = setup();
        orch.save(&ctx, &entry_checklist()).await.unwrap();

        let opened = orch.open_exit_checklist(&ctx, "NAY-001").await.unwrap();
        assert!(opened.has_entry);
        assert_eq!(opened.saved, Some(SyncOutcome { synced: true, cached: true }));
        assert_eq!(opened.checklist.mode, Mode::Exit);
        assert!(opened.checklist.item("oil").unwrap().checked_at_entry);
        assert!(!opened.checklist.item("filter").unwrap().checked_at_entry);

        let exit_key = Key::checklist("NAY-001", Mode::Exit).unwrap();
        assert!(remote.get(&exit_key).is_some());

        let reopened = orch.open_exit_checklist(&ctx, "NAY-001").await.unwrap();
        assert_eq!(reopened.saved, None);
        assert_eq!(reopened.checklist, opened.checklist);
    }

    #[tokio::test]
    async fn test_open_exit_checklist_without_any_checklist() {
        let (orch, remote, ctx) = setup();

        let opened = orch.open_exit_checklist(&ctx, "NAY-404").await.unwrap();
        assert!(!opened.has_entry);
        assert!(opened.saved.is_none());
        assert!(opened.checklist.sections.is_empty());
        assert_eq!(remote.upsert_count(), 0);
    }

    #[tokio::test]
    async fn test_select_booking_announces_changes_only() {
        let (orch, _remote, mut ctx) = setup();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let _sub = {
            let seen = Arc::clone(&seen);
            orch.bus().subscribe(Topic::BookingSelectionChanged, move |event| {
                if let SyncEvent::BookingSelectionChanged { booking } = event {
                    seen.lock().unwrap().push(booking.clone());
                }
            })
        };

        orch.select_booking(&mut ctx, Some("NAY-001".to_string()));
        orch.select_booking(&mut ctx, Some("NAY-001".to_string()));
        orch.select_booking(&mut ctx, None);

        assert_eq!(ctx.booking, None);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![Some("NAY-001".to_string()), None]
        );
    }

    #[tokio::test]
    async fn test_migrate_once_runs_once_per_type() {
        let (orch, remote, ctx) = setup();
        orch.cache()
            .put_legacy("checklist_NAY-001_entry", &json!({"booking": "NAY-001"}), 100)
            .unwrap();

        let first = orch.migrate_once(&ctx, EntityType::Checklist).await.unwrap();
        assert_eq!(first.map(|s| s.uploaded), Some(1));
        assert!(orch.migrate_once(&ctx, EntityType::Checklist).await.unwrap().is_none());

        let other = orch.migrate_once(&ctx, EntityType::Vessel).await.unwrap();
        assert_eq!(other.map(|s| s.scanned), Some(0));
        assert_eq!(remote.snapshot().len(), 1);
    }
}
