//! Legacy record migration.
//!
//! Earlier app versions cached records under ad-hoc keys such as
//! `checklist_NAY-001_entry` and never uploaded them. The importer maps each
//! legacy key to its canonical key and uploads the record if the remote store
//! does not have it yet. Each record is handled independently: a failure is
//! recorded and retried on the next run, the rest of the batch continues.

use tracing::{debug, info, warn};

use super::types::{MigrationStats, SyncContext};
use crate::error::Result;
use crate::model::{EntityType, Key, SyncMetadata};
use crate::remote::{Fetched, RemoteRecord, RemoteStore};
use crate::storage::{MigrationOutcome, SqliteCache};

/// Uploads legacy cache records of one entity type.
pub struct Migrator<'a, R> {
    cache: &'a SqliteCache,
    remote: &'a R,
}

impl<'a, R: RemoteStore> Migrator<'a, R> {
    #[must_use]
    pub const fn new(cache: &'a SqliteCache, remote: &'a R) -> Self {
        Self { cache, remote }
    }

    /// Scan the cache for legacy records of `entity_type` and upload the
    /// ones missing remotely.
    ///
    /// Running this twice yields the same remote record set as running it
    /// once: existing remote records are never overwritten.
    ///
    /// # Errors
    ///
    /// Returns an error only if the cache cannot be scanned. Per-record
    /// failures are collected in the returned stats.
    pub async fn migrate_legacy_records(
        &self,
        ctx: &SyncContext,
        entity_type: EntityType,
    ) -> Result<MigrationStats> {
        let mut stats = MigrationStats::default();
        let legacy_keys = self.cache.legacy_keys(entity_type)?;
        stats.scanned = legacy_keys.len();

        for legacy_key in legacy_keys {
            let Some(key) = Key::from_legacy(entity_type, &legacy_key) else {
                warn!(%legacy_key, "Legacy key does not map to a canonical key");
                self.record(&legacy_key, None, MigrationOutcome::Invalid, Some("unrecognised key"), ctx);
                stats.invalid += 1;
                stats
                    .failures
                    .push((legacy_key, "unrecognised key".to_string()));
                continue;
            };

            if let Ok(Some((MigrationOutcome::Uploaded | MigrationOutcome::Skipped, _))) =
                self.cache.migration_status(&legacy_key)
            {
                stats.already_migrated += 1;
                continue;
            }

            match self.migrate_one(ctx, &legacy_key, &key).await {
                Ok(MigrationOutcome::Uploaded) => stats.uploaded += 1,
                Ok(_) => stats.skipped += 1,
                Err(message) => {
                    warn!(%legacy_key, error = %message, "Legacy record migration failed");
                    self.record(&legacy_key, Some(&key), MigrationOutcome::Failed, Some(&message), ctx);
                    stats.failed += 1;
                    stats.failures.push((legacy_key, message));
                }
            }
        }

        info!(
            %entity_type,
            scanned = stats.scanned,
            uploaded = stats.uploaded,
            skipped = stats.skipped,
            failed = stats.failed,
            invalid = stats.invalid,
            "Legacy migration finished"
        );
        Ok(stats)
    }

    /// Upload one record. Errors are returned as messages for the stats.
    async fn migrate_one(
        &self,
        ctx: &SyncContext,
        legacy_key: &str,
        key: &Key,
    ) -> std::result::Result<MigrationOutcome, String> {
        let record = self
            .cache
            .get_raw(legacy_key)
            .map_err(|e| e.to_string())?
            .ok_or_else(|| "legacy record disappeared".to_string())?;

        match self.remote.fetch(key).await.map_err(|e| e.to_string())? {
            Fetched::Found(_) => {
                debug!(%legacy_key, key = %key, "Already present remotely");
                self.record(legacy_key, Some(key), MigrationOutcome::Skipped, None, ctx);
                return Ok(MigrationOutcome::Skipped);
            }
            Fetched::NotFound => {}
        }

        let upload = RemoteRecord {
            payload: record.payload,
            updated_at: record.metadata.updated_at,
            device_id: Some(ctx.device_id.clone()),
        };
        self.remote
            .upsert(key, &upload)
            .await
            .map_err(|e| e.to_string())?;

        // make the canonical copy readable offline unless a newer one exists
        if matches!(self.cache.get(key), Ok(None)) {
            let metadata = SyncMetadata::remote(upload.updated_at);
            if let Err(e) = self.cache.put(key, &upload.payload, metadata, false, &ctx.device_id) {
                warn!(key = %key, error = %e, "Failed to cache migrated record");
            }
        }

        debug!(%legacy_key, key = %key, "Uploaded legacy record");
        self.record(legacy_key, Some(key), MigrationOutcome::Uploaded, None, ctx);
        Ok(MigrationOutcome::Uploaded)
    }

    fn record(
        &self,
        legacy_key: &str,
        key: Option<&Key>,
        outcome: MigrationOutcome,
        error: Option<&str>,
        ctx: &SyncContext,
    ) {
        if let Err(e) = self
            .cache
            .record_migration(legacy_key, key, outcome, error, &ctx.device_id)
        {
            warn!(%legacy_key, error = %e, "Failed to record migration outcome");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Mode;
    use crate::remote::MemoryRemote;
    use serde_json::json;

    fn seeded_cache() -> SqliteCache {
        let cache = SqliteCache::open_memory().unwrap();
        cache
            .put_legacy("checklist_NAY-001_entry", &json!({"booking": "NAY-001"}), 100)
            .unwrap();
        cache
            .put_legacy("checklist_NAY-002_exit", &json!({"booking": "NAY-002"}), 200)
            .unwrap();
        cache
            .put_legacy("checklist_NAY-003", &json!({"booking": "NAY-003"}), 300)
            .unwrap();
        cache
            .put_legacy("floorplan_7", &json!({"vessel_id": "7"}), 400)
            .unwrap();
        cache
    }

    #[tokio::test]
    async fn test_uploads_missing_and_skips_present() {
        let cache = seeded_cache();
        let remote = MemoryRemote::new();
        let present = Key::checklist("NAY-002", Mode::Exit).unwrap();
        remote.insert(
            &present,
            RemoteRecord {
                payload: json!({"booking": "NAY-002", "remote": true}),
                updated_at: 999,
                device_id: None,
            },
        );
        let ctx = SyncContext::new("dev-1");

        let stats = Migrator::new(&cache, &remote)
            .migrate_legacy_records(&ctx, EntityType::Checklist)
            .await
            .unwrap();

        assert_eq!(stats.scanned, 3);
        assert_eq!(stats.uploaded, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.invalid, 1);
        assert_eq!(stats.failures[0].0, "checklist_NAY-003");

        let uploaded = remote
            .get(&Key::checklist("NAY-001", Mode::Entry).unwrap())
            .unwrap();
        assert_eq!(uploaded.payload, json!({"booking": "NAY-001"}));
        assert_eq!(uploaded.updated_at, 100);
        // the existing remote record is untouched
        assert_eq!(remote.get(&present).unwrap().updated_at, 999);
        // other entity types are left for their own run
        assert!(remote.get(&"floorplan:7".parse().unwrap()).is_none());
    }

    #[tokio::test]
    async fn test_second_run_is_idempotent() {
        let cache = seeded_cache();
        let remote = MemoryRemote::new();
        let ctx = SyncContext::new("dev-1");
        let migrator = Migrator::new(&cache, &remote);

        migrator
            .migrate_legacy_records(&ctx, EntityType::Checklist)
            .await
            .unwrap();
        let after_first = remote.snapshot();

        let second = migrator
            .migrate_legacy_records(&ctx, EntityType::Checklist)
            .await
            .unwrap();

        assert_eq!(remote.snapshot(), after_first);
        assert_eq!(after_first.len(), 2);
        assert_eq!(second.uploaded, 0);
        assert_eq!(second.already_migrated, 2);
    }

    #[tokio::test]
    async fn test_failed_record_is_isolated_and_retried() {
        let cache = seeded_cache();
        let remote = MemoryRemote::new();
        let failing = Key::checklist("NAY-001", Mode::Entry).unwrap();
        remote.fail_key(&failing);
        let ctx = SyncContext::new("dev-1");

        let stats = Migrator::new(&cache, &remote)
            .migrate_legacy_records(&ctx, EntityType::Checklist)
            .await
            .unwrap();

        assert_eq!(stats.failed, 1);
        assert_eq!(stats.uploaded, 1);
        assert!(!stats.is_complete());
        assert_eq!(
            cache.migration_status("checklist_NAY-001_entry").unwrap(),
            Some((MigrationOutcome::Failed, 1))
        );

        // a healthy remote picks the failed record up on the next run
        let healthy = MemoryRemote::new();
        let retry = Migrator::new(&cache, &healthy)
            .migrate_legacy_records(&ctx, EntityType::Checklist)
            .await
            .unwrap();
        assert_eq!(retry.uploaded, 1);
        assert!(healthy.get(&failing).is_some());
        assert_eq!(
            cache.migration_status("checklist_NAY-001_entry").unwrap(),
            Some((MigrationOutcome::Uploaded, 2))
        );
    }

    #[tokio::test]
    async fn test_migrated_record_is_cached_under_canonical_key() {
        let cache = seeded_cache();
        let remote = MemoryRemote::new();
        let ctx = SyncContext::new("dev-1");

        Migrator::new(&cache, &remote)
            .migrate_legacy_records(&ctx, EntityType::Floorplan)
            .await
            .unwrap();

        let cached = cache.get(&"floorplan:7".parse().unwrap()).unwrap().unwrap();
        assert_eq!(cached.payload, json!({"vessel_id": "7"}));
        assert!(!cached.dirty);
        assert_eq!(cache.counts().unwrap().legacy, 3);
    }
}
