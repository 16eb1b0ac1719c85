//! SQLite local cache implementation.
//!
//! This is the per-device durable key/value store behind the sync layer.
//! Writes are synchronous and go through [`SqliteCache::mutate`], which
//! wraps the change and its audit entries in one IMMEDIATE transaction.

use crate::error::{Error, Result};
use crate::model::{EntityType, Key, SyncMetadata, WriteSource};
use crate::storage::log::{entries_for_key, insert_entry, LogEntry, LogKind};
use crate::storage::schema::apply_schema;
use crate::sync::{content_hash, has_changed};
use rusqlite::{Connection, OptionalExtension, Transaction};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// SQLite-based local cache.
///
/// The connection sits behind a mutex so one cache can be shared between the
/// orchestrator, the refresh scheduler and the migration importer.
#[derive(Debug)]
pub struct SqliteCache {
    conn: Mutex<Connection>,
}

/// A cached copy of one record.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheRecord {
    /// Raw cache key. Canonical for current records, free-form for legacy ones.
    pub key: String,
    /// `None` for legacy records.
    pub entity_type: Option<EntityType>,
    pub payload: Value,
    pub metadata: SyncMetadata,
    /// Unix milliseconds of the cache write.
    pub cached_at: i64,
    /// The remote store has not acknowledged this version yet.
    pub dirty: bool,
    pub content_hash: String,
}

impl CacheRecord {
    /// Parse the raw key back into a typed key, if it is canonical.
    #[must_use]
    pub fn canonical_key(&self) -> Option<Key> {
        self.entity_type.and_then(|_| self.key.parse().ok())
    }
}

/// Result of writing a record to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PutOutcome {
    /// The payload differs from the previously cached one (or is new).
    pub changed: bool,
}

/// Summary of cache contents.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheCounts {
    /// Canonical records per entity type.
    pub by_type: BTreeMap<EntityType, usize>,
    /// Records waiting for a remote write.
    pub dirty: usize,
    /// Pre-canonical records not yet handled by the migration importer.
    pub legacy: usize,
}

impl CacheCounts {
    /// Total canonical records.
    #[must_use]
    pub fn total(&self) -> usize {
        self.by_type.values().sum()
    }
}

/// Outcome of one legacy record in the migration importer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationOutcome {
    Uploaded,
    Skipped,
    Failed,
    Invalid,
}

impl MigrationOutcome {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Uploaded => "uploaded",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
            Self::Invalid => "invalid",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "uploaded" => Some(Self::Uploaded),
            "skipped" => Some(Self::Skipped),
            "failed" => Some(Self::Failed),
            "invalid" => Some(Self::Invalid),
            _ => None,
        }
    }
}

impl SqliteCache {
    /// Open a cache at the given path.
    ///
    /// Creates the database and applies schema if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_timeout(path, None)
    }

    /// Open a cache with an optional busy timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open_with_timeout(path: &Path, timeout_ms: Option<u64>) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_millis(timeout_ms.unwrap_or(5000)))?;
        apply_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory cache (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| Error::CachePoisoned)
    }

    /// Execute a write with the transaction protocol.
    ///
    /// Begins an IMMEDIATE transaction, runs the closure, appends the log
    /// entries it collected, and commits. Rolls back on error.
    ///
    /// # Errors
    ///
    /// Returns an error if any step fails.
    pub fn mutate<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Transaction, &mut Vec<LogEntry>) -> Result<R>,
    {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        let mut entries = Vec::new();
        let result = f(&tx, &mut entries)?;

        for entry in &entries {
            insert_entry(&tx, entry)?;
        }

        tx.commit()?;
        Ok(result)
    }

    // ==================
    // Record Operations
    // ==================

    /// Get the cached copy of a record.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the stored payload is corrupt.
    pub fn get(&self, key: &Key) -> Result<Option<CacheRecord>> {
        self.get_raw(&key.canonical())
    }

    /// Get a record by raw key (canonical or legacy).
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the stored payload is corrupt.
    pub fn get_raw(&self, key: &str) -> Result<Option<CacheRecord>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT key, entity_type, payload, source, updated_at, cached_at, dirty, content_hash
                 FROM cache_records WHERE key = ?1",
                [key],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, i64>(4)?,
                        row.get::<_, i64>(5)?,
                        row.get::<_, bool>(6)?,
                        row.get::<_, String>(7)?,
                    ))
                },
            )
            .optional()?;

        let Some((key, entity_type, payload, source, updated_at, cached_at, dirty, hash)) = row
        else {
            return Ok(None);
        };

        Ok(Some(CacheRecord {
            key,
            entity_type: entity_type.map(|t| t.parse()).transpose()?,
            payload: serde_json::from_str(&payload)?,
            metadata: SyncMetadata {
                source: source.parse()?,
                updated_at,
            },
            cached_at,
            dirty,
            content_hash: hash,
        }))
    }

    /// Write a record, replacing any cached copy.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn put(
        &self,
        key: &Key,
        payload: &Value,
        metadata: SyncMetadata,
        dirty: bool,
        device_id: &str,
    ) -> Result<PutOutcome> {
        let raw_key = key.canonical();
        let hash = content_hash(payload);
        let body = serde_json::to_string(payload)?;
        let now = chrono::Utc::now().timestamp_millis();

        self.mutate(|tx, log| {
            let previous: Option<String> = tx
                .query_row(
                    "SELECT content_hash FROM cache_records WHERE key = ?1",
                    [&raw_key],
                    |row| row.get(0),
                )
                .optional()?;

            tx.execute(
                "INSERT INTO cache_records (key, entity_type, payload, source, updated_at, cached_at, dirty, content_hash)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(key) DO UPDATE SET
                    entity_type = excluded.entity_type,
                    payload = excluded.payload,
                    source = excluded.source,
                    updated_at = excluded.updated_at,
                    cached_at = excluded.cached_at,
                    dirty = excluded.dirty,
                    content_hash = excluded.content_hash",
                rusqlite::params![
                    raw_key,
                    key.entity_type().as_str(),
                    body,
                    metadata.source.as_str(),
                    metadata.updated_at,
                    now,
                    dirty,
                    hash,
                ],
            )?;

            log.push(
                LogEntry::new(&raw_key, LogKind::Cached, device_id)
                    .with_detail(metadata.source.as_str()),
            );

            Ok(PutOutcome {
                changed: has_changed(&hash, previous.as_deref()),
            })
        })
    }

    /// Write a record under a pre-canonical key.
    ///
    /// Older app versions wrote these; the migration importer reads them.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn put_legacy(&self, raw_key: &str, payload: &Value, updated_at: i64) -> Result<()> {
        let hash = content_hash(payload);
        let body = serde_json::to_string(payload)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO cache_records (key, entity_type, payload, source, updated_at, cached_at, dirty, content_hash)
             VALUES (?1, NULL, ?2, 'local', ?3, ?3, 0, ?4)",
            rusqlite::params![raw_key, body, updated_at, hash],
        )?;
        Ok(())
    }

    /// Record that the remote store acknowledged the cached version.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub fn mark_synced(&self, key: &Key, device_id: &str) -> Result<()> {
        let raw_key = key.canonical();
        self.mutate(|tx, log| {
            tx.execute(
                "UPDATE cache_records SET dirty = 0, source = 'remote' WHERE key = ?1",
                [&raw_key],
            )?;
            log.push(LogEntry::new(&raw_key, LogKind::RemoteSynced, device_id));
            Ok(())
        })
    }

    /// Remove a record from the cache.
    ///
    /// Returns `true` if a record was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn delete(&self, key: &Key, device_id: &str) -> Result<bool> {
        let raw_key = key.canonical();
        self.mutate(|tx, log| {
            let removed = tx.execute("DELETE FROM cache_records WHERE key = ?1", [&raw_key])?;
            if removed > 0 {
                log.push(LogEntry::new(&raw_key, LogKind::Deleted, device_id));
            }
            Ok(removed > 0)
        })
    }

    // ==================
    // Scans
    // ==================

    /// Every canonical key in the cache, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn canonical_keys(&self) -> Result<Vec<Key>> {
        self.scan_keys("SELECT key FROM cache_records WHERE entity_type IS NOT NULL ORDER BY key")
    }

    /// Keys whose latest version has not reached the remote store.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn dirty_keys(&self) -> Result<Vec<Key>> {
        self.scan_keys(
            "SELECT key FROM cache_records WHERE dirty = 1 AND entity_type IS NOT NULL ORDER BY key",
        )
    }

    fn scan_keys(&self, sql: &str) -> Result<Vec<Key>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql)?;
        let raw: Vec<String> = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<_, _>>()?;
        raw.iter().map(|k| k.parse()).collect()
    }

    /// Legacy keys following the naming convention of `entity_type`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn legacy_keys(&self, entity_type: EntityType) -> Result<Vec<String>> {
        let prefix = entity_type.legacy_prefix();
        let conn = self.lock()?;
        // substr instead of LIKE: `_` is a LIKE wildcard
        let mut stmt = conn.prepare(
            "SELECT key FROM cache_records
             WHERE entity_type IS NULL AND substr(key, 1, ?2) = ?1
             ORDER BY key",
        )?;
        let keys = stmt
            .query_map(rusqlite::params![prefix, prefix.chars().count()], |row| {
                row.get(0)
            })?
            .collect::<std::result::Result<_, _>>()?;
        Ok(keys)
    }

    /// Record counts for status display.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn counts(&self) -> Result<CacheCounts> {
        let conn = self.lock()?;
        let mut counts = CacheCounts::default();

        let mut stmt = conn.prepare(
            "SELECT entity_type, COUNT(*) FROM cache_records
             WHERE entity_type IS NOT NULL GROUP BY entity_type",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, usize>(1)?))
        })?;
        for row in rows {
            let (entity_type, n) = row?;
            counts.by_type.insert(entity_type.parse()?, n);
        }

        counts.dirty = conn.query_row(
            "SELECT COUNT(*) FROM cache_records WHERE dirty = 1",
            [],
            |row| row.get(0),
        )?;
        counts.legacy = conn.query_row(
            "SELECT COUNT(*) FROM cache_records c
             WHERE c.entity_type IS NULL
               AND NOT EXISTS (
                   SELECT 1 FROM migration_runs m
                   WHERE m.legacy_key = c.key AND m.outcome IN ('uploaded', 'skipped')
               )",
            [],
            |row| row.get(0),
        )?;

        Ok(counts)
    }

    // ==================
    // Audit and Migration Bookkeeping
    // ==================

    /// Append a log entry outside of a record write.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn log(&self, entry: &LogEntry) -> Result<()> {
        let conn = self.lock()?;
        insert_entry(&conn, entry)?;
        Ok(())
    }

    /// Recent log entries for a key, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn history(&self, key: &Key, limit: Option<u32>) -> Result<Vec<LogEntry>> {
        let conn = self.lock()?;
        Ok(entries_for_key(&conn, &key.canonical(), limit)?)
    }

    /// Store the outcome of migrating one legacy record.
    ///
    /// # Errors
    ///
    /// Returns an error if the upsert fails.
    pub fn record_migration(
        &self,
        legacy_key: &str,
        canonical: Option<&Key>,
        outcome: MigrationOutcome,
        error: Option<&str>,
        device_id: &str,
    ) -> Result<()> {
        let canonical = canonical.map(Key::canonical);
        let now = chrono::Utc::now().timestamp_millis();
        let kind = match outcome {
            MigrationOutcome::Uploaded => LogKind::Migrated,
            MigrationOutcome::Skipped => LogKind::MigrationSkipped,
            MigrationOutcome::Failed | MigrationOutcome::Invalid => LogKind::MigrationFailed,
        };

        self.mutate(|tx, log| {
            tx.execute(
                "INSERT INTO migration_runs (legacy_key, canonical_key, outcome, attempts, last_error, updated_at)
                 VALUES (?1, ?2, ?3, 1, ?4, ?5)
                 ON CONFLICT(legacy_key) DO UPDATE SET
                    canonical_key = excluded.canonical_key,
                    outcome = excluded.outcome,
                    attempts = migration_runs.attempts + 1,
                    last_error = excluded.last_error,
                    updated_at = excluded.updated_at",
                rusqlite::params![legacy_key, canonical, outcome.as_str(), error, now],
            )?;

            let mut entry = LogEntry::new(canonical.as_deref().unwrap_or(legacy_key), kind, device_id);
            if let Some(error) = error {
                entry = entry.with_detail(error);
            }
            log.push(entry);
            Ok(())
        })
    }

    /// Last recorded migration outcome and attempt count of a legacy key.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn migration_status(&self, legacy_key: &str) -> Result<Option<(MigrationOutcome, u32)>> {
        let conn = self.lock()?;
        let row: Option<(String, u32)> = conn
            .query_row(
                "SELECT outcome, attempts FROM migration_runs WHERE legacy_key = ?1",
                [legacy_key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        Ok(row.and_then(|(outcome, attempts)| {
            MigrationOutcome::parse(&outcome).map(|o| (o, attempts))
        }))
    }
}
