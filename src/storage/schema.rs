//! Local cache schema definitions.
//!
//! The cache is a single SQLite database per device. All entity types share
//! the `cache_records` table; their keys live in disjoint namespaces
//! (`checklist:…`, `archive:…`), so no cross-entity locking is needed.

use rusqlite::{Connection, Result};

/// Current schema version for migration tracking.
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// The complete SQL schema for the local cache.
///
/// Timestamps are INTEGER Unix milliseconds.
pub const SCHEMA_SQL: &str = r"
-- ====================
-- Schema Version Tracking
-- ====================

CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at INTEGER NOT NULL
);

-- ====================
-- Cache Records
-- ====================

-- One row per cached record. `entity_type` is NULL for pre-canonical
-- (legacy) keys, which only the migration importer reads.
CREATE TABLE IF NOT EXISTS cache_records (
    key TEXT PRIMARY KEY,
    entity_type TEXT,
    payload TEXT NOT NULL,
    source TEXT NOT NULL DEFAULT 'local' CHECK (source IN ('local', 'remote')),
    updated_at INTEGER NOT NULL,
    cached_at INTEGER NOT NULL,
    dirty INTEGER NOT NULL DEFAULT 0,
    content_hash TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_cache_records_type ON cache_records(entity_type);

-- ====================
-- Sync Log
-- ====================

-- Append-only audit of cache writes, remote outcomes and migrations.
CREATE TABLE IF NOT EXISTS sync_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    key TEXT NOT NULL,
    kind TEXT NOT NULL,
    device_id TEXT NOT NULL,
    detail TEXT,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sync_log_key ON sync_log(key, created_at);

-- ====================
-- Legacy Migration Runs
-- ====================

CREATE TABLE IF NOT EXISTS migration_runs (
    legacy_key TEXT PRIMARY KEY,
    canonical_key TEXT,
    outcome TEXT NOT NULL CHECK (outcome IN ('uploaded', 'skipped', 'failed', 'invalid')),
    attempts INTEGER NOT NULL DEFAULT 1,
    last_error TEXT,
    updated_at INTEGER NOT NULL
);
";

/// Indexes on columns that older caches only gain through migrations.
///
/// Applied after [`super::migrations::run_migrations`].
pub const MIGRATED_INDEX_SQL: &str = r"
CREATE INDEX IF NOT EXISTS idx_cache_records_dirty ON cache_records(dirty) WHERE dirty = 1;
";

/// Apply the schema to the database.
///
/// Idempotent: every statement uses `IF NOT EXISTS`.
///
/// # Errors
///
/// Returns an error if the SQL execution fails or pragmas cannot be set.
pub fn apply_schema(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;

    conn.execute_batch(SCHEMA_SQL)?;

    // Run migrations for existing databases
    super::migrations::run_migrations(conn)?;
    conn.execute_batch(MIGRATED_INDEX_SQL)?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
        rusqlite::params![
            format!("v{CURRENT_SCHEMA_VERSION}"),
            chrono::Utc::now().timestamp_millis()
        ],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_schema() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).expect("Failed to apply schema");

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        assert!(tables.contains(&"cache_records".to_string()));
        assert!(tables.contains(&"sync_log".to_string()));
        assert!(tables.contains(&"migration_runs".to_string()));
        assert!(tables.contains(&"schema_migrations".to_string()));
    }

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).expect("First apply failed");
        apply_schema(&conn).expect("Second apply failed");
    }

    #[test]
    fn test_upgrades_cache_without_tracking_columns() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE cache_records (
                key TEXT PRIMARY KEY,
                entity_type TEXT,
                payload TEXT NOT NULL,
                source TEXT NOT NULL DEFAULT 'local',
                updated_at INTEGER NOT NULL,
                cached_at INTEGER NOT NULL
            );
            CREATE TABLE migration_runs (
                legacy_key TEXT PRIMARY KEY,
                canonical_key TEXT,
                outcome TEXT NOT NULL,
                last_error TEXT,
                updated_at INTEGER NOT NULL
            );
            INSERT INTO cache_records (key, entity_type, payload, updated_at, cached_at)
            VALUES ('vessel:1', 'vessel', '{}', 0, 0);",
        )
        .unwrap();

        apply_schema(&conn).expect("Old cache should upgrade on open");

        let dirty: i64 = conn
            .query_row("SELECT dirty FROM cache_records WHERE key = 'vessel:1'", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(dirty, 0);

        let index: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name = 'idx_cache_records_dirty'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(index, 1);
    }

    #[test]
    fn test_source_constraint() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).unwrap();

        let ok = conn.execute(
            "INSERT INTO cache_records (key, payload, source, updated_at, cached_at, content_hash)
             VALUES ('vessel:1', '{}', 'remote', 0, 0, 'h')",
            [],
        );
        assert!(ok.is_ok());

        let bad = conn.execute(
            "INSERT INTO cache_records (key, payload, source, updated_at, cached_at, content_hash)
             VALUES ('vessel:2', '{}', 'elsewhere', 0, 0, 'h')",
            [],
        );
        assert!(bad.is_err());
    }
}
