//! Sync audit log.
//!
//! Every cache write, remote outcome and legacy migration step is appended
//! to `sync_log` so a "saved locally, not yet synced" report can be traced
//! afterwards.

use rusqlite::{Connection, Result};

/// What happened to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    /// Written to the local cache.
    Cached,
    /// Remote store acknowledged a write.
    RemoteSynced,
    /// Remote read or write failed; the cache was used instead.
    RemoteFailed,
    /// Remote copy won last-write-wins and replaced the local one.
    RemoteAdopted,
    /// Removed from the local cache.
    Deleted,
    /// Legacy record uploaded by the migration importer.
    Migrated,
    /// Legacy record already present remotely.
    MigrationSkipped,
    /// Legacy record could not be migrated.
    MigrationFailed,
}

impl LogKind {
    /// Get the string representation for storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Cached => "cached",
            Self::RemoteSynced => "remote_synced",
            Self::RemoteFailed => "remote_failed",
            Self::RemoteAdopted => "remote_adopted",
            Self::Deleted => "deleted",
            Self::Migrated => "migrated",
            Self::MigrationSkipped => "migration_skipped",
            Self::MigrationFailed => "migration_failed",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "cached" => Some(Self::Cached),
            "remote_synced" => Some(Self::RemoteSynced),
            "remote_failed" => Some(Self::RemoteFailed),
            "remote_adopted" => Some(Self::RemoteAdopted),
            "deleted" => Some(Self::Deleted),
            "migrated" => Some(Self::Migrated),
            "migration_skipped" => Some(Self::MigrationSkipped),
            "migration_failed" => Some(Self::MigrationFailed),
            _ => None,
        }
    }
}

/// One audit row.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub id: i64,
    pub key: String,
    pub kind: LogKind,
    pub device_id: String,
    pub detail: Option<String>,
    pub created_at: i64,
}

impl LogEntry {
    /// Create a new entry (id will be assigned by database).
    #[must_use]
    pub fn new(key: &str, kind: LogKind, device_id: &str) -> Self {
        Self {
            id: 0,
            key: key.to_string(),
            kind,
            device_id: device_id.to_string(),
            detail: None,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Attach a free-form detail (usually an error message).
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Append an entry.
///
/// # Errors
///
/// Returns an error if the insert fails.
pub fn insert_entry(conn: &Connection, entry: &LogEntry) -> Result<i64> {
    conn.execute(
        "INSERT INTO sync_log (key, kind, device_id, detail, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![
            entry.key,
            entry.kind.as_str(),
            entry.device_id,
            entry.detail,
            entry.created_at,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Most recent entries for a key, newest first.
///
/// Rows with an unknown kind (written by a newer version) are skipped.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn entries_for_key(conn: &Connection, key: &str, limit: Option<u32>) -> Result<Vec<LogEntry>> {
    let limit = limit.unwrap_or(50);
    let mut stmt = conn.prepare(
        "SELECT id, key, kind, device_id, detail, created_at
         FROM sync_log
         WHERE key = ?1
         ORDER BY created_at DESC, id DESC
         LIMIT ?2",
    )?;

    let rows = stmt.query_map(rusqlite::params![key, limit], |row| {
        let kind: String = row.get(2)?;
        Ok((
            kind,
            LogEntry {
                id: row.get(0)?,
                key: row.get(1)?,
                kind: LogKind::Cached,
                device_id: row.get(3)?,
                detail: row.get(4)?,
                created_at: row.get(5)?,
            },
        ))
    })?;

    let mut entries = Vec::new();
    for row in rows {
        let (kind, mut entry) = row?;
        if let Some(kind) = LogKind::parse(&kind) {
            entry.kind = kind;
            entries.push(entry);
        }
    }
    Ok(entries)
}
