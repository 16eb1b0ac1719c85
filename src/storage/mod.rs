//! SQLite storage layer for the local cache.
//!
//! This module provides the per-device persistence layer using SQLite with:
//! - WAL mode so the scheduler and foreground reads do not block each other
//! - Transaction discipline for atomic record writes
//! - Dirty tracking for writes the remote store has not acknowledged
//! - A sync audit log
//!
//! # Submodules
//!
//! - [`log`] - Sync audit log
//! - [`migrations`] - Versioned schema migrations
//! - [`schema`] - Database schema definitions
//! - [`sqlite`] - Main cache implementation

pub mod log;
pub mod migrations;
pub mod schema;
pub mod sqlite;

pub use log::{LogEntry, LogKind};
pub use sqlite::{CacheCounts, CacheRecord, MigrationOutcome, PutOutcome, SqliteCache};
