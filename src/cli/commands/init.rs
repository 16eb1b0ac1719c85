//! Initialize the local cache.
//!
//! The cache lives at `~/.charter-sync/data/cache.db` unless `--db`,
//! `CHARTER_SYNC_DB` or test mode point elsewhere. Opening the database
//! applies the schema, so `init` leaves a ready-to-use cache behind.

use crate::config::resolve_db_path;
use crate::error::{Error, Result};
use crate::storage::SqliteCache;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Serialize)]
struct InitOutput {
    database: PathBuf,
    recreated: bool,
}

/// Execute the init command.
///
/// # Errors
///
/// Returns `AlreadyInitialized` if the cache exists and `force` is not set,
/// or an error if the directory or database cannot be created.
pub fn execute(db: Option<&Path>, force: bool, json: bool) -> Result<()> {
    let db_path = resolve_db_path(db).ok_or_else(|| {
        Error::Config("Could not determine the Charter Sync directory".to_string())
    })?;

    let existed = db_path.exists();
    if existed && !force {
        return Err(Error::AlreadyInitialized { path: db_path });
    }

    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    if existed {
        fs::remove_file(&db_path)?;
    }

    // schema is applied on open
    SqliteCache::open(&db_path)?;
    tracing::info!(path = %db_path.display(), "Cache initialized");

    if json {
        let output = InitOutput {
            database: db_path,
            recreated: existed,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!("Initialized Charter Sync cache");
        println!("  Database: {}", db_path.display());
        println!();
        println!("Next: set \"remote_url\" in ~/.charter-sync/config.json or pass --remote.");
    }

    Ok(())
}
