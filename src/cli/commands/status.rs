//! Status command implementation.

use crate::cli::Cli;
use crate::config::{load_settings, resolve_device_id, resolve_remote_url};
use crate::error::Result;
use crate::storage::{CacheCounts, SqliteCache};
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;

use super::existing_db_path;

/// Output for status command.
#[derive(Serialize)]
struct StatusOutput {
    db_path: PathBuf,
    device_id: String,
    remote_url: Option<String>,
    booking: Option<String>,
    records: usize,
    counts: CacheCounts,
}

/// Execute status command.
///
/// Reports what the local cache holds and how much of it is still waiting
/// for the remote store. Never contacts the remote store.
///
/// # Errors
///
/// Returns `NotInitialized` if the cache does not exist yet.
pub fn execute(cli: &Cli, json: bool) -> Result<()> {
    let db_path = existing_db_path(cli.db.as_deref())?;
    let cache = SqliteCache::open(&db_path)?;
    let settings = load_settings()?;

    let counts = cache.counts()?;

    let output = StatusOutput {
        remote_url: resolve_remote_url(cli.remote.as_deref(), &settings),
        device_id: resolve_device_id(cli.device.as_deref())?,
        booking: cli.booking.clone(),
        records: counts.total(),
        counts,
        db_path,
    };

    if json {
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    println!("Charter Sync Status");
    println!("===================");
    println!();
    println!("Cache:   {}", output.db_path.display());
    println!("Device:  {}", output.device_id);
    match &output.remote_url {
        Some(url) => println!("Remote:  {url}"),
        None => println!("Remote:  {}", "not configured".yellow()),
    }
    if let Some(booking) = &output.booking {
        println!("Booking: {booking}");
    }
    println!();

    println!("Records: {}", output.records);
    for (entity_type, n) in &output.counts.by_type {
        println!("  {:<20} {n}", entity_type.to_string());
    }
    if output.counts.dirty > 0 {
        println!(
            "{} {} (run 'csync push')",
            "Not yet synced:".yellow(),
            output.counts.dirty
        );
    } else {
        println!("{}", "All records synced.".green());
    }
    if output.counts.legacy > 0 {
        println!(
            "Legacy records: {} (run 'csync migrate all')",
            output.counts.legacy
        );
    }

    Ok(())
}
