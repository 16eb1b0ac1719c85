//! Record command implementations.
//!
//! `read` and `write` go through the hybrid path, so they work with the
//! remote store down. `delete` and `history` only touch the local cache.

use crate::cli::Cli;
use crate::error::{Error, Result};
use crate::model::Key;
use crate::storage::LogEntry;
use crate::sync::ReadOutcome;
use serde::Serialize;
use serde_json::Value;

use super::{connect, runtime};

#[derive(Serialize)]
struct ReadOutput<'a> {
    key: &'a str,
    origin: &'a str,
    payload: &'a Value,
}

#[derive(Serialize)]
struct WriteOutput<'a> {
    key: &'a str,
    synced: bool,
    cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<&'a str>,
}

#[derive(Serialize)]
struct HistoryOutput<'a> {
    key: &'a str,
    entries: Vec<HistoryEntry<'a>>,
}

#[derive(Serialize)]
struct HistoryEntry<'a> {
    kind: &'a str,
    device_id: &'a str,
    detail: Option<&'a str>,
    created_at: i64,
}

impl<'a> From<&'a LogEntry> for HistoryEntry<'a> {
    fn from(entry: &'a LogEntry) -> Self {
        Self {
            kind: entry.kind.as_str(),
            device_id: &entry.device_id,
            detail: entry.detail.as_deref(),
            created_at: entry.created_at,
        }
    }
}

/// Execute the read command.
///
/// # Errors
///
/// Returns `RecordNotFound` if neither the remote store nor the cache has
/// the record.
pub fn execute_read(cli: &Cli, raw_key: &str, json: bool) -> Result<()> {
    let key: Key = raw_key.parse()?;
    let handle = connect(cli)?;
    let rt = runtime()?;

    let outcome = rt.block_on(handle.orchestrator.hybrid_read(&handle.ctx, &key));
    let origin = outcome.origin();
    let payload = match outcome {
        ReadOutcome::Remote(v) | ReadOutcome::Cached(v) => v,
        ReadOutcome::NotFound => {
            return Err(Error::RecordNotFound {
                key: key.canonical(),
            });
        }
    };

    if json {
        let output = ReadOutput {
            key: &key.canonical(),
            origin,
            payload: &payload,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        if !cli.quiet && origin == "cache" {
            eprintln!("(served from local cache)");
        }
        println!("{}", serde_json::to_string_pretty(&payload)?);
    }
    Ok(())
}

/// Execute the write command.
///
/// A write that only reached the cache still succeeds; the output carries
/// the "not yet synced" warning.
///
/// # Errors
///
/// Returns an error if the key or payload is invalid.
pub fn execute_write(cli: &Cli, raw_key: &str, raw_payload: &str, json: bool) -> Result<()> {
    let key: Key = raw_key.parse()?;
    let payload: Value = serde_json::from_str(raw_payload)
        .map_err(|e| Error::InvalidArgument(format!("Payload is not valid JSON: {e}")))?;

    let handle = connect(cli)?;
    let rt = runtime()?;
    let outcome = rt.block_on(handle.orchestrator.hybrid_write(&handle.ctx, &key, &payload));

    if !outcome.cached && !outcome.synced {
        return Err(Error::Other(format!(
            "Write of '{}' failed: cache and remote store both unavailable",
            key.canonical()
        )));
    }

    if json {
        let output = WriteOutput {
            key: &key.canonical(),
            synced: outcome.synced,
            cached: outcome.cached,
            warning: outcome.warning(),
        };
        println!("{}", serde_json::to_string(&output)?);
    } else if !cli.quiet {
        match outcome.warning() {
            Some(warning) => println!("Wrote {key} ({warning})"),
            None => println!("Wrote {key}"),
        }
    }
    Ok(())
}

/// Execute the delete command.
///
/// # Errors
///
/// Returns `RecordNotFound` if the record is not cached.
pub fn execute_delete(cli: &Cli, raw_key: &str, json: bool) -> Result<()> {
    let key: Key = raw_key.parse()?;
    let handle = connect(cli)?;

    if !handle.orchestrator.delete_local(&handle.ctx, &key)? {
        return Err(Error::RecordNotFound {
            key: key.canonical(),
        });
    }

    if json {
        let output = serde_json::json!({ "key": key.canonical(), "deleted": true });
        println!("{output}");
    } else if !cli.quiet {
        println!("Deleted {key} from the local cache");
    }
    Ok(())
}

/// Execute the history command.
///
/// # Errors
///
/// Returns an error if the key is invalid or the log cannot be read.
pub fn execute_history(cli: &Cli, raw_key: &str, limit: u32, json: bool) -> Result<()> {
    let key: Key = raw_key.parse()?;
    let handle = connect(cli)?;
    let entries = handle.orchestrator.cache().history(&key, Some(limit))?;

    if json {
        let output = HistoryOutput {
            key: &key.canonical(),
            entries: entries.iter().map(HistoryEntry::from).collect(),
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No sync history for {key}");
        return Ok(());
    }

    println!("Sync history for {key}:");
    for entry in &entries {
        let at = chrono::DateTime::from_timestamp_millis(entry.created_at)
            .map_or_else(|| entry.created_at.to_string(), |t| t.format("%Y-%m-%d %H:%M:%S").to_string());
        match &entry.detail {
            Some(detail) => println!("  {at}  {:<18} {} ({detail})", entry.kind.as_str(), entry.device_id),
            None => println!("  {at}  {:<18} {}", entry.kind.as_str(), entry.device_id),
        }
    }
    Ok(())
}
