//! Command implementations.

pub mod checklist;
pub mod completions;
pub mod init;
pub mod record;
pub mod select;
pub mod status;
pub mod sync;
pub mod version;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::bus::EventBus;
use crate::cli::Cli;
use crate::config::{Settings, load_settings, resolve_db_path, resolve_device_id, resolve_remote_url};
use crate::error::{Error, Result};
use crate::remote::HttpRemote;
use crate::storage::SqliteCache;
use crate::sync::{SyncContext, SyncOrchestrator};

/// Everything a sync command needs, resolved from flags and config.
pub struct SyncHandle {
    pub orchestrator: SyncOrchestrator<HttpRemote>,
    pub ctx: SyncContext,
    pub settings: Settings,
    pub db_path: PathBuf,
}

/// Resolve the cache path and fail if the cache was never initialized.
pub(crate) fn existing_db_path(db: Option<&Path>) -> Result<PathBuf> {
    let db_path = resolve_db_path(db).ok_or(Error::NotInitialized)?;
    if !db_path.exists() {
        return Err(Error::NotInitialized);
    }
    Ok(db_path)
}

/// Open the cache and build an orchestrator against the configured remote.
pub(crate) fn connect(cli: &Cli) -> Result<SyncHandle> {
    let db_path = existing_db_path(cli.db.as_deref())?;
    let settings = load_settings()?;
    let cache = Arc::new(SqliteCache::open(&db_path)?);

    let remote_url = resolve_remote_url(cli.remote.as_deref(), &settings);
    if remote_url.is_none() {
        tracing::info!("No remote store configured, working from the local cache");
    }
    let remote = HttpRemote::with_config(remote_url, Some(settings.request_timeout()));

    let mut ctx = SyncContext::new(resolve_device_id(cli.device.as_deref())?);
    ctx.booking.clone_from(&cli.booking);

    Ok(SyncHandle {
        orchestrator: SyncOrchestrator::new(cache, remote, EventBus::new()),
        ctx,
        settings,
        db_path,
    })
}

/// Create the runtime sync commands run on.
pub(crate) fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Error::Other(format!("Failed to create async runtime: {e}")))
}
