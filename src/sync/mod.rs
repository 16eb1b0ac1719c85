//! Hybrid local/remote synchronization.
//!
//! This module keeps the local cache and the remote store in step:
//!
//! - **Orchestrator**: hybrid reads (remote first, cache fallback) and hybrid
//!   writes (cache first, then remote), plus push and full refresh
//! - **Merge**: pure reconciliation rules, including exit-from-entry
//!   checklist derivation and last-write-wins
//! - **Migration**: one-time upload of records cached under legacy keys
//! - **Hashing**: SHA256 content hashing for change detection
//!
//! # Dirty Tracking
//!
//! 1. A hybrid write stores the record in the cache with `dirty = 1`
//! 2. A successful remote write clears the flag
//! 3. `push_pending` retries every record still dirty, adopting the remote
//!    version instead when it is newer
//!
//! # Example
//!
//! ```ignore
//! use charter_sync::sync::{SyncContext, SyncOrchestrator};
//!
//! let orchestrator = SyncOrchestrator::new(cache, remote, bus);
//! let ctx = SyncContext::new(device_id);
//!
//! let outcome = orchestrator.hybrid_write(&ctx, &key, &payload).await;
//! if let Some(warning) = outcome.warning() {
//!     eprintln!("{warning}");
//! }
//! ```

mod hash;
pub mod merge;
mod migrate;
mod orchestrator;
mod types;

pub use hash::{content_hash, has_changed};
pub use merge::{Winner, merge_exit_checklist, merge_exit_from_entry, resolve};
pub use migrate::Migrator;
pub use orchestrator::{ExitChecklist, SyncOrchestrator};
pub use types::{
    MigrationStats, PushStats, ReadOutcome, RefreshReport, SyncContext, SyncOutcome,
};
