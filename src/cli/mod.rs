//! CLI definitions using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

/// Charter Sync - offline-first cache and sync for yacht charter operations
#[derive(Parser, Debug)]
#[command(name = "csync", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Cache database path (default: ~/.charter-sync/data/cache.db)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Remote store base URL (default: remote_url in config.json)
    #[arg(long, global = true, env = "CHARTER_SYNC_REMOTE")]
    pub remote: Option<String>,

    /// Device identifier attached to remote writes
    #[arg(long, global = true, env = "CHARTER_SYNC_DEVICE")]
    pub device: Option<String>,

    /// Currently selected booking code
    #[arg(long, global = true, env = "CHARTER_SYNC_BOOKING")]
    pub booking: Option<String>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the local cache database
    Init {
        /// Overwrite an existing database
        #[arg(long)]
        force: bool,
    },

    /// Print version information
    Version,

    /// Read a record (remote first, cache fallback)
    Read {
        /// Record key, e.g. `checklist:NAY-001:entry`
        key: String,
    },

    /// Write a record (cache first, then remote)
    Write {
        /// Record key, e.g. `vessel:7`
        key: String,

        /// JSON payload
        payload: String,
    },

    /// Remove a record from the local cache
    Delete {
        /// Record key
        key: String,
    },

    /// Show the sync log of a record
    History {
        /// Record key
        key: String,

        /// Maximum entries to show
        #[arg(short, long, default_value = "20")]
        limit: u32,
    },

    /// Checklist operations
    Checklist {
        #[command(subcommand)]
        command: ChecklistCommands,
    },

    /// Select a booking and prefetch its checklists
    Select {
        /// Booking code (omit to clear the selection)
        booking: Option<String>,
    },

    /// Push writes the remote store has not acknowledged yet
    Push,

    /// Push pending writes and re-read every cached record
    Refresh,

    /// Refresh on a timer until interrupted
    Watch {
        /// Minutes between refreshes (default: refresh_interval_minutes in config.json)
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Upload records cached under legacy keys
    Migrate {
        /// Entity type to migrate (vessel, bookings, checklist, floorplan,
        /// archive, winterization, or `all`)
        entity_type: String,
    },

    /// Show cache status
    Status,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

// ============================================================================
// Checklist Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum ChecklistCommands {
    /// Open the exit checklist of a booking, inheriting entry flags
    Exit {
        /// Booking code
        booking: String,
    },

    /// Show a stored checklist
    Show {
        /// Booking code
        booking: String,

        /// Checklist mode
        #[arg(long, default_value = "entry")]
        mode: String,
    },
}
