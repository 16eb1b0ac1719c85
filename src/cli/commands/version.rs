//! Version command: package, build profile and cache schema.

use serde::Serialize;

use crate::error::Result;
use crate::storage::migrations;
use crate::storage::schema::CURRENT_SCHEMA_VERSION;

#[derive(Debug, Serialize)]
struct VersionInfo {
    version: &'static str,
    build: &'static str,
    schema_version: i32,
    latest_migration: Option<&'static str>,
}

impl VersionInfo {
    fn current() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            build: if cfg!(debug_assertions) { "dev" } else { "release" },
            schema_version: CURRENT_SCHEMA_VERSION,
            latest_migration: migrations::latest_version(),
        }
    }
}

/// Execute the version command.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn execute(json: bool) -> Result<()> {
    let info = VersionInfo::current();
    if json {
        println!("{}", serde_json::to_string(&info)?);
        return Ok(());
    }

    println!("csync {} ({})", info.version, info.build);
    match info.latest_migration {
        Some(migration) => println!("cache schema v{} ({migration})", info.schema_version),
        None => println!("cache schema v{}", info.schema_version),
    }
    Ok(())
}
