//! Sync command implementations (push, refresh, watch, migrate).

use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;
use serde::Serialize;

use crate::bus::{SyncEvent, Topic};
use crate::cli::Cli;
use crate::error::{Error, Result};
use crate::model::EntityType;
use crate::scheduler::{AutoRefresh, SchedulerConfig, TriggerOutcome};
use crate::sync::{MigrationStats, PushStats, RefreshReport};

use super::{connect, runtime};

/// Execute the push command.
///
/// # Errors
///
/// Returns an error if the cache cannot be opened or scanned.
pub fn execute_push(cli: &Cli, json: bool) -> Result<()> {
    let handle = connect(cli)?;
    let rt = runtime()?;
    let stats = rt.block_on(handle.orchestrator.push_pending(&handle.ctx))?;

    if json {
        println!("{}", serde_json::to_string(&stats)?);
    } else if !cli.quiet {
        print_push(&stats);
    }
    Ok(())
}

/// Execute the refresh command.
///
/// # Errors
///
/// Returns an error if the cache cannot be opened or scanned.
pub fn execute_refresh(cli: &Cli, json: bool) -> Result<()> {
    let handle = connect(cli)?;
    let rt = runtime()?;
    let report = rt.block_on(handle.orchestrator.refresh_all(&handle.ctx))?;

    if json {
        println!("{}", serde_json::to_string(&report)?);
    } else if !cli.quiet {
        print_refresh(&report);
    }
    Ok(())
}

/// Execute the watch command: refresh now, then on every tick until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the interval is zero or the cache cannot be opened.
pub fn execute_watch(cli: &Cli, interval: Option<u64>, json: bool) -> Result<()> {
    let handle = connect(cli)?;
    let defaults = handle.settings.scheduler();
    let config = match interval {
        Some(minutes) => SchedulerConfig::every_minutes(minutes).with_settle_delay(defaults.settle_delay),
        None => defaults,
    };
    if config.interval.is_zero() {
        return Err(Error::InvalidArgument(
            "Refresh interval must be at least one minute".to_string(),
        ));
    }

    let orchestrator = Arc::new(handle.orchestrator);
    let ctx = handle.ctx;
    let quiet = cli.quiet;
    let rt = runtime()?;

    rt.block_on(async move {
        let _refreshes = orchestrator.bus().subscribe(Topic::RefreshCompleted, move |event| {
            if let SyncEvent::RefreshCompleted { keys, at } = event {
                if json {
                    let line = serde_json::json!({ "refreshed": keys.len(), "at": at });
                    println!("{line}");
                } else if !quiet {
                    println!("{} refreshed {} record(s)", at.format("%H:%M:%S"), keys.len());
                }
            }
        });

        let task = {
            let orchestrator = Arc::clone(&orchestrator);
            move || {
                let orchestrator = Arc::clone(&orchestrator);
                let ctx = ctx.clone();
                async move { orchestrator.refresh_all(&ctx).await.map(|_| ()) }
            }
        };
        let scheduler = AutoRefresh::start(task, config);

        if !json && !quiet {
            println!(
                "Refreshing every {} minute(s). Press Ctrl-C to stop.",
                config.interval.as_secs() / 60
            );
        }
        if scheduler.trigger().await == TriggerOutcome::Failed {
            if let Some(error) = scheduler.status().last_error {
                eprintln!("{} {error}", "Refresh failed:".red());
            }
        }

        tokio::signal::ctrl_c().await?;
        scheduler.stop();
        // let a refresh that is mid-flight finish its cache writes
        while scheduler.is_refreshing() {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        Ok::<(), Error>(())
    })
}

#[derive(Serialize)]
struct MigrateOutput {
    entity_type: EntityType,
    #[serde(flatten)]
    stats: MigrationStats,
}

/// Execute the migrate command.
///
/// # Errors
///
/// Returns an error if the entity type is unknown or the cache cannot be
/// scanned.
pub fn execute_migrate(cli: &Cli, entity_type: &str, json: bool) -> Result<()> {
    let types: Vec<EntityType> = if entity_type == "all" {
        EntityType::ALL.to_vec()
    } else {
        vec![entity_type.parse()?]
    };

    let handle = connect(cli)?;
    let rt = runtime()?;
    let mut results = Vec::with_capacity(types.len());

    for entity_type in types {
        let stats = rt.block_on(handle.orchestrator.migrate_once(&handle.ctx, entity_type))?;
        if let Some(stats) = stats {
            results.push(MigrateOutput { entity_type, stats });
        }
    }

    if json {
        println!("{}", serde_json::to_string(&results)?);
        return Ok(());
    }
    if cli.quiet {
        return Ok(());
    }

    for result in &results {
        let stats = &result.stats;
        if stats.scanned == 0 {
            println!("{}: no legacy records", result.entity_type);
            continue;
        }
        println!(
            "{}: {} uploaded, {} already remote, {} previously migrated",
            result.entity_type.to_string().bold(),
            stats.uploaded,
            stats.skipped,
            stats.already_migrated
        );
        for (legacy_key, error) in &stats.failures {
            println!("  {} {legacy_key}: {error}", "✗".red());
        }
    }
    Ok(())
}

fn print_push(stats: &PushStats) {
    if stats.total() == 0 {
        println!("{}", "Nothing to push.".green());
        return;
    }
    println!("Pushed:  {}", stats.pushed);
    if stats.adopted > 0 {
        println!("Adopted: {} (remote copy was newer)", stats.adopted);
    }
    if stats.failed > 0 {
        println!("{} {}", "Pending:".yellow(), stats.failed);
    }
}

fn print_refresh(report: &RefreshReport) {
    print_push(&report.push);
    println!("Refreshed: {}", report.refreshed);
    if report.changed > 0 {
        println!("Changed:   {}", report.changed);
    }
    if report.fell_back > 0 {
        println!(
            "{} {} record(s) served from cache",
            "Remote unavailable:".yellow(),
            report.fell_back
        );
    }
}
