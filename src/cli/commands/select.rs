//! Booking selection command.
//!
//! Announces the new selection on the event bus and prefetches both
//! checklists of the booking so they are available offline.

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;

use crate::bus::{SyncEvent, Topic};
use crate::cli::Cli;
use crate::error::Result;
use crate::model::{Key, Mode};

use super::{connect, runtime};

#[derive(Serialize)]
struct SelectOutput {
    booking: Option<String>,
    changed: bool,
    entry: Option<&'static str>,
    exit: Option<&'static str>,
    updated: Vec<String>,
}

/// Execute the select command.
///
/// # Errors
///
/// Returns an error if the booking code is not a valid key id.
pub fn execute(cli: &Cli, booking: Option<&str>, json: bool) -> Result<()> {
    let mut handle = connect(cli)?;
    let bus = handle.orchestrator.bus().clone();

    let selected = Arc::new(Mutex::new(false));
    let updated = Arc::new(Mutex::new(Vec::new()));
    let _selection = {
        let selected = Arc::clone(&selected);
        bus.subscribe(Topic::BookingSelectionChanged, move |_| {
            *selected.lock().unwrap_or_else(PoisonError::into_inner) = true;
        })
    };
    let _changes = {
        let updated = Arc::clone(&updated);
        bus.subscribe(Topic::RecordChanged, move |event| {
            if let SyncEvent::RecordChanged { key, .. } = event {
                updated
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(key.canonical());
            }
        })
    };

    // `--booking` holds the previous selection
    handle
        .orchestrator
        .select_booking(&mut handle.ctx, booking.map(str::to_string));

    let (entry, exit) = match booking {
        Some(code) => {
            let entry_key = Key::checklist(code, Mode::Entry)?;
            let exit_key = Key::checklist(code, Mode::Exit)?;
            let rt = runtime()?;
            rt.block_on(async {
                let entry = handle.orchestrator.hybrid_read(&handle.ctx, &entry_key).await;
                let exit = handle.orchestrator.hybrid_read(&handle.ctx, &exit_key).await;
                (Some(entry.origin()), Some(exit.origin()))
            })
        }
        None => (None, None),
    };

    let output = SelectOutput {
        booking: handle.ctx.booking.clone(),
        changed: *selected.lock().unwrap_or_else(PoisonError::into_inner),
        entry,
        exit,
        updated: updated.lock().unwrap_or_else(PoisonError::into_inner).clone(),
    };

    if json {
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    match &output.booking {
        Some(code) => println!("Selected booking {code}"),
        None => println!("Booking selection cleared"),
    }
    if let (Some(entry), Some(exit)) = (output.entry, output.exit) {
        println!("  Entry checklist: {entry}");
        println!("  Exit checklist:  {exit}");
    }
    if !output.updated.is_empty() {
        println!("  Updated: {}", output.updated.join(", "));
    }
    Ok(())
}
