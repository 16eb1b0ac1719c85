//! Checklist command implementations.

use colored::Colorize;

use crate::cli::{ChecklistCommands, Cli};
use crate::error::{Error, Result};
use crate::model::{Checklist, ExitCheck, Key, Mode};
use crate::sync::ReadOutcome;

use super::{connect, runtime};

/// Execute checklist commands.
///
/// # Errors
///
/// Returns an error if the booking code or mode is invalid, or if a shown
/// checklist does not exist.
pub fn execute(cli: &Cli, command: &ChecklistCommands, json: bool) -> Result<()> {
    match command {
        ChecklistCommands::Exit { booking } => open_exit(cli, booking, json),
        ChecklistCommands::Show { booking, mode } => show(cli, booking, mode, json),
    }
}

fn open_exit(cli: &Cli, booking: &str, json: bool) -> Result<()> {
    let handle = connect(cli)?;
    let rt = runtime()?;
    let exit = rt.block_on(handle.orchestrator.open_exit_checklist(&handle.ctx, booking))?;

    if json {
        let output = serde_json::json!({
            "booking": booking,
            "has_entry": exit.has_entry,
            "saved": exit.saved,
            "checklist": exit.checklist,
        });
        println!("{output}");
        return Ok(());
    }

    if !exit.has_entry && !cli.quiet {
        println!(
            "{}",
            "No entry checklist for this booking; nothing to inherit.".yellow()
        );
    }
    if let Some(warning) = exit.saved.and_then(|s| s.warning()) {
        println!("{}", warning.yellow());
    }
    print_checklist(&exit.checklist);
    Ok(())
}

fn show(cli: &Cli, booking: &str, mode: &str, json: bool) -> Result<()> {
    let mode: Mode = mode.parse()?;
    let key = Key::checklist(booking, mode)?;
    let handle = connect(cli)?;
    let rt = runtime()?;

    let checklist = match rt.block_on(handle.orchestrator.read_entity::<Checklist>(&handle.ctx, &key)) {
        ReadOutcome::Remote(c) | ReadOutcome::Cached(c) => c,
        ReadOutcome::NotFound => {
            return Err(Error::RecordNotFound {
                key: key.canonical(),
            });
        }
    };

    if json {
        println!("{}", serde_json::to_string(&checklist)?);
    } else {
        print_checklist(&checklist);
    }
    Ok(())
}

fn print_checklist(checklist: &Checklist) {
    println!(
        "{} {} ({})",
        "Checklist".bold(),
        checklist.booking,
        checklist.mode
    );

    if checklist.sections.is_empty() {
        println!("  (empty)");
        return;
    }

    for section in &checklist.sections {
        println!();
        println!("{}", section.title.bold());
        for item in &section.items {
            let entry = if item.checked_at_entry { "✓".green() } else { "·".dimmed() };
            let exit = match item.checked_at_exit {
                ExitCheck::Ok => "ok".green(),
                ExitCheck::NotOk => "not ok".red(),
                ExitCheck::Unset => "-".dimmed(),
            };
            let user_added = if item.is_user_added { " (added)" } else { "" };
            println!("  {entry} {:<28} exit: {exit}{user_added}", item.label);
            if item.replacement_quantity > 0 {
                println!("      replace {} x {:.2}", item.replacement_quantity, item.unit_price);
            }
        }
    }

    if checklist.mode == Mode::Exit {
        let total = checklist.replacement_total();
        if total > 0.0 {
            println!();
            println!("Replacement total: {total:.2}");
        }
    }
}
