//! Charter Sync CLI entry point.

use charter_sync::cli::commands;
use charter_sync::cli::{Cli, Commands};
use charter_sync::error::Error;
use clap::Parser;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    // Set up tracing based on verbosity
    init_tracing(cli.verbose, cli.quiet);

    // Resolve effective JSON mode: --json OR non-TTY stdout
    let json = cli.json || !std::io::IsTerminal::is_terminal(&std::io::stdout());

    // Run the command and handle errors
    match run(&cli, json) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if json {
                eprintln!("{}", e.to_structured_json());
            } else if !cli.quiet {
                if let Some(hint) = e.hint() {
                    eprintln!("Error: {e}\n  Hint: {hint}");
                } else {
                    eprintln!("Error: {e}");
                }
            }
            ExitCode::from(e.exit_code())
        }
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    if quiet {
        return;
    }

    // Honor RUST_LOG if set, otherwise use verbosity flag
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug,rusqlite=info,reqwest=info,hyper=info"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn run(cli: &Cli, json: bool) -> Result<(), Error> {
    match &cli.command {
        Commands::Init { force } => commands::init::execute(cli.db.as_deref(), *force, json),
        Commands::Version => commands::version::execute(json),

        // Records
        Commands::Read { key } => commands::record::execute_read(cli, key, json),
        Commands::Write { key, payload } => {
            commands::record::execute_write(cli, key, payload, json)
        }
        Commands::Delete { key } => commands::record::execute_delete(cli, key, json),
        Commands::History { key, limit } => {
            commands::record::execute_history(cli, key, *limit, json)
        }

        // Checklists and booking selection
        Commands::Checklist { command } => commands::checklist::execute(cli, command, json),
        Commands::Select { booking } => commands::select::execute(cli, booking.as_deref(), json),

        // Sync
        Commands::Push => commands::sync::execute_push(cli, json),
        Commands::Refresh => commands::sync::execute_refresh(cli, json),
        Commands::Watch { interval } => commands::sync::execute_watch(cli, *interval, json),
        Commands::Migrate { entity_type } => {
            commands::sync::execute_migrate(cli, entity_type, json)
        }

        // Status
        Commands::Status => commands::status::execute(cli, json),

        // Shell completions
        Commands::Completions { shell } => commands::completions::execute(*shell),
    }
}
