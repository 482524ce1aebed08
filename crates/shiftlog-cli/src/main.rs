//! shiftlog CLI - record work shifts from the command line
//!
//! Everything is written to the local store first; `sync` and `run` push the
//! queued events to the shiftlog API when one is configured.

mod cli;
mod commands;
mod error;


use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::commands::common::{open_workspace, resolve_paths};
use crate::commands::completions::run_completions;
use crate::commands::shift::{run_end, run_location, run_note, run_photo, run_start};
use crate::commands::status::{run_history, run_queue, run_status, run_trail};
use crate::commands::sync::{run_sync, run_view, run_worker};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shiftlog=info,shiftlog_core=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Commands::Completions { shell, output } = &cli.command {
        return run_completions(*shell, output.as_deref());
    }

    let paths = resolve_paths(cli.db_path, cli.config)?;
    let workspace = open_workspace(&paths)?;

    match cli.command {
        Commands::Start(args) => run_start(&workspace, &args).map(drop)?,
        Commands::Location(args) => run_location(&workspace, &args)?,
        Commands::Photo { path, location } => run_photo(&workspace, &path, &location)?,
        Commands::Note { text, location } => run_note(&workspace, &text, &location)?,
        Commands::End => run_end(&workspace)?,
        Commands::Status { json } => run_status(&workspace, json)?,
        Commands::History { limit, json } => run_history(&workspace, limit, json)?,
        Commands::Queue { json } => run_queue(&workspace, json)?,
        Commands::Trail { filtered } => run_trail(&workspace, filtered)?,
        Commands::Sync => run_sync(&workspace).await?,
        Commands::Run => run_worker(&workspace).await?,
        Commands::View { pair_code, json } => run_view(&workspace, &pair_code, json).await?,
        Commands::Completions { .. } => {}
    }

    Ok(())
}
