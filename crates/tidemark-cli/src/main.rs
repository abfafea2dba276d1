//! tidemark CLI
//!
//! Uploads media files added since the last successful run.

mod cli;
mod commands;
mod error;
mod interactive;
mod interrupt;
mod logging;
mod report;
mod uploader;

use clap::Parser;
use colored::Colorize;
use tidemark_core::SyncOptions;

use cli::{Cli, Commands, ConfigAction};
use error::Result;

fn main() {
    match run() {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            std::process::exit(1);
        }
    }
}

/// Returns whether the invocation succeeded.
fn run() -> Result<bool> {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.log_dir.as_deref())?;
    tracing::debug!(?cli, "parsed arguments");

    let state_path = commands::state_path(cli.state)?;

    match cli.command {
        Some(Commands::Config { action }) => {
            match action {
                ConfigAction::Show => commands::run_config_show(&state_path)?,
                ConfigAction::Path => commands::run_config_path(&state_path)?,
                ConfigAction::Set { key, value } => commands::run_config_set(&state_path, &key, &value)?,
            }
            Ok(true)
        }
        None => commands::run_sync(
            &state_path,
            cli.setup,
            SyncOptions { dry_run: cli.dry_run },
            cli.json,
        ),
    }
}
