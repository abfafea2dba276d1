//! The default command: one sync run

use std::path::Path;

use colored::Colorize;
use tidemark_core::{FileScanner, PersistentState, SyncOptions, SyncOrchestrator};

use crate::error::Result;
use crate::interactive::DialoguerSetup;
use crate::interrupt::Interrupt;
use crate::report::{print_json, print_report};
use crate::uploader::{CommandUploader, FileCredentials};

/// Load (or set up) the state and run one sync.
///
/// Returns whether the run completed; the caller turns that into the exit
/// status.
pub fn run_sync(state_path: &Path, setup: bool, options: SyncOptions, json: bool) -> Result<bool> {
    let mut prompt = DialoguerSetup::new();
    let mut state = PersistentState::open(state_path, setup, &mut prompt)?;

    // Installed after setup so Ctrl-C still quits the prompts
    let interrupt = Interrupt::install()?;
    let mut uploader = CommandUploader::new(state.upload_command()?).with_interrupt(interrupt);
    if !uploader.is_configured() && !options.dry_run {
        tracing::warn!("no upload_command configured; any batch will abort the run");
    }
    let mut credentials = FileCredentials::new(state.credentials_file()?);
    let scanner = FileScanner::new();

    if !json {
        println!(
            "{} Scanning {}",
            "=>".blue().bold(),
            state.directory()?.display().to_string().cyan()
        );
    }

    let report = SyncOrchestrator::new(&mut state, &scanner, &mut uploader, &mut credentials)
        .with_options(options)
        .run()?;

    if json {
        print_json(&report)?;
    } else {
        print_report(&report);
    }
    Ok(report.is_success())
}
