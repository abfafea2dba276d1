//! Tracing subscriber setup
//!
//! Human output goes to stdout; log records go to stderr and, optionally,
//! to one file per run.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Local;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::error::{CliError, Result};

/// Log file name for a run started now, e.g. `2024-03-01 1730.log`
pub fn log_file_name() -> String {
    Local::now().format("%Y-%m-%d %H%M.log").to_string()
}

/// Install the global subscriber.
///
/// `RUST_LOG` selects the level, defaulting to `info`; `verbose` forces
/// `debug`. Returns the log file path when `log_dir` is given.
pub fn init(verbose: bool, log_dir: Option<&Path>) -> Result<Option<PathBuf>> {
    let filter = if verbose {
        EnvFilter::try_new("debug")
    } else {
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))
    }
    .map_err(|e| CliError::user(format!("Invalid log filter: {e}")))?;

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .compact();

    let (file_layer, log_path) = match log_dir {
        Some(dir) => {
            fs::create_dir_all(dir)?;
            let path = dir.join(log_file_name());
            let file = File::create(&path)?;
            let layer = fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(Mutex::new(file));
            (Some(layer), Some(path))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| CliError::user(format!("Failed to set up logging: {e}")))?;

    if let Some(path) = &log_path {
        tracing::debug!(path = %path.display(), "writing run log");
    }
    Ok(log_path)
}
