//! Command implementations for tidemark-cli

pub mod config;
pub mod run;

use std::path::PathBuf;

use crate::error::{CliError, Result};

pub use config::{run_config_path, run_config_set, run_config_show};
pub use run::run_sync;

/// File name of the state file inside the config directory
const STATE_FILE: &str = "state.json";

/// Resolve the state file location.
///
/// An explicit path wins; otherwise `<config dir>/tidemark/state.json`.
pub fn state_path(explicit: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path);
    }
    dirs::config_dir()
        .map(|dir| dir.join("tidemark").join(STATE_FILE))
        .ok_or_else(|| CliError::user("Cannot determine the config directory; pass --state <path>."))
}
