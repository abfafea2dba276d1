//! State file inspection and editing

use std::path::Path;

use colored::Colorize;
use serde_json::Value;
use tidemark_core::{PersistentState, StateKey};

use crate::error::{CliError, Result};

/// Print the state file location
pub fn run_config_path(state_path: &Path) -> Result<()> {
    println!("{}", state_path.display());
    Ok(())
}

/// Print the state file as JSON, defaults filled in
pub fn run_config_show(state_path: &Path) -> Result<()> {
    if !PersistentState::exists(state_path) {
        return Err(CliError::user(format!(
            "No state file at {}. Run {} to set one up.",
            state_path.display(),
            "tidemark".cyan()
        )));
    }
    let state = PersistentState::load(state_path)?;
    println!("{}", serde_json::to_string_pretty(&Value::Object(state.values().clone()))?);
    Ok(())
}

/// Set one known key, creating the state file if needed
pub fn run_config_set(state_path: &Path, key: &str, raw: &str) -> Result<()> {
    let key = StateKey::parse(key).ok_or_else(|| {
        let known: Vec<_> = StateKey::ALL.iter().map(StateKey::as_str).collect();
        CliError::user(format!("Unknown key '{key}'. Known keys: {}", known.join(", ")))
    })?;
    let value = parse_value(raw);
    key.validate(&value)?;

    let mut state = if PersistentState::exists(state_path) {
        PersistentState::load(state_path)?
    } else {
        PersistentState::with_defaults(state_path)
    };
    state.set(key.as_str(), value)?;

    println!("{} {} updated", "OK".green().bold(), key.as_str().cyan());
    Ok(())
}

/// JSON when it parses, a plain string otherwise
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}
