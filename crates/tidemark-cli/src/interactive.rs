//! Interactive setup prompts
//!
//! Uses dialoguer for terminal input. Date bounds go through
//! [`DateEntry`] so malformed dates are re-asked rather than rejected.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use colored::Colorize;
use dialoguer::{Confirm, Input, Select};
use tidemark_core::setup::DATE_FORMAT;
use tidemark_core::{DateEntry, DateEntryStep, DateRange, Error, InitialSettings, Result, SetupPrompt};

/// Choices offered for the initial date window
const RANGE_CHOICES: &[&str] = &["Everything (no date filter)", "Between dates"];

/// Attempts allowed per date prompt
const DATE_ATTEMPTS: u32 = 5;

/// [`SetupPrompt`] backed by the terminal
#[derive(Debug, Default)]
pub struct DialoguerSetup;

impl DialoguerSetup {
    pub fn new() -> Self {
        Self
    }
}

impl SetupPrompt for DialoguerSetup {
    fn prompt_initial_settings(&mut self, current: &InitialSettings) -> Result<InitialSettings> {
        println!();
        println!("{}", "tidemark setup".bold());

        let mut directory = Input::<String>::new()
            .with_prompt("Music library directory")
            .validate_with(|input: &String| -> std::result::Result<(), &'static str> {
                if Path::new(input.trim()).is_dir() {
                    Ok(())
                } else {
                    Err("not an existing directory")
                }
            });
        if !current.directory.as_os_str().is_empty() {
            directory = directory.default(current.directory.display().to_string());
        }
        let directory = PathBuf::from(directory.interact_text().map_err(terminal)?.trim());

        let extensions: String = Input::new()
            .with_prompt("File extensions (comma separated)")
            .default(current.extensions.join(", "))
            .interact_text()
            .map_err(terminal)?;
        let extensions = split_extensions(&extensions);

        let choice = Select::new()
            .with_prompt("Which files should the first run consider?")
            .items(RANGE_CHOICES)
            .default(match current.range {
                DateRange::Everything => 0,
                DateRange::Between { .. } => 1,
            })
            .interact()
            .map_err(terminal)?;

        let range = if choice == 0 {
            DateRange::Everything
        } else {
            let start = prompt_date("Start date (inclusive)", current.range.start())?;
            let end = prompt_date("End date (exclusive)", current.range.end())?;
            DateRange::from_bounds(start, end)
        };

        println!();
        println!("{}", "Summary:".bold());
        println!("  {}: {}", "Directory".dimmed(), directory.display().to_string().cyan());
        println!("  {}: {}", "Extensions".dimmed(), extensions.join(", ").cyan());
        println!("  {}: {}", "Range".dimmed(), describe_range(&range).cyan());
        println!();

        let proceed = Confirm::new()
            .with_prompt("Save these settings?")
            .default(true)
            .interact()
            .map_err(terminal)?;
        if !proceed {
            return Err(cancelled("settings not confirmed"));
        }

        Ok(InitialSettings {
            directory,
            extensions,
            range,
        })
    }
}

/// Ask for one optional date until it validates.
fn prompt_date(label: &str, current: Option<NaiveDate>) -> Result<Option<NaiveDate>> {
    let mut entry = DateEntry::with_max_attempts(DATE_ATTEMPTS);
    loop {
        // Pre-filled rather than a default: an empty line must mean "none"
        let mut input = Input::<String>::new()
            .with_prompt(date_prompt(label, current))
            .allow_empty(true);
        if let Some(date) = current {
            input = input.with_initial_text(date.format(DATE_FORMAT).to_string());
        }
        let line = input.interact_text().map_err(terminal)?;

        match entry.feed(&line) {
            DateEntryStep::Accepted(date) => return Ok(date),
            DateEntryStep::Retry { message, remaining } => {
                let left = remaining.map(|n| format!(" ({n} left)")).unwrap_or_default();
                println!("  {} {message}{left}", "!".yellow());
            }
            DateEntryStep::Exhausted => return Err(cancelled(&format!("no valid date entered for {label}"))),
        }
    }
}

fn date_prompt(label: &str, current: Option<NaiveDate>) -> String {
    match current {
        Some(date) => format!(
            "{label}, YYYY-MM-DD (currently {}; clear the line for none)",
            date.format(DATE_FORMAT)
        ),
        None => format!("{label}, YYYY-MM-DD or empty for none"),
    }
}

fn terminal(e: dialoguer::Error) -> Error {
    Error::Io(std::io::Error::other(e))
}

fn cancelled(message: &str) -> Error {
    Error::SetupCancelled {
        message: message.to_string(),
    }
}

/// Split a comma or whitespace separated list, dropping blanks
pub fn split_extensions(input: &str) -> Vec<String> {
    input
        .split(|c: char| c == ',' || c.is_whitespace())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// One-line description of a date window
pub fn describe_range(range: &DateRange) -> String {
    let side = |d: Option<NaiveDate>, open: &str| d.map_or_else(|| open.to_string(), |d| d.format(DATE_FORMAT).to_string());
    match range {
        DateRange::Everything => "everything".to_string(),
        DateRange::Between { start, end } => format!("from {} until {}", side(*start, "the beginning"), side(*end, "now")),
    }
}
