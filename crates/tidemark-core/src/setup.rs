//! Initial setup settings and the interactive-setup seam
//!
//! The core never talks to a terminal. Whatever asks the user for a library
//! directory and a date window implements [`SetupPrompt`]; the CLI does it
//! with dialoguer, tests do it with a script.

use std::path::PathBuf;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::error::{Error, Result};

/// Textual layout for calendar dates in the state file and at prompts
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Extensions configured when the user accepts the defaults
pub const DEFAULT_EXTENSIONS: &[&str] = &["mp3", "flac"];

/// Date window chosen at setup time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateRange {
    /// No narrowing: every file since the epoch is a candidate
    #[default]
    Everything,
    /// Calendar-day bounds; a missing side is unbounded
    Between {
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    },
}

impl DateRange {
    /// Build a range from optional bounds, collapsing "no bounds" to
    /// [`DateRange::Everything`].
    pub fn from_bounds(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        if start.is_none() && end.is_none() {
            Self::Everything
        } else {
            Self::Between { start, end }
        }
    }

    pub fn start(&self) -> Option<NaiveDate> {
        match self {
            Self::Everything => None,
            Self::Between { start, .. } => *start,
        }
    }

    pub fn end(&self) -> Option<NaiveDate> {
        match self {
            Self::Everything => None,
            Self::Between { end, .. } => *end,
        }
    }
}

/// Values gathered by the setup collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitialSettings {
    pub directory: PathBuf,
    pub extensions: Vec<String>,
    pub range: DateRange,
}

impl Default for InitialSettings {
    fn default() -> Self {
        Self {
            directory: PathBuf::new(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            range: DateRange::Everything,
        }
    }
}

impl InitialSettings {
    /// Check the settings before they are written to the state file.
    ///
    /// Extensions are normalized in place (trimmed, leading dots removed,
    /// duplicates dropped while keeping the first occurrence).
    pub fn validate(&mut self) -> Result<()> {
        if self.directory.as_os_str().is_empty() {
            return Err(Error::invalid_value("directory", "library directory must not be empty"));
        }

        self.extensions = normalize_extensions(&self.extensions)?;

        if let DateRange::Between {
            start: Some(start),
            end: Some(end),
        } = self.range
            && start >= end
        {
            return Err(Error::invalid_value(
                "range_end",
                format!("end date {end} must be after start date {start}"),
            ));
        }

        Ok(())
    }
}

/// Trim, strip leading dots and de-duplicate a list of extensions.
pub fn normalize_extensions(extensions: &[String]) -> Result<Vec<String>> {
    let mut normalized: Vec<String> = Vec::with_capacity(extensions.len());
    for raw in extensions {
        let ext = raw.trim().trim_start_matches('.');
        if ext.is_empty() {
            return Err(Error::invalid_value("extensions", format!("'{raw}' is not an extension")));
        }
        if !normalized.iter().any(|e| e == ext) {
            normalized.push(ext.to_string());
        }
    }
    if normalized.is_empty() {
        return Err(Error::invalid_value("extensions", "at least one extension is required"));
    }
    Ok(normalized)
}

/// Collaborator that asks the user for initial settings.
///
/// `current` carries the defaults (first run) or the stored values
/// (re-configuration) so implementations can offer them as answers.
pub trait SetupPrompt {
    fn prompt_initial_settings(&mut self, current: &InitialSettings) -> Result<InitialSettings>;
}

static DATE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("Invalid date regex"));

/// Parse a `YYYY-MM-DD` date.
///
/// The text must match the fixed pattern exactly and name a real day.
pub fn parse_date(input: &str) -> Result<NaiveDate> {
    let trimmed = input.trim();
    if !DATE_PATTERN.is_match(trimmed) {
        return Err(Error::InvalidDate { input: input.to_string() });
    }
    NaiveDate::parse_from_str(trimmed, DATE_FORMAT).map_err(|_| Error::InvalidDate {
        input: input.to_string(),
    })
}

/// Outcome of feeding one line to a [`DateEntry`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateEntryStep {
    /// Input accepted; `None` means the user left the bound open
    Accepted(Option<NaiveDate>),
    /// Input rejected; ask again
    Retry {
        message: String,
        remaining: Option<u32>,
    },
    /// Attempt budget spent without a valid answer
    Exhausted,
}

/// Validated-input state machine for date prompts.
///
/// read -> validate against `YYYY-MM-DD` -> accept or re-prompt, with an
/// optional cap on attempts. An empty line is a valid "no bound" answer.
#[derive(Debug, Clone, Default)]
pub struct DateEntry {
    max_attempts: Option<u32>,
    attempts: u32,
    done: bool,
}

impl DateEntry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: Some(max_attempts.max(1)),
            ..Self::default()
        }
    }

    /// Number of lines fed so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn feed(&mut self, line: &str) -> DateEntryStep {
        if self.done {
            return DateEntryStep::Exhausted;
        }
        self.attempts += 1;

        if line.trim().is_empty() {
            self.done = true;
            return DateEntryStep::Accepted(None);
        }

        match parse_date(line) {
            Ok(date) => {
                self.done = true;
                DateEntryStep::Accepted(Some(date))
            }
            Err(e) => match self.max_attempts {
                Some(max) if self.attempts >= max => {
                    self.done = true;
                    DateEntryStep::Exhausted
                }
                max => DateEntryStep::Retry {
                    message: e.to_string(),
                    remaining: max.map(|m| m - self.attempts),
                },
            },
        }
    }
}
