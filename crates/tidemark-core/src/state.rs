//! Durable key/value state backed by a single file
//!
//! The whole document is rewritten on every mutation through
//! [`tidemark_fs::ConfigStore`], so the file on disk always equals the
//! in-memory copy once a setter returns. Keys this version does not know
//! about are carried through untouched; known keys missing from an older
//! file fall back to their defaults.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tidemark_fs::ConfigStore;

use crate::error::{Error, Result};
use crate::setup::{DEFAULT_EXTENSIONS, DateRange, InitialSettings, SetupPrompt};
use crate::watermark::{self, Watermark};

/// Keys understood by the sync engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateKey {
    /// Library root to scan
    Directory,
    /// Ordered extension filters
    Extensions,
    /// Inclusive lower watermark bound
    RangeStart,
    /// Exclusive upper watermark bound
    RangeEnd,
    /// Paths whose last upload failed for a non-duplicate reason
    RetryQueue,
    /// Credential file handed to the uploader
    CredentialsFile,
    /// argv of the external upload command
    UploadCommand,
}

impl StateKey {
    pub const ALL: [StateKey; 7] = [
        Self::Directory,
        Self::Extensions,
        Self::RangeStart,
        Self::RangeEnd,
        Self::RetryQueue,
        Self::CredentialsFile,
        Self::UploadCommand,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Directory => "directory",
            Self::Extensions => "extensions",
            Self::RangeStart => "range_start",
            Self::RangeEnd => "range_end",
            Self::RetryQueue => "retry_queue",
            Self::CredentialsFile => "credentials_file",
            Self::UploadCommand => "upload_command",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.as_str() == s)
    }

    /// Check that `value` has the shape this key expects.
    pub fn validate(&self, value: &Value) -> Result<()> {
        let ok = match self {
            Self::Directory | Self::CredentialsFile => matches!(value, Value::String(_) | Value::Null),
            Self::Extensions | Self::RetryQueue | Self::UploadCommand => match value {
                Value::Array(items) => items.iter().all(Value::is_string),
                Value::Null => true,
                _ => false,
            },
            Self::RangeStart | Self::RangeEnd => {
                watermark::parse_bound(*self, value)?;
                true
            }
        };
        if ok {
            Ok(())
        } else {
            Err(Error::invalid_value(self.as_str(), format!("unexpected value {value}")))
        }
    }

    /// Value used when the key is absent from the file
    pub fn default_value(&self) -> Value {
        match self {
            Self::Directory => Value::String(String::new()),
            Self::Extensions => Value::Array(
                DEFAULT_EXTENSIONS
                    .iter()
                    .map(|e| Value::String(e.to_string()))
                    .collect(),
            ),
            Self::RangeStart | Self::RangeEnd | Self::CredentialsFile => Value::Null,
            Self::RetryQueue | Self::UploadCommand => Value::Array(Vec::new()),
        }
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The sync engine's durable state.
///
/// Constructed once per process and handed by reference to whatever needs
/// it; there is no global instance.
#[derive(Debug, Clone)]
pub struct PersistentState {
    path: PathBuf,
    values: Map<String, Value>,
    store: ConfigStore,
}

impl PersistentState {
    /// In-memory defaults bound to `path`; nothing is written yet.
    pub fn with_defaults(path: impl Into<PathBuf>) -> Self {
        let mut values = Map::new();
        for key in StateKey::ALL {
            values.insert(key.as_str().to_string(), key.default_value());
        }
        Self {
            path: path.into(),
            values,
            store: ConfigStore::new(),
        }
    }

    /// Whether a state file already exists at `path`
    pub fn exists(path: &Path) -> bool {
        path.is_file()
    }

    /// Load an existing state file.
    ///
    /// A file that exists but does not parse as a JSON object is reported
    /// as [`Error::ConfigCorrupt`] and left untouched on disk.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        Self::load_existing(&path)?.ok_or_else(|| {
            Error::Fs(tidemark_fs::Error::io(
                &path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "state file does not exist"),
            ))
        })
    }

    /// Load the state file, running the setup collaborator when the file
    /// is absent or `reconfigure` is requested.
    pub fn open(path: impl Into<PathBuf>, reconfigure: bool, setup: &mut dyn SetupPrompt) -> Result<Self> {
        let path = path.into();

        let (mut state, first_run) = match Self::load_existing(&path)? {
            Some(state) => (state, false),
            None => {
                tracing::info!(path = %path.display(), "no state file found, running first-time setup");
                (Self::with_defaults(&path), true)
            }
        };

        if first_run || reconfigure {
            let current = state.settings()?;
            let mut settings = setup.prompt_initial_settings(&current)?;
            settings.validate()?;
            state.apply_settings(&settings)?;
        }

        Ok(state)
    }

    fn load_existing(path: &Path) -> Result<Option<Self>> {
        let store = ConfigStore::new();

        let document: Option<Value> = store.load_optional(path).map_err(|e| match e {
            tidemark_fs::Error::ConfigParse { message, .. } => Error::ConfigCorrupt {
                path: path.to_path_buf(),
                message,
            },
            other => Error::Fs(other),
        })?;
        let Some(document) = document else {
            return Ok(None);
        };

        let Value::Object(mut values) = document else {
            return Err(Error::ConfigCorrupt {
                path: path.to_path_buf(),
                message: "top-level value is not an object".into(),
            });
        };

        for key in StateKey::ALL {
            if !values.contains_key(key.as_str()) {
                tracing::debug!(key = %key, "state key missing, using default");
                values.insert(key.as_str().to_string(), key.default_value());
            }
        }

        tracing::debug!(path = %path.display(), keys = values.len(), "loaded state");
        Ok(Some(Self {
            path: path.to_path_buf(),
            values,
            store,
        }))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every key, including unknown ones, in file order
    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    /// Read a raw value.
    pub fn get(&self, key: &str) -> Result<&Value> {
        self.values.get(key).ok_or_else(|| Error::KeyNotFound { key: key.to_string() })
    }

    /// Write one value and flush the whole document.
    ///
    /// If the flush fails the in-memory value is rolled back, so memory
    /// and disk never disagree.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> Result<()> {
        self.set_many([(key.to_string(), value.into())])
    }

    /// Write several values with a single flush.
    pub fn set_many(&mut self, entries: impl IntoIterator<Item = (String, Value)>) -> Result<()> {
        let previous = self.values.clone();
        for (key, value) in entries {
            self.values.insert(key, value);
        }
        if let Err(e) = self.flush() {
            self.values = previous;
            return Err(e);
        }
        Ok(())
    }

    /// Persist the current document atomically.
    pub fn flush(&self) -> Result<()> {
        self.store.save(&self.path, &Value::Object(self.values.clone()))?;
        tracing::trace!(path = %self.path.display(), "state flushed");
        Ok(())
    }

    pub fn directory(&self) -> Result<PathBuf> {
        let key = StateKey::Directory;
        match self.get(key.as_str())? {
            Value::String(s) => Ok(PathBuf::from(s)),
            Value::Null => Ok(PathBuf::new()),
            other => Err(Error::invalid_value(key.as_str(), format!("expected a path, got {other}"))),
        }
    }

    pub fn extensions(&self) -> Result<Vec<String>> {
        self.string_list(StateKey::Extensions)
    }

    pub fn range_start(&self) -> Result<Option<DateTime<Utc>>> {
        watermark::parse_bound(StateKey::RangeStart, self.get(StateKey::RangeStart.as_str())?)
    }

    pub fn range_end(&self) -> Result<Option<DateTime<Utc>>> {
        watermark::parse_bound(StateKey::RangeEnd, self.get(StateKey::RangeEnd.as_str())?)
    }

    pub fn watermark(&self) -> Result<Watermark> {
        Watermark::from_state(self)
    }

    pub fn retry_queue(&self) -> Result<Vec<PathBuf>> {
        Ok(self
            .string_list(StateKey::RetryQueue)?
            .into_iter()
            .map(PathBuf::from)
            .collect())
    }

    pub fn credentials_file(&self) -> Result<Option<PathBuf>> {
        let key = StateKey::CredentialsFile;
        match self.get(key.as_str())? {
            Value::Null => Ok(None),
            Value::String(s) if s.is_empty() => Ok(None),
            Value::String(s) => Ok(Some(PathBuf::from(s))),
            other => Err(Error::invalid_value(key.as_str(), format!("expected a path, got {other}"))),
        }
    }

    pub fn upload_command(&self) -> Result<Vec<String>> {
        self.string_list(StateKey::UploadCommand)
    }

    /// Append paths to the retry queue, skipping any already queued.
    ///
    /// Returns the paths that were actually added. Flushes once, and only
    /// when something changed.
    pub fn enqueue_retries(&mut self, paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
        let mut queue = self.string_list(StateKey::RetryQueue)?;
        let mut added = Vec::new();

        for path in paths {
            let entry = path_to_string(path);
            if queue.contains(&entry) {
                continue;
            }
            queue.push(entry);
            added.push(path.clone());
        }

        if !added.is_empty() {
            self.set(StateKey::RetryQueue.as_str(), string_array(queue))?;
        }
        Ok(added)
    }

    /// Empty the retry queue.
    pub fn clear_retry_queue(&mut self) -> Result<()> {
        self.set(StateKey::RetryQueue.as_str(), Value::Array(Vec::new()))
    }

    /// Move the watermark to `[now, +inf)` in one flush.
    pub fn advance_watermark(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.set_many([
            (StateKey::RangeStart.as_str().to_string(), watermark::timestamp_value(now)),
            (StateKey::RangeEnd.as_str().to_string(), Value::Null),
        ])
    }

    /// Current settings, in the shape the setup collaborator works with.
    ///
    /// Timestamp bounds are shown as their local calendar day.
    pub fn settings(&self) -> Result<InitialSettings> {
        let day = |instant: Option<DateTime<Utc>>| instant.map(|i| i.with_timezone(&chrono::Local).date_naive());
        Ok(InitialSettings {
            directory: self.directory()?,
            extensions: self.extensions()?,
            range: DateRange::from_bounds(day(self.range_start()?), day(self.range_end()?)),
        })
    }

    /// Store settings gathered by the setup collaborator.
    ///
    /// A range equal to the one [`PersistentState::settings`] offers is
    /// left as stored, so an advanced watermark keeps its exact instant
    /// instead of dropping back to local midnight.
    pub fn apply_settings(&mut self, settings: &InitialSettings) -> Result<()> {
        let mut entries = vec![
            (
                StateKey::Directory.as_str().to_string(),
                Value::String(path_to_string(&settings.directory)),
            ),
            (
                StateKey::Extensions.as_str().to_string(),
                string_array(settings.extensions.clone()),
            ),
        ];

        let range_changed = settings.range != self.settings()?.range;
        if range_changed {
            entries.push((
                StateKey::RangeStart.as_str().to_string(),
                watermark::date_value(settings.range.start()),
            ));
            entries.push((
                StateKey::RangeEnd.as_str().to_string(),
                watermark::date_value(settings.range.end()),
            ));
        }

        self.set_many(entries)?;
        tracing::info!(
            directory = %settings.directory.display(),
            extensions = ?settings.extensions,
            range_changed,
            "setup saved"
        );
        Ok(())
    }

    fn string_list(&self, key: StateKey) -> Result<Vec<String>> {
        match self.get(key.as_str())? {
            Value::Null => Ok(Vec::new()),
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s.clone()),
                    other => Err(Error::invalid_value(
                        key.as_str(),
                        format!("expected strings, found {other}"),
                    )),
                })
                .collect(),
            other => Err(Error::invalid_value(key.as_str(), format!("expected a list, got {other}"))),
        }
    }
}

fn path_to_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn string_array(items: Vec<String>) -> Value {
    Value::Array(items.into_iter().map(Value::String).collect())
}
