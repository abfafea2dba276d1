//! [`TestLibrary`] builder for scan and sync scenarios.
//!
//! Creation times come from a [`FixedTimestamps`] probe instead of the
//! filesystem, so scenarios can place files at exact instants.

use std::collections::HashMap;
use std::fs::{self, Metadata};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tempfile::TempDir;
use tidemark_core::{FileScanner, PersistentState, StateKey, TimestampProbe};

/// Instant `secs` seconds after the Unix epoch.
pub fn at(secs: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(secs, 0).unwrap()
}

/// Deterministic creation-time probe.
///
/// Clones share the same table, so files registered after a scanner was
/// built are still seen by it.
#[derive(Debug, Clone, Default)]
pub struct FixedTimestamps {
    times: Arc<Mutex<HashMap<PathBuf, DateTime<Utc>>>>,
    fallback: Option<DateTime<Utc>>,
}

impl FixedTimestamps {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time reported for paths that were never registered
    pub fn with_fallback(mut self, fallback: DateTime<Utc>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn set(&self, path: impl Into<PathBuf>, created: DateTime<Utc>) {
        self.times.lock().unwrap().insert(path.into(), created);
    }
}

impl TimestampProbe for FixedTimestamps {
    fn created_at(&self, path: &Path, _metadata: &Metadata) -> io::Result<DateTime<Utc>> {
        self.times
            .lock()
            .unwrap()
            .get(path)
            .copied()
            .or(self.fallback)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("no timestamp for {}", path.display())))
    }
}

/// A temporary media library plus a state file next to it.
///
/// # Example
///
/// ```rust,no_run
/// use tidemark_test_utils::{TestLibrary, at};
///
/// let lib = TestLibrary::new();
/// lib.add("album/a.mp3", at(100));
/// let state = lib.init_state(&["mp3"]);
/// ```
pub struct TestLibrary {
    temp_dir: TempDir,
    probe: FixedTimestamps,
}

impl Default for TestLibrary {
    fn default() -> Self {
        Self::new()
    }
}

impl TestLibrary {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir(temp_dir.path().join("library")).unwrap();
        Self {
            temp_dir,
            probe: FixedTimestamps::new(),
        }
    }

    /// Root of the media library
    pub fn root(&self) -> PathBuf {
        self.temp_dir.path().join("library")
    }

    /// Location of the state file, outside the library
    pub fn state_path(&self) -> PathBuf {
        self.temp_dir.path().join("state.json")
    }

    /// Create an empty file at `relative` with the given creation time.
    pub fn add(&self, relative: &str, created: DateTime<Utc>) -> PathBuf {
        let path = self.root().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, b"").unwrap();
        self.probe.set(&path, created);
        path
    }

    /// Create a subdirectory without registering anything in it.
    pub fn mkdir(&self, relative: &str) -> PathBuf {
        let path = self.root().join(relative);
        fs::create_dir_all(&path).unwrap();
        path
    }

    pub fn probe(&self) -> FixedTimestamps {
        self.probe.clone()
    }

    /// Scanner that reads creation times from this library's probe
    pub fn scanner(&self) -> FileScanner {
        FileScanner::with_probe(self.probe.clone())
    }

    /// Write a state file pointing at the library with an unbounded window.
    pub fn init_state(&self, extensions: &[&str]) -> PersistentState {
        let mut state = PersistentState::with_defaults(self.state_path());
        state
            .set_many([
                (
                    StateKey::Directory.as_str().to_string(),
                    Value::String(self.root().to_string_lossy().into_owned()),
                ),
                (
                    StateKey::Extensions.as_str().to_string(),
                    Value::Array(extensions.iter().map(|e| Value::String(e.to_string())).collect()),
                ),
            ])
            .unwrap();
        state
    }

    /// Parsed contents of the state file as it is on disk
    pub fn state_on_disk(&self) -> Value {
        serde_json::from_str(&fs::read_to_string(self.state_path()).unwrap()).unwrap()
    }
}
