//! Report types produced by a sync run
//!
//! A [`RunReport`] is returned for every run that got as far as scanning,
//! including cancelled and aborted ones, so callers can always print what
//! happened.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// How the run ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    /// Every batch finished without cancellation
    Completed,
    /// The uploader reported a cancellation; later work was skipped
    Cancelled,
    /// A scan or upload failed outright; later work was skipped
    Aborted { reason: String },
}

impl RunStatus {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// Which part of the run a batch belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchKind {
    Extension,
    RetryReplay,
}

/// A path the remote library refused, with its reason
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rejection {
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome of one scan+upload batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// Extension name, or `retry` for the replay
    pub label: String,
    pub kind: BatchKind,
    /// Paths considered for upload
    pub candidates: Vec<PathBuf>,
    /// Scan entries that could not be read
    pub skipped_entries: usize,
    /// Whether the batch reached the uploader
    pub submitted: bool,
    pub cancelled: bool,
    pub accepted: Vec<PathBuf>,
    pub matched: Vec<PathBuf>,
    /// Rejected as already present remotely; counted as success
    pub duplicates: Vec<PathBuf>,
    /// Rejected for any other reason
    pub failed: Vec<Rejection>,
    /// Failed paths that were not already in the retry queue
    pub newly_queued: Vec<PathBuf>,
}

impl BatchReport {
    pub fn new(label: impl Into<String>, kind: BatchKind, candidates: Vec<PathBuf>) -> Self {
        Self {
            label: label.into(),
            kind,
            candidates,
            skipped_entries: 0,
            submitted: false,
            cancelled: false,
            accepted: Vec::new(),
            matched: Vec::new(),
            duplicates: Vec::new(),
            failed: Vec::new(),
            newly_queued: Vec::new(),
        }
    }
}

/// Summed counts across every batch of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub candidates: usize,
    pub accepted: usize,
    pub matched: usize,
    pub duplicates: usize,
    pub failed: usize,
}

/// Everything a caller needs to summarize one run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Instant captured before scanning; becomes the next watermark start
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub dry_run: bool,
    pub watermark_start: Option<DateTime<Utc>>,
    pub watermark_end: Option<DateTime<Utc>>,
    /// Per-extension batches in configured order
    pub batches: Vec<BatchReport>,
    /// Retry-queue replay, when one was attempted
    pub retry: Option<BatchReport>,
    #[serde(flatten)]
    pub status: RunStatus,
    pub watermark_advanced: bool,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.status.is_completed()
    }

    /// Extension batches followed by the replay
    pub fn all_batches(&self) -> impl Iterator<Item = &BatchReport> {
        self.batches.iter().chain(self.retry.iter())
    }

    /// Paths added to the retry queue during this run
    pub fn newly_queued(&self) -> Vec<PathBuf> {
        self.all_batches()
            .flat_map(|b| b.newly_queued.iter().cloned())
            .collect()
    }

    pub fn totals(&self) -> Totals {
        self.all_batches().fold(Totals::default(), |mut t, b| {
            t.candidates += b.candidates.len();
            t.accepted += b.accepted.len();
            t.matched += b.matched.len();
            t.duplicates += b.duplicates.len();
            t.failed += b.failed.len();
            t
        })
    }
}
