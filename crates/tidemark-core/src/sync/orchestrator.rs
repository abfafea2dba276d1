//! The per-run scan, upload, classify and advance cycle

use std::fmt;
use std::time::Instant;

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::scanner::FileScanner;
use crate::state::PersistentState;
use crate::upload::{CredentialHandle, CredentialProvider, UploadOutcome, Uploader};

use super::classify::classify;
use super::report::{BatchKind, BatchReport, RunReport, RunStatus};

/// Label used for the retry-queue replay batch
pub const RETRY_LABEL: &str = "retry";

/// Options for a sync run
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    /// Scan and report without uploading or touching the state file
    pub dry_run: bool,
}

/// Where a run currently is; logged on every transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncPhase {
    Scanning(String),
    Uploading { label: String, batch: usize },
    Classifying(String),
    Advancing,
    Aborted(String),
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scanning(ext) => write!(f, "scanning .{ext}"),
            Self::Uploading { label, batch } => write!(f, "uploading {batch} file(s) for {label}"),
            Self::Classifying(label) => write!(f, "classifying {label}"),
            Self::Advancing => f.write_str("advancing watermark"),
            Self::Aborted(reason) => write!(f, "aborted: {reason}"),
        }
    }
}

/// How a submitted batch ended
enum BatchEnd {
    Classified,
    Cancelled,
    Aborted(String),
}

/// Drives one sync run against a [`PersistentState`].
///
/// Collaborators are borrowed for the duration of the run; nothing here
/// talks to a terminal or the network directly.
pub struct SyncOrchestrator<'a> {
    state: &'a mut PersistentState,
    scanner: &'a FileScanner,
    uploader: &'a mut dyn Uploader,
    credentials: &'a mut dyn CredentialProvider,
    options: SyncOptions,
    handle: Option<CredentialHandle>,
}

impl<'a> SyncOrchestrator<'a> {
    pub fn new(
        state: &'a mut PersistentState,
        scanner: &'a FileScanner,
        uploader: &'a mut dyn Uploader,
        credentials: &'a mut dyn CredentialProvider,
    ) -> Self {
        Self {
            state,
            scanner,
            uploader,
            credentials,
            options: SyncOptions::default(),
            handle: None,
        }
    }

    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    /// Run once, using the current time as the next watermark start.
    pub fn run(&mut self) -> Result<RunReport> {
        self.run_at(Utc::now())
    }

    /// Run once with `now` as the instant captured at run start.
    ///
    /// Cancellation and aborts are reported through [`RunReport::status`].
    /// `Err` is returned only when credentials cannot be obtained or the
    /// state file cannot be read or written.
    pub fn run_at(&mut self, now: DateTime<Utc>) -> Result<RunReport> {
        let clock = Instant::now();
        let directory = self.state.directory()?;
        let extensions = self.state.extensions()?;
        let watermark = self.state.watermark()?;

        tracing::info!(
            directory = %directory.display(),
            %watermark,
            dry_run = self.options.dry_run,
            "sync run started"
        );

        let mut report = RunReport {
            started_at: now,
            elapsed_ms: 0,
            dry_run: self.options.dry_run,
            watermark_start: watermark.start(),
            watermark_end: watermark.end(),
            batches: Vec::with_capacity(extensions.len()),
            retry: None,
            status: RunStatus::Completed,
            watermark_advanced: false,
        };

        for extension in &extensions {
            enter(SyncPhase::Scanning(extension.clone()));
            let scan = match self.scanner.scan(&directory, extension, &watermark) {
                Ok(scan) => scan,
                Err(e @ Error::ScanRootUnreadable { .. }) => {
                    report.status = abort(e.to_string());
                    break;
                }
                Err(e) => return Err(e),
            };

            let mut batch = BatchReport::new(extension.as_str(), BatchKind::Extension, scan.paths());
            batch.skipped_entries = scan.skipped;

            if batch.candidates.is_empty() {
                tracing::info!(extension = extension.as_str(), "no new files");
                report.batches.push(batch);
                continue;
            }
            tracing::info!(extension = extension.as_str(), found = batch.candidates.len(), "new files found");

            if self.options.dry_run {
                report.batches.push(batch);
                continue;
            }

            let end = self.submit(&mut batch, false)?;
            report.batches.push(batch);
            match end {
                BatchEnd::Classified => {}
                BatchEnd::Cancelled => {
                    tracing::warn!(extension = extension.as_str(), "upload cancelled; skipping remaining work");
                    report.status = RunStatus::Cancelled;
                    break;
                }
                BatchEnd::Aborted(reason) => {
                    report.status = abort(reason);
                    break;
                }
            }
        }

        if report.status.is_completed() {
            report.retry = self.replay_retry_queue(&mut report.status)?;
        }

        if report.status.is_completed() && !self.options.dry_run {
            enter(SyncPhase::Advancing);
            self.state.advance_watermark(now)?;
            report.watermark_advanced = true;
        }

        report.elapsed_ms = u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX);
        let totals = report.totals();
        tracing::info!(
            status = ?report.status,
            accepted = totals.accepted,
            matched = totals.matched,
            duplicates = totals.duplicates,
            failed = totals.failed,
            advanced = report.watermark_advanced,
            "sync run finished"
        );
        Ok(report)
    }

    /// Submit the whole retry queue as one batch.
    ///
    /// The queue is emptied only once a classified result is in hand, so a
    /// cancelled or failed replay loses nothing.
    fn replay_retry_queue(&mut self, status: &mut RunStatus) -> Result<Option<BatchReport>> {
        let queue = self.state.retry_queue()?;
        if queue.is_empty() {
            return Ok(None);
        }

        let mut batch = BatchReport::new(RETRY_LABEL, BatchKind::RetryReplay, queue);
        tracing::info!(queued = batch.candidates.len(), "replaying retry queue");
        if self.options.dry_run {
            return Ok(Some(batch));
        }

        match self.submit(&mut batch, true)? {
            BatchEnd::Classified => {}
            BatchEnd::Cancelled => {
                tracing::warn!("retry replay cancelled; queue kept");
                *status = RunStatus::Cancelled;
            }
            BatchEnd::Aborted(reason) => *status = abort(reason),
        }
        Ok(Some(batch))
    }

    fn submit(&mut self, batch: &mut BatchReport, replay: bool) -> Result<BatchEnd> {
        let handle = self.credentials()?;

        enter(SyncPhase::Uploading {
            label: batch.label.clone(),
            batch: batch.candidates.len(),
        });
        batch.submitted = true;
        let result = match self.uploader.upload(&handle, &batch.candidates) {
            Ok(UploadOutcome::Classified(result)) => result,
            Ok(UploadOutcome::Cancelled) => {
                batch.cancelled = true;
                return Ok(BatchEnd::Cancelled);
            }
            Err(e) => return Ok(BatchEnd::Aborted(e.to_string())),
        };

        enter(SyncPhase::Classifying(batch.label.clone()));
        if replay {
            self.state.clear_retry_queue()?;
        }
        let classification = classify(&batch.candidates, &result);
        batch.newly_queued = self.state.enqueue_retries(&classification.retry_paths())?;
        for rejection in &classification.failed {
            tracing::warn!(path = %rejection.path.display(), reason = rejection.reason.as_str(), "upload rejected; queued for retry");
        }

        batch.accepted = classification.accepted;
        batch.matched = classification.matched;
        batch.duplicates = classification.duplicates;
        batch.failed = classification.failed;
        Ok(BatchEnd::Classified)
    }

    /// Obtain credentials on first use and reuse them for the rest of the run.
    fn credentials(&mut self) -> Result<CredentialHandle> {
        if let Some(handle) = &self.handle {
            return Ok(handle.clone());
        }
        let handle = self.credentials.ensure_credentials()?;
        tracing::debug!(ambient = handle.path().is_none(), "credentials ready");
        self.handle = Some(handle.clone());
        Ok(handle)
    }
}

fn enter(phase: SyncPhase) {
    tracing::debug!(%phase, "sync phase");
}

fn abort(reason: String) -> RunStatus {
    enter(SyncPhase::Aborted(reason.clone()));
    tracing::error!(reason = reason.as_str(), "sync run aborted");
    RunStatus::Aborted { reason }
}
