//! Contracts for the remote library collaborators
//!
//! The transport, the authentication handshake and server-side matching
//! live outside this crate. The orchestrator sees them only through
//! [`CredentialProvider`] and [`Uploader`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Substring in a rejection reason meaning "already stored remotely"
pub const DUPLICATE_SENTINEL: &str = "ALREADY_EXISTS";

/// Reason recorded for a submitted path the collaborator did not report on
pub const NO_RESULT_REASON: &str = "NO_RESULT";

/// Per-path verdicts for one upload batch.
///
/// The three maps are expected to be disjoint and to cover every path that
/// was submitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedResult {
    /// Newly stored: path -> remote id
    #[serde(default)]
    pub accepted: BTreeMap<PathBuf, String>,
    /// Already present and content-matched: path -> remote id
    #[serde(default)]
    pub matched: BTreeMap<PathBuf, String>,
    /// Not stored: path -> free-form reason
    #[serde(default)]
    pub rejected: BTreeMap<PathBuf, String>,
}

impl ClassifiedResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_accepted(mut self, path: impl Into<PathBuf>, remote_id: impl Into<String>) -> Self {
        self.accepted.insert(path.into(), remote_id.into());
        self
    }

    pub fn with_matched(mut self, path: impl Into<PathBuf>, remote_id: impl Into<String>) -> Self {
        self.matched.insert(path.into(), remote_id.into());
        self
    }

    pub fn with_rejected(mut self, path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        self.rejected.insert(path.into(), reason.into());
        self
    }

    /// Total number of verdicts across the three maps
    pub fn len(&self) -> usize {
        self.accepted.len() + self.matched.len() + self.rejected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `path` received any verdict
    pub fn contains(&self, path: &Path) -> bool {
        self.accepted.contains_key(path) || self.matched.contains_key(path) || self.rejected.contains_key(path)
    }
}

/// Whether a rejection reason means the file is already in the library
pub fn is_duplicate(reason: &str) -> bool {
    reason.contains(DUPLICATE_SENTINEL)
}

/// What came back from one upload call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Classified(ClassifiedResult),
    /// The user (or the environment) interrupted the batch
    Cancelled,
}

/// Opaque proof of authentication handed to the uploader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialHandle {
    path: Option<PathBuf>,
}

impl CredentialHandle {
    /// Credentials stored in a file the uploader reads itself
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self { path: Some(path.into()) }
    }

    /// Credentials the uploader manages without help
    pub fn ambient() -> Self {
        Self { path: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

/// Obtains credentials before the first batch of a run.
///
/// Failure should be reported as [`crate::Error::CredentialFailure`].
pub trait CredentialProvider {
    fn ensure_credentials(&mut self) -> Result<CredentialHandle>;
}

/// Sends one batch of files to the remote library.
///
/// Never called with an empty batch.
pub trait Uploader {
    fn upload(&mut self, credentials: &CredentialHandle, paths: &[PathBuf]) -> Result<UploadOutcome>;
}
