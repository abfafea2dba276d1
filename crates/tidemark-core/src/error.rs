//! Error types for tidemark-core

use std::path::PathBuf;

/// Result type for tidemark-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in tidemark-core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The state file exists but cannot be understood; never auto-repaired
    #[error("State file {path} is corrupt: {message}")]
    ConfigCorrupt { path: PathBuf, message: String },

    /// Requested state key is not present
    #[error("State key not found: {key}")]
    KeyNotFound { key: String },

    /// State key holds a value of the wrong shape
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Date text does not match YYYY-MM-DD or names no real day
    #[error("Invalid date '{input}': expected YYYY-MM-DD")]
    InvalidDate { input: String },

    /// The setup collaborator gave up without producing settings
    #[error("Setup cancelled: {message}")]
    SetupCancelled { message: String },

    /// A single entry could not be inspected during a scan
    #[error("Cannot read {path}: {source}")]
    PathUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configured library root itself cannot be listed
    #[error("Cannot scan library directory {path}: {source}")]
    ScanRootUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The credential collaborator could not authenticate
    #[error("Credential failure: {message}")]
    CredentialFailure { message: String },

    /// The upload collaborator failed for a reason other than cancellation
    #[error("Upload failed: {message}")]
    Upload { message: String },

    // Transparent wrappers for underlying errors
    /// Filesystem error from tidemark-fs
    #[error(transparent)]
    Fs(#[from] tidemark_fs::Error),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn invalid_value(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            message: message.into(),
        }
    }

    pub fn credential(message: impl Into<String>) -> Self {
        Self::CredentialFailure {
            message: message.into(),
        }
    }

    pub fn upload(message: impl Into<String>) -> Self {
        Self::Upload {
            message: message.into(),
        }
    }
}
