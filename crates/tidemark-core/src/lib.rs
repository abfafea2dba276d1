//! Watermark-based incremental scan and upload engine
//!
//! This crate decides which media files are new, drives the upload and
//! classification cycle through pluggable collaborators, and keeps the
//! durable state that lets an interrupted run resume correctly:
//!
//! - **State**: the single JSON state file ([`PersistentState`])
//! - **Watermark**: the creation-time window bounding each scan
//! - **Scanner**: recursive, extension-filtered discovery ([`FileScanner`])
//! - **Sync**: the run state machine ([`SyncOrchestrator`])
//!
//! # Architecture
//!
//! ```text
//!                 tidemark-cli
//!                      |
//!                tidemark-core
//!                      |
//!                 tidemark-fs
//! ```
//!
//! The upload transport, credential flow and setup prompts are external.
//! They plug in through [`Uploader`], [`CredentialProvider`] and
//! [`SetupPrompt`].

pub mod error;
pub mod scanner;
pub mod setup;
pub mod state;
pub mod sync;
pub mod upload;
pub mod watermark;

pub use error::{Error, Result};
pub use scanner::{FileScanner, MetadataTimestamps, ScanCandidate, ScanReport, TimestampProbe};
pub use setup::{DateEntry, DateEntryStep, DateRange, InitialSettings, SetupPrompt, parse_date};
pub use state::{PersistentState, StateKey};
pub use sync::{
    BatchKind, BatchReport, Rejection, RunReport, RunStatus, SyncOptions, SyncOrchestrator, SyncPhase,
};
pub use upload::{ClassifiedResult, CredentialHandle, CredentialProvider, UploadOutcome, Uploader};
pub use watermark::Watermark;
