//! Shared test utilities for the tidemark workspace.
//!
//! Dev-dependency only, never published.
//!
//! # Modules
//!
//! - [`collaborators`]: scripted uploader, setup and credential doubles
//! - [`library`]: [`TestLibrary`] builder for a temporary media library

pub mod collaborators;
pub mod library;

pub use collaborators::{FailingCredentials, Reply, ScriptedSetup, ScriptedUploader, StaticCredentials};
pub use library::{FixedTimestamps, TestLibrary, at};
