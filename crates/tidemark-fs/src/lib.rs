//! Filesystem layer for tidemark
//!
//! Provides crash-safe persistence for the sync state file: every save goes
//! through a write-to-temp-then-rename so a reader never observes a
//! truncated document.

pub mod config;
pub mod error;
pub mod io;

pub use config::{ConfigFormat, ConfigStore};
pub use error::{Error, Result};
