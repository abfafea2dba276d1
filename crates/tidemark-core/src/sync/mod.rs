//! Sync run orchestration
//!
//! - **orchestrator**: the per-extension scan, upload and classify loop,
//!   the retry-queue replay and watermark advancement
//! - **classify**: folding an upload result into success and retry buckets
//! - **report**: what a run hands back to its caller

mod classify;
mod orchestrator;
mod report;

pub use classify::{Classification, classify};
pub use orchestrator::{RETRY_LABEL, SyncOptions, SyncOrchestrator, SyncPhase};
pub use report::{BatchKind, BatchReport, Rejection, RunReport, RunStatus, Totals};
