//! Splitting an upload result into success and retry buckets

use std::collections::HashSet;
use std::path::PathBuf;

use crate::upload::{ClassifiedResult, NO_RESULT_REASON, is_duplicate};

use super::report::Rejection;

/// Per-path verdicts for a batch, in submission order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    pub accepted: Vec<PathBuf>,
    pub matched: Vec<PathBuf>,
    pub duplicates: Vec<PathBuf>,
    pub failed: Vec<Rejection>,
}

impl Classification {
    /// Paths that belong in the retry queue
    pub fn retry_paths(&self) -> Vec<PathBuf> {
        self.failed.iter().map(|r| r.path.clone()).collect()
    }
}

/// Classify `result` against the batch that produced it.
///
/// Accepted and matched paths are successes. Rejections carrying the
/// duplicate sentinel are successes too; every other rejection is a
/// failure. A submitted path the result does not mention is a failure with
/// reason [`NO_RESULT_REASON`]. Verdicts for paths outside the batch are
/// ignored.
pub fn classify(submitted: &[PathBuf], result: &ClassifiedResult) -> Classification {
    let mut out = Classification::default();

    for path in submitted {
        let verdicts = [
            result.accepted.contains_key(path),
            result.matched.contains_key(path),
            result.rejected.contains_key(path),
        ];
        if verdicts.iter().filter(|v| **v).count() > 1 {
            tracing::warn!(path = %path.display(), "uploader returned conflicting verdicts; preferring the most favourable");
        }

        if result.accepted.contains_key(path) {
            out.accepted.push(path.clone());
        } else if result.matched.contains_key(path) {
            out.matched.push(path.clone());
        } else if let Some(reason) = result.rejected.get(path) {
            if is_duplicate(reason) {
                out.duplicates.push(path.clone());
            } else {
                out.failed.push(Rejection {
                    path: path.clone(),
                    reason: reason.clone(),
                });
            }
        } else {
            tracing::warn!(path = %path.display(), "uploader returned no verdict");
            out.failed.push(Rejection {
                path: path.clone(),
                reason: NO_RESULT_REASON.to_string(),
            });
        }
    }

    let batch: HashSet<&PathBuf> = submitted.iter().collect();
    let unexpected = result
        .accepted
        .keys()
        .chain(result.matched.keys())
        .chain(result.rejected.keys())
        .filter(|p| !batch.contains(p))
        .count();
    if unexpected > 0 {
        tracing::warn!(unexpected, "ignoring verdicts for paths outside the batch");
    }

    out
}
