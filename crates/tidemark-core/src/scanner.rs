//! Recursive discovery of new media files
//!
//! A file is a candidate when its name ends with `.<extension>` and its
//! creation timestamp falls inside the [`Watermark`]. The timestamp comes
//! from filesystem metadata, not file content.
//!
//! # Known limitation
//!
//! On Unix the "creation" time is the inode change time (`ctime`), which
//! also moves on chmod, rename or ownership changes. Such files can be
//! picked up again after the watermark has passed them, and a file copied
//! in with preserved metadata is still seen as new. Treat the result as a
//! best-effort approximation of "recently added".

use std::fs::{self, Metadata};
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::watermark::Watermark;

/// A file that passed both the extension and the watermark filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanCandidate {
    pub path: PathBuf,
    pub created: DateTime<Utc>,
}

/// Source of the creation timestamp for a file
pub trait TimestampProbe {
    fn created_at(&self, path: &Path, metadata: &Metadata) -> io::Result<DateTime<Utc>>;
}

/// Reads the platform-reported creation time from metadata.
///
/// Unix: `ctime`. Elsewhere: the birth time reported by the OS.
#[derive(Debug, Default, Clone, Copy)]
pub struct MetadataTimestamps;

impl TimestampProbe for MetadataTimestamps {
    #[cfg(unix)]
    fn created_at(&self, _path: &Path, metadata: &Metadata) -> io::Result<DateTime<Utc>> {
        use std::os::unix::fs::MetadataExt;

        let nanos = u32::try_from(metadata.ctime_nsec()).unwrap_or(0);
        DateTime::<Utc>::from_timestamp(metadata.ctime(), nanos)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "ctime out of range"))
    }

    #[cfg(not(unix))]
    fn created_at(&self, _path: &Path, metadata: &Metadata) -> io::Result<DateTime<Utc>> {
        metadata.created().map(DateTime::<Utc>::from)
    }
}

/// Result of one scan
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    /// Matching files, sorted by path
    pub candidates: Vec<ScanCandidate>,
    /// Entries skipped because they could not be read
    pub skipped: usize,
    /// Directories visited, root included
    pub directories: usize,
}

impl ScanReport {
    pub fn paths(&self) -> Vec<PathBuf> {
        self.candidates.iter().map(|c| c.path.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// Walks a directory tree looking for files of one extension.
///
/// Every scan starts from scratch; the watermark alone bounds the work.
/// Symlinked files are followed, symlinked directories are not descended.
pub struct FileScanner {
    probe: Box<dyn TimestampProbe>,
}

impl Default for FileScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl FileScanner {
    pub fn new() -> Self {
        Self::with_probe(MetadataTimestamps)
    }

    pub fn with_probe(probe: impl TimestampProbe + 'static) -> Self {
        Self { probe: Box::new(probe) }
    }

    /// Scan `directory` for `*.<extension>` files inside `watermark`.
    ///
    /// Only an unreadable root is an error. Anything below it that cannot
    /// be read is logged and skipped.
    pub fn scan(&self, directory: &Path, extension: &str, watermark: &Watermark) -> Result<ScanReport> {
        let suffix = format!(".{}", extension.trim_start_matches('.'));
        let mut report = ScanReport::default();

        for entry in WalkDir::new(directory).follow_links(false) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(error) if error.depth() == 0 => {
                    return Err(Error::ScanRootUnreadable {
                        path: directory.to_path_buf(),
                        source: io::Error::from(error),
                    });
                }
                Err(error) => {
                    let path = error.path().unwrap_or(directory).to_path_buf();
                    skip(&mut report, Error::PathUnreadable {
                        path,
                        source: io::Error::from(error),
                    });
                    continue;
                }
            };

            if entry.depth() == 0 {
                if !directory.is_dir() {
                    return Err(Error::ScanRootUnreadable {
                        path: directory.to_path_buf(),
                        source: io::Error::other("not a directory"),
                    });
                }
                report.directories += 1;
                continue;
            }

            if entry.file_type().is_dir() {
                report.directories += 1;
                continue;
            }

            if !entry.file_name().to_string_lossy().ends_with(&suffix) {
                continue;
            }

            let path = entry.into_path();

            // Follows symlinks; a link to a directory is not a media file
            let metadata = match fs::metadata(&path) {
                Ok(m) if m.is_file() => m,
                Ok(_) => continue,
                Err(source) => {
                    skip(&mut report, Error::PathUnreadable { path, source });
                    continue;
                }
            };

            let created = match self.probe.created_at(&path, &metadata) {
                Ok(ts) => ts,
                Err(source) => {
                    skip(&mut report, Error::PathUnreadable { path, source });
                    continue;
                }
            };

            if watermark.in_range(created) {
                report.candidates.push(ScanCandidate { path, created });
            }
        }

        report.candidates.sort_by(|a, b| a.path.cmp(&b.path));
        tracing::debug!(
            directory = %directory.display(),
            extension,
            found = report.candidates.len(),
            skipped = report.skipped,
            directories = report.directories,
            "scan finished"
        );
        Ok(report)
    }
}

fn skip(report: &mut ScanReport, error: Error) {
    report.skipped += 1;
    tracing::warn!("skipping entry: {error}");
}
