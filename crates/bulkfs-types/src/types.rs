//! Core value types for bulkfs
//!
//! This module provides the data carried through the engine: enumerated
//! paths, traversal orders, failed-item records, progress payloads, and
//! batch statistics.

use std::path::{Path, PathBuf};

use crate::ProcessError;

/// Unique identifier for a batch operation, used in log correlation.
pub type ProcessId = uuid::Uuid;

/// A single enumerated file-system entry.
///
/// Created by the enumerator, consumed by the work queue, and never
/// mutated afterwards except for relative-directory rewriting when a
/// colliding destination directory is renamed during a copy.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PathInfo {
    path: PathBuf,
    is_dir: bool,
    size: Option<u64>,
    relative_dir: Option<PathBuf>,
    old_relative_dir: Option<PathBuf>,
}

impl PathInfo {
    /// Create an entry for a regular file of known size.
    pub fn file<P: Into<PathBuf>>(path: P, size: u64) -> Self {
        Self {
            path: path.into(),
            is_dir: false,
            size: Some(size),
            relative_dir: None,
            old_relative_dir: None,
        }
    }

    /// Create an entry for a directory. Directories carry no size.
    pub fn directory<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            is_dir: true,
            size: None,
            relative_dir: None,
            old_relative_dir: None,
        }
    }

    /// Create an entry whose metadata could not be read. Carries neither
    /// a size nor a directory flag worth trusting; used only to record
    /// the path in the error queue.
    pub fn unverified<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            is_dir: false,
            size: None,
            relative_dir: None,
            old_relative_dir: None,
        }
    }

    /// Create an entry from a path and its metadata.
    pub fn from_metadata<P: Into<PathBuf>>(path: P, meta: &std::fs::Metadata) -> Self {
        if meta.is_dir() {
            Self::directory(path)
        } else {
            Self::file(path, meta.len())
        }
    }

    /// Attach the directory this entry occupies relative to the
    /// enumeration base, used to rebuild the tree under a destination
    /// root.
    pub fn with_relative_dir<P: Into<PathBuf>>(mut self, relative_dir: P) -> Self {
        self.relative_dir = Some(relative_dir.into());
        self
    }

    /// Rewrite the relative directory, remembering the previous value.
    ///
    /// Happens when an ancestor directory was renamed at the destination
    /// and every descendant must follow it.
    pub fn rewrite_relative_dir<P: Into<PathBuf>>(&mut self, relative_dir: P) {
        self.old_relative_dir = self.relative_dir.take();
        self.relative_dir = Some(relative_dir.into());
    }

    /// The absolute source path of this entry.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether this entry is a directory.
    pub fn is_dir(&self) -> bool {
        self.is_dir
    }

    /// Size in bytes for files, `None` for directories.
    pub fn size(&self) -> Option<u64> {
        self.size
    }

    /// Size in bytes counting directories as zero.
    pub fn size_or_zero(&self) -> u64 {
        self.size.unwrap_or(0)
    }

    /// The directory this entry occupies relative to the enumeration
    /// base, when known.
    pub fn relative_dir(&self) -> Option<&Path> {
        self.relative_dir.as_deref()
    }

    /// The relative directory before the last rewrite, when one happened.
    pub fn old_relative_dir(&self) -> Option<&Path> {
        self.old_relative_dir.as_deref()
    }

    /// The final path component, or the whole path when it has none.
    pub fn file_name(&self) -> &std::ffi::OsStr {
        self.path.file_name().unwrap_or(self.path.as_os_str())
    }
}

/// Depth-first traversal orders an operation can require.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TraversalOrder {
    /// Every directory is yielded before its contents. Required for copy,
    /// so destination directories exist before the files inside them.
    DirectoriesThenFiles,
    /// Files in a directory are yielded before its subdirectories.
    FilesThenDirectories,
    /// Every entry is yielded before its parent directory (post-order).
    /// Required for deletion, so a directory is only removed once empty.
    ChildrenThenParent,
}

/// A work item that could not be processed, paired with its
/// classification. Pushed into the error queue when the recovery policy
/// chose to skip rather than abort.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FailedPath {
    /// The item that failed
    pub item: PathInfo,
    /// The classified error it failed with
    pub error: ProcessError,
}

/// Progress payload delivered to the caller after every processed item
/// and after every streamed chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProcessProgress {
    /// Overall completion, floor-rounded, monotonically non-decreasing
    pub percent: u8,
    /// Bytes processed so far across the batch
    pub bytes_processed: u64,
    /// Total bytes the batch holds (0 when the batch is directories only)
    pub total_bytes: u64,
    /// Items fully processed so far
    pub items_processed: u64,
    /// Total items the batch holds
    pub total_items: u64,
    /// The path currently being worked on, when one is
    pub current: Option<PathBuf>,
}

/// Aggregate statistics for one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProcessStats {
    /// Regular files processed successfully
    pub files_processed: u64,
    /// Directories processed successfully
    pub directories_processed: u64,
    /// Bytes processed successfully
    pub bytes_processed: u64,
    /// Files skipped because the destination already held identical bytes
    pub files_skipped: u64,
    /// Items recorded in the error queue
    pub errors: u64,
}

impl ProcessStats {
    /// Create an empty statistics instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total items that reached a terminal outcome.
    pub fn items_finished(&self) -> u64 {
        self.files_processed + self.directories_processed + self.files_skipped + self.errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_and_directory_sizes() {
        let f = PathInfo::file("/a/b.txt", 42);
        assert!(!f.is_dir());
        assert_eq!(f.size(), Some(42));
        assert_eq!(f.size_or_zero(), 42);

        let d = PathInfo::directory("/a");
        assert!(d.is_dir());
        assert_eq!(d.size(), None);
        assert_eq!(d.size_or_zero(), 0);
    }

    #[test]
    fn relative_dir_rewrite_keeps_history() {
        let mut info = PathInfo::file("/src/root/sub/x.txt", 1).with_relative_dir("root/sub");
        assert_eq!(info.relative_dir(), Some(Path::new("root/sub")));
        assert_eq!(info.old_relative_dir(), None);

        info.rewrite_relative_dir("root (1)/sub");
        assert_eq!(info.relative_dir(), Some(Path::new("root (1)/sub")));
        assert_eq!(info.old_relative_dir(), Some(Path::new("root/sub")));
    }

    #[test]
    fn file_name_of_plain_path() {
        let info = PathInfo::file("b.txt", 1);
        assert_eq!(info.file_name(), "b.txt");
    }

    #[test]
    fn stats_terminal_count() {
        let stats = ProcessStats {
            files_processed: 3,
            directories_processed: 2,
            bytes_processed: 100,
            files_skipped: 1,
            errors: 1,
        };
        assert_eq!(stats.items_finished(), 7);
    }
}
