//! Streaming archive writer with entry hooks for bulkfs
//!
//! Builds `.tar.zst` archives one entry at a time. Every appended file
//! fires three hooks — entry started, per-chunk progress, entry finished
//! — and polls a cancel token at each chunk boundary, so the engine can
//! translate the archiver's native streaming into its own progress and
//! cancellation contract.
//!
//! # Examples
//!
//! ```rust,no_run
//! use bulkfs_archive::{ArchiveHooks, ArchiveWriter};
//! use bulkfs_types::{CancelToken, CompressionLevel};
//! use std::path::Path;
//!
//! # fn main() -> bulkfs_types::Result<()> {
//! let cancel = CancelToken::new();
//! let hooks = ArchiveHooks::default();
//! let mut writer = ArchiveWriter::create("backup.tar.zst", CompressionLevel::default())?;
//! writer.append_file(Path::new("notes.txt"), Path::new("notes.txt"), &hooks, &cancel)?;
//! writer.finish()?;
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

mod writer;

pub use writer::{ArchiveHooks, ArchiveWriter};
