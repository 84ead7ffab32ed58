//! Core type system and error taxonomy for bulkfs
//!
//! This crate provides the foundational types shared by the bulkfs engine
//! crates:
//!
//! - **Error taxonomy**: the closed set of domain errors an operation can
//!   produce, plus the pure classification of raw OS error codes
//! - **Value types**: enumerated paths, traversal orders, progress payloads
//! - **Recovery policy**: the injected retry/skip/abort decision point
//! - **Configuration**: validated option types for the engine
//!
//! # Examples
//!
//! ```rust
//! use bulkfs_types::{classify_os_code, ErrorAction, PathInfo, ProcessError};
//! use std::path::Path;
//!
//! let info = PathInfo::file("data/report.txt", 4096);
//! assert_eq!(info.size(), Some(4096));
//!
//! let err = classify_os_code(32, Path::new("data/report.txt"));
//! assert!(matches!(err, ProcessError::SharingViolation { .. }));
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use config::{CompressionLevel, CopyChunkSize, ProcessOptions};
pub use error::{classify_io_error, classify_os_code, ProcessError};
pub use result::Result;
pub use traits::{
    CancelToken, Cancellable, ErrorAction, FixedPolicy, FnPolicy, PathLoadedFn, ProgressFn,
    RecoveryPolicy,
};
pub use types::{FailedPath, PathInfo, ProcessId, ProcessProgress, ProcessStats, TraversalOrder};
