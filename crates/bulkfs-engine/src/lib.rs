//! Bulk file-operation engine for bulkfs
//!
//! This crate orchestrates batch copy, move, delete, recycle, and
//! compress operations over arbitrarily large path sets. One [`Process`]
//! owns one batch: it loads paths under the operation's traversal order,
//! runs a pre-flight check, then drains the work queue one item at a
//! time, consulting an injected [`RecoveryPolicy`] on every failure and
//! reporting floor-rounded, monotone progress after every item and every
//! streamed chunk.
//!
//! # Examples
//!
//! ```rust,no_run
//! use bulkfs_engine::Process;
//! use bulkfs_types::{ErrorAction, FixedPolicy, ProcessOptions, ProcessProgress};
//! use std::sync::Arc;
//!
//! # async fn example() -> bulkfs_types::Result<()> {
//! let mut process = Process::copy("/data/in", "/backup")
//!     .seed("/data/in/photos")
//!     .options(ProcessOptions {
//!         auto_rename: true,
//!         comparison_buffer: 64 * 1024,
//!         ..Default::default()
//!     })
//!     .policy(Arc::new(FixedPolicy(ErrorAction::Skip)))
//!     .on_progress(Arc::new(|p: &ProcessProgress| println!("{}%", p.percent)))
//!     .build();
//!
//! process.run().await?;
//! for failed in process.error_paths() {
//!     eprintln!("skipped {}: {}", failed.item.path().display(), failed.error);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! [`RecoveryPolicy`]: bulkfs_types::RecoveryPolicy

#![deny(missing_docs)]
#![warn(clippy::all)]

mod compress;
mod copy;
mod move_op;
mod process;
mod queue;
mod remove;
mod resolver;

pub use process::{CompletionFn, OperationKind, Process, ProcessBuilder, ProcessState};
pub use queue::{ErrorQueue, ProcessQueue};
pub use resolver::{DuplicateResolver, Resolution};
