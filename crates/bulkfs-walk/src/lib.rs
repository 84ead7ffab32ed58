//! Ordered, restartable path enumeration for bulkfs
//!
//! This crate produces the lazy sequence of [`PathInfo`] a batch
//! operation works through. The sequence is depth-first under one of
//! three sibling orderings, stays lazy so very large trees never have to
//! be materialized by the walker itself, and is restartable: enumerating
//! the same root twice yields the same sequence.
//!
//! # Examples
//!
//! ```rust,no_run
//! use bulkfs_types::TraversalOrder;
//! use bulkfs_walk::PathEnumerator;
//!
//! let walker = PathEnumerator::new("/data/photos", TraversalOrder::ChildrenThenParent);
//! for entry in walker.iter() {
//!     match entry {
//!         Ok(info) => println!("{} ({} bytes)", info.path().display(), info.size_or_zero()),
//!         Err(err) => eprintln!("unreadable subtree: {err}"),
//!     }
//! }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

mod enumerate;

pub use enumerate::{PathEnumerator, Walk};
