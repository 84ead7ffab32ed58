//! Delete and recycle operations: bottom-up removal
//!
//! Both enumerate children before their parent, so "directory not
//! empty" cannot happen when the ordering is respected. File and
//! directory removal stay distinct primitives because the OS calls and
//! their error surfaces differ.

use bulkfs_types::{classify_io_error, PathInfo, ProcessError, Result, TraversalOrder};
use tracing::debug;

use crate::process::{ItemFailure, ItemOutcome, Operation, OperationKind, ProcessContext};

pub(crate) struct DeleteOp;

#[async_trait::async_trait]
impl Operation for DeleteOp {
    fn kind(&self) -> OperationKind {
        OperationKind::Delete
    }

    fn traversal_order(&self) -> Option<TraversalOrder> {
        Some(TraversalOrder::ChildrenThenParent)
    }

    async fn check(&mut self, _ctx: &ProcessContext) -> Result<()> {
        Ok(())
    }

    async fn process_item(
        &mut self,
        item: &mut PathInfo,
        ctx: &ProcessContext,
    ) -> std::result::Result<ItemOutcome, ItemFailure> {
        if item.is_dir() {
            tokio::fs::remove_dir(item.path())
                .await
                .map_err(|e| ItemFailure::local(classify_io_error(&e, item.path())))?;
            ctx.touch(item.path());
        } else {
            tokio::fs::remove_file(item.path())
                .await
                .map_err(|e| ItemFailure::local(classify_io_error(&e, item.path())))?;
            ctx.add_bytes(item.size_or_zero(), item.path());
        }
        debug!(path = %item.path().display(), "removed");
        Ok(ItemOutcome::Processed)
    }
}

pub(crate) struct RecycleOp;

#[async_trait::async_trait]
impl Operation for RecycleOp {
    fn kind(&self) -> OperationKind {
        OperationKind::Recycle
    }

    fn traversal_order(&self) -> Option<TraversalOrder> {
        Some(TraversalOrder::ChildrenThenParent)
    }

    async fn check(&mut self, _ctx: &ProcessContext) -> Result<()> {
        Ok(())
    }

    async fn process_item(
        &mut self,
        item: &mut PathInfo,
        ctx: &ProcessContext,
    ) -> std::result::Result<ItemOutcome, ItemFailure> {
        // Classify unreachable entries before handing off to the trash
        // backend, whose errors are opaque.
        if let Err(io) = tokio::fs::symlink_metadata(item.path()).await {
            return Err(ItemFailure::local(classify_io_error(&io, item.path())));
        }

        let path = item.path().to_path_buf();
        let outcome = tokio::task::spawn_blocking(move || trash::delete(&path)).await;
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                return Err(ItemFailure::local(ProcessError::Unknown {
                    message: format!("trash rejected {}: {error}", item.path().display()),
                    code: None,
                }))
            }
            Err(join) => {
                return Err(ItemFailure::local(ProcessError::unknown(format!(
                    "trash worker failed for {}: {join}",
                    item.path().display()
                ))))
            }
        }

        if item.is_dir() {
            ctx.touch(item.path());
        } else {
            ctx.add_bytes(item.size_or_zero(), item.path());
        }
        debug!(path = %item.path().display(), "recycled");
        Ok(ItemOutcome::Processed)
    }
}
