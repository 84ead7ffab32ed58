//! Move operation: rename when possible, copy-then-delete across volumes
//!
//! Seeds move as whole entries without recursion: a rename is one OS
//! call however deep the tree is. Only when the destination lives on a
//! different volume does the operation fall back to streaming the tree
//! over and removing the source afterwards.

use std::path::{Path, PathBuf};

use bulkfs_types::{
    classify_io_error, Cancellable, PathInfo, ProcessError, ProcessOptions, Result, TraversalOrder,
};
use bulkfs_walk::PathEnumerator;
use tracing::debug;

use crate::copy::{copy_times, destination_directory, stream_copy};
use crate::process::{ItemFailure, ItemOutcome, Operation, OperationKind, ProcessContext};
use crate::resolver::{next_free_path, DuplicateResolver, Resolution};

pub(crate) struct MoveOp {
    resolver: DuplicateResolver,
}

impl MoveOp {
    pub fn new(options: &ProcessOptions) -> Self {
        Self {
            resolver: DuplicateResolver::from_options(options),
        }
    }

    async fn resolve_collision(
        &self,
        item: &PathInfo,
        dest: PathBuf,
        ctx: &ProcessContext,
    ) -> std::result::Result<Option<PathBuf>, ItemFailure> {
        let meta = match tokio::fs::metadata(&dest).await {
            Ok(meta) => meta,
            Err(_) => return Ok(Some(dest)),
        };

        if meta.is_dir() != item.is_dir() {
            // A file cannot replace a directory or the reverse.
            return Err(ItemFailure::local(ProcessError::AlreadyExists { path: dest }));
        }
        if item.is_dir() {
            if !ctx.options().auto_rename {
                return Err(ItemFailure::local(ProcessError::AlreadyExists { path: dest }));
            }
            let renamed = next_free_path(&dest).map_err(ItemFailure::local)?;
            return Ok(Some(renamed));
        }
        match self.resolver.resolve(item.path(), &dest, ctx.cancel()).await {
            Ok(Resolution::SkipIdentical) => Ok(None),
            Ok(Resolution::Write(renamed)) => Ok(Some(renamed)),
            Err(error) => Err(ItemFailure::local(error)),
        }
    }

    async fn transfer_across_volumes(
        &self,
        item: &PathInfo,
        dest: &Path,
        ctx: &ProcessContext,
    ) -> std::result::Result<ItemOutcome, ItemFailure> {
        debug!(source = %item.path().display(), dest = %dest.display(), "cross-volume move");
        if !item.is_dir() {
            stream_copy(item.path(), dest, ctx, true).await?;
            copy_times(item.path(), dest);
            tokio::fs::remove_file(item.path())
                .await
                .map_err(|e| ItemFailure::local(classify_io_error(&e, item.path())))?;
            return Ok(ItemOutcome::Processed);
        }

        let walker = PathEnumerator::new(item.path(), TraversalOrder::DirectoriesThenFiles);
        for entry in walker.iter() {
            if ctx.cancel().is_cancelled() {
                return Err(ItemFailure::local(ProcessError::Aborted));
            }
            let info = entry.map_err(ItemFailure::local)?;
            let inside = info
                .path()
                .strip_prefix(item.path())
                .map(Path::to_path_buf)
                .unwrap_or_default();
            let target = dest.join(inside);
            if info.is_dir() {
                tokio::fs::create_dir_all(&target)
                    .await
                    .map_err(|e| ItemFailure::local(classify_io_error(&e, &target)))?;
            } else {
                stream_copy(info.path(), &target, ctx, false).await?;
                copy_times(info.path(), &target);
                ctx.touch(info.path());
            }
        }
        tokio::fs::remove_dir_all(item.path())
            .await
            .map_err(|e| ItemFailure::local(classify_io_error(&e, item.path())))?;
        Ok(ItemOutcome::Processed)
    }
}

#[async_trait::async_trait]
impl Operation for MoveOp {
    fn kind(&self) -> OperationKind {
        OperationKind::Move
    }

    fn traversal_order(&self) -> Option<TraversalOrder> {
        None
    }

    async fn check(&mut self, ctx: &ProcessContext) -> Result<()> {
        destination_directory(ctx).await.map(|_| ())
    }

    async fn process_item(
        &mut self,
        item: &mut PathInfo,
        ctx: &ProcessContext,
    ) -> std::result::Result<ItemOutcome, ItemFailure> {
        let Some(root) = ctx.destination_root() else {
            return Err(ItemFailure::global(ProcessError::DriveNotReady {
                path: PathBuf::new(),
            }));
        };
        let dest = root.join(item.file_name());

        if dest == item.path() {
            return Err(ItemFailure::local(ProcessError::unknown(format!(
                "source and destination are the same entry: {}",
                dest.display()
            ))));
        }
        if dest.starts_with(item.path()) {
            return Err(ItemFailure::local(ProcessError::unknown(format!(
                "cannot move {} into itself",
                item.path().display()
            ))));
        }

        let dest = match self.resolve_collision(item, dest, ctx).await? {
            Some(dest) => dest,
            None => {
                // Identical bytes already at the destination: drop the source.
                tokio::fs::remove_file(item.path())
                    .await
                    .map_err(|e| ItemFailure::local(classify_io_error(&e, item.path())))?;
                ctx.add_bytes(item.size_or_zero(), item.path());
                return Ok(ItemOutcome::SkippedIdentical);
            }
        };

        match tokio::fs::rename(item.path(), &dest).await {
            Ok(()) => {
                if item.is_dir() {
                    ctx.touch(item.path());
                } else {
                    ctx.add_bytes(item.size_or_zero(), item.path());
                }
                Ok(ItemOutcome::Processed)
            }
            Err(io) if crosses_volumes(&io) => self.transfer_across_volumes(item, &dest, ctx).await,
            Err(io) => Err(ItemFailure::local(classify_io_error(&io, item.path()))),
        }
    }
}

/// EXDEV on Unix, ERROR_NOT_SAME_DEVICE on Windows.
fn crosses_volumes(err: &std::io::Error) -> bool {
    matches!(err.raw_os_error(), Some(18) if cfg!(unix))
        || matches!(err.raw_os_error(), Some(17) if cfg!(windows))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cross_volume_detection_uses_the_platform_code() {
        #[cfg(unix)]
        {
            assert!(crosses_volumes(&std::io::Error::from_raw_os_error(18)));
            assert!(!crosses_volumes(&std::io::Error::from_raw_os_error(2)));
        }
        #[cfg(windows)]
        {
            assert!(crosses_volumes(&std::io::Error::from_raw_os_error(17)));
        }
    }
}
