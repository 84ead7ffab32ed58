//! Compress operation: collect the seeds into one archive
//!
//! Unlike copy and delete, compression does not recurse at the item
//! level: seed files form one bulk unit appended entry by entry into a
//! single archive, while each seed directory is archived as one item of
//! its own. The archive writer's entry hooks are translated into the
//! engine's progress and cancellation contract.

use std::path::{Path, PathBuf};

use bulkfs_archive::{ArchiveHooks, ArchiveWriter};
use bulkfs_types::{classify_io_error, PathInfo, ProcessError, Result, TraversalOrder};
use tracing::debug;

use crate::copy::destination_directory;
use crate::process::{ItemFailure, ItemOutcome, Operation, OperationKind, ProcessContext};

pub(crate) struct CompressOp {
    archive_name: String,
    writer: Option<ArchiveWriter>,
}

impl CompressOp {
    pub fn new(archive_name: String) -> Self {
        Self {
            archive_name,
            writer: None,
        }
    }

    fn archive_path(&self, ctx: &ProcessContext) -> Option<PathBuf> {
        ctx.destination_root().map(|d| d.join(&self.archive_name))
    }
}

#[async_trait::async_trait]
impl Operation for CompressOp {
    fn kind(&self) -> OperationKind {
        OperationKind::Compress
    }

    fn traversal_order(&self) -> Option<TraversalOrder> {
        None
    }

    async fn check(&mut self, ctx: &ProcessContext) -> Result<()> {
        let dir = destination_directory(ctx).await?;
        let archive = dir.join(&self.archive_name);
        if tokio::fs::metadata(&archive).await.is_ok() {
            return Err(ProcessError::AlreadyExists { path: archive });
        }
        Ok(())
    }

    async fn process_item(
        &mut self,
        item: &mut PathInfo,
        ctx: &ProcessContext,
    ) -> std::result::Result<ItemOutcome, ItemFailure> {
        // A source that cannot be read is an item-local failure; the
        // archive stream stays consistent because nothing was appended.
        if let Err(io) = tokio::fs::symlink_metadata(item.path()).await {
            return Err(ItemFailure::local(classify_io_error(&io, item.path())));
        }

        if self.writer.is_none() {
            let Some(path) = self.archive_path(ctx) else {
                return Err(ItemFailure::global(ProcessError::DriveNotReady {
                    path: PathBuf::new(),
                }));
            };
            let writer = ArchiveWriter::create(&path, ctx.compression())
                .map_err(ItemFailure::global)?;
            self.writer = Some(writer);
        }
        let Some(writer) = self.writer.as_mut() else {
            return Err(ItemFailure::global(ProcessError::unknown(
                "archive writer unavailable",
            )));
        };

        let is_dir = item.is_dir();
        let hooks = ArchiveHooks {
            entry_started: Some(Box::new(move |p: &Path| ctx.touch(p))),
            // Seed-file bytes are part of the batch total; bytes inside
            // seed directories are not, so they only pulse the display.
            entry_progress: Some(Box::new(move |p: &Path, n: u64| {
                if is_dir {
                    ctx.touch(p);
                } else {
                    ctx.add_bytes(n, p);
                }
            })),
            entry_finished: Some(Box::new(move |p: &Path| ctx.touch(p))),
        };

        let appended = if is_dir {
            writer.append_dir_all(item.path(), &hooks, ctx.cancel())
        } else {
            writer.append_file(
                item.path(),
                Path::new(item.file_name()),
                &hooks,
                ctx.cancel(),
            )
        };
        match appended {
            Ok(bytes) => {
                debug!(path = %item.path().display(), bytes, "archived");
                Ok(ItemOutcome::Processed)
            }
            // Cancellation aborts the item; any other mid-entry failure
            // leaves the archive stream unusable and poisons the batch.
            Err(error) if error.is_aborted() => Err(ItemFailure::local(ProcessError::Aborted)),
            Err(error) => Err(ItemFailure::global(error)),
        }
    }

    async fn finish(&mut self, _ctx: &ProcessContext) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            writer.finish()?;
        }
        Ok(())
    }

    async fn on_abort(&mut self, ctx: &ProcessContext) {
        // An interrupted archive is incomplete; never leave it behind.
        // Only the writer this batch opened is removed: an archive that
        // failed the pre-flight because it already existed is not ours.
        if self.writer.take().is_some() {
            if let Some(path) = self.archive_path(ctx) {
                let _ = tokio::fs::remove_file(&path).await;
            }
        }
    }
}
