//! Copy operation: rebuild the enumerated tree under a destination root
//!
//! Directories enumerate before their contents, so every destination
//! directory exists by the time the files inside it stream over. A
//! collision on a file destination goes through the
//! [`DuplicateResolver`](crate::resolver::DuplicateResolver); a collision
//! between a source directory and a destination file renames the
//! directory and drags every descendant along via relative-directory
//! rewriting.

use std::path::{Path, PathBuf};

use bulkfs_types::{classify_io_error, PathInfo, ProcessError, ProcessOptions, Result, TraversalOrder};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::debug;

use crate::process::{ItemFailure, ItemOutcome, Operation, OperationKind, ProcessContext};
use crate::resolver::{next_free_path, DuplicateResolver, Resolution};

pub(crate) struct CopyOp {
    resolver: DuplicateResolver,
    /// Relative-directory prefixes renamed at the destination, in the
    /// order the renames happened; descendants fold through all of them.
    rewrites: Vec<(PathBuf, PathBuf)>,
}

impl CopyOp {
    pub fn new(options: &ProcessOptions) -> Self {
        Self {
            resolver: DuplicateResolver::from_options(options),
            rewrites: Vec::new(),
        }
    }

    fn apply_rewrites(&self, item: &mut PathInfo) {
        let Some(rel) = item.relative_dir().map(Path::to_path_buf) else {
            return;
        };
        let mut current = rel.clone();
        for (old, new) in &self.rewrites {
            if let Ok(tail) = current.strip_prefix(old) {
                current = new.join(tail);
            }
        }
        if current != rel {
            item.rewrite_relative_dir(current);
        }
    }

    fn destination_for(item: &PathInfo, root: &Path) -> PathBuf {
        match item.relative_dir() {
            Some(rel) => root.join(rel).join(item.file_name()),
            None => root.join(item.file_name()),
        }
    }

    async fn copy_directory(
        &mut self,
        item: &PathInfo,
        dest: PathBuf,
        ctx: &ProcessContext,
    ) -> std::result::Result<ItemOutcome, ItemFailure> {
        let dest = match tokio::fs::metadata(&dest).await {
            // An existing destination directory merges.
            Ok(meta) if meta.is_dir() => return Ok(ItemOutcome::Processed),
            Ok(_) => {
                if !ctx.options().auto_rename {
                    return Err(ItemFailure::local(ProcessError::AlreadyExists { path: dest }));
                }
                let renamed = next_free_path(&dest).map_err(ItemFailure::local)?;
                let old_prefix = item
                    .relative_dir()
                    .map(|rel| rel.join(item.file_name()))
                    .unwrap_or_else(|| PathBuf::from(item.file_name()));
                let new_prefix = match old_prefix.parent() {
                    Some(parent) => parent.join(renamed.file_name().unwrap_or_default()),
                    None => PathBuf::from(renamed.file_name().unwrap_or_default()),
                };
                debug!(old = %old_prefix.display(), new = %new_prefix.display(), "directory renamed at destination");
                self.rewrites.push((old_prefix, new_prefix));
                renamed
            }
            Err(_) => dest,
        };
        tokio::fs::create_dir_all(&dest)
            .await
            .map_err(|e| ItemFailure::local(classify_io_error(&e, &dest)))?;
        Ok(ItemOutcome::Processed)
    }

    async fn copy_file(
        &mut self,
        item: &PathInfo,
        mut dest: PathBuf,
        ctx: &ProcessContext,
    ) -> std::result::Result<ItemOutcome, ItemFailure> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ItemFailure::local(classify_io_error(&e, parent)))?;
        }

        match tokio::fs::metadata(&dest).await {
            Ok(meta) if meta.is_dir() => {
                return Err(ItemFailure::local(ProcessError::AlreadyExists { path: dest }));
            }
            Ok(_) => match self.resolver.resolve(item.path(), &dest, ctx.cancel()).await {
                Ok(Resolution::SkipIdentical) => {
                    ctx.add_bytes(item.size_or_zero(), item.path());
                    return Ok(ItemOutcome::SkippedIdentical);
                }
                Ok(Resolution::Write(renamed)) => dest = renamed,
                Err(error) => return Err(ItemFailure::local(error)),
            },
            Err(_) => {}
        }

        stream_copy(item.path(), &dest, ctx, true).await?;
        copy_times(item.path(), &dest);
        Ok(ItemOutcome::Processed)
    }
}

#[async_trait::async_trait]
impl Operation for CopyOp {
    fn kind(&self) -> OperationKind {
        OperationKind::Copy
    }

    fn traversal_order(&self) -> Option<TraversalOrder> {
        Some(TraversalOrder::DirectoriesThenFiles)
    }

    async fn check(&mut self, ctx: &ProcessContext) -> Result<()> {
        let dest = destination_directory(ctx).await?;
        let available =
            fs2::available_space(&dest).map_err(|_| ProcessError::DriveNotReady { path: dest })?;
        let required = ctx.total_bytes();
        if available < required {
            return Err(ProcessError::NotEnoughSpace {
                required,
                available,
            });
        }
        Ok(())
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
        let root = root.to_path_buf();
        self.apply_rewrites(item);
        let dest = Self::destination_for(item, &root);

        if item.is_dir() {
            self.copy_directory(item, dest, ctx).await
        } else {
            self.copy_file(item, dest, ctx).await
        }
    }
}

/// Validate the destination root exists and is a directory.
pub(crate) async fn destination_directory(ctx: &ProcessContext) -> Result<PathBuf> {
    let Some(dest) = ctx.destination_root() else {
        return Err(ProcessError::DriveNotReady {
            path: PathBuf::new(),
        });
    };
    match tokio::fs::metadata(dest).await {
        Ok(meta) if meta.is_dir() => Ok(dest.to_path_buf()),
        _ => Err(ProcessError::DriveNotReady {
            path: dest.to_path_buf(),
        }),
    }
}

/// Stream one file chunk by chunk, polling cancellation after every
/// chunk. A cancelled or failed copy removes the partial destination, so
/// an interrupted run never leaves a half-written file that could later
/// pass for a duplicate.
pub(crate) async fn stream_copy(
    source: &Path,
    dest: &Path,
    ctx: &ProcessContext,
    count_bytes: bool,
) -> std::result::Result<u64, ItemFailure> {
    let mut reader = tokio::fs::File::open(source)
        .await
        .map_err(|e| ItemFailure::local(classify_io_error(&e, source)))?;
    let mut writer = tokio::fs::File::create(dest)
        .await
        .map_err(|e| ItemFailure::local(classify_io_error(&e, dest)))?;

    let mut buf = vec![0u8; ctx.chunk_size()];
    let mut copied = 0u64;
    loop {
        if ctx.is_cancellation_requested() {
            drop(writer);
            let _ = tokio::fs::remove_file(dest).await;
            return Err(ItemFailure::local(ProcessError::Aborted));
        }
        let n = match reader.read(&mut buf).await {
            Ok(n) => n,
            Err(io) => {
                let error = classify_io_error(&io, source);
                drop(writer);
                let _ = tokio::fs::remove_file(dest).await;
                return Err(ItemFailure::local(error));
            }
        };
        if n == 0 {
            break;
        }
        if let Err(io) = writer.write_all(&buf[..n]).await {
            let error = classify_io_error(&io, dest);
            drop(writer);
            let _ = tokio::fs::remove_file(dest).await;
            let global = matches!(error, ProcessError::NotEnoughSpace { .. });
            return Err(ItemFailure { error, global });
        }
        copied += n as u64;
        if count_bytes {
            ctx.add_bytes(n as u64, source);
        }
    }
    writer
        .flush()
        .await
        .map_err(|e| ItemFailure::local(classify_io_error(&e, dest)))?;
    Ok(copied)
}

/// Carry the source timestamps over, best-effort.
pub(crate) fn copy_times(source: &Path, dest: &Path) {
    if let Ok(meta) = std::fs::metadata(source) {
        let mtime = filetime::FileTime::from_last_modification_time(&meta);
        let atime = filetime::FileTime::from_last_access_time(&meta);
        if let Err(error) = filetime::set_file_times(dest, atime, mtime) {
            debug!(dest = %dest.display(), %error, "could not carry timestamps");
        }
    }
}
