//! Batch lifecycle: load, check, run, reset
//!
//! A [`Process`] owns one batch operation. Its lifecycle is
//! `Created → PathsLoading → PathsLoaded → Checking → Running` ending in
//! `Completed` or `Aborted`, with [`reset`](Process::reset) returning a
//! terminal instance to `Created` for reuse. The engine is a single
//! cooperative worker: nothing here locks, and cancellation is observed
//! only between items, between streamed chunks, and around retry
//! iterations.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use bulkfs_types::{
    CancelToken, Cancellable, CompressionLevel, CopyChunkSize, ErrorAction, FailedPath, FixedPolicy,
    PathInfo, PathLoadedFn, ProcessError, ProcessId, ProcessOptions, ProcessProgress, ProcessStats,
    ProgressFn, RecoveryPolicy, Result, TraversalOrder,
};
use bulkfs_walk::PathEnumerator;
use tracing::{debug, info, warn};

use crate::compress::CompressOp;
use crate::copy::CopyOp;
use crate::move_op::MoveOp;
use crate::queue::{ErrorQueue, ProcessQueue};
use crate::remove::{DeleteOp, RecycleOp};

/// Callback invoked once when the batch reaches a terminal state.
pub type CompletionFn = Box<dyn FnMut(&Result<()>) + Send>;

/// Lifecycle states of a [`Process`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Constructed; seeds may still be added
    Created,
    /// Seeds are being enumerated into the work queue
    PathsLoading,
    /// The work queue is populated
    PathsLoaded,
    /// Pre-flight validation ran
    Checking,
    /// The work queue is being drained
    Running,
    /// Every item reached a terminal outcome
    Completed,
    /// The batch stopped early
    Aborted,
}

impl ProcessState {
    /// Whether the batch reached a terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Aborted)
    }
}

/// The operation variant a [`Process`] executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    /// Copy the enumerated tree under the destination root
    Copy,
    /// Move the seed entries under the destination root
    Move,
    /// Remove the enumerated tree bottom-up
    Delete,
    /// Move the enumerated tree to the platform trash bottom-up
    Recycle,
    /// Collect the seed entries into one compressed archive
    Compress,
}

/// A failure produced while processing one item.
pub(crate) struct ItemFailure {
    pub error: ProcessError,
    /// A global failure poisons the whole remaining batch.
    pub global: bool,
}

impl ItemFailure {
    pub fn local(error: ProcessError) -> Self {
        Self {
            error,
            global: false,
        }
    }

    pub fn global(error: ProcessError) -> Self {
        Self {
            error,
            global: true,
        }
    }
}

/// Terminal outcome of one successfully handled item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ItemOutcome {
    /// The item's action ran
    Processed,
    /// An identical destination already existed; nothing was written
    SkippedIdentical,
}

/// Strategy object supplying the per-item action, the enumeration
/// order, and the pre-flight check for one operation variant.
#[async_trait::async_trait]
pub(crate) trait Operation: Send {
    /// The variant tag, for logging.
    fn kind(&self) -> OperationKind;

    /// The traversal order seeds are enumerated under, or `None` when
    /// seeds enter the queue without recursion.
    fn traversal_order(&self) -> Option<TraversalOrder>;

    /// Pre-flight validation; any error aborts before the first item.
    async fn check(&mut self, ctx: &ProcessContext) -> Result<()>;

    /// Execute the action for one item.
    async fn process_item(
        &mut self,
        item: &mut PathInfo,
        ctx: &ProcessContext,
    ) -> std::result::Result<ItemOutcome, ItemFailure>;

    /// Finalize after the queue drained; an error aborts the batch.
    async fn finish(&mut self, _ctx: &ProcessContext) -> Result<()> {
        Ok(())
    }

    /// Clean up operation-owned state after an abort.
    async fn on_abort(&mut self, _ctx: &ProcessContext) {}
}

/// Shared, read-mostly state the operation strategies work against.
pub(crate) struct ProcessContext {
    source_root: PathBuf,
    destination_root: Option<PathBuf>,
    options: ProcessOptions,
    chunk_size: CopyChunkSize,
    compression: CompressionLevel,
    cancel: CancelToken,
    progress: ProgressState,
}

impl ProcessContext {
    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    pub fn destination_root(&self) -> Option<&Path> {
        self.destination_root.as_deref()
    }

    pub fn options(&self) -> &ProcessOptions {
        &self.options
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size.get()
    }

    pub fn compression(&self) -> CompressionLevel {
        self.compression
    }

    pub fn cancel(&self) -> &CancelToken {
        &self.cancel
    }

    /// Cheap, side-effect-free cancellation poll.
    pub fn is_cancellation_requested(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Total bytes the loaded batch holds.
    pub fn total_bytes(&self) -> u64 {
        self.progress.total_bytes.load(Ordering::Relaxed)
    }

    /// Account `delta` processed bytes and emit progress.
    pub fn add_bytes(&self, delta: u64, current: &Path) {
        self.progress.bytes_done.fetch_add(delta, Ordering::Relaxed);
        self.progress.emit(Some(current));
    }

    /// Re-emit the current progress with `current` as the active path,
    /// without moving any counter.
    pub fn touch(&self, current: &Path) {
        self.progress.emit(Some(current));
    }

    fn complete_item(&self, current: &Path) {
        self.progress.items_done.fetch_add(1, Ordering::Relaxed);
        self.progress.emit(Some(current));
    }

    fn set_totals(&self, bytes: u64, items: u64) {
        self.progress.total_bytes.store(bytes, Ordering::Relaxed);
        self.progress.total_items.store(items, Ordering::Relaxed);
    }

    fn bytes_done(&self) -> u64 {
        self.progress.bytes_done.load(Ordering::Relaxed)
    }

    fn reset(&self) {
        self.cancel.reset();
        self.progress.reset();
    }
}

/// Progress accounting behind a single-slot, latest-wins callback.
struct ProgressState {
    total_bytes: AtomicU64,
    total_items: AtomicU64,
    bytes_done: AtomicU64,
    items_done: AtomicU64,
    last_percent: AtomicU8,
    sink: Option<ProgressFn>,
}

impl ProgressState {
    fn new(sink: Option<ProgressFn>) -> Self {
        Self {
            total_bytes: AtomicU64::new(0),
            total_items: AtomicU64::new(0),
            bytes_done: AtomicU64::new(0),
            items_done: AtomicU64::new(0),
            last_percent: AtomicU8::new(0),
            sink,
        }
    }

    fn emit(&self, current: Option<&Path>) {
        let total_bytes = self.total_bytes.load(Ordering::Relaxed);
        let total_items = self.total_items.load(Ordering::Relaxed);
        let bytes_processed = self.bytes_done.load(Ordering::Relaxed);
        let items_processed = self.items_done.load(Ordering::Relaxed);

        // Floor-rounded; bytes drive the percentage whenever the batch
        // carries any, item counts otherwise.
        let raw = if total_bytes > 0 {
            bytes_processed.saturating_mul(100) / total_bytes
        } else if total_items > 0 {
            items_processed.saturating_mul(100) / total_items
        } else {
            0
        };
        let capped = raw.min(100) as u8;
        let prev = self.last_percent.fetch_max(capped, Ordering::Relaxed);
        let percent = prev.max(capped);

        if let Some(sink) = &self.sink {
            sink(&ProcessProgress {
                percent,
                bytes_processed,
                total_bytes,
                items_processed,
                total_items,
                current: current.map(Path::to_path_buf),
            });
        }
    }

    fn force_complete(&self) {
        self.last_percent.store(100, Ordering::Relaxed);
        self.emit(None);
    }

    fn reset(&self) {
        self.total_bytes.store(0, Ordering::Relaxed);
        self.total_items.store(0, Ordering::Relaxed);
        self.bytes_done.store(0, Ordering::Relaxed);
        self.items_done.store(0, Ordering::Relaxed);
        self.last_percent.store(0, Ordering::Relaxed);
    }
}

/// One batch file operation: a reusable unit of work over a seed list.
pub struct Process {
    id: ProcessId,
    op: Box<dyn Operation>,
    state: ProcessState,
    seeds: Vec<PathBuf>,
    paths: ProcessQueue,
    error_paths: ErrorQueue,
    policy: Arc<dyn RecoveryPolicy>,
    on_path_loaded: Option<PathLoadedFn>,
    on_completed: Option<CompletionFn>,
    ctx: ProcessContext,
    stats: ProcessStats,
}

impl Process {
    /// Start building a copy batch from `source_root` into the
    /// directory `destination_root`.
    pub fn copy<S: Into<PathBuf>, D: Into<PathBuf>>(source_root: S, destination_root: D) -> ProcessBuilder {
        ProcessBuilder::new(OperationKind::Copy, source_root.into(), Some(destination_root.into()))
    }

    /// Start building a move batch from `source_root` into the
    /// directory `destination_root`.
    pub fn move_to<S: Into<PathBuf>, D: Into<PathBuf>>(source_root: S, destination_root: D) -> ProcessBuilder {
        ProcessBuilder::new(OperationKind::Move, source_root.into(), Some(destination_root.into()))
    }

    /// Start building a delete batch under `source_root`.
    pub fn delete<S: Into<PathBuf>>(source_root: S) -> ProcessBuilder {
        ProcessBuilder::new(OperationKind::Delete, source_root.into(), None)
    }

    /// Start building a recycle batch under `source_root`.
    pub fn recycle<S: Into<PathBuf>>(source_root: S) -> ProcessBuilder {
        ProcessBuilder::new(OperationKind::Recycle, source_root.into(), None)
    }

    /// Start building a compression batch that archives the seeds into
    /// `destination_dir/archive_name`.
    pub fn compress<S, D, N>(source_root: S, destination_dir: D, archive_name: N) -> ProcessBuilder
    where
        S: Into<PathBuf>,
        D: Into<PathBuf>,
        N: Into<String>,
    {
        let mut builder =
            ProcessBuilder::new(OperationKind::Compress, source_root.into(), Some(destination_dir.into()));
        builder.archive_name = Some(archive_name.into());
        builder
    }

    /// The batch identifier used in log correlation.
    pub fn id(&self) -> ProcessId {
        self.id
    }

    /// The operation variant this batch executes.
    pub fn kind(&self) -> OperationKind {
        self.op.kind()
    }

    /// The current lifecycle state.
    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// The source root this batch operates under.
    pub fn source_root(&self) -> &Path {
        self.ctx.source_root()
    }

    /// The destination root, for the variants that have one.
    pub fn destination_root(&self) -> Option<&Path> {
        self.ctx.destination_root()
    }

    /// Aggregate statistics so far.
    pub fn stats(&self) -> ProcessStats {
        let mut stats = self.stats.clone();
        stats.bytes_processed = self.ctx.bytes_done();
        stats
    }

    /// Every item that was skipped after a failure, with its
    /// classification, in the order the failures happened.
    pub fn error_paths(&self) -> &[FailedPath] {
        self.error_paths.as_slice()
    }

    /// The work queue (read-only).
    pub fn queue(&self) -> &ProcessQueue {
        &self.paths
    }

    /// A clone of the cancel token; cancelling it stops the batch at
    /// the next suspension point.
    pub fn cancel_token(&self) -> CancelToken {
        self.ctx.cancel.clone()
    }

    /// Add a seed path. Only allowed before loading starts.
    pub fn push_seed<P: Into<PathBuf>>(&mut self, seed: P) -> Result<()> {
        if self.state != ProcessState::Created {
            return Err(ProcessError::invalid_transition("push_seed", self.state));
        }
        self.seeds.push(seed.into());
        Ok(())
    }

    /// Drain the seed list into the work queue under the operation's
    /// traversal order.
    pub async fn load_paths(&mut self) -> Result<()> {
        if self.state != ProcessState::Created {
            return Err(ProcessError::invalid_transition("load_paths", self.state));
        }
        self.state = ProcessState::PathsLoading;
        info!(id = %self.id, kind = ?self.op.kind(), seeds = self.seeds.len(), "loading paths");

        let seeds = self.seeds.clone();
        for seed in seeds {
            match self.op.traversal_order() {
                Some(order) => self.load_tree(&seed, order).await?,
                None => self.load_seed(&seed).await?,
            }
        }

        self.ctx
            .set_totals(self.paths.total_size(), self.paths.len() as u64);
        self.state = ProcessState::PathsLoaded;
        info!(
            id = %self.id,
            items = self.paths.len(),
            bytes = self.paths.total_size(),
            "paths loaded"
        );
        Ok(())
    }

    async fn load_tree(&mut self, seed: &Path, order: TraversalOrder) -> Result<()> {
        let walker = PathEnumerator::new(seed, order);
        let base = seed.parent().map(Path::to_path_buf).unwrap_or_default();
        for entry in walker.iter() {
            if self.ctx.is_cancellation_requested() {
                return self.fail_loading(ProcessError::Aborted);
            }
            let info = match entry {
                Ok(info) => Some(info),
                Err(error) => self.recover_load_error(error, &base).await?,
            };
            if let Some(info) = info {
                if !self.notify_loaded(&info) {
                    return self.fail_loading(ProcessError::Aborted);
                }
                self.paths.push_back(info);
            }
        }
        Ok(())
    }

    async fn load_seed(&mut self, seed: &Path) -> Result<()> {
        if self.ctx.is_cancellation_requested() {
            return self.fail_loading(ProcessError::Aborted);
        }
        let info = match std::fs::metadata(seed) {
            Ok(meta) => Some(PathInfo::from_metadata(seed, &meta)),
            Err(io) => {
                let error = bulkfs_types::classify_io_error(&io, seed);
                self.recover_load_error(error, Path::new("")).await?
            }
        };
        if let Some(info) = info {
            if !self.notify_loaded(&info) {
                return self.fail_loading(ProcessError::Aborted);
            }
            self.paths.push_back(info);
        }
        Ok(())
    }

    /// Drive the policy until an enumeration failure resolves: `Retry`
    /// re-stats the path, `Skip` records it, `Abort` ends loading.
    async fn recover_load_error(
        &mut self,
        mut error: ProcessError,
        base: &Path,
    ) -> Result<Option<PathInfo>> {
        loop {
            if self.ctx.is_cancellation_requested() {
                return self.fail_loading(ProcessError::Aborted).map(|_| None);
            }
            warn!(id = %self.id, %error, "enumeration failure");
            match self.policy.decide(&error).await {
                ErrorAction::Retry => {
                    let Some(path) = error.path().map(Path::to_path_buf) else {
                        continue;
                    };
                    match std::fs::metadata(&path) {
                        Ok(meta) => {
                            let relative_dir = path
                                .parent()
                                .and_then(|p| p.strip_prefix(base).ok())
                                .map(Path::to_path_buf)
                                .unwrap_or_default();
                            return Ok(Some(
                                PathInfo::from_metadata(&path, &meta).with_relative_dir(relative_dir),
                            ));
                        }
                        Err(io) => error = bulkfs_types::classify_io_error(&io, &path),
                    }
                }
                ErrorAction::Skip => {
                    let item = error
                        .path()
                        .map(PathInfo::unverified)
                        .unwrap_or_else(|| PathInfo::unverified(self.ctx.source_root()));
                    self.error_paths.push(FailedPath { item, error });
                    self.stats.errors += 1;
                    return Ok(None);
                }
                ErrorAction::Abort => return self.fail_loading(error).map(|_| None),
            }
        }
    }

    fn notify_loaded(&mut self, info: &PathInfo) -> bool {
        match self.on_path_loaded.as_mut() {
            Some(callback) => callback(info),
            None => true,
        }
    }

    /// Run the operation's pre-flight validation. A failure aborts the
    /// batch without touching any path.
    pub async fn check(&mut self) -> Result<()> {
        if self.state != ProcessState::PathsLoaded {
            return Err(ProcessError::invalid_transition("check", self.state));
        }
        self.state = ProcessState::Checking;
        debug!(id = %self.id, "pre-flight check");
        match self.op.check(&self.ctx).await {
            Ok(()) => Ok(()),
            Err(error) => self.fail(error).await,
        }
    }

    /// Drain the work queue until it is empty, cancellation wins, or a
    /// failure escalates.
    pub async fn start(&mut self) -> Result<()> {
        if self.state == ProcessState::PathsLoaded {
            self.check().await?;
        }
        if self.state != ProcessState::Checking {
            return Err(ProcessError::invalid_transition("start", self.state));
        }
        self.state = ProcessState::Running;
        info!(id = %self.id, items = self.paths.len(), "processing started");

        while self.paths.has_items() {
            if self.ctx.is_cancellation_requested() {
                return self.fail(ProcessError::Aborted).await;
            }
            let Some(mut item) = self.paths.pop_front() else {
                break;
            };
            self.process_one(&mut item).await?;
            self.ctx.complete_item(item.path());
        }

        if let Err(error) = self.op.finish(&self.ctx).await {
            return self.fail(error).await;
        }

        self.state = ProcessState::Completed;
        self.ctx.progress.force_complete();
        info!(id = %self.id, errors = self.error_paths.len(), "processing completed");
        if let Some(callback) = self.on_completed.as_mut() {
            callback(&Ok(()));
        }
        Ok(())
    }

    /// Convenience: `load_paths`, `check`, `start` in sequence.
    pub async fn run(&mut self) -> Result<()> {
        self.load_paths().await?;
        self.check().await?;
        self.start().await
    }

    async fn process_one(&mut self, item: &mut PathInfo) -> Result<()> {
        loop {
            match self.op.process_item(item, &self.ctx).await {
                Ok(ItemOutcome::Processed) => {
                    if item.is_dir() {
                        self.stats.directories_processed += 1;
                    } else {
                        self.stats.files_processed += 1;
                    }
                    return Ok(());
                }
                Ok(ItemOutcome::SkippedIdentical) => {
                    self.stats.files_skipped += 1;
                    return Ok(());
                }
                Err(failure) if failure.error.is_aborted() => {
                    self.error_paths.push(FailedPath {
                        item: item.clone(),
                        error: ProcessError::Aborted,
                    });
                    self.stats.errors += 1;
                    return self.fail(ProcessError::Aborted).await;
                }
                Err(failure) if failure.global => {
                    return self.fail(failure.error).await;
                }
                Err(failure) => {
                    warn!(id = %self.id, path = %item.path().display(), error = %failure.error, "item failed");
                    match self.policy.decide(&failure.error).await {
                        ErrorAction::Retry => {
                            if self.ctx.is_cancellation_requested() {
                                return self.fail(ProcessError::Aborted).await;
                            }
                        }
                        ErrorAction::Skip => {
                            self.error_paths.push(FailedPath {
                                item: item.clone(),
                                error: failure.error,
                            });
                            self.stats.errors += 1;
                            return Ok(());
                        }
                        ErrorAction::Abort => return self.fail(failure.error).await,
                    }
                }
            }
        }
    }

    async fn fail(&mut self, error: ProcessError) -> Result<()> {
        warn!(id = %self.id, %error, "batch aborted");
        self.state = ProcessState::Aborted;
        self.op.on_abort(&self.ctx).await;
        let result = Err(error);
        if let Some(callback) = self.on_completed.as_mut() {
            callback(&result);
        }
        result
    }

    fn fail_loading(&mut self, error: ProcessError) -> Result<()> {
        if self.ctx.options().clear_on_error {
            self.paths.clear();
        }
        warn!(id = %self.id, %error, "loading aborted");
        self.state = ProcessState::Aborted;
        let result = Err(error);
        if let Some(callback) = self.on_completed.as_mut() {
            callback(&result);
        }
        result
    }

    /// Return a terminal or mis-loaded batch to `Created`, clearing the
    /// queues, counters, and the cancellation flag but keeping the
    /// configuration. A fresh seed list is expected afterwards.
    pub fn reset(&mut self) {
        self.seeds.clear();
        self.paths.clear();
        self.error_paths.clear();
        self.stats = ProcessStats::new();
        self.ctx.reset();
        self.state = ProcessState::Created;
        debug!(id = %self.id, "reset");
    }
}

impl std::fmt::Debug for Process {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Process")
            .field("id", &self.id)
            .field("kind", &self.op.kind())
            .field("state", &self.state)
            .field("queued", &self.paths.len())
            .field("errors", &self.error_paths.len())
            .finish()
    }
}

/// Builder for a [`Process`].
pub struct ProcessBuilder {
    kind: OperationKind,
    source_root: PathBuf,
    destination_root: Option<PathBuf>,
    archive_name: Option<String>,
    seeds: Vec<PathBuf>,
    options: ProcessOptions,
    chunk_size: CopyChunkSize,
    compression: CompressionLevel,
    policy: Arc<dyn RecoveryPolicy>,
    cancel: CancelToken,
    on_progress: Option<ProgressFn>,
    on_path_loaded: Option<PathLoadedFn>,
    on_completed: Option<CompletionFn>,
}

impl ProcessBuilder {
    fn new(kind: OperationKind, source_root: PathBuf, destination_root: Option<PathBuf>) -> Self {
        Self {
            kind,
            source_root,
            destination_root,
            archive_name: None,
            seeds: Vec::new(),
            options: ProcessOptions::default(),
            chunk_size: CopyChunkSize::default(),
            compression: CompressionLevel::default(),
            policy: Arc::new(FixedPolicy(ErrorAction::Abort)),
            cancel: CancelToken::new(),
            on_progress: None,
            on_path_loaded: None,
            on_completed: None,
        }
    }

    /// Add one seed path.
    pub fn seed<P: Into<PathBuf>>(mut self, seed: P) -> Self {
        self.seeds.push(seed.into());
        self
    }

    /// Add several seed paths.
    pub fn seeds<I, P>(mut self, seeds: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.seeds.extend(seeds.into_iter().map(Into::into));
        self
    }

    /// Set the batch options.
    pub fn options(mut self, options: ProcessOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the streaming-copy chunk size.
    pub fn chunk_size(mut self, chunk_size: CopyChunkSize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Set the archive compression level.
    pub fn compression_level(mut self, level: CompressionLevel) -> Self {
        self.compression = level;
        self
    }

    /// Set the retry/skip/abort policy. Defaults to always aborting.
    pub fn policy(mut self, policy: Arc<dyn RecoveryPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Share an externally owned cancel token.
    pub fn cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Set the progress callback.
    pub fn on_progress(mut self, on_progress: ProgressFn) -> Self {
        self.on_progress = Some(on_progress);
        self
    }

    /// Observe every loaded path; returning `false` cancels loading.
    pub fn on_path_loaded(mut self, on_path_loaded: PathLoadedFn) -> Self {
        self.on_path_loaded = Some(on_path_loaded);
        self
    }

    /// Observe the terminal result.
    pub fn on_completed(mut self, on_completed: CompletionFn) -> Self {
        self.on_completed = Some(on_completed);
        self
    }

    /// Build the process. An empty seed list defaults to the source
    /// root itself.
    pub fn build(mut self) -> Process {
        if self.seeds.is_empty() {
            self.seeds.push(self.source_root.clone());
        }

        let op: Box<dyn Operation> = match self.kind {
            OperationKind::Copy => Box::new(CopyOp::new(&self.options)),
            OperationKind::Move => Box::new(MoveOp::new(&self.options)),
            OperationKind::Delete => Box::new(DeleteOp),
            OperationKind::Recycle => Box::new(RecycleOp),
            OperationKind::Compress => Box::new(CompressOp::new(
                self.archive_name.unwrap_or_else(|| String::from("archive.tar.zst")),
            )),
        };

        Process {
            id: uuid::Uuid::new_v4(),
            op,
            state: ProcessState::Created,
            seeds: self.seeds,
            paths: ProcessQueue::new(),
            error_paths: ErrorQueue::new(),
            policy: self.policy,
            on_path_loaded: self.on_path_loaded,
            on_completed: self.on_completed,
            ctx: ProcessContext {
                source_root: self.source_root,
                destination_root: self.destination_root,
                options: self.options,
                chunk_size: self.chunk_size,
                compression: self.compression,
                cancel: self.cancel,
                progress: ProgressState::new(self.on_progress),
            },
            stats: ProcessStats::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lifecycle_rejects_out_of_order_calls() {
        let mut process = Process::delete("/tmp/none").build();
        assert_eq!(process.state(), ProcessState::Created);

        // check and start before loading are refused
        assert!(matches!(
            process.check().await.unwrap_err(),
            ProcessError::InvalidTransition { .. }
        ));
        assert!(matches!(
            process.start().await.unwrap_err(),
            ProcessError::InvalidTransition { .. }
        ));
    }

    #[tokio::test]
    async fn seeds_are_rejected_after_loading() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut process = Process::delete(tmp.path()).seed(tmp.path()).build();
        process.load_paths().await.unwrap();
        assert_eq!(process.state(), ProcessState::PathsLoaded);
        assert!(matches!(
            process.push_seed("/late").unwrap_err(),
            ProcessError::InvalidTransition { .. }
        ));
    }

    #[tokio::test]
    async fn reset_returns_to_created_and_clears_state() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(tmp.path().join("f"), b"abc").unwrap();

        let mut process = Process::delete(tmp.path()).seed(tmp.path()).build();
        process.cancel_token().cancel();
        assert!(process.load_paths().await.unwrap_err().is_aborted());
        assert_eq!(process.state(), ProcessState::Aborted);

        process.reset();
        assert_eq!(process.state(), ProcessState::Created);
        assert!(process.queue().is_empty());
        assert!(process.error_paths().is_empty());
        assert!(!process.cancel_token().is_cancelled());
        process.push_seed(tmp.path()).unwrap();
    }

    #[tokio::test]
    async fn loading_honors_the_path_loaded_veto() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(tmp.path().join("f"), b"abc").unwrap();

        let mut process = Process::delete(tmp.path())
            .seed(tmp.path())
            .on_path_loaded(Box::new(|_| false))
            .build();
        let err = process.load_paths().await.unwrap_err();
        assert!(err.is_aborted());
        assert_eq!(process.state(), ProcessState::Aborted);
        // clear_on_error defaults to true: nothing remains queued
        assert!(process.queue().is_empty());
    }
}
