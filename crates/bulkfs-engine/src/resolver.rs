//! Destination collision resolution for copy operations
//!
//! Decides what to do when a copy lands on an occupied destination path:
//! report the collision, rename around it with a numbered sibling, or —
//! when byte comparison is configured and the occupant already holds the
//! same bytes — skip the copy as a success. Nothing here ever deletes
//! the source or the occupant.

use std::path::{Path, PathBuf};

use bulkfs_types::{
    classify_io_error, CancelToken, Cancellable, ProcessError, ProcessOptions, Result,
};
use tokio::io::AsyncReadExt;
use tracing::debug;

/// How many occupied-but-different renamed siblings are examined before
/// the collision escalates to `RenamingFailed`.
const DUPLICATE_TRIALS: usize = 3;

/// Upper bound on the numbered-sibling walk when comparison is disabled.
const RENAME_LIMIT: u32 = 10_000;

/// Outcome of a collision resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Copy to this destination; it may be a renamed sibling of the
    /// requested path.
    Write(PathBuf),
    /// An existing destination already holds identical bytes; treat the
    /// item as successfully copied without writing.
    SkipIdentical,
}

/// Collision resolver configured from the batch options.
#[derive(Debug, Clone)]
pub struct DuplicateResolver {
    auto_rename: bool,
    comparison_buffer: usize,
}

impl DuplicateResolver {
    /// Create a resolver.
    pub fn new(auto_rename: bool, comparison_buffer: usize) -> Self {
        Self {
            auto_rename,
            comparison_buffer,
        }
    }

    /// Create a resolver from the batch options.
    pub fn from_options(options: &ProcessOptions) -> Self {
        Self::new(options.auto_rename, options.comparison_buffer)
    }

    /// Resolve a collision between `source` and the occupied `dest`.
    ///
    /// With auto-rename disabled the collision is reported immediately.
    /// With auto-rename on and no comparison buffer the item is renamed
    /// unconditionally. With a comparison buffer the occupant and up to
    /// two renamed siblings are compared byte-for-byte; an identical one
    /// resolves to [`Resolution::SkipIdentical`], and a third occupied,
    /// different candidate escalates to `RenamingFailed`.
    pub async fn resolve(
        &self,
        source: &Path,
        dest: &Path,
        cancel: &CancelToken,
    ) -> Result<Resolution> {
        if !self.auto_rename {
            return Err(ProcessError::AlreadyExists {
                path: dest.to_path_buf(),
            });
        }

        if self.comparison_buffer == 0 {
            let renamed = next_free_path(dest)?;
            debug!(dest = %dest.display(), renamed = %renamed.display(), "renaming without comparison");
            return Ok(Resolution::Write(renamed));
        }

        let mut candidate = dest.to_path_buf();
        for trial in 0..DUPLICATE_TRIALS {
            if !candidate.exists() {
                return Ok(Resolution::Write(candidate));
            }
            if files_identical(source, &candidate, self.comparison_buffer, cancel).await? {
                debug!(source = %source.display(), occupant = %candidate.display(), "identical content, skipping copy");
                return Ok(Resolution::SkipIdentical);
            }
            candidate = numbered_sibling(dest, trial as u32 + 1);
        }

        Err(ProcessError::RenamingFailed {
            path: dest.to_path_buf(),
        })
    }
}

/// Derive the n-th numbered sibling of `path`: `file.txt` becomes
/// `file (1).txt`, `file (2).txt`, and so on.
fn numbered_sibling(path: &Path, n: u32) -> PathBuf {
    let parent = path.parent().unwrap_or(Path::new(""));
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{} ({}).{}", stem, n, ext.to_string_lossy()),
        None => format!("{} ({})", stem, n),
    };
    parent.join(name)
}

/// Walk numbered siblings of `path` until a free one is found.
pub(crate) fn next_free_path(path: &Path) -> Result<PathBuf> {
    for n in 1..=RENAME_LIMIT {
        let candidate = numbered_sibling(path, n);
        if !candidate.exists() {
            return Ok(candidate);
        }
    }
    Err(ProcessError::RenamingFailed {
        path: path.to_path_buf(),
    })
}

/// Compare two files byte-for-byte in chunks of `chunk` bytes, polling
/// `cancel` at every chunk boundary.
pub(crate) async fn files_identical(
    a: &Path,
    b: &Path,
    chunk: usize,
    cancel: &CancelToken,
) -> Result<bool> {
    let meta_a = tokio::fs::metadata(a).await.map_err(|e| classify_io_error(&e, a))?;
    let meta_b = tokio::fs::metadata(b).await.map_err(|e| classify_io_error(&e, b))?;
    if meta_a.len() != meta_b.len() {
        return Ok(false);
    }

    let mut file_a = tokio::fs::File::open(a).await.map_err(|e| classify_io_error(&e, a))?;
    let mut file_b = tokio::fs::File::open(b).await.map_err(|e| classify_io_error(&e, b))?;
    let mut buf_a = vec![0u8; chunk];
    let mut buf_b = vec![0u8; chunk];

    loop {
        if cancel.is_cancelled() {
            return Err(ProcessError::Aborted);
        }
        let n_a = fill(&mut file_a, &mut buf_a, a).await?;
        let n_b = fill(&mut file_b, &mut buf_b, b).await?;
        if n_a != n_b || buf_a[..n_a] != buf_b[..n_b] {
            return Ok(false);
        }
        if n_a == 0 {
            return Ok(true);
        }
    }
}

/// Read until `buf` is full or the file ends; returns the filled length.
async fn fill(file: &mut tokio::fs::File, buf: &mut [u8], path: &Path) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = file
            .read(&mut buf[filled..])
            .await
            .map_err(|e| classify_io_error(&e, path))?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
