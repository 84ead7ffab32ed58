//! tar + zstd archive construction

use std::fs::{File, OpenOptions};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use bulkfs_types::{
    classify_io_error, CancelToken, Cancellable, CompressionLevel, ProcessError, Result,
    TraversalOrder,
};
use bulkfs_walk::PathEnumerator;
use tracing::{debug, info};

/// Per-entry lifecycle hooks fired while an entry streams into the
/// archive. All hooks are optional; a missing hook costs nothing.
#[derive(Default)]
pub struct ArchiveHooks<'a> {
    /// Fired once before the first byte of an entry is read
    pub entry_started: Option<Box<dyn Fn(&Path) + Send + 'a>>,
    /// Fired per chunk with the number of bytes just compressed
    pub entry_progress: Option<Box<dyn Fn(&Path, u64) + Send + 'a>>,
    /// Fired once after the entry is fully appended
    pub entry_finished: Option<Box<dyn Fn(&Path) + Send + 'a>>,
}

impl ArchiveHooks<'_> {
    fn started(&self, path: &Path) {
        if let Some(hook) = &self.entry_started {
            hook(path);
        }
    }

    fn progress(&self, path: &Path, bytes: u64) {
        if let Some(hook) = &self.entry_progress {
            hook(path, bytes);
        }
    }

    fn finished(&self, path: &Path) {
        if let Some(hook) = &self.entry_finished {
            hook(path);
        }
    }
}

impl std::fmt::Debug for ArchiveHooks<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveHooks")
            .field("entry_started", &self.entry_started.is_some())
            .field("entry_progress", &self.entry_progress.is_some())
            .field("entry_finished", &self.entry_finished.is_some())
            .finish()
    }
}

/// Streaming `.tar.zst` writer.
///
/// The writer owns the destination file exclusively (`create_new`), so a
/// pre-existing archive path fails before anything is written.
pub struct ArchiveWriter {
    builder: tar::Builder<zstd::stream::write::Encoder<'static, File>>,
    path: PathBuf,
}

impl ArchiveWriter {
    /// Create a new archive at `path`. Fails with
    /// [`ProcessError::AlreadyExists`] when the path is occupied.
    pub fn create<P: Into<PathBuf>>(path: P, level: CompressionLevel) -> Result<Self> {
        let path = path.into();
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| classify_io_error(&e, &path))?;
        let encoder = zstd::stream::write::Encoder::new(file, i32::from(level.get()))
            .map_err(|e| classify_io_error(&e, &path))?;
        info!(archive = %path.display(), level = level.get(), "created archive");
        Ok(Self {
            builder: tar::Builder::new(encoder),
            path,
        })
    }

    /// The archive file being written.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one regular file under the entry name `name`.
    ///
    /// Streams the file through the compressor chunk by chunk, firing
    /// `entry_progress` per chunk and honoring `cancel` at every chunk
    /// boundary. Returns the number of source bytes appended.
    pub fn append_file(
        &mut self,
        source: &Path,
        name: &Path,
        hooks: &ArchiveHooks<'_>,
        cancel: &CancelToken,
    ) -> Result<u64> {
        let meta = std::fs::metadata(source).map_err(|e| classify_io_error(&e, source))?;
        let file = File::open(source).map_err(|e| classify_io_error(&e, source))?;

        hooks.started(source);

        let mut header = tar::Header::new_gnu();
        header.set_metadata(&meta);

        let mut reader = HookedReader {
            inner: file,
            path: source,
            hooks,
            cancel,
            bytes: 0,
        };
        self.builder
            .append_data(&mut header, name, &mut reader)
            .map_err(|e| self.map_stream_error(&e, source, cancel))?;

        hooks.finished(source);
        debug!(source = %source.display(), bytes = reader.bytes, "appended file");
        Ok(reader.bytes)
    }

    /// Append a directory tree, directories before their contents so the
    /// archive replays cleanly. Returns the number of file bytes
    /// appended.
    pub fn append_dir_all(
        &mut self,
        dir: &Path,
        hooks: &ArchiveHooks<'_>,
        cancel: &CancelToken,
    ) -> Result<u64> {
        let mut total = 0u64;
        let walker = PathEnumerator::new(dir, TraversalOrder::DirectoriesThenFiles);
        for entry in walker.iter() {
            if cancel.is_cancelled() {
                return Err(ProcessError::Aborted);
            }
            let info = entry?;
            let name = info
                .relative_dir()
                .map(|rel| rel.join(info.file_name()))
                .unwrap_or_else(|| PathBuf::from(info.file_name()));
            if info.is_dir() {
                self.builder
                    .append_dir(&name, info.path())
                    .map_err(|e| self.map_stream_error(&e, info.path(), cancel))?;
            } else {
                total += self.append_file(info.path(), &name, hooks, cancel)?;
            }
        }
        debug!(dir = %dir.display(), bytes = total, "appended directory");
        Ok(total)
    }

    /// Flush the tar trailer and the compressor, then sync the file.
    pub fn finish(self) -> Result<()> {
        let path = self.path;
        let encoder = self
            .builder
            .into_inner()
            .map_err(|e| classify_io_error(&e, &path))?;
        let file = encoder.finish().map_err(|e| classify_io_error(&e, &path))?;
        file.sync_all().map_err(|e| classify_io_error(&e, &path))?;
        info!(archive = %path.display(), "archive finished");
        Ok(())
    }

    fn map_stream_error(&self, err: &io::Error, source: &Path, cancel: &CancelToken) -> ProcessError {
        if cancel.is_cancelled() {
            ProcessError::Aborted
        } else {
            classify_io_error(err, source)
        }
    }
}

impl std::fmt::Debug for ArchiveWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveWriter")
            .field("path", &self.path)
            .finish()
    }
}

/// Reader adapter that fires progress per chunk and turns a pending
/// cancellation into an `Interrupted` read error.
struct HookedReader<'a> {
    inner: File,
    path: &'a Path,
    hooks: &'a ArchiveHooks<'a>,
    cancel: &'a CancelToken,
    bytes: u64,
}

impl Read for HookedReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.cancel.is_cancelled() {
            // Not ErrorKind::Interrupted: io::copy would silently retry it.
            return Err(io::Error::other("cancellation requested"));
        }
        let n = self.inner.read(buf)?;
        if n > 0 {
            self.bytes += n as u64;
            self.hooks.progress(self.path, n as u64);
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn read_entry_names(archive: &Path) -> Vec<String> {
        let file = File::open(archive).unwrap();
        let decoder = zstd::stream::read::Decoder::new(file).unwrap();
        let mut tar = tar::Archive::new(decoder);
        tar.entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn append_and_read_back() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("notes.txt");
        fs::write(&src, b"hello archive").unwrap();
        let dest = tmp.path().join("out.tar.zst");

        let cancel = CancelToken::new();
        let hooks = ArchiveHooks::default();
        let mut writer = ArchiveWriter::create(&dest, CompressionLevel::default()).unwrap();
        let bytes = writer
            .append_file(&src, Path::new("notes.txt"), &hooks, &cancel)
            .unwrap();
        writer.finish().unwrap();

        assert_eq!(bytes, 13);
        assert_eq!(read_entry_names(&dest), vec!["notes.txt"]);
    }

    #[test]
    fn creating_over_an_existing_archive_fails() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("busy.tar.zst");
        fs::write(&dest, b"occupied").unwrap();

        let err = ArchiveWriter::create(&dest, CompressionLevel::default()).unwrap_err();
        assert!(matches!(err, ProcessError::AlreadyExists { .. }));
    }

    #[test]
    fn directory_trees_keep_their_shape() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("photos");
        fs::create_dir_all(root.join("2024")).unwrap();
        fs::write(root.join("2024/a.raw"), vec![0u8; 256]).unwrap();
        fs::write(root.join("index.txt"), b"one").unwrap();
        let dest = tmp.path().join("photos.tar.zst");

        let cancel = CancelToken::new();
        let hooks = ArchiveHooks::default();
        let mut writer = ArchiveWriter::create(&dest, CompressionLevel::default()).unwrap();
        let bytes = writer.append_dir_all(&root, &hooks, &cancel).unwrap();
        writer.finish().unwrap();

        assert_eq!(bytes, 259);
        let names = read_entry_names(&dest);
        assert!(names.contains(&"photos/".to_string()) || names.contains(&"photos".to_string()));
        assert!(names.iter().any(|n| n.ends_with("2024/a.raw")));
        assert!(names.iter().any(|n| n.ends_with("index.txt")));
    }

    #[test]
    fn hooks_observe_every_byte() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("data.bin");
        fs::write(&src, vec![7u8; 10_000]).unwrap();
        let dest = tmp.path().join("data.tar.zst");

        let seen = Arc::new(AtomicU64::new(0));
        let seen_hook = Arc::clone(&seen);
        let hooks = ArchiveHooks {
            entry_progress: Some(Box::new(move |_, n| {
                seen_hook.fetch_add(n, Ordering::Relaxed);
            })),
            ..Default::default()
        };

        let cancel = CancelToken::new();
        let mut writer = ArchiveWriter::create(&dest, CompressionLevel::default()).unwrap();
        writer
            .append_file(&src, Path::new("data.bin"), &hooks, &cancel)
            .unwrap();
        writer.finish().unwrap();

        assert_eq!(seen.load(Ordering::Relaxed), 10_000);
    }

    #[test]
    fn cancellation_interrupts_the_stream() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("big.bin");
        fs::write(&src, vec![1u8; 4096]).unwrap();
        let dest = tmp.path().join("big.tar.zst");

        let cancel = CancelToken::new();
        cancel.cancel();
        let hooks = ArchiveHooks::default();
        let mut writer = ArchiveWriter::create(&dest, CompressionLevel::default()).unwrap();
        let err = writer
            .append_file(&src, Path::new("big.bin"), &hooks, &cancel)
            .unwrap_err();
        assert!(err.is_aborted());
    }
}
