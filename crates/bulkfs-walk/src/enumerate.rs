//! Depth-first enumeration with ordering policies

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use bulkfs_types::{classify_io_error, PathInfo, ProcessError, TraversalOrder};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

/// Lazy, restartable enumerator for one root path.
///
/// Holds only the root, the relative-path base, and the ordering policy;
/// every call to [`iter`](Self::iter) starts a fresh walk, which is what
/// makes re-enumeration deterministic.
#[derive(Debug, Clone)]
pub struct PathEnumerator {
    root: PathBuf,
    base: PathBuf,
    order: TraversalOrder,
}

impl PathEnumerator {
    /// Create an enumerator for `root`.
    ///
    /// Relative directories are computed against the root's parent, so a
    /// copied tree keeps the root's own name under the destination.
    pub fn new<P: Into<PathBuf>>(root: P, order: TraversalOrder) -> Self {
        let root = root.into();
        let base = root.parent().map(Path::to_path_buf).unwrap_or_default();
        Self { root, base, order }
    }

    /// The root this enumerator walks.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The ordering policy in effect.
    pub fn order(&self) -> TraversalOrder {
        self.order
    }

    /// Start a fresh walk over the root.
    pub fn iter(&self) -> Walk {
        debug!(root = %self.root.display(), order = ?self.order, "starting enumeration");
        let mut walk = WalkDir::new(&self.root).follow_links(false);
        walk = match self.order {
            TraversalOrder::DirectoriesThenFiles => walk.sort_by(dirs_first),
            TraversalOrder::FilesThenDirectories => walk.sort_by(files_first),
            TraversalOrder::ChildrenThenParent => walk.contents_first(true).sort_by(name_order),
        };
        Walk {
            inner: walk.into_iter(),
            base: self.base.clone(),
        }
    }
}

impl<'a> IntoIterator for &'a PathEnumerator {
    type Item = Result<PathInfo, ProcessError>;
    type IntoIter = Walk;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

fn name_order(a: &DirEntry, b: &DirEntry) -> Ordering {
    a.file_name().cmp(b.file_name())
}

fn dirs_first(a: &DirEntry, b: &DirEntry) -> Ordering {
    b.file_type()
        .is_dir()
        .cmp(&a.file_type().is_dir())
        .then_with(|| name_order(a, b))
}

fn files_first(a: &DirEntry, b: &DirEntry) -> Ordering {
    a.file_type()
        .is_dir()
        .cmp(&b.file_type().is_dir())
        .then_with(|| name_order(a, b))
}

/// One in-flight walk over a root.
///
/// Yields `Ok(PathInfo)` per reachable entry and `Err` per unreadable
/// subtree; an error never terminates the walk by itself, so a single
/// denied directory costs exactly one item.
pub struct Walk {
    inner: walkdir::IntoIter,
    base: PathBuf,
}

impl Walk {
    fn convert(&self, entry: DirEntry) -> Result<PathInfo, ProcessError> {
        let meta = entry
            .metadata()
            .map_err(|e| classify_walk_error(&e, entry.path()))?;
        let relative_dir = entry
            .path()
            .parent()
            .and_then(|p| p.strip_prefix(&self.base).ok())
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok(PathInfo::from_metadata(entry.path(), &meta).with_relative_dir(relative_dir))
    }
}

impl Iterator for Walk {
    type Item = Result<PathInfo, ProcessError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.inner.next()? {
            Ok(entry) => Some(self.convert(entry)),
            Err(err) => {
                let path = err.path().unwrap_or(Path::new("")).to_path_buf();
                Some(Err(classify_walk_error(&err, &path)))
            }
        }
    }
}

fn classify_walk_error(err: &walkdir::Error, path: &Path) -> ProcessError {
    match err.io_error() {
        Some(io) => classify_io_error(io, path),
        None => ProcessError::Unknown {
            message: format!("{err}"),
            code: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn build_tree(root: &Path) {
        fs::create_dir_all(root.join("sub")).unwrap();
        fs::write(root.join("sub/x.txt"), b"xx").unwrap();
        fs::write(root.join("y.txt"), b"yyyy").unwrap();
    }

    fn names(order: TraversalOrder, root: &Path) -> Vec<String> {
        PathEnumerator::new(root, order)
            .iter()
            .map(|e| {
                e.unwrap()
                    .path()
                    .file_name()
                    .unwrap()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect()
    }

    #[test]
    fn children_come_before_their_parent() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("root");
        build_tree(&root);

        let order = names(TraversalOrder::ChildrenThenParent, &root);
        let pos = |n: &str| order.iter().position(|x| x == n).unwrap();
        assert!(pos("x.txt") < pos("sub"));
        assert!(pos("sub") < pos("root"));
        assert!(pos("y.txt") < pos("root"));
        assert_eq!(order.last().map(String::as_str), Some("root"));
    }

    #[test]
    fn directories_precede_files_among_siblings() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("root");
        build_tree(&root);

        let order = names(TraversalOrder::DirectoriesThenFiles, &root);
        assert_eq!(order, vec!["root", "sub", "x.txt", "y.txt"]);
    }

    #[test]
    fn files_precede_directories_among_siblings() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("root");
        build_tree(&root);

        let order = names(TraversalOrder::FilesThenDirectories, &root);
        assert_eq!(order, vec!["root", "y.txt", "sub", "x.txt"]);
    }

    #[test]
    fn re_enumeration_yields_the_same_sequence() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("root");
        build_tree(&root);

        let walker = PathEnumerator::new(&root, TraversalOrder::ChildrenThenParent);
        let first: Vec<_> = walker.iter().map(|e| e.unwrap()).collect();
        let second: Vec<_> = walker.iter().map(|e| e.unwrap()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn relative_dirs_are_anchored_at_the_roots_parent() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("root");
        build_tree(&root);

        let walker = PathEnumerator::new(&root, TraversalOrder::DirectoriesThenFiles);
        for info in walker.iter().map(|e| e.unwrap()) {
            let rel = info.relative_dir().unwrap();
            if info.path() == root {
                assert_eq!(rel, Path::new(""));
            } else {
                assert!(rel.starts_with("root"), "got {rel:?}");
            }
        }
    }

    #[test]
    fn a_single_file_root_yields_itself() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("only.bin");
        fs::write(&file, b"123").unwrap();

        let items: Vec<_> = PathEnumerator::new(&file, TraversalOrder::DirectoriesThenFiles)
            .iter()
            .map(|e| e.unwrap())
            .collect();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].size(), Some(3));
        assert!(!items[0].is_dir());
    }

    #[test]
    fn missing_root_surfaces_as_an_error_item() {
        let tmp = TempDir::new().unwrap();
        let gone = tmp.path().join("nope");

        let items: Vec<_> = PathEnumerator::new(&gone, TraversalOrder::ChildrenThenParent)
            .iter()
            .collect();
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(ProcessError::NotFound { .. })));
    }
}
