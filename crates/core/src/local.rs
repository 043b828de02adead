//! Local filesystem side: tree walking and writing.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};
use walkdir::WalkDir;

use crate::errors::SyncError;
use crate::models::{LocalKind, LocalNode};

/// A node yielded by the local walk, with its `/`-separated path relative to
/// the walk root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalEntry {
    pub node: LocalNode,
    pub relative_path: String,
}

/// Depth-first iterator over the descendants of a local directory.
///
/// The root itself is not yielded. A directory is yielded before its
/// children, and siblings come out in file-name order. Symlinks are yielded
/// as [`LocalKind::Symlink`] and never followed, so a link back into the tree
/// cannot loop. A name that is not valid UTF-8 ends the walk with a
/// `LocalIo` error.
pub struct LocalTreeWalker {
    root: PathBuf,
    inner: walkdir::IntoIter,
    last_was_dir: bool,
    failed: bool,
}

impl LocalTreeWalker {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let inner = WalkDir::new(&root)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter();
        Self {
            root,
            inner,
            last_was_dir: false,
            failed: false,
        }
    }

    /// Do not descend into the directory returned by the last `next` call.
    /// Has no effect if that entry was not a directory.
    pub fn skip_children(&mut self) {
        if self.last_was_dir {
            self.last_was_dir = false;
            self.inner.skip_current_dir();
            debug!("pruned local directory");
        }
    }

    fn entry(&self, item: walkdir::DirEntry) -> Result<LocalEntry, SyncError> {
        let file_type = item.file_type();
        let path = item.into_path();
        let relative_path = relative_to(&self.root, &path)?;
        let kind = if file_type.is_symlink() {
            LocalKind::Symlink
        } else if file_type.is_dir() {
            LocalKind::Directory
        } else {
            LocalKind::File
        };
        Ok(LocalEntry {
            node: LocalNode { path, kind },
            relative_path,
        })
    }
}

impl Iterator for LocalTreeWalker {
    type Item = Result<LocalEntry, SyncError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        self.last_was_dir = false;
        let result = match self.inner.next()? {
            Ok(item) => self.entry(item),
            Err(e) => {
                let path = e.path().unwrap_or(&self.root).to_path_buf();
                Err(SyncError::local_io(path, io::Error::from(e)))
            }
        };
        match result {
            Ok(entry) => {
                self.last_was_dir = entry.node.kind == LocalKind::Directory;
                trace!(relative = %entry.relative_path, "local walk step");
                Some(Ok(entry))
            }
            Err(e) => {
                // Stop after the first error.
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// `/`-joined path of `path` below `root`. Every component must be UTF-8 so
/// the remote name is the local name byte for byte.
fn relative_to(root: &Path, path: &Path) -> Result<String, SyncError> {
    let suffix = path.strip_prefix(root).map_err(|_| SyncError::PathOutsideRoot {
        root: root.display().to_string(),
        path: path.display().to_string(),
    })?;
    let mut segments = Vec::new();
    for component in suffix.components() {
        let segment = component.as_os_str().to_str().ok_or_else(|| {
            SyncError::local_io(
                path,
                io::Error::new(io::ErrorKind::InvalidData, "file name is not valid UTF-8"),
            )
        })?;
        segments.push(segment);
    }
    Ok(segments.join("/"))
}

/// Materializes files and directories under a local base directory.
#[derive(Debug, Clone)]
pub struct LocalTreeWriter {
    base: PathBuf,
}

impl LocalTreeWriter {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Resolve a `/`-separated relative path under the base.
    pub fn resolve(&self, relative: &str) -> PathBuf {
        relative
            .split('/')
            .filter(|s| !s.is_empty())
            .fold(self.base.clone(), |acc, seg| acc.join(seg))
    }

    /// Create a directory. An existing directory is not an error; the parent
    /// must already exist.
    pub fn create_dir(&self, relative: &str) -> Result<PathBuf, SyncError> {
        let path = self.resolve(relative);
        match fs::create_dir(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists && path.is_dir() => {}
            Err(e) => return Err(SyncError::local_io(&path, e)),
        }
        debug!(path = %path.display(), "created local directory");
        Ok(path)
    }

    /// Create the base directory and any missing ancestors.
    pub fn create_base(&self) -> Result<(), SyncError> {
        fs::create_dir_all(&self.base).map_err(|e| SyncError::local_io(&self.base, e))
    }

    /// Write a whole file, replacing any existing content.
    pub fn write_file(&self, relative: &str, content: &[u8]) -> Result<PathBuf, SyncError> {
        let path = self.resolve(relative);
        fs::write(&path, content).map_err(|e| SyncError::local_io(&path, e))?;
        debug!(path = %path.display(), bytes = content.len(), "wrote local file");
        Ok(path)
    }
}

/// Read a whole file.
pub fn read_file(path: &Path) -> Result<Vec<u8>, SyncError> {
    fs::read(path).map_err(|e| SyncError::local_io(path, e))
}
