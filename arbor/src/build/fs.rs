//! Filesystem walker.
//!
//! OS access goes through the [`FileSystem`] trait so hosts can substitute
//! their own stat/resolve provider. [`OsFileSystem`] is the stock one.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use directories::BaseDirs;

use super::{BuildOutcome, BuildState};
use crate::cancel::CancelToken;
use crate::error::{Result, TreeError};
use crate::node::Node;
use crate::options::BuildOptions;

/// Symlink hops followed before a chain is treated as a loop.
const MAX_SYMLINK_HOPS: usize = 40;

/// Unique identity of a file, used for loop detection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FileKey {
    /// Device and inode number.
    Inode { dev: u64, ino: u64 },
    /// Fallback for platforms without inode numbers.
    Composite {
        name: String,
        size: u64,
        modified: Option<SystemTime>,
    },
}

/// Stat record for one path. Symlinks are described by their target.
#[derive(Debug, Clone, PartialEq)]
pub struct FileInfo {
    /// Path as walked, not the symlink target.
    pub path: PathBuf,
    pub name: String,
    pub size: u64,
    pub modified: Option<SystemTime>,
    pub is_dir: bool,
    pub is_symlink: bool,
    pub key: FileKey,
}

impl fmt::Display for FileInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_dir {
            write!(f, "{}/", self.name)
        } else {
            write!(f, "{} ({} bytes)", self.name, self.size)
        }
    }
}

/// Path resolution, stat and directory listing.
pub trait FileSystem {
    /// Absolute, normalized form of `path`. Handles `.`, `..` and `~`.
    fn resolve(&self, path: &Path) -> Result<PathBuf>;

    /// Stat `path`, following symlinks. A looping chain fails with
    /// [`TreeError::SymlinkLoop`].
    fn stat(&self, path: &Path) -> Result<FileInfo>;

    /// Entries of the directory at `path`, sorted by file name.
    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>>;
}

/// [`FileSystem`] backed by `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFileSystem;

impl OsFileSystem {
    fn expand_home(path: &Path) -> Result<PathBuf> {
        let mut components = path.components();
        match components.next() {
            Some(Component::Normal(first)) if first == "~" => {
                let home = BaseDirs::new()
                    .map(|dirs| dirs.home_dir().to_path_buf())
                    .ok_or_else(|| TreeError::PathResolution {
                        path: path.to_path_buf(),
                        source: io::Error::new(
                            io::ErrorKind::NotFound,
                            "home directory cannot be determined",
                        ),
                    })?;
                Ok(home.join(components.as_path()))
            }
            _ => Ok(path.to_path_buf()),
        }
    }
}

impl FileSystem for OsFileSystem {
    fn resolve(&self, path: &Path) -> Result<PathBuf> {
        let expanded = Self::expand_home(path)?;
        fs::canonicalize(&expanded).map_err(|source| TreeError::PathResolution {
            path: path.to_path_buf(),
            source,
        })
    }

    fn stat(&self, path: &Path) -> Result<FileInfo> {
        let mut target = path.to_path_buf();
        let mut seen = HashSet::new();
        let mut is_symlink = false;

        loop {
            let meta = fs::symlink_metadata(&target).map_err(|e| TreeError::fs(&target, e))?;
            if !meta.file_type().is_symlink() {
                break;
            }
            is_symlink = true;
            if !seen.insert(target.clone()) || seen.len() > MAX_SYMLINK_HOPS {
                log::warn!("[fs] symlink loop at {}", path.display());
                return Err(TreeError::SymlinkLoop {
                    path: path.to_path_buf(),
                });
            }
            let link = fs::read_link(&target).map_err(|e| TreeError::fs(&target, e))?;
            target = match target.parent() {
                Some(parent) if link.is_relative() => parent.join(link),
                _ => link,
            };
        }

        let meta = fs::metadata(&target).map_err(|e| TreeError::fs(&target, e))?;
        let name = file_name(path);
        let size = meta.len();
        let modified = meta.modified().ok();
        let key = file_key(&meta, &name, size, modified);

        Ok(FileInfo {
            path: path.to_path_buf(),
            name,
            size,
            modified,
            is_dir: meta.is_dir(),
            is_symlink,
            key,
        })
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let scan_err = |source| TreeError::DirectoryScan {
            path: path.to_path_buf(),
            source,
        };
        let mut entries = fs::read_dir(path)
            .map_err(scan_err)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<io::Result<Vec<_>>>()
            .map_err(scan_err)?;
        entries.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(entries)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(unix)]
fn file_key(meta: &fs::Metadata, _name: &str, _size: u64, _modified: Option<SystemTime>) -> FileKey {
    use std::os::unix::fs::MetadataExt;

    FileKey::Inode {
        dev: meta.dev(),
        ino: meta.ino(),
    }
}

#[cfg(not(unix))]
fn file_key(_meta: &fs::Metadata, name: &str, size: u64, modified: Option<SystemTime>) -> FileKey {
    FileKey::Composite {
        name: name.to_string(),
        size,
        modified,
    }
}

fn file_node(info: FileInfo) -> Node<FileInfo> {
    let id = info.path.to_string_lossy().into_owned();
    let name = info.name.clone();
    Node::new(id, name, info)
}

/// Walk the directory tree under `root`.
///
/// Node ids are the walked paths, names the file names, payloads the stat
/// records. The root is never filtered but does count toward the cap. On any
/// error the root comes back as the partial result, holding every batch of
/// children attached before the failure.
pub fn filesystem<F: FileSystem>(
    cancel: &CancelToken,
    fs: &F,
    root: impl AsRef<Path>,
    options: &mut BuildOptions<FileInfo, FileInfo>,
) -> BuildOutcome<FileInfo> {
    let mut state = BuildState::new(cancel, options);

    let info = match cancel
        .check()
        .and_then(|()| fs.resolve(root.as_ref()))
        .and_then(|path| fs.stat(&path))
    {
        Ok(info) => info,
        Err(err) => return state.fail(err, Vec::new()),
    };
    log::debug!("[fs] walking {}", info.path.display());

    // A cap is at least 1, so the root always gets a slot.
    let reserved = state.reserve();
    debug_assert!(reserved);
    let mut visited = HashSet::from([info.key.clone()]);
    let mut root = file_node(info);
    state.created(&root);

    let outcome = if root.data().is_dir && state.limits().allows_children(0) {
        walk_dir(&mut state, fs, &mut visited, &mut root, 0)
    } else {
        Ok(())
    };
    state.options.apply_expand(&mut root);

    match outcome {
        Ok(()) => state.finish(vec![root]),
        Err(err) => state.fail(err, vec![root]),
    }
}

/// Lists `dir` and attaches the resulting batch of children, including on
/// failure.
fn walk_dir<F: FileSystem>(
    state: &mut BuildState<'_, FileInfo, FileInfo>,
    fs: &F,
    visited: &mut HashSet<FileKey>,
    dir: &mut Node<FileInfo>,
    depth: usize,
) -> Result<()> {
    let path = dir.data().path.clone();
    let mut children = Vec::new();
    let outcome = scan_entries(state, fs, visited, &path, depth, &mut children);
    dir.set_children(children);
    outcome
}

fn scan_entries<F: FileSystem>(
    state: &mut BuildState<'_, FileInfo, FileInfo>,
    fs: &F,
    visited: &mut HashSet<FileKey>,
    path: &Path,
    depth: usize,
    children: &mut Vec<Node<FileInfo>>,
) -> Result<()> {
    for entry in fs.read_dir(path)? {
        state.cancel.check()?;

        let info = fs.stat(&entry)?;
        if info.is_dir && !visited.insert(info.key.clone()) {
            log::warn!("[fs] directory {} reached twice", entry.display());
            return Err(TreeError::SymlinkLoop { path: entry });
        }
        if !state.options.keeps(&info) {
            continue;
        }
        if !state.reserve() {
            break;
        }

        let mut child = file_node(info);
        state.created(&child);

        let outcome = if child.data().is_dir && state.limits().allows_children(depth + 1) {
            walk_dir(state, fs, visited, &mut child, depth + 1)
        } else {
            Ok(())
        };
        state.options.apply_expand(&mut child);
        children.push(child);
        outcome?;

        if state.cap_hit {
            break;
        }
    }
    Ok(())
}
