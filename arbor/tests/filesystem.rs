mod common;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use arbor::{
    BuildOptions, CancelToken, FileInfo, FileKey, FileSystem, Node, OsFileSystem, Tree, TreeError,
};
use tempfile::TempDir;

/// root/
/// ├── docs/
/// │   ├── a.md
/// │   └── deep/
/// │       └── z.txt
/// ├── main.rs
/// └── notes.txt
fn fixture() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    fs::create_dir_all(root.join("docs/deep")).unwrap();
    fs::write(root.join("docs/a.md"), "# a").unwrap();
    fs::write(root.join("docs/deep/z.txt"), "z").unwrap();
    fs::write(root.join("main.rs"), "fn main() {}").unwrap();
    fs::write(root.join("notes.txt"), "hello").unwrap();
    dir
}

fn names(tree: &Tree<FileInfo>) -> Vec<String> {
    tree.with_nodes(|nodes| {
        arbor::DepthFirst::new(nodes, &CancelToken::new())
            .map(|visit| visit.unwrap().node.name().to_string())
            .collect()
    })
}

#[test]
fn test_walks_sorted_tree() {
    common::init_logging();
    let dir = fixture();
    let tree = Tree::from_filesystem(&CancelToken::new(), dir.path(), BuildOptions::new()).unwrap();

    let names = names(&tree);
    assert_eq!(&names[1..], ["docs", "a.md", "deep", "z.txt", "main.rs", "notes.txt"]);

    let main = tree.with_nodes(|nodes| nodes[0].children()[1].data().clone());
    assert_eq!(main.name, "main.rs");
    assert_eq!(main.size, 12);
    assert!(!main.is_dir);
}

#[test]
fn test_root_counts_toward_cap() {
    let dir = fixture();
    let options = BuildOptions::new().with_traversal_cap(3);
    let err = Tree::from_filesystem(&CancelToken::new(), dir.path(), options).unwrap_err();
    assert!(matches!(err.error, TreeError::TraversalLimit { limit: 3 }));
    // root, docs, a.md
    assert_eq!(err.partial.len(), 3);
}

#[test]
fn test_depth_limit_and_filter() {
    let dir = fixture();
    let options = BuildOptions::new()
        .with_max_depth(1)
        .with_filter(|info: &FileInfo| info.is_dir || info.name.ends_with(".rs"));
    let tree = Tree::from_filesystem(&CancelToken::new(), dir.path(), options).unwrap();

    let names = names(&tree);
    assert_eq!(&names[1..], ["docs", "main.rs"]);
}

#[test]
fn test_progress_and_expand() {
    let dir = fixture();
    let seen = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&seen);
    let options = BuildOptions::new()
        .with_progress(move |count, _| *counter.lock().unwrap() = count)
        .with_expand(|node: &Node<FileInfo>| node.data().is_dir);
    let tree = Tree::from_filesystem(&CancelToken::new(), dir.path(), options).unwrap();

    assert_eq!(*seen.lock().unwrap(), 7);
    let cancel = CancelToken::new();
    assert_eq!(tree.visible_len(&cancel).unwrap(), 7);
}

#[test]
fn test_relative_components_resolve() {
    let dir = fixture();
    let dotted = dir.path().join("docs/../docs/./deep");
    let tree = Tree::from_filesystem(&CancelToken::new(), &dotted, BuildOptions::new()).unwrap();
    let root: PathBuf = tree.with_nodes(|nodes| nodes[0].data().path.clone());
    assert_eq!(root, fs::canonicalize(dir.path().join("docs/deep")).unwrap());
}

#[test]
fn test_missing_root() {
    let dir = fixture();
    let err = Tree::from_filesystem(&CancelToken::new(), dir.path().join("nope"), BuildOptions::new())
        .unwrap_err();
    assert!(matches!(err.error, TreeError::PathResolution { .. }));
    assert!(err.partial.is_empty());
}

#[cfg(unix)]
#[test]
fn test_symlink_pair_is_a_loop() {
    use std::os::unix::fs::symlink;

    common::init_logging();
    let dir = tempfile::tempdir().unwrap();
    symlink(dir.path().join("b"), dir.path().join("a")).unwrap();
    symlink(dir.path().join("a"), dir.path().join("b")).unwrap();

    let err = Tree::from_filesystem(&CancelToken::new(), dir.path(), BuildOptions::new()).unwrap_err();
    assert!(matches!(err.error, TreeError::SymlinkLoop { .. }));
    assert_eq!(err.partial.len(), 1);
}

#[cfg(unix)]
#[test]
fn test_symlink_to_ancestor_is_a_loop() {
    use std::os::unix::fs::symlink;

    let dir = fixture();
    symlink(dir.path(), dir.path().join("docs/up")).unwrap();

    let err = Tree::from_filesystem(&CancelToken::new(), dir.path(), BuildOptions::new()).unwrap_err();
    assert!(matches!(err.error, TreeError::SymlinkLoop { ref path } if path.ends_with("docs/up")));
    // Entries scanned before the loop are kept.
    assert!(err.partial.len() > 1);
}

/// Serves a fixed in-memory layout.
struct FakeFs;

impl FakeFs {
    fn info(path: &Path, is_dir: bool, ino: u64) -> FileInfo {
        FileInfo {
            path: path.to_path_buf(),
            name: path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default(),
            size: 0,
            modified: None,
            is_dir,
            is_symlink: false,
            key: FileKey::Inode { dev: 0, ino },
        }
    }
}

impl FileSystem for FakeFs {
    fn resolve(&self, path: &Path) -> arbor::Result<PathBuf> {
        Ok(Path::new("/virtual").join(path))
    }

    fn stat(&self, path: &Path) -> arbor::Result<FileInfo> {
        match path.to_str() {
            Some("/virtual/root") => Ok(Self::info(path, true, 1)),
            Some("/virtual/root/x") => Ok(Self::info(path, false, 2)),
            Some("/virtual/root/broken") => Err(TreeError::FileSystem {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
            }),
            _ => unreachable!("unexpected stat of {}", path.display()),
        }
    }

    fn read_dir(&self, path: &Path) -> arbor::Result<Vec<PathBuf>> {
        Ok(vec![path.join("x"), path.join("broken")])
    }
}

#[test]
fn test_io_error_keeps_attached_batch() {
    let err = Tree::from_filesystem_with(&CancelToken::new(), &FakeFs, "root", BuildOptions::new())
        .unwrap_err();
    assert!(matches!(err.error, TreeError::FileSystem { ref path, .. } if path.ends_with("broken")));
    assert_eq!(err.partial.len(), 2);
    assert!(err.partial.contains("/virtual/root/x"));
}

#[test]
fn test_os_filesystem_stat() {
    let dir = fixture();
    let info = OsFileSystem.stat(&dir.path().join("notes.txt")).unwrap();
    assert_eq!(info.size, 5);
    assert!(!info.is_symlink);
    assert_eq!(info.to_string(), "notes.txt (5 bytes)");
}
