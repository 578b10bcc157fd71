//! Per-request scratch directories for uploaded files.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::debug;

const DEFAULT_FILENAME: &str = "upload";

#[derive(Debug, Clone)]
pub struct ScratchSpace {
    root: PathBuf,
}

impl ScratchSpace {
    pub fn new(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// A fresh directory under the root, removed when the handle is dropped.
    pub fn request_dir(&self) -> io::Result<RequestDir> {
        let dir = tempfile::Builder::new()
            .prefix("request-")
            .tempdir_in(&self.root)?;
        debug!(path = %dir.path().display(), "created scratch directory");
        Ok(RequestDir { dir })
    }
}

#[derive(Debug)]
pub struct RequestDir {
    dir: TempDir,
}

impl RequestDir {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Writes an uploaded file and returns its absolute path.
    pub fn persist(&self, filename: &str, contents: &[u8]) -> io::Result<PathBuf> {
        let path = self.dir.path().join(sanitize_filename(filename));
        fs::write(&path, contents)?;
        path.canonicalize()
    }
}

/// Final path component of `name`; `upload` when nothing usable is left.
pub fn sanitize_filename(name: &str) -> String {
    let last = name.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    match last {
        "" | "." | ".." => DEFAULT_FILENAME.to_string(),
        name => name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("photo.png"), "photo.png");
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\Users\\me\\cat.jpg"), "cat.jpg");
        assert_eq!(sanitize_filename(""), "upload");
        assert_eq!(sanitize_filename("dir/"), "upload");
        assert_eq!(sanitize_filename(".."), "upload");
    }

    #[test]
    fn test_request_dirs_are_isolated_and_removed() {
        let root = tempfile::tempdir().unwrap();
        let scratch = ScratchSpace::new(root.path().join("uploads")).unwrap();
        let first = scratch.request_dir().unwrap();
        let second = scratch.request_dir().unwrap();

        let a = first.persist("same.txt", b"first").unwrap();
        let b = second.persist("same.txt", b"second").unwrap();
        assert_ne!(a, b);
        assert!(a.is_absolute());
        assert_eq!(fs::read(&a).unwrap(), b"first");
        assert_eq!(fs::read(&b).unwrap(), b"second");

        let first_path = first.path().to_path_buf();
        drop(first);
        assert!(!first_path.exists());
        assert!(b.exists());
    }
}
