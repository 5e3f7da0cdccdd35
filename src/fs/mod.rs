// src/fs/mod.rs

//! Filesystem metadata queries used by the up-to-date evaluation.
//!
//! The evaluation only ever asks five questions of the filesystem; they are
//! collected in the [`FileSystem`] trait so that a memoizing
//! [`cache::CacheRegion`] or a [`mock::MockFileSystem`] can stand in for the
//! real thing.

use std::fmt::Debug;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

pub mod cache;
pub mod mock;

pub use cache::{CacheRegion, FsQueryCache};

/// Subset of file metadata the up-to-date check needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub is_file: bool,
    pub is_dir: bool,
    pub len: u64,
    pub modified: Option<SystemTime>,
}

impl From<fs::Metadata> for FileStat {
    fn from(meta: fs::Metadata) -> Self {
        Self {
            is_file: meta.is_file(),
            is_dir: meta.is_dir(),
            len: meta.len(),
            modified: meta.modified().ok(),
        }
    }
}

/// Abstract filesystem metadata interface.
pub trait FileSystem: Send + Sync + Debug {
    /// Metadata of `path`, following symlinks.
    fn stat(&self, path: &Path) -> io::Result<FileStat>;
    /// `path` made absolute against the current directory, without touching
    /// the filesystem or resolving symlinks.
    fn absolute(&self, path: &Path) -> io::Result<PathBuf>;
    /// Fully resolved path; fails if `path` does not exist.
    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf>;
    /// `path` expressed relative to `base`.
    fn relative(&self, path: &Path, base: &Path) -> io::Result<PathBuf>;
    fn is_symlink(&self, path: &Path) -> bool;

    fn exists(&self, path: &Path) -> bool {
        self.stat(path).is_ok()
    }
}

/// Implementation that uses `std::fs`.
#[derive(Debug, Clone, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn stat(&self, path: &Path) -> io::Result<FileStat> {
        fs::metadata(path).map(FileStat::from)
    }

    fn absolute(&self, path: &Path) -> io::Result<PathBuf> {
        std::path::absolute(path)
    }

    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        fs::canonicalize(path)
    }

    fn relative(&self, path: &Path, base: &Path) -> io::Result<PathBuf> {
        let path = std::path::absolute(path)?;
        let base = std::path::absolute(base)?;
        Ok(relative_path(&normalize(&path), &normalize(&base)))
    }

    fn is_symlink(&self, path: &Path) -> bool {
        fs::symlink_metadata(path)
            .map(|m| m.file_type().is_symlink())
            .unwrap_or(false)
    }
}

/// Lexically remove `.` and resolve `..` components.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Lexical relative path from `base` to `path`; both must be normalized
/// and either both absolute or both relative.
pub fn relative_path(path: &Path, base: &Path) -> PathBuf {
    let path_parts: Vec<Component<'_>> = path.components().collect();
    let base_parts: Vec<Component<'_>> = base.components().collect();

    let common = path_parts
        .iter()
        .zip(base_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut out = PathBuf::new();
    for _ in common..base_parts.len() {
        out.push("..");
    }
    for part in &path_parts[common..] {
        out.push(part.as_os_str());
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}
