use super::{FileStat, FileSystem, normalize, relative_path};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

/// Working directory that relative mock paths are resolved against.
pub const MOCK_CWD: &str = "/work";

#[derive(Debug, Clone)]
pub enum MockEntry {
    File { len: u64, modified: SystemTime },
    Dir,
    Symlink(PathBuf),
}

/// In-memory filesystem for tests.
///
/// Paths are stored absolute and normalized; relative paths given to any
/// method are resolved against [`MOCK_CWD`].
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    entries: Arc<Mutex<HashMap<PathBuf, MockEntry>>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        let fs = Self::default();
        fs.ensure_dir(Path::new(MOCK_CWD));
        fs
    }

    fn resolve(path: &Path) -> PathBuf {
        if path.is_absolute() {
            normalize(path)
        } else {
            normalize(&Path::new(MOCK_CWD).join(path))
        }
    }

    pub fn add_file(&self, path: impl AsRef<Path>, len: u64, modified: SystemTime) {
        let path = Self::resolve(path.as_ref());
        if let Some(parent) = path.parent() {
            self.ensure_dir(parent);
        }
        let mut entries = self.entries.lock().unwrap();
        entries.insert(path, MockEntry::File { len, modified });
    }

    pub fn add_symlink(&self, link: impl AsRef<Path>, target: impl AsRef<Path>) {
        let link = Self::resolve(link.as_ref());
        let target = Self::resolve(target.as_ref());
        let mut entries = self.entries.lock().unwrap();
        entries.insert(link, MockEntry::Symlink(target));
    }

    pub fn remove(&self, path: impl AsRef<Path>) {
        let path = Self::resolve(path.as_ref());
        self.entries.lock().unwrap().remove(&path);
    }

    fn ensure_dir(&self, path: &Path) {
        let mut entries = self.entries.lock().unwrap();
        for ancestor in path.ancestors() {
            entries
                .entry(ancestor.to_path_buf())
                .or_insert(MockEntry::Dir);
        }
    }

    /// Follow symlink entries until a non-link entry (or nothing) is found.
    fn follow(&self, path: &Path) -> io::Result<(PathBuf, MockEntry)> {
        let entries = self.entries.lock().unwrap();
        let mut current = path.to_path_buf();
        for _ in 0..32 {
            match entries.get(&current) {
                Some(MockEntry::Symlink(target)) => current = target.clone(),
                Some(entry) => return Ok((current, entry.clone())),
                None => break,
            }
        }
        Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("no such file: {:?}", path),
        ))
    }
}

impl FileSystem for MockFileSystem {
    fn stat(&self, path: &Path) -> io::Result<FileStat> {
        let (_, entry) = self.follow(&Self::resolve(path))?;
        Ok(match entry {
            MockEntry::File { len, modified } => FileStat {
                is_file: true,
                is_dir: false,
                len,
                modified: Some(modified),
            },
            MockEntry::Dir | MockEntry::Symlink(_) => FileStat {
                is_file: false,
                is_dir: true,
                len: 0,
                modified: None,
            },
        })
    }

    fn absolute(&self, path: &Path) -> io::Result<PathBuf> {
        Ok(Self::resolve(path))
    }

    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        let (resolved, _) = self.follow(&Self::resolve(path))?;
        Ok(resolved)
    }

    fn relative(&self, path: &Path, base: &Path) -> io::Result<PathBuf> {
        Ok(relative_path(&Self::resolve(path), &Self::resolve(base)))
    }

    fn is_symlink(&self, path: &Path) -> bool {
        let entries = self.entries.lock().unwrap();
        matches!(
            entries.get(&Self::resolve(path)),
            Some(MockEntry::Symlink(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symlinks_resolve_to_their_target() {
        let fs = MockFileSystem::new();
        fs.add_file("data/a.txt", 3, SystemTime::UNIX_EPOCH);
        fs.add_symlink("link.txt", "data/a.txt");

        assert!(fs.is_symlink(Path::new("link.txt")));
        assert_eq!(
            fs.canonicalize(Path::new("link.txt")).unwrap(),
            PathBuf::from("/work/data/a.txt")
        );
        assert_eq!(fs.stat(Path::new("link.txt")).unwrap().len, 3);
    }

    #[test]
    fn missing_entries_are_not_found() {
        let fs = MockFileSystem::new();
        let err = fs.stat(Path::new("nope")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert!(fs.exists(Path::new(".")));
    }
}
