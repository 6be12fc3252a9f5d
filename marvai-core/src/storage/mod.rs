//! File system port
//!
//! Everything the core persists goes through [`Storage`], so the installer can
//! run against the real disk ([`OsStorage`]) or an in-memory fake
//! ([`MemoryStorage`]) in tests.

mod memory;
mod os;

use std::io;
use std::path::Path;

pub use memory::MemoryStorage;
pub use os::OsStorage;

/// One entry returned by [`Storage::list_dir`]
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
}

/// Minimal file system surface used by the core
pub trait Storage: Send + Sync {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Replace the whole file content
    fn write(&self, path: &Path, data: &[u8]) -> io::Result<()>;

    /// Append to a file, creating it when missing
    fn append(&self, path: &Path, data: &[u8]) -> io::Result<()>;

    /// True for files and directories, including dangling symlinks
    fn exists(&self, path: &Path) -> bool;

    fn remove(&self, path: &Path) -> io::Result<()>;

    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Entries of a directory, sorted by name
    fn list_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>>;

    fn is_dir(&self, path: &Path) -> bool;

    /// `Some(true)` for a symlink, `Some(false)` for anything else,
    /// `None` when the backend cannot tell
    fn link_status(&self, path: &Path) -> io::Result<Option<bool>>;

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        let bytes = self.read(path)?;
        String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Full copy of `from` onto `to`
    fn copy(&self, from: &Path, to: &Path) -> io::Result<()> {
        let data = self.read(from)?;
        self.write(to, &data)
    }
}
