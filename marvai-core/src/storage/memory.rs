use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::{DirEntry, Storage};
use crate::security::clean_path;

#[derive(Debug, Default)]
struct State {
    files: BTreeMap<PathBuf, Vec<u8>>,
    dirs: BTreeSet<PathBuf>,
    symlinks: BTreeSet<PathBuf>,
    /// Remaining injected write failures per path
    failing_writes: BTreeMap<PathBuf, usize>,
    link_status_disabled: bool,
}

/// In-memory [`Storage`] for tests
///
/// Supports marking paths as symlinks, turning link-status reporting off, and
/// failing writes to a given path. Paths are normalized lexically, so
/// `.marvai/../x` and `x` are the same file.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    state: Mutex<State>,
}

fn key(path: &Path) -> PathBuf {
    clean_path(path)
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("{} does not exist", path.display()),
    )
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Seed a file without going through failure injection
    pub fn insert(&self, path: impl AsRef<Path>, data: impl Into<Vec<u8>>) {
        let mut state = self.state();
        let path = key(path.as_ref());
        register_parents(&mut state, &path);
        state.files.insert(path, data.into());
    }

    /// Make `path` report as a symbolic link
    pub fn mark_symlink(&self, path: impl AsRef<Path>) {
        self.state().symlinks.insert(key(path.as_ref()));
    }

    /// Simulate a backend that cannot report link status
    pub fn disable_link_status(&self) {
        self.state().link_status_disabled = true;
    }

    /// The next write to `path` fails with a permission error
    pub fn fail_next_write(&self, path: impl AsRef<Path>) {
        self.fail_writes(path, 1);
    }

    /// The next `count` writes to `path` fail with a permission error
    pub fn fail_writes(&self, path: impl AsRef<Path>, count: usize) {
        let mut state = self.state();
        let path = key(path.as_ref());
        if count == 0 {
            state.failing_writes.remove(&path);
        } else {
            state.failing_writes.insert(path, count);
        }
    }

    pub fn contents(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        self.state().files.get(&key(path.as_ref())).cloned()
    }
}

fn register_parents(state: &mut State, path: &Path) {
    let mut parent = path.parent();
    while let Some(dir) = parent {
        if dir.as_os_str().is_empty() {
            break;
        }
        state.dirs.insert(dir.to_path_buf());
        parent = dir.parent();
    }
}

impl Storage for MemoryStorage {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.state()
            .files
            .get(&key(path))
            .cloned()
            .ok_or_else(|| not_found(path))
    }

    fn write(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        let mut state = self.state();
        let path_key = key(path);
        if let Some(remaining) = state.failing_writes.get_mut(&path_key) {
            *remaining -= 1;
            if *remaining == 0 {
                state.failing_writes.remove(&path_key);
            }
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("injected write failure for {}", path.display()),
            ));
        }
        register_parents(&mut state, &path_key);
        state.files.insert(path_key, data.to_vec());
        Ok(())
    }

    fn append(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        let mut state = self.state();
        let path_key = key(path);
        register_parents(&mut state, &path_key);
        state
            .files
            .entry(path_key)
            .or_default()
            .extend_from_slice(data);
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        let state = self.state();
        let path = key(path);
        path.as_os_str().is_empty()
            || state.files.contains_key(&path)
            || state.dirs.contains(&path)
            || state.symlinks.contains(&path)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        let mut state = self.state();
        let path_key = key(path);
        state.symlinks.remove(&path_key);
        state
            .files
            .remove(&path_key)
            .map(|_| ())
            .ok_or_else(|| not_found(path))
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        let mut state = self.state();
        let path_key = key(path);
        if state.files.contains_key(&path_key) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} is a file", path.display()),
            ));
        }
        register_parents(&mut state, &path_key);
        if !path_key.as_os_str().is_empty() {
            state.dirs.insert(path_key);
        }
        Ok(())
    }

    fn list_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        let state = self.state();
        let dir = key(path);
        if !dir.as_os_str().is_empty() && !state.dirs.contains(&dir) {
            return Err(not_found(path));
        }

        let child_name = |p: &PathBuf| -> Option<String> {
            (p.parent() == Some(dir.as_path()))
                .then(|| p.file_name().map(|n| n.to_string_lossy().into_owned()))
                .flatten()
        };

        let mut entries: Vec<DirEntry> = state
            .files
            .keys()
            .filter_map(|p| child_name(p).map(|name| DirEntry { name, is_dir: false }))
            .chain(
                state
                    .dirs
                    .iter()
                    .filter_map(|p| child_name(p).map(|name| DirEntry { name, is_dir: true })),
            )
            .collect();
        entries.sort();
        Ok(entries)
    }

    fn is_dir(&self, path: &Path) -> bool {
        let path = key(path);
        path.as_os_str().is_empty() || self.state().dirs.contains(&path)
    }

    fn link_status(&self, path: &Path) -> io::Result<Option<bool>> {
        let state = self.state();
        if state.link_status_disabled {
            return Ok(None);
        }
        let path_key = key(path);
        if state.symlinks.contains(&path_key) {
            return Ok(Some(true));
        }
        if state.files.contains_key(&path_key) || state.dirs.contains(&path_key) {
            return Ok(Some(false));
        }
        Err(not_found(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_injected_write_failure_fires_once() {
        let storage = MemoryStorage::new();
        storage.insert(".marvai/a.mprompt", "old");
        storage.fail_next_write(".marvai/a.mprompt");

        let err = storage
            .write(Path::new(".marvai/a.mprompt"), b"new")
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
        assert_eq!(storage.contents(".marvai/a.mprompt").unwrap(), b"old");

        storage
            .write(Path::new("./.marvai/a.mprompt"), b"new")
            .unwrap();
        assert_eq!(storage.contents(".marvai/a.mprompt").unwrap(), b"new");
    }

    #[test]
    fn test_injected_write_failures_count_down() {
        let storage = MemoryStorage::new();
        storage.fail_writes(".marvai/a.mprompt", 2);

        assert!(storage.write(Path::new(".marvai/a.mprompt"), b"1").is_err());
        assert!(storage
            .copy(Path::new(".marvai/missing"), Path::new(".marvai/a.mprompt"))
            .is_err());
        storage.insert(".marvai/b.mprompt", "2");
        assert!(storage
            .copy(Path::new(".marvai/b.mprompt"), Path::new(".marvai/a.mprompt"))
            .is_err());
        storage
            .write(Path::new(".marvai/a.mprompt"), b"3")
            .unwrap();
        assert_eq!(storage.contents(".marvai/a.mprompt").unwrap(), b"3");
    }

    #[test]
    fn test_parent_components_are_folded() {
        let storage = MemoryStorage::new();
        storage.insert("secret.mprompt", "x");

        assert!(storage.exists(Path::new(".marvai/../secret.mprompt")));
        assert_eq!(
            storage.read(Path::new("./.marvai/../secret.mprompt")).unwrap(),
            b"x"
        );
        assert!(!storage.exists(Path::new(".marvai/secret.mprompt")));
    }

    #[test]
    fn test_link_status_switch() {
        let storage = MemoryStorage::new();
        storage.insert(".marvai/a.var", "x: y\n");
        storage.mark_symlink(".marvai/a.var");
        assert_eq!(
            storage.link_status(Path::new(".marvai/a.var")).unwrap(),
            Some(true)
        );

        storage.disable_link_status();
        assert_eq!(
            storage.link_status(Path::new(".marvai/a.var")).unwrap(),
            None
        );
    }
}
