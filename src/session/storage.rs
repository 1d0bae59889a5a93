//! Client-local durable storage for the bearer token.
//! The token is the only state that survives a restart, kept under [`TOKEN_KEY`].

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

/// Well-known storage key for the persisted bearer token.
pub const TOKEN_KEY: &str = "access_token";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage io error at {path}: {source}")]
    Io { path: PathBuf, #[source] source: std::io::Error },
    #[error("storage file {path} is corrupt: {source}")]
    Corrupt { path: PathBuf, #[source] source: serde_json::Error },
}

/// Key/value storage with browser `localStorage` semantics.
pub trait TokenStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// A change to a storage key made by someone other than the observing session,
/// e.g. another tab or another CLI process logging out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    pub key: String,
    pub new_value: Option<String>,
}

impl StorageEvent {
    pub fn token_changed(new_value: Option<String>) -> Self {
        Self { key: TOKEN_KEY.to_string(), new_value }
    }
}

/// Process-local storage. Clones share the same map, which is how tests model
/// two tabs of one browser profile.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    inner: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self { Self::default() }
}

impl TokenStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.inner.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.inner.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.inner.write().remove(key);
        Ok(())
    }
}

/// JSON object file on disk, one entry per key. Writes go through a temp file and
/// a rename so a concurrent reader never sees a half-written document.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
    lock: Arc<RwLock<()>>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), lock: Arc::new(RwLock::new(())) }
    }

    pub fn path(&self) -> &Path { &self.path }

    fn io_err(&self, source: std::io::Error) -> StorageError {
        StorageError::Io { path: self.path.clone(), source }
    }

    fn read_map(&self) -> Result<HashMap<String, String>, StorageError> {
        let bytes = match std::fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => return Err(self.io_err(e)),
        };
        if bytes.iter().all(|b| b.is_ascii_whitespace()) { return Ok(HashMap::new()); }
        serde_json::from_slice(&bytes).map_err(|source| StorageError::Corrupt { path: self.path.clone(), source })
    }

    /// Each write goes through its own temp file in the target directory, so
    /// concurrent writers in other processes never share a staging file.
    fn write_map(&self, map: &HashMap<String, String>) -> Result<(), StorageError> {
        let dir = match self.path.parent() {
            Some(d) if !d.as_os_str().is_empty() => d,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir).map_err(|e| self.io_err(e))?;
        let body = serde_json::to_vec_pretty(map).map_err(|source| StorageError::Corrupt { path: self.path.clone(), source })?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| self.io_err(e))?;
        tmp.write_all(&body).map_err(|e| self.io_err(e))?;
        tmp.persist(&self.path).map_err(|e| self.io_err(e.error))?;
        Ok(())
    }
}

impl TokenStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let _g = self.lock.read();
        Ok(self.read_map()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let _g = self.lock.write();
        // A corrupt file is replaced rather than blocking every future login
        let mut map = self.read_map().unwrap_or_default();
        map.insert(key.to_string(), value.to_string());
        self.write_map(&map)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let _g = self.lock.write();
        if !self.path.exists() { return Ok(()); }
        let mut map = match self.read_map() {
            Ok(m) => m,
            Err(StorageError::Corrupt { .. }) => HashMap::new(),
            Err(e) => return Err(e),
        };
        map.remove(key);
        self.write_map(&map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_clones_share_state() {
        let a = MemoryStorage::new();
        let b = a.clone();
        a.set(TOKEN_KEY, "t1").unwrap();
        assert_eq!(b.get(TOKEN_KEY).unwrap().as_deref(), Some("t1"));
        b.remove(TOKEN_KEY).unwrap();
        assert_eq!(a.get(TOKEN_KEY).unwrap(), None);
    }

    #[test]
    fn file_storage_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("storage.json");
        FileStorage::new(&path).set(TOKEN_KEY, "abc").unwrap();
        FileStorage::new(&path).set("theme", "dark").unwrap();
        let fresh = FileStorage::new(&path);
        assert_eq!(fresh.get(TOKEN_KEY).unwrap().as_deref(), Some("abc"));
        fresh.remove(TOKEN_KEY).unwrap();
        assert_eq!(FileStorage::new(&path).get(TOKEN_KEY).unwrap(), None);
        assert_eq!(FileStorage::new(&path).get("theme").unwrap().as_deref(), Some("dark"));
    }

    #[test]
    fn missing_and_empty_files_read_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        let fs = FileStorage::new(&path);
        assert_eq!(fs.get(TOKEN_KEY).unwrap(), None);
        fs.remove(TOKEN_KEY).unwrap();
        assert!(!path.exists());
        std::fs::write(&path, "  \n").unwrap();
        assert_eq!(fs.get(TOKEN_KEY).unwrap(), None);
    }

    #[test]
    fn corrupt_file_reports_then_recovers_on_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        std::fs::write(&path, "{not json").unwrap();
        let fs = FileStorage::new(&path);
        assert!(matches!(fs.get(TOKEN_KEY), Err(StorageError::Corrupt { .. })));
        fs.remove(TOKEN_KEY).unwrap();
        assert_eq!(fs.get(TOKEN_KEY).unwrap(), None);
        fs.set(TOKEN_KEY, "new").unwrap();
        assert_eq!(fs.get(TOKEN_KEY).unwrap().as_deref(), Some("new"));
    }

    #[test]
    fn independent_writers_on_one_file_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        // separate instances have separate locks, like separate CLI processes
        let writers: Vec<_> = (0..8)
            .map(|n| {
                let fs = FileStorage::new(&path);
                std::thread::spawn(move || {
                    for i in 0..25 {
                        fs.set(TOKEN_KEY, &format!("w{}-{}", n, i))?;
                    }
                    Ok::<_, StorageError>(())
                })
            })
            .collect();
        for w in writers {
            w.join().unwrap().unwrap();
        }
        let last = FileStorage::new(&path).get(TOKEN_KEY).unwrap().unwrap();
        assert!(last.starts_with('w') && last.ends_with("-24"), "unexpected final token {}", last);
        let names: Vec<_> = std::fs::read_dir(dir.path()).unwrap().map(|e| e.unwrap().file_name()).collect();
        assert_eq!(names, vec![std::ffi::OsString::from("storage.json")]);
    }
}
