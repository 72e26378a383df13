use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::backend::StoreBackend;
use crate::error::{StoreError, StoreResult};

/// Filesystem store: one file per key under a root directory.
///
/// Each `set` writes to a temporary file in the target directory and
/// renames it into place, so a reader never observes a torn value.
#[derive(Debug)]
pub struct LocalStore {
    root: PathBuf,
    read_only: bool,
}

impl LocalStore {
    /// Create a new store at `root`. Refuses to reuse an existing path.
    pub fn create(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref();
        if root.exists() {
            return Err(StoreError::AlreadyExists(root.display().to_string()));
        }
        fs::create_dir_all(root)?;
        debug!(root = %root.display(), "created local store");
        Ok(Self {
            root: root.to_path_buf(),
            read_only: false,
        })
    }

    /// Open an existing store directory for reading and writing.
    pub fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        Self::open_with_mode(root, false)
    }

    /// Open an existing store directory without write access.
    pub fn open_read_only(root: impl AsRef<Path>) -> StoreResult<Self> {
        Self::open_with_mode(root, true)
    }

    fn open_with_mode(root: impl AsRef<Path>, read_only: bool) -> StoreResult<Self> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(StoreError::NotFound(root.display().to_string()));
        }
        Ok(Self {
            root: root.to_path_buf(),
            read_only,
        })
    }

    /// Root directory of this store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn key_path(&self, key: &str) -> StoreResult<PathBuf> {
        if key.is_empty() || key.split('/').any(|seg| seg.is_empty() || seg == "..") {
            return Err(StoreError::InvalidName(key.to_string()));
        }
        Ok(self.root.join(key))
    }

    fn check_writable(&self) -> StoreResult<()> {
        if self.read_only {
            return Err(StoreError::ReadOnly);
        }
        Ok(())
    }

    fn relative_key(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<&str> = rel
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect::<Option<_>>()?;
        Some(parts.join("/"))
    }
}

impl StoreBackend for LocalStore {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let path = self.key_path(key)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            // A directory at a key path (a group prefix) is not a value.
            Err(_) if path.is_dir() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        self.check_writable()?;
        let path = self.key_path(key)?;
        let dir = path
            .parent()
            .ok_or_else(|| StoreError::InvalidName(key.to_string()))?;
        fs::create_dir_all(dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(value)?;
        tmp.as_file().sync_data()?;
        tmp.persist(&path).map_err(|e| StoreError::Io(e.error))?;
        Ok(())
    }

    fn delete(&self, key: &str) -> StoreResult<bool> {
        self.check_writable()?;
        let path = self.key_path(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn list_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        // Only walk the deepest directory fully named by the prefix.
        let dir_part = match prefix.rfind('/') {
            Some(idx) => &prefix[..idx],
            None => "",
        };
        let start = if dir_part.is_empty() {
            self.root.clone()
        } else {
            self.key_path(dir_part)?
        };
        if !start.is_dir() {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        for entry in WalkDir::new(&start).min_depth(1) {
            let entry = entry.map_err(|e| {
                StoreError::Io(e.into_io_error().unwrap_or_else(|| {
                    io::Error::new(io::ErrorKind::Other, "filesystem loop while listing store")
                }))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(key) = self.relative_key(entry.path()) {
                if key.starts_with(prefix) {
                    keys.push(key);
                }
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn delete_prefix(&self, prefix: &str) -> StoreResult<usize> {
        self.check_writable()?;
        let keys = self.list_prefix(prefix)?;
        for key in &keys {
            fs::remove_file(self.key_path(key)?)?;
        }
        // Drop the now-empty directory of a group prefix (`rkns/`).
        if let Some(dir) = prefix.strip_suffix('/') {
            if !dir.is_empty() {
                let path = self.key_path(dir)?;
                if path.is_dir() {
                    fs::remove_dir_all(&path)?;
                }
            }
        }
        Ok(keys.len())
    }

    fn exists(&self, key: &str) -> StoreResult<bool> {
        Ok(self.key_path(key)?.is_file())
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn describe(&self) -> String {
        format!("file://{}", self.root.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (tempfile::TempDir, LocalStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::create(dir.path().join("doc.rkns")).unwrap();
        (dir, store)
    }

    #[test]
    fn create_refuses_existing_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = LocalStore::create(dir.path()).unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));
    }

    #[test]
    fn open_requires_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = LocalStore::open(dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn set_get_delete() {
        let (_dir, store) = temp_store();
        store.set("a/b/.zattrs", b"{}").unwrap();
        assert_eq!(store.get("a/b/.zattrs").unwrap().unwrap(), b"{}");
        assert!(store.exists("a/b/.zattrs").unwrap());
        assert!(store.delete("a/b/.zattrs").unwrap());
        assert!(!store.delete("a/b/.zattrs").unwrap());
        assert!(store.get("a/b/.zattrs").unwrap().is_none());
    }

    #[test]
    fn directory_key_reads_as_absent() {
        let (_dir, store) = temp_store();
        store.set("a/b/.zattrs", b"{}").unwrap();
        assert!(store.get("a/b").unwrap().is_none());
    }

    #[test]
    fn list_prefix_walks_nested_keys() {
        let (_dir, store) = temp_store();
        for key in ["rkns/.zgroup", "rkns/signals/.zgroup", "rkns_x/.zgroup", "_raw/.zgroup"] {
            store.set(key, b"{}").unwrap();
        }
        assert_eq!(
            store.list_prefix("rkns/").unwrap(),
            vec!["rkns/.zgroup", "rkns/signals/.zgroup"]
        );
        assert_eq!(store.list_prefix("").unwrap().len(), 4);
        assert!(store.list_prefix("nothing/").unwrap().is_empty());
    }

    #[test]
    fn delete_prefix_removes_directory() {
        let (_dir, store) = temp_store();
        store.set("rkns/.zgroup", b"{}").unwrap();
        store.set("rkns/signals/.zgroup", b"{}").unwrap();
        store.set("_raw/.zgroup", b"{}").unwrap();
        assert_eq!(store.delete_prefix("rkns/").unwrap(), 2);
        assert!(!store.root().join("rkns").exists());
        assert!(store.exists("_raw/.zgroup").unwrap());
    }

    #[test]
    fn rejects_escaping_keys() {
        let (_dir, store) = temp_store();
        assert!(matches!(
            store.set("../outside", b"x"),
            Err(StoreError::InvalidName(_))
        ));
        assert!(matches!(store.get("a//b"), Err(StoreError::InvalidName(_))));
    }

    #[test]
    fn read_only_refuses_writes() {
        let (_dir, store) = temp_store();
        store.set("k", b"v").unwrap();
        let ro = LocalStore::open_read_only(store.root()).unwrap();
        assert_eq!(ro.get("k").unwrap().unwrap(), b"v");
        assert!(matches!(ro.set("k", b"w"), Err(StoreError::ReadOnly)));
    }

    #[test]
    fn describe_uses_file_scheme() {
        let (_dir, store) = temp_store();
        assert!(store.describe().starts_with("file://"));
    }
}
