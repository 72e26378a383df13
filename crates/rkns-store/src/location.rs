use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use crate::backend::StoreBackend;
use crate::error::{StoreError, StoreResult};
use crate::local::LocalStore;
use crate::memory::InMemoryStore;

/// Where a store lives.
///
/// Parsed from `memory://`, `file://<path>`, or a bare filesystem path.
/// Any other `scheme://` is refused with
/// [`StoreError::UnsupportedLocation`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreLocation {
    Memory,
    Local(PathBuf),
}

impl StoreLocation {
    /// Create a fresh store at this location. Local paths must not exist.
    pub fn create(&self) -> StoreResult<Arc<dyn StoreBackend>> {
        match self {
            Self::Memory => Ok(Arc::new(InMemoryStore::new())),
            Self::Local(path) => Ok(Arc::new(LocalStore::create(path)?)),
        }
    }

    /// Open an existing store at this location.
    ///
    /// A memory location has nothing to reopen; it yields an empty store.
    pub fn open(&self, read_only: bool) -> StoreResult<Arc<dyn StoreBackend>> {
        match self {
            Self::Memory => Ok(Arc::new(InMemoryStore::new())),
            Self::Local(path) if read_only => Ok(Arc::new(LocalStore::open_read_only(path)?)),
            Self::Local(path) => Ok(Arc::new(LocalStore::open(path)?)),
        }
    }

    /// The filesystem path, for local locations.
    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Self::Memory => None,
            Self::Local(path) => Some(path),
        }
    }
}

impl From<PathBuf> for StoreLocation {
    fn from(path: PathBuf) -> Self {
        Self::Local(path)
    }
}

impl From<&Path> for StoreLocation {
    fn from(path: &Path) -> Self {
        Self::Local(path.to_path_buf())
    }
}

impl FromStr for StoreLocation {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once("://") {
            Some(("memory" | "mem", "")) => Ok(Self::Memory),
            Some(("file", path)) if !path.is_empty() => Ok(Self::Local(PathBuf::from(path))),
            Some(_) => Err(StoreError::UnsupportedLocation(s.to_string())),
            None if s.is_empty() => Err(StoreError::UnsupportedLocation(s.to_string())),
            None => Ok(Self::Local(PathBuf::from(s))),
        }
    }
}

impl fmt::Display for StoreLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => write!(f, "memory://"),
            Self::Local(path) => write!(f, "file://{}", path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_schemes_and_bare_paths() {
        assert_eq!("memory://".parse::<StoreLocation>().unwrap(), StoreLocation::Memory);
        assert_eq!(
            "file:///tmp/a.rkns".parse::<StoreLocation>().unwrap(),
            StoreLocation::Local(PathBuf::from("/tmp/a.rkns"))
        );
        assert_eq!(
            "out/b.rkns".parse::<StoreLocation>().unwrap(),
            StoreLocation::Local(PathBuf::from("out/b.rkns"))
        );
    }

    #[test]
    fn remote_schemes_are_unsupported() {
        let err = "s3://bucket/key".parse::<StoreLocation>().unwrap_err();
        assert!(matches!(err, StoreError::UnsupportedLocation(_)));
        assert!("".parse::<StoreLocation>().is_err());
    }

    #[test]
    fn create_local_then_open() {
        let dir = tempfile::tempdir().unwrap();
        let loc = StoreLocation::from(dir.path().join("x.rkns"));
        let store = loc.create().unwrap();
        store.set("k", b"v").unwrap();
        let reopened = loc.open(true).unwrap();
        assert_eq!(reopened.get("k").unwrap().unwrap(), b"v");
        assert!(reopened.is_read_only());
    }

    #[test]
    fn display_roundtrips() {
        let loc = StoreLocation::Local(PathBuf::from("/data/x.rkns"));
        assert_eq!(loc.to_string().parse::<StoreLocation>().unwrap(), loc);
        assert_eq!(StoreLocation::Memory.to_string(), "memory://");
    }
}
