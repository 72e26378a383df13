use std::fmt;

use crate::error::StoreResult;

/// Key/value persistence under a [`Group`](crate::Group) hierarchy.
///
/// Keys are `/`-separated relative paths without a leading slash
/// (`rkns/signals/.zgroup`). All implementations must satisfy:
/// - `set` replaces the whole value for a key, never a partial write
///   visible to `get`.
/// - `list_prefix` returns every key starting with `prefix`, sorted.
/// - Deleting a missing key is not an error.
/// - All I/O errors are propagated, never silently ignored.
pub trait StoreBackend: Send + Sync + fmt::Debug {
    /// Read the value stored under `key`, or `None` if absent.
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &[u8]) -> StoreResult<()>;

    /// Delete `key`. Returns `true` if it existed.
    fn delete(&self, key: &str) -> StoreResult<bool>;

    /// All keys starting with `prefix`, sorted.
    fn list_prefix(&self, prefix: &str) -> StoreResult<Vec<String>>;

    /// Delete every key starting with `prefix`. Returns the number removed.
    ///
    /// Default implementation lists then deletes one key at a time.
    /// Backends may override with a bulk removal.
    fn delete_prefix(&self, prefix: &str) -> StoreResult<usize> {
        let keys = self.list_prefix(prefix)?;
        let mut removed = 0;
        for key in &keys {
            if self.delete(key)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Check whether `key` exists.
    fn exists(&self, key: &str) -> StoreResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Returns `true` if writes are refused.
    fn is_read_only(&self) -> bool {
        false
    }

    /// Human-readable location, for logs and error messages.
    fn describe(&self) -> String;
}
