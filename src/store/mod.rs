//! Durable storage behind the key-value capability.

mod file;
mod memory;

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub use file::FileStore;
pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store I/O failed at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Store file '{path}' is corrupt: {message}")]
    Corrupt { path: PathBuf, message: String },

    #[error("Store '{path}' is locked by another holder (waited {waited:?})")]
    Locked { path: PathBuf, waited: Duration },
}

/// String-keyed byte storage.
///
/// Implementations use interior mutability; the key-value resolver calls
/// them from the dispatch task only.
pub trait KeyValueStore: Send + 'static {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Store `value`, returning the value it replaced.
    fn set(&self, key: &str, value: Vec<u8>) -> Result<Option<Vec<u8>>, StoreError>;

    /// Remove `key`, returning the value it held.
    fn delete(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.get(key)?.is_some())
    }

    /// All keys starting with `prefix`, sorted.
    fn keys(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}
