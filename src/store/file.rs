//! JSON-file store with advisory locking.
//!
//! The whole store is one document `{ "version": 1, "entries": { key: base64 } }`.
//! Readers take a shared lock and writers an exclusive lock on a sidecar
//! `.lock` file, so several processes may share one store. Locks are polled
//! for at most the configured timeout; a store held elsewhere for longer
//! fails the operation instead of blocking the caller. Writes go to a
//! temporary file that is renamed over the document.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use fs2::FileExt;
use serde::{Deserialize, Serialize};

use super::{KeyValueStore, StoreError};

const FORMAT_VERSION: u32 = 1;
const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(500);
const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(5);

#[derive(Debug, Clone, Copy)]
enum LockMode {
    Shared,
    Exclusive,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Document {
    version: u32,
    entries: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
    lock_path: PathBuf,
    lock_timeout: Duration,
}

impl FileStore {
    /// Open a store at `path`. The file is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut lock_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        lock_name.push(".lock");
        let lock_path = path.with_file_name(lock_name);
        Self {
            path,
            lock_path,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    /// Bound how long an operation waits for another holder of the lock.
    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn open_lock(&self) -> Result<File, StoreError> {
        OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.lock_path)
            .map_err(|e| self.io_error(e))
    }

    fn create_parent(&self) -> Result<(), StoreError> {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                fs::create_dir_all(parent).map_err(|e| self.io_error(e))
            }
            _ => Ok(()),
        }
    }

    /// Poll for the lock until it is granted or the timeout passes.
    fn acquire(&self, lock: &File, mode: LockMode) -> Result<(), StoreError> {
        let deadline = Instant::now() + self.lock_timeout;
        loop {
            let attempt = match mode {
                LockMode::Shared => FileExt::try_lock_shared(lock),
                LockMode::Exclusive => FileExt::try_lock_exclusive(lock),
            };
            match attempt {
                Ok(()) => return Ok(()),
                Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                    if Instant::now() >= deadline {
                        return Err(StoreError::Locked {
                            path: self.path.clone(),
                            waited: self.lock_timeout,
                        });
                    }
                    std::thread::sleep(LOCK_RETRY_INTERVAL);
                }
                Err(e) => return Err(self.io_error(e)),
            }
        }
    }

    fn read_document(&self) -> Result<BTreeMap<String, Vec<u8>>, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(self.io_error(e)),
        };

        let document: Document =
            serde_json::from_str(&content).map_err(|e| StoreError::Corrupt {
                path: self.path.clone(),
                message: e.to_string(),
            })?;

        if document.version != FORMAT_VERSION {
            return Err(StoreError::Corrupt {
                path: self.path.clone(),
                message: format!("unsupported format version {}", document.version),
            });
        }

        document
            .entries
            .into_iter()
            .map(|(key, encoded)| {
                STANDARD
                    .decode(encoded.as_bytes())
                    .map(|bytes| (key.clone(), bytes))
                    .map_err(|e| StoreError::Corrupt {
                        path: self.path.clone(),
                        message: format!("value for '{}' is not base64: {}", key, e),
                    })
            })
            .collect()
    }

    fn write_document(&self, entries: &BTreeMap<String, Vec<u8>>) -> Result<(), StoreError> {
        let document = Document {
            version: FORMAT_VERSION,
            entries: entries
                .iter()
                .map(|(key, value)| (key.clone(), STANDARD.encode(value)))
                .collect(),
        };
        let json = serde_json::to_vec_pretty(&document).map_err(|e| StoreError::Corrupt {
            path: self.path.clone(),
            message: e.to_string(),
        })?;

        let tmp_path = self
            .path
            .with_extension(format!("tmp-{}", uuid::Uuid::new_v4()));
        // Removes the temp file unless the rename below consumed it.
        let tmp_guard = scopeguard::guard(tmp_path, |path| {
            let _ = fs::remove_file(path);
        });

        let mut file = File::create(&*tmp_guard).map_err(|e| self.io_error(e))?;
        file.write_all(&json).map_err(|e| self.io_error(e))?;
        file.sync_all().map_err(|e| self.io_error(e))?;
        drop(file);

        let tmp_path = scopeguard::ScopeGuard::into_inner(tmp_guard);
        if let Err(e) = fs::rename(&tmp_path, &self.path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(self.io_error(e));
        }
        Ok(())
    }

    fn read<T>(
        &self,
        f: impl FnOnce(&BTreeMap<String, Vec<u8>>) -> T,
    ) -> Result<T, StoreError> {
        // An absent store reads as empty without touching the filesystem.
        if !self.path.exists() {
            return Ok(f(&BTreeMap::new()));
        }

        let lock = self.open_lock()?;
        self.acquire(&lock, LockMode::Shared)?;
        let result = self.read_document().map(|entries| f(&entries));
        let _ = FileExt::unlock(&lock);
        result
    }

    fn update<T>(
        &self,
        f: impl FnOnce(&mut BTreeMap<String, Vec<u8>>) -> T,
    ) -> Result<T, StoreError> {
        self.create_parent()?;
        let lock = self.open_lock()?;
        self.acquire(&lock, LockMode::Exclusive)?;
        let result = self.read_document().and_then(|mut entries| {
            let value = f(&mut entries);
            self.write_document(&entries).map(|_| value)
        });
        let _ = FileExt::unlock(&lock);
        result
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.read(|entries| entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: Vec<u8>) -> Result<Option<Vec<u8>>, StoreError> {
        self.update(|entries| entries.insert(key.to_string(), value))
    }

    fn delete(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.update(|entries| entries.remove(key))
    }

    fn exists(&self, key: &str) -> Result<bool, StoreError> {
        self.read(|entries| entries.contains_key(key))
    }

    fn keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        self.read(|entries| {
            entries
                .keys()
                .filter(|key| key.starts_with(prefix))
                .cloned()
                .collect()
        })
    }
}
