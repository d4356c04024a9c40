//! Session Storage Backends
//!
//! String key/value slots scoped to one client session. The store keeps
//! its whole snapshot under a single key.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use super::error::{StoreError, StoreResult};

/// Key/value slot storage, in the shape of the browser's session storage
pub trait SessionStorage: Send + Sync {
    fn get_item(&self, key: &str) -> StoreResult<Option<String>>;

    fn set_item(&self, key: &str, value: &str) -> StoreResult<()>;

    fn remove_item(&self, key: &str) -> StoreResult<()>;

    /// Read-modify-write one slot; other writers of the same slot wait
    ///
    /// `update` receives the stored value (if any) and returns the value to
    /// store. It runs at most once.
    fn update_item(
        &self,
        key: &str,
        update: &mut dyn FnMut(Option<String>) -> StoreResult<String>,
    ) -> StoreResult<()>;
}

/// Process-local storage, gone when the process exits
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: Mutex<HashMap<String, String>>,
    /// Largest value accepted, to mimic a storage quota
    quota_bytes: Option<usize>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            items: Mutex::new(HashMap::new()),
            quota_bytes: Some(quota_bytes),
        }
    }

    fn check_quota(&self, key: &str, value: &str) -> StoreResult<()> {
        match self.quota_bytes {
            Some(quota) if value.len() > quota => Err(StoreError::QuotaExceeded(key.to_string())),
            _ => Ok(()),
        }
    }
}

impl SessionStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> StoreResult<Option<String>> {
        let items = self
            .items
            .lock()
            .map_err(|e| StoreError::Lock(e.to_string()))?;
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> StoreResult<()> {
        self.check_quota(key, value)?;

        let mut items = self
            .items
            .lock()
            .map_err(|e| StoreError::Lock(e.to_string()))?;
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> StoreResult<()> {
        let mut items = self
            .items
            .lock()
            .map_err(|e| StoreError::Lock(e.to_string()))?;
        items.remove(key);
        Ok(())
    }

    fn update_item(
        &self,
        key: &str,
        update: &mut dyn FnMut(Option<String>) -> StoreResult<String>,
    ) -> StoreResult<()> {
        let mut items = self
            .items
            .lock()
            .map_err(|e| StoreError::Lock(e.to_string()))?;

        let value = update(items.get(key).cloned())?;
        self.check_quota(key, &value)?;
        items.insert(key.to_string(), value);
        Ok(())
    }
}

const LOCK_TIMEOUT: Duration = Duration::from_secs(2);
const LOCK_RETRY: Duration = Duration::from_millis(5);
/// A lock file older than this was left behind by a crashed writer
const LOCK_STALE_AFTER: Duration = Duration::from_secs(10);

/// One `<key>.json` file per key inside a session directory
///
/// Several processes may share a directory. Writes take a `<key>.lock`
/// file for the duration of the write, and [`SessionStorage::update_item`]
/// holds it across the read as well.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Use `dir` as the session directory, creating it if needed
    pub fn open(dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.json", safe))
    }

    /// Take the cross-process lock for `key`, released on drop
    fn lock_slot(&self, key: &str) -> StoreResult<SlotLock> {
        let path = self.path_for(key).with_extension("lock");
        let started = Instant::now();

        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => return Ok(SlotLock { path }),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if lock_is_stale(&path) {
                        tracing::warn!(path = ?path, "Removing stale session lock");
                        let _ = std::fs::remove_file(&path);
                        continue;
                    }
                    if started.elapsed() >= LOCK_TIMEOUT {
                        return Err(StoreError::Lock(format!(
                            "timed out waiting for {}",
                            path.display()
                        )));
                    }
                    std::thread::sleep(LOCK_RETRY);
                }
                Err(source) => return Err(StoreError::Io { path, source }),
            }
        }
    }

    fn write_file(&self, path: &Path, value: &str) -> StoreResult<()> {
        let tmp = path.with_extension("json.tmp");

        // Write then rename; readers never see a torn snapshot
        std::fs::write(&tmp, value).map_err(|source| StoreError::Io {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

struct SlotLock {
    path: PathBuf,
}

impl Drop for SlotLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!(path = ?self.path, error = %e, "Failed to release session lock");
        }
    }
}

fn lock_is_stale(path: &Path) -> bool {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| modified.elapsed().ok())
        .map(|age| age > LOCK_STALE_AFTER)
        .unwrap_or(false)
}

impl SessionStorage for FileStorage {
    fn get_item(&self, key: &str) -> StoreResult<Option<String>> {
        let path = self.path_for(key);
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> StoreResult<()> {
        let _lock = self.lock_slot(key)?;
        self.write_file(&self.path_for(key), value)
    }

    fn remove_item(&self, key: &str) -> StoreResult<()> {
        let path = self.path_for(key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }

    fn update_item(
        &self,
        key: &str,
        update: &mut dyn FnMut(Option<String>) -> StoreResult<String>,
    ) -> StoreResult<()> {
        let _lock = self.lock_slot(key)?;
        let value = update(self.get_item(key)?)?;
        self.write_file(&self.path_for(key), &value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_memory_storage() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get_item("k").unwrap(), None);

        storage.set_item("k", "v").unwrap();
        assert_eq!(storage.get_item("k").unwrap().as_deref(), Some("v"));

        storage.remove_item("k").unwrap();
        assert_eq!(storage.get_item("k").unwrap(), None);
    }

    #[test]
    fn test_memory_storage_quota() {
        let storage = MemoryStorage::with_quota(4);
        assert!(storage.set_item("k", "1234").is_ok());
        assert!(matches!(
            storage.set_item("k", "12345"),
            Err(StoreError::QuotaExceeded(_))
        ));
        assert_eq!(storage.get_item("k").unwrap().as_deref(), Some("1234"));
    }

    #[test]
    fn test_file_storage_round_trip() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::open(dir.path().join("session")).unwrap();

        assert_eq!(storage.get_item("healthAppNotifs").unwrap(), None);
        storage.set_item("healthAppNotifs", "{}").unwrap();
        assert_eq!(
            storage.get_item("healthAppNotifs").unwrap().as_deref(),
            Some("{}")
        );
        assert!(dir.path().join("session/healthAppNotifs.json").exists());

        storage.remove_item("healthAppNotifs").unwrap();
        storage.remove_item("healthAppNotifs").unwrap();
        assert_eq!(storage.get_item("healthAppNotifs").unwrap(), None);
    }

    #[test]
    fn test_file_storage_sanitizes_keys() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::open(dir.path()).unwrap();
        storage.set_item("../escape", "x").unwrap();
        assert!(dir.path().join("___escape.json").exists());
    }

    #[test]
    fn test_memory_update_item() {
        let storage = MemoryStorage::with_quota(8);
        storage
            .update_item("k", &mut |current| {
                assert_eq!(current, None);
                Ok("a".to_string())
            })
            .unwrap();
        storage
            .update_item("k", &mut |current| Ok(format!("{}b", current.unwrap_or_default())))
            .unwrap();
        assert_eq!(storage.get_item("k").unwrap().as_deref(), Some("ab"));

        let result = storage.update_item("k", &mut |_| Ok("too long for quota".to_string()));
        assert!(matches!(result, Err(StoreError::QuotaExceeded(_))));
        assert_eq!(storage.get_item("k").unwrap().as_deref(), Some("ab"));
    }

    #[test]
    fn test_file_update_item_releases_lock() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::open(dir.path()).unwrap();

        storage.update_item("k", &mut |_| Ok("1".to_string())).unwrap();
        let result = storage.update_item("k", &mut |_| {
            Err(StoreError::Serialization("bad".to_string()))
        });
        assert!(result.is_err());

        assert!(!dir.path().join("k.lock").exists());
        assert_eq!(storage.get_item("k").unwrap().as_deref(), Some("1"));
    }

    #[test]
    fn test_concurrent_file_updates_are_not_lost() {
        let dir = tempdir().unwrap();
        let writers: Vec<_> = (0..4)
            .map(|_| {
                let storage = FileStorage::open(dir.path()).unwrap();
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        storage
                            .update_item("counter", &mut |current| {
                                let n: u32 = current.as_deref().unwrap_or("0").parse().unwrap();
                                Ok((n + 1).to_string())
                            })
                            .unwrap();
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        let storage = FileStorage::open(dir.path()).unwrap();
        assert_eq!(storage.get_item("counter").unwrap().as_deref(), Some("100"));
    }

    #[test]
    fn test_stale_lock_is_broken() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::open(dir.path()).unwrap();
        let lock = std::fs::File::create(dir.path().join("k.lock")).unwrap();
        lock.set_modified(std::time::SystemTime::now() - Duration::from_secs(60))
            .unwrap();
        drop(lock);

        storage.set_item("k", "v").unwrap();
        assert_eq!(storage.get_item("k").unwrap().as_deref(), Some("v"));
    }
}
