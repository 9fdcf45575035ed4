use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// String values under string keys, shared with whoever drains the queue.
///
/// `update` is the only way to change a value: read, transform and write of a
/// single key happen as one step, so concurrent callers cannot lose updates.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Replaces the value under `key` with `f(current)`. Nothing is written if `f` fails.
    fn update(
        &self,
        key: &str,
        f: &mut dyn FnMut(Option<&str>) -> StoreResult<String>,
    ) -> StoreResult<()>;
}

/// A JSON object of key → string persisted in a single file.
///
/// Writes go to a sibling temp file that is renamed over the original, so
/// readers see either the old or the new contents. A missing file reads as an
/// empty store. A file that is not a JSON object is moved aside to
/// `<name>.corrupt` and the store starts empty.
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn open(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    fn load(&self) -> StoreResult<BTreeMap<String, String>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str(&content) {
            Ok(values) => Ok(values),
            Err(e) => {
                let aside = sibling_path(&self.path, ".corrupt");
                match std::fs::rename(&self.path, &aside) {
                    Ok(()) => warn!(
                        "Store file {} is corrupt, moved to {} and starting empty: {e}",
                        self.path.display(),
                        aside.display()
                    ),
                    Err(rename_err) => warn!(
                        "Store file {} is corrupt ({e}) and could not be moved aside: {rename_err}",
                        self.path.display()
                    ),
                }
                Ok(BTreeMap::new())
            }
        }
    }

    fn save(&self, values: &BTreeMap<String, String>) -> StoreResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(values)?;
        let tmp = sibling_path(&self.path, ".tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        Ok(self.load()?.remove(key))
    }

    fn update(
        &self,
        key: &str,
        f: &mut dyn FnMut(Option<&str>) -> StoreResult<String>,
    ) -> StoreResult<()> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut values = self.load()?;
        let next = f(values.get(key).map(String::as_str))?;
        values.insert(key.to_string(), next);
        self.save(&values)
    }
}

/// `store.json` + `.tmp` → `store.json.tmp`
fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(suffix);
    path.with_file_name(name)
}

/// In-memory store for tests.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<std::collections::HashMap<String, String>>,
    /// When set, every `update` fails with an I/O error and writes nothing.
    pub fail_writes: std::sync::atomic::AtomicBool,
}

#[cfg(test)]
impl MemoryStore {
    pub fn with_value(key: &str, value: &str) -> Self {
        let store = Self::default();
        store
            .values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        store
    }
}

#[cfg(test)]
impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.values.lock().unwrap().get(key).cloned())
    }

    fn update(
        &self,
        key: &str,
        f: &mut dyn FnMut(Option<&str>) -> StoreResult<String>,
    ) -> StoreResult<()> {
        if self.fail_writes.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::other("disk full")));
        }
        let mut values = self.values.lock().unwrap();
        let next = f(values.get(key).map(String::as_str))?;
        values.insert(key.to_string(), next);
        Ok(())
    }
}
