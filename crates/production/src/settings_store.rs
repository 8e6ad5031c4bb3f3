//! File-backed settings store.

use keypool_core::{SettingsStore, StoreError};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// [`SettingsStore`] persisted as a JSON object.
///
/// Every write rewrites the whole file through a temp file in the same
/// directory followed by a rename, so readers never observe a torn file.
#[derive(Debug)]
pub struct FileSettingsStore {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl FileSettingsStore {
    /// Open `path`, starting empty if it does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let values = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw)
                .map_err(|e| StoreError::Encoding(format!("{}: {e}", path.display())))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "No persisted settings, starting fresh");
                BTreeMap::new()
            }
            Err(e) => return Err(StoreError::Io(format!("{}: {e}", path.display()))),
        };

        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_file(&self, values: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let encoded = serde_json::to_vec_pretty(values)
            .map_err(|e| StoreError::Encoding(e.to_string()))?;
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut file =
            tempfile::NamedTempFile::new_in(parent).map_err(|e| StoreError::Io(e.to_string()))?;
        file.write_all(&encoded)
            .map_err(|e| StoreError::Io(e.to_string()))?;
        file.as_file()
            .sync_all()
            .map_err(|e| StoreError::Io(e.to_string()))?;
        file.persist(&self.path)
            .map_err(|e| StoreError::Io(e.to_string()))?;

        debug!(path = %self.path.display(), keys = values.len(), "Persisted settings");
        Ok(())
    }
}

impl SettingsStore for FileSettingsStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }

    fn put(&self, key: &str, value: String) -> Result<(), StoreError> {
        let mut values = self.values.lock();
        let mut next = values.clone();
        next.insert(key.to_string(), value);
        self.write_file(&next)?;
        *values = next;
        Ok(())
    }

    fn put_many(&self, entries: &[(&str, String)]) -> Result<(), StoreError> {
        let mut values = self.values.lock();
        let mut next = values.clone();
        for (key, value) in entries {
            next.insert(key.to_string(), value.clone());
        }
        self.write_file(&next)?;
        *values = next;
        Ok(())
    }

    fn remove(&self, keys: &[&str]) -> Result<(), StoreError> {
        let mut values = self.values.lock();
        if !keys.iter().any(|key| values.contains_key(*key)) {
            return Ok(());
        }
        let mut next = values.clone();
        for key in keys {
            next.remove(*key);
        }
        self.write_file(&next)?;
        *values = next;
        Ok(())
    }
}
