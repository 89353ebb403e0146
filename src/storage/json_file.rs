use anyhow::{Context, Result};
use log::warn;
use std::{collections::BTreeMap, fs, path::PathBuf, sync::Mutex};

use super::{lock, KeyValueStore};

/// All keys in one pretty-printed JSON object, rewritten on every change.
pub struct JsonFileStore {
    path: PathBuf,
    data: Mutex<BTreeMap<String, String>>,
}

impl JsonFileStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create store directory {}", parent.display())
            })?;
        }

        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read store from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!("Store {} is corrupt, starting empty: {err}", path.display());
                BTreeMap::new()
            })
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    fn persist(&self, data: &BTreeMap<String, String>) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write store to {}", self.path.display()))
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(lock(&self.data).get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut guard = lock(&self.data);
        guard.insert(key.to_string(), value.to_string());
        self.persist(&guard)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut guard = lock(&self.data);
        if guard.remove(key).is_some() {
            self.persist(&guard)?;
        }
        Ok(())
    }
}
