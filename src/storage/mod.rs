mod json_file;
mod sqlite;

pub use json_file::JsonFileStore;
pub use sqlite::SqliteStore;

use anyhow::{Context, Result};
use log::warn;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

pub const TOUR_STATE_KEY: &str = "tour-state";
pub const ANALYTICS_KEY: &str = "tour-analytics";

/// Version stamped on every persisted blob. Bump when a stored shape changes.
pub const BLOB_VERSION: u32 = 1;

/// Durable string-keyed storage for the engine's two blobs.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct Envelope<T> {
    version: u32,
    data: T,
}

/// Strict decode of a stored blob. Anything missing, unreadable, from another
/// version, or of the wrong shape yields `T::default()`.
pub fn load_or_default<T>(store: &dyn KeyValueStore, key: &str) -> T
where
    T: DeserializeOwned + Default,
{
    let raw = match store.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return T::default(),
        Err(err) => {
            warn!("Failed to read '{key}' from store, using defaults: {err:#}");
            return T::default();
        }
    };

    match serde_json::from_str::<Envelope<T>>(&raw) {
        Ok(envelope) if envelope.version == BLOB_VERSION => envelope.data,
        Ok(envelope) => {
            warn!(
                "Stored '{key}' has version {} (expected {BLOB_VERSION}), using defaults",
                envelope.version
            );
            T::default()
        }
        Err(err) => {
            warn!("Stored '{key}' is malformed, using defaults: {err}");
            T::default()
        }
    }
}

pub fn save<T: Serialize>(store: &dyn KeyValueStore, key: &str, value: &T) -> Result<()> {
    let envelope = Envelope {
        version: BLOB_VERSION,
        data: value,
    };
    let serialized = serde_json::to_string(&envelope)
        .with_context(|| format!("failed to serialize '{key}'"))?;
    store.set(key, &serialized)
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Non-durable store for tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(lock(&self.entries).get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        lock(&self.entries).insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        lock(&self.entries).remove(key);
        Ok(())
    }
}
