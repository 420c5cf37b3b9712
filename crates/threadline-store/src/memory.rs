use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;

use crate::Storage;

/// Process-local storage. Nothing survives a restart; used by tests and by
/// callers that opt out of persistence.
#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_entries<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut HashMap<String, String>) -> T,
    {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| anyhow::anyhow!("Storage lock poisoned: {}", e))?;
        Ok(f(&mut entries))
    }

    /// Sorted list of stored keys.
    pub fn keys(&self) -> Result<Vec<String>> {
        let mut keys = self.with_entries(|entries| entries.keys().cloned().collect::<Vec<_>>())?;
        keys.sort();
        Ok(keys)
    }

    pub fn is_empty(&self) -> Result<bool> {
        self.with_entries(|entries| entries.is_empty())
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.with_entries(|entries| entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.with_entries(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.with_entries(|entries| {
            entries.remove(key);
        })
    }
}
