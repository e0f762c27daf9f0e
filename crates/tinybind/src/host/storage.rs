use alloc::{format, string::String};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::HostError;

/// Default quota, in UTF-16 code units of keys and values
pub const DEFAULT_QUOTA: usize = 5 * 1024 * 1024;

/// A key/value store with a size quota, like `localStorage`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Storage {
    items: IndexMap<String, String>,
    #[serde(skip, default = "default_quota")]
    quota: usize,
}

fn default_quota() -> usize {
    DEFAULT_QUOTA
}

impl Default for Storage {
    fn default() -> Self {
        Self::new(DEFAULT_QUOTA)
    }
}

fn units(s: &str) -> usize {
    s.encode_utf16().count()
}

impl Storage {
    pub fn new(quota: usize) -> Self {
        Self { items: IndexMap::new(), quota }
    }

    /// Load items saved with [`Storage::to_json`]
    pub fn from_json(json: &str, quota: usize) -> crate::Result<Self> {
        let mut storage: Self = serde_json::from_str(json)?;
        storage.quota = quota;
        Ok(storage)
    }

    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The key at `index`, in insertion order
    pub fn key(&self, index: usize) -> Option<&str> {
        self.items.get_index(index).map(|(key, _)| key.as_str())
    }

    pub fn get_item(&self, key: &str) -> Option<&str> {
        self.items.get(key).map(String::as_str)
    }

    /// Store a value, failing if the store would exceed its quota
    pub fn set_item(&mut self, key: &str, value: &str) -> Result<(), HostError> {
        let current = self.items.get(key).map_or(0, |old| units(key) + units(old));
        let used = self.used() - current + units(key) + units(value);
        if used > self.quota {
            return Err(HostError::quota_exceeded(format!(
                "setting the value of '{key}' exceeded the quota of {} units",
                self.quota
            )));
        }

        self.items.insert(key.into(), value.into());
        Ok(())
    }

    pub fn remove_item(&mut self, key: &str) {
        self.items.shift_remove(key);
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Space taken by keys and values, in UTF-16 code units
    pub fn used(&self) -> usize {
        self.items.iter().map(|(key, value)| units(key) + units(value)).sum()
    }
}
