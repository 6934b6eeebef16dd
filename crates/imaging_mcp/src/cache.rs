use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use image::DynamicImage;

use crate::error::{Result, ToolError};

/// Keyed store of intermediate results shared by every tool and transport.
///
/// Values are held behind `Arc`, so a reader keeps its handle alive while the
/// entry is replaced or removed; the cache releases its own reference on
/// `put` over an existing key, `remove` and `clear`. Lookups take the read
/// lock, structural changes the write lock.
#[derive(Debug)]
pub struct ResultCache<V> {
    entries: RwLock<HashMap<String, Arc<V>>>,
}

pub type ImageCache = ResultCache<DynamicImage>;
pub type TextCache = ResultCache<String>;

impl<V> Default for ResultCache<V> {
    fn default() -> Self {
        Self { entries: RwLock::new(HashMap::new()) }
    }
}

impl<V> ResultCache<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key`, releasing whatever was there before
    pub fn put(&self, key: &str, value: V) -> Result<()> {
        self.put_shared(key, Arc::new(value))
    }

    pub fn put_shared(&self, key: &str, value: Arc<V>) -> Result<()> {
        if key.trim().is_empty() {
            return Err(ToolError::invalid("Cache key must not be empty"));
        }
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = entries.remove(key) {
            tracing::debug!("Replacing cached entry '{}'", key);
            drop(previous);
        }
        entries.insert(key.to_string(), value);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<Arc<V>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(key).cloned()
    }

    /// Like [`get`](Self::get), for callers that expect the key to be present
    pub fn require(&self, key: &str) -> Result<Arc<V>> {
        self.get(key).ok_or_else(|| ToolError::CacheMiss(key.to_string()))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.contains_key(key)
    }

    pub fn remove(&self, key: &str) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key).is_some()
    }

    /// Release every entry, returning how many there were
    pub fn clear(&self) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let count = entries.len();
        entries.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn keys(&self) -> Vec<String> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let mut keys: Vec<String> = entries.keys().cloned().collect();
        keys.sort();
        keys
    }
}
