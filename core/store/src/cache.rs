//! Read-through cache of records keyed by plaintext key.

use std::collections::HashMap;

use gitkv_common::Record;

/// Records returned by earlier reads and writes.
///
/// Entries are never expired; a value written elsewhere is only seen after
/// the entry is cleared. A disabled cache stores nothing.
#[derive(Debug)]
pub struct ReadCache {
    enabled: bool,
    entries: HashMap<String, Record>,
}

impl ReadCache {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            entries: HashMap::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Turn caching on or off. Disabling drops every entry.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.entries.clear();
        }
    }

    pub fn get(&self, key: &str) -> Option<Record> {
        if !self.enabled {
            return None;
        }
        self.entries.get(key).cloned()
    }

    pub fn insert(&mut self, key: &str, record: Record) {
        if self.enabled {
            self.entries.insert(key.to_string(), record);
        }
    }

    pub fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ReadCache {
    fn default() -> Self {
        Self::new(true)
    }
}
