//! Settings persistence collaborator
//!
//! BPM overrides and user preferences outlive the session; persistence is
//! delegated to an external key-value store (cookies, localStorage, a
//! database - the engine does not care which).

use std::collections::HashMap;
use std::sync::Mutex;

/// External key-value settings store
pub trait SettingsStore: Send + Sync {
    /// Read a stored value
    fn get(&self, key: &str) -> Option<String>;

    /// Write (or overwrite) a value
    fn set(&self, key: &str, value: &str);
}

/// In-memory store, used when no external store is wired and in tests
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }
}
