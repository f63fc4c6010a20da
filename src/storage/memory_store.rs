use super::KeyValueStore;
use anyhow::anyhow;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// In-process store. Reads and writes can be made to fail on demand.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Value>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(self, key: &str, value: Value) -> Self {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), value);
        }
        self
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Direct read that ignores failure injection.
    pub fn peek(&self, key: &str) -> Option<Value> {
        self.entries.lock().ok()?.get(key).cloned()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<Value>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(anyhow!("read of {key} failed"));
        }
        let guard = self
            .entries
            .lock()
            .map_err(|e| anyhow!("lock poisoned: {}", e))?;
        Ok(guard.get(key).cloned())
    }

    fn set(&self, key: &str, value: &Value) -> anyhow::Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(anyhow!("write of {key} failed"));
        }
        let mut guard = self
            .entries
            .lock()
            .map_err(|e| anyhow!("lock poisoned: {}", e))?;
        guard.insert(key.to_string(), value.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn remove(&self, key: &str) -> anyhow::Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(anyhow!("remove of {key} failed"));
        }
        let mut guard = self
            .entries
            .lock()
            .map_err(|e| anyhow!("lock poisoned: {}", e))?;
        guard.remove(key);
        Ok(())
    }
}
