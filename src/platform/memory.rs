use super::PlatformProxyAdapter;
use crate::models::ProxySettings;
use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Host state kept in-process.
///
/// Used by tests and by embedders that send all traffic through the core's own
/// HTTP client, which reads the current settings from here.
pub struct MemoryProxyAdapter {
    current: Mutex<Option<ProxySettings>>,
    history: Mutex<Vec<ProxySettings>>,
    applies: AtomicUsize,
    clears: AtomicUsize,
    fail_apply: AtomicBool,
    fail_clear: AtomicBool,
    permission: AtomicBool,
}

impl Default for MemoryProxyAdapter {
    fn default() -> Self {
        Self {
            current: Mutex::new(None),
            history: Mutex::new(Vec::new()),
            applies: AtomicUsize::new(0),
            clears: AtomicUsize::new(0),
            fail_apply: AtomicBool::new(false),
            fail_clear: AtomicBool::new(false),
            permission: AtomicBool::new(true),
        }
    }
}

impl MemoryProxyAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with `settings` already in effect.
    pub fn with_settings(settings: ProxySettings) -> Self {
        let adapter = Self::default();
        if let Ok(mut current) = adapter.current.lock() {
            *current = Some(settings);
        }
        adapter
    }

    pub fn settings(&self) -> Option<ProxySettings> {
        self.current.lock().ok()?.clone()
    }

    /// Every configuration passed to `apply`, oldest first.
    pub fn history(&self) -> Vec<ProxySettings> {
        self.history
            .lock()
            .map(|h| h.clone())
            .unwrap_or_default()
    }

    pub fn apply_count(&self) -> usize {
        self.applies.load(Ordering::SeqCst)
    }

    pub fn clear_count(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }

    pub fn set_fail_apply(&self, fail: bool) {
        self.fail_apply.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_clear(&self, fail: bool) {
        self.fail_clear.store(fail, Ordering::SeqCst);
    }

    pub fn set_permission(&self, granted: bool) {
        self.permission.store(granted, Ordering::SeqCst);
    }

    fn store(&self, settings: Option<ProxySettings>) -> Result<()> {
        let mut current = self
            .current
            .lock()
            .map_err(|e| anyhow!("adapter lock poisoned: {}", e))?;
        *current = settings;
        Ok(())
    }
}

impl PlatformProxyAdapter for MemoryProxyAdapter {
    fn apply(&self, settings: &ProxySettings) -> Result<()> {
        if self.fail_apply.load(Ordering::SeqCst) {
            return Err(anyhow!("host rejected proxy settings"));
        }
        self.store(Some(settings.clone()))?;
        if let Ok(mut history) = self.history.lock() {
            history.push(settings.clone());
        }
        self.applies.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn current(&self) -> Result<Option<ProxySettings>> {
        let current = self
            .current
            .lock()
            .map_err(|e| anyhow!("adapter lock poisoned: {}", e))?;
        Ok(current.clone())
    }

    fn clear(&self) -> Result<()> {
        if self.fail_clear.load(Ordering::SeqCst) {
            return Err(anyhow!("host refused to clear proxy settings"));
        }
        self.store(None)?;
        self.clears.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn has_proxy_permission(&self) -> Result<bool> {
        Ok(self.permission.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_and_clear_track_host_state() {
        let adapter = MemoryProxyAdapter::new();
        adapter.apply(&ProxySettings::System).unwrap();
        assert_eq!(adapter.settings(), Some(ProxySettings::System));
        assert_eq!(adapter.apply_count(), 1);

        adapter.clear().unwrap();
        assert_eq!(adapter.settings(), None);
        assert_eq!(adapter.clear_count(), 1);
        assert_eq!(adapter.history(), vec![ProxySettings::System]);
    }

    #[test]
    fn failures_leave_state_untouched() {
        let adapter = MemoryProxyAdapter::with_settings(ProxySettings::Direct);
        adapter.set_fail_apply(true);
        assert!(adapter.apply(&ProxySettings::System).is_err());
        assert_eq!(adapter.settings(), Some(ProxySettings::Direct));
        assert_eq!(adapter.apply_count(), 0);
    }
}
