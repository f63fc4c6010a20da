use super::PlatformProxyAdapter;
use crate::models::ProxySettings;
use anyhow::{anyhow, Result};

pub struct NoopProxyAdapter;

impl NoopProxyAdapter {
    pub const fn new() -> Self {
        Self
    }
}

impl PlatformProxyAdapter for NoopProxyAdapter {
    fn apply(&self, _settings: &ProxySettings) -> Result<()> {
        Err(anyhow!(
            "System proxy configuration unsupported on this platform"
        ))
    }

    fn current(&self) -> Result<Option<ProxySettings>> {
        Ok(None)
    }

    fn clear(&self) -> Result<()> {
        Err(anyhow!(
            "System proxy configuration unsupported on this platform"
        ))
    }

    fn has_proxy_permission(&self) -> Result<bool> {
        Ok(false)
    }
}
