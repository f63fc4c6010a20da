//! Platform-specific adapters for host proxy configuration.

use anyhow::Result;
use std::sync::Arc;

use crate::models::ProxySettings;

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "macos")]
mod mac;
mod memory;
#[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
mod noop;
#[cfg(target_os = "windows")]
mod windows;

pub use memory::MemoryProxyAdapter;

#[cfg(target_os = "linux")]
use linux::GnomeProxyAdapter as PlatformImpl;
#[cfg(target_os = "macos")]
use mac::MacProxyAdapter as PlatformImpl;
#[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
use noop::NoopProxyAdapter as PlatformImpl;
#[cfg(target_os = "windows")]
use windows::WindowsProxyAdapter as PlatformImpl;

/// Host proxy-configuration API. Calls block; run them on `spawn_blocking`.
pub trait PlatformProxyAdapter: Sync + Send {
    fn apply(&self, settings: &ProxySettings) -> Result<()>;
    /// Settings currently in effect, or `None` when the host reports nothing readable.
    fn current(&self) -> Result<Option<ProxySettings>>;
    /// Reset to the host's default mode.
    fn clear(&self) -> Result<()>;
    fn has_proxy_permission(&self) -> Result<bool>;
}

/// Adapter for the platform this build targets.
pub fn default_adapter() -> Arc<dyn PlatformProxyAdapter> {
    Arc::new(PlatformImpl::new())
}

/// Location of the PAC file handed to hosts that only accept a URL.
#[cfg(any(target_os = "macos", target_os = "linux"))]
fn pac_file_path() -> std::path::PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("proxymanager")
        .join("proxy.pac")
}

#[cfg(any(target_os = "macos", target_os = "linux"))]
fn write_pac_file(script: &crate::models::PacScript) -> Result<String> {
    use anyhow::Context;

    let path = pac_file_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating PAC directory {:?}", parent))?;
    }
    std::fs::write(&path, &script.data).with_context(|| format!("writing PAC file {:?}", path))?;
    Ok(format!("file://{}", path.display()))
}

/// Read back a PAC file this process wrote, if `url` points at it.
#[cfg(any(target_os = "macos", target_os = "linux"))]
fn read_pac_file(url: &str) -> Option<crate::models::PacScript> {
    let path = pac_file_path();
    if url.trim() != format!("file://{}", path.display()) {
        return None;
    }
    std::fs::read_to_string(&path)
        .ok()
        .map(|data| crate::models::PacScript { data })
}
