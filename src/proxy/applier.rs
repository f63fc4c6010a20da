//! Translate server profiles into host proxy settings and push them to the host.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::pac;
use crate::models::{ProxyServer, ProxySettings, ServerProfile};
use crate::platform::PlatformProxyAdapter;

const VERIFY_DELAY: Duration = Duration::from_secs(1);

#[derive(Clone)]
pub struct ProxyApplier {
    adapter: Arc<dyn PlatformProxyAdapter>,
    verify_delay: Duration,
}

impl ProxyApplier {
    pub fn new(adapter: Arc<dyn PlatformProxyAdapter>) -> Self {
        Self {
            adapter,
            verify_delay: VERIFY_DELAY,
        }
    }

    pub fn with_verify_delay(mut self, delay: Duration) -> Self {
        self.verify_delay = delay;
        self
    }

    /// Host configuration for `profile`. Credentials force a PAC script since
    /// fixed-server rules cannot carry them.
    pub fn settings_for(profile: &ServerProfile, dns_enabled: bool) -> ProxySettings {
        if profile.has_credentials() {
            return ProxySettings::PacScript {
                pac_script: pac::credentialed_script(profile),
            };
        }
        ProxySettings::fixed(
            ProxyServer {
                scheme: profile.server_type.scheme(),
                host: profile.host.clone(),
                port: profile.port,
            },
            profile.exclude_list.clone(),
            dns_enabled,
        )
    }

    /// Apply `profile`, then re-read the host settings in the background.
    pub async fn apply(&self, profile: &ServerProfile, dns_enabled: bool) -> Result<()> {
        let settings = Self::settings_for(profile, dns_enabled);
        info!(
            server = %profile.name,
            "Applying proxy settings: {}",
            settings.describe()
        );
        let expected = settings.mode();
        self.set(settings).await?;
        self.spawn_verify(expected);
        Ok(())
    }

    pub async fn set(&self, settings: ProxySettings) -> Result<()> {
        let adapter = Arc::clone(&self.adapter);
        tokio::task::spawn_blocking(move || adapter.apply(&settings))
            .await
            .context("proxy apply task panicked")?
    }

    pub async fn clear(&self) -> Result<()> {
        let adapter = Arc::clone(&self.adapter);
        tokio::task::spawn_blocking(move || adapter.clear())
            .await
            .context("proxy clear task panicked")??;
        info!("Proxy settings cleared");
        Ok(())
    }

    pub async fn current(&self) -> Result<Option<ProxySettings>> {
        let adapter = Arc::clone(&self.adapter);
        tokio::task::spawn_blocking(move || adapter.current())
            .await
            .context("proxy read task panicked")?
    }

    pub async fn has_permission(&self) -> Result<bool> {
        let adapter = Arc::clone(&self.adapter);
        tokio::task::spawn_blocking(move || adapter.has_proxy_permission())
            .await
            .context("permission check task panicked")?
    }

    fn spawn_verify(&self, expected: &'static str) {
        let applier = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(applier.verify_delay).await;
            match applier.current().await {
                Ok(Some(settings)) if settings.mode() == expected => {
                    info!("Proxy settings verified: {}", settings.describe());
                }
                Ok(Some(settings @ (ProxySettings::System | ProxySettings::Direct))) => {
                    warn!(
                        "Proxy settings did not stick; host reports {}",
                        settings.mode()
                    );
                }
                Ok(Some(settings)) => {
                    warn!(
                        "Unexpected proxy mode after apply: {} (wanted {})",
                        settings.mode(),
                        expected
                    );
                }
                Ok(None) => warn!("Host reported no proxy settings after apply"),
                Err(err) => warn!(?err, "Failed to verify proxy settings"),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ProxyScheme, ServerType};
    use crate::platform::MemoryProxyAdapter;

    fn profile(username: &str, password: &str) -> ServerProfile {
        ServerProfile {
            id: "1".into(),
            name: "office".into(),
            server_type: ServerType::Http,
            host: "10.0.0.5".into(),
            port: 8080,
            username: username.into(),
            password: password.into(),
            exclude_list: vec!["localhost".into(), "*.lan".into()],
        }
    }

    #[test]
    fn plain_profile_maps_to_fixed_servers() {
        let settings = ProxyApplier::settings_for(&profile("", ""), true);
        let ProxySettings::FixedServers { rules } = settings else {
            panic!("expected fixed servers");
        };
        assert_eq!(rules.single_proxy.scheme, ProxyScheme::Http);
        assert_eq!(rules.single_proxy.host, "10.0.0.5");
        assert_eq!(rules.single_proxy.port, 8080);
        assert_eq!(rules.bypass_list, vec!["localhost", "*.lan"]);
        assert!(rules.proxy_dns);
    }

    #[test]
    fn half_credentials_still_use_fixed_servers() {
        let settings = ProxyApplier::settings_for(&profile("user", ""), false);
        assert_eq!(settings.mode(), "fixed_servers");
    }

    #[test]
    fn credentials_map_to_pac_script() {
        let settings = ProxyApplier::settings_for(&profile("user", "pw"), false);
        let ProxySettings::PacScript { pac_script } = settings else {
            panic!("expected pac script");
        };
        assert!(pac_script.data.contains("PROXY user:pw@10.0.0.5:8080"));
    }

    #[tokio::test]
    async fn apply_and_clear_reach_adapter() {
        let adapter = Arc::new(MemoryProxyAdapter::new());
        let applier =
            ProxyApplier::new(adapter.clone()).with_verify_delay(Duration::from_millis(1));

        applier.apply(&profile("", ""), false).await.unwrap();
        assert_eq!(adapter.apply_count(), 1);
        assert_eq!(
            applier.current().await.unwrap().map(|s| s.mode()),
            Some("fixed_servers")
        );

        applier.clear().await.unwrap();
        assert_eq!(adapter.settings(), None);
    }

    #[tokio::test]
    async fn apply_failure_propagates() {
        let adapter = Arc::new(MemoryProxyAdapter::new());
        adapter.set_fail_apply(true);
        let applier = ProxyApplier::new(adapter);
        assert!(applier.apply(&profile("", ""), false).await.is_err());
    }
}
