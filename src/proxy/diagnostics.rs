//! Reachability probe for a candidate proxy server.
//!
//! The probe temporarily points the host at the candidate, compares the public IP
//! seen with and without it, and always puts the previous host settings back.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::ProxyApplier;
use crate::i18n::{self, Language, Message};
use crate::models::{DiagnosticReport, ProbeVerdict, ProxyServer, ProxySettings};
use crate::net::{HttpClient, HttpRequest, NetError};

pub const IP_ECHO_URL: &str = "https://api.ipify.org?format=json";
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);
pub const SETTLE_DELAY: Duration = Duration::from_secs(1);

#[derive(serde::Deserialize)]
struct IpEcho {
    ip: String,
}

#[derive(Debug)]
enum ProbeFailure {
    ApplyFailed,
    NotResponding,
    Http(u16),
    Other(String),
}

impl ProbeFailure {
    fn detail(&self, lang: Language) -> String {
        match self {
            ProbeFailure::ApplyFailed => i18n::text(lang, Message::ApplyTestFailed).to_string(),
            ProbeFailure::NotResponding => {
                i18n::text(lang, Message::ProxyNotResponding).to_string()
            }
            ProbeFailure::Http(status) => format!("HTTP {status}"),
            ProbeFailure::Other(reason) => reason.clone(),
        }
    }
}

pub struct Diagnostics {
    applier: ProxyApplier,
    http: Arc<dyn HttpClient>,
    probe_timeout: Duration,
    settle_delay: Duration,
}

impl Diagnostics {
    pub fn new(applier: ProxyApplier, http: Arc<dyn HttpClient>) -> Self {
        Self {
            applier,
            http,
            probe_timeout: PROBE_TIMEOUT,
            settle_delay: SETTLE_DELAY,
        }
    }

    pub fn with_timings(mut self, probe_timeout: Duration, settle_delay: Duration) -> Self {
        self.probe_timeout = probe_timeout;
        self.settle_delay = settle_delay;
        self
    }

    /// Probe `candidate` once. Never fails; problems are reported in the result.
    pub async fn probe(&self, candidate: &ProxyServer, lang: Language) -> DiagnosticReport {
        info!("Testing proxy server {}", candidate.url());
        let started = Instant::now();

        let previous = match self.applier.current().await {
            Ok(settings) => settings,
            Err(err) => {
                warn!(?err, "Could not capture current proxy settings before probe");
                None
            }
        };

        let outcome = tokio::time::timeout(self.probe_timeout, self.run(candidate)).await;
        let response_time_ms = started.elapsed().as_millis() as u64;

        self.restore(previous).await;

        match outcome {
            Ok(Ok((original_ip, proxy_ip))) => {
                reachable_report(original_ip, proxy_ip, response_time_ms, lang)
            }
            Ok(Err(failure)) => {
                debug!(?failure, "Proxy probe failed");
                failure_report(
                    ProbeVerdict::Unreachable,
                    failure.detail(lang),
                    response_time_ms,
                    lang,
                )
            }
            Err(_) => failure_report(
                ProbeVerdict::Timeout,
                i18n::text(lang, Message::ConnectionTimeout).to_string(),
                response_time_ms,
                lang,
            ),
        }
    }

    async fn run(&self, candidate: &ProxyServer) -> Result<(Option<String>, String), ProbeFailure> {
        let original_ip = match self.fetch_ip().await {
            Ok(ip) => Some(ip),
            Err(err) => {
                debug!(?err, "Could not get original IP");
                None
            }
        };

        let temporary = ProxySettings::fixed(candidate.clone(), Vec::new(), false);
        if let Err(err) = self.applier.set(temporary).await {
            warn!(?err, "Failed to apply test proxy settings");
            return Err(ProbeFailure::ApplyFailed);
        }

        tokio::time::sleep(self.settle_delay).await;

        let proxy_ip = self.fetch_ip().await?;
        Ok((original_ip, proxy_ip))
    }

    async fn fetch_ip(&self) -> Result<String, ProbeFailure> {
        let request = HttpRequest::get(IP_ECHO_URL)
            .header("Cache-Control", "no-cache")
            .timeout(self.probe_timeout);
        let response = self.http.get(request).await.map_err(|err| match err {
            NetError::Timeout | NetError::Connect(_) => ProbeFailure::NotResponding,
            NetError::Other(reason) => ProbeFailure::Other(reason),
        })?;
        if !response.is_success() {
            return Err(ProbeFailure::Http(response.status));
        }
        response
            .json::<IpEcho>()
            .map(|echo| echo.ip)
            .map_err(|err| ProbeFailure::Other(err.to_string()))
    }

    async fn restore(&self, previous: Option<ProxySettings>) {
        let result = match previous {
            Some(settings) => self.applier.set(settings).await,
            None => self.applier.clear().await,
        };
        match result {
            Ok(()) => info!("Original proxy settings restored after test"),
            Err(err) => warn!(?err, "Failed to restore original proxy settings"),
        }
    }
}

fn reachable_report(
    original_ip: Option<String>,
    proxy_ip: String,
    response_time_ms: u64,
    lang: Language,
) -> DiagnosticReport {
    let (verdict, message) = match original_ip.as_deref() {
        Some(original) if original != proxy_ip => (
            ProbeVerdict::ThroughProxy,
            i18n::format(
                lang,
                Message::TrafficThroughProxy,
                &[("original", original), ("proxy", &proxy_ip)],
            ),
        ),
        Some(_) => (
            ProbeVerdict::ProxyBypassed,
            i18n::format(lang, Message::ProxyBypassed, &[("proxy", &proxy_ip)]),
        ),
        None => (
            ProbeVerdict::Reachable,
            i18n::format(lang, Message::ProxyIpReceived, &[("proxy", &proxy_ip)]),
        ),
    };

    DiagnosticReport {
        success: true,
        ip_changed: verdict == ProbeVerdict::ThroughProxy,
        verdict,
        response_time_ms,
        original_ip,
        proxy_ip: Some(proxy_ip),
        message,
        error: None,
    }
}

fn failure_report(
    verdict: ProbeVerdict,
    error: String,
    response_time_ms: u64,
    lang: Language,
) -> DiagnosticReport {
    DiagnosticReport {
        success: false,
        verdict,
        response_time_ms,
        original_ip: None,
        proxy_ip: None,
        ip_changed: false,
        message: i18n::text(lang, Message::ServerUnavailable).to_string(),
        error: Some(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProxyScheme;
    use crate::net::HttpResponse;
    use crate::platform::MemoryProxyAdapter;
    use futures::future::BoxFuture;
    use futures::FutureExt;

    /// Answers with a different IP depending on whether the host is proxied.
    struct EchoServer {
        adapter: Arc<MemoryProxyAdapter>,
        direct_ip: Option<&'static str>,
        proxied: Result<&'static str, u16>,
        hang_when_proxied: bool,
    }

    impl HttpClient for EchoServer {
        fn get<'a>(
            &'a self,
            _request: HttpRequest,
        ) -> BoxFuture<'a, Result<HttpResponse, NetError>> {
            async move {
                let proxied = matches!(
                    self.adapter.settings(),
                    Some(ProxySettings::FixedServers { .. })
                );
                if !proxied {
                    return match self.direct_ip {
                        Some(ip) => Ok(HttpResponse {
                            status: 200,
                            body: format!("{{\"ip\":\"{ip}\"}}"),
                        }),
                        None => Err(NetError::Connect("offline".into())),
                    };
                }
                if self.hang_when_proxied {
                    futures::future::pending::<()>().await;
                }
                match self.proxied {
                    Ok(ip) => Ok(HttpResponse {
                        status: 200,
                        body: format!("{{\"ip\":\"{ip}\"}}"),
                    }),
                    Err(status) => Ok(HttpResponse {
                        status,
                        body: String::new(),
                    }),
                }
            }
            .boxed()
        }
    }

    fn candidate() -> ProxyServer {
        ProxyServer {
            scheme: ProxyScheme::Http,
            host: "10.1.1.1".into(),
            port: 3128,
        }
    }

    fn diagnostics(
        adapter: &Arc<MemoryProxyAdapter>,
        direct_ip: Option<&'static str>,
        proxied: Result<&'static str, u16>,
        hang_when_proxied: bool,
    ) -> Diagnostics {
        let http = Arc::new(EchoServer {
            adapter: adapter.clone(),
            direct_ip,
            proxied,
            hang_when_proxied,
        });
        Diagnostics::new(ProxyApplier::new(adapter.clone()), http)
    }

    #[tokio::test(start_paused = true)]
    async fn changed_ip_means_traffic_goes_through_proxy() {
        let adapter = Arc::new(MemoryProxyAdapter::new());
        let diag = diagnostics(&adapter, Some("1.1.1.1"), Ok("2.2.2.2"), false);

        let report = diag.probe(&candidate(), Language::En).await;
        assert!(report.success);
        assert_eq!(report.verdict, ProbeVerdict::ThroughProxy);
        assert!(report.ip_changed);
        assert_eq!(
            report.message,
            "Traffic goes through proxy. IP changed from 1.1.1.1 to 2.2.2.2"
        );
        // No prior settings, so the host is cleared again.
        assert_eq!(adapter.settings(), None);
        assert_eq!(adapter.clear_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn same_ip_is_reported_as_bypassed() {
        let adapter = Arc::new(MemoryProxyAdapter::with_settings(ProxySettings::System));
        let diag = diagnostics(&adapter, Some("1.1.1.1"), Ok("1.1.1.1"), false);

        let report = diag.probe(&candidate(), Language::En).await;
        assert_eq!(report.verdict, ProbeVerdict::ProxyBypassed);
        assert!(!report.ip_changed);
        assert_eq!(adapter.settings(), Some(ProxySettings::System));
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_original_ip_is_still_reachable() {
        let adapter = Arc::new(MemoryProxyAdapter::new());
        let diag = diagnostics(&adapter, None, Ok("2.2.2.2"), false);

        let report = diag.probe(&candidate(), Language::En).await;
        assert!(report.success);
        assert_eq!(report.verdict, ProbeVerdict::Reachable);
        assert_eq!(report.original_ip, None);
    }

    #[tokio::test(start_paused = true)]
    async fn http_error_through_proxy_is_unreachable_and_restores() {
        let adapter = Arc::new(MemoryProxyAdapter::with_settings(ProxySettings::Direct));
        let diag = diagnostics(&adapter, Some("1.1.1.1"), Err(502), false);

        let report = diag.probe(&candidate(), Language::En).await;
        assert!(!report.success);
        assert_eq!(report.verdict, ProbeVerdict::Unreachable);
        assert_eq!(report.error.as_deref(), Some("HTTP 502"));
        assert_eq!(adapter.settings(), Some(ProxySettings::Direct));
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_proxy_times_out_and_restores() {
        let adapter = Arc::new(MemoryProxyAdapter::with_settings(ProxySettings::System));
        let diag = diagnostics(&adapter, Some("1.1.1.1"), Ok("2.2.2.2"), true);

        let report = diag.probe(&candidate(), Language::Ru).await;
        assert_eq!(report.verdict, ProbeVerdict::Timeout);
        assert_eq!(report.error.as_deref(), Some("Превышено время ожидания"));
        assert!(report.response_time_ms >= PROBE_TIMEOUT.as_millis() as u64);
        assert_eq!(adapter.settings(), Some(ProxySettings::System));
    }

    #[tokio::test]
    async fn apply_failure_is_reported() {
        let adapter = Arc::new(MemoryProxyAdapter::new());
        adapter.set_fail_apply(true);
        let diag = diagnostics(&adapter, Some("1.1.1.1"), Ok("2.2.2.2"), false)
            .with_timings(Duration::from_secs(1), Duration::ZERO);

        let report = diag.probe(&candidate(), Language::En).await;
        assert_eq!(report.verdict, ProbeVerdict::Unreachable);
        assert_eq!(
            report.error.as_deref(),
            Some("Failed to apply test proxy settings")
        );
    }
}
