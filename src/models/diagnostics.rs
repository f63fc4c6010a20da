//! Reachability probe results.

use flutter_rust_bridge::frb;
use serde::{Deserialize, Serialize};

/// How a probe through a candidate proxy turned out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[frb]
pub enum ProbeVerdict {
    /// Reachable and the public IP changed.
    ThroughProxy,
    /// Reachable but the public IP stayed the same; the proxy is probably bypassed.
    ProxyBypassed,
    /// Reachable; the direct IP could not be determined for comparison.
    Reachable,
    Unreachable,
    Timeout,
}

impl ProbeVerdict {
    pub fn is_reachable(&self) -> bool {
        matches!(
            self,
            ProbeVerdict::ThroughProxy | ProbeVerdict::ProxyBypassed | ProbeVerdict::Reachable
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[frb]
pub struct DiagnosticReport {
    pub success: bool,
    #[serde(rename = "status")]
    pub verdict: ProbeVerdict,
    pub response_time_ms: u64,
    pub original_ip: Option<String>,
    pub proxy_ip: Option<String>,
    pub ip_changed: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
