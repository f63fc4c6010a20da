//! Host proxy configuration values.
//!
//! Mirrors the shape accepted by browser proxy-settings APIs so that the value can be
//! handed to a host shim unchanged.

use flutter_rust_bridge::frb;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[frb]
pub enum ProxyScheme {
    Http,
}

impl ProxyScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyScheme::Http => "http",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[frb]
pub struct ProxyServer {
    pub scheme: ProxyScheme,
    pub host: String,
    pub port: u16,
}

impl ProxyServer {
    pub fn url(&self) -> String {
        format!("{}://{}:{}", self.scheme.as_str(), self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[frb]
pub struct ProxyRules {
    pub single_proxy: ProxyServer,
    #[serde(default)]
    pub bypass_list: Vec<String>,
    /// When false, name resolution is allowed to bypass the proxy.
    #[serde(default)]
    pub proxy_dns: bool,
}

/// Inline proxy auto-config script.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[frb]
pub struct PacScript {
    pub data: String,
}

// The script may embed credentials.
impl fmt::Debug for PacScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PacScript")
            .field("data", &format_args!("<{} bytes>", self.data.len()))
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
#[frb]
pub enum ProxySettings {
    Direct,
    System,
    FixedServers {
        rules: ProxyRules,
    },
    PacScript {
        #[serde(rename = "pacScript")]
        pac_script: PacScript,
    },
}

impl ProxySettings {
    pub fn fixed(single_proxy: ProxyServer, bypass_list: Vec<String>, proxy_dns: bool) -> Self {
        ProxySettings::FixedServers {
            rules: ProxyRules {
                single_proxy,
                bypass_list,
                proxy_dns,
            },
        }
    }

    pub fn mode(&self) -> &'static str {
        match self {
            ProxySettings::Direct => "direct",
            ProxySettings::System => "system",
            ProxySettings::FixedServers { .. } => "fixed_servers",
            ProxySettings::PacScript { .. } => "pac_script",
        }
    }

    /// Loggable one-line summary; never includes PAC contents.
    pub fn describe(&self) -> String {
        match self {
            ProxySettings::FixedServers { rules } => format!(
                "fixed_servers {} (bypass {} entries, proxy_dns={})",
                rules.single_proxy.url(),
                rules.bypass_list.len(),
                rules.proxy_dns
            ),
            ProxySettings::PacScript { pac_script } => {
                format!("pac_script ({} bytes)", pac_script.data.len())
            }
            other => other.mode().to_string(),
        }
    }

    /// Copy suitable for returning to the UI: PAC bodies are replaced by a marker.
    pub fn redacted(&self) -> Self {
        match self {
            ProxySettings::PacScript { pac_script } => ProxySettings::PacScript {
                pac_script: PacScript {
                    data: format!("<redacted {} bytes>", pac_script.data.len()),
                },
            },
            other => other.clone(),
        }
    }
}
