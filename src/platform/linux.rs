use super::{read_pac_file, write_pac_file, PlatformProxyAdapter};
use crate::models::{ProxyScheme, ProxyServer, ProxySettings};
use anyhow::{anyhow, Context, Result};
use std::process::Command;

const SCHEMA: &str = "org.gnome.system.proxy";

/// GNOME desktop proxy settings via `gsettings`.
pub struct GnomeProxyAdapter;

impl GnomeProxyAdapter {
    pub const fn new() -> Self {
        Self
    }

    fn run_gsettings(args: &[&str]) -> Result<String> {
        let output = Command::new("gsettings")
            .args(args)
            .output()
            .with_context(|| format!("failed to run gsettings with args {:?}", args))?;
        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).trim().to_string());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(anyhow!("gsettings {:?} failed: {}", args, stderr.trim()))
    }

    fn set(schema: &str, key: &str, value: &str) -> Result<()> {
        Self::run_gsettings(&["set", schema, key, value]).map(|_| ())
    }

    fn get(schema: &str, key: &str) -> Result<String> {
        Self::run_gsettings(&["get", schema, key])
    }

    fn configure_fixed(server: &ProxyServer, bypass: &[String]) -> Result<()> {
        let port = server.port.to_string();
        for scheme in ["http", "https"] {
            let sub = format!("{SCHEMA}.{scheme}");
            Self::set(&sub, "host", &server.host)?;
            Self::set(&sub, "port", &port)?;
        }
        Self::set(SCHEMA, "ignore-hosts", &format_string_list(bypass))?;
        Self::set(SCHEMA, "mode", "manual")
    }
}

impl PlatformProxyAdapter for GnomeProxyAdapter {
    fn apply(&self, settings: &ProxySettings) -> Result<()> {
        match settings {
            ProxySettings::FixedServers { rules } => {
                Self::configure_fixed(&rules.single_proxy, &rules.bypass_list)
            }
            ProxySettings::PacScript { pac_script } => {
                let url = write_pac_file(pac_script)?;
                Self::set(SCHEMA, "autoconfig-url", &url)?;
                Self::set(SCHEMA, "mode", "auto")
            }
            ProxySettings::Direct | ProxySettings::System => self.clear(),
        }
    }

    fn current(&self) -> Result<Option<ProxySettings>> {
        let mode = unquote(&Self::get(SCHEMA, "mode")?);
        let settings = match mode.as_str() {
            "manual" => {
                let sub = format!("{SCHEMA}.http");
                let host = unquote(&Self::get(&sub, "host")?);
                let port = Self::get(&sub, "port")?.parse::<u16>().unwrap_or_default();
                let bypass = parse_string_list(&Self::get(SCHEMA, "ignore-hosts")?);
                Some(ProxySettings::fixed(
                    ProxyServer {
                        scheme: ProxyScheme::Http,
                        host,
                        port,
                    },
                    bypass,
                    false,
                ))
            }
            "auto" => {
                let url = unquote(&Self::get(SCHEMA, "autoconfig-url")?);
                read_pac_file(&url).map(|pac_script| ProxySettings::PacScript { pac_script })
            }
            "none" => Some(ProxySettings::System),
            _ => None,
        };
        Ok(settings)
    }

    fn clear(&self) -> Result<()> {
        Self::set(SCHEMA, "mode", "none")
    }

    fn has_proxy_permission(&self) -> Result<bool> {
        Ok(Self::get(SCHEMA, "mode").is_ok())
    }
}

fn unquote(value: &str) -> String {
    value.trim().trim_matches('\'').to_string()
}

fn format_string_list(items: &[String]) -> String {
    let quoted: Vec<String> = items
        .iter()
        .map(|item| format!("'{}'", item.replace('\'', "")))
        .collect();
    format!("[{}]", quoted.join(", "))
}

fn parse_string_list(value: &str) -> Vec<String> {
    value
        .trim()
        .trim_start_matches("@as")
        .trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .split(',')
        .map(unquote)
        .filter(|item| !item.is_empty())
        .collect()
}
