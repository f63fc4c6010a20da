use super::{read_pac_file, write_pac_file, PlatformProxyAdapter};
use crate::models::{ProxyScheme, ProxyServer, ProxySettings};
use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;
use std::process::Command;
use tracing::warn;

pub struct MacProxyAdapter;

impl MacProxyAdapter {
    pub const fn new() -> Self {
        Self
    }

    fn run_networksetup(args: &[&str]) -> Result<String> {
        let output = Command::new("networksetup")
            .args(args)
            .output()
            .with_context(|| format!("failed to run networksetup with args {:?}", args))?;
        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(anyhow!("networksetup {:?} failed: {}", args, stderr.trim()))
    }

    fn list_network_services() -> Result<Vec<String>> {
        let stdout = Self::run_networksetup(&["-listallnetworkservices"])
            .context("failed to list network services")?;
        let services = stdout
            .lines()
            .filter_map(|line| {
                let trimmed = line.trim();
                if trimmed.is_empty()
                    || trimmed.starts_with("An asterisk")
                    || trimmed.starts_with('*')
                {
                    return None;
                }
                Some(trimmed.to_string())
            })
            .collect::<Vec<_>>();

        Ok(services)
    }

    fn default_services() -> Vec<String> {
        vec!["Wi-Fi".to_string(), "Ethernet".to_string()]
    }

    fn resolve_services() -> Result<Vec<String>> {
        let services = match Self::list_network_services() {
            Ok(services) if !services.is_empty() => services,
            Ok(_) => {
                warn!("No network services reported; falling back to defaults");
                Self::default_services()
            }
            Err(err) => {
                warn!(
                    ?err,
                    "Failed to enumerate network services; falling back to defaults"
                );
                Self::default_services()
            }
        };
        if services.is_empty() {
            return Err(anyhow!(
                "No network services available for proxy configuration"
            ));
        }
        Ok(services)
    }

    fn set_web_proxy_state(service: &str, state: &str) -> Result<()> {
        Self::run_networksetup(&["-setwebproxystate", service, state])?;
        Self::run_networksetup(&["-setsecurewebproxystate", service, state])?;
        Ok(())
    }

    fn configure_fixed(service: &str, server: &ProxyServer, bypass: &[String]) -> Result<()> {
        let port = server.port.to_string();
        Self::run_networksetup(&["-setwebproxy", service, &server.host, &port])?;
        Self::run_networksetup(&["-setsecurewebproxy", service, &server.host, &port])?;

        let mut bypass_args = vec!["-setproxybypassdomains", service];
        if bypass.is_empty() {
            bypass_args.push("Empty");
        } else {
            bypass_args.extend(bypass.iter().map(String::as_str));
        }
        Self::run_networksetup(&bypass_args)?;

        Self::run_networksetup(&["-setautoproxystate", service, "off"])?;
        Self::set_web_proxy_state(service, "on")
    }

    fn read_service(service: &str) -> Result<Option<ProxySettings>> {
        let auto = parse_key_values(&Self::run_networksetup(&["-getautoproxyurl", service])?);
        if is_enabled(&auto) {
            let url = auto.get("URL").map(String::as_str).unwrap_or_default();
            return Ok(read_pac_file(url).map(|pac_script| ProxySettings::PacScript { pac_script }));
        }

        let web = parse_key_values(&Self::run_networksetup(&["-getwebproxy", service])?);
        if !is_enabled(&web) {
            return Ok(Some(ProxySettings::System));
        }
        let host = web.get("Server").cloned().unwrap_or_default();
        let port = web
            .get("Port")
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or_default();
        let bypass = parse_bypass_domains(&Self::run_networksetup(&[
            "-getproxybypassdomains",
            service,
        ])?);

        Ok(Some(ProxySettings::fixed(
            ProxyServer {
                scheme: ProxyScheme::Http,
                host,
                port,
            },
            bypass,
            false,
        )))
    }
}

impl PlatformProxyAdapter for MacProxyAdapter {
    fn apply(&self, settings: &ProxySettings) -> Result<()> {
        let services = Self::resolve_services()?;
        match settings {
            ProxySettings::FixedServers { rules } => {
                for service in &services {
                    Self::configure_fixed(service, &rules.single_proxy, &rules.bypass_list)?;
                }
            }
            ProxySettings::PacScript { pac_script } => {
                let url = write_pac_file(pac_script)?;
                for service in &services {
                    Self::set_web_proxy_state(service, "off")?;
                    Self::run_networksetup(&["-setautoproxyurl", service, &url])?;
                    Self::run_networksetup(&["-setautoproxystate", service, "on"])?;
                }
            }
            ProxySettings::Direct | ProxySettings::System => return self.clear(),
        }
        Ok(())
    }

    fn current(&self) -> Result<Option<ProxySettings>> {
        let services = Self::resolve_services()?;
        for service in &services {
            match Self::read_service(service)? {
                Some(ProxySettings::System) | None => continue,
                found => return Ok(found),
            }
        }
        Ok(Some(ProxySettings::System))
    }

    fn clear(&self) -> Result<()> {
        for service in Self::resolve_services()? {
            Self::set_web_proxy_state(&service, "off")?;
            Self::run_networksetup(&["-setautoproxystate", &service, "off"])?;
        }
        Ok(())
    }

    fn has_proxy_permission(&self) -> Result<bool> {
        Ok(Self::list_network_services().is_ok())
    }
}

fn parse_key_values(stdout: &str) -> HashMap<String, String> {
    stdout
        .lines()
        .filter_map(|line| line.split_once(':'))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .collect()
}

fn is_enabled(values: &HashMap<String, String>) -> bool {
    values
        .get("Enabled")
        .is_some_and(|v| v.eq_ignore_ascii_case("yes"))
}

fn parse_bypass_domains(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("There aren't any"))
        .map(str::to_string)
        .collect()
}
