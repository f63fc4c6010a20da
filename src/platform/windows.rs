use super::PlatformProxyAdapter;
use crate::models::{ProxyScheme, ProxyServer, ProxySettings};
use anyhow::{anyhow, Context, Result};
use std::process::Command;

pub struct WindowsProxyAdapter;

impl WindowsProxyAdapter {
    pub const fn new() -> Self {
        Self
    }

    fn run_netsh(args: &[&str]) -> Result<String> {
        let output = Command::new("netsh")
            .args(args)
            .output()
            .with_context(|| format!("failed to run netsh with args {:?}", args))?;
        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }
        Err(anyhow!("netsh exited with {}", output.status))
    }
}

impl PlatformProxyAdapter for WindowsProxyAdapter {
    fn apply(&self, settings: &ProxySettings) -> Result<()> {
        match settings {
            ProxySettings::FixedServers { rules } => {
                let proxy = format!(
                    "proxy-server={}:{}",
                    rules.single_proxy.host, rules.single_proxy.port
                );
                let bypass = format!("bypass-list={}", rules.bypass_list.join(";"));
                let mut args = vec!["winhttp", "set", "proxy", proxy.as_str()];
                if !rules.bypass_list.is_empty() {
                    args.push(bypass.as_str());
                }
                Self::run_netsh(&args).map(|_| ())
            }
            ProxySettings::PacScript { .. } => Err(anyhow!(
                "WinHTTP does not accept inline PAC scripts"
            )),
            ProxySettings::Direct | ProxySettings::System => self.clear(),
        }
    }

    fn current(&self) -> Result<Option<ProxySettings>> {
        let stdout = Self::run_netsh(&["winhttp", "show", "proxy"])?;
        Ok(Some(parse_show_proxy(&stdout)))
    }

    fn clear(&self) -> Result<()> {
        Self::run_netsh(&["winhttp", "reset", "proxy"]).map(|_| ())
    }

    fn has_proxy_permission(&self) -> Result<bool> {
        Ok(true)
    }
}

fn parse_show_proxy(stdout: &str) -> ProxySettings {
    let field = |name: &str| {
        stdout.lines().find_map(|line| {
            let (key, value) = line.split_once(" :")?;
            (key.trim() == name).then(|| value.trim().to_string())
        })
    };

    let Some(server) = field("Proxy Server(s)") else {
        return ProxySettings::Direct;
    };
    let Some((host, port)) = server.rsplit_once(':') else {
        return ProxySettings::Direct;
    };
    let bypass = field("Bypass List")
        .filter(|list| list != "(none)")
        .map(|list| {
            list.split(';')
                .map(str::trim)
                .filter(|entry| !entry.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    ProxySettings::fixed(
        ProxyServer {
            scheme: ProxyScheme::Http,
            host: host.to_string(),
            port: port.parse().unwrap_or_default(),
        },
        bypass,
        false,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_direct_access() {
        let out = "\nCurrent WinHTTP proxy settings:\n\n    Direct access (no proxy server).\n";
        assert_eq!(parse_show_proxy(out), ProxySettings::Direct);
    }

    #[test]
    fn parses_configured_proxy() {
        let out = "Current WinHTTP proxy settings:\n\n    Proxy Server(s) :  10.0.0.1:3128\n    Bypass List     :  localhost;*.lan\n";
        let ProxySettings::FixedServers { rules } = parse_show_proxy(out) else {
            panic!("expected fixed servers");
        };
        assert_eq!(rules.single_proxy.host, "10.0.0.1");
        assert_eq!(rules.single_proxy.port, 3128);
        assert_eq!(rules.bypass_list, vec!["localhost", "*.lan"]);
    }
}
