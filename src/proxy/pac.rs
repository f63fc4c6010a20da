//! Single-route PAC scripts for profiles with credentials.

use crate::models::{PacScript, ServerProfile};

/// Route target parsed back out of a script produced by [`credentialed_script`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacTarget {
    pub host: String,
    pub port: u16,
    pub credentials: Option<(String, String)>,
}

/// Script sending every request to `profile` with credentials inline.
pub fn credentialed_script(profile: &ServerProfile) -> PacScript {
    let data = format!(
        "function FindProxyForURL(url, host) {{\n  return \"PROXY {}:{}@{}:{}\";\n}}",
        profile.username, profile.password, profile.host, profile.port
    );
    PacScript { data }
}

/// First `PROXY` directive of a script, if any.
pub fn parse_directive(script: &str) -> Option<PacTarget> {
    let start = script.find("PROXY ")? + "PROXY ".len();
    let directive: String = script[start..]
        .chars()
        .take_while(|c| *c != '"' && *c != ';' && !c.is_whitespace())
        .collect();

    let (auth, endpoint) = match directive.rsplit_once('@') {
        Some((auth, endpoint)) => (Some(auth), endpoint),
        None => (None, directive.as_str()),
    };
    let (host, port) = endpoint.rsplit_once(':')?;
    let port = port.parse::<u16>().ok()?;
    let credentials = auth
        .and_then(|a| a.split_once(':'))
        .map(|(user, pass)| (user.to_string(), pass.to_string()));

    Some(PacTarget {
        host: host.to_string(),
        port,
        credentials,
    })
}
