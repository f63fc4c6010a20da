//! Saved proxy server profiles and the form payload used to create them.

use flutter_rust_bridge::frb;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ValidationError;
use crate::models::ProxyScheme;

/// Kind of upstream proxy. Only HTTP (covering HTTPS via CONNECT) is offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[frb]
pub enum ServerType {
    #[default]
    Http,
}

impl ServerType {
    pub fn scheme(&self) -> ProxyScheme {
        match self {
            ServerType::Http => ProxyScheme::Http,
        }
    }
}

/// A saved proxy server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[frb]
pub struct ServerProfile {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub server_type: ServerType,
    pub host: String,
    #[serde(deserialize_with = "deserialize_port")]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub exclude_list: Vec<String>,
}

impl ServerProfile {
    /// Build a profile with a fresh time-ordered id.
    pub fn from_input(input: ValidServer) -> Self {
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            name: input.name,
            server_type: input.server_type,
            host: input.host,
            port: input.port,
            username: input.username,
            password: input.password,
            exclude_list: input.exclude_list,
        }
    }

    /// Replace every editable field, keeping the id.
    pub fn apply_input(&mut self, input: ValidServer) {
        self.name = input.name;
        self.server_type = input.server_type;
        self.host = input.host;
        self.port = input.port;
        self.username = input.username;
        self.password = input.password;
        self.exclude_list = input.exclude_list;
    }

    /// Credentials only count when both halves are filled in.
    pub fn has_credentials(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }
}

/// Server form payload as sent by the UI (`serverData`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[frb]
pub struct ServerInput {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub server_type: ServerType,
    #[serde(default)]
    pub host: String,
    #[serde(default, deserialize_with = "deserialize_form_port")]
    pub port: Option<i64>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub exclude_list: Option<Vec<String>>,
}

/// Form input that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidServer {
    pub name: String,
    pub server_type: ServerType,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub exclude_list: Vec<String>,
}

impl ServerInput {
    pub fn validate(&self) -> Result<ValidServer, ValidationError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ValidationError::MissingField("name"));
        }
        let host = self.host.trim();
        if host.is_empty() {
            return Err(ValidationError::MissingField("host"));
        }
        let port = self.port.ok_or(ValidationError::MissingField("port"))?;
        if !(1..=65535).contains(&port) {
            return Err(ValidationError::PortOutOfRange(port));
        }

        let username = self.username.clone().unwrap_or_default();
        let password = self.password.clone().unwrap_or_default();
        check_credential("username", &username, &[':'])?;
        check_credential("password", &password, &[])?;

        let exclude_list = self
            .exclude_list
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|entry| entry.trim())
            .filter(|entry| !entry.is_empty())
            .map(str::to_string)
            .collect();

        Ok(ValidServer {
            name: name.to_string(),
            server_type: self.server_type,
            host: host.to_string(),
            port: port as u16,
            username,
            password,
            exclude_list,
        })
    }
}

const CREDENTIAL_FORBIDDEN: &[char] = &['"', '\\', ';', '@'];

fn check_credential(
    field: &'static str,
    value: &str,
    also_forbidden: &[char],
) -> Result<(), ValidationError> {
    let bad = value.chars().any(|c| {
        c.is_whitespace() || CREDENTIAL_FORBIDDEN.contains(&c) || also_forbidden.contains(&c)
    });
    if bad {
        return Err(ValidationError::InvalidCredentials(field));
    }
    Ok(())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PortRepr {
    Number(i64),
    Text(String),
}

// Older records may carry the port as a string.
fn deserialize_port<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = match PortRepr::deserialize(deserializer)? {
        PortRepr::Number(n) => n,
        PortRepr::Text(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| serde::de::Error::custom(format!("invalid port {s:?}")))?,
    };
    u16::try_from(raw)
        .ok()
        .filter(|p| *p > 0)
        .ok_or_else(|| serde::de::Error::custom(format!("port {raw} out of range")))
}

fn deserialize_form_port<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<PortRepr>::deserialize(deserializer)?;
    Ok(match raw {
        None => None,
        Some(PortRepr::Number(n)) => Some(n),
        Some(PortRepr::Text(s)) => s.trim().parse::<i64>().ok(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(name: &str, host: &str, port: Option<i64>) -> ServerInput {
        ServerInput {
            name: name.into(),
            host: host.into(),
            port,
            ..ServerInput::default()
        }
    }

    #[test]
    fn validate_trims_and_defaults_optional_fields() {
        let mut form = input("  Office ", " proxy.local ", Some(3128));
        form.exclude_list = Some(vec!["  localhost ".into(), "".into(), "*.lan".into()]);
        let valid = form.validate().expect("valid form");

        assert_eq!(valid.name, "Office");
        assert_eq!(valid.host, "proxy.local");
        assert_eq!(valid.port, 3128);
        assert_eq!(valid.username, "");
        assert_eq!(valid.password, "");
        assert_eq!(valid.exclude_list, vec!["localhost", "*.lan"]);
    }

    #[test]
    fn validate_rejects_missing_fields_and_bad_ports() {
        assert_eq!(
            input("", "h", Some(80)).validate(),
            Err(ValidationError::MissingField("name"))
        );
        assert_eq!(
            input("n", "   ", Some(80)).validate(),
            Err(ValidationError::MissingField("host"))
        );
        assert_eq!(
            input("n", "h", None).validate(),
            Err(ValidationError::MissingField("port"))
        );
        assert_eq!(
            input("n", "h", Some(0)).validate(),
            Err(ValidationError::PortOutOfRange(0))
        );
        assert_eq!(
            input("n", "h", Some(65536)).validate(),
            Err(ValidationError::PortOutOfRange(65536))
        );
    }

    #[test]
    fn profile_accepts_string_port_and_missing_optionals() {
        let json = r#"{"id":"1","name":"a","type":"http","host":"h","port":"8080"}"#;
        let profile: ServerProfile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.port, 8080);
        assert!(profile.exclude_list.is_empty());
        assert!(!profile.has_credentials());
    }

    #[test]
    fn profile_serializes_with_camel_case_keys() {
        let profile = ServerProfile::from_input(
            input("a", "h", Some(1)).validate().unwrap(),
        );
        let value = serde_json::to_value(&profile).unwrap();
        assert!(value.get("excludeList").is_some());
        assert_eq!(value["type"], "http");
    }

    #[test]
    fn credentials_require_both_halves() {
        let mut profile = ServerProfile::from_input(input("a", "h", Some(1)).validate().unwrap());
        profile.username = "user".into();
        assert!(!profile.has_credentials());
        profile.password = "secret".into();
        assert!(profile.has_credentials());
    }

    #[test]
    fn validate_rejects_credentials_that_break_the_pac_directive() {
        for (user, pass) in [
            ("alice", "a\"b"),
            ("alice", "my pass"),
            ("alice", "x;DIRECT"),
            ("alice", "back\\slash"),
            ("alice", "p@ss"),
            ("al:ice", "secret"),
            ("al ice", "secret"),
        ] {
            let mut form = input("n", "h", Some(3128));
            form.username = Some(user.into());
            form.password = Some(pass.into());
            assert!(
                matches!(form.validate(), Err(ValidationError::InvalidCredentials(_))),
                "{user:?}/{pass:?} should be rejected"
            );
        }

        let mut form = input("n", "h", Some(3128));
        form.username = Some("alice".into());
        form.password = Some("p:ss-W0rd!".into());
        let valid = form.validate().expect("colon is fine in a password");
        assert_eq!(valid.password, "p:ss-W0rd!");
    }
}
