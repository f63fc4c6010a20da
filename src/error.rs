//! Error types surfaced by manager commands.

use thiserror::Error;

use crate::i18n::{self, Language, Message};

/// Rejection of malformed server form input. Raised before any state mutation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("required field `{0}` is empty")]
    MissingField(&'static str),
    #[error("port {0} is outside 1-65535")]
    PortOutOfRange(i64),
    /// Credentials are embedded in a PAC directive and must survive it verbatim.
    #[error("`{0}` contains a character not allowed in proxy credentials")]
    InvalidCredentials(&'static str),
}

/// Failure of a user-initiated command.
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("server not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("no servers available to connect")]
    NoServers,
    #[error("proxy permission is not granted")]
    PermissionMissing,
    #[error("proxy configuration failed: {0}")]
    Host(anyhow::Error),
    #[error("no active server or proxy is disabled")]
    NoActiveServer,
    #[error("unknown action: {0}")]
    UnknownAction(String),
    #[error("invalid payload for `{action}`: {reason}")]
    InvalidPayload { action: String, reason: String },
    #[error("manager is not running")]
    Closed,
}

impl ManagerError {
    /// Message shown to the user in the selected language.
    pub fn localized(&self, lang: Language) -> String {
        match self {
            ManagerError::NotFound(_) => i18n::text(lang, Message::ServerNotFound).to_string(),
            ManagerError::Validation(ValidationError::MissingField(_)) => {
                i18n::text(lang, Message::FillAllFields).to_string()
            }
            ManagerError::Validation(ValidationError::PortOutOfRange(_)) => {
                i18n::text(lang, Message::PortRange).to_string()
            }
            ManagerError::Validation(ValidationError::InvalidCredentials(_)) => {
                i18n::text(lang, Message::InvalidCredentials).to_string()
            }
            ManagerError::NoServers => i18n::text(lang, Message::NoServersAvailable).to_string(),
            ManagerError::PermissionMissing => {
                i18n::text(lang, Message::PermissionMissing).to_string()
            }
            ManagerError::Host(err) => format!(
                "{}: {}",
                i18n::text(lang, Message::ProxyError),
                err
            ),
            ManagerError::NoActiveServer => i18n::text(lang, Message::NoActiveServer).to_string(),
            ManagerError::UnknownAction(action) => format!("Unknown action: {action}"),
            ManagerError::InvalidPayload { .. } => self.to_string(),
            ManagerError::Closed => self.to_string(),
        }
    }
}
