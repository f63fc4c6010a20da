//! JSON command messages exchanged with the presentation layer.
//!
//! Inbound messages are objects tagged by `action`; responses keep the shapes the
//! popup already understands (`{ success: true }`, `{ server }`, `{ updateInfo }`, ...).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ManagerError;
use crate::i18n::Language;
use crate::models::{
    DiagnosticReport, PopupState, ProxySettings, ServerInput, ServerProfile, UpdateInfo,
    UpdateSettings,
};

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Request {
    GetState,
    ToggleProxy {
        enabled: bool,
    },
    ToggleDnsProxy {
        enabled: bool,
    },
    SelectServer {
        #[serde(rename = "serverId")]
        server_id: String,
    },
    AddServer {
        #[serde(rename = "serverData")]
        server_data: ServerInput,
    },
    UpdateServer {
        #[serde(rename = "serverId")]
        server_id: String,
        #[serde(rename = "serverData")]
        server_data: ServerInput,
    },
    DeleteServer {
        #[serde(rename = "serverId")]
        server_id: String,
    },
    GetServer {
        #[serde(rename = "serverId")]
        server_id: String,
    },
    GetServerDetails {
        #[serde(rename = "serverId")]
        server_id: String,
    },
    TestProxyServer {
        server: ServerInput,
    },
    CheckForUpdates,
    ToggleAutoUpdate {
        enabled: bool,
    },
    GetUpdateSettings,
    GetProxyDiagnostics,
    ForceApplyProxy,
    GetLanguage,
    SetLanguage {
        language: String,
    },
    RestoreBackup,
}

const ACTIONS: &[&str] = &[
    "getState",
    "toggleProxy",
    "toggleDnsProxy",
    "selectServer",
    "addServer",
    "updateServer",
    "deleteServer",
    "getServer",
    "getServerDetails",
    "testProxyServer",
    "checkForUpdates",
    "toggleAutoUpdate",
    "getUpdateSettings",
    "getProxyDiagnostics",
    "forceApplyProxy",
    "getLanguage",
    "setLanguage",
    "restoreBackup",
];

impl Request {
    /// Decode a raw message, telling unknown actions apart from bad payloads.
    pub fn parse(raw: &Value) -> Result<Self, ManagerError> {
        let action = raw
            .get("action")
            .and_then(Value::as_str)
            .ok_or_else(|| ManagerError::InvalidPayload {
                action: String::new(),
                reason: "missing `action`".into(),
            })?;
        if !ACTIONS.contains(&action) {
            return Err(ManagerError::UnknownAction(action.to_string()));
        }
        serde_json::from_value(raw.clone()).map_err(|e| ManagerError::InvalidPayload {
            action: action.to_string(),
            reason: e.to_string(),
        })
    }

    pub fn action(&self) -> &'static str {
        match self {
            Request::GetState => "getState",
            Request::ToggleProxy { .. } => "toggleProxy",
            Request::ToggleDnsProxy { .. } => "toggleDnsProxy",
            Request::SelectServer { .. } => "selectServer",
            Request::AddServer { .. } => "addServer",
            Request::UpdateServer { .. } => "updateServer",
            Request::DeleteServer { .. } => "deleteServer",
            Request::GetServer { .. } => "getServer",
            Request::GetServerDetails { .. } => "getServerDetails",
            Request::TestProxyServer { .. } => "testProxyServer",
            Request::CheckForUpdates => "checkForUpdates",
            Request::ToggleAutoUpdate { .. } => "toggleAutoUpdate",
            Request::GetUpdateSettings => "getUpdateSettings",
            Request::GetProxyDiagnostics => "getProxyDiagnostics",
            Request::ForceApplyProxy => "forceApplyProxy",
            Request::GetLanguage => "getLanguage",
            Request::SetLanguage { .. } => "setLanguage",
            Request::RestoreBackup => "restoreBackup",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    State(PopupState),
    Server {
        server: Option<ServerProfile>,
    },
    ServerDetails {
        success: bool,
        server: ServerProfile,
    },
    ProbeResult {
        success: bool,
        result: DiagnosticReport,
    },
    Update {
        #[serde(rename = "updateInfo")]
        update_info: UpdateInfo,
    },
    UpdateSettings {
        #[serde(rename = "updateSettings")]
        update_settings: UpdateSettings,
        #[serde(rename = "currentVersion")]
        current_version: String,
    },
    Diagnostics {
        diagnostics: Option<ProxySettings>,
    },
    Language {
        language: Language,
    },
    Message {
        success: bool,
        message: String,
    },
    Failure {
        success: bool,
        error: String,
    },
    Ack {
        success: bool,
    },
}

impl Response {
    pub fn ok() -> Self {
        Response::Ack { success: true }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Response::Failure {
            success: false,
            error: error.into(),
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|e| {
            serde_json::json!({ "success": false, "error": e.to_string() })
        })
    }
}
