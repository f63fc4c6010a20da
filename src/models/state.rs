//! Persisted extension state.

use flutter_rust_bridge::frb;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::ServerProfile;

pub const DEFAULT_UPDATE_URL: &str =
    "https://api.github.com/repos/kalkalch/chromeproxy/releases/latest";
/// One hour.
pub const DEFAULT_CHECK_INTERVAL_MS: u64 = 60 * 60 * 1000;
/// Interval shipped by releases before 1.0.1.
pub const LEGACY_CHECK_INTERVAL_MS: u64 = 24 * 60 * 60 * 1000;
pub const DEFAULT_MAX_RETRIES: u32 = 5;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 5000;
pub const SETTINGS_VERSION: &str = "0.0.1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[frb]
pub struct UpdateSettings {
    pub auto_check: bool,
    pub auto_install: bool,
    /// Milliseconds since epoch of the last successful check.
    pub last_check: Option<i64>,
    pub check_interval: u64,
    pub update_url: String,
    pub max_retries: u32,
    pub retry_delay: u64,
    pub current_retries: u32,
    /// Keys written by a newer release; carried through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for UpdateSettings {
    fn default() -> Self {
        Self {
            auto_check: true,
            auto_install: false,
            last_check: None,
            check_interval: DEFAULT_CHECK_INTERVAL_MS,
            update_url: DEFAULT_UPDATE_URL.to_string(),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY_MS,
            current_retries: 0,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[frb]
pub struct ExtensionState {
    pub enabled: bool,
    pub dns_enabled: bool,
    pub servers: Vec<ServerProfile>,
    pub active_server_id: Option<String>,
    pub update_settings: UpdateSettings,
    pub settings_version: String,
    pub last_extension_version: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for ExtensionState {
    fn default() -> Self {
        Self {
            enabled: false,
            dns_enabled: false,
            servers: Vec::new(),
            active_server_id: None,
            update_settings: UpdateSettings::default(),
            settings_version: SETTINGS_VERSION.to_string(),
            last_extension_version: None,
            extra: Map::new(),
        }
    }
}

impl ExtensionState {
    pub fn server(&self, id: &str) -> Option<&ServerProfile> {
        self.servers.iter().find(|s| s.id == id)
    }

    pub fn server_index(&self, id: &str) -> Option<usize> {
        self.servers.iter().position(|s| s.id == id)
    }

    pub fn active_server(&self) -> Option<&ServerProfile> {
        self.active_server_id
            .as_deref()
            .and_then(|id| self.server(id))
    }

    /// Clear a dangling active pointer. Returns true when something changed.
    pub fn repair(&mut self) -> bool {
        let dangling = matches!(
            self.active_server_id.as_deref(),
            Some(id) if self.server(id).is_none()
        );
        if dangling {
            self.active_server_id = None;
            self.enabled = false;
        }
        dangling
    }

    pub fn popup_view(&self) -> PopupState {
        PopupState {
            enabled: self.enabled,
            dns_enabled: self.dns_enabled,
            servers: self
                .servers
                .iter()
                .map(|server| ServerView {
                    active: self.active_server_id.as_deref() == Some(server.id.as_str()),
                    server: server.clone(),
                })
                .collect(),
        }
    }
}

/// Snapshot sent to the popup for rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
#[frb]
pub struct PopupState {
    pub enabled: bool,
    pub dns_enabled: bool,
    pub servers: Vec<ServerView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[frb]
pub struct ServerView {
    #[serde(flatten)]
    pub server: ServerProfile,
    pub active: bool,
}

/// Copy of the state written to local storage before every primary save.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupRecord {
    pub timestamp: i64,
    pub version: String,
    pub state: Value,
}

/// Release noted by the auto-install flow, waiting for the user to install it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingUpdate {
    pub version: String,
    pub download_url: String,
    pub timestamp: i64,
}
