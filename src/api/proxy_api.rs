//! Proxy manager API for Flutter
//!
//! This module exposes the manager lifecycle and the JSON message boundary to the UI.

use flutter_rust_bridge::frb;
use once_cell::sync::Lazy;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast::{self, error::TryRecvError};

use crate::i18n::Language;
use crate::manager::{ManagerHandle, ProxyManager};
use crate::net::ReqwestClient;
use crate::notify::{BroadcastNotifier, ManagerEvent};
use crate::platform;
use crate::storage::{SqliteDatabase, StateStore, StorageArea};

/// Outbound events shared by every manager instance in this process.
static EVENTS: Lazy<BroadcastNotifier> = Lazy::new(|| BroadcastNotifier::new(256));

/// Running manager, if any.
static MANAGER: Lazy<Mutex<Option<ManagerHandle>>> = Lazy::new(|| Mutex::new(None));

/// Receiver drained by [`take_events`]; created when the manager starts.
static EVENT_QUEUE: Lazy<Mutex<Option<broadcast::Receiver<ManagerEvent>>>> =
    Lazy::new(|| Mutex::new(None));

/// Get the version of the proxy manager core library
#[frb(sync)]
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Initialize the core library (call once at startup)
/// `storage_path` is used to store log files in release mode
#[allow(unused_variables)]
pub fn init_core(storage_path: Option<String>) -> Result<bool, String> {
    if std::env::var_os("RUST_LOG").is_none() {
        std::env::set_var("RUST_LOG", "info");
    }

    #[cfg(debug_assertions)]
    {
        // Debug mode: log to console (stderr)
        let level = resolve_log_level();
        let _ = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_writer(std::io::stderr)
            .try_init();
    }

    #[cfg(not(debug_assertions))]
    {
        // Release mode: log to file
        let level = resolve_log_level();

        let log_dir = storage_path
            .as_ref()
            .map(|p| PathBuf::from(p).join("logs"))
            .unwrap_or_else(|| PathBuf::from("logs"));

        std::fs::create_dir_all(&log_dir).map_err(|e| {
            format!(
                "Failed to create log directory {}: {}",
                log_dir.display(),
                e
            )
        })?;
        let file_appender = tracing_appender::rolling::daily(&log_dir, "proxymanager_core");
        let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

        // Logging lasts until program exit
        std::mem::forget(_guard);

        let _ = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_writer(non_blocking)
            .try_init();
    }

    tracing::info!(
        "Proxy manager core initialized v{}",
        env!("CARGO_PKG_VERSION")
    );
    Ok(true)
}

pub(crate) fn resolve_log_level() -> tracing::level_filters::LevelFilter {
    use tracing::level_filters::LevelFilter;

    match std::env::var("RUST_LOG") {
        Ok(val) => match val.to_lowercase().as_str() {
            "trace" => LevelFilter::TRACE,
            "debug" => LevelFilter::DEBUG,
            "info" => LevelFilter::INFO,
            "warn" | "warning" => LevelFilter::WARN,
            "error" => LevelFilter::ERROR,
            _ => LevelFilter::INFO,
        },
        Err(_) => LevelFilter::INFO,
    }
}

/// Manager configuration
#[frb]
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Directory holding the settings database
    pub storage_path: String,
    /// Version stamped into state and compared against release tags
    pub extension_version: String,
    /// UI language used until the user picks one ("en" or "ru")
    pub default_language: String,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        let storage_path = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("proxymanager");
        Self {
            storage_path: storage_path.to_string_lossy().into_owned(),
            extension_version: env!("CARGO_PKG_VERSION").to_string(),
            default_language: Language::default().code().to_string(),
        }
    }
}

/// Create a default manager configuration
#[frb(sync)]
pub fn create_default_config() -> ManagerConfig {
    ManagerConfig::default()
}

/// Build a manager backed by SQLite storage and the host's proxy settings.
pub fn build_manager(config: &ManagerConfig) -> anyhow::Result<ProxyManager> {
    let db = SqliteDatabase::open(&config.storage_path)?;
    tracing::info!("Settings database at {}", db.path().display());

    let store = StateStore::new(
        Arc::new(db.area(StorageArea::Sync)),
        Arc::new(db.area(StorageArea::Local)),
        config.extension_version.clone(),
    );
    let adapter = platform::default_adapter();
    let http = Arc::new(ReqwestClient::new(Arc::clone(&adapter)));
    let notifier = Arc::new(EVENTS.clone());

    Ok(ProxyManager::new(
        store,
        adapter,
        http,
        notifier,
        config.extension_version.clone(),
    )
    .with_default_language(Language::from_code(&config.default_language)))
}

fn current_handle() -> Result<ManagerHandle, String> {
    MANAGER
        .lock()
        .map_err(|e| e.to_string())?
        .clone()
        .ok_or_else(|| "Proxy manager is not running".to_string())
}

/// Start the proxy manager. Starting twice is a no-op.
pub async fn start_manager(config: ManagerConfig) -> Result<bool, String> {
    let mut slot = MANAGER.lock().map_err(|e| e.to_string())?;
    if slot.is_some() {
        tracing::info!("Proxy manager already running");
        return Ok(true);
    }

    tracing::info!(
        "Starting proxy manager v{} (storage: {})",
        config.extension_version,
        config.storage_path
    );
    let manager = build_manager(&config).map_err(|e| {
        tracing::error!("Failed to start proxy manager: {:#}", e);
        e.to_string()
    })?;

    if let Ok(mut queue) = EVENT_QUEUE.lock() {
        *queue = Some(EVENTS.subscribe());
    }
    let (handle, _task) = ManagerHandle::spawn(manager);
    *slot = Some(handle);
    Ok(true)
}

/// Stop the running manager and cancel any scheduled update check.
pub async fn stop_manager() -> Result<bool, String> {
    let handle = MANAGER.lock().map_err(|e| e.to_string())?.take();
    let Some(handle) = handle else {
        return Ok(false);
    };
    tracing::info!("Stopping proxy manager");
    handle.shutdown().await;
    Ok(true)
}

#[frb(sync)]
pub fn is_manager_running() -> bool {
    MANAGER.lock().map(|slot| slot.is_some()).unwrap_or(false)
}

/// Send one JSON message (`{"action": ...}`) and get the JSON response back.
///
/// Command failures come back as `{"success":false,"error":...}`; the `Err` side
/// is reserved for malformed JSON and a stopped manager.
pub async fn send_message(message_json: String) -> Result<String, String> {
    let raw: serde_json::Value =
        serde_json::from_str(&message_json).map_err(|e| format!("Invalid message: {}", e))?;
    let handle = current_handle()?;
    let response = handle.dispatch_json(&raw).await;
    serde_json::to_string(&response).map_err(|e| e.to_string())
}

/// Drain events emitted since the last call, each serialized as JSON.
#[frb(sync)]
pub fn take_events() -> Vec<String> {
    let Ok(mut queue) = EVENT_QUEUE.lock() else {
        return Vec::new();
    };
    let Some(rx) = queue.as_mut() else {
        return Vec::new();
    };

    let mut events = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(json) => events.push(json),
                Err(e) => tracing::warn!("Failed to serialize event: {}", e),
            },
            Err(TryRecvError::Lagged(skipped)) => {
                tracing::warn!("Event queue lagged, {} events dropped", skipped);
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
        }
    }
    events
}

/// Live event stream for in-process consumers.
#[frb(ignore)]
pub fn subscribe_events() -> broadcast::Receiver<ManagerEvent> {
    EVENTS.subscribe()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use serial_test::serial;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> ManagerConfig {
        ManagerConfig {
            storage_path: dir.path().to_string_lossy().into_owned(),
            extension_version: "1.0.1".into(),
            default_language: "en".into(),
        }
    }

    async fn send(message: Value) -> Value {
        let raw = send_message(message.to_string()).await.unwrap();
        serde_json::from_str(&raw).unwrap()
    }

    #[test]
    fn default_config_points_into_data_dir() {
        let config = create_default_config();
        assert!(config.storage_path.ends_with("proxymanager"));
        assert_eq!(config.extension_version, get_version());
        assert_eq!(config.default_language, "en");
    }

    #[test]
    #[serial]
    fn log_level_follows_rust_log() {
        std::env::set_var("RUST_LOG", "debug");
        assert_eq!(
            resolve_log_level(),
            tracing::level_filters::LevelFilter::DEBUG
        );
        std::env::set_var("RUST_LOG", "chatty");
        assert_eq!(resolve_log_level(), tracing::level_filters::LevelFilter::INFO);
        std::env::remove_var("RUST_LOG");
    }

    #[tokio::test]
    #[serial]
    async fn messages_require_running_manager() {
        let _ = stop_manager().await;
        let err = send_message(json!({"action": "getState"}).to_string())
            .await
            .unwrap_err();
        assert!(err.contains("not running"));
        assert!(send_message("{not json".into()).await.is_err());
    }

    #[tokio::test]
    #[serial]
    async fn lifecycle_persists_servers_across_restarts() {
        let dir = TempDir::new().unwrap();
        let _ = stop_manager().await;
        {
            // Keep the scheduler from reaching the network.
            use crate::storage::{KeyValueStore, STATE_KEY};
            let db = SqliteDatabase::open(&config(&dir).storage_path).unwrap();
            db.area(StorageArea::Sync)
                .set(STATE_KEY, &json!({"updateSettings": {"autoCheck": false}}))
                .unwrap();
        }

        assert!(start_manager(config(&dir)).await.unwrap());
        assert!(is_manager_running());
        assert_eq!(
            send(json!({
                "action": "addServer",
                "serverData": {"name": "Office", "type": "http", "host": "10.0.0.1", "port": 3128}
            }))
            .await,
            json!({"success": true})
        );
        assert_eq!(
            send(json!({"action": "reboot"})).await,
            json!({"success": false, "error": "Unknown action: reboot"})
        );
        assert!(stop_manager().await.unwrap());
        assert!(!is_manager_running());

        start_manager(config(&dir)).await.unwrap();
        let state = send(json!({"action": "getState"})).await;
        assert_eq!(state["servers"][0]["name"], "Office");
        assert_eq!(state["servers"][0]["active"], true);
        let settings = send(json!({"action": "getUpdateSettings"})).await;
        assert_eq!(settings["updateSettings"]["autoCheck"], false);
        assert_eq!(settings["currentVersion"], "1.0.1");

        let events = take_events();
        assert!(events.iter().any(|e| e.contains("statusChanged")));
        stop_manager().await.unwrap();
    }
}
