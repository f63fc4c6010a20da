//! Load/save of the extension state with a local backup copy.

use super::{KeyValueStore, BACKUP_KEY, LANGUAGE_KEY, PENDING_UPDATE_KEY, STATE_KEY};
use crate::i18n::Language;
use crate::models::{BackupRecord, ExtensionState, PendingUpdate, ServerProfile};
use anyhow::Context;
use serde_json::{Map, Value};
use std::sync::Arc;

/// What happened to a save request. Never surfaced as a command failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    /// Primary write failed; in-memory state was reloaded from the backup.
    RestoredFromBackup,
    /// Primary write failed and no usable backup was found.
    Failed,
}

#[derive(Clone)]
pub struct StateStore {
    sync: Arc<dyn KeyValueStore>,
    local: Arc<dyn KeyValueStore>,
    version: String,
}

impl StateStore {
    pub fn new(
        sync: Arc<dyn KeyValueStore>,
        local: Arc<dyn KeyValueStore>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            sync,
            local,
            version: version.into(),
        }
    }

    /// Last saved state merged over defaults; defaults on any failure.
    pub async fn load(&self) -> ExtensionState {
        let sync = Arc::clone(&self.sync);
        let loaded = tokio::task::spawn_blocking(move || sync.get(STATE_KEY))
            .await
            .context("state load task panicked")
            .and_then(|res| res);

        match loaded {
            Ok(Some(raw)) => match decode_state(&raw) {
                Ok(state) => state,
                Err(err) => {
                    tracing::warn!(?err, "Stored state is unreadable; using defaults");
                    ExtensionState::default()
                }
            },
            Ok(None) => ExtensionState::default(),
            Err(err) => {
                tracing::error!(?err, "Error loading state; using defaults");
                ExtensionState::default()
            }
        }
    }

    /// Write a backup, then the primary record. On primary failure the backup is
    /// read back into `state`.
    pub async fn save(&self, state: &mut ExtensionState) -> SaveOutcome {
        let snapshot = match serde_json::to_value(&*state) {
            Ok(value) => value,
            Err(err) => {
                tracing::error!(?err, "Failed to serialize state");
                return SaveOutcome::Failed;
            }
        };

        if let Err(err) = self.write_backup(snapshot.clone()).await {
            tracing::warn!(?err, "Error creating backup");
        }

        let sync = Arc::clone(&self.sync);
        let primary = tokio::task::spawn_blocking(move || sync.set(STATE_KEY, &snapshot))
            .await
            .context("state save task panicked")
            .and_then(|res| res);

        let Err(err) = primary else {
            return SaveOutcome::Saved;
        };
        tracing::error!(?err, "Error saving state");

        match self.restore_from_backup().await {
            Ok(Some(restored)) => {
                *state = restored;
                tracing::info!("Restored settings from backup after save failure");
                SaveOutcome::RestoredFromBackup
            }
            Ok(None) => SaveOutcome::Failed,
            Err(err) => {
                tracing::error!(?err, "Failed to restore from backup");
                SaveOutcome::Failed
            }
        }
    }

    /// Read the backup record, if any, merged over defaults.
    pub async fn restore_from_backup(&self) -> anyhow::Result<Option<ExtensionState>> {
        let local = Arc::clone(&self.local);
        let raw = tokio::task::spawn_blocking(move || local.get(BACKUP_KEY)).await??;
        let Some(raw) = raw else {
            return Ok(None);
        };
        let record: BackupRecord =
            serde_json::from_value(raw).context("decoding backup record")?;
        tracing::info!(
            "Restoring from backup created at {} (version {})",
            chrono::DateTime::from_timestamp_millis(record.timestamp)
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| record.timestamp.to_string()),
            record.version
        );
        decode_state(&record.state).map(Some)
    }

    /// Stored UI language, if the user ever picked one.
    pub async fn load_language(&self) -> anyhow::Result<Option<Language>> {
        let sync = Arc::clone(&self.sync);
        let raw = tokio::task::spawn_blocking(move || sync.get(LANGUAGE_KEY)).await??;
        Ok(raw
            .as_ref()
            .and_then(Value::as_str)
            .map(Language::from_code))
    }

    pub async fn save_language(&self, language: Language) -> anyhow::Result<()> {
        let sync = Arc::clone(&self.sync);
        let value = Value::String(language.code().to_string());
        tokio::task::spawn_blocking(move || sync.set(LANGUAGE_KEY, &value))
            .await
            .context("language save task panicked")?
    }

    pub async fn save_pending_update(&self, pending: &PendingUpdate) -> anyhow::Result<()> {
        let payload = serde_json::to_value(pending)?;
        let local = Arc::clone(&self.local);
        tokio::task::spawn_blocking(move || local.set(PENDING_UPDATE_KEY, &payload))
            .await
            .context("pending update save task panicked")?
    }

    async fn write_backup(&self, state: Value) -> anyhow::Result<()> {
        let record = BackupRecord {
            timestamp: chrono::Utc::now().timestamp_millis(),
            version: self.version.clone(),
            state,
        };
        let payload = serde_json::to_value(record)?;
        let local = Arc::clone(&self.local);
        tokio::task::spawn_blocking(move || local.set(BACKUP_KEY, &payload)).await??;
        Ok(())
    }
}

fn decode_state(raw: &Value) -> anyhow::Result<ExtensionState> {
    let mut merged = merge_with_defaults(raw);
    if let Some(servers) = merged.get_mut("servers") {
        drop_unreadable_servers(servers);
    }
    let mut state: ExtensionState =
        serde_json::from_value(merged).context("decoding merged state")?;
    if state.repair() {
        tracing::warn!("Active server pointed at a missing profile; proxy disabled");
    }
    Ok(state)
}

/// Drop server entries that no longer decode, keeping the rest.
fn drop_unreadable_servers(servers: &mut Value) {
    let Value::Array(entries) = servers else {
        tracing::warn!("Stored server list is not an array; starting with none");
        *servers = Value::Array(Vec::new());
        return;
    };
    entries.retain(|entry| match serde_json::from_value::<ServerProfile>(entry.clone()) {
        Ok(_) => true,
        Err(err) => {
            tracing::warn!(id = ?entry.get("id"), %err, "Dropping unreadable server profile");
            false
        }
    });
}

fn default_state_value() -> Value {
    serde_json::to_value(ExtensionState::default()).unwrap_or_else(|_| Value::Object(Map::new()))
}

/// Overlay a loaded record onto the default state.
pub fn merge_with_defaults(loaded: &Value) -> Value {
    deep_merge(&default_state_value(), loaded)
}

/// Objects merge key by key; any other loaded value (arrays and null included)
/// replaces the target outright.
pub fn deep_merge(target: &Value, source: &Value) -> Value {
    let Value::Object(source_map) = source else {
        return target.clone();
    };
    let mut result = match target {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };
    for (key, value) in source_map {
        let merged = match value {
            Value::Object(_) => {
                let base = result
                    .get(key)
                    .cloned()
                    .unwrap_or_else(|| Value::Object(Map::new()));
                deep_merge(&base, value)
            }
            other => other.clone(),
        };
        result.insert(key.clone(), merged);
    }
    Value::Object(result)
}
