//! Key-value storage areas and the extension state record

mod memory_store;
mod sqlite_store;
mod state_store;

pub use memory_store::MemoryStore;
pub use sqlite_store::{SqliteAreaStore, SqliteDatabase};
pub use state_store::{deep_merge, merge_with_defaults, SaveOutcome, StateStore};

use serde_json::Value;

/// Primary state record, synced area.
pub const STATE_KEY: &str = "proxyState";
/// Backup of the state record, local area.
pub const BACKUP_KEY: &str = "proxyStateBackup";
/// UI language preference, synced area.
pub const LANGUAGE_KEY: &str = "language";
/// Release waiting to be installed, local area.
pub const PENDING_UPDATE_KEY: &str = "pendingUpdate";

/// Which logical storage area a store represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageArea {
    /// Follows the user across installs.
    Sync,
    /// Stays on this machine.
    Local,
}

impl StorageArea {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageArea::Sync => "sync",
            StorageArea::Local => "local",
        }
    }
}

/// Blocking key-value store holding JSON values.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> anyhow::Result<Option<Value>>;
    fn set(&self, key: &str, value: &Value) -> anyhow::Result<()>;
    fn remove(&self, key: &str) -> anyhow::Result<()>;
}
