use super::{KeyValueStore, StorageArea};
use anyhow::Context;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

const DB_FILE_NAME: &str = "proxymanager.sqlite";

/// SQLite file backing both storage areas.
#[derive(Clone)]
pub struct SqliteDatabase {
    db: Arc<Mutex<Connection>>,
    db_path: PathBuf,
}

impl SqliteDatabase {
    pub fn open(base_path: &str) -> anyhow::Result<Self> {
        let dir = Path::new(base_path);
        if !dir.exists() {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating storage directory {:?}", dir))?;
        }
        let db_path = dir.join(DB_FILE_NAME);
        let conn = Connection::open(&db_path)
            .with_context(|| format!("opening database at {:?}", db_path))?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS kv (
                area TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (area, key)
            );
            ",
        )?;

        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
            db_path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Handle scoped to one storage area.
    pub fn area(&self, area: StorageArea) -> SqliteAreaStore {
        SqliteAreaStore {
            db: Arc::clone(&self.db),
            area,
        }
    }
}

pub struct SqliteAreaStore {
    db: Arc<Mutex<Connection>>,
    area: StorageArea,
}

impl SqliteAreaStore {
    fn conn(&self) -> anyhow::Result<std::sync::MutexGuard<'_, Connection>> {
        self.db
            .lock()
            .map_err(|e| anyhow::anyhow!("db mutex poisoned: {}", e))
    }
}

impl KeyValueStore for SqliteAreaStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<Value>> {
        let conn = self.conn()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT value FROM kv WHERE area = ?1 AND key = ?2",
                params![self.area.as_str(), key],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("reading {}/{}", self.area.as_str(), key))?;
        raw.map(|data| serde_json::from_str(&data).context("decoding stored value"))
            .transpose()
    }

    fn set(&self, key: &str, value: &Value) -> anyhow::Result<()> {
        let payload = serde_json::to_string(value)?;
        let now = chrono::Utc::now().timestamp_millis();
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO kv (area, key, value, updated_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![self.area.as_str(), key, payload, now],
        )
        .with_context(|| format!("writing {}/{}", self.area.as_str(), key))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> anyhow::Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "DELETE FROM kv WHERE area = ?1 AND key = ?2",
            params![self.area.as_str(), key],
        )
        .with_context(|| format!("removing {}/{}", self.area.as_str(), key))?;
        Ok(())
    }
}
