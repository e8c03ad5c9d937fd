// store.rs - JSON Row Store
// Small key -> row table persisted as one pretty-printed JSON file. Cogs keep
// per-guild settings here; every write is flushed straight to disk so a crash
// never loses an acknowledged change.
//
// Used by: commands/preferences.rs

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::error::StoreError;

pub struct JsonStore<V> {
    path: PathBuf,
    rows: RwLock<HashMap<String, V>>,
}

impl<V> JsonStore<V>
where
    V: Serialize + DeserializeOwned + Clone + Send + Sync,
{
    /// Open the table at `dir/<table>.json`; a missing file is an empty table.
    pub async fn open(dir: &Path, table: &str) -> Result<Self, StoreError> {
        let path = dir.join(format!("{}.json", table));
        let rows = match tokio::fs::read_to_string(&path).await {
            Ok(content) => serde_json::from_str(&content).map_err(|source| StoreError::Json {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        info!("[STORE] 📂 Opened {} with {} row(s)", path.display(), rows.len());
        Ok(Self {
            path,
            rows: RwLock::new(rows),
        })
    }

    pub async fn get(&self, key: &str) -> Option<V> {
        self.rows.read().await.get(key).cloned()
    }

    /// Insert or replace a row and flush the table.
    pub async fn set(&self, key: &str, value: V) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        rows.insert(key.to_string(), value);
        self.flush(&rows).await
    }

    /// Remove a row; returns whether it existed.
    pub async fn remove(&self, key: &str) -> Result<bool, StoreError> {
        let mut rows = self.rows.write().await;
        if rows.remove(key).is_none() {
            return Ok(false);
        }
        self.flush(&rows).await?;
        Ok(true)
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    async fn flush(&self, rows: &HashMap<String, V>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| StoreError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let json = serde_json::to_string_pretty(rows).map_err(|source| StoreError::Json {
            path: self.path.clone(),
            source,
        })?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|source| StoreError::Io {
                path: self.path.clone(),
                source,
            })?;

        debug!("[STORE] 💾 Saved {} row(s) to {}", rows.len(), self.path.display());
        Ok(())
    }
}
