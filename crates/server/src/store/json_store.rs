//! JSON-file counter store.
//!
//! Persists the whole counter map as one JSON object under the configured
//! data directory, using atomic writes (temp file + rename) for durability.
//! Atomicity of the increment itself comes from holding the write lock
//! across the read-modify-write.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::info;

use super::CounterStore;

pub struct JsonCounterStore {
    path: PathBuf,
    counters: RwLock<HashMap<String, u64>>,
}

impl JsonCounterStore {
    /// Open (or create) the store file `<namespace>.json` under `data_dir`.
    pub async fn open(data_dir: impl Into<PathBuf>, namespace: &str) -> Result<Self> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir)
            .await
            .with_context(|| format!("failed to create data dir {:?}", data_dir))?;
        let path = data_dir.join(format!("{}.json", namespace));

        let counters: HashMap<String, u64> = match fs::read_to_string(&path).await {
            Ok(content) => serde_json::from_str(&content)
                .with_context(|| format!("failed to parse counter file {:?}", path))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read counter file {:?}", path))
            }
        };

        info!(
            "counter store opened at {:?} with {} counters",
            path,
            counters.len()
        );

        Ok(Self {
            path,
            counters: RwLock::new(counters),
        })
    }

    /// Write the full counter map to disk atomically.
    async fn save(&self, counters: &HashMap<String, u64>) -> Result<()> {
        let temp_path = self.path.with_extension("tmp");
        let json = serde_json::to_string_pretty(counters)?;

        fs::write(&temp_path, json).await?;
        fs::rename(&temp_path, &self.path).await?;

        Ok(())
    }
}

#[async_trait]
impl CounterStore for JsonCounterStore {
    async fn increment(&self, id: &str) -> Result<u64> {
        let mut counters = self.counters.write().await;
        let entry = counters.entry(id.to_string()).or_insert(0);
        *entry += 1;
        let value = *entry;

        self.save(&counters).await?;
        Ok(value)
    }

    async fn read_all(&self) -> Result<HashMap<String, u64>> {
        Ok(self.counters.read().await.clone())
    }

    async fn reset(&self, ids: &[String]) -> Result<()> {
        let mut counters = self.counters.write().await;
        for id in ids {
            counters.insert(id.clone(), 0);
        }
        self.save(&counters).await?;
        Ok(())
    }
}
