//! In-memory counter store.
//!
//! The default when no data directory is configured; counters start at zero
//! on every boot.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;

use super::CounterStore;

pub struct MemoryCounterStore {
    counters: RwLock<HashMap<String, u64>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self {
            counters: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryCounterStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn increment(&self, id: &str) -> Result<u64> {
        let mut counters = self.counters.write().await;
        let value = counters.entry(id.to_string()).or_insert(0);
        *value += 1;
        Ok(*value)
    }

    async fn read_all(&self) -> Result<HashMap<String, u64>> {
        Ok(self.counters.read().await.clone())
    }

    async fn reset(&self, ids: &[String]) -> Result<()> {
        let mut counters = self.counters.write().await;
        for id in ids {
            counters.insert(id.clone(), 0);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_increment_upserts_and_counts() {
        let store = MemoryCounterStore::new();
        assert_eq!(store.increment("meepo").await.unwrap(), 1);
        assert_eq!(store.increment("meepo").await.unwrap(), 2);
        assert_eq!(store.increment("nexius").await.unwrap(), 1);

        let all = store.read_all().await.unwrap();
        assert_eq!(all.get("meepo"), Some(&2));
        assert_eq!(all.get("nexius"), Some(&1));
    }

    #[tokio::test]
    async fn test_reset_zeroes_given_ids() {
        let store = MemoryCounterStore::new();
        store.increment("meepo").await.unwrap();
        store.reset(&["meepo".to_string(), "kenangan".to_string()]).await.unwrap();

        let all = store.read_all().await.unwrap();
        assert_eq!(all.get("meepo"), Some(&0));
        assert_eq!(all.get("kenangan"), Some(&0));
    }
}
