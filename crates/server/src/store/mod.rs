//! Counter storage.
//!
//! A key-value table of per-product integers with an atomic increment. The
//! hub is the only writer; viewers only ever see counters through the event
//! stream.

mod json_store;
mod memory;

pub use json_store::JsonCounterStore;
pub use memory::MemoryCounterStore;

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically add one to `id`, creating the entry at zero first if
    /// absent. Returns the post-increment value.
    async fn increment(&self, id: &str) -> Result<u64>;

    /// Batch read of every stored counter.
    async fn read_all(&self) -> Result<HashMap<String, u64>>;

    /// Set every given counter to zero.
    async fn reset(&self, ids: &[String]) -> Result<()>;
}
