//! Broadcast hub.
//!
//! Owns the subscriber registry and the single authoritative write path to
//! the counter store. Every state change is stamped with a strictly
//! increasing timestamp and fanned out, in registration order, to every
//! connected subscriber.
//!
//! Joins are causally consistent: a new subscriber's channel is seeded with
//! a snapshot under the same lock that serializes emissions, so it can never
//! miss an increment or observe one from before its snapshot.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info};

use pulse_common::StreamEvent;

use crate::catalog::Catalog;
use crate::error::DashboardError;
use crate::store::CounterStore;

/// Per-subscriber queue depth. A viewer that falls this far behind is
/// evicted; it reconnects and resnapshots, which is the designed recovery
/// path anyway.
const SUBSCRIBER_CAPACITY: usize = 64;

pub struct BroadcastHub {
    catalog: Catalog,
    store: Arc<dyn CounterStore>,
    registry: Arc<Registry>,
    /// Serializes store writes, timestamping, and fan-out. Subscribing takes
    /// the same lock, which is what makes joins causally consistent.
    emit: Mutex<Clock>,
}

impl BroadcastHub {
    pub fn new(catalog: Catalog, store: Arc<dyn CounterStore>) -> Self {
        Self {
            catalog,
            store,
            registry: Arc::new(Registry::default()),
            emit: Mutex::new(Clock::default()),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Increment one product's counter and broadcast the new value.
    pub async fn increment(&self, product_id: &str) -> Result<StreamEvent, DashboardError> {
        if !self.catalog.contains(product_id) {
            return Err(DashboardError::UnknownProduct(product_id.to_string()));
        }

        let mut clock = self.emit.lock().await;
        let users = self.store.increment(product_id).await?;
        let event = StreamEvent::Increment {
            product_id: product_id.to_string(),
            users,
            timestamp: clock.tick(),
        };
        self.registry.fan_out(&event);

        debug!("{} -> {} (t={})", product_id, users, event.timestamp());
        Ok(event)
    }

    /// Zero every known counter and broadcast a fresh snapshot.
    pub async fn reset(&self) -> Result<StreamEvent, DashboardError> {
        let mut clock = self.emit.lock().await;
        self.store.reset(&self.catalog.ids()).await?;

        let users: BTreeMap<String, u64> =
            self.catalog.ids().into_iter().map(|id| (id, 0)).collect();
        let event = StreamEvent::Snapshot {
            users,
            timestamp: clock.tick(),
        };
        self.registry.fan_out(&event);

        info!("counters reset, snapshot broadcast to {} subscribers", self.subscriber_count());
        Ok(event)
    }

    /// Read-only view of every known counter. Absent entries read as zero.
    pub async fn snapshot(&self) -> Result<BTreeMap<String, u64>, DashboardError> {
        let stored = self.store.read_all().await?;
        Ok(self
            .catalog
            .ids()
            .into_iter()
            .map(|id| {
                let users = stored.get(&id).copied().unwrap_or(0);
                (id, users)
            })
            .collect())
    }

    /// Register a new subscriber. Its channel is seeded with a snapshot
    /// before any later increment can reach it.
    pub async fn subscribe(&self) -> Result<Subscription, DashboardError> {
        let mut clock = self.emit.lock().await;
        let users = self.snapshot().await?;
        let event = StreamEvent::Snapshot {
            users,
            timestamp: clock.tick(),
        };

        let (tx, rx) = mpsc::channel(SUBSCRIBER_CAPACITY);
        tx.try_send(event).expect("fresh subscriber channel has capacity");
        let id = self.registry.insert(tx);

        info!("subscriber {} joined ({} total)", id, self.subscriber_count());
        Ok(Subscription {
            id,
            registry: Arc::clone(&self.registry),
            rx,
        })
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.len()
    }
}

/// A live subscription. Dropping it releases the registry slot, so a
/// disconnected transport can never leak a subscriber.
pub struct Subscription {
    id: u64,
    registry: Arc<Registry>,
    rx: mpsc::Receiver<StreamEvent>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Next event in FIFO order; `None` once the hub has evicted this
    /// subscriber.
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        self.rx.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.registry.remove(self.id);
    }
}

/// Explicit subscriber registry: add/remove only, no ambient collection.
#[derive(Default)]
struct Registry {
    inner: parking_lot::Mutex<RegistryInner>,
}

#[derive(Default)]
struct RegistryInner {
    next_id: u64,
    // BTreeMap keeps fan-out in registration order
    sinks: BTreeMap<u64, mpsc::Sender<StreamEvent>>,
}

impl Registry {
    fn insert(&self, tx: mpsc::Sender<StreamEvent>) -> u64 {
        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.sinks.insert(id, tx);
        id
    }

    fn remove(&self, id: u64) {
        self.inner.lock().sinks.remove(&id);
    }

    fn len(&self) -> usize {
        self.inner.lock().sinks.len()
    }

    /// Best-effort delivery: a full or closed sink is dropped on the spot so
    /// a slow subscriber never stalls the rest.
    fn fan_out(&self, event: &StreamEvent) {
        let mut inner = self.inner.lock();
        let mut dead = Vec::new();
        for (id, sink) in inner.sinks.iter() {
            if sink.try_send(event.clone()).is_err() {
                dead.push(*id);
            }
        }
        for id in dead {
            inner.sinks.remove(&id);
            debug!("dropped unresponsive subscriber {}", id);
        }
    }
}

/// Strictly increasing wall-clock milliseconds. Strictness matters: the
/// timestamp doubles as the viewers' de-duplication token, so two increments
/// must never share one.
#[derive(Default)]
struct Clock {
    last_ms: u64,
}

impl Clock {
    fn tick(&mut self) -> u64 {
        let now = Utc::now().timestamp_millis().max(0) as u64;
        self.last_ms = if now > self.last_ms {
            now
        } else {
            self.last_ms + 1
        };
        self.last_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryCounterStore;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::time::Duration;

    fn hub() -> BroadcastHub {
        BroadcastHub::new(Catalog::default(), Arc::new(MemoryCounterStore::new()))
    }

    async fn expect_event(sub: &mut Subscription) -> StreamEvent {
        tokio::time::timeout(Duration::from_secs(1), sub.next_event())
            .await
            .expect("timed out waiting for event")
            .expect("subscription closed")
    }

    async fn expect_silence(sub: &mut Subscription) {
        let outcome = tokio::time::timeout(Duration::from_millis(50), sub.next_event()).await;
        assert!(outcome.is_err(), "expected no event, got {:?}", outcome);
    }

    #[tokio::test]
    async fn test_subscriber_sees_snapshot_before_increments() {
        let hub = hub();
        hub.increment("meepo").await.unwrap();
        hub.increment("meepo").await.unwrap();

        let mut sub = hub.subscribe().await.unwrap();
        let first = expect_event(&mut sub).await;
        match first {
            StreamEvent::Snapshot { ref users, .. } => {
                assert_eq!(users.get("meepo"), Some(&2));
                assert_eq!(users.get("nexius"), Some(&0));
            }
            other => panic!("expected snapshot first, got {:?}", other),
        }

        hub.increment("nexius").await.unwrap();
        match expect_event(&mut sub).await {
            StreamEvent::Increment { product_id, users, .. } => {
                assert_eq!(product_id, "nexius");
                assert_eq!(users, 1);
            }
            other => panic!("expected increment, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_product_mutates_nothing_and_broadcasts_nothing() {
        let hub = hub();
        let mut sub = hub.subscribe().await.unwrap();
        let _snapshot = expect_event(&mut sub).await;

        let err = hub.increment("ghost").await.unwrap_err();
        assert!(matches!(err, DashboardError::UnknownProduct(_)));

        assert_eq!(hub.snapshot().await.unwrap().values().sum::<u64>(), 0);
        expect_silence(&mut sub).await;
    }

    #[tokio::test]
    async fn test_concurrent_increments_do_not_lose_updates() {
        let hub = Arc::new(hub());
        let mut tasks = Vec::new();
        for _ in 0..8 {
            let hub = Arc::clone(&hub);
            tasks.push(tokio::spawn(async move {
                for _ in 0..25 {
                    hub.increment("meepo").await.unwrap();
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(hub.snapshot().await.unwrap().get("meepo"), Some(&200));
    }

    #[tokio::test]
    async fn test_events_are_fifo_with_strictly_increasing_timestamps() {
        let hub = hub();
        let mut sub = hub.subscribe().await.unwrap();
        let snapshot = expect_event(&mut sub).await;

        for _ in 0..5 {
            hub.increment("kenangan").await.unwrap();
        }

        let mut last_ts = snapshot.timestamp();
        for expected_users in 1..=5u64 {
            let event = expect_event(&mut sub).await;
            match event {
                StreamEvent::Increment { users, timestamp, .. } => {
                    assert_eq!(users, expected_users);
                    assert!(timestamp > last_ts, "timestamps must strictly increase");
                    last_ts = timestamp;
                }
                other => panic!("expected increment, got {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_reset_broadcasts_zero_snapshot() {
        let hub = hub();
        hub.increment("meepo").await.unwrap();

        let mut sub = hub.subscribe().await.unwrap();
        let _snapshot = expect_event(&mut sub).await;

        hub.reset().await.unwrap();
        match expect_event(&mut sub).await {
            StreamEvent::Snapshot { users, .. } => {
                assert!(users.values().all(|&v| v == 0));
                assert_eq!(users.len(), 4);
            }
            other => panic!("expected snapshot, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_dropped_subscription_releases_registry_slot() {
        let hub = hub();
        let sub = hub.subscribe().await.unwrap();
        assert_eq!(hub.subscriber_count(), 1);

        drop(sub);
        assert_eq!(hub.subscriber_count(), 0);

        // emitting to an empty registry is fine
        hub.increment("meepo").await.unwrap();
    }

    #[tokio::test]
    async fn test_slow_subscriber_is_evicted_without_stalling_others() {
        let hub = hub();
        let _stuck = hub.subscribe().await.unwrap(); // never drained
        let mut live = hub.subscribe().await.unwrap();
        let _snapshot = expect_event(&mut live).await;

        // overflow the stuck subscriber's queue (snapshot already used one slot)
        for _ in 0..SUBSCRIBER_CAPACITY {
            hub.increment("meepo").await.unwrap();
        }
        assert_eq!(hub.subscriber_count(), 1, "stuck subscriber should be evicted");

        // the live subscriber saw everything in order
        for expected_users in 1..=SUBSCRIBER_CAPACITY as u64 {
            match expect_event(&mut live).await {
                StreamEvent::Increment { users, .. } => assert_eq!(users, expected_users),
                other => panic!("expected increment, got {:?}", other),
            }
        }
    }

    struct FailingStore;

    #[async_trait]
    impl CounterStore for FailingStore {
        async fn increment(&self, _id: &str) -> Result<u64> {
            anyhow::bail!("store offline")
        }

        async fn read_all(&self) -> Result<HashMap<String, u64>> {
            anyhow::bail!("store offline")
        }

        async fn reset(&self, _ids: &[String]) -> Result<()> {
            anyhow::bail!("store offline")
        }
    }

    #[tokio::test]
    async fn test_store_failure_is_retryable_and_broadcasts_nothing() {
        let failing = BroadcastHub::new(Catalog::default(), Arc::new(FailingStore));
        let err = failing.increment("meepo").await.unwrap_err();
        assert!(matches!(err, DashboardError::Store(_)));
    }
}
