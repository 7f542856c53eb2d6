//! Client reconciler.
//!
//! Maintains a local mirror of every product counter and applies inbound
//! events idempotently. A snapshot is a full resynchronization point: the
//! mirror is replaced wholesale and downstream pulse/cue state is cleared.
//! An increment carries the authoritative new value — the mirror is set to
//! it, never advanced locally, so any missed intermediate increments are
//! caught up for free.

use std::collections::HashMap;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, warn};

use pulse_common::{decode_event, WireEvent};

/// Connection lifecycle of one viewer instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Streaming,
}

/// Downstream notice that a product's counter genuinely advanced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncrementNotice {
    pub product_id: String,
    pub users: u64,
    /// The hub's event timestamp; the cue scheduler's de-duplication token.
    pub timestamp: u64,
}

/// What applying one event asks the caller to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    /// Mirror replaced wholesale; clear pulse state and the cue scheduler.
    Resynced,
    /// A counter advanced; pulse the UI and enqueue a cue.
    Advanced(IncrementNotice),
    /// Nothing to do (duplicate, unknown product, undecodable payload).
    Ignored,
}

pub struct Reconciler {
    state: ConnectionState,
    mirror: HashMap<String, u64>,
}

impl Reconciler {
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            mirror: HashMap::new(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn mirror(&self) -> &HashMap<String, u64> {
        &self.mirror
    }

    /// A new transport attempt is starting. The mirror is deliberately kept:
    /// stale-but-present data beats a blank dashboard during the gap.
    pub fn connecting(&mut self) {
        self.state = ConnectionState::Connecting;
    }

    /// The transport dropped; a reconnect will resnapshot.
    pub fn disconnected(&mut self) {
        self.state = ConnectionState::Disconnected;
    }

    /// Apply one decoded stream payload.
    pub fn apply(&mut self, payload: &Value) -> Applied {
        match decode_event(payload) {
            Some(WireEvent::Snapshot { users, .. }) => {
                let mut next = HashMap::with_capacity(users.len());
                for (id, value) in users {
                    match value {
                        Some(n) => {
                            next.insert(id, n);
                        }
                        // present but undecodable: keep the previous known
                        // value rather than inventing a zero
                        None => {
                            if let Some(prev) = self.mirror.get(&id) {
                                next.insert(id, *prev);
                            }
                        }
                    }
                }
                self.mirror = next;
                self.state = ConnectionState::Streaming;
                Applied::Resynced
            }
            Some(WireEvent::Increment {
                product_id,
                users,
                timestamp,
            }) => {
                if self.state != ConnectionState::Streaming {
                    // an increment cannot precede the snapshot of its own
                    // connection; whatever this is, the snapshot will fix it
                    debug!("increment for {} before snapshot, ignoring", product_id);
                    return Applied::Ignored;
                }
                if !self.mirror.contains_key(&product_id) {
                    debug!("increment for unknown product {}, ignoring", product_id);
                    return Applied::Ignored;
                }
                let Some(users) = users else {
                    // A missing carried value would force a guess ("local
                    // + 1"), which masks genuine desync. Defer to the next
                    // snapshot instead.
                    warn!(
                        "increment for {} carried no usable value, deferring to next snapshot",
                        product_id
                    );
                    return Applied::Ignored;
                };

                self.mirror.insert(product_id.clone(), users);
                Applied::Advanced(IncrementNotice {
                    product_id,
                    users,
                    timestamp: timestamp.unwrap_or_else(now_ms),
                })
            }
            None => Applied::Ignored,
        }
    }
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new()
    }
}

fn now_ms() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}
