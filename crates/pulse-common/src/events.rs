//! Stream event wire model.
//!
//! The server side serializes [`StreamEvent`]; the viewer side decodes
//! through [`decode_event`], which tolerates the heterogeneous shapes seen in
//! the wild (numeric strings, extended-number wrappers, `users` as a map or
//! an array of documents) and funnels them into a single integer domain.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::numeric::normalize_count;

/// An event on the dashboard stream, as the server emits it.
///
/// Timestamps are hub-stamped wall-clock milliseconds, strictly increasing
/// per hub instance. They are an ordering and de-duplication token, not a
/// correctness-critical clock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Full replacement of a viewer's mirror.
    Snapshot {
        users: BTreeMap<String, u64>,
        timestamp: u64,
    },
    /// One product's counter advanced to a new value.
    Increment {
        #[serde(rename = "productId")]
        product_id: String,
        users: u64,
        timestamp: u64,
    },
}

impl StreamEvent {
    pub fn timestamp(&self) -> u64 {
        match self {
            StreamEvent::Snapshot { timestamp, .. } => *timestamp,
            StreamEvent::Increment { timestamp, .. } => *timestamp,
        }
    }
}

/// A tolerantly-decoded inbound event.
///
/// Unlike [`StreamEvent`], fields that may be missing or undecodable on the
/// wire stay optional here; the reconciler decides how to fall back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireEvent {
    Snapshot {
        /// `None` marks an entry that was present but undecodable; the
        /// reconciler keeps its previous value for those instead of zeroing.
        users: BTreeMap<String, Option<u64>>,
        timestamp: Option<u64>,
    },
    Increment {
        product_id: String,
        /// `None` when the carried value is missing or undecodable.
        users: Option<u64>,
        timestamp: Option<u64>,
    },
}

/// Decode one stream payload. Unknown event types decode to `None`.
pub fn decode_event(value: &Value) -> Option<WireEvent> {
    match value.get("type").and_then(Value::as_str)? {
        "snapshot" => {
            let users = value.get("users").map(decode_users_map).unwrap_or_default();
            Some(WireEvent::Snapshot {
                users,
                timestamp: value.get("timestamp").and_then(normalize_count),
            })
        }
        "increment" => {
            let product_id = value.get("productId").and_then(Value::as_str)?.to_string();
            let users = value
                .get("users")
                .and_then(|u| decode_increment_users(u, &product_id))
                // legacy field emitted by older servers
                .or_else(|| value.get("usersLegacy").and_then(normalize_count));
            Some(WireEvent::Increment {
                product_id,
                users,
                timestamp: value.get("timestamp").and_then(normalize_count),
            })
        }
        other => {
            debug!("ignoring unknown stream event type {:?}", other);
            None
        }
    }
}

/// Snapshot `users`: either a map of id -> count or an array of
/// `{_id, users}` documents.
fn decode_users_map(value: &Value) -> BTreeMap<String, Option<u64>> {
    let mut users = BTreeMap::new();
    match value {
        Value::Object(map) => {
            for (id, raw) in map {
                users.insert(id.clone(), normalize_count(raw));
            }
        }
        Value::Array(docs) => {
            for doc in docs {
                let Some(id) = doc.get("_id").and_then(Value::as_str) else {
                    continue;
                };
                users.insert(
                    id.to_string(),
                    doc.get("users").and_then(normalize_count),
                );
            }
        }
        _ => {}
    }
    users
}

/// Increment `users`: the new value itself, or the same map/array shapes as a
/// snapshot keyed by the affected product.
fn decode_increment_users(value: &Value, product_id: &str) -> Option<u64> {
    // a plain value (including wrapper objects) wins over the map reading
    if let Some(n) = normalize_count(value) {
        return Some(n);
    }
    match value {
        Value::Object(map) => map.get(product_id).and_then(normalize_count),
        Value::Array(docs) => docs
            .iter()
            .find(|doc| doc.get("_id").and_then(Value::as_str) == Some(product_id))
            .and_then(|doc| doc.get("users"))
            .and_then(normalize_count),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stream_event_round_trips_through_wire_format() {
        let event = StreamEvent::Increment {
            product_id: "meepo".to_string(),
            users: 3,
            timestamp: 1700000000123,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "increment");
        assert_eq!(json["productId"], "meepo");
        assert_eq!(json["users"], 3);

        let decoded = decode_event(&json).unwrap();
        assert_eq!(
            decoded,
            WireEvent::Increment {
                product_id: "meepo".to_string(),
                users: Some(3),
                timestamp: Some(1700000000123),
            }
        );
    }

    #[test]
    fn test_snapshot_accepts_map_and_array_shapes() {
        let map_shape = json!({
            "type": "snapshot",
            "users": {"meepo": 2, "kenangan": "5"},
            "timestamp": 10,
        });
        let array_shape = json!({
            "type": "snapshot",
            "users": [
                {"_id": "meepo", "users": {"$numberInt": "2"}},
                {"_id": "kenangan", "users": 5},
                {"users": 9},
            ],
            "timestamp": 10,
        });

        for shape in [&map_shape, &array_shape] {
            let Some(WireEvent::Snapshot { users, timestamp }) = decode_event(shape) else {
                panic!("expected snapshot from {shape}");
            };
            assert_eq!(users.get("meepo"), Some(&Some(2)));
            assert_eq!(users.get("kenangan"), Some(&Some(5)));
            assert_eq!(users.len(), 2);
            assert_eq!(timestamp, Some(10));
        }
    }

    #[test]
    fn test_snapshot_marks_undecodable_entries_absent() {
        let payload = json!({
            "type": "snapshot",
            "users": {"meepo": "garbage"},
            "timestamp": 1,
        });
        let Some(WireEvent::Snapshot { users, .. }) = decode_event(&payload) else {
            panic!("expected snapshot");
        };
        assert_eq!(users.get("meepo"), Some(&None));
    }

    #[test]
    fn test_increment_users_accepts_all_shapes() {
        let shapes = [
            json!(7),
            json!("7"),
            json!({"$numberLong": "7"}),
            json!({"meepo": 7, "nexius": 1}),
            json!([{"_id": "nexius", "users": 1}, {"_id": "meepo", "users": "7"}]),
        ];
        for shape in shapes {
            let payload = json!({
                "type": "increment",
                "productId": "meepo",
                "users": shape,
                "timestamp": 4,
            });
            let Some(WireEvent::Increment { users, .. }) = decode_event(&payload) else {
                panic!("expected increment");
            };
            assert_eq!(users, Some(7), "shape {}", payload["users"]);
        }
    }

    #[test]
    fn test_increment_falls_back_to_legacy_field() {
        let payload = json!({
            "type": "increment",
            "productId": "meepo",
            "usersLegacy": 9,
            "timestamp": 4,
        });
        let Some(WireEvent::Increment { users, .. }) = decode_event(&payload) else {
            panic!("expected increment");
        };
        assert_eq!(users, Some(9));
    }

    #[test]
    fn test_increment_with_undecodable_value_stays_absent() {
        let payload = json!({
            "type": "increment",
            "productId": "meepo",
            "users": json!({"nexius": 2}),
            "timestamp": 4,
        });
        let Some(WireEvent::Increment { users, .. }) = decode_event(&payload) else {
            panic!("expected increment");
        };
        assert_eq!(users, None);
    }

    #[test]
    fn test_unknown_and_malformed_events_are_dropped() {
        assert_eq!(decode_event(&json!({"type": "presence"})), None);
        assert_eq!(decode_event(&json!({"users": {}})), None);
        // increment without a product id is meaningless
        assert_eq!(decode_event(&json!({"type": "increment", "users": 3})), None);
    }
}
