//! Handlers for the dashboard server.

pub mod counters;
pub mod stream;

// Re-export AppState from config
pub use crate::config::AppState;

pub use counters::{get_state, hit_product, reset_counters, root_status};
pub use stream::stream_events;
