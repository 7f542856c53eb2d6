//! Server configuration and shared state.

use std::path::PathBuf;
use std::sync::Arc;

use crate::hub::BroadcastHub;

/// Configuration for the dashboard server.
#[derive(Clone, Debug)]
pub struct DashboardConfig {
    /// Port to listen on.
    pub listen_port: u16,
    /// Data directory for the JSON counter store; `None` keeps counters in
    /// memory only.
    pub data_dir: Option<PathBuf>,
    /// Namespace for the counter file within the data directory.
    pub namespace: String,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            listen_port: 3000,
            data_dir: None,
            namespace: "counters".to_string(),
        }
    }
}

impl DashboardConfig {
    /// Build the configuration from the environment: `PORT`, `PULSE_ROOT`,
    /// `PULSE_NAMESPACE`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            listen_port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.listen_port),
            data_dir: std::env::var("PULSE_ROOT").ok().map(PathBuf::from),
            namespace: std::env::var("PULSE_NAMESPACE").unwrap_or(defaults.namespace),
        }
    }
}

/// App state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<BroadcastHub>,
}
