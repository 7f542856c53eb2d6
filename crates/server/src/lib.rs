//! Pulseboard server library
//!
//! A live counter dashboard server: named products carry an "active users"
//! counter, incremented over HTTP and mirrored in real time to every
//! connected viewer through an ordered event stream.

pub mod catalog;
pub mod config;
pub mod error;
pub mod handlers;
pub mod hub;
pub mod models;
pub mod store;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use catalog::Catalog;
use config::{AppState, DashboardConfig};
use handlers::{get_state, hit_product, reset_counters, root_status, stream_events};
use hub::BroadcastHub;
use store::{CounterStore, JsonCounterStore, MemoryCounterStore};

pub async fn run() -> anyhow::Result<()> {
    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        // Already set, ignore
    }

    info!("=== Pulseboard Server ===");

    let config = DashboardConfig::from_env();

    let store: Arc<dyn CounterStore> = match &config.data_dir {
        Some(dir) => {
            info!("persistent counters under {:?} (namespace {})", dir, config.namespace);
            Arc::new(JsonCounterStore::open(dir.clone(), &config.namespace).await?)
        }
        None => {
            info!("no PULSE_ROOT set, counters are in-memory only");
            Arc::new(MemoryCounterStore::new())
        }
    };

    let hub = Arc::new(BroadcastHub::new(Catalog::default(), store));
    info!(
        "catalog: {}",
        hub.catalog()
            .products()
            .iter()
            .map(|p| p.id.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    let app = router(AppState { hub });

    let addr = SocketAddr::from(([0, 0, 0, 0], config.listen_port));
    info!("Dashboard server listening on http://localhost:{}", config.listen_port);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the HTTP surface. Exposed separately so tests can serve it on an
/// ephemeral port.
pub fn router(state: AppState) -> Router {
    Router::new()
        // Plain state query
        .route("/api/state", get(get_state))
        // Long-lived event stream; first frame is always a snapshot
        .route("/api/stream", get(stream_events))
        // Increment stimulus and reset
        .route("/api/products/{id}/hit", post(hit_product))
        .route("/api/reset", post(reset_counters))
        // Liveness
        .route("/", get(root_status))
        .route("/health", get(health_check))
        .with_state(state)
        .layer(tower_http::cors::CorsLayer::permissive())
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

async fn health_check() -> &'static str {
    "OK - Pulseboard Server"
}
