//! Counter query and mutation handlers.

use axum::extract::{Path, State};
use axum::response::Json;
use tracing::info;

use pulse_common::StreamEvent;

use crate::config::AppState;
use crate::error::DashboardError;
use crate::models::{ServerStatus, StateResponse};

/// GET /api/state
///
/// Plain read of every counter, for viewers that want state without a
/// subscription.
pub async fn get_state(
    State(state): State<AppState>,
) -> Result<Json<StateResponse>, DashboardError> {
    let users = state.hub.snapshot().await?;
    Ok(Json(StateResponse { users }))
}

/// POST /api/products/:id/hit
///
/// The external increment stimulus. Responds with the increment event
/// exactly as broadcast, or 404 for a product outside the catalog.
pub async fn hit_product(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<StreamEvent>, DashboardError> {
    info!("POST /api/products/{}/hit", id);

    let event = state.hub.increment(&id).await?;
    Ok(Json(event))
}

/// POST /api/reset
///
/// Zero every counter. Responds with the snapshot event exactly as
/// broadcast.
pub async fn reset_counters(
    State(state): State<AppState>,
) -> Result<Json<StreamEvent>, DashboardError> {
    info!("POST /api/reset");

    let event = state.hub.reset().await?;
    Ok(Json(event))
}

/// GET /
pub async fn root_status(
    State(state): State<AppState>,
) -> Result<Json<ServerStatus>, DashboardError> {
    let products = state.hub.snapshot().await?;
    Ok(Json(ServerStatus {
        status: "ok".to_string(),
        products,
    }))
}
