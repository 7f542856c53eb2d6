//! Error taxonomy for the dashboard server.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
    /// The product id is not part of the catalog. Caller error; no state
    /// change, no broadcast.
    #[error("unknown product: {0}")]
    UnknownProduct(String),

    /// The counter store failed. Transient and safely retryable: the store
    /// operation is atomic, so no partial mutation is left behind.
    #[error("counter store unavailable: {0}")]
    Store(#[from] anyhow::Error),
}

impl IntoResponse for DashboardError {
    fn into_response(self) -> Response {
        let status = match &self {
            DashboardError::UnknownProduct(_) => StatusCode::NOT_FOUND,
            DashboardError::Store(e) => {
                error!("counter store failure: {:#}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
