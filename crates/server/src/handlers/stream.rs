//! Event stream subscription handler.
//!
//! GET /api/stream opens a long-lived `text/event-stream` response. The
//! first frame is always a snapshot; every later frame is one event from the
//! hub, in FIFO order, interleaved with comment heartbeats so intermediaries
//! keep the connection alive.

use std::convert::Infallible;
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use tracing::{error, info};

use crate::config::AppState;
use crate::error::DashboardError;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// GET /api/stream
pub async fn stream_events(
    State(state): State<AppState>,
) -> Result<Response, DashboardError> {
    let mut subscription = state.hub.subscribe().await?;
    info!("GET /api/stream - subscriber {} connected", subscription.id());

    // The subscription owns its registry slot: when the client disconnects
    // the stream (and the subscription with it) is dropped, which
    // unsubscribes.
    let stream = async_stream::stream! {
        // The channel was seeded with the snapshot at subscribe time; send
        // it before anything else so the join stays causally consistent.
        if let Some(event) = subscription.next_event().await {
            if let Some(frame) = encode_frame(&event) {
                yield Ok::<_, Infallible>(frame);
            }
        }

        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await; // the first tick completes immediately

        loop {
            tokio::select! {
                event = subscription.next_event() => {
                    match event {
                        Some(event) => {
                            if let Some(frame) = encode_frame(&event) {
                                yield Ok::<_, Infallible>(frame);
                            }
                        }
                        // hub evicted this subscriber; closing the response
                        // makes the client reconnect and resnapshot
                        None => break,
                    }
                }
                _ = heartbeat.tick() => {
                    yield Ok::<_, Infallible>(": keep-alive\n\n".to_string());
                }
            }
        }
    };

    let response = Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "text/event-stream")
        .header("cache-control", "no-cache")
        .header("connection", "keep-alive")
        .body(Body::from_stream(stream))
        .map_err(|e| DashboardError::Store(anyhow::anyhow!("failed to build stream response: {}", e)))?;

    Ok(response)
}

fn encode_frame(event: &pulse_common::StreamEvent) -> Option<String> {
    match serde_json::to_string(event) {
        Ok(json) => Some(format!("data: {}\n\n", json)),
        Err(e) => {
            error!("failed to encode stream event: {}", e);
            None
        }
    }
}
