//! Telemetry ingestion and the drop-off summary.

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode};

use crate::reports::summarize_steps;
use crate::telemetry::EventBatch;
use crate::web::server::GatewayState;
use crate::web::types::{ApiError, OkBody, StepsResponse};

/// Accepts one event or a list. Storage failures come back as
/// `500 {ok:false, error}`; clients drop them.
pub async fn record_handler(
    State(state): State<Arc<GatewayState>>,
    Json(batch): Json<EventBatch>,
) -> (StatusCode, Json<OkBody>) {
    let events = batch.into_vec();
    match state.db.record_events(&events).await {
        Ok(()) => (StatusCode::OK, Json(OkBody::ok())),
        Err(e) => {
            tracing::warn!(count = events.len(), error = %e, "Failed to store telemetry");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(OkBody::failed(e.to_string())),
            )
        }
    }
}

pub async fn summary_handler(
    State(state): State<Arc<GatewayState>>,
) -> Result<Json<StepsResponse>, ApiError> {
    let counts = state
        .db
        .step_counts()
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?;
    Ok(Json(StepsResponse {
        steps: summarize_steps(counts),
    }))
}
