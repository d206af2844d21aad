//! Coaching endpoints. Every call goes through the facade, so these only
//! fail when the facade itself has nothing to fall back on.

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};

use crate::coach::{Coach, ValidateRequest};
use crate::reports::insights_digest;
use crate::web::server::GatewayState;
use crate::web::types::{
    ApiError, DescribeRequest, DescribeResponse, ExamplesRequest, ExamplesResponse,
    FollowupRequest, FollowupResponse, InsightsResponse, OkBody, ValidateResponse,
};

fn bad_gateway(e: impl std::fmt::Display) -> ApiError {
    ApiError::new(StatusCode::BAD_GATEWAY, e.to_string())
}

pub async fn validate_handler(
    State(state): State<Arc<GatewayState>>,
    Json(req): Json<ValidateRequest>,
) -> Result<Json<ValidateResponse>, ApiError> {
    let validation = state.coach.validate(&req).await.map_err(bad_gateway)?;
    Ok(Json(ValidateResponse {
        field_id: req.field_id,
        validation,
    }))
}

pub async fn followup_handler(
    State(state): State<Arc<GatewayState>>,
    Json(req): Json<FollowupRequest>,
) -> Result<Json<FollowupResponse>, ApiError> {
    let followup = state
        .coach
        .followup(&req.question, &req.answer)
        .await
        .map_err(bad_gateway)?;
    Ok(Json(FollowupResponse { followup }))
}

pub async fn describe_handler(
    State(state): State<Arc<GatewayState>>,
    Json(req): Json<DescribeRequest>,
) -> Result<Json<DescribeResponse>, ApiError> {
    let labels: Vec<String> = req.options.into_iter().map(|o| o.label).collect();
    let descriptions = state
        .coach
        .describe_options(&req.question_id, &labels)
        .await
        .map_err(bad_gateway)?;
    Ok(Json(DescribeResponse { descriptions }))
}

pub async fn examples_handler(
    State(state): State<Arc<GatewayState>>,
    Json(req): Json<ExamplesRequest>,
) -> Result<Json<ExamplesResponse>, ApiError> {
    let examples = state
        .coach
        .examples(&req.question_id, req.role_id.as_deref())
        .await
        .map_err(bad_gateway)?;
    Ok(Json(ExamplesResponse { examples }))
}

pub async fn insights_handler(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    let digest = insights_digest(&state.responses.list().await);
    match state.coach.insights(&digest).await {
        Ok(insights) => Json(InsightsResponse { insights }).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "Insights unavailable");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(OkBody::failed(e.to_string())),
            )
                .into_response()
        }
    }
}
