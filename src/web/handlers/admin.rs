//! Admin login and reporting endpoints.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};

use crate::reports::{self, Aggregate, Analytics, ResponseDetail, ResponseRow, SurveySummary};
use crate::responses::ResponseRecord;
use crate::web::auth::AdminAuth;
use crate::web::server::GatewayState;
use crate::web::types::{AggregateQuery, ApiError, LoginRequest, OkBody};

/// Question shown by the aggregate view when none is picked.
const DEFAULT_AGGREGATE_QUESTION: &str = "top_metrics";

pub async fn login_handler(
    State(state): State<Arc<GatewayState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    if !state.auth.check_credentials(&req.username, &req.password) {
        tracing::info!("Admin login rejected");
        return Err(ApiError::new(StatusCode::UNAUTHORIZED, "Invalid credentials"));
    }
    let token = state
        .auth
        .issue(chrono::Utc::now().timestamp())
        .ok_or_else(|| ApiError::internal("Could not create session"))?;
    tracing::info!("Admin logged in");
    Ok((
        [(header::SET_COOKIE, state.auth.session_cookie(token))],
        Json(OkBody::ok()),
    )
        .into_response())
}

pub async fn logout_handler() -> Response {
    (
        [(header::SET_COOKIE, AdminAuth::cleared_cookie())],
        Json(OkBody::ok()),
    )
        .into_response()
}

pub async fn responses_handler(
    State(state): State<Arc<GatewayState>>,
) -> Json<Vec<ResponseRecord>> {
    Json(state.responses.list().await)
}

pub async fn summary_handler(State(state): State<Arc<GatewayState>>) -> Json<SurveySummary> {
    Json(reports::summary(&state.responses.list().await))
}

pub async fn table_handler(State(state): State<Arc<GatewayState>>) -> Json<Vec<ResponseRow>> {
    Json(reports::table(&state.responses.list().await))
}

pub async fn csv_handler(State(state): State<Arc<GatewayState>>) -> Response {
    let csv = reports::to_csv(&reports::table(&state.responses.list().await));
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"responses.csv\"",
            ),
        ],
        csv,
    )
        .into_response()
}

pub async fn detail_handler(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<String>,
) -> Result<Json<ResponseDetail>, ApiError> {
    let record = state
        .responses
        .get(&id)
        .await
        .ok_or_else(|| ApiError::not_found(format!("Response {id} not found")))?;
    Ok(Json(reports::detail(&state.schema, &record)))
}

pub async fn aggregate_handler(
    State(state): State<Arc<GatewayState>>,
    Query(query): Query<AggregateQuery>,
) -> Json<Aggregate> {
    let question_id = query
        .question_id
        .filter(|q| !q.is_empty())
        .unwrap_or_else(|| DEFAULT_AGGREGATE_QUESTION.to_string());
    Json(reports::aggregate(
        &state.responses.list().await,
        &question_id,
    ))
}

pub async fn analytics_handler(
    State(state): State<Arc<GatewayState>>,
) -> Result<Json<Analytics>, ApiError> {
    let counts = state
        .db
        .step_counts()
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?;
    let sessions = state.db.session_count().await.unwrap_or_else(|e| {
        tracing::debug!(error = %e, "Session count unavailable");
        0
    });
    Ok(Json(reports::analytics(&state.schema, counts, sessions)))
}
