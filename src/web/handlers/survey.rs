//! Respondent-facing survey endpoints.

use std::sync::Arc;

use axum::{Json, extract::State};

use crate::coach::{Gist, heuristic};
use crate::error::SubmitError;
use crate::responses::{SubmitReceipt, Submission, Submitter};
use crate::schema::SurveySchema;
use crate::web::server::GatewayState;
use crate::web::types::{ApiError, GistRequest};

pub async fn schema_handler(State(state): State<Arc<GatewayState>>) -> Json<SurveySchema> {
    Json(state.schema.as_ref().clone())
}

pub async fn submit_handler(
    State(state): State<Arc<GatewayState>>,
    Json(submission): Json<Submission>,
) -> Result<Json<SubmitReceipt>, ApiError> {
    match state.responses.submit(submission).await {
        Ok(receipt) => Ok(Json(receipt)),
        Err(e @ (SubmitError::MissingIdentity | SubmitError::InvalidEmail)) => {
            Err(ApiError::bad_request(e.to_string()))
        }
        Err(e) => {
            tracing::error!(error = %e, "Submission failed");
            Err(ApiError::internal(e.to_string()))
        }
    }
}

pub async fn gist_handler(Json(req): Json<GistRequest>) -> Json<Gist> {
    Json(heuristic::gist(&req.text))
}
