//! HTTP client for a running survey server.
//!
//! Lets the terminal wizard drive a remote server with the same
//! [`Coach`], [`Submitter`] and [`TelemetrySink`] seams it uses in-process.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::coach::{Coach, Descriptions, ValidateRequest, Validation};
use crate::error::{CoachError, GatewayError, SubmitError, TelemetryError};
use crate::responses::{SubmitReceipt, Submission, Submitter};
use crate::schema::SurveySchema;
use crate::telemetry::{TelemetryEvent, TelemetrySink};
use crate::web::types::{
    DescribeRequest, DescribeResponse, ErrorBody, ExamplesRequest, ExamplesResponse,
    FollowupRequest, FollowupResponse, OptionRef, ValidateResponse,
};

pub struct GatewayClient {
    http: Client,
    base: Url,
}

impl GatewayClient {
    pub fn new(base: &str, timeout: Duration) -> Result<Self, GatewayError> {
        let base = Url::parse(base).map_err(|e| GatewayError::RequestFailed {
            url: base.to_string(),
            reason: format!("invalid server URL: {e}"),
        })?;
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    pub async fn schema(&self) -> Result<SurveySchema, GatewayError> {
        let url = self.endpoint("/api/surveys/schema")?;
        let response = self.http.get(url.clone()).send().await?;
        decode(url, response).await
    }

    fn endpoint(&self, path: &str) -> Result<Url, GatewayError> {
        self.base.join(path).map_err(|e| GatewayError::RequestFailed {
            url: format!("{}{path}", self.base),
            reason: e.to_string(),
        })
    }

    async fn post<B: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, GatewayError> {
        let url = self.endpoint(path)?;
        let response = self.http.post(url.clone()).json(body).send().await?;
        decode(url, response).await
    }
}

async fn decode<R: DeserializeOwned>(
    url: Url,
    response: reqwest::Response,
) -> Result<R, GatewayError> {
    let status = response.status();
    if !status.is_success() {
        let reason = error_message(status, response).await;
        return Err(GatewayError::RequestFailed {
            url: url.to_string(),
            reason,
        });
    }
    Ok(response.json().await?)
}

/// The `{error}` body when there is one, else the status line.
async fn error_message(status: StatusCode, response: reqwest::Response) -> String {
    match response.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => status.to_string(),
    }
}

fn coach_error(e: GatewayError) -> CoachError {
    CoachError::RequestFailed {
        provider: "gateway".to_string(),
        reason: e.to_string(),
    }
}

#[async_trait]
impl Coach for GatewayClient {
    async fn validate(&self, request: &ValidateRequest) -> Result<Validation, CoachError> {
        let response: ValidateResponse = self
            .post("/api/ai/validate", request)
            .await
            .map_err(coach_error)?;
        Ok(response.validation)
    }

    async fn followup(&self, question: &str, answer: &str) -> Result<String, CoachError> {
        let body = FollowupRequest {
            question: question.to_string(),
            answer: answer.to_string(),
        };
        let response: FollowupResponse = self
            .post("/api/ai/followup", &body)
            .await
            .map_err(coach_error)?;
        Ok(response.followup)
    }

    async fn describe_options(
        &self,
        question_id: &str,
        options: &[String],
    ) -> Result<Descriptions, CoachError> {
        let body = DescribeRequest {
            question_id: question_id.to_string(),
            options: options
                .iter()
                .map(|label| OptionRef {
                    id: String::new(),
                    label: label.clone(),
                })
                .collect(),
        };
        let response: DescribeResponse = self
            .post("/api/ai/describe", &body)
            .await
            .map_err(coach_error)?;
        Ok(response.descriptions)
    }

    async fn examples(
        &self,
        question_id: &str,
        role_id: Option<&str>,
    ) -> Result<Vec<String>, CoachError> {
        let body = ExamplesRequest {
            question_id: question_id.to_string(),
            role_id: role_id.map(str::to_string),
        };
        let response: ExamplesResponse = self
            .post("/api/ai/examples", &body)
            .await
            .map_err(coach_error)?;
        Ok(response.examples)
    }
}

#[async_trait]
impl Submitter for GatewayClient {
    async fn submit(&self, submission: Submission) -> Result<SubmitReceipt, SubmitError> {
        let url = self
            .endpoint("/api/surveys/submit")
            .map_err(|e| SubmitError::Transport(e.to_string()))?;
        let response = self
            .http
            .post(url)
            .json(&submission)
            .send()
            .await
            .map_err(|e| SubmitError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| SubmitError::Transport(e.to_string()));
        }
        let message = error_message(status, response).await;
        if status.is_client_error() {
            Err(SubmitError::Rejected(message))
        } else {
            Err(SubmitError::Transport(message))
        }
    }
}

#[async_trait]
impl TelemetrySink for GatewayClient {
    async fn record(&self, events: Vec<TelemetryEvent>) -> Result<(), TelemetryError> {
        let _: serde_json::Value = self
            .post("/api/telemetry", &events)
            .await
            .map_err(|e| TelemetryError::Transport(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_resolve_against_base() {
        let client = GatewayClient::new("http://127.0.0.1:3000", Duration::from_secs(5)).unwrap();
        assert_eq!(
            client.endpoint("/api/telemetry").unwrap().as_str(),
            "http://127.0.0.1:3000/api/telemetry"
        );
    }

    #[test]
    fn bad_base_url_is_rejected() {
        assert!(matches!(
            GatewayClient::new("not a url", Duration::from_secs(5)),
            Err(GatewayError::RequestFailed { .. })
        ));
    }

    #[tokio::test]
    async fn unreachable_server_is_a_transport_error() {
        // Port 9 (discard) is closed on test machines.
        let client = GatewayClient::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let result = client.submit(Submission::default()).await;
        assert!(matches!(result, Err(SubmitError::Transport(_))));
    }
}
