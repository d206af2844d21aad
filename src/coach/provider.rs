//! Coaching provider trait and typed request/response types.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CoachError;

/// Request to judge a free-text answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateRequest {
    pub field_id: String,
    pub text: String,
    /// Question label, used as prompt context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_id: Option<String>,
}

/// Verdict on a free-text answer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Validation {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub friendly: Option<String>,
    #[serde(default)]
    pub wants_skip: bool,
    #[serde(default)]
    pub wants_more: bool,
}

impl Validation {
    pub fn accepted() -> Self {
        Self {
            ok: true,
            ..Self::default()
        }
    }
}

/// One described option as returned by a provider, in option order.
///
/// Providers do not always echo the label back verbatim, so `label` is
/// optional and matching happens in the facade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionDescription {
    #[serde(default)]
    pub label: Option<String>,
    pub description: String,
}

/// Label to description map handed to callers.
pub type Descriptions = BTreeMap<String, String>;

/// A single model-backed coaching source.
///
/// Implementations turn provider output into typed results; any prose or
/// JSON-in-prose handling stays inside the implementation.
#[async_trait]
pub trait CoachingProvider: Send + Sync {
    /// Provider name for logs.
    fn name(&self) -> &str;

    async fn validate(&self, request: &ValidateRequest) -> Result<Validation, CoachError>;

    async fn followup(&self, question: &str, answer: &str) -> Result<String, CoachError>;

    async fn describe_options(
        &self,
        question_id: &str,
        options: &[String],
    ) -> Result<Vec<OptionDescription>, CoachError>;

    async fn examples(
        &self,
        question_id: &str,
        role_id: Option<&str>,
    ) -> Result<Vec<String>, CoachError>;

    /// Free-form summary of a batch of responses for admins.
    async fn insights(&self, digest: &str) -> Result<String, CoachError>;
}

/// What the survey engine and the HTTP layer call.
///
/// Implemented in-process by [`super::CoachingFacade`] and remotely by the
/// gateway client used by the terminal wizard.
#[async_trait]
pub trait Coach: Send + Sync {
    async fn validate(&self, request: &ValidateRequest) -> Result<Validation, CoachError>;

    async fn followup(&self, question: &str, answer: &str) -> Result<String, CoachError>;

    async fn describe_options(
        &self,
        question_id: &str,
        options: &[String],
    ) -> Result<Descriptions, CoachError>;

    async fn examples(
        &self,
        question_id: &str,
        role_id: Option<&str>,
    ) -> Result<Vec<String>, CoachError>;
}
