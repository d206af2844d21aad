//! Submitted survey responses.
//!
//! The in-memory log is authoritative for reads. Each submission is
//! mirrored into the durable store on a best-effort basis: a failed mirror
//! write still saves the response and returns a warning.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::db::Database;
use crate::error::{DatabaseError, SubmitError};
use crate::survey::draft::{DraftState, check_identity};

/// How the respondent reached the survey.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    #[default]
    Public,
    Token,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMeta {
    #[serde(default)]
    pub channel: Channel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_id: Option<String>,
}

/// Body of `POST /api/surveys/submit`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default)]
    pub answers: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub rating_group: BTreeMap<String, u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

impl Submission {
    pub fn from_draft(state: &DraftState) -> Self {
        let company = state.respondent.company.trim();
        Self {
            name: state.respondent.name.clone(),
            email: state.respondent.email.clone(),
            company: (!company.is_empty()).then(|| company.to_string()),
            answers: state.answers_json(),
            rating_group: state.ratings.clone(),
            meta: Some(ResponseMeta::default()),
        }
    }
}

/// A stored response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseRecord {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default)]
    pub answers: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub rating_group: BTreeMap<String, u8>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub ai_gists: BTreeMap<String, String>,
    #[serde(default)]
    pub meta: ResponseMeta,
}

impl ResponseRecord {
    /// Check identity fields and stamp a fresh id and timestamp.
    pub fn from_submission(submission: Submission) -> Result<Self, SubmitError> {
        check_identity(&submission.name, &submission.email)?;
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            name: submission.name,
            email: submission.email,
            company: submission.company.filter(|c| !c.trim().is_empty()),
            answers: submission.answers,
            rating_group: submission.rating_group,
            ai_gists: BTreeMap::new(),
            meta: submission.meta.unwrap_or_default(),
        })
    }
}

/// Result of a successful submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReceipt {
    pub saved: ResponseRecord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Anything that accepts a finished survey.
#[async_trait]
pub trait Submitter: Send + Sync {
    async fn submit(&self, submission: Submission) -> Result<SubmitReceipt, SubmitError>;
}

/// Response log plus optional durable mirror.
pub struct ResponseService {
    log: RwLock<Vec<ResponseRecord>>,
    mirror: Option<Arc<dyn Database>>,
}

impl ResponseService {
    pub fn new(mirror: Option<Arc<dyn Database>>) -> Self {
        Self {
            log: RwLock::new(Vec::new()),
            mirror,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(None)
    }

    /// Load previously mirrored responses into the log.
    pub async fn hydrate(&self) -> Result<usize, DatabaseError> {
        let Some(mirror) = &self.mirror else {
            return Ok(0);
        };
        let mut stored = mirror.list_responses().await?;
        // Storage lists newest first; the log is kept in arrival order.
        stored.reverse();
        let count = stored.len();
        *self.log.write().await = stored;
        tracing::info!(count, "Hydrated response log from storage");
        Ok(count)
    }

    /// Newest first.
    pub async fn list(&self) -> Vec<ResponseRecord> {
        self.log.read().await.iter().rev().cloned().collect()
    }

    pub async fn get(&self, id: &str) -> Option<ResponseRecord> {
        self.log.read().await.iter().find(|r| r.id == id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.log.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.log.read().await.is_empty()
    }
}

#[async_trait]
impl Submitter for ResponseService {
    async fn submit(&self, submission: Submission) -> Result<SubmitReceipt, SubmitError> {
        let record = ResponseRecord::from_submission(submission)?;
        self.log.write().await.push(record.clone());

        let warning = match &self.mirror {
            Some(mirror) => match mirror.insert_response(&record).await {
                Ok(()) => None,
                Err(e) => {
                    tracing::warn!(id = %record.id, error = %e, "Response saved in memory only");
                    Some(format!("Database warning: {e}"))
                }
            },
            None => None,
        };

        tracing::info!(id = %record.id, answers = record.answers.len(), "Survey response saved");
        Ok(SubmitReceipt {
            saved: record,
            warning,
        })
    }
}
