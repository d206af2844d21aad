//! Google Gemini `generateContent` backend.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::coach::prompted::{CompletionBackend, Prompt, snippet};
use crate::error::CoachError;

const PROVIDER_NAME: &str = "gemini";
const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

pub struct GeminiBackend {
    client: Client,
    api_key: SecretString,
    model: String,
}

impl GeminiBackend {
    pub fn new(client: Client, api_key: SecretString, model: impl Into<String>) -> Self {
        Self {
            client,
            api_key,
            model: model.into(),
        }
    }

    fn api_url(&self) -> String {
        format!("{}/{}:generateContent", API_BASE, self.model)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateResponse {
    fn first_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .find_map(|p| p.text)
    }
}

#[async_trait]
impl CompletionBackend for GeminiBackend {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn complete(&self, prompt: &Prompt) -> Result<String, CoachError> {
        // Instructions lead the single user turn.
        let text = match &prompt.system {
            Some(system) => format!("{system}\n\n{}", prompt.user),
            None => prompt.user.clone(),
        };
        let body = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: &text }],
            }],
            generation_config: GenerationConfig {
                temperature: prompt.temperature,
                max_output_tokens: prompt.max_tokens,
            },
        };

        tracing::debug!(model = %self.model, "Sending Gemini generateContent");

        let response = self
            .client
            .post(self.api_url())
            .query(&[("key", self.api_key.expose_secret())])
            .json(&body)
            .send()
            .await
            .map_err(|e| CoachError::RequestFailed {
                provider: PROVIDER_NAME.to_string(),
                reason: e.without_url().to_string(),
            })?;

        let status = response.status();
        let raw = response.text().await.map_err(|e| CoachError::RequestFailed {
            provider: PROVIDER_NAME.to_string(),
            reason: e.without_url().to_string(),
        })?;
        if !status.is_success() {
            return Err(match status.as_u16() {
                400 if raw.contains("API_KEY_INVALID") => CoachError::AuthFailed {
                    provider: PROVIDER_NAME.to_string(),
                },
                401 | 403 => CoachError::AuthFailed {
                    provider: PROVIDER_NAME.to_string(),
                },
                429 => CoachError::RateLimited {
                    provider: PROVIDER_NAME.to_string(),
                },
                _ => CoachError::RequestFailed {
                    provider: PROVIDER_NAME.to_string(),
                    reason: format!("HTTP {}: {}", status, snippet(&raw)),
                },
            });
        }

        let parsed: GenerateResponse =
            serde_json::from_str(&raw).map_err(|e| CoachError::InvalidResponse {
                provider: PROVIDER_NAME.to_string(),
                reason: format!("JSON parse error: {}. Raw: {}", e, snippet(&raw)),
            })?;
        parsed.first_text().ok_or_else(|| CoachError::InvalidResponse {
            provider: PROVIDER_NAME.to_string(),
            reason: "no candidate text".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_names_model() {
        let backend = GeminiBackend::new(
            Client::new(),
            SecretString::from("k".to_string()),
            "gemini-1.5-flash",
        );
        assert_eq!(
            backend.api_url(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent"
        );
    }

    #[test]
    fn request_uses_generation_config() {
        let body = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: "hello" }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.2,
                max_output_tokens: Some(200),
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 200);
        assert_eq!(json["contents"][0]["parts"][0]["text"], "hello");
    }

    #[test]
    fn first_text_walks_candidates() {
        let parsed: GenerateResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"{\"ok\":true}"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(parsed.first_text().as_deref(), Some("{\"ok\":true}"));

        let empty: GenerateResponse = serde_json::from_str("{}").unwrap();
        assert!(empty.first_text().is_none());
    }
}
