//! OpenRouter (OpenAI-compatible Chat Completions) backend.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::coach::prompted::{CompletionBackend, Prompt, snippet};
use crate::error::CoachError;

const PROVIDER_NAME: &str = "openrouter";

pub struct OpenRouterBackend {
    client: Client,
    api_key: SecretString,
    model: String,
    base_url: String,
}

impl OpenRouterBackend {
    pub fn new(
        client: Client,
        api_key: SecretString,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_key,
            model: model.into(),
            base_url: base_url.into(),
        }
    }

    fn api_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl CompletionBackend for OpenRouterBackend {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn complete(&self, prompt: &Prompt) -> Result<String, CoachError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &prompt.system {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &prompt.user,
        });
        let body = ChatRequest {
            model: &self.model,
            messages,
            temperature: prompt.temperature,
            max_tokens: prompt.max_tokens,
        };

        let url = self.api_url();
        tracing::debug!(url = %url, model = %self.model, "Sending OpenRouter completion");

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| CoachError::RequestFailed {
                provider: PROVIDER_NAME.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(match status.as_u16() {
                401 | 403 => CoachError::AuthFailed {
                    provider: PROVIDER_NAME.to_string(),
                },
                429 => CoachError::RateLimited {
                    provider: PROVIDER_NAME.to_string(),
                },
                _ => CoachError::RequestFailed {
                    provider: PROVIDER_NAME.to_string(),
                    reason: format!("HTTP {}: {}", status, snippet(&text)),
                },
            });
        }

        let parsed: ChatResponse =
            serde_json::from_str(&text).map_err(|e| CoachError::InvalidResponse {
                provider: PROVIDER_NAME.to_string(),
                reason: format!("JSON parse error: {}. Raw: {}", e, snippet(&text)),
            })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| CoachError::InvalidResponse {
                provider: PROVIDER_NAME.to_string(),
                reason: "no choices in response".to_string(),
            })
    }
}
