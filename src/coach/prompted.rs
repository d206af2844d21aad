//! Prompt-driven coaching on top of a raw text-completion backend.
//!
//! Backends only know how to send one prompt and return the model's text.
//! [`PromptedProvider`] owns the prompts and turns the text back into typed
//! results; this is the only place JSON is fished out of model prose.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Deserialize;

use crate::coach::extract;
use crate::coach::provider::{CoachingProvider, OptionDescription, ValidateRequest, Validation};
use crate::error::CoachError;

/// A single completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub system: Option<String>,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

/// Sends a prompt to a hosted model and returns its text output.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, prompt: &Prompt) -> Result<String, CoachError>;
}

const VALIDATE_SYSTEM: &str = r#"You are a warm survey coach reviewing one short answer. Reply with JSON only: {"ok": boolean, "friendly": string, "wantsSkip": boolean, "wantsMore": boolean}.
- ok is false only when the answer is empty or plainly gibberish; brief answers are still ok.
- friendly is one gentle sentence beginning with "Thank you." that suggests one concrete detail to add. Never label the answer as unhelpful and never use bullet points.
- If the respondent says they do not use a CRM, suggest describing the tools they do use each morning (spreadsheets, email), set wantsSkip to true, and mention they can type "skip" to move on.
- wantsSkip is true when the respondent signals they want to skip ("na", "none", "no comment", "not applicable", "don't know"); friendly must then say they can type "skip".
- wantsMore is true when the answer is probably too thin for the question.
- Only ask for numbers when the question itself asks for numbers."#;

const FOLLOWUP_SYSTEM: &str = "Suggest one short follow-up question (at most 18 words) that would make the respondent's answer more specific. Reply with the question text only.";

const DESCRIBE_SYSTEM: &str = r#"For each listed item, write a plain-English explanation of under 12 words in the context of CRM pain points. Reply with JSON only: an array of {"label": string, "description": string} in the same order as the items."#;

const EXAMPLES_SYSTEM: &str = "Give 6 short example answers of 2 to 4 words each, phrased as neutral metric labels such as 'meetings booked' or 'open pipeline'. Reply with a JSON array of strings only: no numbering, no sentences.";

const INSIGHTS_SYSTEM: &str = "You are a product strategist who writes crisp, actionable insights from CRM survey data.";

const INSIGHTS_BRIEF: &str = "Summarize the survey responses below. Provide:
- Top 5 themes, each with one line of evidence
- How satisfied and dissatisfied respondents differ
- Quick wins that could ship within two weeks
- Risks and unknowns to validate next
Keep it to concise bullet points.";

/// Fields are optional so a partially conforming model reply still decodes;
/// a reply without `ok` is rejected.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawValidation {
    ok: Option<bool>,
    friendly: Option<String>,
    #[serde(default)]
    wants_skip: Option<bool>,
    #[serde(default)]
    wants_more: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawDescriptions {
    List(Vec<OptionDescription>),
    Map(BTreeMap<String, String>),
}

/// Coaching provider built from prompts plus a completion backend.
pub struct PromptedProvider<B> {
    backend: B,
}

impl<B: CompletionBackend> PromptedProvider<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    fn invalid(&self, reason: impl Into<String>) -> CoachError {
        CoachError::InvalidResponse {
            provider: self.backend.name().to_string(),
            reason: reason.into(),
        }
    }

    async fn ask(&self, system: &str, user: String, temperature: f32) -> Result<String, CoachError> {
        let prompt = Prompt {
            system: Some(system.to_string()),
            user,
            temperature,
            max_tokens: None,
        };
        let text = self.backend.complete(&prompt).await?;
        if text.trim().is_empty() {
            return Err(self.invalid("empty completion"));
        }
        Ok(text)
    }
}

#[async_trait]
impl<B: CompletionBackend> CoachingProvider for PromptedProvider<B> {
    fn name(&self) -> &str {
        self.backend.name()
    }

    async fn validate(&self, request: &ValidateRequest) -> Result<Validation, CoachError> {
        let user = format!(
            "Question: {}\nRole: {}\nAnswer: {}",
            request.question.as_deref().unwrap_or(""),
            request.role_id.as_deref().unwrap_or(""),
            request.text
        );
        let text = self.ask(VALIDATE_SYSTEM, user, 0.2).await?;
        let raw: RawValidation =
            extract::object(&text).ok_or_else(|| self.invalid("no JSON object in reply"))?;
        let ok = raw.ok.ok_or_else(|| self.invalid("reply lacks `ok`"))?;

        Ok(Validation {
            ok,
            friendly: raw.friendly.filter(|f| !f.trim().is_empty()),
            wants_skip: raw.wants_skip.unwrap_or(false),
            wants_more: raw.wants_more.unwrap_or(false),
        })
    }

    async fn followup(&self, question: &str, answer: &str) -> Result<String, CoachError> {
        let user = format!("Question: {question}\nAnswer: {answer}");
        let text = self.ask(FOLLOWUP_SYSTEM, user, 0.3).await?;
        Ok(text.trim().trim_matches('"').trim().to_string())
    }

    async fn describe_options(
        &self,
        question_id: &str,
        options: &[String],
    ) -> Result<Vec<OptionDescription>, CoachError> {
        let items: Vec<String> = options.iter().map(|o| format!("- {o}")).collect();
        let user = format!("Question ID: {question_id}\nItems:\n{}", items.join("\n"));
        let text = self.ask(DESCRIBE_SYSTEM, user, 0.2).await?;

        let raw = extract::array::<Vec<OptionDescription>>(&text)
            .map(RawDescriptions::List)
            .or_else(|| extract::object::<RawDescriptions>(&text))
            .ok_or_else(|| self.invalid("no descriptions in reply"))?;
        Ok(match raw {
            RawDescriptions::List(list) => list,
            RawDescriptions::Map(map) => map
                .into_iter()
                .map(|(label, description)| OptionDescription {
                    label: Some(label),
                    description,
                })
                .collect(),
        })
    }

    async fn examples(
        &self,
        question_id: &str,
        role_id: Option<&str>,
    ) -> Result<Vec<String>, CoachError> {
        let user = format!(
            "Question ID: {question_id}\nRole: {}",
            role_id.unwrap_or("unknown")
        );
        let text = self.ask(EXAMPLES_SYSTEM, user, 0.3).await?;
        let examples: Vec<String> =
            extract::array(&text).ok_or_else(|| self.invalid("no JSON array in reply"))?;
        let examples: Vec<String> = examples
            .into_iter()
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .collect();
        if examples.is_empty() {
            return Err(self.invalid("empty example list"));
        }
        Ok(examples)
    }

    async fn insights(&self, digest: &str) -> Result<String, CoachError> {
        let user = format!("{INSIGHTS_BRIEF}\n\nJSON:\n{digest}");
        self.ask(INSIGHTS_SYSTEM, user, 0.3).await
    }
}

/// Cut provider output for error messages without splitting a character.
pub(crate) fn snippet(text: &str) -> String {
    text.chars().take(200).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Backend replaying a canned reply and recording the last prompt.
    struct CannedBackend {
        reply: Result<String, ()>,
        last_prompt: Mutex<Option<Prompt>>,
    }

    impl CannedBackend {
        fn replying(text: &str) -> Self {
            Self {
                reply: Ok(text.to_string()),
                last_prompt: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl CompletionBackend for CannedBackend {
        fn name(&self) -> &str {
            "canned"
        }

        async fn complete(&self, prompt: &Prompt) -> Result<String, CoachError> {
            *self.last_prompt.lock().unwrap() = Some(prompt.clone());
            self.reply.clone().map_err(|()| CoachError::RequestFailed {
                provider: "canned".into(),
                reason: "down".into(),
            })
        }
    }

    fn request(text: &str) -> ValidateRequest {
        ValidateRequest {
            field_id: "top_metrics".into(),
            text: text.into(),
            question: Some("What are the top metrics you track daily?".into()),
            role_id: Some("sales_ops".into()),
        }
    }

    #[tokio::test]
    async fn validate_parses_json_wrapped_in_prose() {
        let provider = PromptedProvider::new(CannedBackend::replying(
            "Here is my assessment:\n{\"ok\": true, \"friendly\": \"Thank you. Which one matters most?\", \"wantsMore\": true}",
        ));
        let v = provider.validate(&request("pipeline")).await.unwrap();
        assert!(v.ok);
        assert!(v.wants_more);
        assert!(!v.wants_skip);

        let prompt = provider.backend.last_prompt.lock().unwrap().clone().unwrap();
        assert!(prompt.user.contains("Role: sales_ops"));
        assert!(prompt.user.ends_with("Answer: pipeline"));
    }

    #[tokio::test]
    async fn validate_rejects_reply_without_ok() {
        let provider = PromptedProvider::new(CannedBackend::replying("{\"friendly\": \"hi\"}"));
        let err = provider.validate(&request("pipeline")).await.unwrap_err();
        assert!(matches!(err, CoachError::InvalidResponse { .. }));
    }

    #[tokio::test]
    async fn describe_accepts_list_or_map() {
        let provider = PromptedProvider::new(CannedBackend::replying(
            "[{\"label\": \"Slack\", \"description\": \"Team chat\"}]",
        ));
        let list = provider
            .describe_options("connected_tools", &["Slack".into()])
            .await
            .unwrap();
        assert_eq!(list[0].label.as_deref(), Some("Slack"));

        let provider =
            PromptedProvider::new(CannedBackend::replying("```{\"Slack\": \"Team chat\"}```"));
        let list = provider
            .describe_options("connected_tools", &["Slack".into()])
            .await
            .unwrap();
        assert_eq!(list[0].description, "Team chat");
    }

    #[tokio::test]
    async fn followup_strips_quotes_and_examples_need_items() {
        let provider = PromptedProvider::new(CannedBackend::replying("\"Which report do you open first?\"\n"));
        assert_eq!(
            provider.followup("q", "a").await.unwrap(),
            "Which report do you open first?"
        );

        let provider = PromptedProvider::new(CannedBackend::replying("[\"  \"]"));
        assert!(provider.examples("top_metrics", None).await.is_err());
    }

    #[test]
    fn snippet_respects_char_boundaries() {
        let text = "é".repeat(300);
        assert_eq!(snippet(&text).chars().count(), 200);
    }
}
