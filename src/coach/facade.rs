//! Ordered provider fallback for coaching.
//!
//! Tries each configured provider in sequence, each under its own deadline,
//! and answers from the local heuristic when every provider fails. Callers
//! never see a provider error for the four survey operations.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::coach::heuristic;
use crate::coach::provider::{
    Coach, CoachingProvider, Descriptions, OptionDescription, ValidateRequest, Validation,
};
use crate::error::CoachError;

/// Transient errors are expected churn; the rest point at configuration.
fn is_transient(err: &CoachError) -> bool {
    matches!(
        err,
        CoachError::RequestFailed { .. }
            | CoachError::RateLimited { .. }
            | CoachError::Timeout { .. }
            | CoachError::Http(_)
    )
}

pub struct CoachingFacade {
    providers: Vec<Arc<dyn CoachingProvider>>,
    timeout: Duration,
}

impl CoachingFacade {
    /// An empty provider list is valid: every call uses the heuristic.
    pub fn new(providers: Vec<Arc<dyn CoachingProvider>>, timeout: Duration) -> Self {
        Self { providers, timeout }
    }

    pub fn heuristic_only() -> Self {
        Self::new(Vec::new(), Duration::from_secs(1))
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Try each provider in sequence until one succeeds or all fail.
    async fn try_providers<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, CoachError>
    where
        F: FnMut(Arc<dyn CoachingProvider>) -> Fut,
        Fut: Future<Output = Result<T, CoachError>>,
    {
        let mut last_error: Option<CoachError> = None;

        for (i, provider) in self.providers.iter().enumerate() {
            let result = match tokio::time::timeout(self.timeout, call(Arc::clone(provider))).await
            {
                Ok(result) => result,
                Err(_) => Err(CoachError::Timeout {
                    provider: provider.name().to_string(),
                    timeout: self.timeout,
                }),
            };
            match result {
                Ok(value) => return Ok(value),
                Err(err) => {
                    let next = self.providers.get(i + 1).map_or("heuristic", |p| p.name());
                    if is_transient(&err) {
                        tracing::warn!(
                            provider = %provider.name(),
                            operation,
                            error = %err,
                            next_provider = %next,
                            "Coaching provider failed, trying next"
                        );
                    } else {
                        tracing::error!(
                            provider = %provider.name(),
                            operation,
                            error = %err,
                            next_provider = %next,
                            "Coaching provider rejected request, check its configuration"
                        );
                    }
                    last_error = Some(err);
                }
            }
        }

        Err(last_error.unwrap_or(CoachError::Unavailable))
    }

    /// Admin summary over a digest of responses. No heuristic stands in here.
    pub async fn insights(&self, digest: &str) -> Result<String, CoachError> {
        let digest = digest.to_string();
        self.try_providers("insights", |provider| {
            let digest = digest.clone();
            async move { provider.insights(&digest).await }
        })
        .await
    }
}

#[async_trait]
impl Coach for CoachingFacade {
    async fn validate(&self, request: &ValidateRequest) -> Result<Validation, CoachError> {
        let result = self
            .try_providers("validate", |provider| {
                let request = request.clone();
                async move { provider.validate(&request).await }
            })
            .await;
        Ok(result.unwrap_or_else(|err| {
            tracing::debug!(field = %request.field_id, error = %err, "Validating with heuristic");
            heuristic::validate(request)
        }))
    }

    async fn followup(&self, question: &str, answer: &str) -> Result<String, CoachError> {
        let result = self
            .try_providers("followup", |provider| {
                let (question, answer) = (question.to_string(), answer.to_string());
                async move { provider.followup(&question, &answer).await }
            })
            .await;
        Ok(match result {
            Ok(text) if !text.trim().is_empty() => text,
            _ => heuristic::followup(),
        })
    }

    async fn describe_options(
        &self,
        question_id: &str,
        options: &[String],
    ) -> Result<Descriptions, CoachError> {
        let described = self
            .try_providers("describe", |provider| {
                let (question_id, options) = (question_id.to_string(), options.to_vec());
                async move { provider.describe_options(&question_id, &options).await }
            })
            .await
            .unwrap_or_default();
        Ok(merge_descriptions(options, &described))
    }

    async fn examples(
        &self,
        question_id: &str,
        role_id: Option<&str>,
    ) -> Result<Vec<String>, CoachError> {
        let result = self
            .try_providers("examples", |provider| {
                let question_id = question_id.to_string();
                let role_id = role_id.map(str::to_string);
                async move { provider.examples(&question_id, role_id.as_deref()).await }
            })
            .await;
        Ok(result.unwrap_or_else(|_| heuristic::examples()))
    }
}

/// Attach a description to every option label.
///
/// Matching order: exact label, case-insensitive label, the entry at the
/// same position (if no other option claimed it), the builtin description,
/// then an empty string.
pub fn merge_descriptions(options: &[String], described: &[OptionDescription]) -> Descriptions {
    let usable = |d: &OptionDescription| !d.description.trim().is_empty();
    let mut claimed = vec![false; described.len()];
    let mut direct: Vec<Option<usize>> = vec![None; options.len()];

    for (i, label) in options.iter().enumerate() {
        let lower = label.to_lowercase();
        let hit = described.iter().enumerate().position(|(j, d)| {
            !claimed[j]
                && usable(d)
                && d
                    .label
                    .as_deref()
                    .is_some_and(|l| l == label || l.to_lowercase() == lower)
        });
        if let Some(j) = hit {
            claimed[j] = true;
            direct[i] = Some(j);
        }
    }

    let mut out = Descriptions::new();
    for (i, label) in options.iter().enumerate() {
        let positional = || {
            described
                .get(i)
                .filter(|d| !claimed[i] && usable(d))
                .map(|d| d.description.trim().to_string())
        };
        let description = direct[i]
            .map(|j| described[j].description.trim().to_string())
            .or_else(positional)
            .or_else(|| heuristic::describe(label).map(str::to_string))
            .unwrap_or_default();
        out.insert(label.clone(), description);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// A mock coaching provider that returns predetermined results.
    struct MockProvider {
        name: String,
        validate_result: Mutex<Option<Result<Validation, CoachError>>>,
        delay: Option<Duration>,
        calls: AtomicUsize,
    }

    impl MockProvider {
        fn succeeding(name: &str, validation: Validation) -> Self {
            Self {
                name: name.to_string(),
                validate_result: Mutex::new(Some(Ok(validation))),
                delay: None,
                calls: AtomicUsize::new(0),
            }
        }

        fn failing(name: &str, err: CoachError) -> Self {
            Self {
                name: name.to_string(),
                validate_result: Mutex::new(Some(Err(err))),
                delay: None,
                calls: AtomicUsize::new(0),
            }
        }

        fn slow(name: &str, delay: Duration) -> Self {
            Self {
                delay: Some(delay),
                ..Self::succeeding(name, Validation::accepted())
            }
        }

        fn down(&self) -> CoachError {
            CoachError::RequestFailed {
                provider: self.name.clone(),
                reason: "not mocked".to_string(),
            }
        }
    }

    #[async_trait]
    impl CoachingProvider for MockProvider {
        fn name(&self) -> &str {
            &self.name
        }

        async fn validate(&self, _request: &ValidateRequest) -> Result<Validation, CoachError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.validate_result
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Err(self.down()))
        }

        async fn followup(&self, _question: &str, _answer: &str) -> Result<String, CoachError> {
            Err(self.down())
        }

        async fn describe_options(
            &self,
            _question_id: &str,
            _options: &[String],
        ) -> Result<Vec<OptionDescription>, CoachError> {
            Ok(vec![
                OptionDescription {
                    label: Some("slack".to_string()),
                    description: "Team chat".to_string(),
                },
                OptionDescription {
                    label: Some("Mail thing".to_string()),
                    description: "Email provider".to_string(),
                },
            ])
        }

        async fn examples(
            &self,
            _question_id: &str,
            _role_id: Option<&str>,
        ) -> Result<Vec<String>, CoachError> {
            Err(self.down())
        }

        async fn insights(&self, _digest: &str) -> Result<String, CoachError> {
            Ok(format!("insights from {}", self.name))
        }
    }

    fn request(text: &str) -> ValidateRequest {
        ValidateRequest {
            field_id: "recent_scenario".to_string(),
            text: text.to_string(),
            question: None,
            role_id: None,
        }
    }

    fn wants_more() -> Validation {
        Validation {
            ok: true,
            friendly: Some("Thank you. What happened next?".to_string()),
            wants_skip: false,
            wants_more: true,
        }
    }

    #[tokio::test]
    async fn primary_succeeds_no_failover() {
        let primary = Arc::new(MockProvider::succeeding("primary", wants_more()));
        let secondary = Arc::new(MockProvider::succeeding("secondary", Validation::accepted()));
        let facade = CoachingFacade::new(
            vec![primary.clone(), secondary.clone()],
            Duration::from_secs(5),
        );

        let v = facade.validate(&request("it was slow")).await.unwrap();
        assert!(v.wants_more);
        assert_eq!(secondary.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn auth_failure_still_falls_through() {
        let primary = Arc::new(MockProvider::failing(
            "primary",
            CoachError::AuthFailed {
                provider: "primary".to_string(),
            },
        ));
        let secondary = Arc::new(MockProvider::succeeding("secondary", wants_more()));
        let facade = CoachingFacade::new(vec![primary, secondary], Duration::from_secs(5));

        let v = facade.validate(&request("it was slow")).await.unwrap();
        assert_eq!(v, wants_more());
    }

    #[tokio::test]
    async fn slow_provider_times_out_to_next() {
        let slow = Arc::new(MockProvider::slow("slow", Duration::from_millis(500)));
        let secondary = Arc::new(MockProvider::succeeding("secondary", wants_more()));
        let facade = CoachingFacade::new(vec![slow, secondary], Duration::from_millis(20));

        let v = facade.validate(&request("it was slow")).await.unwrap();
        assert!(v.wants_more);
    }

    #[tokio::test]
    async fn all_failing_uses_heuristic() {
        let facade = CoachingFacade::new(
            vec![Arc::new(MockProvider::failing(
                "only",
                CoachError::RateLimited {
                    provider: "only".to_string(),
                },
            ))],
            Duration::from_secs(5),
        );

        let v = facade.validate(&request("n/a")).await.unwrap();
        assert!(v.ok);
        assert!(v.wants_skip);

        assert_eq!(
            facade.followup("q", "a").await.unwrap(),
            heuristic::FOLLOWUP_FALLBACK
        );
        assert_eq!(facade.examples("top_metrics", None).await.unwrap().len(), 6);
    }

    #[tokio::test]
    async fn insights_without_providers_is_unavailable() {
        let facade = CoachingFacade::heuristic_only();
        assert!(matches!(
            facade.insights("[]").await,
            Err(CoachError::Unavailable)
        ));

        let facade = CoachingFacade::new(
            vec![Arc::new(MockProvider::slow("p", Duration::ZERO))],
            Duration::from_secs(1),
        );
        assert_eq!(facade.insights("[]").await.unwrap(), "insights from p");
    }

    #[tokio::test]
    async fn describe_merges_by_label_position_and_builtin() {
        let facade = CoachingFacade::new(
            vec![Arc::new(MockProvider::slow("p", Duration::ZERO))],
            Duration::from_secs(1),
        );
        let options = vec![
            "Slack".to_string(),
            "Marketing email provider".to_string(),
            "Maintaining data quality".to_string(),
            "Brand new".to_string(),
        ];
        let merged = facade.describe_options("x", &options).await.unwrap();
        assert_eq!(merged["Slack"], "Team chat");
        assert_eq!(merged["Marketing email provider"], "Email provider");
        assert_eq!(merged["Maintaining data quality"], "Fixing duplicates and missing fields");
        assert_eq!(merged["Brand new"], "");
    }

    #[test]
    fn positional_entry_is_not_reused_once_claimed() {
        let described = vec![
            OptionDescription {
                label: Some("B".to_string()),
                description: "about B".to_string(),
            },
            OptionDescription {
                label: None,
                description: "second".to_string(),
            },
        ];
        let merged = merge_descriptions(&["A".to_string(), "B".to_string()], &described);
        assert_eq!(merged["B"], "about B");
        // Entry 0 belongs to B, so A gets nothing positional.
        assert_eq!(merged["A"], "");
    }
}
