//! Answer coaching.
//!
//! Hosted models judge free-text answers, suggest follow-ups, describe
//! options and propose example answers. Providers are tried in order:
//! - **Gemini**: when `GOOGLE_FLASH_API_KEY` is set
//! - **OpenRouter**: when `OPENROUTER_API_KEY` is set
//! - **Heuristic**: always, and the only source when no key is configured

mod extract;
mod facade;
mod gemini;
pub mod heuristic;
mod openrouter;
mod prompted;
mod provider;

pub use facade::{CoachingFacade, merge_descriptions};
pub use gemini::GeminiBackend;
pub use heuristic::Gist;
pub use openrouter::OpenRouterBackend;
pub use prompted::{CompletionBackend, Prompt, PromptedProvider};
pub use provider::{
    Coach, CoachingProvider, Descriptions, OptionDescription, ValidateRequest, Validation,
};

use std::sync::Arc;

use reqwest::Client;

use crate::config::CoachConfig;
use crate::error::CoachError;

/// Build the provider chain from configuration.
pub fn build_coach(config: &CoachConfig) -> Result<CoachingFacade, CoachError> {
    let client = Client::builder().timeout(config.provider_timeout).build()?;
    let mut providers: Vec<Arc<dyn CoachingProvider>> = Vec::new();

    if let Some(key) = &config.google_api_key {
        providers.push(Arc::new(PromptedProvider::new(GeminiBackend::new(
            client.clone(),
            key.clone(),
            config.google_model.clone(),
        ))));
    }
    if let Some(key) = &config.openrouter_api_key {
        providers.push(Arc::new(PromptedProvider::new(OpenRouterBackend::new(
            client,
            key.clone(),
            config.openrouter_model.clone(),
            config.openrouter_base_url.clone(),
        ))));
    }

    let facade = CoachingFacade::new(providers, config.provider_timeout);
    if facade.provider_names().is_empty() {
        tracing::info!("No coaching provider key set, using heuristic coaching only");
    } else {
        tracing::info!(providers = ?facade.provider_names(), "Coaching providers configured");
    }
    Ok(facade)
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    #[test]
    fn chain_follows_configured_keys() {
        let config = CoachConfig::default();
        assert!(build_coach(&config).unwrap().provider_names().is_empty());

        let config = CoachConfig {
            google_api_key: Some(SecretString::from("g".to_string())),
            openrouter_api_key: Some(SecretString::from("o".to_string())),
            ..CoachConfig::default()
        };
        assert_eq!(
            build_coach(&config).unwrap().provider_names(),
            vec!["gemini", "openrouter"]
        );
    }
}
