use std::time::Duration;

use secrecy::SecretString;

use crate::config::helpers::{optional_env, parse_optional_env};
use crate::error::ConfigError;

const DEFAULT_GOOGLE_MODEL: &str = "gemini-1.5-flash";
const DEFAULT_OPENROUTER_MODEL: &str = "openai/gpt-4o-mini";
const DEFAULT_OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Coaching provider configuration.
///
/// Providers are tried in a fixed order (Gemini, then OpenRouter); a
/// provider without an API key is left out of the chain.
#[derive(Debug, Clone)]
pub struct CoachConfig {
    pub google_api_key: Option<SecretString>,
    pub google_model: String,
    pub openrouter_api_key: Option<SecretString>,
    pub openrouter_model: String,
    pub openrouter_base_url: String,
    /// Deadline for a single provider attempt.
    pub provider_timeout: Duration,
}

impl Default for CoachConfig {
    fn default() -> Self {
        Self {
            google_api_key: None,
            google_model: DEFAULT_GOOGLE_MODEL.to_string(),
            openrouter_api_key: None,
            openrouter_model: DEFAULT_OPENROUTER_MODEL.to_string(),
            openrouter_base_url: DEFAULT_OPENROUTER_BASE_URL.to_string(),
            provider_timeout: Duration::from_secs(8),
        }
    }
}

impl CoachConfig {
    pub(crate) fn resolve() -> Result<Self, ConfigError> {
        let timeout_secs: u64 = parse_optional_env("COACH_PROVIDER_TIMEOUT_SECS", 8)?;
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "COACH_PROVIDER_TIMEOUT_SECS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            google_api_key: optional_env("GOOGLE_FLASH_API_KEY")?.map(SecretString::from),
            google_model: optional_env("GOOGLE_MODEL")?
                .unwrap_or_else(|| DEFAULT_GOOGLE_MODEL.to_string()),
            openrouter_api_key: optional_env("OPENROUTER_API_KEY")?.map(SecretString::from),
            openrouter_model: optional_env("OPENROUTER_MODEL")?
                .unwrap_or_else(|| DEFAULT_OPENROUTER_MODEL.to_string()),
            openrouter_base_url: optional_env("OPENROUTER_BASE_URL")?
                .unwrap_or_else(|| DEFAULT_OPENROUTER_BASE_URL.to_string()),
            provider_timeout: Duration::from_secs(timeout_secs),
        })
    }
}
