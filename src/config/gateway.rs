use std::time::Duration;

use rand::RngCore;
use secrecy::SecretString;

use crate::config::helpers::{optional_env, parse_optional_env};
use crate::error::ConfigError;

/// Web gateway and admin credential configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    pub admin_username: String,
    pub admin_password: SecretString,
    /// Key used to sign the admin session cookie.
    pub session_secret: SecretString,
    pub session_ttl: Duration,
}

impl GatewayConfig {
    pub(crate) fn resolve() -> Result<Self, ConfigError> {
        let port = optional_env("SURVEY_PORT")?
            .map(|s| s.parse())
            .transpose()
            .map_err(|e| ConfigError::InvalidValue {
                key: "SURVEY_PORT".to_string(),
                message: format!("must be a valid port number: {e}"),
            })?
            .unwrap_or(3000);

        let session_secret = match optional_env("ADMIN_SESSION_SECRET")? {
            Some(secret) => SecretString::from(secret),
            None => {
                tracing::debug!("ADMIN_SESSION_SECRET not set, admin sessions end on restart");
                random_secret()
            }
        };

        Ok(Self {
            host: optional_env("SURVEY_HOST")?.unwrap_or_else(|| "127.0.0.1".to_string()),
            port,
            admin_username: optional_env("ADMIN_USERNAME")?.unwrap_or_else(|| "admin".to_string()),
            admin_password: SecretString::from(
                optional_env("ADMIN_PASSWORD")?.unwrap_or_else(|| "change-me".to_string()),
            ),
            session_secret,
            session_ttl: Duration::from_secs(parse_optional_env(
                "ADMIN_SESSION_TTL_SECS",
                8 * 60 * 60,
            )?),
        })
    }

    /// Socket address string for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            admin_username: "admin".to_string(),
            admin_password: SecretString::from("change-me".to_string()),
            session_secret: random_secret(),
            session_ttl: Duration::from_secs(8 * 60 * 60),
        }
    }
}

fn random_secret() -> SecretString {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    SecretString::from(hex)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::helpers::tests::ENV_LOCK;
    use secrecy::ExposeSecret;

    #[test]
    fn defaults_match_documented_credentials() {
        let config = GatewayConfig::default();
        assert_eq!(config.admin_username, "admin");
        assert_eq!(config.admin_password.expose_secret(), "change-me");
        assert_eq!(config.session_ttl, Duration::from_secs(28_800));
        assert_eq!(config.bind_addr(), "127.0.0.1:3000");
    }

    #[test]
    fn random_secrets_differ() {
        assert_ne!(
            random_secret().expose_secret(),
            random_secret().expose_secret()
        );
    }

    #[test]
    fn bad_port_is_rejected() {
        let _lock = ENV_LOCK.lock();
        unsafe { std::env::set_var("SURVEY_PORT", "99999") };
        let result = GatewayConfig::resolve();
        unsafe { std::env::remove_var("SURVEY_PORT") };
        assert!(matches!(result, Err(ConfigError::InvalidValue { key, .. }) if key == "SURVEY_PORT"));
    }
}
