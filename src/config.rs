//! Configuration for the survey service.
//!
//! All settings come from environment variables, with a `.env` file in the
//! working directory loaded first when present.

mod coach;
mod database;
mod gateway;
pub(crate) mod helpers;

pub use self::coach::CoachConfig;
pub use self::database::{DatabaseBackend, DatabaseConfig, default_libsql_path};
pub use self::gateway::GatewayConfig;

use crate::error::ConfigError;

/// Main configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub coach: CoachConfig,
    pub gateway: GatewayConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Ok(Self {
            database: DatabaseConfig::resolve()?,
            coach: CoachConfig::resolve()?,
            gateway: GatewayConfig::resolve()?,
        })
    }
}
