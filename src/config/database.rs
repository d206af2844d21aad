use std::path::PathBuf;

use secrecy::{ExposeSecret, SecretString};

use crate::bootstrap::survey_base_dir;
use crate::config::helpers::{optional_env, parse_optional_env};
use crate::error::ConfigError;

/// Which durable store mirrors submitted responses and holds telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DatabaseBackend {
    /// Process memory only; everything is lost on restart.
    Memory,
    /// libSQL embedded file database (default).
    #[default]
    LibSql,
    /// PostgreSQL via deadpool-postgres.
    Postgres,
}

impl std::fmt::Display for DatabaseBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Memory => write!(f, "memory"),
            Self::LibSql => write!(f, "libsql"),
            Self::Postgres => write!(f, "postgres"),
        }
    }
}

impl std::str::FromStr for DatabaseBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" | "none" => Ok(Self::Memory),
            "libsql" | "sqlite" => Ok(Self::LibSql),
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            _ => Err(format!(
                "invalid database backend '{}', expected 'memory', 'libsql' or 'postgres'",
                s
            )),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,

    // -- PostgreSQL fields --
    pub url: Option<SecretString>,
    pub pool_size: usize,

    // -- libSQL fields --
    /// Path to the local libSQL file (default: ~/.crm-survey/survey.db).
    pub libsql_path: PathBuf,
}

impl DatabaseConfig {
    pub(crate) fn resolve() -> Result<Self, ConfigError> {
        let backend: DatabaseBackend = if let Some(b) = optional_env("DATABASE_BACKEND")? {
            b.parse().map_err(|e| ConfigError::InvalidValue {
                key: "DATABASE_BACKEND".to_string(),
                message: e,
            })?
        } else {
            DatabaseBackend::default()
        };

        let url = optional_env("DATABASE_URL")?.map(SecretString::from);
        if backend == DatabaseBackend::Postgres && url.is_none() {
            return Err(ConfigError::MissingRequired {
                key: "DATABASE_URL".to_string(),
                hint: "Set DATABASE_URL or choose DATABASE_BACKEND=libsql".to_string(),
            });
        }

        let pool_size = parse_optional_env("DATABASE_POOL_SIZE", 10)?;
        let libsql_path = optional_env("LIBSQL_PATH")?
            .map(PathBuf::from)
            .unwrap_or_else(default_libsql_path);

        Ok(Self {
            backend,
            url,
            pool_size,
            libsql_path,
        })
    }

    /// Get the database URL (exposes the secret).
    pub fn url(&self) -> Option<&str> {
        self.url.as_ref().map(|u| u.expose_secret())
    }

    /// In-memory configuration, used by tests and `--no-db` runs.
    pub fn memory() -> Self {
        Self {
            backend: DatabaseBackend::Memory,
            url: None,
            pool_size: 1,
            libsql_path: default_libsql_path(),
        }
    }
}

/// Default libSQL database path (~/.crm-survey/survey.db).
pub fn default_libsql_path() -> PathBuf {
    survey_base_dir().join("survey.db")
}
