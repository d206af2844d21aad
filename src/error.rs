//! Error types for the survey service.

use std::time::Duration;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Coach error: {0}")]
    Coach(#[from] CoachError),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Submission error: {0}")]
    Submit(#[from] SubmitError),

    #[error("Draft error: {0}")]
    Draft(#[from] DraftError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Backend {0} is not compiled into this build")]
    BackendUnavailable(String),

    #[cfg(feature = "postgres")]
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[cfg(feature = "postgres")]
    #[error("Pool build error: {0}")]
    PoolBuild(#[from] deadpool_postgres::CreatePoolError),

    #[cfg(feature = "postgres")]
    #[error("Pool runtime error: {0}")]
    PoolRuntime(#[from] deadpool_postgres::PoolError),

    #[cfg(feature = "libsql")]
    #[error("LibSQL error: {0}")]
    LibSql(#[from] libsql::Error),
}

/// Web gateway errors.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Gateway failed to start: {reason}")]
    StartupFailed { reason: String },

    #[error("Request to {url} failed: {reason}")]
    RequestFailed { url: String, reason: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Coaching provider errors.
#[derive(Debug, thiserror::Error)]
pub enum CoachError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited")]
    RateLimited { provider: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("Provider {provider} timed out after {timeout:?}")]
    Timeout { provider: String, timeout: Duration },

    #[error("No coaching provider is available")]
    Unavailable,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Schema construction errors.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("Duplicate question id: {0}")]
    DuplicateQuestion(String),

    #[error("Section {section} has no prompts")]
    EmptySection { section: String },

    #[error("Question {question} needs options for its type")]
    MissingOptions { question: String },
}

/// Submission errors surfaced to the respondent.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("Name and email are required")]
    MissingIdentity,

    #[error("Invalid email")]
    InvalidEmail,

    #[error("Submission rejected: {0}")]
    Rejected(String),

    #[error("Submission transport failed: {0}")]
    Transport(String),
}

/// Telemetry delivery errors. These are never shown to respondents.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("Telemetry storage failed: {0}")]
    Storage(#[from] DatabaseError),

    #[error("Telemetry transport failed: {0}")]
    Transport(String),
}

/// Local draft persistence errors.
#[derive(Debug, thiserror::Error)]
pub enum DraftError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Draft could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
