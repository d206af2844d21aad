//! Durable storage for responses and telemetry.
//!
//! Backends:
//! - **memory**: process memory, lost on restart
//! - **libsql**: embedded file database (feature `libsql`, default)
//! - **postgres**: deadpool-postgres pool (feature `postgres`)

#[cfg(feature = "libsql")]
pub mod libsql;
#[cfg(feature = "libsql")]
pub mod libsql_migrations;
mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::MemoryDatabase;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{DatabaseBackend, DatabaseConfig};
use crate::error::{DatabaseError, TelemetryError};
use crate::responses::ResponseRecord;
use crate::telemetry::{StepCounts, TelemetryEvent, TelemetrySink};

#[async_trait]
pub trait ResponseStore: Send + Sync {
    async fn insert_response(&self, record: &ResponseRecord) -> Result<(), DatabaseError>;

    /// Every stored response, newest first.
    async fn list_responses(&self) -> Result<Vec<ResponseRecord>, DatabaseError>;
}

#[async_trait]
pub trait TelemetryStore: Send + Sync {
    /// Append a batch atomically. `session_start` events also register the
    /// session if it is new.
    async fn record_events(&self, events: &[TelemetryEvent]) -> Result<(), DatabaseError>;

    /// Per-question view/next counts and mean dwell time.
    async fn step_counts(&self) -> Result<Vec<StepCounts>, DatabaseError>;

    async fn session_count(&self) -> Result<u64, DatabaseError> {
        Ok(0)
    }
}

/// Backend-agnostic database supertrait.
#[async_trait]
pub trait Database: ResponseStore + TelemetryStore {
    fn backend_name(&self) -> &'static str;

    /// Whether data outlives the process.
    fn is_durable(&self) -> bool {
        true
    }

    async fn run_migrations(&self) -> Result<(), DatabaseError>;
}

/// Connect to the configured backend and run its migrations.
pub async fn connect(config: &DatabaseConfig) -> Result<Arc<dyn Database>, DatabaseError> {
    let db: Arc<dyn Database> = match config.backend {
        DatabaseBackend::Memory => Arc::new(MemoryDatabase::new()),
        #[cfg(feature = "libsql")]
        DatabaseBackend::LibSql => {
            Arc::new(libsql::LibSqlBackend::new_local(&config.libsql_path).await?)
        }
        #[cfg(feature = "postgres")]
        DatabaseBackend::Postgres => Arc::new(postgres::PgBackend::new(config).await?),
        #[allow(unreachable_patterns)]
        other => return Err(DatabaseError::BackendUnavailable(other.to_string())),
    };
    db.run_migrations().await?;
    tracing::info!(backend = db.backend_name(), "Database ready");
    Ok(db)
}

/// Telemetry sink that writes straight into a database.
pub struct StoredTelemetry(pub Arc<dyn Database>);

#[async_trait]
impl TelemetrySink for StoredTelemetry {
    async fn record(&self, events: Vec<TelemetryEvent>) -> Result<(), TelemetryError> {
        Ok(self.0.record_events(&events).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_backend_connects() {
        let db = connect(&DatabaseConfig::memory()).await.unwrap();
        assert_eq!(db.backend_name(), "memory");
        assert!(!db.is_durable());
    }

    #[cfg(not(feature = "postgres"))]
    #[tokio::test]
    async fn missing_backend_is_reported() {
        let config = DatabaseConfig {
            backend: DatabaseBackend::Postgres,
            ..DatabaseConfig::memory()
        };
        assert!(matches!(
            connect(&config).await,
            Err(DatabaseError::BackendUnavailable(_))
        ));
    }
}
