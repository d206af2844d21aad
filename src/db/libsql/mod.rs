//! libSQL (embedded SQLite) backend.

mod responses;
mod telemetry;

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Builder, Connection, Row, Value};

use crate::db::Database;
use crate::db::libsql_migrations::SCHEMA;
use crate::error::DatabaseError;

/// How long a connection waits on another writer before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct LibSqlBackend {
    db: libsql::Database,
}

impl LibSqlBackend {
    /// Open (or create) a local database file.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("cannot create {}: {e}", parent.display()))
            })?;
        }
        let db = Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(e.to_string()))?;
        let backend = Self { db };
        // WAL lets the admin views read while the telemetry worker writes.
        let conn = backend.connect().await?;
        let mut rows = conn
            .query("PRAGMA journal_mode = WAL", ())
            .await
            .map_err(|e| DatabaseError::Pool(format!("journal_mode: {e}")))?;
        rows.next()
            .await
            .map_err(|e| DatabaseError::Pool(format!("journal_mode: {e}")))?;
        tracing::debug!(path = %path.display(), "Opened libSQL database");
        Ok(backend)
    }

    /// New connection that waits out concurrent writers instead of
    /// failing with `database is locked`.
    pub(crate) async fn connect(&self) -> Result<Connection, DatabaseError> {
        let conn = self
            .db
            .connect()
            .map_err(|e| DatabaseError::Pool(e.to_string()))?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| DatabaseError::Pool(format!("busy_timeout: {e}")))?;
        Ok(conn)
    }
}

#[async_trait]
impl Database for LibSqlBackend {
    fn backend_name(&self) -> &'static str {
        "libsql"
    }

    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        let conn = self.connect().await?;
        conn.execute_batch(SCHEMA)
            .await
            .map_err(|e| DatabaseError::Migration(e.to_string()))?;
        Ok(())
    }
}

/// Text column, empty when NULL.
pub(crate) fn get_text(row: &Row, idx: i32) -> String {
    get_opt_text(row, idx).unwrap_or_default()
}

pub(crate) fn get_opt_text(row: &Row, idx: i32) -> Option<String> {
    match row.get_value(idx).ok()? {
        Value::Text(s) => Some(s),
        _ => None,
    }
}

pub(crate) fn get_i64(row: &Row, idx: i32) -> i64 {
    match row.get_value(idx) {
        Ok(Value::Integer(n)) => n,
        Ok(Value::Real(f)) => f as i64,
        _ => 0,
    }
}

pub(crate) fn get_opt_f64(row: &Row, idx: i32) -> Option<f64> {
    match row.get_value(idx).ok()? {
        Value::Integer(n) => Some(n as f64),
        Value::Real(f) => Some(f),
        _ => None,
    }
}

/// Timestamps are stored as RFC 3339 text.
pub(crate) fn fmt_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

pub(crate) fn get_ts(row: &Row, idx: i32) -> Result<DateTime<Utc>, DatabaseError> {
    let raw = get_text(row, idx);
    DateTime::parse_from_rfc3339(&raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| DatabaseError::Serialization(format!("invalid timestamp '{raw}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LibSqlBackend::new_local(&dir.path().join("test.db"))
            .await
            .unwrap();
        backend.run_migrations().await.unwrap();
        backend.run_migrations().await.unwrap();
    }

    #[test]
    fn timestamps_sort_lexically() {
        let early = DateTime::parse_from_rfc3339("2024-01-02T03:04:05Z")
            .unwrap()
            .with_timezone(&Utc);
        let late = early + chrono::Duration::milliseconds(1);
        assert!(fmt_ts(&early) < fmt_ts(&late));
    }
}
