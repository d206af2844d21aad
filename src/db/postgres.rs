//! PostgreSQL backend for the Database trait.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_postgres::{Config, Pool, Runtime};
use tokio_postgres::NoTls;

use crate::config::DatabaseConfig;
use crate::db::{Database, ResponseStore, TelemetryStore};
use crate::error::DatabaseError;
use crate::responses::{ResponseMeta, ResponseRecord};
use crate::telemetry::{EventKind, StepCounts, TelemetryEvent};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS survey_responses (
    id TEXT PRIMARY KEY,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    name TEXT NOT NULL,
    email TEXT NOT NULL,
    company TEXT,
    answers JSONB NOT NULL,
    ratings JSONB,
    ai_gists JSONB,
    meta JSONB
);

CREATE INDEX IF NOT EXISTS idx_responses_created ON survey_responses(created_at);

CREATE TABLE IF NOT EXISTS survey_sessions (
    session_id TEXT PRIMARY KEY,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    name TEXT,
    email TEXT,
    meta JSONB
);

CREATE TABLE IF NOT EXISTS survey_events (
    id BIGSERIAL PRIMARY KEY,
    session_id TEXT NOT NULL,
    ts TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    event TEXT NOT NULL,
    section_id TEXT,
    question_id TEXT,
    from_question_id TEXT,
    step_index INT,
    ms_from_start INT,
    extra JSONB
);

CREATE INDEX IF NOT EXISTS idx_events_session ON survey_events(session_id);
CREATE INDEX IF NOT EXISTS idx_events_question ON survey_events(question_id);
"#;

/// PostgreSQL database backend.
pub struct PgBackend {
    pool: Pool,
}

impl PgBackend {
    /// Create a new pool and check that a connection can be made.
    pub async fn new(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let url = config.url().ok_or_else(|| {
            DatabaseError::Pool("DATABASE_URL is required for the postgres backend".to_string())
        })?;

        let mut cfg = Config::new();
        cfg.url = Some(url.to_string());
        cfg.pool = Some(deadpool_postgres::PoolConfig {
            max_size: config.pool_size,
            ..Default::default()
        });

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| DatabaseError::Pool(e.to_string()))?;

        // Test connection
        let _ = pool.get().await?;

        Ok(Self { pool })
    }

    async fn conn(&self) -> Result<deadpool_postgres::Object, DatabaseError> {
        Ok(self.pool.get().await?)
    }
}

fn json<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, DatabaseError> {
    serde_json::to_value(value).map_err(|e| DatabaseError::Serialization(e.to_string()))
}

fn from_json<T: serde::de::DeserializeOwned + Default>(
    value: Option<serde_json::Value>,
) -> Result<T, DatabaseError> {
    match value {
        Some(serde_json::Value::Null) | None => Ok(T::default()),
        Some(v) => {
            serde_json::from_value(v).map_err(|e| DatabaseError::Serialization(e.to_string()))
        }
    }
}

#[async_trait]
impl ResponseStore for PgBackend {
    async fn insert_response(&self, record: &ResponseRecord) -> Result<(), DatabaseError> {
        let conn = self.conn().await?;
        conn.execute(
            "INSERT INTO survey_responses \
             (id, created_at, name, email, company, answers, ratings, ai_gists, meta) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (id) DO NOTHING",
            &[
                &record.id,
                &record.created_at,
                &record.name,
                &record.email,
                &record.company,
                &json(&record.answers)?,
                &json(&record.rating_group)?,
                &json(&record.ai_gists)?,
                &json(&record.meta)?,
            ],
        )
        .await?;
        Ok(())
    }

    async fn list_responses(&self) -> Result<Vec<ResponseRecord>, DatabaseError> {
        let conn = self.conn().await?;
        let rows = conn
            .query(
                "SELECT id, created_at, name, email, company, answers, ratings, ai_gists, meta \
                 FROM survey_responses ORDER BY created_at DESC",
                &[],
            )
            .await?;

        rows.iter()
            .map(|row| {
                let created_at: DateTime<Utc> = row.get(1);
                Ok(ResponseRecord {
                    id: row.get(0),
                    created_at,
                    name: row.get(2),
                    email: row.get(3),
                    company: row.get(4),
                    answers: from_json::<BTreeMap<String, serde_json::Value>>(row.get(5))?,
                    rating_group: from_json(row.get(6))?,
                    ai_gists: from_json(row.get(7))?,
                    meta: from_json::<ResponseMeta>(row.get(8))?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl TelemetryStore for PgBackend {
    async fn record_events(&self, events: &[TelemetryEvent]) -> Result<(), DatabaseError> {
        let mut conn = self.conn().await?;
        let tx = conn.transaction().await?;
        let empty = serde_json::json!({});

        for e in events {
            let extra = e.extra.as_ref().unwrap_or(&empty);
            if e.event == EventKind::SessionStart {
                tx.execute(
                    "INSERT INTO survey_sessions (session_id, name, email, meta) \
                     VALUES ($1, $2, $3, $4) ON CONFLICT (session_id) DO NOTHING",
                    &[&e.session_id, &e.name, &e.email, extra],
                )
                .await?;
            }
            let step_index = e.step_index.map(|v| v as i32);
            let ms_from_start = e.ms_from_start.map(|v| v as i32);
            tx.execute(
                "INSERT INTO survey_events \
                 (session_id, event, section_id, question_id, from_question_id, \
                  step_index, ms_from_start, extra) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
                &[
                    &e.session_id,
                    &e.event.as_str(),
                    &e.section_id,
                    &e.question_id,
                    &e.from_question_id,
                    &step_index,
                    &ms_from_start,
                    extra,
                ],
            )
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn step_counts(&self) -> Result<Vec<StepCounts>, DatabaseError> {
        let conn = self.conn().await?;
        let rows = conn
            .query(
                r#"
                SELECT question_id,
                       COUNT(*) FILTER (WHERE event = 'question_view') AS views,
                       COUNT(*) FILTER (WHERE event = 'question_next') AS nexts,
                       ROUND(AVG(COALESCE((extra->>'dwellMs')::float8, ms_from_start::float8))
                             FILTER (WHERE event = 'question_next'))::float8 AS avg_ms
                FROM survey_events
                WHERE question_id IS NOT NULL
                  AND event IN ('question_view', 'question_next')
                GROUP BY question_id
                ORDER BY question_id
                "#,
                &[],
            )
            .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let views: i64 = row.get(1);
                let nexts: i64 = row.get(2);
                StepCounts {
                    question_id: row.get(0),
                    views: views.max(0) as u64,
                    nexts: nexts.max(0) as u64,
                    avg_ms: row.get(3),
                }
            })
            .collect())
    }

    async fn session_count(&self) -> Result<u64, DatabaseError> {
        let conn = self.conn().await?;
        let row = conn
            .query_one("SELECT COUNT(*) FROM survey_sessions", &[])
            .await?;
        let count: i64 = row.get(0);
        Ok(count.max(0) as u64)
    }
}

#[async_trait]
impl Database for PgBackend {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        let conn = self.conn().await?;
        conn.batch_execute(SCHEMA)
            .await
            .map_err(|e| DatabaseError::Migration(e.to_string()))?;
        Ok(())
    }
}
