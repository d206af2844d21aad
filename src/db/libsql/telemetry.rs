//! TelemetryStore implementation for LibSqlBackend.

use async_trait::async_trait;
use libsql::{TransactionBehavior, params};

use crate::db::TelemetryStore;
use crate::db::libsql::{LibSqlBackend, get_i64, get_opt_f64, get_text};
use crate::error::DatabaseError;
use crate::telemetry::{EventKind, StepCounts, TelemetryEvent};

fn json_text(value: Option<&serde_json::Value>) -> String {
    value.map_or_else(|| "{}".to_string(), |v| v.to_string())
}

#[async_trait]
impl TelemetryStore for LibSqlBackend {
    async fn record_events(&self, events: &[TelemetryEvent]) -> Result<(), DatabaseError> {
        let conn = self.connect().await?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;

        for e in events {
            if e.event == EventKind::SessionStart {
                tx.execute(
                    "INSERT INTO survey_sessions (session_id, name, email, meta) \
                     VALUES (?1, ?2, ?3, ?4) \
                     ON CONFLICT (session_id) DO NOTHING",
                    params![
                        e.session_id.as_str(),
                        e.name.as_deref(),
                        e.email.as_deref(),
                        json_text(e.extra.as_ref()),
                    ],
                )
                .await
                .map_err(|e| DatabaseError::Query(e.to_string()))?;
            }
            tx.execute(
                "INSERT INTO survey_events \
                 (session_id, event, section_id, question_id, from_question_id, \
                  step_index, ms_from_start, extra) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    e.session_id.as_str(),
                    e.event.as_str(),
                    e.section_id.as_deref(),
                    e.question_id.as_deref(),
                    e.from_question_id.as_deref(),
                    e.step_index,
                    e.ms_from_start,
                    json_text(e.extra.as_ref()),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;
        }

        // Dropping the transaction without commit rolls it back.
        tx.commit()
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;
        Ok(())
    }

    async fn step_counts(&self) -> Result<Vec<StepCounts>, DatabaseError> {
        let conn = self.connect().await?;
        let mut rows = conn
            .query(
                r#"
                SELECT question_id,
                       SUM(CASE WHEN event = 'question_view' THEN 1 ELSE 0 END) AS views,
                       SUM(CASE WHEN event = 'question_next' THEN 1 ELSE 0 END) AS nexts,
                       ROUND(AVG(CASE WHEN event = 'question_next'
                                      THEN CAST(COALESCE(json_extract(extra, '$.dwellMs'), ms_from_start) AS REAL)
                                 END)) AS avg_ms
                FROM survey_events
                WHERE question_id IS NOT NULL
                  AND event IN ('question_view', 'question_next')
                GROUP BY question_id
                ORDER BY question_id
                "#,
                params![],
            )
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;

        let mut out = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?
        {
            out.push(StepCounts {
                question_id: get_text(&row, 0),
                views: get_i64(&row, 1).max(0) as u64,
                nexts: get_i64(&row, 2).max(0) as u64,
                avg_ms: get_opt_f64(&row, 3),
            });
        }
        Ok(out)
    }

    async fn session_count(&self) -> Result<u64, DatabaseError> {
        let conn = self.connect().await?;
        let mut rows = conn
            .query("SELECT COUNT(*) FROM survey_sessions", params![])
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;
        let row = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;
        Ok(row.map_or(0, |r| get_i64(&r, 0).max(0) as u64))
    }
}
