//! ResponseStore implementation for LibSqlBackend.

use async_trait::async_trait;
use libsql::params;

use crate::db::ResponseStore;
use crate::db::libsql::{LibSqlBackend, fmt_ts, get_opt_text, get_text, get_ts};
use crate::error::DatabaseError;
use crate::responses::ResponseRecord;

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, DatabaseError> {
    serde_json::to_string(value).map_err(|e| DatabaseError::Serialization(e.to_string()))
}

/// Decode a JSON column, treating NULL as the type's default.
fn from_json<T: serde::de::DeserializeOwned + Default>(
    raw: Option<String>,
) -> Result<T, DatabaseError> {
    match raw {
        Some(raw) if !raw.is_empty() => serde_json::from_str(&raw)
            .map_err(|e| DatabaseError::Serialization(format!("invalid JSON column: {e}"))),
        _ => Ok(T::default()),
    }
}

/// Column order: id(0), created_at(1), name(2), email(3), company(4),
/// answers(5), ratings(6), ai_gists(7), meta(8).
fn row_to_record(row: &libsql::Row) -> Result<ResponseRecord, DatabaseError> {
    Ok(ResponseRecord {
        id: get_text(row, 0),
        created_at: get_ts(row, 1)?,
        name: get_text(row, 2),
        email: get_text(row, 3),
        company: get_opt_text(row, 4),
        answers: from_json(get_opt_text(row, 5))?,
        rating_group: from_json(get_opt_text(row, 6))?,
        ai_gists: from_json(get_opt_text(row, 7))?,
        meta: from_json(get_opt_text(row, 8))?,
    })
}

#[async_trait]
impl ResponseStore for LibSqlBackend {
    async fn insert_response(&self, record: &ResponseRecord) -> Result<(), DatabaseError> {
        let conn = self.connect().await?;
        conn.execute(
            "INSERT INTO survey_responses \
             (id, created_at, name, email, company, answers, ratings, ai_gists, meta) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9) \
             ON CONFLICT (id) DO NOTHING",
            params![
                record.id.as_str(),
                fmt_ts(&record.created_at),
                record.name.as_str(),
                record.email.as_str(),
                record.company.as_deref(),
                to_json(&record.answers)?,
                to_json(&record.rating_group)?,
                to_json(&record.ai_gists)?,
                to_json(&record.meta)?,
            ],
        )
        .await
        .map_err(|e| DatabaseError::Query(e.to_string()))?;
        Ok(())
    }

    async fn list_responses(&self) -> Result<Vec<ResponseRecord>, DatabaseError> {
        let conn = self.connect().await?;
        let mut rows = conn
            .query(
                "SELECT id, created_at, name, email, company, answers, ratings, ai_gists, meta \
                 FROM survey_responses ORDER BY created_at DESC",
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
            out.push(row_to_record(&row)?);
        }
        Ok(out)
    }
}
