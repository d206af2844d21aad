//! In-process backend for tests and `DATABASE_BACKEND=memory`.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::db::{Database, ResponseStore, TelemetryStore};
use crate::error::DatabaseError;
use crate::responses::ResponseRecord;
use crate::telemetry::{EventKind, StepCounts, TelemetryEvent};

#[derive(Default)]
pub struct MemoryDatabase {
    responses: RwLock<Vec<ResponseRecord>>,
    sessions: RwLock<BTreeSet<String>>,
    events: RwLock<Vec<TelemetryEvent>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResponseStore for MemoryDatabase {
    async fn insert_response(&self, record: &ResponseRecord) -> Result<(), DatabaseError> {
        let mut responses = self.responses.write().await;
        if !responses.iter().any(|r| r.id == record.id) {
            responses.push(record.clone());
        }
        Ok(())
    }

    async fn list_responses(&self) -> Result<Vec<ResponseRecord>, DatabaseError> {
        let mut out = self.responses.read().await.clone();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }
}

#[async_trait]
impl TelemetryStore for MemoryDatabase {
    async fn record_events(&self, events: &[TelemetryEvent]) -> Result<(), DatabaseError> {
        let mut sessions = self.sessions.write().await;
        for event in events.iter().filter(|e| e.event == EventKind::SessionStart) {
            sessions.insert(event.session_id.clone());
        }
        self.events.write().await.extend_from_slice(events);
        Ok(())
    }

    async fn step_counts(&self) -> Result<Vec<StepCounts>, DatabaseError> {
        #[derive(Default)]
        struct Acc {
            views: u64,
            nexts: u64,
            dwell_total: i64,
            dwell_count: u64,
        }

        let events = self.events.read().await;
        let mut by_question: BTreeMap<&str, Acc> = BTreeMap::new();
        for event in events.iter() {
            let Some(question_id) = event.question_id.as_deref() else {
                continue;
            };
            match event.event {
                EventKind::QuestionView => by_question.entry(question_id).or_default().views += 1,
                EventKind::QuestionNext => {
                    let acc = by_question.entry(question_id).or_default();
                    acc.nexts += 1;
                    if let Some(ms) = event.dwell_ms() {
                        acc.dwell_total += ms;
                        acc.dwell_count += 1;
                    }
                }
                _ => {}
            }
        }

        Ok(by_question
            .into_iter()
            .map(|(question_id, acc)| StepCounts {
                question_id: question_id.to_string(),
                views: acc.views,
                nexts: acc.nexts,
                avg_ms: (acc.dwell_count > 0)
                    .then(|| (acc.dwell_total as f64 / acc.dwell_count as f64).round()),
            })
            .collect())
    }

    async fn session_count(&self) -> Result<u64, DatabaseError> {
        Ok(self.sessions.read().await.len() as u64)
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    fn is_durable(&self) -> bool {
        false
    }

    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn next(question: &str, dwell: i64) -> TelemetryEvent {
        TelemetryEvent::new("s", EventKind::QuestionNext)
            .with_question("about_you", question)
            .with_extra(json!({ "dwellMs": dwell }))
    }

    #[tokio::test]
    async fn step_counts_group_by_question() {
        let db = MemoryDatabase::new();
        let mut events = vec![TelemetryEvent::new("s", EventKind::SessionStart)];
        for _ in 0..10 {
            events.push(TelemetryEvent::new("s", EventKind::QuestionView).with_question("about_you", "nps"));
        }
        for dwell in [1000, 2000, 3000, 1000, 2000, 3000, 2000] {
            events.push(next("nps", dwell));
        }
        events.push(next("current_crm", 500));
        db.record_events(&events).await.unwrap();

        let counts = db.step_counts().await.unwrap();
        assert_eq!(counts.len(), 2);
        let nps = counts.iter().find(|c| c.question_id == "nps").unwrap();
        assert_eq!((nps.views, nps.nexts), (10, 7));
        assert_eq!(nps.avg_ms, Some(2000.0));
        let crm = counts.iter().find(|c| c.question_id == "current_crm").unwrap();
        assert_eq!((crm.views, crm.nexts), (0, 1));
        assert_eq!(db.session_count().await.unwrap(), 1);
    }
}
