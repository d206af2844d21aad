//! Respondent funnel telemetry.
//!
//! Events are fire-and-forget: the survey never waits on delivery and a
//! failed send is logged at debug level and dropped. Delivery order
//! matches emit order, so a session's `session_start` lands first.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::Instrument;

use crate::error::TelemetryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    SessionStart,
    PageView,
    QuestionView,
    QuestionNext,
    SubmitStart,
    SubmitOk,
    SubmitError,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SessionStart => "session_start",
            Self::PageView => "page_view",
            Self::QuestionView => "question_view",
            Self::QuestionNext => "question_next",
            Self::SubmitStart => "submit_start",
            Self::SubmitOk => "submit_ok",
            Self::SubmitError => "submit_error",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "session_start" => Ok(Self::SessionStart),
            "page_view" => Ok(Self::PageView),
            "question_view" => Ok(Self::QuestionView),
            "question_next" => Ok(Self::QuestionNext),
            "submit_start" => Ok(Self::SubmitStart),
            "submit_ok" => Ok(Self::SubmitOk),
            "submit_error" => Ok(Self::SubmitError),
            other => Err(format!("unknown telemetry event '{other}'")),
        }
    }
}

/// One funnel event, in the JSON shape accepted by `POST /api/telemetry`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryEvent {
    pub session_id: String,
    pub event: EventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_question_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_index: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ms_from_start: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

impl TelemetryEvent {
    pub fn new(session_id: impl Into<String>, event: EventKind) -> Self {
        Self {
            session_id: session_id.into(),
            event,
            name: None,
            email: None,
            section_id: None,
            question_id: None,
            from_question_id: None,
            step_index: None,
            ms_from_start: None,
            extra: None,
        }
    }

    pub fn with_question(mut self, section_id: &str, question_id: &str) -> Self {
        self.section_id = Some(section_id.to_string());
        self.question_id = Some(question_id.to_string());
        self
    }

    pub fn with_respondent(mut self, name: &str, email: &str) -> Self {
        self.name = Some(name.to_string()).filter(|s| !s.is_empty());
        self.email = Some(email.to_string()).filter(|s| !s.is_empty());
        self
    }

    pub fn with_step(mut self, step_index: usize) -> Self {
        self.step_index = Some(step_index as i64);
        self
    }

    pub fn with_extra(mut self, extra: serde_json::Value) -> Self {
        self.extra = Some(extra);
        self
    }

    /// Dwell time carried by a `question_next` event.
    pub fn dwell_ms(&self) -> Option<i64> {
        self.extra
            .as_ref()
            .and_then(|extra| extra.get("dwellMs"))
            .and_then(serde_json::Value::as_i64)
            .or(self.ms_from_start)
    }
}

/// Request body of `POST /api/telemetry`: a single event or a batch.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum EventBatch {
    One(TelemetryEvent),
    Many(Vec<TelemetryEvent>),
}

impl EventBatch {
    pub fn into_vec(self) -> Vec<TelemetryEvent> {
        match self {
            Self::One(event) => vec![event],
            Self::Many(events) => events,
        }
    }
}

/// Raw per-question funnel counts as read from storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepCounts {
    pub question_id: String,
    pub views: u64,
    pub nexts: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_ms: Option<f64>,
}

/// Destination for telemetry batches.
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    async fn record(&self, events: Vec<TelemetryEvent>) -> Result<(), TelemetryError>;
}

/// Upper bound on events handed to the sink in one call.
const MAX_BATCH: usize = 64;

enum Command {
    Event(TelemetryEvent),
    Flush(oneshot::Sender<()>),
}

/// Queues events for a single background worker so callers never wait on
/// telemetry. The worker delivers in emit order, batching whatever has
/// queued up since its last write.
#[derive(Clone, Default)]
pub struct TelemetryDispatcher {
    tx: Option<mpsc::UnboundedSender<Command>>,
}

impl TelemetryDispatcher {
    /// Start the delivery worker. Outside a tokio runtime the dispatcher
    /// comes back disabled.
    pub fn new(sink: Arc<dyn TelemetrySink>) -> Self {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::debug!("No runtime, telemetry disabled");
            return Self::disabled();
        };
        let (tx, rx) = mpsc::unbounded_channel();
        handle.spawn(deliver(sink, rx).in_current_span());
        Self { tx: Some(tx) }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn emit(&self, event: TelemetryEvent) {
        let Some(tx) = &self.tx else {
            return;
        };
        if let Err(mpsc::error::SendError(Command::Event(event))) = tx.send(Command::Event(event)) {
            tracing::debug!(event = %event.event, "Telemetry worker gone, event dropped");
        }
    }

    /// Wait until every event emitted so far has been handed to the sink.
    pub async fn flush(&self) {
        let Some(tx) = &self.tx else {
            return;
        };
        let (done_tx, done_rx) = oneshot::channel();
        if tx.send(Command::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }
}

async fn deliver(sink: Arc<dyn TelemetrySink>, mut rx: mpsc::UnboundedReceiver<Command>) {
    let mut batch = Vec::new();
    let mut waiters = Vec::new();
    while let Some(command) = rx.recv().await {
        let mut next = Some(command);
        while let Some(command) = next.take() {
            match command {
                Command::Event(event) => batch.push(event),
                Command::Flush(done) => waiters.push(done),
            }
            if batch.len() < MAX_BATCH {
                next = rx.try_recv().ok();
            }
        }

        if !batch.is_empty() {
            let count = batch.len();
            if let Err(e) = sink.record(std::mem::take(&mut batch)).await {
                tracing::debug!(count, error = %e, "Telemetry delivery failed");
            }
        }
        for done in waiters.drain(..) {
            let _ = done.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Collect(Mutex<Vec<TelemetryEvent>>);

    #[async_trait]
    impl TelemetrySink for Collect {
        async fn record(&self, events: Vec<TelemetryEvent>) -> Result<(), TelemetryError> {
            self.0.lock().unwrap().extend(events);
            Ok(())
        }
    }

    struct Broken;

    #[async_trait]
    impl TelemetrySink for Broken {
        async fn record(&self, _events: Vec<TelemetryEvent>) -> Result<(), TelemetryError> {
            Err(TelemetryError::Transport("offline".to_string()))
        }
    }

    #[test]
    fn event_json_is_camel_case() {
        let event = TelemetryEvent::new("s1", EventKind::QuestionNext)
            .with_question("about_you", "nps")
            .with_extra(serde_json::json!({ "dwellMs": 1200 }));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["sessionId"], "s1");
        assert_eq!(json["event"], "question_next");
        assert_eq!(json["questionId"], "nps");
        assert!(json.get("name").is_none());
        assert_eq!(event.dwell_ms(), Some(1200));
    }

    #[test]
    fn batch_accepts_one_or_many() {
        let one: EventBatch =
            serde_json::from_str(r#"{"sessionId":"s","event":"page_view"}"#).unwrap();
        assert_eq!(one.into_vec().len(), 1);
        let many: EventBatch = serde_json::from_str(
            r#"[{"sessionId":"s","event":"page_view"},{"sessionId":"s","event":"submit_ok"}]"#,
        )
        .unwrap();
        assert_eq!(many.into_vec()[1].event, EventKind::SubmitOk);
    }

    #[test]
    fn kind_parses_its_own_names() {
        for kind in [EventKind::SessionStart, EventKind::QuestionView, EventKind::SubmitError] {
            assert_eq!(kind.as_str().parse::<EventKind>().unwrap(), kind);
        }
        assert!("page_close".parse::<EventKind>().is_err());
    }

    #[tokio::test]
    async fn dispatcher_delivers_in_background() {
        let sink = Arc::new(Collect::default());
        let dispatcher = TelemetryDispatcher::new(sink.clone());
        dispatcher.emit(TelemetryEvent::new("s", EventKind::SessionStart));
        dispatcher.flush().await;
        assert_eq!(sink.0.lock().unwrap().len(), 1);
    }

    /// Takes a while on `session_start`, like a first write that creates
    /// the session row.
    #[derive(Default)]
    struct SlowStart(Mutex<Vec<EventKind>>);

    #[async_trait]
    impl TelemetrySink for SlowStart {
        async fn record(&self, events: Vec<TelemetryEvent>) -> Result<(), TelemetryError> {
            for event in events {
                if event.event == EventKind::SessionStart {
                    tokio::time::sleep(std::time::Duration::from_millis(30)).await;
                }
                self.0.lock().unwrap().push(event.event);
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn delivery_keeps_emit_order() {
        let sink = Arc::new(SlowStart::default());
        let dispatcher = TelemetryDispatcher::new(sink.clone());
        dispatcher.emit(TelemetryEvent::new("s", EventKind::SessionStart));
        dispatcher.emit(TelemetryEvent::new("s", EventKind::QuestionView));
        dispatcher.emit(TelemetryEvent::new("s", EventKind::QuestionNext));
        dispatcher.flush().await;
        assert_eq!(
            *sink.0.lock().unwrap(),
            [
                EventKind::SessionStart,
                EventKind::QuestionView,
                EventKind::QuestionNext
            ]
        );
    }

    #[tokio::test]
    async fn burst_of_events_is_not_lost() {
        let sink = Arc::new(Collect::default());
        let dispatcher = TelemetryDispatcher::new(sink.clone());
        for _ in 0..200 {
            dispatcher.emit(
                TelemetryEvent::new("s", EventKind::QuestionView).with_question("about_you", "nps"),
            );
        }
        dispatcher.flush().await;
        assert_eq!(sink.0.lock().unwrap().len(), 200);
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn failed_delivery_is_logged_and_dropped() {
        let dispatcher = TelemetryDispatcher::new(Arc::new(Broken));
        dispatcher.emit(TelemetryEvent::new("s", EventKind::SubmitOk));
        dispatcher.flush().await;
        assert!(logs_contain("Telemetry delivery failed"));
    }

    #[test]
    fn disabled_dispatcher_is_silent_outside_runtime() {
        TelemetryDispatcher::disabled().emit(TelemetryEvent::new("s", EventKind::PageView));
        let dispatcher = TelemetryDispatcher::new(Arc::new(Collect::default()));
        dispatcher.emit(TelemetryEvent::new("s", EventKind::PageView));
    }
}
