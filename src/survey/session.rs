//! One respondent's run through the survey.
//!
//! [`SurveySession`] is the I/O boundary around the pure reducer: it calls
//! the coach, persists the draft after every change, emits telemetry and
//! hands the finished draft to a [`Submitter`].

use std::sync::Arc;

use tokio::time::Instant;
use uuid::Uuid;

use crate::coach::Coach;
use crate::error::SubmitError;
use crate::responses::{SubmitReceipt, Submission, Submitter};
use crate::schema::{AnswerValue, SurveySchema};
use crate::survey::draft::{DraftEvent, DraftState, Respondent, reduce};
use crate::survey::navigation::{Cursor, Forward, Stage, forward_target, progress};
use crate::survey::persist::{DraftStore, MemoryDraftStore, PersistedDraft};
use crate::survey::validation::{SKIP_ACK, Verdict, evaluate};
use crate::survey::view::{View, view};
use crate::telemetry::{EventKind, TelemetryDispatcher, TelemetryEvent};

/// Observed generation of the session; a Next carrying an old token is
/// dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepToken(u64);

/// What a Next (or explicit skip) did.
#[derive(Debug)]
pub enum NextOutcome {
    Moved { ack: Option<String> },
    Blocked { messages: Vec<String> },
    Submitted(SubmitReceipt),
    SubmitFailed(SubmitError),
    /// Stale token, or nothing to advance from.
    Ignored,
}

pub struct SurveySession {
    schema: Arc<SurveySchema>,
    state: DraftState,
    coach: Arc<dyn Coach>,
    submitter: Arc<dyn Submitter>,
    drafts: Arc<dyn DraftStore>,
    telemetry: TelemetryDispatcher,
    session_id: String,
    announced: bool,
    generation: u64,
    viewed: Option<String>,
    view_started: Instant,
}

impl SurveySession {
    pub fn new(
        schema: Arc<SurveySchema>,
        coach: Arc<dyn Coach>,
        submitter: Arc<dyn Submitter>,
    ) -> Self {
        Self {
            schema,
            state: DraftState::default(),
            coach,
            submitter,
            drafts: Arc::new(MemoryDraftStore::new()),
            telemetry: TelemetryDispatcher::disabled(),
            session_id: Uuid::new_v4().to_string(),
            announced: false,
            generation: 0,
            viewed: None,
            view_started: Instant::now(),
        }
    }

    pub fn with_drafts(mut self, drafts: Arc<dyn DraftStore>) -> Self {
        self.drafts = drafts;
        self
    }

    pub fn with_telemetry(mut self, telemetry: TelemetryDispatcher) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Wait for queued telemetry to reach its sink.
    pub async fn flush_telemetry(&self) {
        self.telemetry.flush().await;
    }

    /// Pick up a saved draft, if any. Returns whether one was restored.
    pub fn restore(&mut self) -> bool {
        match self.drafts.load() {
            Ok(Some(saved)) => {
                tracing::info!(session = %saved.session_id, "Restored survey draft");
                self.state = saved.state;
                self.session_id = saved.session_id;
                self.announced = true;
                self.refresh_view();
                true
            }
            Ok(None) => false,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring unreadable survey draft");
                false
            }
        }
    }

    pub fn schema(&self) -> &SurveySchema {
        &self.schema
    }

    pub fn state(&self) -> &DraftState {
        &self.state
    }

    pub fn coach(&self) -> &dyn Coach {
        self.coach.as_ref()
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn step_token(&self) -> StepToken {
        StepToken(self.generation)
    }

    pub fn progress(&self) -> u8 {
        progress(&self.schema, self.state.stage)
    }

    pub fn view(&self) -> View<'_> {
        view(&self.schema, &self.state)
    }

    pub fn set_respondent(&mut self, respondent: Respondent) {
        self.dispatch(DraftEvent::SetRespondent(respondent));
    }

    /// Leave the intro screen.
    pub fn start(&mut self) {
        if !self.announced {
            let respondent = &self.state.respondent;
            self.telemetry.emit(
                TelemetryEvent::new(&self.session_id, EventKind::SessionStart)
                    .with_respondent(&respondent.name, &respondent.email),
            );
            self.announced = true;
        }
        self.dispatch(DraftEvent::Start);
    }

    pub fn answer(&mut self, question_id: &str, value: Option<AnswerValue>) {
        self.dispatch(DraftEvent::Answer {
            question_id: question_id.to_string(),
            value,
        });
    }

    pub fn rate(&mut self, item_id: &str, value: u8) {
        self.dispatch(DraftEvent::Rate {
            item_id: item_id.to_string(),
            value,
        });
    }

    pub fn back(&mut self) {
        self.dispatch(DraftEvent::Back);
    }

    /// Drop the draft and begin again under a new session id.
    pub fn reset(&mut self) {
        if let Err(e) = self.drafts.clear() {
            tracing::warn!(error = %e, "Failed to clear survey draft");
        }
        self.session_id = Uuid::new_v4().to_string();
        self.announced = false;
        self.generation += 1;
        self.dispatch(DraftEvent::Reset);
    }

    /// Validate the current step and move forward, submitting after the
    /// last one.
    pub async fn next(&mut self, token: StepToken) -> NextOutcome {
        if token != self.step_token() {
            tracing::debug!("Ignoring stale Next");
            return NextOutcome::Ignored;
        }
        let outcome = self.advance().await;
        self.generation += 1;
        outcome
    }

    /// Skip the current open-text question without answering it.
    pub async fn skip_current(&mut self, token: StepToken) -> NextOutcome {
        if token != self.step_token() {
            return NextOutcome::Ignored;
        }
        let Some((cursor, question_id)) = self.current_open_text() else {
            return NextOutcome::Ignored;
        };
        self.generation += 1;
        self.dispatch(DraftEvent::Warn {
            question_id: question_id.clone(),
        });
        self.dispatch(DraftEvent::ShowMessages {
            question_id,
            messages: Vec::new(),
        });
        self.dispatch(DraftEvent::Acknowledge(Some(SKIP_ACK.to_string())));
        self.record_next(cursor);
        self.forward_or_submit(cursor, Some(SKIP_ACK.to_string()))
            .await
    }

    async fn advance(&mut self) -> NextOutcome {
        let cursor = match self.state.stage {
            Stage::Intro => {
                self.start();
                return NextOutcome::Moved { ack: None };
            }
            Stage::Completed => return NextOutcome::Ignored,
            Stage::Section(cursor) => cursor,
        };

        let schema = Arc::clone(&self.schema);
        let Some(section) = schema.section(cursor.section) else {
            return NextOutcome::Ignored;
        };
        if section.is_rating_group() || section.is_table() {
            self.dispatch(DraftEvent::Acknowledge(None));
            return self.forward_or_submit(cursor, None).await;
        }
        let Some(question) = section.questions().get(cursor.question) else {
            return NextOutcome::Ignored;
        };

        let role = self
            .state
            .answers
            .get("primary_role")
            .and_then(AnswerValue::as_text);
        let verdict = evaluate(
            question,
            self.state.answers.get(&question.id),
            self.state.warn_state(&question.id),
            role,
            self.coach.as_ref(),
        )
        .await;

        match verdict {
            Verdict::Block { messages, warn } => {
                if warn {
                    self.dispatch(DraftEvent::Warn {
                        question_id: question.id.clone(),
                    });
                }
                self.dispatch(DraftEvent::ShowMessages {
                    question_id: question.id.clone(),
                    messages: messages.clone(),
                });
                NextOutcome::Blocked { messages }
            }
            Verdict::Pass { ack } => {
                self.dispatch(DraftEvent::ShowMessages {
                    question_id: question.id.clone(),
                    messages: Vec::new(),
                });
                self.dispatch(DraftEvent::Acknowledge(Some(ack.clone())));
                self.record_next(cursor);
                self.forward_or_submit(cursor, Some(ack)).await
            }
        }
    }

    async fn forward_or_submit(&mut self, cursor: Cursor, ack: Option<String>) -> NextOutcome {
        match forward_target(&self.schema, cursor) {
            Forward::To(_) => {
                self.dispatch(DraftEvent::Forward);
                NextOutcome::Moved { ack }
            }
            Forward::Finish => self.submit().await,
        }
    }

    async fn submit(&mut self) -> NextOutcome {
        self.telemetry
            .emit(TelemetryEvent::new(&self.session_id, EventKind::SubmitStart));

        let result = match self.state.respondent.check() {
            Ok(()) => {
                self.submitter
                    .submit(Submission::from_draft(&self.state))
                    .await
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(receipt) => {
                self.telemetry.emit(
                    TelemetryEvent::new(&self.session_id, EventKind::SubmitOk)
                        .with_extra(serde_json::json!({ "responseId": receipt.saved.id })),
                );
                self.dispatch(DraftEvent::Complete);
                if let Err(e) = self.drafts.clear() {
                    tracing::warn!(error = %e, "Failed to clear submitted draft");
                }
                NextOutcome::Submitted(receipt)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Survey submission failed");
                self.telemetry.emit(
                    TelemetryEvent::new(&self.session_id, EventKind::SubmitError)
                        .with_extra(serde_json::json!({ "error": e.to_string() })),
                );
                NextOutcome::SubmitFailed(e)
            }
        }
    }

    fn current_open_text(&self) -> Option<(Cursor, String)> {
        let cursor = self.state.cursor()?;
        let question = self.state.current_question(&self.schema)?;
        question
            .kind
            .is_open_text()
            .then(|| (cursor, question.id.clone()))
    }

    fn record_next(&mut self, cursor: Cursor) {
        let Some(section) = self.schema.section(cursor.section) else {
            return;
        };
        let Some(question) = section.questions().get(cursor.question) else {
            return;
        };
        let dwell_ms = self.view_started.elapsed().as_millis() as i64;
        let mut event = TelemetryEvent::new(&self.session_id, EventKind::QuestionNext)
            .with_question(&section.id, &question.id)
            .with_step(cursor.question)
            .with_extra(serde_json::json!({ "dwellMs": dwell_ms }));
        event.ms_from_start = Some(dwell_ms);
        self.telemetry.emit(event);
    }

    fn dispatch(&mut self, event: DraftEvent) {
        let state = std::mem::take(&mut self.state);
        self.state = reduce(&self.schema, state, event);
        self.refresh_view();
        self.persist();
    }

    /// Emit `question_view` when the active question changes.
    fn refresh_view(&mut self) {
        let active = self.state.cursor().and_then(|cursor| {
            let section = self.schema.section(cursor.section)?;
            let question = self.state.current_question(&self.schema)?;
            Some((section.id.clone(), question.id.clone(), cursor.question))
        });
        let active_id = active.as_ref().map(|(_, q, _)| q.clone());
        if active_id == self.viewed {
            return;
        }
        self.viewed = active_id;
        if let Some((section_id, question_id, index)) = active {
            self.view_started = Instant::now();
            self.telemetry.emit(
                TelemetryEvent::new(&self.session_id, EventKind::QuestionView)
                    .with_question(&section_id, &question_id)
                    .with_step(index),
            );
        }
    }

    fn persist(&self) {
        if self.state.stage == Stage::Completed {
            return;
        }
        let draft = PersistedDraft {
            session_id: self.session_id.clone(),
            state: self.state.clone(),
        };
        if let Err(e) = self.drafts.save(&draft) {
            tracing::warn!(error = %e, "Failed to save survey draft");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::coach::CoachingFacade;
    use crate::error::TelemetryError;
    use crate::responses::ResponseService;
    use crate::schema::{NO_CRM, crm_pain_points};
    use crate::survey::validation::{CONFIRM_SKIP_MESSAGE, NUMBER_MESSAGE};
    use crate::telemetry::TelemetrySink;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<TelemetryEvent>>);

    #[async_trait]
    impl TelemetrySink for Recorder {
        async fn record(&self, events: Vec<TelemetryEvent>) -> Result<(), TelemetryError> {
            self.0.lock().unwrap().extend(events);
            Ok(())
        }
    }

    fn session() -> (SurveySession, Arc<ResponseService>, Arc<MemoryDraftStore>) {
        let responses = Arc::new(ResponseService::in_memory());
        let drafts = Arc::new(MemoryDraftStore::new());
        let session = SurveySession::new(
            Arc::new(crm_pain_points()),
            Arc::new(CoachingFacade::heuristic_only()),
            responses.clone(),
        )
        .with_drafts(drafts.clone());
        (session, responses, drafts)
    }

    fn current_id(session: &SurveySession) -> Option<String> {
        session
            .state()
            .current_question(session.schema())
            .map(|q| q.id.clone())
    }

    async fn next(session: &mut SurveySession) -> NextOutcome {
        let token = session.step_token();
        session.next(token).await
    }

    fn jump_to(session: &mut SurveySession, question_id: &str) {
        let schema = session.schema();
        let section = schema.section_of(question_id).unwrap();
        let question = schema.sections[section]
            .questions()
            .iter()
            .position(|q| q.id == question_id)
            .unwrap();
        session.state.stage = Stage::Section(Cursor {
            question,
            ..Cursor::start_of(section)
        });
    }

    fn ada() -> Respondent {
        Respondent {
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            company: String::new(),
        }
    }

    #[tokio::test]
    async fn stale_token_is_ignored() {
        let (mut s, _, _) = session();
        s.start();
        s.answer("nps", Some(8.0.into()));
        let token = s.step_token();
        assert!(matches!(s.next(token).await, NextOutcome::Moved { .. }));
        assert!(matches!(s.next(token).await, NextOutcome::Ignored));
        assert_eq!(current_id(&s).as_deref(), Some("current_crm"));
    }

    #[tokio::test]
    async fn number_question_blocks_until_valid() {
        let (mut s, _, _) = session();
        s.start();
        for (id, value) in [
            ("nps", AnswerValue::from(7.0)),
            ("current_crm", "hs".into()),
            ("primary_role", "marketing".into()),
            ("seniority", "daily_user".into()),
            ("licenses_count", "1_5".into()),
        ] {
            s.answer(id, Some(value));
            assert!(matches!(next(&mut s).await, NextOutcome::Moved { .. }), "{id}");
        }
        assert_eq!(current_id(&s).as_deref(), Some("active_users"));

        s.answer("active_users", Some("lots".into()));
        match next(&mut s).await {
            NextOutcome::Blocked { messages } => assert_eq!(messages, vec![NUMBER_MESSAGE]),
            other => panic!("expected block, got {other:?}"),
        }
        assert_eq!(s.state().messages_for("active_users"), [NUMBER_MESSAGE]);

        s.answer("active_users", Some("12".into()));
        assert!(s.state().messages_for("active_users").is_empty());
        assert!(matches!(next(&mut s).await, NextOutcome::Moved { .. }));
    }

    #[tokio::test]
    async fn skip_synonym_takes_two_nexts() {
        let (mut s, _, _) = session();
        s.start();
        jump_to(&mut s, "top_metrics");
        assert_eq!(current_id(&s).as_deref(), Some("top_metrics"));

        s.answer("top_metrics", Some("n/a".into()));
        match next(&mut s).await {
            NextOutcome::Blocked { messages } => assert_eq!(messages, vec![CONFIRM_SKIP_MESSAGE]),
            other => panic!("expected block, got {other:?}"),
        }
        match next(&mut s).await {
            NextOutcome::Moved { ack } => assert_eq!(ack.as_deref(), Some(SKIP_ACK)),
            other => panic!("expected move, got {other:?}"),
        }
        assert_eq!(current_id(&s).as_deref(), Some("start_of_day"));
    }

    #[tokio::test]
    async fn explicit_skip_advances_open_text_only() {
        let (mut s, _, _) = session();
        s.start();
        let token = s.step_token();
        // nps is a scale question.
        assert!(matches!(s.skip_current(token).await, NextOutcome::Ignored));

        jump_to(&mut s, "top_metrics");
        let token = s.step_token();
        assert!(matches!(s.skip_current(token).await, NextOutcome::Moved { .. }));
        assert_eq!(current_id(&s).as_deref(), Some("start_of_day"));
    }

    #[tokio::test]
    async fn no_crm_hides_questions_both_ways() {
        let (mut s, _, _) = session();
        s.start();
        s.answer("nps", Some(5.0.into()));
        next(&mut s).await;
        s.answer("current_crm", Some(NO_CRM.into()));
        s.answer("primary_role", Some("marketing".into()));

        let mut seen = Vec::new();
        while s.state().cursor().is_some_and(|c| c.section == 0) {
            let id = current_id(&s).unwrap();
            seen.push(id.clone());
            match id.as_str() {
                "seniority" => s.answer(&id, Some("daily_user".into())),
                "active_users" => s.answer(&id, Some("3".into())),
                _ => {}
            }
            assert!(matches!(next(&mut s).await, NextOutcome::Moved { .. }), "{id}");
        }
        assert_eq!(seen, ["current_crm", "primary_role", "seniority", "active_users"]);
        assert_eq!(current_id(&s).as_deref(), Some("top_metrics"));

        s.back();
        assert_eq!(current_id(&s).as_deref(), Some("active_users"));
        s.back();
        assert_eq!(current_id(&s).as_deref(), Some("seniority"));
    }

    #[tokio::test]
    async fn back_from_first_question_returns_to_intro() {
        let (mut s, _, _) = session();
        s.start();
        s.back();
        assert_eq!(s.state().stage, Stage::Intro);
        assert_eq!(s.progress(), 0);
    }

    #[tokio::test]
    async fn submit_from_last_step_completes_and_clears_draft() {
        let (mut s, responses, drafts) = session();
        s.set_respondent(ada());
        s.start();
        s.answer("nps", Some(8.0.into()));
        jump_to(&mut s, "followup_consent");
        s.answer("followup_consent", Some("no".into()));
        assert!(drafts.load().unwrap().is_some());

        match next(&mut s).await {
            NextOutcome::Submitted(receipt) => {
                assert_eq!(receipt.saved.name, "Ada");
                assert_eq!(receipt.saved.answers["nps"], serde_json::json!(8.0));
            }
            other => panic!("expected submission, got {other:?}"),
        }
        assert_eq!(s.state().stage, Stage::Completed);
        assert_eq!(s.progress(), 100);
        assert!(drafts.load().unwrap().is_none());
        assert_eq!(responses.len().await, 1);
    }

    #[tokio::test]
    async fn submit_without_identity_stays_in_place() {
        let (mut s, responses, _) = session();
        s.start();
        let last = s.schema().sections.len() - 1;
        let cursor = Cursor {
            question: 1,
            ..Cursor::start_of(last)
        };
        s.state.stage = Stage::Section(cursor);
        s.answer("followup_consent", Some("no".into()));

        assert!(matches!(
            next(&mut s).await,
            NextOutcome::SubmitFailed(SubmitError::MissingIdentity)
        ));
        assert_eq!(s.state().stage, Stage::Section(cursor));
        assert!(responses.is_empty().await);
    }

    #[tokio::test]
    async fn restore_resumes_saved_draft() {
        let (mut s, _, drafts) = session();
        s.set_respondent(ada());
        s.start();
        s.answer("nps", Some(9.0.into()));
        next(&mut s).await;
        let id = s.session_id().to_string();

        let mut resumed = SurveySession::new(
            Arc::new(crm_pain_points()),
            Arc::new(CoachingFacade::heuristic_only()),
            Arc::new(ResponseService::in_memory()),
        )
        .with_drafts(drafts);
        assert!(resumed.restore());
        assert_eq!(resumed.session_id(), id);
        assert_eq!(current_id(&resumed).as_deref(), Some("current_crm"));
        assert_eq!(resumed.state().respondent.name, "Ada");
    }

    #[tokio::test]
    async fn telemetry_tracks_views_and_nexts() {
        let recorder = Arc::new(Recorder::default());
        let (s, _, _) = session();
        let mut s = s.with_telemetry(TelemetryDispatcher::new(recorder.clone()));
        s.set_respondent(ada());
        s.start();
        s.answer("nps", Some(8.0.into()));
        next(&mut s).await;

        s.flush_telemetry().await;
        let kinds: Vec<(EventKind, Option<String>)> = recorder
            .0
            .lock()
            .unwrap()
            .iter()
            .map(|e| (e.event, e.question_id.clone()))
            .collect();
        assert!(kinds.contains(&(EventKind::SessionStart, None)));
        assert!(kinds.contains(&(EventKind::QuestionView, Some("nps".to_string()))));
        assert!(kinds.contains(&(EventKind::QuestionNext, Some("nps".to_string()))));
        assert!(kinds.contains(&(EventKind::QuestionView, Some("current_crm".to_string()))));
    }

    #[tokio::test]
    async fn question_next_carries_dwell_time() {
        let recorder = Arc::new(Recorder::default());
        let (s, _, _) = session();
        let mut s = s.with_telemetry(TelemetryDispatcher::new(recorder.clone()));
        s.set_respondent(ada());
        s.start();
        tokio::time::sleep(std::time::Duration::from_millis(40)).await;
        s.answer("nps", Some(8.0.into()));
        next(&mut s).await;

        s.flush_telemetry().await;
        let events = recorder.0.lock().unwrap().clone();
        assert_eq!(events[0].event, EventKind::SessionStart);
        let nps_next = events
            .iter()
            .find(|e| e.event == EventKind::QuestionNext)
            .expect("question_next");
        assert!(nps_next.dwell_ms().unwrap() >= 40, "{nps_next:?}");
    }
}
