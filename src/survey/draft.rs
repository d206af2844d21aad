//! Serializable respondent draft and the reducer that drives it.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::SubmitError;
use crate::schema::{AnswerValue, Answers, Question, SurveySchema};
use crate::survey::navigation::{
    Backward, Cursor, Forward, Stage, forward_target, is_skippable, skip_hidden, structural_back,
};

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^.+@.+$").unwrap());

/// Identity fields collected on the intro screen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Respondent {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub company: String,
}

impl Respondent {
    /// Name present and email shaped like `something@something`.
    pub fn check(&self) -> Result<(), SubmitError> {
        check_identity(&self.name, &self.email)
    }
}

/// Submission-time identity check shared by the wizard and the gateway.
pub fn check_identity(name: &str, email: &str) -> Result<(), SubmitError> {
    if name.trim().is_empty() || email.trim().is_empty() {
        return Err(SubmitError::MissingIdentity);
    }
    if !EMAIL_PATTERN.is_match(email.trim()) {
        return Err(SubmitError::InvalidEmail);
    }
    Ok(())
}

/// Two-strike state of a single question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnState {
    #[default]
    Unwarned,
    /// The respondent has seen one warning; the next Next proceeds.
    Warned,
}

/// Everything needed to restore a respondent's place in the survey.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftState {
    pub respondent: Respondent,
    #[serde(default)]
    pub answers: Answers,
    #[serde(default)]
    pub ratings: BTreeMap<String, u8>,
    #[serde(default)]
    pub stage: Stage,
    #[serde(default)]
    pub history: Vec<Cursor>,
    #[serde(default)]
    pub warnings: BTreeMap<String, WarnState>,
    #[serde(default)]
    pub messages: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub ack: Option<String>,
}

impl DraftState {
    pub fn cursor(&self) -> Option<Cursor> {
        match self.stage {
            Stage::Section(cursor) => Some(cursor),
            Stage::Intro | Stage::Completed => None,
        }
    }

    pub fn warn_state(&self, question_id: &str) -> WarnState {
        self.warnings.get(question_id).copied().unwrap_or_default()
    }

    /// The active question of a sequential section.
    pub fn current_question<'s>(&self, schema: &'s SurveySchema) -> Option<&'s Question> {
        let cursor = self.cursor()?;
        let section = schema.section(cursor.section)?;
        if section.is_table() {
            return None;
        }
        section.questions().get(cursor.question)
    }

    pub fn messages_for(&self, question_id: &str) -> &[String] {
        self.messages
            .get(question_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Answers as plain JSON, the shape stored with a submission.
    pub fn answers_json(&self) -> BTreeMap<String, serde_json::Value> {
        self.answers
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect()
    }
}

/// Input to [`reduce`].
#[derive(Debug, Clone, PartialEq)]
pub enum DraftEvent {
    SetRespondent(Respondent),
    /// Leave the intro screen.
    Start,
    /// Set (or clear with `None`) an answer.
    Answer {
        question_id: String,
        value: Option<AnswerValue>,
    },
    Rate {
        item_id: String,
        value: u8,
    },
    Warn {
        question_id: String,
    },
    ShowMessages {
        question_id: String,
        messages: Vec<String>,
    },
    Acknowledge(Option<String>),
    /// Structural advance; validation has already happened.
    Forward,
    Back,
    Complete,
    Reset,
}

/// Apply one event. Pure: no I/O, no clocks.
pub fn reduce(schema: &SurveySchema, mut state: DraftState, event: DraftEvent) -> DraftState {
    match event {
        DraftEvent::SetRespondent(respondent) => {
            state.respondent = respondent;
        }
        DraftEvent::Start => {
            if state.stage == Stage::Intro {
                state.stage = enter(schema, Cursor::default(), &state.answers);
            }
        }
        DraftEvent::Answer { question_id, value } => {
            match value {
                Some(value) => {
                    state.answers.insert(question_id.clone(), value);
                }
                None => {
                    state.answers.remove(&question_id);
                }
            }
            state.messages.remove(&question_id);
            if let Stage::Section(cursor) = state.stage {
                state.stage = Stage::Section(skip_hidden(schema, cursor, &state.answers));
            }
        }
        DraftEvent::Rate { item_id, value } => {
            let in_scale = schema
                .sections
                .iter()
                .find(|s| s.rating_items().iter().any(|i| i.id == item_id))
                .and_then(|s| s.rating_scale())
                .is_some_and(|(min, max)| (min..=max).contains(&value));
            if in_scale {
                state.ratings.insert(item_id, value);
            }
        }
        DraftEvent::Warn { question_id } => {
            state.warnings.insert(question_id, WarnState::Warned);
        }
        DraftEvent::ShowMessages {
            question_id,
            messages,
        } => {
            if messages.is_empty() {
                state.messages.remove(&question_id);
            } else {
                state.messages.insert(question_id, messages);
            }
        }
        DraftEvent::Acknowledge(ack) => {
            state.ack = ack;
        }
        DraftEvent::Forward => match state.stage {
            Stage::Intro => {
                state.stage = enter(schema, Cursor::default(), &state.answers);
            }
            Stage::Section(cursor) => {
                if let Forward::To(next) = forward_target(schema, cursor) {
                    state.history.push(cursor);
                    state.stage = Stage::Section(skip_hidden(schema, next, &state.answers));
                }
            }
            Stage::Completed => {}
        },
        DraftEvent::Back => {
            if let Stage::Section(cursor) = state.stage {
                state.stage = back(schema, &mut state.history, cursor, &state.answers);
            }
        }
        DraftEvent::Complete => {
            state.stage = Stage::Completed;
            state.history.clear();
            state.messages.clear();
        }
        DraftEvent::Reset => {
            state = DraftState::default();
        }
    }
    state
}

fn enter(schema: &SurveySchema, cursor: Cursor, answers: &Answers) -> Stage {
    if schema.sections.is_empty() {
        return Stage::Intro;
    }
    Stage::Section(skip_hidden(schema, cursor, answers))
}

fn back(
    schema: &SurveySchema,
    history: &mut Vec<Cursor>,
    cursor: Cursor,
    answers: &Answers,
) -> Stage {
    while let Some(previous) = history.pop() {
        if !is_skippable(schema, previous, answers) {
            return Stage::Section(previous);
        }
    }
    match structural_back(schema, cursor, answers) {
        Backward::To(previous) => Stage::Section(previous),
        Backward::Intro => Stage::Intro,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{NO_CRM, crm_pain_points};
    use pretty_assertions::assert_eq;

    fn apply(schema: &SurveySchema, state: DraftState, events: Vec<DraftEvent>) -> DraftState {
        events
            .into_iter()
            .fold(state, |state, event| reduce(schema, state, event))
    }

    fn answer(id: &str, value: impl Into<AnswerValue>) -> DraftEvent {
        DraftEvent::Answer {
            question_id: id.to_string(),
            value: Some(value.into()),
        }
    }

    #[test]
    fn identity_check_matches_submission_rules() {
        assert!(check_identity("Ada", "ada@example.com").is_ok());
        assert!(matches!(
            check_identity(" ", "ada@example.com"),
            Err(SubmitError::MissingIdentity)
        ));
        assert!(matches!(
            check_identity("Ada", "ada.example.com"),
            Err(SubmitError::InvalidEmail)
        ));
    }

    #[test]
    fn start_enters_first_question() {
        let schema = crm_pain_points();
        let state = reduce(&schema, DraftState::default(), DraftEvent::Start);
        assert_eq!(state.stage, Stage::Section(Cursor::default()));
        assert!(state.history.is_empty());
    }

    #[test]
    fn back_from_first_question_returns_to_intro() {
        let schema = crm_pain_points();
        let state = apply(
            &schema,
            DraftState::default(),
            vec![DraftEvent::Start, DraftEvent::Back],
        );
        assert_eq!(state.stage, Stage::Intro);
        let state = reduce(&schema, state, DraftEvent::Back);
        assert_eq!(state.stage, Stage::Intro);
    }

    #[test]
    fn forward_then_back_restores_cursor() {
        let schema = crm_pain_points();
        let state = apply(
            &schema,
            DraftState::default(),
            vec![DraftEvent::Start, answer("nps", 7.0), DraftEvent::Forward],
        );
        assert_eq!(state.cursor().map(|c| c.question), Some(1));
        assert_eq!(state.history, vec![Cursor::default()]);

        let state = reduce(&schema, state, DraftEvent::Back);
        assert_eq!(state.stage, Stage::Section(Cursor::default()));
        assert!(state.history.is_empty());
    }

    #[test]
    fn answering_no_crm_skips_forward_and_back() {
        let schema = crm_pain_points();
        let state = apply(
            &schema,
            DraftState::default(),
            vec![
                DraftEvent::Start,
                answer("nps", 4.0),
                DraftEvent::Forward,
                answer("current_crm", NO_CRM),
            ],
        );
        // Back pops nps, which is now hidden, and falls through to intro.
        let backed = reduce(&schema, state.clone(), DraftEvent::Back);
        assert_eq!(backed.stage, Stage::Intro);

        // Forward through the section never rests on licenses_count.
        let mut state = apply(
            &schema,
            state,
            vec![
                answer("primary_role", "marketing"),
                DraftEvent::Forward,
                DraftEvent::Forward,
                answer("seniority", "team_lead"),
                DraftEvent::Forward,
            ],
        );
        assert_eq!(
            state.current_question(&schema).map(|q| q.id.as_str()),
            Some("active_users")
        );
        state = reduce(&schema, state, DraftEvent::Forward);
        assert_eq!(
            state.current_question(&schema).map(|q| q.id.as_str()),
            Some("top_metrics")
        );
    }

    #[test]
    fn rate_ignores_out_of_scale_values() {
        let schema = crm_pain_points();
        let state = apply(
            &schema,
            DraftState::default(),
            vec![
                DraftEvent::Rate {
                    item_id: "mobile_app".into(),
                    value: 9,
                },
                DraftEvent::Rate {
                    item_id: "calling".into(),
                    value: 4,
                },
            ],
        );
        assert_eq!(state.ratings.get("mobile_app"), None);
        assert_eq!(state.ratings.get("calling"), Some(&4));
    }

    #[test]
    fn forward_at_last_step_is_noop() {
        let schema = crm_pain_points();
        let last = schema.sections.len() - 1;
        let state = DraftState {
            stage: Stage::Section(Cursor {
                question: 1,
                ..Cursor::start_of(last)
            }),
            ..DraftState::default()
        };
        let next = reduce(&schema, state.clone(), DraftEvent::Forward);
        assert_eq!(next, state);
    }

    #[test]
    fn draft_round_trips_through_json() {
        let schema = crm_pain_points();
        let state = apply(
            &schema,
            DraftState::default(),
            vec![
                DraftEvent::SetRespondent(Respondent {
                    name: "Ada".into(),
                    email: "ada@example.com".into(),
                    company: String::new(),
                }),
                DraftEvent::Start,
                answer("nps", 9.0),
                DraftEvent::Warn {
                    question_id: "top_metrics".into(),
                },
                DraftEvent::Forward,
            ],
        );
        let json = serde_json::to_string(&state).unwrap();
        let restored: DraftState = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, state);
        assert_eq!(restored.warn_state("top_metrics"), WarnState::Warned);
        assert_eq!(restored.warn_state("crm_love"), WarnState::Unwarned);
    }
}
