//! Per-question answer checks run on Next.
//!
//! Structural types are checked locally. Open text goes through the coach,
//! with a two-strike rule: the first soft objection blocks and marks the
//! question warned, the second Next on a warned question passes.

use crate::coach::{Coach, ValidateRequest, heuristic};
use crate::schema::{AnswerValue, Question, QuestionKind};
use crate::survey::draft::WarnState;

pub const NUMBER_MESSAGE: &str = "Enter a valid non-negative number.";
pub const CHOOSE_ONE_MESSAGE: &str = "Please choose at least one.";
pub const SELECT_MESSAGE: &str = "Please select an option.";
pub const REQUIRED_TEXT_MESSAGE: &str = "Please add a short answer, or type \"skip\".";
pub const CONFIRM_SKIP_MESSAGE: &str =
    "If you prefer to skip this question, press Next again to confirm.";
pub const COACH_SKIP_MESSAGE: &str =
    "If you prefer to skip this question, type \"skip\" or press Next again to confirm.";
pub const SKIP_ACK: &str = "No problem — we can skip this one.";

/// Outcome of validating the current question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Advance, showing `ack`.
    Pass { ack: String },
    /// Stay on the question and show `messages`. `warn` marks the first
    /// strike of a two-strike check.
    Block { messages: Vec<String>, warn: bool },
}

impl Verdict {
    fn block(message: impl Into<String>) -> Self {
        Self::Block {
            messages: vec![message.into()],
            warn: false,
        }
    }

    fn strike(messages: Vec<String>) -> Self {
        Self::Block {
            messages,
            warn: true,
        }
    }

    fn skip() -> Self {
        Self::Pass {
            ack: SKIP_ACK.to_string(),
        }
    }

    pub fn passed(&self) -> bool {
        matches!(self, Self::Pass { .. })
    }
}

/// Validate `answer` for `question`.
///
/// `role` is the respondent's primary role, passed to the coach as context.
pub async fn evaluate(
    question: &Question,
    answer: Option<&AnswerValue>,
    warn: WarnState,
    role: Option<&str>,
    coach: &dyn Coach,
) -> Verdict {
    let answer = answer.filter(|a| !a.is_empty());
    match question.kind {
        QuestionKind::Number => match answer {
            None if !question.required => pass(question, None),
            None => Verdict::block(NUMBER_MESSAGE),
            Some(value) => match value.as_number() {
                Some(n) if n.is_finite() && n >= 0.0 => pass(question, Some(value)),
                _ => Verdict::block(NUMBER_MESSAGE),
            },
        },
        QuestionKind::MultiSelect => match answer {
            None if question.required => Verdict::block(CHOOSE_ONE_MESSAGE),
            _ => pass(question, answer),
        },
        QuestionKind::MultipleChoice => match answer {
            None if question.required => Verdict::block(SELECT_MESSAGE),
            _ => pass(question, answer),
        },
        QuestionKind::Scale => {
            let (min, max) = question.scale_range();
            match answer.map(AnswerValue::as_number) {
                None if !question.required => pass(question, None),
                Some(Some(n)) if n >= min as f64 && n <= max as f64 => pass(question, answer),
                _ => Verdict::block(SELECT_MESSAGE),
            }
        }
        QuestionKind::Text | QuestionKind::LongText => {
            let text = answer.and_then(AnswerValue::as_text).unwrap_or("");
            evaluate_text(question, text, warn, role, coach).await
        }
    }
}

async fn evaluate_text(
    question: &Question,
    text: &str,
    warn: WarnState,
    role: Option<&str>,
    coach: &dyn Coach,
) -> Verdict {
    if text.trim().is_empty() {
        return if question.required {
            Verdict::block(REQUIRED_TEXT_MESSAGE)
        } else {
            pass(question, None)
        };
    }

    if heuristic::is_skip_synonym(text) {
        return match warn {
            WarnState::Warned => Verdict::skip(),
            WarnState::Unwarned => Verdict::strike(vec![CONFIRM_SKIP_MESSAGE.to_string()]),
        };
    }

    let request = ValidateRequest {
        field_id: question.id.clone(),
        text: text.to_string(),
        question: Some(question.label.clone()),
        role_id: role.map(str::to_string),
    };
    let validation = match coach.validate(&request).await {
        Ok(v) => v,
        Err(err) => {
            tracing::debug!(question = %question.id, error = %err, "Coach unavailable, accepting answer");
            return pass(question, None);
        }
    };

    if validation.wants_skip {
        return match warn {
            WarnState::Warned => Verdict::skip(),
            WarnState::Unwarned => Verdict::strike(vec![
                validation
                    .friendly
                    .unwrap_or_else(|| COACH_SKIP_MESSAGE.to_string()),
            ]),
        };
    }

    if validation.wants_more || !validation.ok {
        if warn == WarnState::Warned {
            return pass(question, None);
        }
        let mut messages: Vec<String> = validation.friendly.into_iter().collect();
        match coach.followup(&question.label, text).await {
            Ok(followup) if !followup.trim().is_empty() => {
                messages.push(format!("Suggestion: {}", followup.trim()));
            }
            Ok(_) => {}
            Err(err) => {
                tracing::debug!(question = %question.id, error = %err, "Followup unavailable");
            }
        }
        return Verdict::strike(messages);
    }

    pass(question, None)
}

fn pass(question: &Question, answer: Option<&AnswerValue>) -> Verdict {
    Verdict::Pass {
        ack: acknowledge(question, answer),
    }
}

/// Short confirmation shown after a successful Next.
pub fn acknowledge(question: &Question, answer: Option<&AnswerValue>) -> String {
    match question.kind {
        QuestionKind::MultipleChoice => {
            match answer
                .and_then(AnswerValue::as_text)
                .and_then(|id| question.option_label(id))
            {
                Some(label) => format!("Got it — {label}."),
                None => "Got it.".to_string(),
            }
        }
        QuestionKind::Scale => match answer.and_then(AnswerValue::as_number) {
            Some(n) => format!("Thanks — noted {}.", display_number(n)),
            None => "Thanks.".to_string(),
        },
        QuestionKind::MultiSelect => match answer.and_then(AnswerValue::as_choices) {
            Some(list) if !list.is_empty() => format!("Thanks — {} selected.", list.len()),
            _ => "Thanks.".to_string(),
        },
        _ => "Thanks for the details.".to_string(),
    }
}

fn display_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::coach::{Descriptions, Validation};
    use crate::error::CoachError;
    use crate::schema::crm_pain_points;

    /// Coach returning a fixed validation, or failing when `None`.
    struct ScriptedCoach {
        validation: Mutex<Option<Validation>>,
        followup: Option<String>,
        validate_calls: AtomicUsize,
    }

    impl ScriptedCoach {
        fn returning(validation: Validation) -> Self {
            Self {
                validation: Mutex::new(Some(validation)),
                followup: Some("Which report matters most?".to_string()),
                validate_calls: AtomicUsize::new(0),
            }
        }

        fn down() -> Self {
            Self {
                validation: Mutex::new(None),
                followup: None,
                validate_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Coach for ScriptedCoach {
        async fn validate(&self, _request: &ValidateRequest) -> Result<Validation, CoachError> {
            self.validate_calls.fetch_add(1, Ordering::SeqCst);
            self.validation
                .lock()
                .unwrap()
                .clone()
                .ok_or(CoachError::Unavailable)
        }

        async fn followup(&self, _question: &str, _answer: &str) -> Result<String, CoachError> {
            self.followup.clone().ok_or(CoachError::Unavailable)
        }

        async fn describe_options(
            &self,
            _question_id: &str,
            _options: &[String],
        ) -> Result<Descriptions, CoachError> {
            Err(CoachError::Unavailable)
        }

        async fn examples(
            &self,
            _question_id: &str,
            _role_id: Option<&str>,
        ) -> Result<Vec<String>, CoachError> {
            Err(CoachError::Unavailable)
        }
    }

    fn question(id: &str) -> Question {
        crm_pain_points().question(id).cloned().unwrap()
    }

    #[tokio::test]
    async fn number_question_blocks_with_fixed_message() {
        let q = question("active_users");
        let coach = ScriptedCoach::down();
        for bad in [AnswerValue::from("abc"), AnswerValue::from(-3.0), AnswerValue::from(f64::NAN)] {
            let verdict = evaluate(&q, Some(&bad), WarnState::Unwarned, None, &coach).await;
            assert_eq!(verdict, Verdict::block(NUMBER_MESSAGE));
        }
        let ok = evaluate(&q, Some(&"12".into()), WarnState::Unwarned, None, &coach).await;
        assert!(ok.passed());
    }

    #[tokio::test]
    async fn skip_synonym_needs_two_nexts_without_coach() {
        let q = question("start_of_day");
        let coach = ScriptedCoach::down();
        let answer = AnswerValue::from("N/A");

        let first = evaluate(&q, Some(&answer), WarnState::Unwarned, None, &coach).await;
        assert_eq!(
            first,
            Verdict::Block {
                messages: vec![CONFIRM_SKIP_MESSAGE.to_string()],
                warn: true
            }
        );
        let second = evaluate(&q, Some(&answer), WarnState::Warned, None, &coach).await;
        assert_eq!(second, Verdict::skip());
        assert_eq!(coach.validate_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn skip_synonym_needs_two_nexts_with_coach() {
        let q = question("start_of_day");
        let coach = ScriptedCoach::returning(Validation::accepted());
        let answer = AnswerValue::from("skip");
        assert!(!evaluate(&q, Some(&answer), WarnState::Unwarned, None, &coach).await.passed());
        assert!(evaluate(&q, Some(&answer), WarnState::Warned, None, &coach).await.passed());
    }

    #[tokio::test]
    async fn coach_wanting_more_adds_suggestion_then_yields() {
        let q = question("start_of_day");
        let coach = ScriptedCoach::returning(Validation {
            ok: true,
            friendly: Some("Thank you. Which view do you open?".to_string()),
            wants_skip: false,
            wants_more: true,
        });
        let answer = AnswerValue::from("email");

        let first = evaluate(&q, Some(&answer), WarnState::Unwarned, Some("sales_rep"), &coach).await;
        assert_eq!(
            first,
            Verdict::Block {
                messages: vec![
                    "Thank you. Which view do you open?".to_string(),
                    "Suggestion: Which report matters most?".to_string(),
                ],
                warn: true,
            }
        );
        let second = evaluate(&q, Some(&answer), WarnState::Warned, None, &coach).await;
        assert_eq!(
            second,
            Verdict::Pass {
                ack: "Thanks for the details.".to_string()
            }
        );
    }

    #[tokio::test]
    async fn coach_wanting_skip_uses_default_message() {
        let q = question("start_of_day");
        let coach = ScriptedCoach::returning(Validation {
            ok: true,
            wants_skip: true,
            ..Validation::default()
        });
        let verdict = evaluate(&q, Some(&"pass on this".into()), WarnState::Unwarned, None, &coach).await;
        assert_eq!(verdict, Verdict::strike(vec![COACH_SKIP_MESSAGE.to_string()]));
    }

    #[tokio::test]
    async fn coach_failure_is_fail_open() {
        let q = question("start_of_day");
        let coach = ScriptedCoach::down();
        let verdict = evaluate(&q, Some(&"I check my inbox".into()), WarnState::Unwarned, None, &coach).await;
        assert!(verdict.passed());
    }

    #[tokio::test]
    async fn required_structural_answers() {
        let coach = ScriptedCoach::down();
        let role = question("primary_role");
        assert_eq!(
            evaluate(&role, None, WarnState::Unwarned, None, &coach).await,
            Verdict::block(SELECT_MESSAGE)
        );

        let nps = question("nps");
        let out_of_range = evaluate(&nps, Some(&11.0.into()), WarnState::Unwarned, None, &coach).await;
        assert_eq!(out_of_range, Verdict::block(SELECT_MESSAGE));
    }

    #[test]
    fn acknowledgements_follow_question_type() {
        let role = question("primary_role");
        let first_option = role.options[0].clone();
        assert_eq!(
            acknowledge(&role, Some(&first_option.id.as_str().into())),
            format!("Got it — {}.", first_option.label)
        );
        assert_eq!(acknowledge(&role, None), "Got it.");
        assert_eq!(acknowledge(&question("nps"), Some(&8.0.into())), "Thanks — noted 8.");
        assert_eq!(
            acknowledge(&question("manual_tasks"), Some(&vec!["a".to_string(), "b".to_string()].into())),
            "Thanks — 2 selected."
        );
        assert_eq!(acknowledge(&question("start_of_day"), None), "Thanks for the details.");
    }
}
