use serde::{Deserialize, Serialize};

use super::{AnswerValue, Answers};

/// Hides a set of questions while its condition holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipRule {
    pub when: SkipCondition,
    pub skip: Vec<String>,
}

impl SkipRule {
    pub fn hides(&self, question_id: &str) -> bool {
        self.skip.iter().any(|id| id == question_id)
    }
}

/// Predicate over the current answer set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SkipCondition {
    /// A single-choice answer equals the given option id, or a
    /// multi-select contains it.
    AnswerEquals {
        #[serde(rename = "questionId")]
        question_id: String,
        value: String,
    },
}

impl SkipCondition {
    pub fn matches(&self, answers: &Answers) -> bool {
        match self {
            Self::AnswerEquals { question_id, value } => match answers.get(question_id) {
                Some(AnswerValue::Text(text)) => text == value,
                Some(AnswerValue::Choices(list)) => list.iter().any(|v| v == value),
                Some(AnswerValue::Number(_)) | None => false,
            },
        }
    }
}
