//! Survey schema: ordered sections of typed questions or rating groups.
//!
//! The schema is immutable once loaded. Question ids (and rating item ids)
//! are the keys of the answer and rating maps and of the persisted JSON, so
//! they must be globally unique; [`SurveySchema::validate`] enforces that.

mod builtin;
mod rules;

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

pub use self::builtin::{NO_CRM, crm_pain_points};
pub use self::rules::{SkipCondition, SkipRule};

use crate::error::SchemaError;

/// Rating-group sections are shown this many items per page.
pub const RATING_PAGE_SIZE: usize = 5;

/// Answer map keyed by question id.
pub type Answers = BTreeMap<String, AnswerValue>;

/// A single stored answer.
///
/// Single choices are stored as the option id, multi-selects as a list of
/// option ids, scales as a number. Free text (and the raw input of numeric
/// questions) is stored as text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Number(f64),
    Text(String),
    Choices(Vec<String>),
}

impl AnswerValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Choices(_) => None,
        }
    }

    pub fn as_choices(&self) -> Option<&[String]> {
        match self {
            Self::Choices(list) => Some(list),
            _ => None,
        }
    }

    /// Empty text, an empty selection, or a non-finite number.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Number(n) => !n.is_finite(),
            Self::Text(s) => s.trim().is_empty(),
            Self::Choices(list) => list.is_empty(),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Self::Text(s) => serde_json::Value::String(s.clone()),
            Self::Choices(list) => serde_json::Value::from(list.clone()),
        }
    }
}

impl From<&str> for AnswerValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for AnswerValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for AnswerValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<Vec<String>> for AnswerValue {
    fn from(value: Vec<String>) -> Self {
        Self::Choices(value)
    }
}

/// Question input type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    Text,
    LongText,
    /// Free input that must parse as a finite, non-negative number.
    Number,
    MultipleChoice,
    MultiSelect,
    Scale,
}

impl QuestionKind {
    /// Open-text questions are the only ones that go through coaching.
    pub fn is_open_text(self) -> bool {
        matches!(self, Self::Text | Self::LongText)
    }

    pub fn has_options(self) -> bool {
        matches!(self, Self::MultipleChoice | Self::MultiSelect)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceOption {
    pub id: String,
    pub label: String,
}

impl ChoiceOption {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }

    /// Options labelled "Other (specify)" collect companion free text.
    pub fn is_other(&self) -> bool {
        self.id == "other"
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    pub label: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<ChoiceOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_min: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_max: Option<i64>,
}

impl Question {
    pub fn new(id: impl Into<String>, kind: QuestionKind, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            label: label.into(),
            required: false,
            explanation: None,
            hint: None,
            options: Vec::new(),
            scale_min: None,
            scale_max: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn explanation(mut self, text: impl Into<String>) -> Self {
        self.explanation = Some(text.into());
        self
    }

    pub fn hint(mut self, text: impl Into<String>) -> Self {
        self.hint = Some(text.into());
        self
    }

    pub fn options(mut self, options: &[(&str, &str)]) -> Self {
        self.options = options
            .iter()
            .map(|(id, label)| ChoiceOption::new(*id, *label))
            .collect();
        self
    }

    pub fn scale(mut self, min: i64, max: i64) -> Self {
        self.scale_min = Some(min);
        self.scale_max = Some(max);
        self
    }

    /// Inclusive scale range, defaulting to 0..=10.
    pub fn scale_range(&self) -> (i64, i64) {
        (self.scale_min.unwrap_or(0), self.scale_max.unwrap_or(10))
    }

    pub fn option_label(&self, option_id: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|o| o.id == option_id)
            .map(|o| o.label.as_str())
    }

    /// Key under which "Other (specify)" free text is stored.
    pub fn other_key(&self) -> String {
        format!("{}_other", self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingItem {
    pub id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// How a question section is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionLayout {
    /// One question per step.
    #[default]
    Sequential,
    /// Every question on a single screen, advanced as one step.
    Table,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SectionBody {
    Questions {
        questions: Vec<Question>,
        #[serde(default)]
        layout: SectionLayout,
    },
    RatingGroup {
        #[serde(rename = "scaleMin")]
        scale_min: u8,
        #[serde(rename = "scaleMax")]
        scale_max: u8,
        items: Vec<RatingItem>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: String,
    pub title: String,
    pub objective: String,
    pub victory_copy: String,
    #[serde(flatten)]
    pub body: SectionBody,
}

impl Section {
    /// Questions of a question section; empty for rating groups.
    pub fn questions(&self) -> &[Question] {
        match &self.body {
            SectionBody::Questions { questions, .. } => questions,
            SectionBody::RatingGroup { .. } => &[],
        }
    }

    pub fn rating_items(&self) -> &[RatingItem] {
        match &self.body {
            SectionBody::RatingGroup { items, .. } => items,
            SectionBody::Questions { .. } => &[],
        }
    }

    pub fn is_rating_group(&self) -> bool {
        matches!(self.body, SectionBody::RatingGroup { .. })
    }

    pub fn is_table(&self) -> bool {
        matches!(
            self.body,
            SectionBody::Questions {
                layout: SectionLayout::Table,
                ..
            }
        )
    }

    /// Number of prompts counted by the progress indicator.
    pub fn prompt_count(&self) -> usize {
        match &self.body {
            SectionBody::Questions { questions, .. } => questions.len(),
            SectionBody::RatingGroup { items, .. } => items.len(),
        }
    }

    pub fn rating_page_count(&self) -> usize {
        self.rating_items().len().div_ceil(RATING_PAGE_SIZE)
    }

    /// Items shown on the given rating page.
    pub fn rating_page(&self, page: usize) -> &[RatingItem] {
        let items = self.rating_items();
        let start = (page * RATING_PAGE_SIZE).min(items.len());
        let end = (start + RATING_PAGE_SIZE).min(items.len());
        &items[start..end]
    }

    pub fn rating_scale(&self) -> Option<(u8, u8)> {
        match self.body {
            SectionBody::RatingGroup {
                scale_min,
                scale_max,
                ..
            } => Some((scale_min, scale_max)),
            SectionBody::Questions { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyMetadata {
    pub id: String,
    pub title: String,
    pub version: String,
    pub source_link: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Email,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RespondentField {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveySchema {
    pub metadata: SurveyMetadata,
    pub respondent_fields: Vec<RespondentField>,
    pub sections: Vec<Section>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skip_rules: Vec<SkipRule>,
}

impl SurveySchema {
    /// Check id uniqueness and section shape.
    pub fn validate(&self) -> Result<(), SchemaError> {
        let mut seen = HashSet::new();
        for section in &self.sections {
            if section.prompt_count() == 0 {
                return Err(SchemaError::EmptySection {
                    section: section.id.clone(),
                });
            }
            for question in section.questions() {
                if !seen.insert(question.id.as_str()) {
                    return Err(SchemaError::DuplicateQuestion(question.id.clone()));
                }
                if question.kind.has_options() && question.options.is_empty() {
                    return Err(SchemaError::MissingOptions {
                        question: question.id.clone(),
                    });
                }
            }
            for item in section.rating_items() {
                if !seen.insert(item.id.as_str()) {
                    return Err(SchemaError::DuplicateQuestion(item.id.clone()));
                }
            }
        }
        Ok(())
    }

    pub fn section(&self, index: usize) -> Option<&Section> {
        self.sections.get(index)
    }

    pub fn question_at(&self, section: usize, question: usize) -> Option<&Question> {
        self.sections.get(section)?.questions().get(question)
    }

    pub fn question(&self, id: &str) -> Option<&Question> {
        self.sections
            .iter()
            .flat_map(|s| s.questions())
            .find(|q| q.id == id)
    }

    /// Section index of the question with the given id.
    pub fn section_of(&self, question_id: &str) -> Option<usize> {
        self.sections
            .iter()
            .position(|s| s.questions().iter().any(|q| q.id == question_id))
    }

    pub fn rating_item(&self, id: &str) -> Option<&RatingItem> {
        self.sections
            .iter()
            .flat_map(|s| s.rating_items())
            .find(|i| i.id == id)
    }

    /// Questions plus rating items across every section.
    pub fn total_prompts(&self) -> usize {
        self.sections.iter().map(Section::prompt_count).sum()
    }

    /// Whether any skip rule hides this question under the given answers.
    pub fn should_skip(&self, question_id: &str, answers: &Answers) -> bool {
        self.skip_rules
            .iter()
            .any(|rule| rule.hides(question_id) && rule.when.matches(answers))
    }

    /// Every question id in schema order.
    pub fn question_ids(&self) -> impl Iterator<Item = &str> {
        self.sections
            .iter()
            .flat_map(|s| s.questions())
            .map(|q| q.id.as_str())
    }
}
