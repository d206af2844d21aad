//! Single response resolved against the schema.

use serde::Serialize;

use crate::responses::ResponseRecord;
use crate::schema::{Question, SurveySchema};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerLine {
    pub question_id: String,
    pub label: String,
    /// Human-readable value: option labels instead of ids.
    pub display: String,
    pub raw: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gist: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingLine {
    pub item_id: String,
    pub label: String,
    pub value: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseDetail {
    pub id: String,
    pub created_at: String,
    pub name: String,
    pub email: String,
    pub company: Option<String>,
    pub answers: Vec<AnswerLine>,
    pub ratings: Vec<RatingLine>,
}

/// Answers follow schema order; keys the schema does not know (and
/// "other" companions of unknown questions) trail in key order.
pub fn detail(schema: &SurveySchema, record: &ResponseRecord) -> ResponseDetail {
    let mut answers = Vec::new();
    let mut placed = std::collections::BTreeSet::new();

    for question in schema.sections.iter().flat_map(|s| s.questions()) {
        if let Some(raw) = record.answers.get(&question.id) {
            placed.insert(question.id.clone());
            answers.push(line(record, &question.id, &question.label, raw, Some(question)));
        }
        let other = question.other_key();
        if let Some(raw) = record.answers.get(&other) {
            placed.insert(other.clone());
            let label = format!("{} (other)", question.label);
            answers.push(line(record, &other, &label, raw, None));
        }
    }
    for (key, raw) in &record.answers {
        if !placed.contains(key) {
            answers.push(line(record, key, key, raw, None));
        }
    }

    let ratings = record
        .rating_group
        .iter()
        .map(|(item_id, &value)| RatingLine {
            item_id: item_id.clone(),
            label: schema
                .rating_item(item_id)
                .map_or_else(|| item_id.clone(), |i| i.label.clone()),
            value,
        })
        .collect();

    ResponseDetail {
        id: record.id.clone(),
        created_at: record
            .created_at
            .to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        name: record.name.clone(),
        email: record.email.clone(),
        company: record.company.clone(),
        answers,
        ratings,
    }
}

fn line(
    record: &ResponseRecord,
    key: &str,
    label: &str,
    raw: &serde_json::Value,
    question: Option<&Question>,
) -> AnswerLine {
    AnswerLine {
        question_id: key.to_string(),
        label: label.to_string(),
        display: display(raw, question),
        raw: raw.clone(),
        gist: record.ai_gists.get(key).cloned(),
    }
}

fn display(raw: &serde_json::Value, question: Option<&Question>) -> String {
    let label_of = |id: &str| {
        question
            .and_then(|q| q.option_label(id))
            .unwrap_or(id)
            .to_string()
    };
    match raw {
        serde_json::Value::String(s) => label_of(s),
        serde_json::Value::Array(items) => items
            .iter()
            .map(|v| match v {
                serde_json::Value::String(s) => label_of(s),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(", "),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reports::fixtures::record;
    use crate::schema::crm_pain_points;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn resolves_option_and_rating_labels_in_schema_order() {
        let schema = crm_pain_points();
        let rec = record(
            "r1",
            json!({
                "manual_tasks": ["logging_calls", "other"],
                "manual_tasks_other": "chasing invoices",
                "current_crm": "hs",
                "nps": 7,
                "legacy_field": "kept",
            }),
        );
        let view = detail(&schema, &rec);

        let ids: Vec<&str> = view.answers.iter().map(|a| a.question_id.as_str()).collect();
        assert_eq!(
            ids,
            ["nps", "current_crm", "manual_tasks", "manual_tasks_other", "legacy_field"]
        );
        assert_eq!(view.answers[1].display, "HubSpot");
        assert_eq!(
            view.answers[2].display,
            "Logging calls or meeting notes, Other (specify)"
        );
        assert_eq!(view.answers[0].display, "7");
        assert_eq!(view.ratings[0].label, "Calling / call recording");
        assert_eq!(view.ratings[0].value, 4);
    }
}
