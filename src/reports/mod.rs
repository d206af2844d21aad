//! Admin views over stored responses and telemetry.
//!
//! Everything here is a pure function of its inputs; the web layer fetches
//! records and step counts and renders the result as JSON or CSV.

mod analytics;
mod detail;
mod export;

use std::collections::BTreeSet;

use serde::Serialize;

use crate::responses::ResponseRecord;

pub use self::analytics::{Analytics, StepSummary, analytics, drop_pct, summarize_steps};
pub use self::detail::{AnswerLine, RatingLine, ResponseDetail, detail};
pub use self::export::{CSV_HEADER, ResponseRow, table, to_csv};

/// Themes reported by the survey summary until insights replace them.
pub const SUMMARY_THEMES: [&str; 5] = [
    "usability",
    "integrations",
    "reporting",
    "customization",
    "pricing",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateValue {
    pub id: String,
    pub value: serde_json::Value,
}

/// Every response's answer to one question.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Aggregate {
    pub question_id: String,
    pub values: Vec<AggregateValue>,
    /// Question ids answered in at least one response, for the picker.
    pub question_ids: Vec<String>,
}

/// One value per record, in record order; unanswered becomes `null`.
pub fn aggregate(records: &[ResponseRecord], question_id: &str) -> Aggregate {
    let values = records
        .iter()
        .map(|r| AggregateValue {
            id: r.id.clone(),
            value: r
                .answers
                .get(question_id)
                .cloned()
                .unwrap_or(serde_json::Value::Null),
        })
        .collect();

    let question_ids: BTreeSet<&str> = records
        .iter()
        .flat_map(|r| r.answers.keys().map(String::as_str))
        .collect();

    Aggregate {
        question_id: question_id.to_string(),
        values,
        question_ids: question_ids.into_iter().map(str::to_string).collect(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SurveySummary {
    pub count: usize,
    pub themes: Vec<String>,
    pub plan: String,
}

pub fn summary(records: &[ResponseRecord]) -> SurveySummary {
    let themes: Vec<String> = SUMMARY_THEMES.iter().map(|t| t.to_string()).collect();
    let plan = format!(
        "Battle plan to defeat the Ugly CRM: focus on {} first, then iterate.",
        themes[..3].join(", ")
    );
    SurveySummary {
        count: records.len(),
        themes,
        plan,
    }
}

/// Responses considered by the insights digest, newest first.
pub const INSIGHTS_RESPONSE_LIMIT: usize = 500;
/// Upper bound on the digest handed to a provider, in characters.
pub const INSIGHTS_DIGEST_CHARS: usize = 100_000;

/// Answers and ratings only, as compact JSON; identity never leaves.
pub fn insights_digest(records: &[ResponseRecord]) -> String {
    let payload: Vec<serde_json::Value> = records
        .iter()
        .take(INSIGHTS_RESPONSE_LIMIT)
        .map(|r| serde_json::json!({ "answers": r.answers, "ratings": r.rating_group }))
        .collect();
    let json = serde_json::Value::from(payload).to_string();
    match json.char_indices().nth(INSIGHTS_DIGEST_CHARS) {
        Some((cut, _)) => json[..cut].to_string(),
        None => json,
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::collections::BTreeMap;

    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use crate::responses::{ResponseMeta, ResponseRecord};

    pub fn record(id: &str, answers: serde_json::Value) -> ResponseRecord {
        let answers: BTreeMap<String, serde_json::Value> =
            serde_json::from_value(answers).unwrap();
        ResponseRecord {
            id: id.to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap(),
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            company: None,
            answers,
            rating_group: BTreeMap::from([("calling".to_string(), 4)]),
            ai_gists: BTreeMap::new(),
            meta: ResponseMeta::default(),
        }
    }

    pub fn pair() -> Vec<ResponseRecord> {
        vec![
            record("r2", json!({ "nps": 8, "top_metrics": "pipeline value" })),
            record("r1", json!({ "current_crm": "hs" })),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn aggregate_keeps_record_order_and_nulls() {
        let view = aggregate(&fixtures::pair(), "top_metrics");
        assert_eq!(
            view.values,
            vec![
                AggregateValue {
                    id: "r2".into(),
                    value: json!("pipeline value")
                },
                AggregateValue {
                    id: "r1".into(),
                    value: serde_json::Value::Null
                },
            ]
        );
        assert_eq!(view.question_ids, ["current_crm", "nps", "top_metrics"]);
    }

    #[test]
    fn digest_omits_identity() {
        let digest = insights_digest(&fixtures::pair());
        assert!(digest.starts_with(r#"[{"answers":{"nps":8"#));
        assert!(!digest.contains("ada@example.com"));
        assert!(digest.contains(r#""ratings":{"calling":4}"#));
    }

    #[test]
    fn summary_counts_and_plans() {
        let s = summary(&fixtures::pair());
        assert_eq!(s.count, 2);
        assert_eq!(s.themes.len(), 5);
        assert_eq!(
            s.plan,
            "Battle plan to defeat the Ugly CRM: focus on usability, integrations, reporting first, then iterate."
        );
    }
}
