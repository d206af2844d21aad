//! Step drop-off derived from telemetry counts.

use serde::Serialize;

use crate::schema::SurveySchema;
use crate::telemetry::StepCounts;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepSummary {
    pub question_id: String,
    pub views: u64,
    pub nexts: u64,
    pub drop_pct: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_ms: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Analytics {
    pub sessions: u64,
    pub steps: Vec<StepSummary>,
}

/// Share of views that never advanced, in percent. Zero without views.
pub fn drop_pct(views: u64, nexts: u64) -> f64 {
    if views == 0 {
        return 0.0;
    }
    (views as f64 - nexts as f64) / views as f64 * 100.0
}

pub fn summarize_steps(counts: Vec<StepCounts>) -> Vec<StepSummary> {
    counts
        .into_iter()
        .map(|c| StepSummary {
            drop_pct: drop_pct(c.views, c.nexts),
            question_id: c.question_id,
            views: c.views,
            nexts: c.nexts,
            avg_ms: c.avg_ms,
        })
        .collect()
}

/// Steps in the order a respondent meets them; ids the schema no longer
/// has go last.
pub fn analytics(schema: &SurveySchema, counts: Vec<StepCounts>, sessions: u64) -> Analytics {
    let order: Vec<&str> = schema.question_ids().collect();
    let mut steps = summarize_steps(counts);
    steps.sort_by_key(|s| {
        (
            order
                .iter()
                .position(|id| *id == s.question_id)
                .unwrap_or(usize::MAX),
            s.question_id.clone(),
        )
    });
    Analytics { sessions, steps }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::crm_pain_points;
    use pretty_assertions::assert_eq;

    fn counts(id: &str, views: u64, nexts: u64) -> StepCounts {
        StepCounts {
            question_id: id.to_string(),
            views,
            nexts,
            avg_ms: None,
        }
    }

    #[test]
    fn ten_views_seven_nexts_drop_thirty_percent() {
        let steps = summarize_steps(vec![counts("nps", 10, 7)]);
        assert_eq!(steps[0].drop_pct, 30.0);
    }

    #[test]
    fn no_views_means_no_drop() {
        assert_eq!(drop_pct(0, 0), 0.0);
        assert_eq!(drop_pct(0, 3), 0.0);
    }

    #[test]
    fn analytics_follows_schema_order() {
        let view = analytics(
            &crm_pain_points(),
            vec![
                counts("zz_retired", 1, 1),
                counts("top_metrics", 4, 2),
                counts("nps", 5, 5),
            ],
            3,
        );
        let ids: Vec<&str> = view.steps.iter().map(|s| s.question_id.as_str()).collect();
        assert_eq!(ids, ["nps", "top_metrics", "zz_retired"]);
        assert_eq!(view.sessions, 3);
        assert_eq!(view.steps[1].drop_pct, 50.0);
    }
}
