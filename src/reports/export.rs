//! Response table and CSV export.

use serde::Serialize;

use crate::responses::ResponseRecord;

pub const CSV_HEADER: &str = "id,createdAt,name,email,company,answers,ratings";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseRow {
    pub id: String,
    pub created_at: String,
    pub name: String,
    pub email: String,
    pub company: String,
    pub answers: serde_json::Value,
    pub ratings: serde_json::Value,
}

impl From<&ResponseRecord> for ResponseRow {
    fn from(record: &ResponseRecord) -> Self {
        Self {
            id: record.id.clone(),
            created_at: record
                .created_at
                .to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            name: record.name.clone(),
            email: record.email.clone(),
            company: record.company.clone().unwrap_or_default(),
            answers: serde_json::to_value(&record.answers).unwrap_or_default(),
            ratings: serde_json::to_value(&record.rating_group).unwrap_or_default(),
        }
    }
}

pub fn table(records: &[ResponseRecord]) -> Vec<ResponseRow> {
    records.iter().map(ResponseRow::from).collect()
}

/// JSON columns are quoted with inner quotes doubled; scalar columns are
/// written as-is.
pub fn to_csv(rows: &[ResponseRow]) -> String {
    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(CSV_HEADER.to_string());
    for row in rows {
        lines.push(
            [
                row.id.clone(),
                row.created_at.clone(),
                row.name.clone(),
                row.email.clone(),
                row.company.clone(),
                quote_json(&row.answers),
                quote_json(&row.ratings),
            ]
            .join(","),
        );
    }
    lines.join("\n")
}

fn quote_json(value: &serde_json::Value) -> String {
    format!("\"{}\"", value.to_string().replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reports::fixtures;
    use pretty_assertions::assert_eq;

    #[test]
    fn csv_doubles_quotes_in_json_columns() {
        let csv = to_csv(&table(&fixtures::pair()));
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], CSV_HEADER);
        assert_eq!(
            lines[1],
            r#"r2,2024-05-06T07:08:09.000Z,Ada,ada@example.com,,"{""nps"":8,""top_metrics"":""pipeline value""}","{""calling"":4}""#
        );
    }

    #[test]
    fn empty_table_is_header_only() {
        assert_eq!(to_csv(&[]), CSV_HEADER);
    }
}
