//! Deterministic coaching used when no provider answers.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::coach::provider::{ValidateRequest, Validation};

/// Literal "I'd rather not answer" inputs, matched on trimmed text.
static SKIP_SYNONYM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:skip|na|n/a|none|nothing|no\s*comment|not\s*applicable|don'?t\s*know)$")
        .unwrap()
});

static NO_CRM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:don'?t|do\s+not)\s+use\s+(?:a\s+)?crm\b|\bno\s+crm\b").unwrap()
});

pub const NO_CRM_COACHING: &str = "Thank you. If you mostly use spreadsheets or email instead of a CRM, you can describe what you open first and what you scan each morning (e.g., an Excel list of new leads, yesterday’s replies). You can also type \"skip\" to move on.";

pub const FOLLOWUP_FALLBACK: &str =
    "Could you share a concrete example or numbers to make this clearer?";

const EXAMPLES_FALLBACK: [&str; 6] = [
    "Pipeline value",
    "Open deals",
    "Tasks due",
    "Stage conversions",
    "Activities today",
    "Forecast",
];

/// Short descriptions for the manual-task options.
const KNOWN_DESCRIPTIONS: &[(&str, &str)] = &[
    ("Contact/Lead research", "Finding contact info and context manually"),
    ("Writing personalized ice-breaker emails", "Crafting tailored first emails by hand"),
    ("Logging calls or meeting notes", "Typing call summaries into the CRM"),
    ("Updating deal stages / close dates", "Manually moving deals and changing dates"),
    ("Building or editing reports", "Creating dashboards and tweaking filters"),
    ("Importing data from LinkedIn or other tools", "Copying data between tools into CRM"),
    ("Preparing pre-meeting summaries", "Compiling account highlights before meetings"),
    ("Adding email summaries in CRM", "Pasting email recaps into records"),
    ("Maintaining data quality", "Fixing duplicates and missing fields"),
    ("Integrating campaign data to leads/contacts", "Linking campaign touchpoints to people"),
    ("Other (specify)", "Another manual task not listed"),
];

const GIST_WORDS: usize = 30;

/// Whether the trimmed text is a literal skip request.
pub fn is_skip_synonym(text: &str) -> bool {
    SKIP_SYNONYM.is_match(text.trim())
}

/// Whether the text says the respondent has no CRM.
pub fn mentions_no_crm(text: &str) -> bool {
    NO_CRM.is_match(text)
}

/// Empty input, or input with no letters or digits at all.
fn is_gibberish(text: &str) -> bool {
    !text.chars().any(char::is_alphanumeric)
}

pub fn validate(request: &ValidateRequest) -> Validation {
    let text = request.text.trim();
    if text.is_empty() || is_gibberish(text) {
        return Validation {
            ok: false,
            friendly: Some("Thank you. Could you add a few words so we understand your answer?".to_string()),
            wants_skip: false,
            wants_more: true,
        };
    }

    let skip = is_skip_synonym(text);
    let no_crm = mentions_no_crm(text);
    Validation {
        ok: true,
        friendly: no_crm.then(|| NO_CRM_COACHING.to_string()),
        wants_skip: skip || no_crm,
        wants_more: no_crm,
    }
}

pub fn followup() -> String {
    FOLLOWUP_FALLBACK.to_string()
}

pub fn examples() -> Vec<String> {
    EXAMPLES_FALLBACK.iter().map(|s| s.to_string()).collect()
}

/// Builtin description for a label, if one is known.
pub fn describe(label: &str) -> Option<&'static str> {
    KNOWN_DESCRIPTIONS
        .iter()
        .find(|(known, _)| *known == label)
        .map(|(_, description)| *description)
}

/// Local one-line summary of a free-text answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Gist {
    pub gist: String,
    pub hint: String,
}

/// First thirty words of the answer, with an ellipsis for long input.
pub fn gist(text: &str) -> Gist {
    let trimmed = text.trim();
    if trimmed.chars().count() < 10 {
        return Gist {
            gist: String::new(),
            hint: "Try adding more details so we can summarize better.".to_string(),
        };
    }

    let mut gist = trimmed
        .split_whitespace()
        .take(GIST_WORDS)
        .collect::<Vec<_>>()
        .join(" ");
    if text.chars().count() > 200 {
        gist.push('…');
    }
    Gist {
        gist,
        hint: "Looks good—clear and actionable.".to_string(),
    }
}
