//! Filesystem locations shared by the server and the terminal wizard.
//!
//! Everything that lives on disk sits under `~/.crm-survey/`:
//! the embedded libSQL database, the wizard's draft file and its line
//! history.

use std::path::PathBuf;

/// Base directory for on-disk state (`~/.crm-survey`).
///
/// Falls back to the working directory when no home directory is known.
pub fn survey_base_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".crm-survey")
}

/// Default location of the in-progress draft (`~/.crm-survey/draft.json`).
pub fn default_draft_path() -> PathBuf {
    survey_base_dir().join("draft.json")
}

/// Readline history for the wizard (`~/.crm-survey/history`).
pub fn default_history_path() -> PathBuf {
    survey_base_dir().join("history")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_live_under_base_dir() {
        let base = survey_base_dir();
        assert!(base.ends_with(".crm-survey"));
        assert!(default_draft_path().starts_with(&base));
        assert!(default_history_path().starts_with(&base));
    }
}
