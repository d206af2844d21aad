//! Local persistence of in-progress drafts.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::DraftError;
use crate::survey::draft::DraftState;

/// A draft plus the telemetry session it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedDraft {
    pub session_id: String,
    pub state: DraftState,
}

/// Where a respondent's draft survives restarts.
pub trait DraftStore: Send + Sync {
    fn load(&self) -> Result<Option<PersistedDraft>, DraftError>;

    fn save(&self, draft: &PersistedDraft) -> Result<(), DraftError>;

    fn clear(&self) -> Result<(), DraftError>;
}

/// JSON file on disk, written atomically through a sibling temp file.
pub struct FileDraftStore {
    path: PathBuf,
}

impl FileDraftStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DraftStore for FileDraftStore {
    fn load(&self) -> Result<Option<PersistedDraft>, DraftError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }

    fn save(&self, draft: &PersistedDraft) -> Result<(), DraftError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(draft)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), DraftError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Process-local store, used by tests and the gateway's stateless flows.
#[derive(Default)]
pub struct MemoryDraftStore {
    slot: Mutex<Option<PersistedDraft>>,
}

impl MemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DraftStore for MemoryDraftStore {
    fn load(&self) -> Result<Option<PersistedDraft>, DraftError> {
        Ok(self.slot.lock().map(|s| s.clone()).unwrap_or_default())
    }

    fn save(&self, draft: &PersistedDraft) -> Result<(), DraftError> {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = Some(draft.clone());
        }
        Ok(())
    }

    fn clear(&self) -> Result<(), DraftError> {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = None;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::survey::draft::Respondent;

    fn draft() -> PersistedDraft {
        PersistedDraft {
            session_id: "s-1".to_string(),
            state: DraftState {
                respondent: Respondent {
                    name: "Ada".to_string(),
                    email: "ada@example.com".to_string(),
                    company: String::new(),
                },
                ..DraftState::default()
            },
        }
    }

    #[test]
    fn file_store_round_trip_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDraftStore::new(dir.path().join("nested").join("draft.json"));

        assert_eq!(store.load().unwrap(), None);
        store.save(&draft()).unwrap();
        assert_eq!(store.load().unwrap(), Some(draft()));

        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
        // Clearing twice is fine.
        store.clear().unwrap();
    }

    #[test]
    fn corrupt_file_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("draft.json");
        std::fs::write(&path, "{not json").unwrap();
        let store = FileDraftStore::new(&path);
        assert!(matches!(store.load(), Err(DraftError::Decode(_))));
    }

    #[test]
    fn memory_store_holds_one_draft() {
        let store = MemoryDraftStore::new();
        store.save(&draft()).unwrap();
        assert_eq!(store.load().unwrap().map(|d| d.session_id), Some("s-1".to_string()));
        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
    }
}
