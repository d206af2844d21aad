//! Respondent-side survey engine.
//!
//! State lives in a serializable [`DraftState`] advanced by the pure
//! [`reduce`] function. [`SurveySession`] wraps it with coaching, draft
//! persistence, telemetry and submission.

pub mod draft;
pub mod navigation;
pub mod persist;
pub mod session;
pub mod validation;
pub mod view;

pub use draft::{DraftEvent, DraftState, Respondent, WarnState, check_identity, reduce};
pub use navigation::{Cursor, Stage, progress};
pub use persist::{DraftStore, FileDraftStore, MemoryDraftStore, PersistedDraft};
pub use session::{NextOutcome, StepToken, SurveySession};
pub use validation::{Verdict, acknowledge, evaluate};
pub use view::{Screen, View, context_prefix, view};
