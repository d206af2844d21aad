//! CRM pain-points survey service.
//!
//! A multi-step survey about CRM frustrations with answer coaching,
//! drop-off telemetry and an admin reporting surface.
//!
//! - [`survey`]: the navigation state machine that drives a respondent
//!   through the schema, used by both the HTTP client and the terminal wizard
//! - [`coach`]: answer validation and suggestions from an ordered list of
//!   LLM providers with a local heuristic fallback
//! - [`responses`] and [`telemetry`]: submission log and funnel events
//! - [`reports`]: admin summaries, CSV export and step analytics
//! - [`web`]: the axum server and a client for it

pub mod bootstrap;
pub mod cli;
pub mod coach;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod reports;
pub mod responses;
pub mod schema;
pub mod survey;
pub mod telemetry;
pub mod web;

pub use config::Config;
pub use error::{Error, Result};
pub use schema::{SurveySchema, crm_pain_points};
pub use survey::SurveySession;
