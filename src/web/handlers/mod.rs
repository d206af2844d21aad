//! HTTP handlers, grouped by surface.

pub mod admin;
pub mod ai;
pub mod survey;
pub mod telemetry;
