//! SQLite-dialect schema for the libSQL backend.
//!
//! Run on every start; idempotent via `IF NOT EXISTS`.
//!
//! Type mapping from the PostgreSQL schema:
//! - `TIMESTAMPTZ` -> `TEXT` (RFC 3339)
//! - `JSONB` -> `TEXT` (JSON encoded)
//! - `BIGSERIAL` -> `INTEGER PRIMARY KEY AUTOINCREMENT`

pub const SCHEMA: &str = r#"

-- ==================== Responses ====================

CREATE TABLE IF NOT EXISTS survey_responses (
    id TEXT PRIMARY KEY,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    name TEXT NOT NULL,
    email TEXT NOT NULL,
    company TEXT,
    answers TEXT NOT NULL,
    ratings TEXT,
    ai_gists TEXT,
    meta TEXT
);

CREATE INDEX IF NOT EXISTS idx_responses_created ON survey_responses(created_at);

-- ==================== Telemetry ====================

CREATE TABLE IF NOT EXISTS survey_sessions (
    session_id TEXT PRIMARY KEY,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    name TEXT,
    email TEXT,
    meta TEXT
);

CREATE TABLE IF NOT EXISTS survey_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL,
    ts TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    event TEXT NOT NULL,
    section_id TEXT,
    question_id TEXT,
    from_question_id TEXT,
    step_index INTEGER,
    ms_from_start INTEGER,
    extra TEXT
);

CREATE INDEX IF NOT EXISTS idx_events_session ON survey_events(session_id);
CREATE INDEX IF NOT EXISTS idx_events_question ON survey_events(question_id);

"#;
