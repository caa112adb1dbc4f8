//! Snapshot store schema

/// Point-in-time returns of the live conflict, one row per data refresh
pub const CREATE_SNAPSHOTS: &str = r#"
CREATE TABLE IF NOT EXISTS current_snapshots (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    event_name TEXT NOT NULL,
    spx_days_elapsed INTEGER NOT NULL DEFAULT 0,
    spx_return REAL,
    spx_low REAL,
    gold_return REAL,
    oil_return REAL,
    captured_at INTEGER DEFAULT (strftime('%s', 'now'))
)"#;

pub const CREATE_SNAPSHOTS_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_snapshots_event
    ON current_snapshots(event_name, captured_at DESC)"#;

/// Applied in order on every open; each statement is idempotent
pub const MIGRATIONS: &[&str] = &[CREATE_SNAPSHOTS, CREATE_SNAPSHOTS_INDEX];
