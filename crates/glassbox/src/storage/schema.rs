//! `SQLite` schema for the run ledger.
//!
//! SQL statements for creating the tables and indexes the ledger relies on.

/// SQL statement to create the runs table.
pub const CREATE_RUNS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    demo TEXT NOT NULL,
    summary TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
)
";

/// SQL statement to create an index on `started_at` for history queries.
pub const CREATE_STARTED_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_runs_started ON runs(started_at DESC)
";

/// SQL statement to create an index on `demo` for per-demo filtering.
pub const CREATE_DEMO_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_runs_demo ON runs(demo)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_RUNS_TABLE,
    CREATE_STARTED_INDEX,
    CREATE_DEMO_INDEX,
    CREATE_METADATA_TABLE,
];
