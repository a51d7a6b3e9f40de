//! Run ledger for glassbox.
//!
//! This module provides `SQLite`-based persistent history for demo runs,
//! including per-demo filtering, pruning, and summary statistics.

pub mod migrations;
pub mod schema;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Which demonstration a ledger entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DemoKind {
    /// Protocol instrumentation over the registry and record book.
    Protocol,
    /// Layout footprint benchmark.
    Memory,
    /// Reference-count cycle scenarios.
    Cycles,
    /// Retry combinator run.
    Retry,
    /// Lazy pipeline run.
    Pipeline,
}

impl fmt::Display for DemoKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Protocol => "protocol",
            Self::Memory => "memory",
            Self::Cycles => "cycles",
            Self::Retry => "retry",
            Self::Pipeline => "pipeline",
        };
        f.pad(name)
    }
}

impl FromStr for DemoKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "protocol" => Ok(Self::Protocol),
            "memory" => Ok(Self::Memory),
            "cycles" => Ok(Self::Cycles),
            "retry" => Ok(Self::Retry),
            "pipeline" => Ok(Self::Pipeline),
            other => Err(Error::unknown_demo(other)),
        }
    }
}

/// One recorded demo run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunRecord {
    /// Ledger-assigned id, `None` until recorded.
    pub id: Option<i64>,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// Which demo ran.
    pub demo: DemoKind,
    /// Demo-specific result summary.
    pub summary: Value,
}

impl RunRecord {
    /// Create a record for a run starting now.
    #[must_use]
    pub fn new(demo: DemoKind, summary: Value) -> Self {
        Self {
            id: None,
            started_at: Utc::now(),
            demo,
            summary,
        }
    }
}

/// Persistent history of demo runs.
///
/// Backed by `SQLite` with support for:
/// - Recording runs with a JSON result summary
/// - Listing recent history, overall or per demo
/// - Pruning by age and by count
#[derive(Debug)]
pub struct RunLedger {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

impl RunLedger {
    /// Open or create a ledger database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    /// Initializes the schema if this is a new database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema
    /// initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening ledger at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::LedgerOpen {
            path: path.clone(),
            source,
        })?;

        // WAL keeps history reads cheap while a run is being recorded
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        migrations::initialize_schema(&conn)?;

        info!("Ledger opened at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Create an in-memory ledger for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::LedgerOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record a run, returning its assigned id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn record(&self, run: &RunRecord) -> Result<i64> {
        let started_at = run.started_at.to_rfc3339();
        let demo = run.demo.to_string();
        let summary = run.summary.to_string();

        self.conn.execute(
            "INSERT INTO runs (started_at, demo, summary) VALUES (?1, ?2, ?3)",
            params![started_at, demo, summary],
        )?;

        let id = self.conn.last_insert_rowid();
        debug!("Recorded {} run with id {}", run.demo, id);
        Ok(id)
    }

    /// Get a run by its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get(&self, id: i64) -> Result<Option<RunRecord>> {
        let result = self
            .conn
            .query_row(
                "SELECT id, started_at, demo, summary FROM runs WHERE id = ?1",
                [id],
                Self::row_to_run,
            )
            .optional()?;
        Ok(result)
    }

    /// Get the most recent runs, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn recent(&self, limit: usize) -> Result<Vec<RunRecord>> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT id, started_at, demo, summary
            FROM runs ORDER BY started_at DESC, id DESC LIMIT ?1
            ",
        )?;

        let limit_i64 = i64::try_from(limit).unwrap_or(i64::MAX);
        let runs = stmt
            .query_map([limit_i64], Self::row_to_run)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(runs)
    }

    /// Get the most recent runs of one demo, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn by_demo(&self, demo: DemoKind, limit: usize) -> Result<Vec<RunRecord>> {
        let demo_str = demo.to_string();
        let mut stmt = self.conn.prepare(
            r"
            SELECT id, started_at, demo, summary
            FROM runs WHERE demo = ?1
            ORDER BY started_at DESC, id DESC LIMIT ?2
            ",
        )?;

        let limit_i64 = i64::try_from(limit).unwrap_or(i64::MAX);
        let runs = stmt
            .query_map(params![demo_str, limit_i64], Self::row_to_run)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(runs)
    }

    /// Count total runs in the ledger.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM runs", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Prune runs older than the given age.
    ///
    /// Returns the number of runs deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn prune_older_than(&self, max_age: Duration) -> Result<usize> {
        let cutoff = Utc::now() - max_age;
        let cutoff_str = cutoff.to_rfc3339();

        let affected = self
            .conn
            .execute("DELETE FROM runs WHERE started_at < ?1", [cutoff_str])?;

        if affected > 0 {
            info!("Pruned {} old runs", affected);
        }
        Ok(affected)
    }

    /// Prune runs to keep only the most recent N entries.
    ///
    /// Returns the number of runs deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn prune_keep_recent(&self, keep_count: usize) -> Result<usize> {
        let keep_i64 = i64::try_from(keep_count).unwrap_or(i64::MAX);
        let affected = self.conn.execute(
            r"
            DELETE FROM runs WHERE id NOT IN (
                SELECT id FROM runs ORDER BY started_at DESC, id DESC LIMIT ?1
            )
            ",
            [keep_i64],
        )?;

        if affected > 0 {
            info!("Pruned {} runs to keep {} recent", affected, keep_count);
        }
        Ok(affected)
    }

    /// Get ledger statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<LedgerStats> {
        let total_runs = self.count()?;

        let oldest: Option<String> = self
            .conn
            .query_row(
                "SELECT started_at FROM runs ORDER BY started_at ASC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;

        let newest: Option<String> = self
            .conn
            .query_row(
                "SELECT started_at FROM runs ORDER BY started_at DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;

        let oldest_run = oldest
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc));
        let newest_run = newest
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(LedgerStats {
            total_runs,
            oldest_run,
            newest_run,
            db_size_bytes,
        })
    }

    /// Convert a database row to a `RunRecord`.
    fn row_to_run(row: &rusqlite::Row) -> rusqlite::Result<RunRecord> {
        let id: i64 = row.get(0)?;
        let started_str: String = row.get(1)?;
        let demo_str: String = row.get(2)?;
        let summary_str: String = row.get(3)?;

        let started_at = DateTime::parse_from_rfc3339(&started_str)
            .map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc));

        let demo = demo_str.parse().unwrap_or_else(|_| {
            warn!("Unknown demo kind: {}, defaulting to protocol", demo_str);
            DemoKind::Protocol
        });

        let summary = serde_json::from_str(&summary_str).unwrap_or_else(|_| {
            warn!("Malformed summary JSON on run {}, replacing with null", id);
            Value::Null
        });

        Ok(RunRecord {
            id: Some(id),
            started_at,
            demo,
            summary,
        })
    }
}

/// Statistics about the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerStats {
    /// Total number of runs recorded.
    pub total_runs: i64,
    /// Start time of the oldest run.
    pub oldest_run: Option<DateTime<Utc>>,
    /// Start time of the newest run.
    pub newest_run: Option<DateTime<Utc>>,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}
