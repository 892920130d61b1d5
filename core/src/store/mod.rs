//! Embedded session store: a single-file SQLite database shared by the
//! supervisor and every hook process.
//!
//! Writes serialize on the connection mutex inside one process and on
//! SQLite's write lock across processes; WAL journaling keeps readers
//! unblocked. Each submodule owns one table family:
//!
//!   sessions       - session CRUD, atomic counter updates, allowlist
//!   commands       - append-only command log, search, recent-window reads
//!   tool_uses      - tool invocation log with write-time truncation
//!   prompts        - user prompt log
//!   egress_blocks  - pending/approved/denied egress review queue
//!   events         - sidekick, adapter, exposure, and generic event logs
//!   stats          - derived aggregates (dashboard stats, security summary)
//!   cleanup        - retention sweep

use std::path::Path;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::time::Duration;

use chrono::DateTime;
use chrono::SecondsFormat;
use chrono::Utc;
use rusqlite::Connection;

use crate::config::default_db_path;
use crate::config::ensure_bashbros_home;
use crate::error::BashBrosErr;
use crate::error::Result;

mod cleanup;
mod commands;
mod egress_blocks;
mod events;
mod prompts;
mod schema;
mod sessions;
mod stats;
mod tool_uses;

pub use commands::CommandQuery;
pub use commands::CommandRecord;
pub use commands::CommandRow;
pub use egress_blocks::EgressBlockRow;
pub use events::ExposureRow;
pub use prompts::UserPromptStats;
pub use sessions::SessionRow;
pub use stats::RiskDistribution;
pub use stats::SecuritySummary;
pub use stats::SessionMetrics;
pub use stats::StoreStats;
pub use tool_uses::ToolUseRecord;
pub use tool_uses::ToolUseRow;

/// Hard limit on stored tool input/output, in characters.
pub const TRUNCATE_LIMIT: usize = 50_000;

pub struct SessionStore {
    conn: Mutex<Connection>,
}

impl SessionStore {
    /// Open (or create) the store at `path` and run migrations.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| BashBrosErr::StoreUnavailable(e.to_string()))?;
        Self::init(conn)
    }

    /// Open the store at its default location under `~/.bashbros/`.
    pub fn open_default() -> Result<Self> {
        ensure_bashbros_home()?;
        Self::open(&default_db_path())
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| BashBrosErr::StoreUnavailable(e.to_string()))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.busy_timeout(Duration::from_secs(5))?;
        // WAL so concurrent hook processes do not block each other on read.
        // Returns the new mode as a row; ignore it (in-memory stays "memory").
        let _ = conn.query_row("PRAGMA journal_mode=WAL", [], |_| Ok(()));
        conn.execute_batch("PRAGMA synchronous=NORMAL;")?;
        schema::run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub(crate) fn conn(&self) -> MutexGuard<'_, Connection> {
        match self.conn.lock() {
            Ok(guard) => guard,
            // A panic mid-write in another thread leaves the data no more
            // corrupt than a killed process would; SQLite recovers either
            // way, so carry on with the inner value.
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore").finish_non_exhaustive()
    }
}

/// Fixed-width UTC timestamp. Lexicographic order equals chronological
/// order, which the stats queries rely on.
pub(crate) fn now_ts() -> String {
    format_ts(Utc::now())
}

pub(crate) fn format_ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn open_creates_file_and_reopens() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("dashboard.db");
        {
            let store = SessionStore::open(&path).unwrap();
            store
                .insert_session_with_id("s1", "claude", Some(42), Some("/work"), None)
                .unwrap();
        }
        let store = SessionStore::open(&path).unwrap();
        assert!(store.get_session("s1").unwrap().is_some());
    }

    #[test]
    fn timestamps_sort_lexicographically() {
        let a = format_ts(DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().into());
        let b = format_ts(DateTime::parse_from_rfc3339("2026-01-01T00:00:00.5Z").unwrap().into());
        let c = format_ts(DateTime::parse_from_rfc3339("2026-01-01T00:00:01Z").unwrap().into());
        assert!(a < b && b < c);
    }
}
