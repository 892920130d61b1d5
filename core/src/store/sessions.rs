//! Session rows: creation (watch and hook disciplines), lifecycle, the
//! atomic per-command counter update, and the per-session allowlist.

use rusqlite::OptionalExtension;
use rusqlite::Row;
use rusqlite::params;
use uuid::Uuid;

use super::SessionStore;
use super::now_ts;
use crate::error::Result;
use crate::protocol::SessionMode;
use crate::protocol::SessionStatus;

#[derive(Debug, Clone, PartialEq)]
pub struct SessionRow {
    pub id: String,
    pub agent: String,
    pub pid: Option<i64>,
    pub start_time: String,
    pub end_time: Option<String>,
    pub status: SessionStatus,
    pub command_count: i64,
    pub blocked_count: i64,
    pub avg_risk_score: f64,
    pub working_dir: Option<String>,
    pub mode: SessionMode,
    pub repo_name: Option<String>,
    pub metadata: Option<String>,
}

fn row_to_session(row: &Row<'_>) -> rusqlite::Result<SessionRow> {
    let status: String = row.get(5)?;
    let mode: String = row.get(10)?;
    Ok(SessionRow {
        id: row.get(0)?,
        agent: row.get(1)?,
        pid: row.get(2)?,
        start_time: row.get(3)?,
        end_time: row.get(4)?,
        status: SessionStatus::parse(&status).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
        })?,
        command_count: row.get(6)?,
        blocked_count: row.get(7)?,
        avg_risk_score: row.get(8)?,
        working_dir: row.get(9)?,
        mode: SessionMode::parse(&mode).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(10, rusqlite::types::Type::Text, Box::new(e))
        })?,
        repo_name: row.get(11)?,
        metadata: row.get(12)?,
    })
}

const SESSION_COLUMNS: &str = "id, agent, pid, start_time, end_time, status, command_count, \
     blocked_count, avg_risk_score, working_dir, mode, repo_name, metadata";

impl SessionStore {
    /// Watch mode: create a new active session with a server-assigned id.
    pub fn insert_session(
        &self,
        agent: &str,
        pid: Option<i64>,
        working_dir: Option<&str>,
        repo_name: Option<&str>,
        metadata: Option<&str>,
    ) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        self.conn().execute(
            "INSERT INTO sessions (id, agent, pid, start_time, status, working_dir, mode, repo_name, metadata)
             VALUES (?1, ?2, ?3, ?4, 'active', ?5, 'watch', ?6, ?7)",
            params![id, agent, pid, now_ts(), working_dir, repo_name, metadata],
        )?;
        Ok(id)
    }

    /// Hook mode: accept a caller-provided id. Insert-or-ignore, so
    /// concurrent hook processes racing on the same id collapse to one
    /// row. Returns whether this call created the row.
    pub fn insert_session_with_id(
        &self,
        id: &str,
        agent: &str,
        pid: Option<i64>,
        working_dir: Option<&str>,
        repo_name: Option<&str>,
    ) -> Result<bool> {
        let inserted = self.conn().execute(
            "INSERT OR IGNORE INTO sessions (id, agent, pid, start_time, status, working_dir, mode, repo_name)
             VALUES (?1, ?2, ?3, ?4, 'active', ?5, 'hook', ?6)",
            params![id, agent, pid, now_ts(), working_dir, repo_name],
        )?;
        Ok(inserted > 0)
    }

    pub fn get_session(&self, id: &str) -> Result<Option<SessionRow>> {
        let conn = self.conn();
        let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1");
        let row = conn
            .query_row(&sql, params![id], row_to_session)
            .optional()?;
        Ok(row)
    }

    /// All active sessions, newest first.
    pub fn get_active_sessions(&self) -> Result<Vec<SessionRow>> {
        let conn = self.conn();
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE status = 'active' ORDER BY start_time DESC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], row_to_session)?;
        let mut sessions = Vec::new();
        for row in rows {
            sessions.push(row?);
        }
        Ok(sessions)
    }

    /// Bump the counters and fold the risk score into the running mean in a
    /// single statement. Column references on the right-hand side read the
    /// pre-update values, so the mean is computed against the old count
    /// without a read-modify-write race. This is the only counter write
    /// path safe for concurrent hook processes.
    ///
    /// Returns false when the session is missing or no longer active (a
    /// finished session accepts no further commands).
    pub fn increment_session_command(&self, id: &str, blocked: bool, risk: u8) -> Result<bool> {
        let updated = self.conn().execute(
            "UPDATE sessions SET
                command_count = command_count + 1,
                blocked_count = blocked_count + ?2,
                avg_risk_score = (avg_risk_score * command_count + ?3) / (command_count + 1)
             WHERE id = ?1 AND status = 'active'",
            params![id, blocked as i64, f64::from(risk)],
        )?;
        Ok(updated > 0)
    }

    /// Mark a session finished. Idempotent on already-finished sessions.
    pub fn end_session(&self, id: &str, status: SessionStatus) -> Result<bool> {
        let updated = self.conn().execute(
            "UPDATE sessions SET status = ?2, end_time = ?3
             WHERE id = ?1 AND status = 'active'",
            params![id, status.as_str(), now_ts()],
        )?;
        Ok(updated > 0)
    }

    /// Persist a session-scoped allow pattern (the interactive
    /// allow-session choice). Duplicate patterns collapse.
    pub fn add_session_allow(&self, session_id: &str, pattern: &str) -> Result<()> {
        self.conn().execute(
            "INSERT OR IGNORE INTO session_allowlist (session_id, pattern, created_at)
             VALUES (?1, ?2, ?3)",
            params![session_id, pattern, now_ts()],
        )?;
        Ok(())
    }

    pub fn get_session_allowlist(&self, session_id: &str) -> Result<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT pattern FROM session_allowlist WHERE session_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![session_id], |row| row.get::<_, String>(0))?;
        let mut patterns = Vec::new();
        for row in rows {
            patterns.push(row?);
        }
        Ok(patterns)
    }
}
