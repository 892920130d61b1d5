//! Append-only command log. Rows are never mutated after insert.

use rusqlite::Row;
use rusqlite::params;
use rusqlite::types::Value;

use super::SessionStore;
use super::now_ts;
use crate::error::Result;
use crate::protocol::RiskLevel;
use crate::protocol::Violation;

/// A command to persist. `violations` non-empty implies `allowed = false`
/// is expected from the caller; the store does not second-guess it.
#[derive(Debug, Clone)]
pub struct CommandRecord<'a> {
    pub session_id: Option<&'a str>,
    pub command: &'a str,
    pub allowed: bool,
    pub risk_score: u8,
    pub risk_level: RiskLevel,
    pub risk_factors: &'a [String],
    pub duration_ms: Option<i64>,
    pub violations: &'a [Violation],
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommandRow {
    pub id: i64,
    pub session_id: Option<String>,
    pub timestamp: String,
    pub command: String,
    pub allowed: bool,
    pub risk_score: u8,
    pub risk_level: RiskLevel,
    pub risk_factors: Vec<String>,
    pub duration_ms: Option<i64>,
    pub violations: Vec<Violation>,
}

/// Filter for [`SessionStore::get_commands`].
#[derive(Debug, Clone, Default)]
pub struct CommandQuery {
    pub session_id: Option<String>,
    /// `Some(true)` = allowed only, `Some(false)` = blocked only.
    pub allowed: Option<bool>,
    /// Inclusive lower bound, as a store timestamp.
    pub since: Option<String>,
    pub limit: Option<u32>,
}

fn row_to_command(row: &Row<'_>) -> rusqlite::Result<CommandRow> {
    let level: String = row.get(6)?;
    let factors_json: String = row.get(7)?;
    let violations_json: String = row.get(9)?;
    let conversion = |idx: usize, e: crate::error::BashBrosErr| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    };
    Ok(CommandRow {
        id: row.get(0)?,
        session_id: row.get(1)?,
        timestamp: row.get(2)?,
        command: row.get(3)?,
        allowed: row.get::<_, i64>(4)? != 0,
        risk_score: row.get::<_, i64>(5)? as u8,
        risk_level: RiskLevel::parse(&level).map_err(|e| conversion(6, e))?,
        risk_factors: serde_json::from_str(&factors_json)
            .map_err(|e| conversion(7, crate::error::BashBrosErr::Json(e)))?,
        duration_ms: row.get(8)?,
        violations: serde_json::from_str(&violations_json)
            .map_err(|e| conversion(9, crate::error::BashBrosErr::Json(e)))?,
    })
}

const COMMAND_COLUMNS: &str = "id, session_id, timestamp, command, allowed, risk_score, \
     risk_level, risk_factors, duration_ms, violations";

impl SessionStore {
    pub fn insert_command(&self, record: &CommandRecord<'_>) -> Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO commands (session_id, timestamp, command, allowed, risk_score,
                                   risk_level, risk_factors, duration_ms, violations)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                record.session_id,
                now_ts(),
                record.command,
                record.allowed as i64,
                i64::from(record.risk_score),
                record.risk_level.as_str(),
                serde_json::to_string(record.risk_factors)?,
                record.duration_ms,
                serde_json::to_string(record.violations)?,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn get_commands(&self, query: &CommandQuery) -> Result<Vec<CommandRow>> {
        let mut sql = format!("SELECT {COMMAND_COLUMNS} FROM commands WHERE 1=1");
        let mut args: Vec<Value> = Vec::new();

        if let Some(session_id) = &query.session_id {
            sql.push_str(&format!(" AND session_id = ?{}", args.len() + 1));
            args.push(Value::from(session_id.clone()));
        }
        if let Some(allowed) = query.allowed {
            sql.push_str(&format!(" AND allowed = ?{}", args.len() + 1));
            args.push(Value::from(allowed as i64));
        }
        if let Some(since) = &query.since {
            sql.push_str(&format!(" AND timestamp >= ?{}", args.len() + 1));
            args.push(Value::from(since.clone()));
        }
        sql.push_str(" ORDER BY id DESC");
        if let Some(limit) = query.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(args), row_to_command)?;
        let mut commands = Vec::new();
        for row in rows {
            commands.push(row?);
        }
        Ok(commands)
    }

    /// Case-insensitive (ASCII) substring search over command text.
    pub fn search_commands(&self, query: &str, limit: u32) -> Result<Vec<CommandRow>> {
        let escaped = query.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
        let pattern = format!("%{escaped}%");
        let conn = self.conn();
        let sql = format!(
            "SELECT {COMMAND_COLUMNS} FROM commands
             WHERE command LIKE ?1 ESCAPE '\\' ORDER BY id DESC LIMIT ?2"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![pattern, limit], row_to_command)?;
        let mut commands = Vec::new();
        for row in rows {
            commands.push(row?);
        }
        Ok(commands)
    }

    /// The most recent `n` command texts, oldest first: the shape the loop
    /// detector wants for seeding its window.
    pub fn get_recent_command_texts(&self, n: usize) -> Result<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT command FROM commands ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![n as i64], |row| row.get::<_, String>(0))?;
        let mut texts = Vec::new();
        for row in rows {
            texts.push(row?);
        }
        texts.reverse();
        Ok(texts)
    }
}
