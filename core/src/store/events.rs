//! Append-only event logs: sidekick activity (`bro_events`, `bro_status`,
//! `adapter_events`), exposure scan results, and the generic unified event
//! log (`events`, `connector_events`).

use rusqlite::Row;
use rusqlite::params;

use super::SessionStore;
use super::format_ts;
use super::now_ts;
use crate::error::Result;
use crate::protocol::AuthState;
use crate::protocol::ExposureAction;
use crate::protocol::ExposureResult;
use crate::protocol::Severity;

#[derive(Debug, Clone, PartialEq)]
pub struct ExposureRow {
    pub id: i64,
    pub timestamp: String,
    pub result: ExposureResult,
}

fn row_to_exposure(row: &Row<'_>) -> rusqlite::Result<ExposureRow> {
    let conversion = |idx: usize, e: crate::error::BashBrosErr| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    };
    let timestamp: String = row.get(1)?;
    let has_auth: String = row.get(6)?;
    let severity: String = row.get(7)?;
    let action: String = row.get(8)?;
    let parsed_ts = chrono::DateTime::parse_from_rfc3339(&timestamp)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .unwrap_or_default();
    Ok(ExposureRow {
        id: row.get(0)?,
        timestamp: timestamp.clone(),
        result: ExposureResult {
            agent: row.get(2)?,
            pid: row.get::<_, Option<i64>>(3)?.map(|p| p as u32),
            port: row.get::<_, i64>(4)? as u16,
            bind_addr: row.get(5)?,
            has_auth: AuthState::parse(&has_auth).map_err(|e| conversion(6, e))?,
            severity: Severity::parse(&severity).map_err(|e| conversion(7, e))?,
            action: ExposureAction::parse(&action).map_err(|e| conversion(8, e))?,
            message: row.get(9)?,
            timestamp: parsed_ts,
        },
    })
}

impl SessionStore {
    pub fn insert_exposure_result(&self, result: &ExposureResult) -> Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO exposure_scans (timestamp, agent, pid, port, bind_addr, has_auth,
                                         severity, action, message)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                format_ts(result.timestamp),
                result.agent,
                result.pid.map(i64::from),
                i64::from(result.port),
                result.bind_addr,
                result.has_auth.as_str(),
                result.severity.as_str(),
                result.action.as_str(),
                result.message,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn get_exposure_results(&self, limit: u32) -> Result<Vec<ExposureRow>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, timestamp, agent, pid, port, bind_addr, has_auth, severity, action, message
             FROM exposure_scans ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], row_to_exposure)?;
        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    pub fn insert_bro_event(
        &self,
        session_id: Option<&str>,
        kind: &str,
        payload: Option<&str>,
    ) -> Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO bro_events (timestamp, session_id, kind, payload) VALUES (?1, ?2, ?3, ?4)",
            params![now_ts(), session_id, kind, payload],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn insert_bro_status(
        &self,
        status: &str,
        model: Option<&str>,
        detail: Option<&str>,
    ) -> Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO bro_status (timestamp, status, model, detail) VALUES (?1, ?2, ?3, ?4)",
            params![now_ts(), status, model, detail],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn insert_adapter_event(
        &self,
        adapter: &str,
        event_type: &str,
        payload: Option<&str>,
    ) -> Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO adapter_events (timestamp, adapter, event_type, payload)
             VALUES (?1, ?2, ?3, ?4)",
            params![now_ts(), adapter, event_type, payload],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Generic unified event log.
    pub fn insert_event(&self, source: &str, event_type: &str, payload: Option<&str>) -> Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO events (timestamp, source, event_type, payload) VALUES (?1, ?2, ?3, ?4)",
            params![now_ts(), source, event_type, payload],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn insert_connector_event(
        &self,
        connector: &str,
        direction: &str,
        event_type: &str,
        payload: Option<&str>,
    ) -> Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO connector_events (timestamp, connector, direction, event_type, payload)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![now_ts(), connector, direction, event_type, payload],
        )?;
        Ok(conn.last_insert_rowid())
    }
}
