//! The egress review queue. Rows are inserted as `pending` and transition
//! to `approved` or `denied` exactly once; repeating a decision on a
//! terminal row is a no-op that reports `false`.

use rusqlite::OptionalExtension;
use rusqlite::Row;
use rusqlite::params;

use super::SessionStore;
use super::now_ts;
use crate::error::BashBrosErr;
use crate::error::Result;
use crate::protocol::EgressStatus;

#[derive(Debug, Clone, PartialEq)]
pub struct EgressBlockRow {
    pub id: i64,
    pub timestamp: String,
    /// The embedded pattern record, as JSON.
    pub pattern: String,
    pub matched_text: String,
    pub redacted_text: String,
    pub connector: Option<String>,
    pub destination: Option<String>,
    pub status: EgressStatus,
    pub approved_by: Option<String>,
    pub approved_at: Option<String>,
}

fn row_to_block(row: &Row<'_>) -> rusqlite::Result<EgressBlockRow> {
    let status: String = row.get(7)?;
    Ok(EgressBlockRow {
        id: row.get(0)?,
        timestamp: row.get(1)?,
        pattern: row.get(2)?,
        matched_text: row.get(3)?,
        redacted_text: row.get(4)?,
        connector: row.get(5)?,
        destination: row.get(6)?,
        status: EgressStatus::parse(&status).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
        })?,
        approved_by: row.get(8)?,
        approved_at: row.get(9)?,
    })
}

const BLOCK_COLUMNS: &str = "id, timestamp, pattern, matched_text, redacted_text, connector, \
     destination, status, approved_by, approved_at";

impl SessionStore {
    pub fn insert_egress_block(
        &self,
        pattern_json: &str,
        matched_text: &str,
        redacted_text: &str,
        connector: Option<&str>,
        destination: Option<&str>,
    ) -> Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO egress_blocks (timestamp, pattern, matched_text, redacted_text,
                                        connector, destination, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'pending')",
            params![now_ts(), pattern_json, matched_text, redacted_text, connector, destination],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn get_egress_block(&self, id: i64) -> Result<EgressBlockRow> {
        let conn = self.conn();
        let sql = format!("SELECT {BLOCK_COLUMNS} FROM egress_blocks WHERE id = ?1");
        conn.query_row(&sql, params![id], row_to_block)
            .optional()?
            .ok_or(BashBrosErr::BlockNotFound(id))
    }

    /// Pending blocks, oldest first (review order).
    pub fn get_pending_blocks(&self) -> Result<Vec<EgressBlockRow>> {
        let conn = self.conn();
        let sql = format!(
            "SELECT {BLOCK_COLUMNS} FROM egress_blocks WHERE status = 'pending' ORDER BY id"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], row_to_block)?;
        let mut blocks = Vec::new();
        for row in rows {
            blocks.push(row?);
        }
        Ok(blocks)
    }

    /// Approve a pending block. Returns `false` when the row was already
    /// terminal (the transition happens exactly once).
    pub fn approve_block(&self, id: i64, approver: &str) -> Result<bool> {
        self.transition_block(id, EgressStatus::Approved, approver)
    }

    /// Deny a pending block; same terminal-once semantics as approval.
    pub fn deny_block(&self, id: i64, approver: &str) -> Result<bool> {
        self.transition_block(id, EgressStatus::Denied, approver)
    }

    fn transition_block(&self, id: i64, status: EgressStatus, approver: &str) -> Result<bool> {
        let updated = self.conn().execute(
            "UPDATE egress_blocks SET status = ?2, approved_by = ?3, approved_at = ?4
             WHERE id = ?1 AND status = 'pending'",
            params![id, status.as_str(), approver, now_ts()],
        )?;
        if updated == 0 {
            // Distinguish "already decided" from "no such row".
            let _ = self.get_egress_block(id)?;
            return Ok(false);
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use pretty_assertions::assert_eq;

    use super::*;

    fn insert(store: &SessionStore) -> i64 {
        store
            .insert_egress_block(
                r#"{"name":"api_key","severity":"critical","action":"block"}"#,
                "api_key=sk_live_x",
                "[REDACTED:api_key]",
                Some("slack"),
                Some("#ops"),
            )
            .unwrap()
    }

    #[test]
    fn inserted_blocks_are_pending() {
        let store = SessionStore::open_in_memory().unwrap();
        let id = insert(&store);
        let block = store.get_egress_block(id).unwrap();
        assert_eq!(block.status, EgressStatus::Pending);
        assert!(block.approved_by.is_none());
        assert_eq!(store.get_pending_blocks().unwrap().len(), 1);
    }

    #[test]
    fn approval_is_terminal_and_idempotent() {
        let store = SessionStore::open_in_memory().unwrap();
        let id = insert(&store);

        assert!(store.approve_block(id, "sam").unwrap());
        let block = store.get_egress_block(id).unwrap();
        assert_eq!(block.status, EgressStatus::Approved);
        assert_eq!(block.approved_by.as_deref(), Some("sam"));
        assert!(block.approved_at.is_some());

        // Second decision is a no-op; the record keeps its first approver.
        assert!(!store.approve_block(id, "casey").unwrap());
        assert!(!store.deny_block(id, "casey").unwrap());
        let block = store.get_egress_block(id).unwrap();
        assert_eq!(block.status, EgressStatus::Approved);
        assert_eq!(block.approved_by.as_deref(), Some("sam"));
    }

    #[test]
    fn denial_removes_from_pending_queue() {
        let store = SessionStore::open_in_memory().unwrap();
        let first = insert(&store);
        let second = insert(&store);
        assert!(store.deny_block(first, "sam").unwrap());

        let pending = store.get_pending_blocks().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, second);
    }

    #[test]
    fn unknown_block_errors() {
        let store = SessionStore::open_in_memory().unwrap();
        assert!(matches!(
            store.approve_block(999, "sam"),
            Err(BashBrosErr::BlockNotFound(999))
        ));
    }
}
