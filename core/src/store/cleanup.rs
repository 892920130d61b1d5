//! Retention sweep: delete rows older than N days from every table except
//! active sessions and pending egress blocks.

use chrono::Duration;
use chrono::Utc;
use rusqlite::params;

use super::SessionStore;
use super::format_ts;
use crate::error::Result;

impl SessionStore {
    /// Returns the total number of rows deleted.
    pub fn cleanup(&self, days: u32) -> Result<u64> {
        let cutoff = format_ts(Utc::now() - Duration::days(i64::from(days)));
        let conn = self.conn();
        let mut deleted: u64 = 0;

        for table in [
            "commands",
            "tool_uses",
            "user_prompts",
            "bro_events",
            "bro_status",
            "adapter_events",
            "exposure_scans",
            "events",
            "connector_events",
        ] {
            let sql = format!("DELETE FROM {table} WHERE timestamp < ?1");
            deleted += conn.execute(&sql, params![cutoff])? as u64;
        }

        // Pending egress blocks survive regardless of age; a reviewer has
        // not seen them yet.
        deleted += conn.execute(
            "DELETE FROM egress_blocks WHERE timestamp < ?1 AND status != 'pending'",
            params![cutoff],
        )? as u64;

        // Active sessions survive regardless of age.
        deleted += conn.execute(
            "DELETE FROM sessions WHERE start_time < ?1 AND status != 'active'",
            params![cutoff],
        )? as u64;

        // Allowlist rows for sessions that no longer exist.
        deleted += conn.execute(
            "DELETE FROM session_allowlist
             WHERE session_id NOT IN (SELECT id FROM sessions)",
            [],
        )? as u64;

        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::protocol::SessionStatus;

    fn backdate(store: &SessionStore, table: &str, column: &str, days: i64) {
        let old = format_ts(Utc::now() - Duration::days(days));
        let sql = format!("UPDATE {table} SET {column} = ?1");
        store.conn().execute(&sql, params![old]).unwrap();
    }

    #[test]
    fn old_rows_are_swept_but_protected_rows_survive() {
        let store = SessionStore::open_in_memory().unwrap();

        store
            .insert_session_with_id("stale-active", "claude", None, None, None)
            .unwrap();
        store
            .insert_command(&crate::store::CommandRecord {
                session_id: Some("stale-active"),
                command: "ls",
                allowed: true,
                risk_score: 1,
                risk_level: crate::protocol::RiskLevel::Safe,
                risk_factors: &[],
                duration_ms: None,
                violations: &[],
            })
            .unwrap();
        store
            .insert_egress_block("{}", "secret", "[REDACTED:x]", None, None)
            .unwrap();

        backdate(&store, "sessions", "start_time", 90);
        backdate(&store, "commands", "timestamp", 90);
        backdate(&store, "egress_blocks", "timestamp", 90);

        let deleted = store.cleanup(30).unwrap();
        // Only the command row goes: the session is still active and the
        // egress block is still pending.
        assert_eq!(deleted, 1);
        assert!(store.get_session("stale-active").unwrap().is_some());
        assert_eq!(store.get_pending_blocks().unwrap().len(), 1);
    }

    #[test]
    fn finished_sessions_and_decided_blocks_are_swept() {
        let store = SessionStore::open_in_memory().unwrap();
        store
            .insert_session_with_id("done", "claude", None, None, None)
            .unwrap();
        store.add_session_allow("done", "make *").unwrap();
        store.end_session("done", SessionStatus::Completed).unwrap();
        let block = store
            .insert_egress_block("{}", "secret", "[REDACTED:x]", None, None)
            .unwrap();
        store.deny_block(block, "sam").unwrap();

        backdate(&store, "sessions", "start_time", 90);
        backdate(&store, "egress_blocks", "timestamp", 90);

        let deleted = store.cleanup(30).unwrap();
        // Session, egress block, and the orphaned allowlist row.
        assert_eq!(deleted, 3);
        assert!(store.get_session("done").unwrap().is_none());
    }

    #[test]
    fn recent_rows_are_untouched() {
        let store = SessionStore::open_in_memory().unwrap();
        store
            .insert_command(&crate::store::CommandRecord {
                session_id: None,
                command: "ls",
                allowed: true,
                risk_score: 1,
                risk_level: crate::protocol::RiskLevel::Safe,
                risk_factors: &[],
                duration_ms: None,
                violations: &[],
            })
            .unwrap();
        assert_eq!(store.cleanup(30).unwrap(), 0);
        assert_eq!(store.get_commands(&Default::default()).unwrap().len(), 1);
    }
}
