//! Tool invocation log: the superset of commands covering file edits,
//! reads, and web fetches. Input and output are truncated at write time.

use rusqlite::Row;
use rusqlite::params;

use super::SessionStore;
use super::TRUNCATE_LIMIT;
use super::now_ts;
use crate::error::Result;
use crate::output_scan::truncate_chars;

#[derive(Debug, Clone, Default)]
pub struct ToolUseRecord<'a> {
    pub tool_name: &'a str,
    pub tool_input: &'a str,
    pub tool_output: &'a str,
    pub exit_code: Option<i64>,
    pub success: Option<bool>,
    pub cwd: Option<&'a str>,
    pub repo_name: Option<&'a str>,
    pub repo_path: Option<&'a str>,
    pub session_id: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolUseRow {
    pub id: i64,
    pub timestamp: String,
    pub tool_name: String,
    pub tool_input: String,
    pub tool_output: String,
    pub exit_code: Option<i64>,
    pub success: Option<bool>,
    pub cwd: Option<String>,
    pub repo_name: Option<String>,
    pub repo_path: Option<String>,
    pub session_id: Option<String>,
}

fn row_to_tool_use(row: &Row<'_>) -> rusqlite::Result<ToolUseRow> {
    Ok(ToolUseRow {
        id: row.get(0)?,
        timestamp: row.get(1)?,
        tool_name: row.get(2)?,
        tool_input: row.get(3)?,
        tool_output: row.get(4)?,
        exit_code: row.get(5)?,
        success: row.get::<_, Option<i64>>(6)?.map(|v| v != 0),
        cwd: row.get(7)?,
        repo_name: row.get(8)?,
        repo_path: row.get(9)?,
        session_id: row.get(10)?,
    })
}

impl SessionStore {
    pub fn insert_tool_use(&self, record: &ToolUseRecord<'_>) -> Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO tool_uses (timestamp, tool_name, tool_input, tool_output, exit_code,
                                    success, cwd, repo_name, repo_path, session_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                now_ts(),
                record.tool_name,
                truncate_chars(record.tool_input, TRUNCATE_LIMIT),
                truncate_chars(record.tool_output, TRUNCATE_LIMIT),
                record.exit_code,
                record.success.map(|s| s as i64),
                record.cwd,
                record.repo_name,
                record.repo_path,
                record.session_id,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn get_tool_uses(&self, session_id: Option<&str>, limit: u32) -> Result<Vec<ToolUseRow>> {
        let conn = self.conn();
        let base = "SELECT id, timestamp, tool_name, tool_input, tool_output, exit_code,
                           success, cwd, repo_name, repo_path, session_id
                    FROM tool_uses";
        let mut uses = Vec::new();
        match session_id {
            Some(session_id) => {
                let sql = format!("{base} WHERE session_id = ?1 ORDER BY id DESC LIMIT ?2");
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(params![session_id, limit], row_to_tool_use)?;
                for row in rows {
                    uses.push(row?);
                }
            }
            None => {
                let sql = format!("{base} ORDER BY id DESC LIMIT ?1");
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(params![limit], row_to_tool_use)?;
                for row in rows {
                    uses.push(row?);
                }
            }
        }
        Ok(uses)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn round_trip_with_metadata() {
        let store = SessionStore::open_in_memory().unwrap();
        store
            .insert_tool_use(&ToolUseRecord {
                tool_name: "Edit",
                tool_input: "{\"file_path\":\"src/main.rs\"}",
                tool_output: "ok",
                exit_code: Some(0),
                success: Some(true),
                cwd: Some("/work"),
                repo_name: Some("bashbros"),
                repo_path: Some("/work/bashbros"),
                session_id: Some("s1"),
            })
            .unwrap();

        let rows = store.get_tool_uses(None, 10).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].tool_name, "Edit");
        assert_eq!(rows[0].success, Some(true));
        assert_eq!(rows[0].session_id.as_deref(), Some("s1"));
    }

    #[test]
    fn input_and_output_truncate_at_limit() {
        let store = SessionStore::open_in_memory().unwrap();
        let big = "x".repeat(TRUNCATE_LIMIT + 1000);
        store
            .insert_tool_use(&ToolUseRecord {
                tool_name: "Read",
                tool_input: &big,
                tool_output: &big,
                ..Default::default()
            })
            .unwrap();

        let rows = store.get_tool_uses(None, 1).unwrap();
        assert_eq!(rows[0].tool_input.chars().count(), TRUNCATE_LIMIT);
        assert_eq!(rows[0].tool_output.chars().count(), TRUNCATE_LIMIT);
    }

    #[test]
    fn short_payloads_are_stored_whole() {
        let store = SessionStore::open_in_memory().unwrap();
        store
            .insert_tool_use(&ToolUseRecord {
                tool_name: "WebFetch",
                tool_input: "https://example.com",
                tool_output: "<html></html>",
                ..Default::default()
            })
            .unwrap();
        let rows = store.get_tool_uses(None, 1).unwrap();
        assert_eq!(rows[0].tool_input, "https://example.com");
    }

    #[test]
    fn session_filter_applies() {
        let store = SessionStore::open_in_memory().unwrap();
        for sid in ["a", "a", "b"] {
            store
                .insert_tool_use(&ToolUseRecord {
                    tool_name: "Bash",
                    session_id: Some(sid),
                    ..Default::default()
                })
                .unwrap();
        }
        assert_eq!(store.get_tool_uses(Some("a"), 10).unwrap().len(), 2);
        assert_eq!(store.get_tool_uses(Some("b"), 10).unwrap().len(), 1);
    }
}
