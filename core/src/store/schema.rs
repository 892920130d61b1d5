//! Schema creation and idempotent migrations, run on every open.
//!
//! Older deployments may be mid-upgrade while another process still runs
//! the previous binary, so every step here must be safe to re-run and safe
//! to run concurrently: `CREATE TABLE IF NOT EXISTS`, add-column guarded by
//! a `PRAGMA table_info` probe, and the one copy-rebuild (relaxing
//! `commands.session_id NOT NULL`) wrapped in an immediate transaction.

use rusqlite::Connection;

use crate::error::Result;

const CREATE_TABLES: &str = "
CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    agent TEXT NOT NULL,
    pid INTEGER,
    start_time TEXT NOT NULL,
    end_time TEXT,
    status TEXT NOT NULL DEFAULT 'active',
    command_count INTEGER NOT NULL DEFAULT 0,
    blocked_count INTEGER NOT NULL DEFAULT 0,
    avg_risk_score REAL NOT NULL DEFAULT 0,
    working_dir TEXT,
    mode TEXT NOT NULL DEFAULT 'hook',
    repo_name TEXT,
    metadata TEXT
);
CREATE INDEX IF NOT EXISTS idx_sessions_status ON sessions(status);
CREATE INDEX IF NOT EXISTS idx_sessions_start_time ON sessions(start_time);

CREATE TABLE IF NOT EXISTS commands (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT,
    timestamp TEXT NOT NULL,
    command TEXT NOT NULL,
    allowed INTEGER NOT NULL,
    risk_score INTEGER NOT NULL,
    risk_level TEXT NOT NULL,
    risk_factors TEXT NOT NULL DEFAULT '[]',
    duration_ms INTEGER,
    violations TEXT NOT NULL DEFAULT '[]'
);
CREATE INDEX IF NOT EXISTS idx_commands_session_id ON commands(session_id);
CREATE INDEX IF NOT EXISTS idx_commands_timestamp ON commands(timestamp);
CREATE INDEX IF NOT EXISTS idx_commands_allowed ON commands(allowed);

CREATE TABLE IF NOT EXISTS tool_uses (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    tool_name TEXT NOT NULL,
    tool_input TEXT NOT NULL DEFAULT '',
    tool_output TEXT NOT NULL DEFAULT '',
    exit_code INTEGER,
    success INTEGER,
    cwd TEXT,
    repo_name TEXT,
    repo_path TEXT,
    session_id TEXT
);

CREATE TABLE IF NOT EXISTS user_prompts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT,
    timestamp TEXT NOT NULL,
    prompt_text TEXT NOT NULL,
    prompt_length INTEGER NOT NULL,
    word_count INTEGER NOT NULL,
    cwd TEXT
);

CREATE TABLE IF NOT EXISTS bro_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    session_id TEXT,
    kind TEXT NOT NULL,
    payload TEXT
);

CREATE TABLE IF NOT EXISTS bro_status (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    status TEXT NOT NULL,
    model TEXT,
    detail TEXT
);

CREATE TABLE IF NOT EXISTS adapter_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    adapter TEXT NOT NULL,
    event_type TEXT NOT NULL,
    payload TEXT
);

CREATE TABLE IF NOT EXISTS egress_blocks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    pattern TEXT NOT NULL,
    matched_text TEXT NOT NULL,
    redacted_text TEXT NOT NULL,
    connector TEXT,
    destination TEXT,
    status TEXT NOT NULL DEFAULT 'pending',
    approved_by TEXT,
    approved_at TEXT
);
CREATE INDEX IF NOT EXISTS idx_egress_blocks_status ON egress_blocks(status);

CREATE TABLE IF NOT EXISTS exposure_scans (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    agent TEXT NOT NULL,
    pid INTEGER,
    port INTEGER NOT NULL,
    bind_addr TEXT NOT NULL,
    has_auth TEXT NOT NULL,
    severity TEXT NOT NULL,
    action TEXT NOT NULL,
    message TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    source TEXT NOT NULL,
    event_type TEXT NOT NULL,
    payload TEXT
);

CREATE TABLE IF NOT EXISTS connector_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    connector TEXT NOT NULL,
    direction TEXT NOT NULL,
    event_type TEXT NOT NULL,
    payload TEXT
);

CREATE TABLE IF NOT EXISTS session_allowlist (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL,
    pattern TEXT NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE(session_id, pattern)
);
";

pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(CREATE_TABLES)?;

    // Columns added after the first release. Guarded probes keep this
    // idempotent and safe against a concurrent old-binary process.
    add_column_if_missing(conn, "sessions", "mode", "TEXT NOT NULL DEFAULT 'hook'")?;
    add_column_if_missing(conn, "sessions", "repo_name", "TEXT")?;
    add_column_if_missing(conn, "sessions", "metadata", "TEXT")?;
    add_column_if_missing(conn, "tool_uses", "session_id", "TEXT")?;

    relax_commands_session_id(conn)?;

    Ok(())
}

fn has_column(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let sql = format!("PRAGMA table_info({table})");
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

fn add_column_if_missing(conn: &Connection, table: &str, column: &str, decl: &str) -> Result<()> {
    if has_column(conn, table, column)? {
        return Ok(());
    }
    let sql = format!("ALTER TABLE {table} ADD COLUMN {column} {decl}");
    match conn.execute(&sql, []) {
        Ok(_) => Ok(()),
        // A concurrent process may have added it between the probe and the
        // ALTER; re-probe instead of failing the open.
        Err(err) => {
            if has_column(conn, table, column)? {
                Ok(())
            } else {
                Err(err.into())
            }
        }
    }
}

/// Early schemas declared `commands.session_id TEXT NOT NULL`; hook
/// processes insert commands before any session exists, so the constraint
/// has to go. SQLite cannot drop a NOT NULL in place: copy-rebuild.
fn relax_commands_session_id(conn: &Connection) -> Result<()> {
    let mut stmt = conn.prepare("PRAGMA table_info(commands)")?;
    let mut rows = stmt.query([])?;
    let mut not_null = false;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == "session_id" {
            let notnull: i64 = row.get(3)?;
            not_null = notnull != 0;
            break;
        }
    }
    drop(rows);
    drop(stmt);

    if !not_null {
        return Ok(());
    }

    conn.execute_batch(
        "
        BEGIN IMMEDIATE;
        ALTER TABLE commands RENAME TO commands_migrating;
        CREATE TABLE commands (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id TEXT,
            timestamp TEXT NOT NULL,
            command TEXT NOT NULL,
            allowed INTEGER NOT NULL,
            risk_score INTEGER NOT NULL,
            risk_level TEXT NOT NULL,
            risk_factors TEXT NOT NULL DEFAULT '[]',
            duration_ms INTEGER,
            violations TEXT NOT NULL DEFAULT '[]'
        );
        INSERT INTO commands
            SELECT id, session_id, timestamp, command, allowed, risk_score,
                   risk_level, risk_factors, duration_ms, violations
            FROM commands_migrating;
        DROP TABLE commands_migrating;
        CREATE INDEX IF NOT EXISTS idx_commands_session_id ON commands(session_id);
        CREATE INDEX IF NOT EXISTS idx_commands_timestamp ON commands(timestamp);
        CREATE INDEX IF NOT EXISTS idx_commands_allowed ON commands(allowed);
        COMMIT;
        ",
    )?;
    Ok(())
}

/// A stable digest of the schema, used by tests to assert migration
/// idempotence.
pub fn schema_digest(conn: &Connection) -> Result<String> {
    let mut stmt = conn.prepare(
        "SELECT type, name, COALESCE(sql, '') FROM sqlite_master
         WHERE name NOT LIKE 'sqlite_%' ORDER BY type, name",
    )?;
    let mut rows = stmt.query([])?;
    let mut digest = String::new();
    while let Some(row) = rows.next()? {
        let kind: String = row.get(0)?;
        let name: String = row.get(1)?;
        let sql: String = row.get(2)?;
        digest.push_str(&kind);
        digest.push(':');
        digest.push_str(&name);
        digest.push(':');
        digest.push_str(&sql);
        digest.push('\n');
    }
    Ok(digest)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        let digest_once = schema_digest(&conn).unwrap();
        let rows_once: i64 = conn
            .query_row("SELECT COUNT(*) FROM sqlite_master", [], |r| r.get(0))
            .unwrap();

        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        assert_eq!(schema_digest(&conn).unwrap(), digest_once);
        let rows_again: i64 = conn
            .query_row("SELECT COUNT(*) FROM sqlite_master", [], |r| r.get(0))
            .unwrap();
        assert_eq!(rows_again, rows_once);
    }

    #[test]
    fn legacy_not_null_session_id_is_relaxed() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE commands (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                command TEXT NOT NULL,
                allowed INTEGER NOT NULL,
                risk_score INTEGER NOT NULL,
                risk_level TEXT NOT NULL,
                risk_factors TEXT NOT NULL DEFAULT '[]',
                duration_ms INTEGER,
                violations TEXT NOT NULL DEFAULT '[]'
            );
            INSERT INTO commands (session_id, timestamp, command, allowed, risk_score, risk_level)
            VALUES ('legacy', '2024-01-01T00:00:00Z', 'ls', 1, 1, 'safe');",
        )
        .unwrap();

        run_migrations(&conn).unwrap();

        // Old rows survive and NULL session ids are now accepted.
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM commands", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
        conn.execute(
            "INSERT INTO commands (session_id, timestamp, command, allowed, risk_score, risk_level)
             VALUES (NULL, '2024-01-02T00:00:00Z', 'pwd', 1, 1, 'safe')",
            [],
        )
        .unwrap();
    }

    #[test]
    fn legacy_sessions_gain_new_columns() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE sessions (
                id TEXT PRIMARY KEY,
                agent TEXT NOT NULL,
                pid INTEGER,
                start_time TEXT NOT NULL,
                end_time TEXT,
                status TEXT NOT NULL DEFAULT 'active',
                command_count INTEGER NOT NULL DEFAULT 0,
                blocked_count INTEGER NOT NULL DEFAULT 0,
                avg_risk_score REAL NOT NULL DEFAULT 0,
                working_dir TEXT
            );",
        )
        .unwrap();

        run_migrations(&conn).unwrap();

        assert!(has_column(&conn, "sessions", "mode").unwrap());
        assert!(has_column(&conn, "sessions", "repo_name").unwrap());
        assert!(has_column(&conn, "sessions", "metadata").unwrap());
        assert!(has_column(&conn, "tool_uses", "session_id").unwrap());
    }
}
