//! Derived, read-only aggregates over the store: dashboard stats, the
//! security summary, and per-session metrics.

use std::collections::HashMap;

use chrono::Duration;
use chrono::Local;
use chrono::Utc;
use rusqlite::params;

use super::SessionStore;
use super::format_ts;
use crate::command_filter::base_token;
use crate::error::Result;
use crate::protocol::RiskLevel;
use crate::protocol::Violation;
use crate::protocol::ViolationType;
use crate::store::CommandQuery;
use crate::store::CommandRow;

/// The stats row everything derived (achievements, XP, cost confidence)
/// hangs off.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreStats {
    pub total_commands: i64,
    pub total_blocked: i64,
    pub total_sessions: i64,
    pub active_sessions: i64,
    pub total_tool_uses: i64,
    pub total_prompts: i64,
    /// Since local midnight.
    pub commands_today: i64,
    pub blocked_today: i64,
    /// Rolling 24-hour window.
    pub commands_24h: i64,
    pub avg_risk_24h: f64,
    pub high_risk_24h: i64,
    /// Commands logged between 00:00 and 05:59 local time.
    pub late_night_commands: i64,
    /// Allowed commands since the most recent blocked one.
    pub cleanest_streak: i64,
    pub pending_egress_blocks: i64,
    pub total_egress_blocks: i64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RiskDistribution {
    pub safe: i64,
    pub caution: i64,
    pub dangerous: i64,
    pub critical: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SecuritySummary {
    pub risk_distribution: RiskDistribution,
    /// Violation counts keyed by the closed taxonomy. Unknown codes in
    /// stored rows are rejected, not silently aggregated.
    pub violations_by_type: Vec<(ViolationType, i64)>,
    pub recent_blocked: Vec<CommandRow>,
    pub high_risk_24h: i64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionMetrics {
    pub total_commands: i64,
    pub allowed_commands: i64,
    pub blocked_commands: i64,
    pub avg_risk: f64,
    pub risk_distribution: RiskDistribution,
    /// Top base tokens by use, up to 10, most frequent first.
    pub top_commands: Vec<(String, i64)>,
}

impl SessionStore {
    pub fn get_stats(&self) -> Result<StoreStats> {
        let today_start = {
            let midnight = Local::now()
                .date_naive()
                .and_hms_opt(0, 0, 0)
                .and_then(|naive| naive.and_local_timezone(Local).single())
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(Utc::now);
            format_ts(midnight)
        };
        let day_ago = format_ts(Utc::now() - Duration::hours(24));

        let conn = self.conn();
        let mut stats = StoreStats::default();
        conn.query_row(
            "SELECT
                (SELECT COUNT(*) FROM commands),
                (SELECT COUNT(*) FROM commands WHERE allowed = 0),
                (SELECT COUNT(*) FROM sessions),
                (SELECT COUNT(*) FROM sessions WHERE status = 'active'),
                (SELECT COUNT(*) FROM tool_uses),
                (SELECT COUNT(*) FROM user_prompts),
                (SELECT COUNT(*) FROM egress_blocks WHERE status = 'pending'),
                (SELECT COUNT(*) FROM egress_blocks)",
            [],
            |row| {
                stats.total_commands = row.get(0)?;
                stats.total_blocked = row.get(1)?;
                stats.total_sessions = row.get(2)?;
                stats.active_sessions = row.get(3)?;
                stats.total_tool_uses = row.get(4)?;
                stats.total_prompts = row.get(5)?;
                stats.pending_egress_blocks = row.get(6)?;
                stats.total_egress_blocks = row.get(7)?;
                Ok(())
            },
        )?;

        conn.query_row(
            "SELECT COUNT(*), COUNT(CASE WHEN allowed = 0 THEN 1 END)
             FROM commands WHERE timestamp >= ?1",
            params![today_start],
            |row| {
                stats.commands_today = row.get(0)?;
                stats.blocked_today = row.get(1)?;
                Ok(())
            },
        )?;

        conn.query_row(
            "SELECT COUNT(*), COALESCE(AVG(risk_score), 0),
                    COUNT(CASE WHEN risk_score >= 8 THEN 1 END)
             FROM commands WHERE timestamp >= ?1",
            params![day_ago],
            |row| {
                stats.commands_24h = row.get(0)?;
                stats.avg_risk_24h = row.get(1)?;
                stats.high_risk_24h = row.get(2)?;
                Ok(())
            },
        )?;

        // Local-time hour bucket: shift stored UTC timestamps by the
        // current offset before taking the hour.
        let offset_seconds = i64::from(Local::now().offset().local_minus_utc());
        stats.late_night_commands = conn.query_row(
            "SELECT COUNT(*) FROM commands
             WHERE CAST(strftime('%H', datetime(timestamp, ?1 || ' seconds')) AS INTEGER) < 6",
            params![offset_seconds.to_string()],
            |row| row.get(0),
        )?;

        stats.cleanest_streak = conn.query_row(
            "SELECT COUNT(*) FROM commands
             WHERE allowed = 1
               AND id > COALESCE((SELECT MAX(id) FROM commands WHERE allowed = 0), 0)",
            [],
            |row| row.get(0),
        )?;

        Ok(stats)
    }

    pub fn get_security_summary(&self) -> Result<SecuritySummary> {
        let day_ago = format_ts(Utc::now() - Duration::hours(24));
        let risk_distribution = {
            let conn = self.conn();
            self.risk_distribution_where(&conn, "1=1", &[])?
        };

        // Violation histogram: parse stored JSON and fold by type, keeping
        // the closed-enum read boundary.
        let mut by_type: HashMap<ViolationType, i64> = HashMap::new();
        {
            let conn = self.conn();
            let mut stmt =
                conn.prepare("SELECT violations FROM commands WHERE violations != '[]'")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            for row in rows {
                let violations: Vec<Violation> = serde_json::from_str(&row?)?;
                for violation in violations {
                    *by_type.entry(violation.kind).or_insert(0) += 1;
                }
            }
        }
        let mut violations_by_type: Vec<(ViolationType, i64)> = by_type.into_iter().collect();
        violations_by_type.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.as_str().cmp(b.0.as_str())));

        let recent_blocked = self.get_commands(&CommandQuery {
            allowed: Some(false),
            limit: Some(10),
            ..Default::default()
        })?;

        let high_risk_24h = self.conn().query_row(
            "SELECT COUNT(*) FROM commands WHERE timestamp >= ?1 AND risk_score >= 8",
            params![day_ago],
            |row| row.get(0),
        )?;

        Ok(SecuritySummary {
            risk_distribution,
            violations_by_type,
            recent_blocked,
            high_risk_24h,
        })
    }

    pub fn get_session_metrics(&self, session_id: &str) -> Result<SessionMetrics> {
        let conn = self.conn();
        let mut metrics = SessionMetrics::default();

        conn.query_row(
            "SELECT COUNT(*),
                    COUNT(CASE WHEN allowed = 1 THEN 1 END),
                    COUNT(CASE WHEN allowed = 0 THEN 1 END),
                    COALESCE(AVG(risk_score), 0)
             FROM commands WHERE session_id = ?1",
            params![session_id],
            |row| {
                metrics.total_commands = row.get(0)?;
                metrics.allowed_commands = row.get(1)?;
                metrics.blocked_commands = row.get(2)?;
                metrics.avg_risk = row.get(3)?;
                Ok(())
            },
        )?;

        metrics.risk_distribution =
            self.risk_distribution_where(&conn, "session_id = ?1", &[session_id])?;

        let mut counts: HashMap<String, i64> = HashMap::new();
        let mut stmt =
            conn.prepare("SELECT command FROM commands WHERE session_id = ?1")?;
        let rows = stmt.query_map(params![session_id], |row| row.get::<_, String>(0))?;
        for row in rows {
            let command = row?;
            let base = base_token(&command);
            if !base.is_empty() {
                *counts.entry(base.to_string()).or_insert(0) += 1;
            }
        }
        let mut top: Vec<(String, i64)> = counts.into_iter().collect();
        top.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        top.truncate(10);
        metrics.top_commands = top;

        Ok(metrics)
    }

    fn risk_distribution_where(
        &self,
        conn: &rusqlite::Connection,
        clause: &str,
        args: &[&str],
    ) -> Result<RiskDistribution> {
        let sql = format!(
            "SELECT risk_level, COUNT(*) FROM commands WHERE {clause} GROUP BY risk_level"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(args.iter().copied()), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        let mut dist = RiskDistribution::default();
        for row in rows {
            let (level, count) = row?;
            match RiskLevel::parse(&level)? {
                RiskLevel::Safe => dist.safe = count,
                RiskLevel::Caution => dist.caution = count,
                RiskLevel::Dangerous => dist.dangerous = count,
                RiskLevel::Critical => dist.critical = count,
            }
        }
        Ok(dist)
    }
}
