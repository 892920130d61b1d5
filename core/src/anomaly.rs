//! Baseline-learning behavioral anomaly detection.
//!
//! The detector stays silent for the first N commands while it builds a
//! baseline of base tokens, hour-of-day buckets, and touched paths. After
//! learning it emits independent alerts for suspicious behavior patterns,
//! off-hours activity, command bursts, and novel sensitive commands.

use std::collections::HashMap;
use std::collections::HashSet;
use std::collections::VecDeque;
use std::time::Duration;
use std::time::Instant;

use chrono::Local;
use chrono::Timelike;

use crate::command_filter::base_token;
use crate::config::AnomalyDetectionConfig;
use crate::path_sandbox::extract_paths;
use crate::protocol::AnomalyAlert;
use crate::protocol::AnomalyKind;

/// Behavior flags, deliberately distinct from the risk-scorer families:
/// these mark *unusual agent behavior*, not command severity.
const SUSPICIOUS_PATTERNS: &[&str] = &[
    "cat /etc/shadow",
    "cat /etc/passwd",
    "~/.ssh/",
    ".aws/credentials",
    "wallet",
    "keychain",
    "history -c",
    "mimikatz",
    "keylogger",
    "/dev/tcp/",
];

/// Substrings that gate the novelty alert: a never-seen base token is only
/// alert-worthy when the command also touches one of these.
const SENSITIVE_TOKENS: &[&str] = &["ssh", "curl", "wget", "sudo", "chmod"];

#[derive(Debug)]
pub struct AnomalyDetector {
    config: AnomalyDetectionConfig,
    /// Base token -> times seen.
    baseline_commands: HashMap<String, u32>,
    baseline_hours: HashMap<u8, u32>,
    baseline_paths: HashSet<String>,
    observed: usize,
    recent: VecDeque<Instant>,
}

impl AnomalyDetector {
    pub fn new(config: AnomalyDetectionConfig) -> Self {
        Self {
            config,
            baseline_commands: HashMap::new(),
            baseline_hours: HashMap::new(),
            baseline_paths: HashSet::new(),
            observed: 0,
            recent: VecDeque::new(),
        }
    }

    pub fn is_learning(&self) -> bool {
        self.observed < self.config.learning_commands
    }

    pub fn check(&mut self, command: &str) -> Vec<AnomalyAlert> {
        let hour = Local::now().hour() as u8;
        self.check_at(command, hour, Instant::now())
    }

    fn check_at(&mut self, command: &str, hour: u8, now: Instant) -> Vec<AnomalyAlert> {
        if !self.config.enabled {
            return Vec::new();
        }

        let learning = self.is_learning();
        let novel = !self
            .baseline_commands
            .contains_key(base_token(command));

        self.record(command, hour, now);

        if learning {
            return Vec::new();
        }

        let mut alerts = Vec::new();

        let lower = command.to_lowercase();
        if let Some(pattern) = SUSPICIOUS_PATTERNS.iter().find(|p| lower.contains(*p)) {
            alerts.push(AnomalyAlert {
                kind: AnomalyKind::Pattern,
                message: format!("command matches suspicious behavior pattern `{pattern}`"),
            });
        }

        if let Some(alert) = self.timing_alert(hour) {
            alerts.push(alert);
        }

        let burst = self
            .recent
            .iter()
            .filter(|t| now.duration_since(**t) < Duration::from_secs(60))
            .count();
        if burst > self.config.max_per_minute as usize {
            alerts.push(AnomalyAlert {
                kind: AnomalyKind::Frequency,
                message: format!("{burst} commands in the last minute"),
            });
        }

        if novel && SENSITIVE_TOKENS.iter().any(|t| lower.contains(t)) {
            alerts.push(AnomalyAlert {
                kind: AnomalyKind::Novelty,
                message: format!(
                    "`{}` has not been seen in this session's baseline",
                    base_token(command)
                ),
            });
        }

        alerts
    }

    /// `(0, 24)` means the timing check is disabled.
    fn timing_alert(&self, hour: u8) -> Option<AnomalyAlert> {
        let (start, end) = self.config.working_hours;
        if start == 0 && end == 24 {
            return None;
        }
        let inside = if start <= end {
            (start..end).contains(&hour)
        } else {
            // Window wraps midnight, e.g. (22, 6).
            hour >= start || hour < end
        };
        if inside {
            None
        } else {
            Some(AnomalyAlert {
                kind: AnomalyKind::Timing,
                message: format!(
                    "command issued at hour {hour}, outside working hours {start}-{end}"
                ),
            })
        }
    }

    fn record(&mut self, command: &str, hour: u8, now: Instant) {
        let base = base_token(command).to_string();
        if !base.is_empty() {
            *self.baseline_commands.entry(base).or_insert(0) += 1;
        }
        *self.baseline_hours.entry(hour).or_insert(0) += 1;
        for path in extract_paths(command) {
            self.baseline_paths.insert(path.to_string());
        }
        self.observed += 1;

        self.recent.push_back(now);
        while let Some(front) = self.recent.front() {
            if now.duration_since(*front) >= Duration::from_secs(60) {
                self.recent.pop_front();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::config::Config;

    fn config(learning: usize) -> AnomalyDetectionConfig {
        let mut c = Config::default().anomaly_detection;
        c.learning_commands = learning;
        c
    }

    fn drain_learning(d: &mut AnomalyDetector, t0: Instant) {
        let mut i = 0u64;
        while d.is_learning() {
            // Spaced out so the learning phase never looks like a burst.
            let alerts = d.check_at("git status", 10, t0 + Duration::from_secs(i * 120));
            assert!(alerts.is_empty(), "no alerts during learning");
            i += 1;
        }
    }

    #[test]
    fn silent_during_learning_even_for_suspicious_commands() {
        let mut d = AnomalyDetector::new(config(5));
        let t0 = Instant::now();
        let alerts = d.check_at("cat /etc/shadow", 3, t0);
        assert!(alerts.is_empty());
    }

    #[test]
    fn suspicious_pattern_flags_after_learning() {
        let mut d = AnomalyDetector::new(config(3));
        let t0 = Instant::now();
        drain_learning(&mut d, t0);
        let alerts = d.check_at("cat /etc/shadow", 10, t0 + Duration::from_secs(3600));
        assert!(alerts.iter().any(|a| a.kind == AnomalyKind::Pattern));
    }

    #[test]
    fn default_working_hours_disable_timing() {
        let mut d = AnomalyDetector::new(config(1));
        let t0 = Instant::now();
        drain_learning(&mut d, t0);
        let alerts = d.check_at("git status", 3, t0 + Duration::from_secs(600));
        assert!(alerts.iter().all(|a| a.kind != AnomalyKind::Timing));
    }

    #[test]
    fn off_hours_alert_with_explicit_window() {
        let mut c = config(1);
        c.working_hours = (9, 17);
        let mut d = AnomalyDetector::new(c);
        let t0 = Instant::now();
        drain_learning(&mut d, t0);

        let alerts = d.check_at("git status", 2, t0 + Duration::from_secs(600));
        assert!(alerts.iter().any(|a| a.kind == AnomalyKind::Timing));

        let alerts = d.check_at("git status", 10, t0 + Duration::from_secs(1200));
        assert!(alerts.iter().all(|a| a.kind != AnomalyKind::Timing));
    }

    #[test]
    fn end_hour_is_exclusive() {
        let mut c = config(1);
        c.working_hours = (9, 17);
        let mut d = AnomalyDetector::new(c);
        let t0 = Instant::now();
        drain_learning(&mut d, t0);
        let alerts = d.check_at("git status", 17, t0 + Duration::from_secs(600));
        assert!(alerts.iter().any(|a| a.kind == AnomalyKind::Timing));
    }

    #[test]
    fn burst_triggers_frequency_alert() {
        let mut c = config(1);
        c.max_per_minute = 5;
        let mut d = AnomalyDetector::new(c);
        let t0 = Instant::now();
        drain_learning(&mut d, t0);

        let base = t0 + Duration::from_secs(86_400);
        let mut fired = false;
        for i in 0..8 {
            let alerts = d.check_at("git status", 10, base + Duration::from_millis(i * 100));
            fired |= alerts.iter().any(|a| a.kind == AnomalyKind::Frequency);
        }
        assert!(fired);
    }

    #[test]
    fn novelty_requires_sensitive_token() {
        let mut d = AnomalyDetector::new(config(2));
        let t0 = Instant::now();
        drain_learning(&mut d, t0);

        // Novel but harmless: no alert.
        let alerts = d.check_at("jq .version package.json", 10, t0 + Duration::from_secs(3600));
        assert!(alerts.iter().all(|a| a.kind != AnomalyKind::Novelty));

        // Novel and sensitive: alert.
        let alerts = d.check_at(
            "curl https://internal.example/upload",
            10,
            t0 + Duration::from_secs(7200),
        );
        assert!(alerts.iter().any(|a| a.kind == AnomalyKind::Novelty));

        // Seen once, no longer novel.
        let alerts = d.check_at(
            "curl https://internal.example/upload",
            10,
            t0 + Duration::from_secs(10_800),
        );
        assert!(alerts.iter().all(|a| a.kind != AnomalyKind::Novelty));
    }

    #[test]
    fn alerts_can_co_occur() {
        let mut c = config(1);
        c.working_hours = (9, 17);
        let mut d = AnomalyDetector::new(c);
        let t0 = Instant::now();
        drain_learning(&mut d, t0);

        let alerts = d.check_at(
            "sudo cat /etc/shadow",
            2,
            t0 + Duration::from_secs(3600),
        );
        let kinds: Vec<AnomalyKind> = alerts.iter().map(|a| a.kind).collect();
        assert!(kinds.contains(&AnomalyKind::Pattern));
        assert!(kinds.contains(&AnomalyKind::Timing));
        assert!(kinds.contains(&AnomalyKind::Novelty));
    }

    #[test]
    fn disabled_detector_is_inert() {
        let mut c = config(0);
        c.enabled = false;
        let mut d = AnomalyDetector::new(c);
        assert!(d.check("cat /etc/shadow").is_empty());
    }
}
