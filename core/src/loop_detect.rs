//! Windowed repetition detection: exact repeats, rapid-fire cooldown,
//! semantic near-repeats, tool hammering, and a hard turn cap.
//!
//! The turn counter and the consecutive-repeat streak count the *current*
//! command before deciding, so the third identical call in a burst reports
//! `count = 3`. History only grows on non-alerting calls; the streak is
//! tracked separately so a blocked repeat still escalates the count.

use std::collections::HashSet;
use std::collections::VecDeque;
use std::time::Duration;
use std::time::Instant;

use regex::Regex;

use crate::config::LoopDetectionConfig;
use crate::protocol::LoopAlert;
use crate::protocol::LoopAlertKind;

#[derive(Debug, Clone)]
struct HistoryEntry {
    raw: String,
    normalized: String,
    at: Instant,
}

#[derive(Debug)]
pub struct LoopDetector {
    config: LoopDetectionConfig,
    history: VecDeque<HistoryEntry>,
    turns: u64,
    last_command: Option<String>,
    streak: usize,
}

impl LoopDetector {
    pub fn new(config: LoopDetectionConfig) -> Self {
        Self {
            config,
            history: VecDeque::new(),
            turns: 0,
            last_command: None,
            streak: 0,
        }
    }

    /// Pre-fill the window from persisted history (most recent last). Used
    /// by short-lived hook processes to recover cross-process loop
    /// awareness. Entries are backdated past the cooldown so seeding never
    /// fabricates a rapid-fire alert by itself.
    pub fn seed(&mut self, commands: &[String]) {
        let now = Instant::now();
        let backdated = now
            .checked_sub(Duration::from_millis(self.config.cooldown_ms * 2 + 1))
            .unwrap_or(now);
        for raw in commands {
            self.history.push_back(HistoryEntry {
                raw: raw.clone(),
                normalized: normalize(raw),
                at: backdated,
            });
        }
        self.trim();
    }

    pub fn check(&mut self, command: &str) -> Option<LoopAlert> {
        self.check_at(command, Instant::now())
    }

    fn check_at(&mut self, command: &str, now: Instant) -> Option<LoopAlert> {
        self.turns += 1;
        if self.last_command.as_deref() == Some(command) {
            self.streak += 1;
        } else {
            self.streak = 1;
        }
        self.last_command = Some(command.to_string());

        if !self.config.enabled {
            return None;
        }

        let alert = self.detect(command, now);
        if alert.is_none() {
            self.history.push_back(HistoryEntry {
                raw: command.to_string(),
                normalized: normalize(command),
                at: now,
            });
            self.trim();
        }
        alert
    }

    fn detect(&self, command: &str, now: Instant) -> Option<LoopAlert> {
        if self.turns >= self.config.max_turns {
            return Some(LoopAlert {
                kind: LoopAlertKind::MaxTurns,
                message: format!("session reached {} turns without completing", self.turns),
                count: self.turns as usize,
            });
        }

        // Occurrences of this exact command, counting the current one.
        let prior: Vec<&HistoryEntry> =
            self.history.iter().filter(|e| e.raw == command).collect();
        let occurrences = prior.len() + 1;
        let exact_count = occurrences.max(self.streak);

        if exact_count >= self.config.max_repeats {
            return Some(LoopAlert {
                kind: LoopAlertKind::ExactRepeat,
                message: format!("command repeated {exact_count} times"),
                count: exact_count,
            });
        }

        if let Some(last) = prior.last() {
            if now.duration_since(last.at) < Duration::from_millis(self.config.cooldown_ms) {
                return Some(LoopAlert {
                    kind: LoopAlertKind::ExactRepeat,
                    message: format!(
                        "command repeated within {} ms cooldown",
                        self.config.cooldown_ms
                    ),
                    count: exact_count,
                });
            }
        }

        let normalized = normalize(command);
        let similar = self
            .history
            .iter()
            .filter(|e| jaccard(&e.normalized, &normalized) >= self.config.similarity_threshold)
            .count()
            + 1;
        if similar >= self.config.max_repeats {
            return Some(LoopAlert {
                kind: LoopAlertKind::SemanticRepeat,
                message: format!("{similar} near-identical commands in the recent window"),
                count: similar,
            });
        }

        let base = crate::command_filter::base_token(command);
        if !base.is_empty() {
            let hammering = self
                .history
                .iter()
                .filter(|e| crate::command_filter::base_token(&e.raw) == base)
                .count()
                + 1;
            if hammering >= self.config.max_repeats * 2 {
                return Some(LoopAlert {
                    kind: LoopAlertKind::ToolHammer,
                    message: format!("`{base}` invoked {hammering} times in the recent window"),
                    count: hammering,
                });
            }
        }

        None
    }

    fn trim(&mut self) {
        let cap = self.config.window_size * 2;
        while self.history.len() > cap {
            self.history.pop_front();
        }
    }
}

/// Normalize a command for semantic comparison: lowercase, strip quotes,
/// collapse whitespace, digit runs to `N`, 8+-char hex runs to `H`.
pub fn normalize(command: &str) -> String {
    let lower = command.to_lowercase();
    let stripped: String = lower.chars().filter(|c| *c != '\'' && *c != '"').collect();
    let hexed = match hex_run_re() {
        Some(re) => re.replace_all(&stripped, "H").into_owned(),
        None => stripped,
    };
    let numbered = match digit_run_re() {
        Some(re) => re.replace_all(&hexed, "N").into_owned(),
        None => hexed,
    };
    numbered.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Jaccard similarity over space-tokenized word sets.
pub fn jaccard(a: &str, b: &str) -> f64 {
    let set_a: HashSet<&str> = a.split(' ').filter(|t| !t.is_empty()).collect();
    let set_b: HashSet<&str> = b.split(' ').filter(|t| !t.is_empty()).collect();
    if set_a.is_empty() && set_b.is_empty() {
        return 1.0;
    }
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    intersection as f64 / union as f64
}

fn hex_run_re() -> Option<&'static Regex> {
    static RE: std::sync::OnceLock<Option<Regex>> = std::sync::OnceLock::new();
    RE.get_or_init(|| crate::patterns::compile(r"\b[0-9a-f]{8,}\b", false))
        .as_ref()
}

fn digit_run_re() -> Option<&'static Regex> {
    static RE: std::sync::OnceLock<Option<Regex>> = std::sync::OnceLock::new();
    RE.get_or_init(|| crate::patterns::compile(r"[0-9]+", false))
        .as_ref()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::config::Config;

    fn detector() -> LoopDetector {
        LoopDetector::new(Config::default().loop_detection)
    }

    #[test]
    fn normalization_is_stable_across_noise() {
        assert_eq!(normalize("git log -n 20"), normalize("git log -n 5"));
        assert_eq!(
            normalize("git show 'deadbeefcafe1234'"),
            normalize("git show 0123456789abcdef")
        );
        assert_eq!(normalize("  ls   -la "), "ls -la");
    }

    #[test]
    fn third_rapid_repeat_reports_count_three() {
        let mut d = detector();
        let t0 = Instant::now();
        assert!(d.check_at("ls", t0).is_none());
        // Second call inside the cooldown already alerts...
        let second = d.check_at("ls", t0 + Duration::from_millis(100)).unwrap();
        assert_eq!(second.kind, LoopAlertKind::ExactRepeat);
        // ...and the third reports the full streak.
        let third = d.check_at("ls", t0 + Duration::from_millis(200)).unwrap();
        assert_eq!(third.kind, LoopAlertKind::ExactRepeat);
        assert_eq!(third.count, 3);
    }

    #[test]
    fn cooldown_always_alerts_on_second_of_identical_pair() {
        let mut d = detector();
        let t0 = Instant::now();
        assert!(d.check_at("cargo test", t0).is_none());
        let alert = d.check_at("cargo test", t0 + Duration::from_millis(500)).unwrap();
        assert_eq!(alert.kind, LoopAlertKind::ExactRepeat);
    }

    #[test]
    fn slow_exact_repeats_alert_at_threshold() {
        let mut d = detector();
        let t0 = Instant::now();
        assert!(d.check_at("make build", t0).is_none());
        assert!(d.check_at("make build", t0 + Duration::from_secs(10)).is_none());
        let alert = d.check_at("make build", t0 + Duration::from_secs(20)).unwrap();
        assert_eq!(alert.kind, LoopAlertKind::ExactRepeat);
        assert_eq!(alert.count, 3);
    }

    #[test]
    fn spaced_distinct_commands_do_not_alert() {
        let mut d = detector();
        let t0 = Instant::now();
        assert!(d.check_at("ls", t0).is_none());
        assert!(d.check_at("pwd", t0 + Duration::from_secs(2)).is_none());
        assert!(d.check_at("git status", t0 + Duration::from_secs(4)).is_none());
    }

    #[test]
    fn semantic_repeats_are_detected() {
        let mut d = detector();
        let t0 = Instant::now();
        assert!(d.check_at("curl https://api.test/item/1", t0).is_none());
        assert!(
            d.check_at("curl https://api.test/item/2", t0 + Duration::from_secs(5))
                .is_none()
        );
        let alert = d
            .check_at("curl https://api.test/item/3", t0 + Duration::from_secs(10))
            .unwrap();
        assert_eq!(alert.kind, LoopAlertKind::SemanticRepeat);
        assert_eq!(alert.count, 3);
    }

    #[test]
    fn tool_hammering_on_base_token() {
        let mut d = detector();
        let t0 = Instant::now();
        // Distinct enough that the semantic check stays quiet.
        for (i, cmd) in [
            "grep alpha src/parser.rs",
            "grep beta tests/fixtures.rs",
            "grep gamma docs/book.md",
            "grep delta build/script.sh",
            "grep epsilon notes/plan.txt",
        ]
        .iter()
        .enumerate()
        {
            assert!(
                d.check_at(cmd, t0 + Duration::from_secs(i as u64 * 3)).is_none(),
                "call {i} should pass"
            );
        }
        let alert = d
            .check_at("grep zeta README.md trailing", t0 + Duration::from_secs(30))
            .unwrap();
        assert_eq!(alert.kind, LoopAlertKind::ToolHammer);
        assert_eq!(alert.count, 6);
    }

    #[test]
    fn max_turns_cap_fires() {
        let mut config = Config::default().loop_detection;
        config.max_turns = 5;
        let mut d = LoopDetector::new(config);
        let t0 = Instant::now();
        for (i, cmd) in [
            "git status",
            "cargo build --release",
            "ls -la src",
            "grep TODO README.md",
        ]
        .iter()
        .enumerate()
        {
            assert!(d.check_at(cmd, t0 + Duration::from_secs(i as u64 * 5)).is_none());
        }
        let alert = d
            .check_at("echo done", t0 + Duration::from_secs(60))
            .unwrap();
        assert_eq!(alert.kind, LoopAlertKind::MaxTurns);
        assert_eq!(alert.count, 5);
    }

    #[test]
    fn seeding_recovers_cross_process_counts() {
        let mut d = detector();
        d.seed(&["npm test".to_string(), "npm test".to_string()]);
        let alert = d.check("npm test").unwrap();
        assert_eq!(alert.kind, LoopAlertKind::ExactRepeat);
        assert_eq!(alert.count, 3);
    }

    #[test]
    fn seeding_alone_does_not_trip_cooldown() {
        let mut d = detector();
        d.seed(&["npm test".to_string()]);
        assert!(d.check("npm test").is_none());
    }

    #[test]
    fn history_is_trimmed_to_twice_window() {
        let mut config = Config::default().loop_detection;
        config.window_size = 3;
        let mut d = LoopDetector::new(config);
        let t0 = Instant::now();
        for i in 0..20u8 {
            let tag = (b'a' + i) as char;
            let cmd = format!("unique{tag} variant{tag} thing{tag}");
            assert!(d.check_at(&cmd, t0 + Duration::from_secs(u64::from(i) * 5)).is_none());
        }
        assert!(d.history.len() <= 6);
    }

    #[test]
    fn disabled_detector_never_alerts() {
        let mut config = Config::default().loop_detection;
        config.enabled = false;
        let mut d = LoopDetector::new(config);
        for _ in 0..10 {
            assert!(d.check("ls").is_none());
        }
    }
}
