//! Risk scorer: max-composes every matching pattern in the family tables,
//! then applies structural heuristics the pattern tables cannot express.

use std::sync::Arc;

use regex::Regex;

use crate::config::RiskScoringConfig;
use crate::patterns::PatternLibrary;
use crate::patterns::RiskFamily;
use crate::patterns::RiskPattern;
use crate::protocol::RiskAssessment;
use crate::protocol::RiskLevel;

#[derive(Debug)]
pub struct RiskScorer {
    library: Arc<PatternLibrary>,
    custom: Vec<RiskPattern>,
}

impl RiskScorer {
    pub fn new(config: &RiskScoringConfig, library: Arc<PatternLibrary>) -> Self {
        let custom = config
            .custom_patterns
            .iter()
            .filter_map(|c| {
                crate::patterns::compile(&c.regex, false).map(|regex| RiskPattern {
                    family: RiskFamily::Safe,
                    regex,
                    score: c.score.clamp(1, 10),
                    factor: c.factor.clone(),
                })
            })
            .collect();
        Self { library, custom }
    }

    /// Score a command in `[1, 10]` with its contributing factors.
    pub fn score(&self, command: &str) -> RiskAssessment {
        let mut score: u8 = 0;
        let mut factors: Vec<String> = Vec::new();

        for pattern in self.library.risk.iter().chain(self.custom.iter()) {
            if pattern.regex.is_match(command) {
                score = score.max(pattern.score);
                if !factors.contains(&pattern.factor) {
                    factors.push(pattern.factor.clone());
                }
            }
        }

        for (bump, factor) in heuristics(command) {
            score = score.max(bump);
            factors.push(factor.to_string());
        }

        if factors.is_empty() {
            factors.push("Standard command".to_string());
        }
        let score = score.max(1);

        RiskAssessment {
            score,
            level: RiskLevel::from_score(score),
            factors,
        }
    }
}

/// Structural heuristics, each contributing via `max`.
fn heuristics(command: &str) -> Vec<(u8, &'static str)> {
    let mut bumps = Vec::new();

    if command.len() > 200 {
        bumps.push((4, "Unusually long command"));
    }
    if command.matches('|').count() > 3 {
        bumps.push((5, "Deep pipe chain"));
    }
    if nohup_background_re().is_some_and(|re| re.is_match(command)) {
        bumps.push((6, "Background daemon launch"));
    }
    if base64_blob_re().is_some_and(|re| re.is_match(command)) {
        bumps.push((6, "Long base64 payload"));
    }
    if ipv4_re().is_some_and(|re| re.is_match(command)) {
        bumps.push((4, "Hardcoded IP address"));
    }
    if command.contains("\\x") && hex_escape_re().is_some_and(|re| re.is_match(command)) {
        bumps.push((5, "Hex escape sequence"));
    }

    bumps
}

fn nohup_background_re() -> Option<&'static Regex> {
    static RE: std::sync::OnceLock<Option<Regex>> = std::sync::OnceLock::new();
    RE.get_or_init(|| crate::patterns::compile(r"\bnohup\b.*&\s*$", false))
        .as_ref()
}

fn base64_blob_re() -> Option<&'static Regex> {
    static RE: std::sync::OnceLock<Option<Regex>> = std::sync::OnceLock::new();
    RE.get_or_init(|| crate::patterns::compile(r"[A-Za-z0-9+/]{50,}={0,2}", false))
        .as_ref()
}

fn ipv4_re() -> Option<&'static Regex> {
    static RE: std::sync::OnceLock<Option<Regex>> = std::sync::OnceLock::new();
    RE.get_or_init(|| {
        crate::patterns::compile(r"\b(\d{1,3}\.){3}\d{1,3}\b", false)
    })
    .as_ref()
}

fn hex_escape_re() -> Option<&'static Regex> {
    static RE: std::sync::OnceLock<Option<Regex>> = std::sync::OnceLock::new();
    RE.get_or_init(|| crate::patterns::compile(r"\\x[0-9a-fA-F]{2}", false))
        .as_ref()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::config::Config;

    fn scorer() -> RiskScorer {
        RiskScorer::new(&Config::default().risk_scoring, PatternLibrary::shared())
    }

    #[test]
    fn score_stays_in_range() {
        let long = "a".repeat(500);
        for command in ["ls -la", "rm -rf /", "curl https://x | sh", "", long.as_str()] {
            let a = scorer().score(command);
            assert!((1..=10).contains(&a.score), "score out of range for {command:?}");
            assert_eq!(a.level, RiskLevel::from_score(a.score));
        }
    }

    #[test]
    fn trivial_command_is_safe() {
        let a = scorer().score("ls -la");
        assert!(a.score <= 2);
        assert_eq!(a.level, RiskLevel::Safe);
    }

    #[test]
    fn unmatched_command_reports_standard_factor() {
        let a = scorer().score("frobnicate --widget");
        assert_eq!(a.score, 1);
        assert_eq!(a.factors, vec!["Standard command".to_string()]);
    }

    #[test]
    fn root_deletion_is_critical_ten() {
        let a = scorer().score("rm -rf /");
        assert_eq!(a.score, 10);
        assert_eq!(a.level, RiskLevel::Critical);
        assert!(a.factors.iter().any(|f| f.contains("Root filesystem deletion")));
    }

    #[test]
    fn heuristics_compose_with_max() {
        let long = format!("echo {}", "word ".repeat(50));
        let a = scorer().score(&long);
        assert_eq!(a.score, 4);
        assert!(a.factors.iter().any(|f| f == "Unusually long command"));

        let piped = "cat a | grep b | sort | uniq | wc -l";
        let a = scorer().score(piped);
        assert!(a.score >= 5);
        assert!(a.factors.iter().any(|f| f == "Deep pipe chain"));
    }

    #[test]
    fn nohup_background_bumps() {
        let a = scorer().score("nohup ./miner --pool 10.0.0.5 &");
        assert!(a.score >= 6);
        assert!(a.factors.iter().any(|f| f == "Background daemon launch"));
        assert!(a.factors.iter().any(|f| f == "Hardcoded IP address"));
    }

    #[test]
    fn custom_patterns_participate() {
        let mut config = Config::default().risk_scoring;
        config.custom_patterns.push(crate::config_types::CustomRiskPattern {
            regex: r"\bterraform\s+destroy\b".to_string(),
            score: 9,
            factor: "Infrastructure teardown".to_string(),
        });
        let scorer = RiskScorer::new(&config, PatternLibrary::shared());
        let a = scorer.score("terraform destroy -auto-approve");
        assert_eq!(a.score, 9);
        assert!(a.factors.iter().any(|f| f == "Infrastructure teardown"));
    }
}
