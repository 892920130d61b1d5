//! Glob-based allow/block filtering of command prefixes.
//!
//! Block list takes precedence over allow list. An empty allow list, or one
//! containing `*`, means allow-by-default.

use wildmatch::WildMatch;

use crate::config::CommandRules;
use crate::protocol::Severity;
use crate::protocol::Violation;
use crate::protocol::ViolationType;

#[derive(Debug)]
pub struct CommandFilter {
    allow: Vec<(String, WildMatch)>,
    block: Vec<(String, WildMatch)>,
    allow_by_default: bool,
}

/// Compile a command glob. A bare prefix like `git push` behaves as
/// `git push*` so rules read naturally.
fn compile_glob(pattern: &str) -> WildMatch {
    if pattern.contains('*') || pattern.contains('?') {
        WildMatch::new(pattern)
    } else {
        WildMatch::new(&format!("{pattern}*"))
    }
}

/// The base token a remediation hint should reference.
pub fn base_token(command: &str) -> &str {
    command.split_whitespace().next().unwrap_or(command)
}

impl CommandFilter {
    pub fn new(rules: &CommandRules) -> Self {
        let allow_by_default =
            rules.allow.is_empty() || rules.allow.iter().any(|p| p.trim() == "*");
        Self {
            allow: rules
                .allow
                .iter()
                .map(|p| (p.clone(), compile_glob(p)))
                .collect(),
            block: rules
                .block
                .iter()
                .map(|p| (p.clone(), compile_glob(p)))
                .collect(),
            allow_by_default,
        }
    }

    pub fn check(&self, command: &str) -> Option<Violation> {
        let command = command.trim();

        if let Some((pattern, _)) = self.block.iter().find(|(_, m)| m.matches(command)) {
            return Some(
                Violation::new(
                    ViolationType::Command,
                    pattern.clone(),
                    format!("command matches blocked pattern `{pattern}`"),
                    Severity::High,
                )
                .with_remediation(format!(
                    "`{}` is blocked by commands.block; remove the rule or use an allowed alternative",
                    base_token(command)
                )),
            );
        }

        if self.allow_by_default {
            return None;
        }
        if self.allow.iter().any(|(_, m)| m.matches(command)) {
            return None;
        }

        Some(
            Violation::new(
                ViolationType::Command,
                "allow_list",
                "command does not match any allowed pattern".to_string(),
                Severity::Medium,
            )
            .with_remediation(format!(
                "add `{}` to commands.allow to permit it",
                base_token(command)
            )),
        )
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    fn rules(allow: &[&str], block: &[&str]) -> CommandRules {
        CommandRules {
            allow: allow.iter().map(|s| s.to_string()).collect(),
            block: block.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn empty_allow_list_allows_by_default() {
        let filter = CommandFilter::new(&rules(&[], &[]));
        assert!(filter.check("anything goes").is_none());
    }

    #[test]
    fn star_allow_list_allows_by_default() {
        let filter = CommandFilter::new(&rules(&["*"], &[]));
        assert!(filter.check("make test").is_none());
    }

    #[test]
    fn block_takes_precedence_over_allow() {
        let filter = CommandFilter::new(&rules(&["*"], &["rm -rf*"]));
        let violation = filter.check("rm -rf /tmp/x").unwrap();
        assert_eq!(violation.kind, ViolationType::Command);
        assert_eq!(violation.severity, Severity::High);
    }

    #[test]
    fn allow_miss_is_medium() {
        let filter = CommandFilter::new(&rules(&["git *", "cargo *"], &[]));
        assert!(filter.check("git status").is_none());
        let violation = filter.check("curl https://example.com").unwrap();
        assert_eq!(violation.severity, Severity::Medium);
        assert!(violation.remediation[0].contains("curl"));
    }

    #[test]
    fn bare_prefix_behaves_as_prefix_glob() {
        let filter = CommandFilter::new(&rules(&["*"], &["git push"]));
        assert!(filter.check("git push origin main --force").is_some());
        assert!(filter.check("git pull").is_none());
    }
}
