//! Egress patterns applied to outbound connector payloads, plus the
//! allowlist entry shapes the inspector consults before running them.

use regex::Regex;
use serde::Deserialize;
use serde::Serialize;

use crate::protocol::PatternAction;
use crate::protocol::Severity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EgressCategory {
    Credentials,
    Pii,
    Custom,
}

impl EgressCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            EgressCategory::Credentials => "credentials",
            EgressCategory::Pii => "pii",
            EgressCategory::Custom => "custom",
        }
    }
}

#[derive(Debug, Clone)]
pub struct EgressPattern {
    pub name: String,
    pub regex: Regex,
    pub severity: Severity,
    pub action: PatternAction,
    pub category: EgressCategory,
    pub description: String,
}

/// An allowlist entry. Three match shapes: by connector alone, by
/// destination alone, or by the (connector, destination) pair; optionally
/// narrowed to a single pattern name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EgressAllowEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    /// When set, only this pattern is allowed through; other matches still
    /// count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

/// (name, pattern, case-insensitive, severity, action, category, description)
type Entry = (
    &'static str,
    &'static str,
    bool,
    Severity,
    PatternAction,
    EgressCategory,
    &'static str,
);

#[rustfmt::skip]
const TABLE: &[Entry] = &[
    ("api_key", r"api[_-]?key\s*[=:]\s*\S+", true, Severity::Critical, PatternAction::Block, EgressCategory::Credentials, "API key assignment"),
    ("aws_access_key", r"\bAKIA[0-9A-Z]{16}\b", false, Severity::Critical, PatternAction::Block, EgressCategory::Credentials, "AWS access key id"),
    ("private_key", r"-----BEGIN (RSA |EC |DSA |OPENSSH |PGP )?PRIVATE KEY-----", false, Severity::Critical, PatternAction::Block, EgressCategory::Credentials, "PEM private key"),
    ("bearer_token", r"\bBearer\s+[A-Za-z0-9_\-.=]{20,}", false, Severity::Critical, PatternAction::Block, EgressCategory::Credentials, "HTTP bearer token"),
    ("password_assignment", r"\b(password|passwd|pwd)\s*[=:]\s*['\x22]?[^\s'\x22]{6,}", true, Severity::High, PatternAction::Block, EgressCategory::Credentials, "Password assignment"),
    ("db_url", r"\b(postgres(ql)?|mysql|mongodb(\+srv)?|redis|amqp)://[^\s:@/]+:[^\s@/]+@", false, Severity::Critical, PatternAction::Block, EgressCategory::Credentials, "Database URL with credentials"),
    ("github_token", r"\bgh[pousr]_[A-Za-z0-9]{20,}", false, Severity::Critical, PatternAction::Block, EgressCategory::Credentials, "GitHub token"),
    ("slack_token", r"\bxox[bpoas]-[A-Za-z0-9-]{10,}", false, Severity::Critical, PatternAction::Block, EgressCategory::Credentials, "Slack token"),
    ("ssn", r"\b\d{3}-\d{2}-\d{4}\b", false, Severity::High, PatternAction::Block, EgressCategory::Pii, "US social security number"),
    ("credit_card", r"\b(?:4\d{3}|5[1-5]\d{2}|3[47]\d{2}|6011)[ -]?\d{4}[ -]?\d{4}[ -]?\d{1,4}\b", false, Severity::High, PatternAction::Block, EgressCategory::Pii, "Payment card number"),
    ("email", r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b", false, Severity::Medium, PatternAction::Alert, EgressCategory::Pii, "Email address"),
    ("phone", r"\b\+?\d{1,2}[ -.]?\(?\d{3}\)?[ -.]?\d{3}[ -.]?\d{4}\b", false, Severity::Low, PatternAction::Alert, EgressCategory::Pii, "Phone number"),
    ("internal_ip", r"\b(10\.\d{1,3}|192\.168|172\.(1[6-9]|2\d|3[01]))\.\d{1,3}\.\d{1,3}\b", false, Severity::Low, PatternAction::Log, EgressCategory::Pii, "Internal network address"),
];

/// Compile the built-in egress table.
pub fn builtin() -> Vec<EgressPattern> {
    TABLE
        .iter()
        .filter_map(
            |(name, pattern, ci, severity, action, category, description)| {
                super::compile(pattern, *ci).map(|regex| EgressPattern {
                    name: (*name).to_string(),
                    regex,
                    severity: *severity,
                    action: *action,
                    category: *category,
                    description: (*description).to_string(),
                })
            },
        )
        .collect()
}

/// A user-supplied custom pattern from the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomEgressPattern {
    pub name: String,
    pub regex: String,
    #[serde(default = "default_custom_severity")]
    pub severity: Severity,
    #[serde(default = "default_custom_action")]
    pub action: PatternAction,
    #[serde(default)]
    pub description: Option<String>,
}

fn default_custom_severity() -> Severity {
    Severity::High
}

fn default_custom_action() -> PatternAction {
    PatternAction::Block
}

/// Compile custom patterns, skipping (with a warning) any that fail.
pub fn compile_custom(custom: &[CustomEgressPattern]) -> Vec<EgressPattern> {
    custom
        .iter()
        .filter_map(|c| {
            super::compile(&c.regex, false).map(|regex| EgressPattern {
                name: c.name.clone(),
                regex,
                severity: c.severity,
                action: c.action,
                category: EgressCategory::Custom,
                description: c.description.clone().unwrap_or_default(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn builtin_compiles() {
        assert_eq!(builtin().len(), TABLE.len());
    }

    #[test]
    fn api_key_assignment_blocks() {
        let patterns = builtin();
        let api_key = patterns.iter().find(|p| p.name == "api_key").unwrap();
        assert!(api_key.regex.is_match("api_key=sk_live_abc123xyz456789012345"));
        assert_eq!(api_key.action, PatternAction::Block);
    }

    #[test]
    fn email_alerts_but_does_not_block() {
        let patterns = builtin();
        let email = patterns.iter().find(|p| p.name == "email").unwrap();
        assert!(email.regex.is_match("contact dev@example.com for access"));
        assert_eq!(email.action, PatternAction::Alert);
    }

    #[test]
    fn custom_patterns_compile_and_tag() {
        let compiled = compile_custom(&[
            CustomEgressPattern {
                name: "ticket_id".into(),
                regex: r"JIRA-\d{4}".into(),
                severity: Severity::Low,
                action: PatternAction::Log,
                description: None,
            },
            CustomEgressPattern {
                name: "broken".into(),
                regex: "(unclosed".into(),
                severity: Severity::Low,
                action: PatternAction::Log,
                description: None,
            },
        ]);
        assert_eq!(compiled.len(), 1);
        assert_eq!(compiled[0].category, EgressCategory::Custom);
    }
}
