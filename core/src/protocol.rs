//! Shared types for the gate pipeline: violations, risk assessments,
//! detector alerts, and the rows persisted by the session store.
//!
//! Every closed enum here renders to (and parses from) a fixed string code.
//! Unknown codes are rejected at the read boundary so schema drift in the
//! store surfaces as an error instead of propagating as a stray key.

use serde::Deserialize;
use serde::Serialize;

use crate::error::BashBrosErr;

/// Severity attached to a violation or pattern match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    pub fn parse(code: &str) -> Result<Self, BashBrosErr> {
        match code {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            other => Err(BashBrosErr::UnknownCode {
                kind: "severity",
                code: other.to_string(),
            }),
        }
    }
}

/// The violation taxonomy. Each member corresponds to one stage of the
/// evaluation pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationType {
    Command,
    Path,
    Secrets,
    RateLimit,
    RiskScore,
    Loop,
    Anomaly,
    Output,
}

impl ViolationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationType::Command => "command",
            ViolationType::Path => "path",
            ViolationType::Secrets => "secrets",
            ViolationType::RateLimit => "rate_limit",
            ViolationType::RiskScore => "risk_score",
            ViolationType::Loop => "loop",
            ViolationType::Anomaly => "anomaly",
            ViolationType::Output => "output",
        }
    }

    pub fn parse(code: &str) -> Result<Self, BashBrosErr> {
        match code {
            "command" => Ok(ViolationType::Command),
            "path" => Ok(ViolationType::Path),
            "secrets" => Ok(ViolationType::Secrets),
            "rate_limit" => Ok(ViolationType::RateLimit),
            "risk_score" => Ok(ViolationType::RiskScore),
            "loop" => Ok(ViolationType::Loop),
            "anomaly" => Ok(ViolationType::Anomaly),
            "output" => Ok(ViolationType::Output),
            other => Err(BashBrosErr::UnknownCode {
                kind: "violation type",
                code: other.to_string(),
            }),
        }
    }
}

/// A structured record explaining why a command was denied. Violations are
/// values, never errors: the policy engine returns them, it does not throw
/// them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    #[serde(rename = "type")]
    pub kind: ViolationType,
    /// The rule that fired, e.g. the pattern name or detector subtype.
    pub rule: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remediation: Vec<String>,
    pub severity: Severity,
}

impl Violation {
    pub fn new(
        kind: ViolationType,
        rule: impl Into<String>,
        message: impl Into<String>,
        severity: Severity,
    ) -> Self {
        Self {
            kind,
            rule: rule.into(),
            message: message.into(),
            remediation: Vec::new(),
            severity,
        }
    }

    pub fn with_remediation(mut self, hint: impl Into<String>) -> Self {
        self.remediation.push(hint.into());
        self
    }
}

/// Risk level, a total function of the risk score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Safe,
    Caution,
    Dangerous,
    Critical,
}

impl RiskLevel {
    /// Map a score in `[1, 10]` onto its level.
    pub fn from_score(score: u8) -> Self {
        match score {
            0..=2 => RiskLevel::Safe,
            3..=5 => RiskLevel::Caution,
            6..=8 => RiskLevel::Dangerous,
            _ => RiskLevel::Critical,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Safe => "safe",
            RiskLevel::Caution => "caution",
            RiskLevel::Dangerous => "dangerous",
            RiskLevel::Critical => "critical",
        }
    }

    pub fn parse(code: &str) -> Result<Self, BashBrosErr> {
        match code {
            "safe" => Ok(RiskLevel::Safe),
            "caution" => Ok(RiskLevel::Caution),
            "dangerous" => Ok(RiskLevel::Dangerous),
            "critical" => Ok(RiskLevel::Critical),
            other => Err(BashBrosErr::UnknownCode {
                kind: "risk level",
                code: other.to_string(),
            }),
        }
    }
}

/// Output of the risk scorer for one command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Integer score in `[1, 10]`.
    pub score: u8,
    pub level: RiskLevel,
    /// Human-readable factor names, in match order.
    pub factors: Vec<String>,
}

/// Lifecycle status of a session row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Completed,
    Crashed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
            SessionStatus::Crashed => "crashed",
        }
    }

    pub fn parse(code: &str) -> Result<Self, BashBrosErr> {
        match code {
            "active" => Ok(SessionStatus::Active),
            "completed" => Ok(SessionStatus::Completed),
            "crashed" => Ok(SessionStatus::Crashed),
            other => Err(BashBrosErr::UnknownCode {
                kind: "session status",
                code: other.to_string(),
            }),
        }
    }
}

/// How the session was created: by the long-lived supervisor (`watch`) or
/// lazily by short-lived hook processes (`hook`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    Watch,
    Hook,
}

impl SessionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionMode::Watch => "watch",
            SessionMode::Hook => "hook",
        }
    }

    pub fn parse(code: &str) -> Result<Self, BashBrosErr> {
        match code {
            "watch" => Ok(SessionMode::Watch),
            "hook" => Ok(SessionMode::Hook),
            other => Err(BashBrosErr::UnknownCode {
                kind: "session mode",
                code: other.to_string(),
            }),
        }
    }
}

/// What the egress inspector does when a pattern matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternAction {
    Block,
    Alert,
    Log,
}

impl PatternAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternAction::Block => "block",
            PatternAction::Alert => "alert",
            PatternAction::Log => "log",
        }
    }

    pub fn parse(code: &str) -> Result<Self, BashBrosErr> {
        match code {
            "block" => Ok(PatternAction::Block),
            "alert" => Ok(PatternAction::Alert),
            "log" => Ok(PatternAction::Log),
            other => Err(BashBrosErr::UnknownCode {
                kind: "pattern action",
                code: other.to_string(),
            }),
        }
    }
}

/// Review state of a persisted egress block. Inserted as `pending`;
/// transitions to `approved` or `denied` exactly once and is then terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EgressStatus {
    Pending,
    Approved,
    Denied,
}

impl EgressStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EgressStatus::Pending => "pending",
            EgressStatus::Approved => "approved",
            EgressStatus::Denied => "denied",
        }
    }

    pub fn parse(code: &str) -> Result<Self, BashBrosErr> {
        match code {
            "pending" => Ok(EgressStatus::Pending),
            "approved" => Ok(EgressStatus::Approved),
            "denied" => Ok(EgressStatus::Denied),
            other => Err(BashBrosErr::UnknownCode {
                kind: "egress status",
                code: other.to_string(),
            }),
        }
    }
}

/// Whether a scanned listener carries authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    Present,
    Absent,
    Unknown,
}

impl AuthState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthState::Present => "present",
            AuthState::Absent => "absent",
            AuthState::Unknown => "unknown",
        }
    }

    pub fn parse(code: &str) -> Result<Self, BashBrosErr> {
        match code {
            "present" => Ok(AuthState::Present),
            "absent" => Ok(AuthState::Absent),
            "unknown" => Ok(AuthState::Unknown),
            other => Err(BashBrosErr::UnknownCode {
                kind: "auth state",
                code: other.to_string(),
            }),
        }
    }
}

/// Response to a network-exposed agent endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExposureAction {
    Alert,
    Block,
    BlockAndKill,
}

impl ExposureAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExposureAction::Alert => "alert",
            ExposureAction::Block => "block",
            ExposureAction::BlockAndKill => "block_and_kill",
        }
    }

    pub fn parse(code: &str) -> Result<Self, BashBrosErr> {
        match code {
            "alert" => Ok(ExposureAction::Alert),
            "block" => Ok(ExposureAction::Block),
            "block_and_kill" => Ok(ExposureAction::BlockAndKill),
            other => Err(BashBrosErr::UnknownCode {
                kind: "exposure action",
                code: other.to_string(),
            }),
        }
    }
}

/// One alert from the loop detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopAlert {
    pub kind: LoopAlertKind,
    pub message: String,
    /// How many occurrences triggered the alert (turns for `max_turns`).
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopAlertKind {
    MaxTurns,
    ExactRepeat,
    SemanticRepeat,
    ToolHammer,
}

impl LoopAlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoopAlertKind::MaxTurns => "max_turns",
            LoopAlertKind::ExactRepeat => "exact_repeat",
            LoopAlertKind::SemanticRepeat => "semantic_repeat",
            LoopAlertKind::ToolHammer => "tool_hammer",
        }
    }
}

/// One alert from the anomaly detector. Alerts are independent and may
/// co-occur for a single command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyAlert {
    pub kind: AnomalyKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    Pattern,
    Timing,
    Frequency,
    Novelty,
}

impl AnomalyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyKind::Pattern => "pattern",
            AnomalyKind::Timing => "timing",
            AnomalyKind::Frequency => "frequency",
            AnomalyKind::Novelty => "novelty",
        }
    }
}

/// A finding from the secrets guard's text scan or the output scanner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanFinding {
    /// Zero-based line index within the scanned text.
    pub line: usize,
    /// Name of the pattern family that matched.
    pub pattern: String,
    /// Redacted form of the match: first 4 chars + `***` + last 2 chars.
    pub redacted: String,
    pub severity: Severity,
}

/// Result of the secrets guard's text scan: `clean` iff no secret value
/// matched anywhere in the text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextScan {
    pub clean: bool,
    pub findings: Vec<ScanFinding>,
}

/// Result of scanning command output for leaked secrets and error classes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputScanReport {
    pub has_secrets: bool,
    pub has_errors: bool,
    /// The (possibly truncated) output with every secret match replaced by
    /// `[REDACTED <name>]`.
    pub redacted: String,
    pub findings: Vec<ScanFinding>,
    /// Error families seen, first family per line, deduplicated in order.
    pub error_classes: Vec<String>,
}

/// One pattern match from the egress inspector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EgressMatch {
    pub pattern_name: String,
    pub category: String,
    pub severity: Severity,
    pub action: PatternAction,
    pub matched_text: String,
    pub redacted_text: String,
}

/// Result of inspecting an outbound payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EgressReport {
    pub blocked: bool,
    pub allowlisted: bool,
    /// Content with each match replaced by `[REDACTED:<pattern-name>]`.
    pub redacted: String,
    pub matches: Vec<EgressMatch>,
    /// Row id of the persisted pending block, when one was written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_id: Option<i64>,
}

/// One network listener attributed to a known agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExposureResult {
    pub agent: String,
    pub pid: Option<u32>,
    pub port: u16,
    pub bind_addr: String,
    pub has_auth: AuthState,
    pub severity: Severity,
    pub action: ExposureAction,
    pub message: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}
