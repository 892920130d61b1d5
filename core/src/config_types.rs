//! Raw deserialization types for `.bashbros.yml`.
//!
//! Every field is optional; the resolved [`crate::config::Config`] supplies
//! per-field defaults (tinted by the selected profile) for anything the
//! file leaves out. Keys are camelCase on disk.

use serde::Deserialize;
use serde::Serialize;

use crate::patterns::egress::CustomEgressPattern;
use crate::patterns::egress::EgressAllowEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    #[default]
    Balanced,
    Strict,
    Permissive,
    Custom,
}

impl Profile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Balanced => "balanced",
            Profile::Strict => "strict",
            Profile::Permissive => "permissive",
            Profile::Custom => "custom",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecretsMode {
    /// Violations block and are reported at `critical`.
    #[default]
    Block,
    /// Violations are recorded at `medium` and do not block.
    Audit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditDestination {
    #[default]
    Local,
    Remote,
    Both,
}

/// A user-supplied risk pattern from `riskScoring.customPatterns`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomRiskPattern {
    pub regex: String,
    pub score: u8,
    pub factor: String,
}

/// The YAML document as written by users. Unknown keys are rejected so a
/// typoed section name fails loudly instead of silently applying defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConfigYaml {
    pub agent: Option<String>,
    pub profile: Option<Profile>,
    pub commands: Option<CommandRulesYaml>,
    pub paths: Option<PathRulesYaml>,
    pub secrets: Option<SecretsYaml>,
    pub audit: Option<AuditYaml>,
    pub rate_limit: Option<RateLimitYaml>,
    pub risk_scoring: Option<RiskScoringYaml>,
    pub loop_detection: Option<LoopDetectionYaml>,
    pub anomaly_detection: Option<AnomalyDetectionYaml>,
    pub output_scanning: Option<OutputScanningYaml>,
    pub undo: Option<UndoYaml>,
    pub store: Option<StoreYaml>,
    pub egress: Option<EgressYaml>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CommandRulesYaml {
    #[serde(default)]
    pub allow: Vec<String>,
    #[serde(default)]
    pub block: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PathRulesYaml {
    #[serde(default)]
    pub allow: Vec<String>,
    #[serde(default)]
    pub block: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SecretsYaml {
    pub enabled: Option<bool>,
    pub mode: Option<SecretsMode>,
    /// Extra sensitive path globs, merged with the built-in set.
    #[serde(default)]
    pub patterns: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AuditYaml {
    pub enabled: Option<bool>,
    pub destination: Option<AuditDestination>,
    pub remote_path: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RateLimitYaml {
    pub enabled: Option<bool>,
    pub max_per_minute: Option<u32>,
    pub max_per_hour: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RiskScoringYaml {
    pub enabled: Option<bool>,
    pub block_threshold: Option<u8>,
    pub warn_threshold: Option<u8>,
    #[serde(default)]
    pub custom_patterns: Vec<CustomRiskPattern>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LoopDetectionYaml {
    pub enabled: Option<bool>,
    pub max_repeats: Option<usize>,
    pub window_size: Option<usize>,
    pub cooldown_ms: Option<u64>,
    pub max_turns: Option<u64>,
    pub similarity_threshold: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AnomalyDetectionYaml {
    pub enabled: Option<bool>,
    pub learning_commands: Option<usize>,
    /// `[start, end)` local hours; `[0, 24]` disables timing alerts.
    pub working_hours: Option<[u8; 2]>,
    pub max_per_minute: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct OutputScanningYaml {
    pub enabled: Option<bool>,
    pub max_output_length: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UndoYaml {
    pub enabled: Option<bool>,
    pub ttl_hours: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StoreYaml {
    pub fail_closed: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EgressYaml {
    #[serde(default)]
    pub allow: Vec<EgressAllowEntry>,
    #[serde(default)]
    pub patterns: Vec<CustomEgressPattern>,
}
