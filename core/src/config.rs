//! Resolved configuration and `.bashbros.yml` discovery.
//!
//! The engine takes [`Config`] by value at construction and never consults
//! ambient state during evaluation; a config reload instantiates a new
//! engine. Parse failures fall back to the default config (with a logged
//! error) so a broken file never takes the evaluator down.

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use tracing::error;
use tracing::warn;

use crate::config_types::AuditDestination;
use crate::config_types::ConfigYaml;
use crate::config_types::CustomRiskPattern;
use crate::config_types::Profile;
use crate::config_types::SecretsMode;
use crate::error::BashBrosErr;
use crate::error::Result;
use crate::patterns::egress::CustomEgressPattern;
use crate::patterns::egress::EgressAllowEntry;

/// Project config filenames, checked in order at each directory level.
const CONFIG_FILENAMES: &[&str] = &[".bashbros.yml", ".bashbros.yaml"];

/// User-level fallback inside `~/.bashbros/`.
const USER_CONFIG_FILENAME: &str = "config.yml";

pub const DB_FILENAME: &str = "dashboard.db";

#[derive(Debug, Clone, PartialEq)]
pub struct CommandRules {
    pub allow: Vec<String>,
    pub block: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PathRules {
    pub allow: Vec<String>,
    pub block: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SecretsConfig {
    pub enabled: bool,
    pub mode: SecretsMode,
    /// Extra sensitive path globs merged with the built-in set.
    pub patterns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuditConfig {
    pub enabled: bool,
    pub destination: AuditDestination,
    pub remote_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub max_per_minute: u32,
    pub max_per_hour: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RiskScoringConfig {
    pub enabled: bool,
    /// Blocking is inclusive: `score >= block_threshold` denies.
    pub block_threshold: u8,
    pub warn_threshold: u8,
    pub custom_patterns: Vec<CustomRiskPattern>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoopDetectionConfig {
    pub enabled: bool,
    pub max_repeats: usize,
    pub window_size: usize,
    pub cooldown_ms: u64,
    pub max_turns: u64,
    pub similarity_threshold: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnomalyDetectionConfig {
    pub enabled: bool,
    pub learning_commands: usize,
    /// `[start, end)` local hours. `(0, 24)` means timing alerts disabled.
    pub working_hours: (u8, u8),
    pub max_per_minute: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputScanningConfig {
    pub enabled: bool,
    pub max_output_length: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UndoConfig {
    pub enabled: bool,
    pub ttl_hours: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    /// When true, `gate` denies if the store is unavailable instead of the
    /// default fail-open behavior.
    pub fail_closed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EgressConfig {
    pub allow: Vec<EgressAllowEntry>,
    pub patterns: Vec<CustomEgressPattern>,
}

/// Application configuration, resolved from disk and profile defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub agent: String,
    pub profile: Profile,
    pub commands: CommandRules,
    pub paths: PathRules,
    pub secrets: SecretsConfig,
    pub audit: AuditConfig,
    pub rate_limit: RateLimitConfig,
    pub risk_scoring: RiskScoringConfig,
    pub loop_detection: LoopDetectionConfig,
    pub anomaly_detection: AnomalyDetectionConfig,
    pub output_scanning: OutputScanningConfig,
    pub undo: UndoConfig,
    pub store: StoreConfig,
    pub egress: EgressConfig,
    /// The file this config was loaded from, when one was found. `gate`'s
    /// allow-persistent choice appends to this file.
    pub source_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::for_profile(Profile::Balanced)
    }
}

impl Config {
    /// Profile defaults before any file overrides.
    pub fn for_profile(profile: Profile) -> Self {
        let (block_threshold, warn_threshold) = match profile {
            Profile::Strict => (6, 4),
            Profile::Permissive => (10, 7),
            Profile::Balanced | Profile::Custom => (8, 5),
        };
        let (max_per_minute, max_per_hour) = match profile {
            Profile::Strict => (20, 300),
            Profile::Permissive => (60, 1000),
            Profile::Balanced | Profile::Custom => (30, 500),
        };
        let secrets_mode = match profile {
            Profile::Permissive => SecretsMode::Audit,
            _ => SecretsMode::Block,
        };

        Self {
            agent: "unknown".to_string(),
            profile,
            commands: CommandRules {
                allow: vec!["*".to_string()],
                block: Vec::new(),
            },
            paths: PathRules {
                allow: vec!["*".to_string()],
                block: Vec::new(),
            },
            secrets: SecretsConfig {
                enabled: true,
                mode: secrets_mode,
                patterns: Vec::new(),
            },
            audit: AuditConfig {
                enabled: true,
                destination: AuditDestination::Local,
                remote_path: None,
            },
            rate_limit: RateLimitConfig {
                enabled: true,
                max_per_minute,
                max_per_hour,
            },
            risk_scoring: RiskScoringConfig {
                enabled: true,
                block_threshold,
                warn_threshold,
                custom_patterns: Vec::new(),
            },
            loop_detection: LoopDetectionConfig {
                enabled: true,
                max_repeats: 3,
                window_size: 20,
                cooldown_ms: 1000,
                max_turns: 100,
                similarity_threshold: 0.85,
            },
            anomaly_detection: AnomalyDetectionConfig {
                enabled: true,
                learning_commands: 50,
                working_hours: (0, 24),
                max_per_minute: 30,
            },
            output_scanning: OutputScanningConfig {
                enabled: true,
                max_output_length: 100_000,
            },
            undo: UndoConfig {
                enabled: true,
                ttl_hours: 24,
            },
            store: StoreConfig { fail_closed: false },
            egress: EgressConfig {
                allow: Vec::new(),
                patterns: Vec::new(),
            },
            source_path: None,
        }
    }

    /// Merge a parsed YAML document over the profile defaults.
    pub fn from_yaml(yaml: ConfigYaml) -> Self {
        let profile = yaml.profile.unwrap_or_default();
        let mut cfg = Self::for_profile(profile);

        if let Some(agent) = yaml.agent {
            cfg.agent = agent;
        }
        if let Some(commands) = yaml.commands {
            if !commands.allow.is_empty() {
                cfg.commands.allow = commands.allow;
            }
            cfg.commands.block = commands.block;
        }
        if let Some(paths) = yaml.paths {
            if !paths.allow.is_empty() {
                cfg.paths.allow = paths.allow;
            }
            cfg.paths.block = paths.block;
        }
        if let Some(secrets) = yaml.secrets {
            if let Some(enabled) = secrets.enabled {
                cfg.secrets.enabled = enabled;
            }
            if let Some(mode) = secrets.mode {
                cfg.secrets.mode = mode;
            }
            cfg.secrets.patterns = secrets.patterns;
        }
        if let Some(audit) = yaml.audit {
            if let Some(enabled) = audit.enabled {
                cfg.audit.enabled = enabled;
            }
            if let Some(destination) = audit.destination {
                cfg.audit.destination = destination;
            }
            cfg.audit.remote_path = audit.remote_path;
        }
        if let Some(rate) = yaml.rate_limit {
            if let Some(enabled) = rate.enabled {
                cfg.rate_limit.enabled = enabled;
            }
            if let Some(m) = rate.max_per_minute {
                cfg.rate_limit.max_per_minute = m;
            }
            if let Some(h) = rate.max_per_hour {
                cfg.rate_limit.max_per_hour = h;
            }
        }
        if let Some(risk) = yaml.risk_scoring {
            if let Some(enabled) = risk.enabled {
                cfg.risk_scoring.enabled = enabled;
            }
            if let Some(t) = risk.block_threshold {
                cfg.risk_scoring.block_threshold = t.clamp(1, 10);
            }
            if let Some(t) = risk.warn_threshold {
                cfg.risk_scoring.warn_threshold = t.clamp(1, 10);
            }
            cfg.risk_scoring.custom_patterns = risk.custom_patterns;
        }
        if let Some(ld) = yaml.loop_detection {
            if let Some(enabled) = ld.enabled {
                cfg.loop_detection.enabled = enabled;
            }
            if let Some(v) = ld.max_repeats {
                cfg.loop_detection.max_repeats = v.max(1);
            }
            if let Some(v) = ld.window_size {
                cfg.loop_detection.window_size = v.max(1);
            }
            if let Some(v) = ld.cooldown_ms {
                cfg.loop_detection.cooldown_ms = v;
            }
            if let Some(v) = ld.max_turns {
                cfg.loop_detection.max_turns = v.max(1);
            }
            if let Some(v) = ld.similarity_threshold {
                cfg.loop_detection.similarity_threshold = v.clamp(0.0, 1.0);
            }
        }
        if let Some(ad) = yaml.anomaly_detection {
            if let Some(enabled) = ad.enabled {
                cfg.anomaly_detection.enabled = enabled;
            }
            if let Some(v) = ad.learning_commands {
                cfg.anomaly_detection.learning_commands = v;
            }
            if let Some([start, end]) = ad.working_hours {
                cfg.anomaly_detection.working_hours = (start.min(24), end.min(24));
            }
            if let Some(v) = ad.max_per_minute {
                cfg.anomaly_detection.max_per_minute = v.max(1);
            }
        }
        if let Some(os) = yaml.output_scanning {
            if let Some(enabled) = os.enabled {
                cfg.output_scanning.enabled = enabled;
            }
            if let Some(v) = os.max_output_length {
                cfg.output_scanning.max_output_length = v;
            }
        }
        if let Some(undo) = yaml.undo {
            if let Some(enabled) = undo.enabled {
                cfg.undo.enabled = enabled;
            }
            if let Some(v) = undo.ttl_hours {
                cfg.undo.ttl_hours = v;
            }
        }
        if let Some(store) = yaml.store {
            if let Some(v) = store.fail_closed {
                cfg.store.fail_closed = v;
            }
        }
        if let Some(egress) = yaml.egress {
            cfg.egress.allow = egress.allow;
            cfg.egress.patterns = egress.patterns;
        }

        cfg
    }

    /// Parse a config file. Returns an error for the caller to log; the
    /// caller is expected to fall back to [`Config::default`].
    pub fn parse_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let yaml: ConfigYaml =
            serde_yaml::from_str(&text).map_err(|source| BashBrosErr::ConfigParse {
                path: path.display().to_string(),
                source,
            })?;
        let mut cfg = Self::from_yaml(yaml);
        cfg.source_path = Some(path.to_path_buf());
        Ok(cfg)
    }

    /// Discover and load the config for `cwd`: walk up looking for
    /// `.bashbros.yml` / `.bashbros.yaml`, then fall back to
    /// `~/.bashbros/config.yml`, then to defaults. Never fails.
    pub fn discover(cwd: &Path) -> Self {
        match find_config_file(cwd) {
            Some(path) => match Self::parse_file(&path) {
                Ok(cfg) => cfg,
                Err(err) => {
                    error!(path = %path.display(), %err, "config parse failed; using defaults");
                    Self::default()
                }
            },
            None => Self::default(),
        }
    }
}

/// Walk up from `cwd` to the filesystem root looking for a project config,
/// then check the user-level config.
pub fn find_config_file(cwd: &Path) -> Option<PathBuf> {
    let mut dir = Some(cwd);
    while let Some(d) = dir {
        for name in CONFIG_FILENAMES {
            let candidate = d.join(name);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
        dir = d.parent();
    }

    let user = bashbros_home().join(USER_CONFIG_FILENAME);
    user.is_file().then_some(user)
}

/// `~/.bashbros`, without creating it.
pub fn bashbros_home() -> PathBuf {
    if let Ok(dir) = std::env::var("BASHBROS_HOME") {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".bashbros")
}

/// `~/.bashbros`, created with mode 0700 on Unix if missing.
pub fn ensure_bashbros_home() -> Result<PathBuf> {
    let home = bashbros_home();
    if !home.is_dir() {
        fs::create_dir_all(&home)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o700);
            if let Err(err) = fs::set_permissions(&home, perms) {
                warn!(path = %home.display(), %err, "could not restrict state dir permissions");
            }
        }
    }
    Ok(home)
}

/// Default database path under the state dir.
pub fn default_db_path() -> PathBuf {
    bashbros_home().join(DB_FILENAME)
}

/// Append a command to the `commands.allow` list of the on-disk config,
/// creating a minimal file when none exists yet. Backs `gate`'s
/// allow-persistent choice.
pub fn append_allow_rule(config: &Config, command: &str) -> Result<PathBuf> {
    let path = match &config.source_path {
        Some(path) => path.clone(),
        None => ensure_bashbros_home()?.join(USER_CONFIG_FILENAME),
    };

    let mut doc: serde_yaml::Mapping = if path.is_file() {
        let text = fs::read_to_string(&path)?;
        serde_yaml::from_str(&text).map_err(|source| BashBrosErr::ConfigParse {
            path: path.display().to_string(),
            source,
        })?
    } else {
        serde_yaml::Mapping::new()
    };

    let commands = doc
        .entry(serde_yaml::Value::from("commands"))
        .or_insert_with(|| serde_yaml::Value::Mapping(serde_yaml::Mapping::new()));
    let Some(commands) = commands.as_mapping_mut() else {
        return Err(BashBrosErr::UnknownCode {
            kind: "config section",
            code: "commands is not a mapping".to_string(),
        });
    };
    let allow = commands
        .entry(serde_yaml::Value::from("allow"))
        .or_insert_with(|| serde_yaml::Value::Sequence(Vec::new()));
    let Some(allow) = allow.as_sequence_mut() else {
        return Err(BashBrosErr::UnknownCode {
            kind: "config section",
            code: "commands.allow is not a list".to_string(),
        });
    };
    let value = serde_yaml::Value::from(command);
    if !allow.contains(&value) {
        allow.push(value);
    }

    let rendered = serde_yaml::to_string(&doc).map_err(|source| BashBrosErr::ConfigParse {
        path: path.display().to_string(),
        source,
    })?;
    fs::write(&path, rendered)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn defaults_are_balanced() {
        let cfg = Config::default();
        assert_eq!(cfg.risk_scoring.block_threshold, 8);
        assert_eq!(cfg.rate_limit.max_per_minute, 30);
        assert_eq!(cfg.loop_detection.max_repeats, 3);
        assert_eq!(cfg.anomaly_detection.working_hours, (0, 24));
        assert!(!cfg.store.fail_closed);
    }

    #[test]
    fn strict_profile_tightens_thresholds() {
        let cfg = Config::for_profile(Profile::Strict);
        assert_eq!(cfg.risk_scoring.block_threshold, 6);
        assert_eq!(cfg.rate_limit.max_per_minute, 20);
    }

    #[test]
    fn yaml_overrides_merge_over_profile() {
        let yaml: ConfigYaml = serde_yaml::from_str(
            r#"
agent: claude
profile: strict
commands:
  block: ["rm -rf *"]
rateLimit:
  maxPerMinute: 5
store:
  failClosed: true
"#,
        )
        .unwrap();
        let cfg = Config::from_yaml(yaml);
        assert_eq!(cfg.agent, "claude");
        assert_eq!(cfg.profile, Profile::Strict);
        assert_eq!(cfg.commands.block, vec!["rm -rf *".to_string()]);
        assert_eq!(cfg.rate_limit.max_per_minute, 5);
        // Untouched strict default survives.
        assert_eq!(cfg.rate_limit.max_per_hour, 300);
        assert!(cfg.store.fail_closed);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let parsed: std::result::Result<ConfigYaml, _> =
            serde_yaml::from_str("rateLimits: {maxPerMinute: 5}");
        assert!(parsed.is_err());
    }

    #[test]
    fn discover_walks_up_and_falls_back_to_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a/b/c");
        fs::create_dir_all(&nested).unwrap();
        fs::write(tmp.path().join(".bashbros.yml"), "agent: aider\n").unwrap();

        let cfg = Config::discover(&nested);
        assert_eq!(cfg.agent, "aider");
        assert_eq!(
            cfg.source_path.as_deref(),
            Some(tmp.path().join(".bashbros.yml").as_path())
        );
    }

    #[test]
    fn broken_config_falls_back_to_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join(".bashbros.yml"), "agent: [unclosed\n").unwrap();
        let cfg = Config::discover(tmp.path());
        assert_eq!(cfg.agent, "unknown");
    }

    #[test]
    fn append_allow_rule_creates_and_deduplicates() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(".bashbros.yml");
        fs::write(&path, "agent: claude\n").unwrap();
        let mut cfg = Config::parse_file(&path).unwrap();
        cfg.source_path = Some(path.clone());

        append_allow_rule(&cfg, "make test").unwrap();
        append_allow_rule(&cfg, "make test").unwrap();

        let reloaded = Config::parse_file(&path).unwrap();
        assert_eq!(reloaded.commands.allow, vec!["make test".to_string()]);
    }
}
