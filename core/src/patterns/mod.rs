//! Process-wide, immutable pattern bundle loaded at startup.
//!
//! All regexes are compiled once; evaluation is linear in pattern count.
//! The bundle is read-copy: readers clone an `Arc`, writers replace the
//! whole set atomically, so adding a pattern never invalidates an
//! in-flight evaluation.

use std::sync::Arc;
use std::sync::OnceLock;
use std::sync::RwLock;

use regex::Regex;
use regex::RegexBuilder;
use tracing::warn;

use crate::protocol::Severity;

pub mod egress;
pub mod risk;
pub mod secrets;
pub mod signatures;

pub use egress::EgressCategory;
pub use egress::EgressPattern;
pub use risk::RiskFamily;
pub use risk::RiskPattern;
pub use secrets::SecretPatterns;
pub use signatures::AgentSignature;

/// A compiled regex with the metadata shared by the secrets and output
/// scanning families.
#[derive(Debug, Clone)]
pub struct NamedPattern {
    pub name: String,
    pub regex: Regex,
    pub severity: Severity,
}

/// Compile `pattern`, logging and skipping on failure. Built-in tables are
/// expected to always compile; user-supplied custom patterns may not, and a
/// bad custom pattern must not take the evaluator down.
pub(crate) fn compile(pattern: &str, case_insensitive: bool) -> Option<Regex> {
    match RegexBuilder::new(pattern)
        .case_insensitive(case_insensitive)
        .build()
    {
        Ok(re) => Some(re),
        Err(err) => {
            warn!(pattern, %err, "skipping unparseable pattern");
            None
        }
    }
}

/// The four pattern families, compiled.
#[derive(Debug)]
pub struct PatternLibrary {
    pub risk: Vec<RiskPattern>,
    pub secrets: SecretPatterns,
    pub egress: Vec<EgressPattern>,
    pub signatures: Vec<AgentSignature>,
}

impl PatternLibrary {
    /// Compile the built-in tables.
    pub fn builtin() -> Self {
        Self {
            risk: risk::builtin(),
            secrets: secrets::builtin(),
            egress: egress::builtin(),
            signatures: signatures::builtin(),
        }
    }

    /// The shared process-wide bundle. First call compiles the built-ins.
    pub fn shared() -> Arc<PatternLibrary> {
        let slot = library_slot();
        match slot.read() {
            Ok(guard) => Arc::clone(&guard),
            // A poisoned lock still holds a valid Arc.
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Atomically replace the shared bundle. In-flight evaluations keep the
    /// `Arc` they already cloned.
    pub fn install(library: PatternLibrary) {
        let slot = library_slot();
        let next = Arc::new(library);
        match slot.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }
}

fn library_slot() -> &'static RwLock<Arc<PatternLibrary>> {
    static LIBRARY: OnceLock<RwLock<Arc<PatternLibrary>>> = OnceLock::new();
    LIBRARY.get_or_init(|| RwLock::new(Arc::new(PatternLibrary::builtin())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_tables_compile() {
        let lib = PatternLibrary::builtin();
        assert!(lib.risk.len() >= 70, "risk table unexpectedly small");
        assert!(!lib.secrets.dangerous_commands.is_empty());
        assert!(!lib.secrets.secret_values.is_empty());
        assert!(!lib.egress.is_empty());
        assert!(!lib.signatures.is_empty());
    }

    #[test]
    fn install_swaps_whole_set() {
        let before = PatternLibrary::shared();
        PatternLibrary::install(PatternLibrary::builtin());
        let after = PatternLibrary::shared();
        // The old Arc is still usable by holders.
        assert!(!before.risk.is_empty());
        assert!(!after.risk.is_empty());
    }

    #[test]
    fn bad_custom_pattern_is_skipped() {
        assert!(compile(r"(unclosed", false).is_none());
        assert!(compile(r"ok.*", false).is_some());
    }
}
