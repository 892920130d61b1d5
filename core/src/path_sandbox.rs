//! Path allow/block testing over lexically normalized paths, plus the
//! heuristic that extracts path-like tokens from a command line.
//!
//! Normalization expands a leading `~`, resolves `.` and `..` without
//! touching the filesystem, and absolutizes against the configured cwd, so
//! a path that does not exist yet is still comparable.

use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

use crate::config::PathRules;
use crate::protocol::Severity;
use crate::protocol::Violation;
use crate::protocol::ViolationType;

#[derive(Debug)]
pub struct PathSandbox {
    allow: Vec<PathBuf>,
    block: Vec<PathBuf>,
    allow_by_default: bool,
    cwd: PathBuf,
    home: Option<PathBuf>,
}

impl PathSandbox {
    pub fn new(rules: &PathRules, cwd: PathBuf) -> Self {
        let home = dirs::home_dir();
        let allow_by_default =
            rules.allow.is_empty() || rules.allow.iter().any(|p| p.trim() == "*");
        let normalize_rule =
            |raw: &String| normalize_path(raw, &cwd, home.as_deref());
        Self {
            allow: rules.allow.iter().filter(|p| p.trim() != "*").map(normalize_rule).collect(),
            block: rules.block.iter().map(normalize_rule).collect(),
            allow_by_default,
            cwd,
            home,
        }
    }

    /// Test one path. Block entries are prefix-tested first; membership in
    /// the allow set (or `*`) is confirmed second.
    pub fn check(&self, raw: &str) -> Option<Violation> {
        let path = normalize_path(raw, &self.cwd, self.home.as_deref());

        if let Some(blocked) = self.block.iter().find(|b| path.starts_with(b)) {
            return Some(
                Violation::new(
                    ViolationType::Path,
                    blocked.display().to_string(),
                    format!("path `{raw}` is inside blocked tree `{}`", blocked.display()),
                    Severity::High,
                )
                .with_remediation("Operate on files inside the allowed project paths"),
            );
        }

        if self.allow_by_default || self.allow.iter().any(|a| path.starts_with(a)) {
            return None;
        }

        Some(
            Violation::new(
                ViolationType::Path,
                "allow_list",
                format!("path `{raw}` is outside the allowed paths"),
                Severity::Medium,
            )
            .with_remediation(format!("add `{raw}` (or a parent) to paths.allow")),
        )
    }
}

/// Expand `~`, absolutize against `cwd`, and resolve `.`/`..` lexically.
pub fn normalize_path(raw: &str, cwd: &Path, home: Option<&Path>) -> PathBuf {
    let raw = raw.trim();
    let expanded: PathBuf = if raw == "~" {
        home.map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from(raw))
    } else if let Some(rest) = raw.strip_prefix("~/") {
        match home {
            Some(h) => h.join(rest),
            None => PathBuf::from(raw),
        }
    } else if raw == "." {
        cwd.to_path_buf()
    } else {
        PathBuf::from(raw)
    };

    let absolute = if expanded.is_absolute() {
        expanded
    } else {
        cwd.join(expanded)
    };

    // Remove `.` and resolve `..` without touching the filesystem.
    let mut out = PathBuf::new();
    for comp in absolute.components() {
        match comp {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Extract path-like tokens from a command: whitespace-split tokens that
/// are not flags and either start with `/`, `./`, `../`, `~/` or contain a
/// period. A heuristic; the occasional false positive is accepted to stay
/// shell-grammar-independent.
pub fn extract_paths(command: &str) -> Vec<&str> {
    command
        .split_whitespace()
        .filter(|token| !token.starts_with('-'))
        .filter(|token| {
            token.starts_with('/')
                || token.starts_with("./")
                || token.starts_with("../")
                || token.starts_with("~/")
                || token.contains('.')
        })
        .collect()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use pretty_assertions::assert_eq;

    use super::*;

    fn sandbox(allow: &[&str], block: &[&str]) -> PathSandbox {
        PathSandbox::new(
            &PathRules {
                allow: allow.iter().map(|s| s.to_string()).collect(),
                block: block.iter().map(|s| s.to_string()).collect(),
            },
            PathBuf::from("/work/project"),
        )
    }

    #[test]
    fn normalization_resolves_dots() {
        let cwd = Path::new("/work/project");
        assert_eq!(
            normalize_path("./src/../Cargo.toml", cwd, None),
            PathBuf::from("/work/project/Cargo.toml")
        );
        assert_eq!(normalize_path(".", cwd, None), PathBuf::from("/work/project"));
        assert_eq!(
            normalize_path("~/notes.txt", cwd, Some(Path::new("/home/dev"))),
            PathBuf::from("/home/dev/notes.txt")
        );
    }

    #[test]
    fn block_prefix_beats_allow() {
        let sb = sandbox(&["*"], &["/etc"]);
        let violation = sb.check("/etc/passwd").unwrap();
        assert_eq!(violation.kind, ViolationType::Path);
        assert_eq!(violation.severity, Severity::High);
        assert!(sb.check("/work/project/src/main.rs").is_none());
    }

    #[test]
    fn allow_miss_outside_listed_trees() {
        let sb = sandbox(&["/work/project"], &[]);
        assert!(sb.check("./src/lib.rs").is_none());
        let violation = sb.check("/var/log/syslog").unwrap();
        assert_eq!(violation.severity, Severity::Medium);
    }

    #[test]
    fn traversal_cannot_escape_block() {
        let sb = sandbox(&["*"], &["/etc"]);
        assert!(sb.check("/tmp/../etc/shadow").is_some());
    }

    #[test]
    fn extracts_path_like_tokens_only() {
        assert_eq!(
            extract_paths("cat /etc/passwd ./notes.txt --verbose -n file"),
            vec!["/etc/passwd", "./notes.txt"]
        );
        assert_eq!(extract_paths("cp ../a.txt ~/b.txt"), vec!["../a.txt", "~/b.txt"]);
        assert!(extract_paths("ls -la").is_empty());
        // Dotted tokens count as paths even without a separator.
        assert_eq!(extract_paths("python setup.py"), vec!["setup.py"]);
    }
}
