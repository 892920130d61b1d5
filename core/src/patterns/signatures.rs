//! Signatures for known coding agents, used by exposure scans to attribute
//! a listening port to the agent that opened it.

/// Static profile of one known agent.
#[derive(Debug, Clone)]
pub struct AgentSignature {
    /// Canonical agent tag, e.g. `claude-code`.
    pub name: &'static str,
    /// Process names the agent runs under.
    pub process_names: &'static [&'static str],
    /// Ports the agent binds by default.
    pub default_ports: &'static [u16],
    /// Config paths (relative to `$HOME`) whose presence identifies the agent.
    pub config_paths: &'static [&'static str],
    /// Substrings in an HTTP banner or config that indicate auth is enabled.
    pub auth_indicators: &'static [&'static str],
}

const SIGNATURES: &[AgentSignature] = &[
    AgentSignature {
        name: "claude-code",
        process_names: &["claude", "claude-code"],
        default_ports: &[],
        config_paths: &[".claude", ".claude.json"],
        auth_indicators: &["x-api-key", "authorization"],
    },
    AgentSignature {
        name: "aider",
        process_names: &["aider"],
        default_ports: &[8501],
        config_paths: &[".aider.conf.yml"],
        auth_indicators: &["api-key"],
    },
    AgentSignature {
        name: "moltbot",
        process_names: &["moltbot", "molt"],
        default_ports: &[18789],
        config_paths: &[".moltbot"],
        auth_indicators: &["token", "authorization"],
    },
    AgentSignature {
        name: "openhands",
        process_names: &["openhands"],
        default_ports: &[3000],
        config_paths: &[".openhands"],
        auth_indicators: &["session_api_key"],
    },
    AgentSignature {
        name: "continue",
        process_names: &["continue"],
        default_ports: &[65432],
        config_paths: &[".continue"],
        auth_indicators: &["apiKey"],
    },
    AgentSignature {
        name: "ollama",
        process_names: &["ollama"],
        default_ports: &[11434],
        config_paths: &[".ollama"],
        auth_indicators: &["authorization"],
    },
];

pub fn builtin() -> Vec<AgentSignature> {
    SIGNATURES.to_vec()
}

/// Look up a signature by process name.
pub fn for_process(process: &str) -> Option<&'static AgentSignature> {
    SIGNATURES
        .iter()
        .find(|sig| sig.process_names.iter().any(|p| process.starts_with(p)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_processes_resolve() {
        assert_eq!(for_process("claude").map(|s| s.name), Some("claude-code"));
        assert_eq!(for_process("ollama").map(|s| s.name), Some("ollama"));
        assert!(for_process("postgres").is_none());
    }
}
