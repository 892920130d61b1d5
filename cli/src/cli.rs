use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;

/// Security gateway and observability plane for AI coding agents.
#[derive(Parser, Debug)]
#[command(name = "bashbros", version)]
pub struct Cli {
    /// Override the database path (defaults to ~/.bashbros/dashboard.db).
    #[arg(long, global = true, value_name = "FILE")]
    pub db: Option<PathBuf>,

    /// Session id; falls back to MOLTBOT_SESSION_ID / CLAUDE_SESSION_ID.
    #[arg(long, global = true, value_name = "ID")]
    pub session_id: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Evaluate a command before execution. Exits 0 when allowed, 2 when
    /// denied by policy; the denial reason goes to stderr.
    Gate {
        /// Never prompt, even when stderr is a terminal.
        #[arg(long, default_value_t = false)]
        no_interactive: bool,

        /// The command line to evaluate.
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        command: Vec<String>,
    },

    /// Record a completed command (post-execution). Always exits 0.
    Record {
        /// Captured output, scanned for leaked secrets.
        #[arg(long)]
        output: Option<String>,

        #[arg(long)]
        exit_code: Option<i32>,

        #[arg(long, value_name = "MS")]
        duration_ms: Option<i64>,

        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        command: Vec<String>,
    },

    /// Record a tool invocation from the CLAUDE_HOOK_EVENT payload (or
    /// stdin when the variable is unset). Always exits 0.
    RecordTool,

    /// Record a user prompt. Always exits 0.
    RecordPrompt {
        #[arg(trailing_var_arg = true, required = true)]
        prompt: Vec<String>,
    },

    /// List active sessions.
    Sessions,

    /// Aggregate stats, XP, and achievement progress.
    Stats,

    /// Security summary: risk distribution, violations, recent blocks.
    Summary,

    /// Egress review queue operations.
    #[command(subcommand)]
    Egress(EgressCommand),

    /// Delete rows older than the retention window.
    Cleanup {
        #[arg(long, default_value_t = 30)]
        days: u32,
    },
}

#[derive(Subcommand, Debug)]
pub enum EgressCommand {
    /// List pending egress blocks awaiting review.
    Pending,

    /// Approve a pending block.
    Approve {
        id: i64,
        /// Reviewer identity recorded with the decision.
        #[arg(long, value_name = "NAME")]
        by: String,
    },

    /// Deny a pending block.
    Deny {
        id: i64,
        #[arg(long, value_name = "NAME")]
        by: String,
    },

    /// Dry-run the inspector against content; nothing is persisted.
    Test {
        content: String,
    },

    /// Inspect an outbound payload, persisting a pending block when the
    /// content is denied.
    Inspect {
        content: String,
        #[arg(long)]
        connector: Option<String>,
        #[arg(long)]
        destination: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn gate_collects_trailing_command_words() {
        let cli = Cli::try_parse_from(["bashbros", "gate", "ls", "-la", "/tmp"]).unwrap();
        match cli.command {
            Command::Gate { command, .. } => assert_eq!(command, vec!["ls", "-la", "/tmp"]),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn global_flags_parse_before_subcommand() {
        let cli =
            Cli::try_parse_from(["bashbros", "--session-id", "s1", "gate", "ls"]).unwrap();
        assert_eq!(cli.session_id.as_deref(), Some("s1"));
    }
}
