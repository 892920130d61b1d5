//! Entry points for the `bashbros` multitool.
//!
//! Exit-code convention: 0 permitted, 2 denied by policy, 1 CLI usage
//! error, 3 internal error on the admin surfaces. The hook subcommands
//! (`gate`, `record`, `record-tool`, `record-prompt`) never exit non-zero
//! for infrastructure failures: a broken store must not wedge the host
//! agent's turn.

mod cli;
mod egress_cmd;
mod gate;
mod record;
mod stats_cmd;

use std::path::PathBuf;

pub use cli::Cli;
use cli::Command;
use tracing_subscriber::EnvFilter;

pub const EXIT_ALLOWED: u8 = 0;
pub const EXIT_USAGE: u8 = 1;
pub const EXIT_DENIED: u8 = 2;
pub const EXIT_INTERNAL: u8 = 3;

/// Shared context resolved from global flags and the environment.
pub(crate) struct Context {
    pub db_path: Option<PathBuf>,
    pub session_id: Option<String>,
    pub cwd: PathBuf,
}

impl Context {
    fn from_cli(cli: &Cli) -> Self {
        let session_id = cli
            .session_id
            .clone()
            .or_else(|| std::env::var("MOLTBOT_SESSION_ID").ok())
            .or_else(|| std::env::var("CLAUDE_SESSION_ID").ok())
            .filter(|s| !s.is_empty());
        Self {
            db_path: cli.db.clone(),
            session_id,
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    pub(crate) fn open_store(&self) -> bashbros_core::Result<bashbros_core::SessionStore> {
        match &self.db_path {
            Some(path) => bashbros_core::SessionStore::open(path),
            None => bashbros_core::SessionStore::open_default(),
        }
    }
}

pub fn run_main(cli: Cli) -> u8 {
    init_logging();
    let ctx = Context::from_cli(&cli);

    match cli.command {
        Command::Gate {
            no_interactive,
            command,
        } => gate::run(&ctx, &command.join(" "), no_interactive),
        Command::Record {
            output,
            exit_code,
            duration_ms,
            command,
        } => record::run_record(
            &ctx,
            &command.join(" "),
            output.as_deref(),
            exit_code,
            duration_ms,
        ),
        Command::RecordTool => record::run_record_tool(&ctx),
        Command::RecordPrompt { prompt } => record::run_record_prompt(&ctx, &prompt.join(" ")),
        Command::Sessions => admin(stats_cmd::run_sessions(&ctx)),
        Command::Stats => admin(stats_cmd::run_stats(&ctx)),
        Command::Summary => admin(stats_cmd::run_summary(&ctx)),
        Command::Egress(cmd) => admin(egress_cmd::run(&ctx, cmd)),
        Command::Cleanup { days } => admin(stats_cmd::run_cleanup(&ctx, days)),
    }
}

fn admin(result: anyhow::Result<()>) -> u8 {
    match result {
        Ok(()) => EXIT_ALLOWED,
        Err(err) => {
            eprintln!("bashbros: {err:#}");
            EXIT_INTERNAL
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .try_init();
}
