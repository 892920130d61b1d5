//! Post-execution recording hooks: `record`, `record-tool`, and
//! `record-prompt`. All three are best-effort: store failures are logged
//! with the `[BashBros]` prefix and swallowed so the agent's turn is never
//! broken, and always exit 0.

use std::io::Read;

use bashbros_core::Config;
use bashbros_core::OutputScanner;
use bashbros_core::patterns::PatternLibrary;
use bashbros_core::protocol::Violation;
use bashbros_core::protocol::ViolationType;
use bashbros_core::risk::RiskScorer;
use bashbros_core::store::CommandRecord;
use bashbros_core::store::ToolUseRecord;
use serde_json::Value;

use crate::Context;
use crate::EXIT_ALLOWED;

/// Environment variable carrying the host agent's tool event payload.
const HOOK_EVENT_VAR: &str = "CLAUDE_HOOK_EVENT";

pub(crate) fn run_record(
    ctx: &Context,
    command: &str,
    output: Option<&str>,
    exit_code: Option<i32>,
    duration_ms: Option<i64>,
) -> u8 {
    let config = Config::discover(&ctx.cwd);
    let library = PatternLibrary::shared();
    let risk = RiskScorer::new(&config.risk_scoring, library.clone()).score(command);

    // Scan captured output for leaked secrets; a leak becomes an `output`
    // violation on the recorded row (the command already ran, so the row
    // stays allowed).
    let mut violations: Vec<Violation> = Vec::new();
    if let Some(output) = output {
        let report = OutputScanner::new(config.output_scanning.clone(), library).scan(output);
        for finding in &report.findings {
            violations.push(Violation::new(
                ViolationType::Output,
                finding.pattern.clone(),
                format!(
                    "output line {} leaked a {} value ({})",
                    finding.line, finding.pattern, finding.redacted
                ),
                finding.severity,
            ));
        }
    }
    if let Some(code) = exit_code {
        tracing::debug!(code, "recording completed command");
    }

    let store = match ctx.open_store() {
        Ok(store) => store,
        Err(err) => {
            eprintln!("[BashBros] Error recording command: {err}");
            return EXIT_ALLOWED;
        }
    };

    if let Some(session_id) = &ctx.session_id {
        if let Err(err) = store.insert_session_with_id(
            session_id,
            &config.agent,
            Some(i64::from(std::process::id())),
            ctx.cwd.to_str(),
            None,
        ) {
            eprintln!("[BashBros] Error recording session: {err}");
        }
    }

    let record = CommandRecord {
        session_id: ctx.session_id.as_deref(),
        command,
        allowed: true,
        risk_score: risk.score,
        risk_level: risk.level,
        risk_factors: &risk.factors,
        duration_ms,
        violations: &violations,
    };
    if let Err(err) = store.insert_command(&record) {
        eprintln!("[BashBros] Error recording command: {err}");
        return EXIT_ALLOWED;
    }
    if let Some(session_id) = &ctx.session_id {
        if let Err(err) = store.increment_session_command(session_id, false, risk.score) {
            eprintln!("[BashBros] Error recording session counters: {err}");
        }
    }

    EXIT_ALLOWED
}

pub(crate) fn run_record_tool(ctx: &Context) -> u8 {
    let payload = match read_hook_event() {
        Some(payload) => payload,
        None => {
            eprintln!("[BashBros] Error recording tool use: no {HOOK_EVENT_VAR} payload");
            return EXIT_ALLOWED;
        }
    };

    let event: Value = match serde_json::from_str(&payload) {
        Ok(event) => event,
        Err(err) => {
            eprintln!("[BashBros] Error recording tool use: bad event JSON: {err}");
            return EXIT_ALLOWED;
        }
    };

    let tool_name = event["tool_name"].as_str().unwrap_or("unknown").to_string();
    let tool_input = stringify(&event["tool_input"]);
    let tool_output = stringify(&event["tool_output"]);
    let exit_code = event["exit_code"].as_i64();
    let success = match &event["success"] {
        Value::Bool(b) => Some(*b),
        _ => exit_code.map(|c| c == 0),
    };
    let cwd = event["cwd"].as_str().map(str::to_string);
    let repo = event["repo"].as_str().map(str::to_string);
    let session_id = ctx
        .session_id
        .clone()
        .or_else(|| event["session_id"].as_str().map(str::to_string));

    let store = match ctx.open_store() {
        Ok(store) => store,
        Err(err) => {
            eprintln!("[BashBros] Error recording tool use: {err}");
            return EXIT_ALLOWED;
        }
    };
    let record = ToolUseRecord {
        tool_name: &tool_name,
        tool_input: &tool_input,
        tool_output: &tool_output,
        exit_code,
        success,
        cwd: cwd.as_deref().or(ctx.cwd.to_str()),
        repo_name: repo.as_deref(),
        repo_path: None,
        session_id: session_id.as_deref(),
    };
    if let Err(err) = store.insert_tool_use(&record) {
        eprintln!("[BashBros] Error recording tool use: {err}");
    }

    EXIT_ALLOWED
}

pub(crate) fn run_record_prompt(ctx: &Context, prompt: &str) -> u8 {
    let store = match ctx.open_store() {
        Ok(store) => store,
        Err(err) => {
            eprintln!("[BashBros] Error recording prompt: {err}");
            return EXIT_ALLOWED;
        }
    };
    if let Err(err) = store.insert_user_prompt(ctx.session_id.as_deref(), prompt, ctx.cwd.to_str())
    {
        eprintln!("[BashBros] Error recording prompt: {err}");
    }
    EXIT_ALLOWED
}

/// The event comes through the environment by convention; stdin is the
/// fallback for agents that pipe instead.
fn read_hook_event() -> Option<String> {
    if let Ok(payload) = std::env::var(HOOK_EVENT_VAR) {
        if !payload.trim().is_empty() {
            return Some(payload);
        }
    }
    let mut buffer = String::new();
    match std::io::stdin().read_to_string(&mut buffer) {
        Ok(n) if n > 0 && !buffer.trim().is_empty() => Some(buffer),
        _ => None,
    }
}

/// Tool inputs may be strings or structured JSON; store structured values
/// as compact JSON text.
fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
