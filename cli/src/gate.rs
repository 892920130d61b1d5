//! The `gate` hook: evaluate one command, persist the outcome, and decide
//! the exit code. Called by host agents on every shell tool invocation, so
//! the hot path is one config read, one store open, and one evaluation.

use std::io::BufRead;
use std::io::IsTerminal;
use std::io::Write;

use bashbros_core::Config;
use bashbros_core::PolicyEngine;
use bashbros_core::SessionStore;
use bashbros_core::config::append_allow_rule;
use bashbros_core::protocol::Violation;
use bashbros_core::store::CommandRecord;
use tracing::debug;
use tracing::warn;

use crate::Context;
use crate::EXIT_ALLOWED;
use crate::EXIT_DENIED;

pub(crate) fn run(ctx: &Context, command: &str, no_interactive: bool) -> u8 {
    let config = Config::discover(&ctx.cwd);
    let fail_closed = config.store.fail_closed;

    let store = match ctx.open_store() {
        Ok(store) => store,
        Err(err) => {
            // The hook must not wedge the agent. Fail open by default;
            // `store.failClosed` trades availability for security.
            if fail_closed {
                eprintln!("Blocked: session store unavailable ({err})");
                return EXIT_DENIED;
            }
            eprintln!("[BashBros] Warning: session store unavailable, allowing without audit ({err})");
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
            warn!(%err, "could not ensure session row");
        }
    }

    let mut engine = PolicyEngine::new(config.clone(), ctx.cwd.clone());
    if let Some(session_id) = &ctx.session_id {
        match store.get_session_allowlist(session_id) {
            Ok(patterns) => engine.set_session_allowlist(&patterns),
            Err(err) => warn!(%err, "could not load session allowlist"),
        }
    }
    // Cross-process loop awareness: seed the window from the store.
    match store.get_recent_command_texts(config.loop_detection.window_size) {
        Ok(recent) => engine.seed_loop_window(&recent),
        Err(err) => warn!(%err, "could not seed loop window"),
    }

    let eval = engine.evaluate(command);
    debug!(score = eval.risk.score, violations = eval.violations.len(), "evaluated");

    let mut allowed = eval.allowed();
    if !allowed {
        print_violations(&eval.violations);
        if !no_interactive && std::io::stderr().is_terminal() {
            match prompt_decision(command) {
                Decision::AllowOnce => allowed = true,
                Decision::AllowSession => {
                    allowed = true;
                    if let Some(session_id) = &ctx.session_id {
                        if let Err(err) = store.add_session_allow(session_id, command) {
                            warn!(%err, "could not persist session allow rule");
                        }
                    } else {
                        eprintln!("[BashBros] No session id; allow-session applies to this call only");
                    }
                }
                Decision::AllowPersistent => {
                    allowed = true;
                    match append_allow_rule(&config, command) {
                        Ok(path) => eprintln!("[BashBros] Added to commands.allow in {}", path.display()),
                        Err(err) => eprintln!("[BashBros] Could not update config: {err}"),
                    }
                }
                Decision::Deny => {}
            }
        }
    }

    persist(ctx, &store, command, allowed, &eval);

    if allowed {
        EXIT_ALLOWED
    } else {
        let reason = eval
            .violations
            .first()
            .map(|v| v.message.clone())
            .unwrap_or_else(|| "denied by policy".to_string());
        eprintln!("Blocked: {reason}");
        EXIT_DENIED
    }
}

fn persist(
    ctx: &Context,
    store: &SessionStore,
    command: &str,
    allowed: bool,
    eval: &bashbros_core::Evaluation,
) {
    let violations = if allowed {
        eval.audit.clone()
    } else {
        eval.all_violations()
    };
    let record = CommandRecord {
        session_id: ctx.session_id.as_deref(),
        command,
        allowed,
        risk_score: eval.risk.score,
        risk_level: eval.risk.level,
        risk_factors: &eval.risk.factors,
        duration_ms: None,
        violations: &violations,
    };
    if let Err(err) = store.insert_command(&record) {
        eprintln!("[BashBros] Error recording command: {err}");
        return;
    }
    if let Some(session_id) = &ctx.session_id {
        if let Err(err) = store.increment_session_command(session_id, !allowed, eval.risk.score) {
            eprintln!("[BashBros] Error recording session counters: {err}");
        }
    }
}

fn print_violations(violations: &[Violation]) {
    for violation in violations {
        eprintln!(
            "[BashBros] {}/{} ({}): {}",
            violation.kind.as_str(),
            violation.rule,
            violation.severity.as_str(),
            violation.message
        );
        for hint in &violation.remediation {
            eprintln!("[BashBros]   hint: {hint}");
        }
    }
}

enum Decision {
    AllowOnce,
    AllowSession,
    AllowPersistent,
    Deny,
}

/// Interactive prompt shown when stderr is a terminal. Reads one line from
/// stdin; anything unrecognised denies.
fn prompt_decision(command: &str) -> Decision {
    eprintln!("[BashBros] `{command}`");
    eprint!("[BashBros] [a]llow once, allow for [s]ession, allow [p]ersistently, [d]eny? ");
    let _ = std::io::stderr().flush();

    let mut line = String::new();
    let stdin = std::io::stdin();
    if stdin.lock().read_line(&mut line).is_err() {
        return Decision::Deny;
    }
    match line.trim().to_lowercase().as_str() {
        "a" | "allow" => Decision::AllowOnce,
        "s" | "session" => Decision::AllowSession,
        "p" | "persistent" => Decision::AllowPersistent,
        _ => Decision::Deny,
    }
}
