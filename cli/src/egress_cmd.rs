//! Egress review queue commands: list, approve, deny, and the two
//! inspector entry points (`test` never persists, `inspect` does).

use anyhow::Context as _;
use anyhow::Result;
use bashbros_core::Config;
use bashbros_core::EgressInspector;
use bashbros_core::patterns::PatternLibrary;
use bashbros_core::protocol::EgressReport;

use crate::Context;
use crate::cli::EgressCommand;

pub(crate) fn run(ctx: &Context, command: EgressCommand) -> Result<()> {
    match command {
        EgressCommand::Pending => {
            let store = ctx.open_store().context("opening session store")?;
            let pending = store.get_pending_blocks()?;
            if pending.is_empty() {
                println!("No pending egress blocks.");
                return Ok(());
            }
            for block in pending {
                println!(
                    "#{} [{}] {} -> {}  {}",
                    block.id,
                    block.timestamp,
                    block.connector.as_deref().unwrap_or("-"),
                    block.destination.as_deref().unwrap_or("-"),
                    block.redacted_text
                );
            }
        }
        EgressCommand::Approve { id, by } => {
            let store = ctx.open_store().context("opening session store")?;
            if store.approve_block(id, &by)? {
                println!("Approved egress block #{id}.");
            } else {
                println!("Egress block #{id} was already decided; nothing changed.");
            }
        }
        EgressCommand::Deny { id, by } => {
            let store = ctx.open_store().context("opening session store")?;
            if store.deny_block(id, &by)? {
                println!("Denied egress block #{id}.");
            } else {
                println!("Egress block #{id} was already decided; nothing changed.");
            }
        }
        EgressCommand::Test { content } => {
            let config = Config::discover(&ctx.cwd);
            let inspector = EgressInspector::new(&config.egress, PatternLibrary::shared());
            print_report(&inspector.test(&content));
        }
        EgressCommand::Inspect {
            content,
            connector,
            destination,
        } => {
            let config = Config::discover(&ctx.cwd);
            let store = ctx.open_store().context("opening session store")?;
            let inspector = EgressInspector::new(&config.egress, PatternLibrary::shared());
            let report = inspector.inspect(
                &content,
                connector.as_deref(),
                destination.as_deref(),
                Some(&store),
            );
            print_report(&report);
            if let Some(id) = report.block_id {
                println!("Recorded pending egress block #{id}.");
            }
        }
    }
    Ok(())
}

fn print_report(report: &EgressReport) {
    if report.allowlisted {
        println!("allowlisted");
        return;
    }
    println!("{}", if report.blocked { "BLOCKED" } else { "ok" });
    for m in &report.matches {
        println!(
            "  {} [{} / {}] action={}",
            m.pattern_name,
            m.category,
            m.severity.as_str(),
            m.action.as_str()
        );
    }
    if !report.matches.is_empty() {
        println!("redacted: {}", report.redacted);
    }
}
