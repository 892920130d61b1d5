//! Read-only admin surfaces over the store: session listing, aggregate
//! stats with achievement progress, the security summary, and the
//! retention sweep.

use anyhow::Context as _;
use anyhow::Result;
use bashbros_core::achievements;
use bashbros_core::achievements::Tier;
use bashbros_core::cost::CostEstimator;

use crate::Context;

pub(crate) fn run_sessions(ctx: &Context) -> Result<()> {
    let store = ctx.open_store().context("opening session store")?;
    let sessions = store.get_active_sessions()?;
    if sessions.is_empty() {
        println!("No active sessions.");
        return Ok(());
    }
    println!(
        "{:<38} {:<12} {:>8} {:>8} {:>9}  {}",
        "SESSION", "AGENT", "CMDS", "BLOCKED", "AVG RISK", "STARTED"
    );
    for session in sessions {
        println!(
            "{:<38} {:<12} {:>8} {:>8} {:>9.2}  {}",
            session.id,
            session.agent,
            session.command_count,
            session.blocked_count,
            session.avg_risk_score,
            session.start_time
        );
    }
    Ok(())
}

pub(crate) fn run_stats(ctx: &Context) -> Result<()> {
    let store = ctx.open_store().context("opening session store")?;
    let stats = store.get_stats()?;
    let progress = achievements::progress(&stats);

    println!("Commands     {:>8}  (today {}, blocked {})", stats.total_commands, stats.commands_today, stats.total_blocked);
    println!("Sessions     {:>8}  ({} active)", stats.total_sessions, stats.active_sessions);
    println!("Tool uses    {:>8}", stats.total_tool_uses);
    println!("Prompts      {:>8}", stats.total_prompts);
    println!("Last 24h     {:>8}  (avg risk {:.2}, high-risk {})", stats.commands_24h, stats.avg_risk_24h, stats.high_risk_24h);
    println!("Clean streak {:>8}", stats.cleanest_streak);
    println!("Egress queue {:>8} pending", stats.pending_egress_blocks);

    // Rough spend estimate from recorded tool traffic. Model is whatever
    // the session env advertises; unknown models use mid-range pricing.
    let model = std::env::var("BASHBROS_MODEL").unwrap_or_default();
    let mut estimator = CostEstimator::new(model);
    for tool_use in store.get_tool_uses(None, 500)? {
        estimator.add_input(&tool_use.tool_input);
        estimator.add_output(&tool_use.tool_output);
        estimator.record_tool_call();
    }
    let estimate = estimator.estimate();
    if estimate.tool_calls > 0 {
        println!(
            "Est. cost    ${:>7.4}  ({} tokens, confidence {})",
            estimate.cost_usd,
            estimate.total_tokens,
            estimate.confidence.as_str()
        );
    }

    println!();
    println!("XP {}  ·  rank {}", progress.xp, progress.rank.as_str());

    let earned: Vec<_> = progress
        .badges
        .iter()
        .filter(|b| b.tier != Tier::Locked)
        .collect();
    if !earned.is_empty() {
        println!();
        for badge in earned {
            match badge.next_threshold {
                Some(next) => println!(
                    "  {:<18} {:<9} {} (next at {})",
                    badge.name,
                    badge.tier.as_str(),
                    badge.value,
                    next
                ),
                None => println!(
                    "  {:<18} {:<9} {}",
                    badge.name,
                    badge.tier.as_str(),
                    badge.value
                ),
            }
        }
    }
    Ok(())
}

pub(crate) fn run_summary(ctx: &Context) -> Result<()> {
    let store = ctx.open_store().context("opening session store")?;
    let summary = store.get_security_summary()?;

    let dist = &summary.risk_distribution;
    println!(
        "Risk distribution: safe {} · caution {} · dangerous {} · critical {}",
        dist.safe, dist.caution, dist.dangerous, dist.critical
    );
    println!("High-risk commands in the last 24h: {}", summary.high_risk_24h);

    if !summary.violations_by_type.is_empty() {
        println!("\nViolations by type:");
        for (kind, count) in &summary.violations_by_type {
            println!("  {:<12} {}", kind.as_str(), count);
        }
    }

    if !summary.recent_blocked.is_empty() {
        println!("\nRecently blocked:");
        for command in &summary.recent_blocked {
            println!(
                "  [{}] risk {:>2}  {}",
                command.timestamp, command.risk_score, command.command
            );
        }
    }
    Ok(())
}

pub(crate) fn run_cleanup(ctx: &Context, days: u32) -> Result<()> {
    let store = ctx.open_store().context("opening session store")?;
    let deleted = store.cleanup(days)?;
    println!("Deleted {deleted} rows older than {days} days.");
    Ok(())
}
