//! Achievement badges, XP, and rank as pure functions of the stats row.

use serde::Deserialize;
use serde::Serialize;

use crate::store::StoreStats;

/// Badge tier. `Locked` means no threshold met yet; the five earned tiers
/// ascend Bronze through Obsidian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Locked,
    Bronze,
    Silver,
    Gold,
    Diamond,
    Obsidian,
}

/// XP contributed by a badge at each tier index (Locked..Obsidian).
const TIER_XP: [i64; 6] = [0, 50, 100, 200, 500, 1000];

impl Tier {
    fn from_index(index: usize) -> Self {
        match index {
            0 => Tier::Locked,
            1 => Tier::Bronze,
            2 => Tier::Silver,
            3 => Tier::Gold,
            4 => Tier::Diamond,
            _ => Tier::Obsidian,
        }
    }

    pub fn xp(&self) -> i64 {
        TIER_XP[*self as usize]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Locked => "locked",
            Tier::Bronze => "bronze",
            Tier::Silver => "silver",
            Tier::Gold => "gold",
            Tier::Diamond => "diamond",
            Tier::Obsidian => "obsidian",
        }
    }
}

/// The stat a badge tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatKey {
    TotalCommands,
    BlockedCommands,
    TotalSessions,
    ActiveSessions,
    ToolUses,
    Prompts,
    CommandsToday,
    Commands24h,
    HighRisk24h,
    LateNightCommands,
    CleanestStreak,
    EgressBlocks,
}

impl StatKey {
    pub fn value(&self, stats: &StoreStats) -> i64 {
        match self {
            StatKey::TotalCommands => stats.total_commands,
            StatKey::BlockedCommands => stats.total_blocked,
            StatKey::TotalSessions => stats.total_sessions,
            StatKey::ActiveSessions => stats.active_sessions,
            StatKey::ToolUses => stats.total_tool_uses,
            StatKey::Prompts => stats.total_prompts,
            StatKey::CommandsToday => stats.commands_today,
            StatKey::Commands24h => stats.commands_24h,
            StatKey::HighRisk24h => stats.high_risk_24h,
            StatKey::LateNightCommands => stats.late_night_commands,
            StatKey::CleanestStreak => stats.cleanest_streak,
            StatKey::EgressBlocks => stats.total_egress_blocks,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Badge {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub stat: StatKey,
    /// Five ascending thresholds, Bronze through Obsidian.
    pub thresholds: [i64; 5],
}

/// The fixed catalog. Order is display order.
#[rustfmt::skip]
pub const CATALOG: [Badge; 21] = [
    Badge { id: "command_cadet",   name: "Command Cadet",   description: "Log your first commands",            stat: StatKey::TotalCommands,     thresholds: [1, 50, 500, 5_000, 50_000] },
    Badge { id: "terminal_vet",    name: "Terminal Veteran", description: "A lifetime at the prompt",          stat: StatKey::TotalCommands,     thresholds: [100, 1_000, 10_000, 100_000, 1_000_000] },
    Badge { id: "gatekeeper",      name: "Gatekeeper",      description: "Commands stopped at the gate",       stat: StatKey::BlockedCommands,   thresholds: [1, 10, 100, 1_000, 10_000] },
    Badge { id: "wall_builder",    name: "Wall Builder",    description: "A wall of denied commands",          stat: StatKey::BlockedCommands,   thresholds: [5, 50, 500, 5_000, 50_000] },
    Badge { id: "session_starter", name: "Session Starter", description: "Sessions opened",                    stat: StatKey::TotalSessions,     thresholds: [1, 10, 100, 1_000, 10_000] },
    Badge { id: "marathoner",      name: "Marathoner",      description: "Sessions upon sessions",             stat: StatKey::TotalSessions,     thresholds: [5, 50, 250, 2_500, 25_000] },
    Badge { id: "toolsmith",       name: "Toolsmith",       description: "Tool invocations recorded",          stat: StatKey::ToolUses,          thresholds: [10, 100, 1_000, 10_000, 100_000] },
    Badge { id: "power_user",      name: "Power User",      description: "Heavy tool traffic",                 stat: StatKey::ToolUses,          thresholds: [50, 500, 5_000, 50_000, 500_000] },
    Badge { id: "prompt_artisan",  name: "Prompt Artisan",  description: "Prompts submitted",                  stat: StatKey::Prompts,           thresholds: [1, 25, 250, 2_500, 25_000] },
    Badge { id: "conversationalist", name: "Conversationalist", description: "A long-running dialogue",        stat: StatKey::Prompts,           thresholds: [10, 100, 1_000, 10_000, 100_000] },
    Badge { id: "daily_driver",    name: "Daily Driver",    description: "Commands since midnight",            stat: StatKey::CommandsToday,     thresholds: [10, 25, 50, 100, 250] },
    Badge { id: "busy_bee",        name: "Busy Bee",        description: "A packed 24 hours",                  stat: StatKey::Commands24h,       thresholds: [25, 50, 100, 250, 500] },
    Badge { id: "night_owl",       name: "Night Owl",       description: "Commands in the small hours",        stat: StatKey::LateNightCommands, thresholds: [1, 10, 100, 1_000, 10_000] },
    Badge { id: "midnight_oil",    name: "Midnight Oil",    description: "Sustained late-night work",          stat: StatKey::LateNightCommands, thresholds: [5, 50, 500, 5_000, 50_000] },
    Badge { id: "clean_streak",    name: "Clean Streak",    description: "Allowed commands in a row",          stat: StatKey::CleanestStreak,    thresholds: [10, 100, 500, 1_000, 5_000] },
    Badge { id: "spotless",        name: "Spotless",        description: "An immaculate run",                  stat: StatKey::CleanestStreak,    thresholds: [50, 250, 2_500, 10_000, 50_000] },
    Badge { id: "risk_taker",      name: "Risk Taker",      description: "High-risk commands seen today",      stat: StatKey::HighRisk24h,       thresholds: [1, 5, 10, 25, 50] },
    Badge { id: "danger_zone",     name: "Danger Zone",     description: "Living close to the threshold",      stat: StatKey::HighRisk24h,       thresholds: [3, 15, 30, 75, 150] },
    Badge { id: "leak_plugger",    name: "Leak Plugger",    description: "Egress payloads intercepted",        stat: StatKey::EgressBlocks,      thresholds: [1, 5, 25, 100, 500] },
    Badge { id: "data_warden",     name: "Data Warden",     description: "A history of guarded egress",        stat: StatKey::EgressBlocks,      thresholds: [10, 50, 250, 1_000, 5_000] },
    Badge { id: "multitasker",     name: "Multitasker",     description: "Concurrent active sessions",         stat: StatKey::ActiveSessions,    thresholds: [1, 2, 3, 5, 8] },
];

#[derive(Debug, Clone, PartialEq)]
pub struct BadgeStatus {
    pub id: &'static str,
    pub name: &'static str,
    pub tier: Tier,
    pub value: i64,
    /// Next threshold to reach, `None` at Obsidian.
    pub next_threshold: Option<i64>,
}

/// Rank tiers over total XP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rank {
    Bronze,
    Silver,
    Gold,
    Diamond,
    Obsidian,
}

impl Rank {
    pub fn from_xp(xp: i64) -> Self {
        match xp {
            x if x >= 100_000 => Rank::Obsidian,
            x if x >= 25_000 => Rank::Diamond,
            x if x >= 5_000 => Rank::Gold,
            x if x >= 1_000 => Rank::Silver,
            _ => Rank::Bronze,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Rank::Bronze => "bronze",
            Rank::Silver => "silver",
            Rank::Gold => "gold",
            Rank::Diamond => "diamond",
            Rank::Obsidian => "obsidian",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    pub badges: Vec<BadgeStatus>,
    pub xp: i64,
    pub rank: Rank,
}

fn badge_tier(badge: &Badge, value: i64) -> Tier {
    let mut index = 0;
    for (i, threshold) in badge.thresholds.iter().enumerate() {
        if value >= *threshold {
            index = i + 1;
        }
    }
    Tier::from_index(index)
}

/// Evaluate every badge against the stats row.
pub fn evaluate_badges(stats: &StoreStats) -> Vec<BadgeStatus> {
    CATALOG
        .iter()
        .map(|badge| {
            let value = badge.stat.value(stats);
            let tier = badge_tier(badge, value);
            let next_threshold = badge
                .thresholds
                .iter()
                .find(|t| value < **t)
                .copied();
            BadgeStatus {
                id: badge.id,
                name: badge.name,
                tier,
                value,
                next_threshold,
            }
        })
        .collect()
}

/// Total XP: activity weights plus tier-weighted badge XP.
pub fn total_xp(stats: &StoreStats) -> i64 {
    let badge_xp: i64 = evaluate_badges(stats).iter().map(|b| b.tier.xp()).sum();
    stats.total_commands
        + 3 * stats.total_blocked
        + 10 * stats.total_sessions
        + 2 * stats.late_night_commands
        + 25 * (stats.cleanest_streak / 100)
        + badge_xp
}

pub fn progress(stats: &StoreStats) -> Progress {
    let badges = evaluate_badges(stats);
    let xp = total_xp(stats);
    Progress {
        badges,
        xp,
        rank: Rank::from_xp(xp),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn catalog_is_twenty_one_ascending_badges() {
        assert_eq!(CATALOG.len(), 21);
        for badge in &CATALOG {
            for pair in badge.thresholds.windows(2) {
                assert!(pair[0] < pair[1], "{} thresholds must ascend", badge.id);
            }
        }
    }

    #[test]
    fn tier_is_index_of_highest_met_threshold() {
        let badge = &CATALOG[0]; // thresholds [1, 50, 500, 5000, 50000]
        assert_eq!(badge_tier(badge, 0), Tier::Locked);
        assert_eq!(badge_tier(badge, 1), Tier::Bronze);
        assert_eq!(badge_tier(badge, 49), Tier::Bronze);
        assert_eq!(badge_tier(badge, 50), Tier::Silver);
        assert_eq!(badge_tier(badge, 500), Tier::Gold);
        assert_eq!(badge_tier(badge, 5_000), Tier::Diamond);
        assert_eq!(badge_tier(badge, 1_000_000), Tier::Obsidian);
    }

    #[test]
    fn zeroed_stats_lock_everything() {
        let progress = progress(&StoreStats::default());
        assert!(progress.badges.iter().all(|b| b.tier == Tier::Locked));
        assert_eq!(progress.xp, 0);
        assert_eq!(progress.rank, Rank::Bronze);
    }

    #[test]
    fn xp_formula_matches_weights() {
        let stats = StoreStats {
            total_commands: 100,
            total_blocked: 10,
            total_sessions: 2,
            late_night_commands: 5,
            cleanest_streak: 250,
            ..Default::default()
        };
        // Badge XP: command_cadet silver (100) + terminal_vet bronze (50)
        // + gatekeeper silver (100) + wall_builder bronze (50)
        // + session_starter bronze (50) + night_owl bronze (50)
        // + midnight_oil bronze (50) + clean_streak silver (100)
        // + spotless silver (100).
        let badge_xp: i64 = evaluate_badges(&stats).iter().map(|b| b.tier.xp()).sum();
        assert_eq!(badge_xp, 650);
        let expected = 100 + 3 * 10 + 10 * 2 + 2 * 5 + 25 * 2 + badge_xp;
        assert_eq!(total_xp(&stats), expected);
    }

    #[test]
    fn rank_boundaries_are_inclusive() {
        assert_eq!(Rank::from_xp(0), Rank::Bronze);
        assert_eq!(Rank::from_xp(999), Rank::Bronze);
        assert_eq!(Rank::from_xp(1_000), Rank::Silver);
        assert_eq!(Rank::from_xp(5_000), Rank::Gold);
        assert_eq!(Rank::from_xp(25_000), Rank::Diamond);
        assert_eq!(Rank::from_xp(100_000), Rank::Obsidian);
    }

    #[test]
    fn next_threshold_tracks_progress() {
        let stats = StoreStats {
            total_commands: 60,
            ..Default::default()
        };
        let badges = evaluate_badges(&stats);
        let cadet = badges.iter().find(|b| b.id == "command_cadet").unwrap();
        assert_eq!(cadet.tier, Tier::Silver);
        assert_eq!(cadet.next_threshold, Some(500));
        let vet = badges.iter().find(|b| b.id == "terminal_vet").unwrap();
        assert_eq!(vet.tier, Tier::Locked);
        assert_eq!(vet.next_threshold, Some(100));
    }
}
