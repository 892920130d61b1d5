//! Sliding-window rate limiter over per-process command timestamps.
//!
//! `check` is called immediately before evaluation and counts the current
//! command against the windows; `record` is called only on successful
//! commit, so a command blocked for the limit does not itself count.

use std::collections::VecDeque;
use std::time::Duration;
use std::time::Instant;

use crate::config::RateLimitConfig;
use crate::protocol::Severity;
use crate::protocol::Violation;
use crate::protocol::ViolationType;

const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(3600);

#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    minute: VecDeque<Instant>,
    hour: VecDeque<Instant>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            minute: VecDeque::new(),
            hour: VecDeque::new(),
        }
    }

    /// Would admitting one more command exceed either window?
    pub fn check(&mut self) -> Option<Violation> {
        self.check_at(Instant::now())
    }

    /// Count the current command as committed.
    pub fn record(&mut self) {
        self.record_at(Instant::now());
    }

    fn evict(&mut self, now: Instant) {
        while let Some(front) = self.minute.front() {
            if now.duration_since(*front) >= MINUTE {
                self.minute.pop_front();
            } else {
                break;
            }
        }
        while let Some(front) = self.hour.front() {
            if now.duration_since(*front) >= HOUR {
                self.hour.pop_front();
            } else {
                break;
            }
        }
    }

    fn check_at(&mut self, now: Instant) -> Option<Violation> {
        if !self.config.enabled {
            return None;
        }
        self.evict(now);

        if self.minute.len() as u32 + 1 > self.config.max_per_minute {
            return Some(
                Violation::new(
                    ViolationType::RateLimit,
                    "max_per_minute",
                    format!(
                        "command rate exceeded: more than {} commands in the last minute",
                        self.config.max_per_minute
                    ),
                    Severity::Medium,
                )
                .with_remediation("Wait a moment before retrying, or raise rateLimit.maxPerMinute"),
            );
        }
        if self.hour.len() as u32 + 1 > self.config.max_per_hour {
            return Some(
                Violation::new(
                    ViolationType::RateLimit,
                    "max_per_hour",
                    format!(
                        "command rate exceeded: more than {} commands in the last hour",
                        self.config.max_per_hour
                    ),
                    Severity::Medium,
                )
                .with_remediation("Wait before retrying, or raise rateLimit.maxPerHour"),
            );
        }
        None
    }

    fn record_at(&mut self, now: Instant) {
        if !self.config.enabled {
            return;
        }
        self.evict(now);
        self.minute.push_back(now);
        self.hour.push_back(now);
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    fn config(per_minute: u32, per_hour: u32) -> RateLimitConfig {
        RateLimitConfig {
            enabled: true,
            max_per_minute: per_minute,
            max_per_hour: per_hour,
        }
    }

    #[test]
    fn permits_until_minute_window_full() {
        let mut rl = RateLimiter::new(config(3, 100));
        let t0 = Instant::now();
        for i in 0..3 {
            assert!(rl.check_at(t0).is_none(), "command {i} should pass");
            rl.record_at(t0);
        }
        let violation = rl.check_at(t0).unwrap();
        assert_eq!(violation.kind, ViolationType::RateLimit);
        assert_eq!(violation.rule, "max_per_minute");
    }

    #[test]
    fn window_slides() {
        let mut rl = RateLimiter::new(config(2, 100));
        let t0 = Instant::now();
        rl.record_at(t0);
        rl.record_at(t0);
        assert!(rl.check_at(t0).is_some());
        // One minute later both entries have aged out.
        assert!(rl.check_at(t0 + Duration::from_secs(61)).is_none());
    }

    #[test]
    fn hour_window_enforced_independently() {
        let mut rl = RateLimiter::new(config(100, 2));
        let t0 = Instant::now();
        rl.record_at(t0);
        rl.record_at(t0 + Duration::from_secs(120));
        let violation = rl.check_at(t0 + Duration::from_secs(180)).unwrap();
        assert_eq!(violation.rule, "max_per_hour");
    }

    #[test]
    fn disabled_always_permits() {
        let mut rl = RateLimiter::new(RateLimitConfig {
            enabled: false,
            max_per_minute: 0,
            max_per_hour: 0,
        });
        assert!(rl.check().is_none());
        rl.record();
        assert!(rl.check().is_none());
    }

    #[test]
    fn blocked_command_does_not_count_itself() {
        let mut rl = RateLimiter::new(config(1, 100));
        let t0 = Instant::now();
        rl.record_at(t0);
        // Denied, but not recorded.
        assert!(rl.check_at(t0).is_some());
        assert_eq!(rl.minute.len(), 1);
    }
}
