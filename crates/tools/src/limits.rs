use std::collections::{HashMap, VecDeque};
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

use agora_domain::config::RateLimitConfig;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Ceilings for one tool. Unset ceilings are unlimited.
#[derive(Debug, Clone, Copy, Default)]
pub struct RateLimit {
    pub per_hour: Option<u32>,
    pub per_day: Option<u32>,
    pub max_concurrent: Option<u32>,
}

impl From<RateLimitConfig> for RateLimit {
    fn from(cfg: RateLimitConfig) -> Self {
        Self {
            per_hour: cfg.per_hour,
            per_day: cfg.per_day,
            max_concurrent: cfg.max_concurrent,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitKind {
    Hourly,
    Daily,
    Concurrent,
}

/// Returned when a rate-limit check fails.
#[derive(Debug, Clone, Copy)]
pub struct LimitExceeded {
    pub kind: LimitKind,
    pub limit: u32,
}

impl fmt::Display for LimitExceeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let window = match self.kind {
            LimitKind::Hourly => "hourly",
            LimitKind::Daily => "daily",
            LimitKind::Concurrent => "concurrent",
        };
        write!(f, "{window} limit of {} reached", self.limit)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tracker
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Rolling invocation record for one `(tool, agent)` pair.
///
/// One timestamp deque serves both windows: entries older than 24h are
/// pruned, hourly counts are taken from the tail.
#[derive(Default)]
struct Window {
    invocations: VecDeque<DateTime<Utc>>,
    concurrent: u32,
}

impl Window {
    fn prune(&mut self, now: DateTime<Utc>) {
        let day_ago = now - Duration::hours(24);
        while self.invocations.front().is_some_and(|t| *t < day_ago) {
            self.invocations.pop_front();
        }
    }

    fn hourly_count(&self, now: DateTime<Utc>) -> usize {
        let hour_ago = now - Duration::hours(1);
        self.invocations.iter().filter(|t| **t >= hour_ago).count()
    }
}

/// In-memory sliding-window tracker, keyed by `(tool, agent)`.
///
/// Admission is atomic: a passing check records the invocation and takes
/// a concurrent slot in the same lock, so the admitted request is always
/// counted against its own windows.
#[derive(Default)]
pub(crate) struct LimitTracker {
    windows: Mutex<HashMap<(String, String), Window>>,
}

impl LimitTracker {
    /// Non-mutating inspection of all three ceilings.
    pub fn check(
        &self,
        tool: &str,
        agent_id: &str,
        limit: &RateLimit,
    ) -> Result<(), LimitExceeded> {
        let now = Utc::now();
        let mut windows = self.windows.lock();
        let window = windows
            .entry((tool.to_string(), agent_id.to_string()))
            .or_default();
        window.prune(now);
        Self::check_window(window, limit, now)
    }

    /// Check all ceilings and, on pass, count the invocation and take a
    /// concurrent slot.
    pub fn admit(
        &self,
        tool: &str,
        agent_id: &str,
        limit: &RateLimit,
    ) -> Result<(), LimitExceeded> {
        let now = Utc::now();
        let mut windows = self.windows.lock();
        let window = windows
            .entry((tool.to_string(), agent_id.to_string()))
            .or_default();
        window.prune(now);
        Self::check_window(window, limit, now)?;
        window.invocations.push_back(now);
        window.concurrent += 1;
        Ok(())
    }

    /// Release the concurrent slot taken by `admit`.
    pub fn release(&self, tool: &str, agent_id: &str) {
        let mut windows = self.windows.lock();
        if let Some(window) = windows.get_mut(&(tool.to_string(), agent_id.to_string())) {
            window.concurrent = window.concurrent.saturating_sub(1);
        }
    }

    fn check_window(
        window: &Window,
        limit: &RateLimit,
        now: DateTime<Utc>,
    ) -> Result<(), LimitExceeded> {
        if let Some(max) = limit.max_concurrent {
            if window.concurrent >= max {
                return Err(LimitExceeded {
                    kind: LimitKind::Concurrent,
                    limit: max,
                });
            }
        }
        if let Some(max) = limit.per_hour {
            if window.hourly_count(now) >= max as usize {
                return Err(LimitExceeded {
                    kind: LimitKind::Hourly,
                    limit: max,
                });
            }
        }
        if let Some(max) = limit.per_day {
            if window.invocations.len() >= max as usize {
                return Err(LimitExceeded {
                    kind: LimitKind::Daily,
                    limit: max,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlimited_by_default() {
        let tracker = LimitTracker::default();
        let limit = RateLimit::default();
        for _ in 0..1000 {
            tracker.admit("t", "a", &limit).unwrap();
        }
    }

    #[test]
    fn hourly_ceiling_counts_admitted_requests() {
        let tracker = LimitTracker::default();
        let limit = RateLimit {
            per_hour: Some(3),
            ..Default::default()
        };
        for _ in 0..3 {
            tracker.admit("t", "a", &limit).unwrap();
        }
        let err = tracker.admit("t", "a", &limit).unwrap_err();
        assert_eq!(err.kind, LimitKind::Hourly);
        assert_eq!(err.limit, 3);
    }

    #[test]
    fn windows_are_per_agent() {
        let tracker = LimitTracker::default();
        let limit = RateLimit {
            per_hour: Some(1),
            ..Default::default()
        };
        tracker.admit("t", "a", &limit).unwrap();
        tracker.admit("t", "b", &limit).unwrap();
        assert!(tracker.admit("t", "a", &limit).is_err());
    }

    #[test]
    fn concurrent_slots_release() {
        let tracker = LimitTracker::default();
        let limit = RateLimit {
            max_concurrent: Some(2),
            ..Default::default()
        };
        tracker.admit("t", "a", &limit).unwrap();
        tracker.admit("t", "a", &limit).unwrap();
        let err = tracker.admit("t", "a", &limit).unwrap_err();
        assert_eq!(err.kind, LimitKind::Concurrent);

        tracker.release("t", "a");
        tracker.admit("t", "a", &limit).unwrap();
    }

    #[test]
    fn check_does_not_consume() {
        let tracker = LimitTracker::default();
        let limit = RateLimit {
            per_day: Some(1),
            ..Default::default()
        };
        for _ in 0..5 {
            tracker.check("t", "a", &limit).unwrap();
        }
        tracker.admit("t", "a", &limit).unwrap();
        assert_eq!(tracker.check("t", "a", &limit).unwrap_err().kind, LimitKind::Daily);
    }

    #[test]
    fn release_without_window_is_a_no_op() {
        let tracker = LimitTracker::default();
        tracker.release("t", "never-admitted");
    }
}
