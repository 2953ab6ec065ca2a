//! What makes a scheduled task due.

use chrono::{DateTime, Duration, Timelike, Utc};

/// A daily (optionally weekly) time-of-day specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSpec {
    /// 0-23, or `None` to fire every hour at `minute`.
    pub hour: Option<u32>,
    /// 0-59, or `None` to fire every minute.
    pub minute: Option<u32>,
    /// 0-59.
    pub second: u32,
    /// 0 (Monday) through 6 (Sunday).
    pub weekday: Option<u32>,
}

impl TimeSpec {
    /// A spec that fires once a day at `hour:minute:00`.
    pub fn daily(hour: u32, minute: u32) -> Self {
        Self { hour: Some(hour), minute: Some(minute), second: 0, weekday: None }
    }

    /// Whether `dt` falls within this spec. Not consulted by
    /// [`TimeSpec::next_occurrence`]; useful for callers pre-filtering
    /// an incoming event against a trigger definition.
    pub fn matches(&self, dt: DateTime<Utc>) -> bool {
        if let Some(hour) = self.hour {
            if dt.hour() != hour {
                return false;
            }
        }
        if let Some(minute) = self.minute {
            if dt.minute() != minute {
                return false;
            }
        }
        if let Some(weekday) = self.weekday {
            if dt.weekday().num_days_from_monday() != weekday {
                return false;
            }
        }
        true
    }

    /// The next datetime at or after `after` that matches `hour`/`minute`/`second`.
    pub fn next_occurrence(&self, after: DateTime<Utc>) -> DateTime<Utc> {
        let mut target = after
            .with_second(self.second)
            .and_then(|dt| dt.with_nanosecond(0))
            .unwrap_or(after);

        if let Some(minute) = self.minute {
            target = target.with_minute(minute).unwrap_or(target);
        }
        if let Some(hour) = self.hour {
            target = target.with_hour(hour).unwrap_or(target);
        }

        if target <= after {
            target += if self.minute.is_none() { Duration::hours(1) } else { Duration::days(1) };
        }

        target
    }
}

/// What schedules a task's next run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Recurring, time-of-day based.
    Time(TimeSpec),
    /// Recurring, every `seconds` since the last run.
    Interval {
        /// Interval length in seconds.
        seconds: i64,
    },
    /// Fires exactly once, at the given instant. Used to restore a task
    /// recovered from storage, where only a `scheduled_time` survives a
    /// restart (the richer trigger definition is in-memory only).
    Once(DateTime<Utc>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn daily_spec_rolls_to_tomorrow_when_time_has_passed() {
        let spec = TimeSpec::daily(9, 0);
        let now = Utc::now().with_hour(10).unwrap().with_minute(0).unwrap();
        let next = spec.next_occurrence(now);
        assert!(next > now);
        assert_eq!(next.hour(), 9);
    }

    #[test]
    fn hourly_spec_rolls_forward_by_an_hour() {
        let spec = TimeSpec { hour: None, minute: Some(30), second: 0, weekday: None };
        let now = Utc::now().with_minute(45).unwrap();
        let next = spec.next_occurrence(now);
        assert_eq!(next.minute(), 30);
        assert!(next > now);
    }

    #[test]
    fn matches_checks_hour_minute_and_weekday() {
        let spec = TimeSpec::daily(9, 0);
        let hit = Utc::now().with_hour(9).unwrap().with_minute(0).unwrap();
        let miss = Utc::now().with_hour(10).unwrap();
        assert!(spec.matches(hit));
        assert!(!spec.matches(miss));
    }
}
