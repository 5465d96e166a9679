use std::time::Duration;

use chrono::{DateTime, LocalResult, NaiveDate, NaiveTime, TimeDelta, TimeZone, Utc};

// DST gaps never exceed a few hours; step through them in half-hour increments.
const GAP_STEP_MINUTES: i64 = 30;
const MAX_GAP_STEPS: usize = 48;

/// Fires once per calendar day at a wall-clock time in `tz`.
#[derive(Debug, Clone)]
pub struct DailyCadence<Tz: TimeZone> {
    tz: Tz,
    target: NaiveTime,
}

impl<Tz: TimeZone> DailyCadence<Tz> {
    /// Local midnight in `tz`.
    #[must_use]
    pub fn midnight(tz: Tz) -> Self {
        Self {
            tz,
            target: NaiveTime::MIN,
        }
    }

    /// Next firing strictly after `now`.
    #[must_use]
    pub fn next_run_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let mut date = now.with_timezone(&self.tz).date_naive();
        // Today, tomorrow, and one spare day for a target swallowed by a DST gap.
        for _ in 0..3 {
            if let Some(candidate) = self.resolve(date) {
                if candidate > now {
                    return candidate;
                }
            }
            match date.succ_opt() {
                Some(next) => date = next,
                None => break,
            }
        }
        now + TimeDelta::days(1)
    }

    /// Firing that follows `fired`, observed at wall-clock `now`.
    ///
    /// A timer that wakes slightly before `fired` still moves on to the next day.
    #[must_use]
    pub fn next_run_after_fire(&self, fired: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
        self.next_run_after(now.max(fired))
    }

    fn resolve(&self, date: NaiveDate) -> Option<DateTime<Utc>> {
        let mut local = date.and_time(self.target);
        for _ in 0..MAX_GAP_STEPS {
            match self.tz.from_local_datetime(&local) {
                LocalResult::Single(dt) => return Some(dt.with_timezone(&Utc)),
                LocalResult::Ambiguous(earliest, _) => return Some(earliest.with_timezone(&Utc)),
                LocalResult::None => local += TimeDelta::minutes(GAP_STEP_MINUTES),
            }
        }
        None
    }
}

#[must_use]
pub(crate) fn duration_until(next: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (next - now).to_std().unwrap_or(Duration::ZERO)
}
