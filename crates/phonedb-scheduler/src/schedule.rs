//! Hour-aligned recurrence: "every N hours at minute 0" in a fixed local
//! offset.

use chrono::{DateTime, FixedOffset, TimeDelta, Utc};

use crate::error::SchedulerError;

const SECS_PER_HOUR: i64 = 3_600;
const SECS_PER_DAY: i64 = 86_400;

/// Valid schedule intervals in hours.
pub const INTERVAL_RANGE: std::ops::RangeInclusive<u32> = 1..=24;

/// # Errors
///
/// Returns [`SchedulerError::InvalidOffset`] when `hours` is not a valid
/// UTC offset.
pub fn fixed_offset(hours: i32) -> Result<FixedOffset, SchedulerError> {
    hours
        .checked_mul(3_600)
        .and_then(FixedOffset::east_opt)
        .ok_or(SchedulerError::InvalidOffset { hours })
}

/// # Errors
///
/// Returns [`SchedulerError::InvalidInterval`] outside [`INTERVAL_RANGE`].
pub fn validate_interval(hours: u32) -> Result<u32, SchedulerError> {
    if INTERVAL_RANGE.contains(&hours) {
        Ok(hours)
    } else {
        Err(SchedulerError::InvalidInterval { hours })
    }
}

/// The `next_run` recorded on a job row: `now` plus the interval.
///
/// The timer itself fires on [`next_fire`]; this value is what the job
/// table reports.
#[must_use]
pub fn next_run_after(now: DateTime<Utc>, interval_hours: u32) -> DateTime<Utc> {
    now + TimeDelta::hours(i64::from(interval_hours))
}

/// First top-of-hour instant strictly after `now` whose local hour in
/// `offset` is a multiple of `interval_hours`.
///
/// Intervals that do not divide 24 restart at local midnight, so a 5-hour
/// schedule fires at 00, 05, 10, 15 and 20.
#[must_use]
pub fn next_fire(now: DateTime<Utc>, interval_hours: u32, offset: FixedOffset) -> DateTime<Utc> {
    let interval = i64::from(interval_hours.max(1));
    let offset_secs = i64::from(offset.local_minus_utc());

    let now_secs = now.timestamp();
    let hour_start = now_secs - now_secs.rem_euclid(SECS_PER_HOUR);
    let on_the_hour = now - TimeDelta::nanoseconds(i64::from(now.timestamp_subsec_nanos()))
        - TimeDelta::seconds(now_secs - hour_start);

    // a match always exists within the next 24 hours since hour 0 qualifies
    let steps = (1..=24_i64)
        .find(|step| {
            let candidate = hour_start + step * SECS_PER_HOUR;
            let local_hour = (candidate + offset_secs).rem_euclid(SECS_PER_DAY) / SECS_PER_HOUR;
            local_hour % interval == 0
        })
        .unwrap_or(24);

    on_the_hour + TimeDelta::hours(steps)
}

/// Wall clock that advances with the tokio clock after construction, so
/// timers behave under paused test time.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TimerClock {
    anchor_utc: DateTime<Utc>,
    anchor: tokio::time::Instant,
}

impl TimerClock {
    pub(crate) fn start() -> Self {
        Self {
            anchor_utc: Utc::now(),
            anchor: tokio::time::Instant::now(),
        }
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        let elapsed = TimeDelta::from_std(self.anchor.elapsed()).unwrap_or(TimeDelta::zero());
        self.anchor_utc + elapsed
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    fn algiers() -> FixedOffset {
        fixed_offset(1).unwrap()
    }

    #[test]
    fn aligns_to_local_multiple_of_interval() {
        // 11:20 local -> 12:00 local
        let next = next_fire(utc(2026, 10, 16, 10, 20, 0), 6, algiers());
        assert_eq!(next, utc(2026, 10, 16, 11, 0, 0));
    }

    #[test]
    fn exact_boundary_moves_to_following_slot() {
        // 12:00:00 local is not strictly after now
        let next = next_fire(utc(2026, 10, 16, 11, 0, 0), 6, algiers());
        assert_eq!(next, utc(2026, 10, 16, 17, 0, 0));
    }

    #[test]
    fn hourly_fires_at_next_top_of_hour() {
        let now = utc(2026, 10, 16, 8, 59, 59) + TimeDelta::milliseconds(500);
        assert_eq!(next_fire(now, 1, algiers()), utc(2026, 10, 16, 9, 0, 0));
    }

    #[test]
    fn daily_fires_at_local_midnight() {
        // 23:30 local -> 00:00 local next day
        let next = next_fire(utc(2026, 10, 16, 22, 30, 0), 24, algiers());
        assert_eq!(next, utc(2026, 10, 16, 23, 0, 0));
    }

    #[test]
    fn non_divisor_interval_restarts_at_midnight() {
        // 21:10 local: the 20:00 slot has passed, 25:00 does not exist
        let next = next_fire(utc(2026, 10, 16, 20, 10, 0), 5, algiers());
        assert_eq!(next, utc(2026, 10, 16, 23, 0, 0));
    }

    #[test]
    fn negative_offsets_are_supported() {
        let offset = fixed_offset(-5).unwrap();
        // 06:45 local -> 12:00 local = 17:00Z
        let next = next_fire(utc(2026, 10, 16, 11, 45, 0), 12, offset);
        assert_eq!(next, utc(2026, 10, 16, 17, 0, 0));
    }

    #[test]
    fn recorded_next_run_is_now_plus_interval() {
        let now = utc(2026, 10, 16, 10, 20, 15);
        assert_eq!(next_run_after(now, 6), utc(2026, 10, 16, 16, 20, 15));
        assert_eq!(next_run_after(now, 24), utc(2026, 10, 17, 10, 20, 15));
    }

    #[test]
    fn interval_bounds() {
        assert!(validate_interval(0).is_err());
        assert_eq!(validate_interval(1).unwrap(), 1);
        assert_eq!(validate_interval(24).unwrap(), 24);
        assert!(matches!(
            validate_interval(25),
            Err(SchedulerError::InvalidInterval { hours: 25 })
        ));
    }
}
