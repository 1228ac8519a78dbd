use std::str::FromStr;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use cron::Schedule;
use cronbeat_core::CronMeta;

/// Compute the next UTC start for a job that just completed, or `None` when
/// no further occurrence exists.
///
/// `floor = now + next_delay` is the earliest instant the job may run
/// again. A `start_at` still at or past the floor is returned unchanged —
/// the job's configured start is already in the future, do not advance it.
/// Otherwise the occurrence at the floor itself (or the first one after
/// it) is skipped and the following one returned, so the job always moves
/// past the tick that just handled it.
///
/// A malformed expression and an occurrence past `stop_at` both yield
/// `None`: the job retires instead of crashing the loop.
pub fn next_start(
    meta: &CronMeta,
    next_delay: StdDuration,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let interval = meta.interval.as_deref()?;

    let delay = Duration::milliseconds(next_delay.as_millis().min(i64::MAX as u128) as i64);
    let floor = now
        .checked_add_signed(delay)
        .unwrap_or(DateTime::<Utc>::MAX_UTC);

    if meta.start_at >= floor {
        return Some(meta.start_at);
    }

    let schedule = Schedule::from_str(interval).ok()?;
    let mut occurrences = schedule.after(&floor);
    let next = if schedule.includes(floor) {
        // the floor is itself an occurrence: it counts as the skipped one
        occurrences.next()
    } else {
        occurrences.nth(1)
    }?;

    match meta.stop_at {
        Some(stop) if next > stop => None,
        _ => Some(next),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const EVERY_SECOND: &str = "* * * * * *";
    const EVERY_MINUTE: &str = "0 * * * * *";

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap()
    }

    fn meta(interval: Option<&str>, start_at: DateTime<Utc>) -> CronMeta {
        CronMeta {
            enabled: Some(true),
            start_at,
            interval: interval.map(String::from),
            ..CronMeta::default()
        }
    }

    #[test]
    fn one_shot_has_no_next_start() {
        let now = noon();
        let m = meta(None, now - Duration::seconds(10));
        assert_eq!(next_start(&m, StdDuration::ZERO, now), None);
    }

    #[test]
    fn future_start_at_is_preserved() {
        let now = noon();
        let configured = now + Duration::seconds(30);
        let m = meta(Some(EVERY_SECOND), configured);
        assert_eq!(next_start(&m, StdDuration::ZERO, now), Some(configured));
    }

    #[test]
    fn skips_the_occurrence_at_the_floor() {
        // noon is exactly on a second boundary, so it is itself an
        // occurrence of the every-second schedule and must be skipped
        let now = noon();
        let m = meta(Some(EVERY_SECOND), now - Duration::seconds(10));
        assert_eq!(
            next_start(&m, StdDuration::ZERO, now),
            Some(now + Duration::seconds(1))
        );
    }

    #[test]
    fn skips_the_first_occurrence_after_an_off_boundary_floor() {
        // 12:00:30 is not a minute boundary: 12:01:00 is skipped, 12:02:00 wins
        let now = noon() + Duration::seconds(30);
        let m = meta(Some(EVERY_MINUTE), now - Duration::seconds(90));
        assert_eq!(
            next_start(&m, StdDuration::ZERO, now),
            Some(noon() + Duration::minutes(2))
        );
    }

    #[test]
    fn next_delay_pushes_the_floor_forward() {
        let now = noon();
        let m = meta(Some(EVERY_SECOND), now - Duration::seconds(10));
        // floor = 12:00:05, next occurrence after the skipped one = 12:00:06
        assert_eq!(
            next_start(&m, StdDuration::from_secs(5), now),
            Some(now + Duration::seconds(6))
        );
    }

    #[test]
    fn stop_at_bounds_the_result() {
        let now = noon();
        let mut m = meta(Some(EVERY_MINUTE), now - Duration::seconds(90));
        m.stop_at = Some(now + Duration::seconds(30));
        // computed 12:02:00 exceeds stop_at 12:00:30
        assert_eq!(next_start(&m, StdDuration::ZERO, now), None);

        m.stop_at = Some(now + Duration::minutes(5));
        assert!(next_start(&m, StdDuration::ZERO, now).is_some());
    }

    #[test]
    fn malformed_interval_retires_the_job() {
        let now = noon();
        let m = meta(Some("definitely not cron"), now - Duration::seconds(10));
        assert_eq!(next_start(&m, StdDuration::ZERO, now), None);
    }
}
