//! Recurrence arithmetic for repeating reminders.
//!
//! # Responsibility
//! - Advance a reminder instant by one repeat period in local wall-clock time.
//!
//! # Invariants
//! - Time-of-day is preserved in the target time zone; the UTC offset is
//!   re-derived at the new date, so DST changes never shift the local time.
//! - Month/quarter/year steps clamp the day-of-month to the last valid day
//!   (Jan 31 + 1 month = Feb 28/29), never roll over into the next month.
//! - Functions here are pure: same inputs, same time zone, same output.

use crate::model::reminder::RepeatFrequency;
use chrono::{DateTime, Datelike, Days, Local, LocalResult, NaiveDate, NaiveDateTime, TimeZone};
use log::warn;

/// Longest DST gap we step across when a wall-clock time does not exist.
const MAX_GAP_MINUTES: i64 = 4 * 60;
/// Upper bound on periods walked by [`next_fire_at_after`].
const MAX_CATCH_UP_STEPS: u32 = 20_000;

/// Computes the next fire instant in the device time zone.
///
/// Returns `current_fire_at` unchanged for `RepeatFrequency::None` and for
/// instants that cannot be represented as a local date-time.
pub fn next_fire_at(current_fire_at: i64, frequency: RepeatFrequency) -> i64 {
    next_fire_at_in(&Local, current_fire_at, frequency)
}

/// Computes the next fire instant in `tz`.
pub fn next_fire_at_in<Tz: TimeZone>(
    tz: &Tz,
    current_fire_at: i64,
    frequency: RepeatFrequency,
) -> i64 {
    if !frequency.is_repeating() {
        return current_fire_at;
    }

    match try_next_fire_at_in(tz, current_fire_at, frequency) {
        Some(next) => next,
        None => {
            warn!(
                "event=recurrence_next module=reminder status=error frequency={} fire_at={} error_code=unrepresentable_instant",
                frequency.as_str(),
                current_fire_at
            );
            current_fire_at
        }
    }
}

/// Advances `fire_at` period by period until it lies strictly after `now_ms`.
///
/// Used to catch a repeating reminder up after missed occurrences. Returns
/// `None` for non-repeating frequencies, unrepresentable instants, or when
/// the step bound is exhausted.
pub fn next_fire_at_after<Tz: TimeZone>(
    tz: &Tz,
    fire_at: i64,
    frequency: RepeatFrequency,
    now_ms: i64,
) -> Option<i64> {
    if !frequency.is_repeating() {
        return None;
    }

    let mut candidate = fire_at;
    for _ in 0..MAX_CATCH_UP_STEPS {
        if candidate > now_ms {
            return Some(candidate);
        }
        let next = try_next_fire_at_in(tz, candidate, frequency)?;
        if next <= candidate {
            return None;
        }
        candidate = next;
    }
    None
}

fn try_next_fire_at_in<Tz: TimeZone>(
    tz: &Tz,
    current_fire_at: i64,
    frequency: RepeatFrequency,
) -> Option<i64> {
    let utc = DateTime::from_timestamp_millis(current_fire_at)?;
    let local = utc.with_timezone(tz).naive_local();
    let next_date = advance_date(local.date(), frequency)?;
    let target = next_date.and_time(local.time());
    resolve_local(tz, target).map(|instant| instant.timestamp_millis())
}

/// Advances a calendar date by one repeat period.
pub fn advance_date(date: NaiveDate, frequency: RepeatFrequency) -> Option<NaiveDate> {
    match frequency {
        RepeatFrequency::None => Some(date),
        RepeatFrequency::Daily => date.checked_add_days(Days::new(1)),
        RepeatFrequency::Weekly => date.checked_add_days(Days::new(7)),
        RepeatFrequency::Monthly => add_months_clamped(date, 1),
        RepeatFrequency::Quarterly => add_months_clamped(date, 3),
        RepeatFrequency::Yearly => add_months_clamped(date, 12),
    }
}

fn add_months_clamped(date: NaiveDate, months: u32) -> Option<NaiveDate> {
    let total_months = date.month0() + months;
    let year = date.year().checked_add(i32::try_from(total_months / 12).ok()?)?;
    let month = total_months % 12 + 1;
    let day = date.day().min(days_in_month(year, month)?);
    NaiveDate::from_ymd_opt(year, month, day)
}

fn days_in_month(year: i32, month: u32) -> Option<u32> {
    let (next_year, next_month) = if month == 12 {
        (year.checked_add(1)?, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)?
        .pred_opt()
        .map(|last| last.day())
}

/// Maps a wall-clock time to an instant in `tz`.
///
/// Ambiguous times (DST fall-back) take the earlier instant. Times inside a
/// DST gap move forward to the first wall-clock minute that exists.
fn resolve_local<Tz: TimeZone>(tz: &Tz, target: NaiveDateTime) -> Option<DateTime<Tz>> {
    match tz.from_local_datetime(&target) {
        LocalResult::Single(instant) => Some(instant),
        LocalResult::Ambiguous(earliest, _) => Some(earliest),
        LocalResult::None => (1..=MAX_GAP_MINUTES).find_map(|minutes| {
            let shifted = target.checked_add_signed(chrono::Duration::minutes(minutes))?;
            tz.from_local_datetime(&shifted).earliest()
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::{advance_date, next_fire_at_after, next_fire_at_in};
    use crate::model::reminder::RepeatFrequency;
    use chrono::{FixedOffset, NaiveDate, TimeZone, Timelike, Utc};
    use chrono_tz::America::New_York;

    const HOUR_MS: i64 = 60 * 60 * 1000;

    fn at<Tz: TimeZone>(tz: &Tz, y: i32, m: u32, d: u32, h: u32, min: u32) -> i64 {
        tz.with_ymd_and_hms(y, m, d, h, min, 0)
            .single()
            .expect("unambiguous test instant")
            .timestamp_millis()
    }

    #[test]
    fn monthly_clamps_to_leap_day() {
        let start = at(&Utc, 2024, 1, 31, 9, 0);
        let next = next_fire_at_in(&Utc, start, RepeatFrequency::Monthly);
        assert_eq!(next, at(&Utc, 2024, 2, 29, 9, 0));
    }

    #[test]
    fn monthly_clamps_in_non_leap_year() {
        let start = at(&Utc, 2023, 1, 31, 9, 0);
        let next = next_fire_at_in(&Utc, start, RepeatFrequency::Monthly);
        assert_eq!(next, at(&Utc, 2023, 2, 28, 9, 0));
    }

    #[test]
    fn quarterly_crosses_year_and_clamps() {
        let start = at(&Utc, 2024, 11, 30, 7, 15);
        let next = next_fire_at_in(&Utc, start, RepeatFrequency::Quarterly);
        assert_eq!(next, at(&Utc, 2025, 2, 28, 7, 15));
    }

    #[test]
    fn yearly_from_leap_day_clamps() {
        let start = at(&Utc, 2024, 2, 29, 18, 30);
        let next = next_fire_at_in(&Utc, start, RepeatFrequency::Yearly);
        assert_eq!(next, at(&Utc, 2025, 2, 28, 18, 30));
    }

    #[test]
    fn none_leaves_instant_unchanged() {
        let start = at(&Utc, 2024, 5, 1, 8, 0);
        assert_eq!(
            next_fire_at_in(&Utc, start, RepeatFrequency::None),
            start
        );
    }

    #[test]
    fn repeating_frequencies_preserve_local_time_of_day() {
        let tz = FixedOffset::east_opt(5 * 3600 + 1800).expect("valid offset");
        let start = at(&tz, 2024, 3, 10, 23, 45);
        for frequency in [
            RepeatFrequency::Daily,
            RepeatFrequency::Weekly,
            RepeatFrequency::Monthly,
            RepeatFrequency::Quarterly,
            RepeatFrequency::Yearly,
        ] {
            let next = next_fire_at_in(&tz, start, frequency);
            assert!(next > start, "{frequency:?} must move forward");
            let local = tz.timestamp_millis_opt(next).single().expect("valid instant");
            assert_eq!((local.hour(), local.minute()), (23, 45), "{frequency:?}");
        }
    }

    #[test]
    fn applying_twice_advances_two_periods() {
        let start = at(&Utc, 2024, 1, 15, 6, 5);
        let daily = next_fire_at_in(
            &Utc,
            next_fire_at_in(&Utc, start, RepeatFrequency::Daily),
            RepeatFrequency::Daily,
        );
        assert_eq!(daily, at(&Utc, 2024, 1, 17, 6, 5));

        let monthly = next_fire_at_in(
            &Utc,
            next_fire_at_in(&Utc, start, RepeatFrequency::Monthly),
            RepeatFrequency::Monthly,
        );
        assert_eq!(monthly, at(&Utc, 2024, 3, 15, 6, 5));
    }

    #[test]
    fn same_arguments_give_same_result() {
        let start = at(&Utc, 2024, 8, 31, 12, 0);
        let first = next_fire_at_in(&Utc, start, RepeatFrequency::Monthly);
        let second = next_fire_at_in(&Utc, start, RepeatFrequency::Monthly);
        assert_eq!(first, second);
    }

    #[test]
    fn daily_across_dst_changes_keeps_wall_clock_time() {
        let tz = New_York;
        let before_spring = at(&tz, 2024, 3, 9, 9, 0);
        let after_spring = next_fire_at_in(&tz, before_spring, RepeatFrequency::Daily);
        assert_eq!(after_spring, at(&Utc, 2024, 3, 10, 13, 0));
        assert_eq!(after_spring - before_spring, 23 * HOUR_MS);

        let before_fall = at(&tz, 2024, 11, 2, 9, 0);
        let after_fall = next_fire_at_in(&tz, before_fall, RepeatFrequency::Daily);
        assert_eq!(after_fall, at(&Utc, 2024, 11, 3, 14, 0));
        assert_eq!(after_fall - before_fall, 25 * HOUR_MS);
    }

    #[test]
    fn time_inside_spring_forward_gap_moves_to_first_valid_minute() {
        let tz = New_York;
        let start = at(&tz, 2024, 3, 9, 2, 30);
        let next = next_fire_at_in(&tz, start, RepeatFrequency::Daily);

        // 03:00 EDT
        assert_eq!(next, at(&Utc, 2024, 3, 10, 7, 0));
        let local = tz.timestamp_millis_opt(next).single().expect("valid instant");
        assert_eq!((local.hour(), local.minute()), (3, 0));
    }

    #[test]
    fn ambiguous_fall_back_time_takes_earlier_instant() {
        let tz = New_York;
        let start = at(&tz, 2024, 11, 2, 1, 30);
        let next = next_fire_at_in(&tz, start, RepeatFrequency::Daily);

        // 01:30 EDT, one hour before the 01:30 EST repeat
        assert_eq!(next, at(&Utc, 2024, 11, 3, 5, 30));
        let local = tz.timestamp_millis_opt(next).single().expect("valid instant");
        assert_eq!((local.hour(), local.minute()), (1, 30));
    }

    #[test]
    fn advance_date_weekly_crosses_month() {
        let date = NaiveDate::from_ymd_opt(2024, 12, 28).expect("valid date");
        assert_eq!(
            advance_date(date, RepeatFrequency::Weekly),
            NaiveDate::from_ymd_opt(2025, 1, 4)
        );
    }

    #[test]
    fn catch_up_walks_past_now() {
        let start = at(&Utc, 2024, 1, 1, 9, 0);
        let now = at(&Utc, 2024, 1, 4, 12, 0);
        assert_eq!(
            next_fire_at_after(&Utc, start, RepeatFrequency::Daily, now),
            Some(at(&Utc, 2024, 1, 5, 9, 0))
        );
        assert_eq!(
            next_fire_at_after(&Utc, start, RepeatFrequency::None, now),
            None
        );
    }
}
