//! Calendar window arithmetic for the trigger scheduler.
//!
//! All instants are local wall-clock times. A window opens every day from its
//! nominal date onward at `start_time` and stays open for `duration_hours`;
//! a window may cross midnight, in which case yesterday's anchor is still
//! considered.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use lifecheck_model::ScheduleWindow;

/// Nominal start date of `window` in `year`, `None` when the month/day pair
/// is not a real calendar date that year.
pub fn nominal_start_date(window: &ScheduleWindow, year: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, window.month, window.day)
}

fn interval_for(window: &ScheduleWindow, anchor: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
    let start = anchor.and_time(window.start_time);
    let end = start + Duration::hours(i64::from(window.duration_hours));
    (start, end)
}

/// The day (today or yesterday) whose opening of `window` contains `now`.
///
/// Anchors before `start_date` never count. Zero-length windows have no
/// anchor.
pub fn anchor_date(
    window: &ScheduleWindow,
    start_date: NaiveDate,
    now: NaiveDateTime,
) -> Option<NaiveDate> {
    if window.duration_hours == 0 {
        return None;
    }

    let today = now.date();
    [Some(today), today.pred_opt()]
        .into_iter()
        .flatten()
        .filter(|anchor| *anchor >= start_date)
        .find(|anchor| {
            let (start, end) = interval_for(window, *anchor);
            now >= start && now < end
        })
}

/// Whether `now` lies in `[start, start + duration)` for today's or
/// yesterday's anchor, counting only anchors on or after `start_date`.
pub fn within_window(
    window: &ScheduleWindow,
    start_date: NaiveDate,
    now: NaiveDateTime,
) -> bool {
    anchor_date(window, start_date, now).is_some()
}

/// Full eligibility check for the current year: the nominal date exists,
/// `now` is not before it, and `now` is inside an opening.
pub fn window_is_open(window: &ScheduleWindow, now: NaiveDateTime) -> bool {
    let Some(start_date) = nominal_start_date(window, now.year()) else {
        return false;
    };
    now.date() >= start_date && within_window(window, start_date, now)
}

/// Per-window dedupe key, stable across ticks.
pub fn schedule_key(window: &ScheduleWindow) -> String {
    window.schedule_key()
}

/// `YYYY-MM-DD` key of the day a trigger fired.
pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
