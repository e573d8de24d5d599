//! Validation of operator-submitted schedule windows.
//!
//! A submission is all-or-nothing: the first invalid entry rejects the set
//! before anything is written.

use std::sync::LazyLock;

use chrono::NaiveTime;
use lifecheck_model::{LooseInteger, ScheduleWindow, ScheduleWindowInput};
use regex::Regex;
use thiserror::Error;

static START_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2}):(\d{2})$").expect("start time pattern is valid")
});

/// Why a schedule entry was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleValidationError {
    #[error("schedule must contain at least one window")]
    Empty,

    #[error("entry {index}: month must be 1-12, got {value}")]
    InvalidMonth { index: usize, value: String },

    #[error("entry {index}: day must be 1-31, got {value}")]
    InvalidDay { index: usize, value: String },

    #[error("entry {index}: duration must be 0-24 hours, got {value}")]
    InvalidDuration { index: usize, value: String },

    #[error("entry {index}: start time must be HH:MM, got {value:?}")]
    InvalidStartTime { index: usize, value: String },
}

fn describe(value: &LooseInteger) -> String {
    match value {
        LooseInteger::Integer(v) => v.to_string(),
        LooseInteger::Float(v) => v.to_string(),
        LooseInteger::Text(v) => format!("{v:?}"),
    }
}

fn in_range(value: &LooseInteger, min: i64, max: i64) -> Option<u32> {
    value
        .as_integer()
        .filter(|v| (min..=max).contains(v))
        .and_then(|v| u32::try_from(v).ok())
}

/// Parses `H:MM` or `HH:MM` with hour 0-23 and minute 0-59; seconds are
/// always zero.
pub fn parse_start_time(raw: &str) -> Option<NaiveTime> {
    let captures = START_TIME.captures(raw.trim())?;
    let hour: u32 = captures.get(1)?.as_str().parse().ok()?;
    let minute: u32 = captures.get(2)?.as_str().parse().ok()?;
    if hour > 23 || minute > 59 {
        return None;
    }
    NaiveTime::from_hms_opt(hour, minute, 0)
}

/// Checks one entry and converts it to a stored window.
pub fn validate_window(
    index: usize,
    input: &ScheduleWindowInput,
) -> Result<ScheduleWindow, ScheduleValidationError> {
    let month = in_range(&input.month, 1, 12).ok_or_else(|| {
        ScheduleValidationError::InvalidMonth {
            index,
            value: describe(&input.month),
        }
    })?;
    let day = in_range(&input.day, 1, 31).ok_or_else(|| {
        ScheduleValidationError::InvalidDay {
            index,
            value: describe(&input.day),
        }
    })?;
    let duration_hours = in_range(&input.duration_hours, 0, 24).ok_or_else(|| {
        ScheduleValidationError::InvalidDuration {
            index,
            value: describe(&input.duration_hours),
        }
    })?;
    let start_time = parse_start_time(&input.start_time).ok_or_else(|| {
        ScheduleValidationError::InvalidStartTime {
            index,
            value: input.start_time.clone(),
        }
    })?;

    Ok(ScheduleWindow {
        month,
        day,
        start_time,
        duration_hours,
    })
}

/// Validates a full replacement set, sorted in evaluation order.
pub fn validate_windows(
    inputs: &[ScheduleWindowInput],
) -> Result<Vec<ScheduleWindow>, ScheduleValidationError> {
    if inputs.is_empty() {
        return Err(ScheduleValidationError::Empty);
    }

    let mut windows = inputs
        .iter()
        .enumerate()
        .map(|(index, input)| validate_window(index, input))
        .collect::<Result<Vec<_>, _>>()?;
    windows.sort_by_key(ScheduleWindow::sort_key);
    Ok(windows)
}

#[cfg(test)]
mod tests {
    use chrono::Timelike;

    use super::*;

    fn input(month: LooseInteger, day: LooseInteger, time: &str, hours: LooseInteger) -> ScheduleWindowInput {
        ScheduleWindowInput {
            month,
            day,
            start_time: time.to_string(),
            duration_hours: hours,
        }
    }

    fn int(v: i64) -> LooseInteger {
        LooseInteger::Integer(v)
    }

    #[test]
    fn accepts_numbers_and_numeric_strings() {
        let windows = validate_windows(&[
            input(LooseInteger::Text("3".into()), int(15), "2:00", int(4)),
            input(int(1), LooseInteger::Text(" 2 ".into()), "23:59", LooseInteger::Float(24.0)),
        ])
        .expect("valid set");

        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].month, 1);
        assert_eq!(windows[0].duration_hours, 24);
        assert_eq!(windows[1].start_time.hour(), 2);
        assert_eq!(windows[1].start_time.second(), 0);
    }

    #[test]
    fn empty_set_is_rejected() {
        assert_eq!(validate_windows(&[]), Err(ScheduleValidationError::Empty));
    }

    #[test]
    fn one_bad_entry_rejects_the_whole_set() {
        let err = validate_windows(&[
            input(int(3), int(15), "02:00", int(4)),
            input(int(13), int(1), "02:00", int(4)),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            ScheduleValidationError::InvalidMonth {
                index: 1,
                value: "13".into()
            }
        );
    }

    #[test]
    fn rejects_out_of_range_fields() {
        assert!(matches!(
            validate_window(0, &input(int(1), int(0), "02:00", int(1))),
            Err(ScheduleValidationError::InvalidDay { .. })
        ));
        assert!(matches!(
            validate_window(0, &input(int(1), int(1), "02:00", int(25))),
            Err(ScheduleValidationError::InvalidDuration { .. })
        ));
        assert!(matches!(
            validate_window(0, &input(int(1), int(1), "02:00", LooseInteger::Float(1.5))),
            Err(ScheduleValidationError::InvalidDuration { .. })
        ));
        assert!(matches!(
            validate_window(0, &input(LooseInteger::Text("x".into()), int(1), "02:00", int(1))),
            Err(ScheduleValidationError::InvalidMonth { .. })
        ));
    }

    #[test]
    fn start_time_formats() {
        assert!(parse_start_time("0:00").is_some());
        assert!(parse_start_time("09:05").is_some());
        assert!(parse_start_time("24:00").is_none());
        assert!(parse_start_time("12:60").is_none());
        assert!(parse_start_time("12:5").is_none());
        assert!(parse_start_time("12:00:00").is_none());
        assert!(parse_start_time("").is_none());
    }
}
