use std::fmt;

use chrono::{NaiveTime, Timelike};

/// One annual trigger window.
///
/// `month`/`day`/`start_time` name the opening instant each year and
/// `duration_hours` how long the window stays open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScheduleWindow {
    pub month: u32,
    pub day: u32,
    pub start_time: NaiveTime,
    pub duration_hours: u32,
}

impl ScheduleWindow {
    /// Ordering used when several windows are eligible on the same tick.
    pub fn sort_key(&self) -> (u32, u32, u32, u32, u32) {
        (
            self.month,
            self.day,
            self.start_time.hour(),
            self.start_time.minute(),
            self.start_time.second(),
        )
    }

    /// Stable per-window key used to dedupe triggers within a day.
    pub fn schedule_key(&self) -> String {
        format!(
            "{}-{}-{}:{}:{}-{}",
            self.day,
            self.month,
            self.start_time.hour(),
            self.start_time.minute(),
            self.start_time.second(),
            self.duration_hours
        )
    }
}

impl fmt::Display for ScheduleWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}/{:02} {} for {}h",
            self.day,
            self.month,
            self.start_time.format("%H:%M:%S"),
            self.duration_hours
        )
    }
}

/// Integer that may arrive as a JSON number or a numeric string.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum LooseInteger {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl LooseInteger {
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            LooseInteger::Integer(value) => Some(*value),
            LooseInteger::Float(value)
                if value.is_finite() && value.fract() == 0.0 =>
            {
                Some(*value as i64)
            }
            LooseInteger::Float(_) => None,
            LooseInteger::Text(raw) => raw.trim().parse().ok(),
        }
    }
}

impl From<i64> for LooseInteger {
    fn from(value: i64) -> Self {
        LooseInteger::Integer(value)
    }
}

/// Unvalidated schedule entry as submitted by an operator.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScheduleWindowInput {
    pub month: LooseInteger,
    pub day: LooseInteger,
    #[cfg_attr(
        feature = "serde",
        serde(rename = "startTime", alias = "start_time")
    )]
    pub start_time: String,
    #[cfg_attr(
        feature = "serde",
        serde(
            rename = "durationHours",
            alias = "duration_hours",
            alias = "hours"
        )
    )]
    pub duration_hours: LooseInteger,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(month: u32, day: u32, h: u32, m: u32, hours: u32) -> ScheduleWindow {
        ScheduleWindow {
            month,
            day,
            start_time: NaiveTime::from_hms_opt(h, m, 0).unwrap(),
            duration_hours: hours,
        }
    }

    #[test]
    fn schedule_key_encodes_every_field() {
        assert_eq!(window(3, 15, 2, 0, 4).schedule_key(), "15-3-2:0:0-4");
    }

    #[test]
    fn windows_sort_by_calendar_then_time() {
        let mut windows = vec![
            window(6, 1, 8, 0, 2),
            window(3, 15, 9, 30, 1),
            window(3, 15, 2, 0, 4),
        ];
        windows.sort_by_key(ScheduleWindow::sort_key);
        assert_eq!(windows[0], window(3, 15, 2, 0, 4));
        assert_eq!(windows[2], window(6, 1, 8, 0, 2));
    }

    #[test]
    fn loose_integers_accept_numeric_strings() {
        assert_eq!(LooseInteger::Text(" 12 ".into()).as_integer(), Some(12));
        assert_eq!(LooseInteger::Float(4.0).as_integer(), Some(4));
        assert_eq!(LooseInteger::Float(4.5).as_integer(), None);
        assert_eq!(LooseInteger::Text("twelve".into()).as_integer(), None);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn input_deserializes_mixed_number_shapes() {
        let raw = r#"{"month": "3", "day": 15, "startTime": "02:00", "hours": 4}"#;
        let input: ScheduleWindowInput = serde_json::from_str(raw).unwrap();
        assert_eq!(input.month.as_integer(), Some(3));
        assert_eq!(input.day.as_integer(), Some(15));
        assert_eq!(input.duration_hours.as_integer(), Some(4));
        assert_eq!(input.start_time, "02:00");
    }
}
