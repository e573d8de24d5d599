//! Buddhist-era date helpers used by both registries.
//!
//! Registries exchange birth dates as eight digits `YYYYMMDD` where the year
//! is counted in the Buddhist era (Gregorian year + 543).

use chrono::{Datelike, NaiveDate};

pub const BUDDHIST_ERA_OFFSET: i32 = 543;

/// Formats `date` as a Buddhist-era `YYYYMMDD` string.
pub fn to_buddhist_compact(date: NaiveDate) -> String {
    format!(
        "{:04}{:02}{:02}",
        date.year() + BUDDHIST_ERA_OFFSET,
        date.month(),
        date.day()
    )
}

/// Parses a Buddhist-era `YYYYMMDD` string into a Gregorian date.
///
/// Returns `None` for anything that is not exactly eight digits naming a real
/// calendar day; registries use zeroed month/day for partially known dates.
pub fn parse_buddhist_compact(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.len() != 8 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year: i32 = raw[0..4].parse().ok()?;
    let month: u32 = raw[4..6].parse().ok()?;
    let day: u32 = raw[6..8].parse().ok()?;
    NaiveDate::from_ymd_opt(year - BUDDHIST_ERA_OFFSET, month, day)
}
