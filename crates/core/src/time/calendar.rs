use anyhow::Context;
use chrono::{Duration, NaiveDate};

// All dates here are local calendar dates, never instants; no timezone
// conversion happens anywhere.

// Default display window: today .. today + 13, two weeks of nightly prices.
pub const DEFAULT_WINDOW_DAYS: i64 = 13;

pub fn to_iso(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

pub fn from_iso(s: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .with_context(|| format!("invalid calendar date (expected YYYY-MM-DD): {s}"))
}

pub fn add_days(d: NaiveDate, n: i64) -> NaiveDate {
    d + Duration::days(n)
}

pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}
