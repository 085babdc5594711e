use crate::time::calendar::{self, DEFAULT_WINDOW_DAYS};
use chrono::NaiveDate;

// from < to, always. Edits push `to` forward instead of failing, matching a
// pair of linked date pickers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Self {
        let min_to = calendar::add_days(from, 1);
        Self {
            from,
            to: to.max(min_to),
        }
    }

    pub fn default_window(from: NaiveDate) -> Self {
        Self {
            from,
            to: calendar::add_days(from, DEFAULT_WINDOW_DAYS),
        }
    }

    pub fn with_from(self, from: NaiveDate) -> Self {
        Self::new(from, self.to)
    }

    // `min_to` is an optional externally supplied floor for the end date.
    pub fn with_to(self, to: NaiveDate, min_to: Option<NaiveDate>) -> Self {
        let mut floor = calendar::add_days(self.from, 1);
        if let Some(min) = min_to {
            floor = floor.max(min);
        }
        Self {
            from: self.from,
            to: to.max(floor),
        }
    }

    pub fn nights(&self) -> i64 {
        (self.to - self.from).num_days()
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}..{}",
            calendar::to_iso(self.from),
            calendar::to_iso(self.to)
        )
    }
}
