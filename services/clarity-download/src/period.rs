//! Date range selection
//!
//! `--period` accepts three forms:
//! - `month`: the whole previous calendar month
//! - `N` (digits only): the last N days up to and including today
//! - `YYYY-MM-DD/YYYY-MM-DD`: an explicit inclusive interval

use std::fmt;

use chrono::{Datelike, Days, NaiveDate};

use crate::error::{Error, Result};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Placeholder in filename templates replaced by [`DateInterval::file_safe`].
pub const DATERANGE_TOKEN: &str = "DATERANGE";

/// Inclusive date interval, rendered as `start/end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateInterval {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateInterval {
    /// The interval with `/` swapped for `:` so it can go in a filename.
    pub fn file_safe(&self) -> String {
        self.to_string().replace('/', ":")
    }

    /// Substitute this interval into a filename template.
    pub fn render_file_name(&self, template: &str) -> String {
        template.replace(DATERANGE_TOKEN, &self.file_safe())
    }
}

impl fmt::Display for DateInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}",
            self.start.format(DATE_FORMAT),
            self.end.format(DATE_FORMAT)
        )
    }
}

fn invalid(input: &str, reason: impl Into<String>) -> Error {
    Error::InvalidPeriod {
        input: input.to_string(),
        reason: reason.into(),
    }
}

/// Resolve a `--period` value relative to `today`.
pub fn resolve_period(input: &str, today: NaiveDate) -> Result<DateInterval> {
    let input = input.trim();

    if input == "month" {
        return previous_month(input, today);
    }

    if !input.is_empty() && input.chars().all(|c| c.is_ascii_digit()) {
        let days: u64 = input
            .parse()
            .map_err(|_| invalid(input, "day count out of range"))?;
        let start = today
            .checked_sub_days(Days::new(days))
            .ok_or_else(|| invalid(input, "day count reaches before the calendar"))?;
        return Ok(DateInterval { start, end: today });
    }

    let (start, end) = input
        .split_once('/')
        .ok_or_else(|| invalid(input, "expected month, a day count, or YYYY-MM-DD/YYYY-MM-DD"))?;
    let start = NaiveDate::parse_from_str(start, DATE_FORMAT)
        .map_err(|e| invalid(input, format!("start date: {e}")))?;
    let end = NaiveDate::parse_from_str(end, DATE_FORMAT)
        .map_err(|e| invalid(input, format!("end date: {e}")))?;
    if start > end {
        return Err(invalid(input, "start date is after end date"));
    }
    Ok(DateInterval { start, end })
}

/// First through last day of the month before `today`'s.
fn previous_month(input: &str, today: NaiveDate) -> Result<DateInterval> {
    let end = NaiveDate::from_ymd_opt(today.year(), today.month(), 1)
        .and_then(|first_of_this_month| first_of_this_month.pred_opt())
        .ok_or_else(|| invalid(input, "no previous month"))?;
    let start = NaiveDate::from_ymd_opt(end.year(), end.month(), 1)
        .ok_or_else(|| invalid(input, "no previous month"))?;
    Ok(DateInterval { start, end })
}
