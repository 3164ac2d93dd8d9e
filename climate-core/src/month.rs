//! Month name to date range lookup for the fixed reference year.

use std::{fmt, str::FromStr};

use anyhow::anyhow;
use chrono::NaiveDate;
use serde::Serialize;

/// All ranges are taken from this single calendar year.
pub const REFERENCE_YEAR: i32 = 2024;

/// Range used when a month name is missing or not recognised.
pub const FULL_YEAR: MonthRange = MonthRange {
    start_date: "2024-01-01",
    end_date: "2024-12-31",
};

/// Inclusive pair of ISO-8601 dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MonthRange {
    pub start_date: &'static str,
    pub end_date: &'static str,
}

impl MonthRange {
    pub fn start(&self) -> NaiveDate {
        parse_iso(self.start_date)
    }

    pub fn end(&self) -> NaiveDate {
        parse_iso(self.end_date)
    }

    /// Number of days covered, both ends included.
    pub fn days(&self) -> i64 {
        (self.end() - self.start()).num_days() + 1
    }
}

impl fmt::Display for MonthRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.start_date, self.end_date)
    }
}

// Table entries are compile-time constants checked by tests.
fn parse_iso(date: &str) -> NaiveDate {
    NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap_or_default()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Month {
    January,
    February,
    March,
    April,
    May,
    June,
    July,
    August,
    September,
    October,
    November,
    December,
}

impl Month {
    pub const fn all() -> &'static [Month] {
        &[
            Month::January,
            Month::February,
            Month::March,
            Month::April,
            Month::May,
            Month::June,
            Month::July,
            Month::August,
            Month::September,
            Month::October,
            Month::November,
            Month::December,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Month::January => "january",
            Month::February => "february",
            Month::March => "march",
            Month::April => "april",
            Month::May => "may",
            Month::June => "june",
            Month::July => "july",
            Month::August => "august",
            Month::September => "september",
            Month::October => "october",
            Month::November => "november",
            Month::December => "december",
        }
    }

    pub fn range(&self) -> MonthRange {
        let (start_date, end_date) = match self {
            Month::January => ("2024-01-01", "2024-01-31"),
            Month::February => ("2024-02-01", "2024-02-29"),
            Month::March => ("2024-03-01", "2024-03-31"),
            Month::April => ("2024-04-01", "2024-04-30"),
            Month::May => ("2024-05-01", "2024-05-31"),
            Month::June => ("2024-06-01", "2024-06-30"),
            Month::July => ("2024-07-01", "2024-07-31"),
            Month::August => ("2024-08-01", "2024-08-31"),
            Month::September => ("2024-09-01", "2024-09-30"),
            Month::October => ("2024-10-01", "2024-10-31"),
            Month::November => ("2024-11-01", "2024-11-30"),
            Month::December => ("2024-12-01", "2024-12-31"),
        };
        MonthRange {
            start_date,
            end_date,
        }
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Month {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let lower = value.to_lowercase();

        Month::all()
            .iter()
            .copied()
            .find(|m| m.as_str() == lower)
            .ok_or_else(|| anyhow!("Unknown month '{value}'. Expected an English month name."))
    }
}

/// Resolve a month name to its date range.
///
/// Matching ignores case. Anything that is not one of the twelve English
/// month names, the empty string included, resolves to [`FULL_YEAR`].
pub fn resolve_month(name: &str) -> MonthRange {
    match name.parse::<Month>() {
        Ok(month) => month.range(),
        Err(_) => {
            tracing::debug!(month = name, "unrecognised month, using full year");
            FULL_YEAR
        }
    }
}
