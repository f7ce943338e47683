//! Date ranges and group-by dimensions for statistics requests.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate, Utc};

use crate::{Error, Result};

/// Fixed range options offered in the statistics menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RangeOption {
    Today,
    Yesterday,
    Last7Days,
    Last10Days,
    Last30Days,
    ThisMonth,
}

impl RangeOption {
    pub const ALL: [RangeOption; 6] = [
        RangeOption::Today,
        RangeOption::Yesterday,
        RangeOption::Last7Days,
        RangeOption::Last10Days,
        RangeOption::Last30Days,
        RangeOption::ThisMonth,
    ];

    /// Human label used on buttons and in the "You selected" prompt.
    pub fn label(self) -> &'static str {
        match self {
            RangeOption::Today => "Today",
            RangeOption::Yesterday => "Yesterday",
            RangeOption::Last7Days => "Last 7 Days",
            RangeOption::Last10Days => "Last 10 Days",
            RangeOption::Last30Days => "Last 30 Days",
            RangeOption::ThisMonth => "This Month",
        }
    }

    /// Short identifier used by the CLI and inside callback payloads.
    pub fn slug(self) -> &'static str {
        match self {
            RangeOption::Today => "today",
            RangeOption::Yesterday => "yesterday",
            RangeOption::Last7Days => "last_7_days",
            RangeOption::Last10Days => "last_10_days",
            RangeOption::Last30Days => "last_30_days",
            RangeOption::ThisMonth => "this_month",
        }
    }

    /// Compute the range relative to `today`.
    pub fn range(self, today: NaiveDate) -> DateRange {
        let days_back = |n: i64| today - Duration::days(n);
        match self {
            RangeOption::Today => DateRange::new(today, today),
            RangeOption::Yesterday => {
                let yesterday = days_back(1);
                DateRange::new(yesterday, yesterday)
            }
            RangeOption::Last7Days => DateRange::new(days_back(7), today),
            RangeOption::Last10Days => DateRange::new(days_back(10), today),
            RangeOption::Last30Days => DateRange::new(days_back(30), today),
            RangeOption::ThisMonth => {
                // Day 1 always exists for a valid year/month.
                let first = today.with_day(1).unwrap_or(today);
                DateRange::new(first, today)
            }
        }
    }
}

impl FromStr for RangeOption {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        RangeOption::ALL
            .into_iter()
            .find(|opt| opt.slug() == normalized)
            .ok_or_else(|| Error::InvalidArgument(format!("unknown date range: {}", s)))
    }
}

impl fmt::Display for RangeOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Inclusive calendar date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// `YYYY-MM-DD` start date, as the API expects it.
    pub fn start_param(&self) -> String {
        self.start.format("%Y-%m-%d").to_string()
    }

    /// `YYYY-MM-DD` finish date, as the API expects it.
    pub fn end_param(&self) -> String {
        self.end.format("%Y-%m-%d").to_string()
    }
}

/// Compute the range for `option` relative to the current UTC date.
pub fn date_range(option: RangeOption) -> DateRange {
    option.range(today())
}

/// Current UTC calendar date.
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Dimension used to bucket a statistics report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupBy {
    Date,
    Domain,
    Country,
}

impl GroupBy {
    pub const ALL: [GroupBy; 3] = [GroupBy::Date, GroupBy::Domain, GroupBy::Country];

    /// Value of the `group_by` request parameter.
    pub fn as_str(self) -> &'static str {
        match self {
            GroupBy::Date => "date",
            GroupBy::Domain => "domain",
            GroupBy::Country => "country",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            GroupBy::Date => "Date",
            GroupBy::Domain => "Domain",
            GroupBy::Country => "Country",
        }
    }
}

impl FromStr for GroupBy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_lowercase();
        GroupBy::ALL
            .into_iter()
            .find(|g| g.as_str() == normalized)
            .ok_or_else(|| Error::InvalidArgument(format!("unknown group-by: {}", s)))
    }
}

impl fmt::Display for GroupBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
