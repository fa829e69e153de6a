use crate::utils::validation::validate_date_range;
use anyhow::Result;
use chrono::{Datelike, Duration, NaiveDate};
use std::str::FromStr;

/// Named date windows for punch synchronisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatePeriod {
    Today,
    Yesterday,
    ThisWeek,
    LastWeek,
    ThisMonth,
    LastMonth,
}

impl DatePeriod {
    /// Inclusive (start, end) of the period relative to `today`.
    pub fn resolve(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        match self {
            DatePeriod::Today => (today, today),
            DatePeriod::Yesterday => {
                let yesterday = today - Duration::days(1);
                (yesterday, yesterday)
            }
            DatePeriod::ThisWeek => (today - Duration::days(6), today),
            DatePeriod::LastWeek => (today - Duration::days(13), today - Duration::days(7)),
            DatePeriod::ThisMonth => (first_of_month(today), today),
            DatePeriod::LastMonth => {
                let last_of_previous = first_of_month(today) - Duration::days(1);
                (first_of_month(last_of_previous), last_of_previous)
            }
        }
    }
}

impl FromStr for DatePeriod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "today" => Ok(DatePeriod::Today),
            "yesterday" => Ok(DatePeriod::Yesterday),
            "this-week" => Ok(DatePeriod::ThisWeek),
            "last-week" => Ok(DatePeriod::LastWeek),
            "this-month" => Ok(DatePeriod::ThisMonth),
            "last-month" => Ok(DatePeriod::LastMonth),
            _ => Err(anyhow::anyhow!("Unknown period: {}", s)),
        }
    }
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.day0() as i64)
}

/// Picks the sync window: an explicit range, a named period, or yesterday..today.
pub fn resolve_window(
    period: Option<DatePeriod>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    today: NaiveDate,
) -> Result<(NaiveDate, NaiveDate)> {
    let (start, end) = match (period, from, to) {
        (Some(_), Some(_), _) | (Some(_), _, Some(_)) => {
            return Err(anyhow::anyhow!("Use either a period or an explicit date range, not both"));
        }
        (Some(period), None, None) => period.resolve(today),
        (None, Some(from), Some(to)) => (from, to),
        (None, Some(from), None) => (from, today),
        (None, None, Some(to)) => (to, to),
        (None, None, None) => (today - Duration::days(1), today),
    };

    validate_date_range(start, end)?;
    Ok((start, end))
}
