//! Comparison windows.
//!
//! A [`Period`] is a closed interval of calendar days. Every headline metric
//! compares the requested period (P2) against the immediately preceding
//! period of equal length (P1) and the one before that (P0).
//!
//! ## Day counting
//!
//! `duration` is the raw difference `to - from` in days. The preceding
//! period is `[from - duration - 1, from - 1]`, so all three periods span
//! `duration + 1` calendar days and sit back to back:
//!
//! ```text
//!   P0                P1                P2
//! [a ........ b] [b+1 ...... c] [c+1 ...... to]
//! ```

use crate::error::{Error, Result};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::Serialize;

/// A closed `[from, to]` range of calendar days.
///
/// Construction guarantees `from <= to`, so anything that accepts a
/// `Period` is range-checked already.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Period {
    from: NaiveDate,
    to: NaiveDate,
}

impl Period {
    /// Build a period, failing with [`Error::InvalidRange`] if `to < from`.
    pub fn new(from: NaiveDate, to: NaiveDate) -> Result<Self> {
        if to < from {
            return Err(Error::InvalidRange { from, to });
        }
        Ok(Self { from, to })
    }

    /// Parse an ISO date pair (`YYYY-MM-DD`, or RFC 3339 timestamps truncated to the day).
    pub fn parse(from: &str, to: &str) -> Result<Self> {
        Self::new(parse_date(from)?, parse_date(to)?)
    }

    /// A single day.
    pub fn day(date: NaiveDate) -> Self {
        Self { from: date, to: date }
    }

    /// The `days`-long window ending on `to` (inclusive).
    ///
    /// Fails with [`Error::InvalidInput`] if the window would start before
    /// the earliest representable date.
    pub fn trailing(to: NaiveDate, days: u32) -> Result<Self> {
        let span = i64::from(days.max(1)) - 1;
        let from = to
            .checked_sub_signed(Duration::days(span))
            .ok_or_else(|| out_of_range(format!("{days}-day window ending {to}")))?;
        Ok(Self { from, to })
    }

    pub fn from(&self) -> NaiveDate {
        self.from
    }

    pub fn to(&self) -> NaiveDate {
        self.to
    }

    /// Raw day difference `to - from`.
    pub fn duration_days(&self) -> i64 {
        (self.to - self.from).num_days()
    }

    /// Inclusive day count, as shown to users.
    pub fn day_count(&self) -> i64 {
        self.duration_days() + 1
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }

    /// The period immediately before this one, of the same length.
    pub fn preceding(&self) -> Result<Self> {
        let duration = Duration::days(self.duration_days());
        let from = self
            .from
            .checked_sub_signed(Duration::days(1))
            .and_then(|to| to.checked_sub_signed(duration).map(|from| (from, to)));
        match from {
            Some((from, to)) => Ok(Self { from, to }),
            None => Err(out_of_range(format!("period before {self}"))),
        }
    }

    /// Every day in the period, ascending.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let from = self.from;
        (0..self.day_count()).map(move |offset| from + Duration::days(offset))
    }

    /// Calendar months intersecting this period, each as its full month.
    pub fn calendar_months(&self) -> Vec<Period> {
        let mut months = Vec::new();
        let mut start = month_start(self.from);
        while start <= self.to {
            let month = Period {
                from: start,
                to: month_end(start),
            };
            months.push(month);
            match month.to.succ_opt() {
                Some(next) => start = next,
                None => break,
            }
        }
        months
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..={}", self.from, self.to)
    }
}

/// The requested period and the two that precede it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodSet {
    /// P2: the requested period
    pub current: Period,
    /// P1: immediately preceding, same length
    pub previous: Period,
    /// P0: the period before P1
    pub prior: Period,
}

impl PeriodSet {
    pub fn for_period(current: Period) -> Result<Self> {
        let previous = current.preceding()?;
        let prior = previous.preceding()?;
        Ok(Self {
            current,
            previous,
            prior,
        })
    }
}

/// Derive P2/P1/P0 for `[from, to]`.
pub fn derive_periods(from: NaiveDate, to: NaiveDate) -> Result<PeriodSet> {
    PeriodSet::for_period(Period::new(from, to)?)
}

fn out_of_range(what: String) -> Error {
    Error::InvalidInput(format!("{what} is outside the supported date range"))
}

/// Parse a calendar date, accepting RFC 3339 timestamps (truncated to the UTC day).
pub fn parse_date(input: &str) -> Result<NaiveDate> {
    let trimmed = input.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(date);
    }
    DateTime::parse_from_rfc3339(trimmed)
        .map(|dt| dt.with_timezone(&Utc).date_naive())
        .map_err(|_| Error::InvalidDate(input.to_string()))
}

/// First day of the month containing `date`.
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Last day of the month containing `date`.
pub fn month_end(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .map(|next| next - Duration::days(1))
        .unwrap_or(date)
}

/// Monday of the ISO week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

/// First day of the calendar quarter containing `date`.
pub fn quarter_start(date: NaiveDate) -> NaiveDate {
    let month = (date.month0() / 3) * 3 + 1;
    NaiveDate::from_ymd_opt(date.year(), month, 1).unwrap_or(date)
}

/// Last day of the calendar quarter containing `date`.
pub fn quarter_end(date: NaiveDate) -> NaiveDate {
    let start = quarter_start(date);
    month_end(start + Duration::days(62))
}
