//! Period-over-period change.
//!
//! Two change conventions exist and must not be mixed:
//! - [`ChangeKind::Percent`] for amounts and counts (revenue, AOV, CAC, clients, ...)
//! - [`ChangeKind::Absolute`] for values already expressed in percent
//!   (margins, CSAT, retention, repeat-purchase rate) or on a fixed scale (ratings)

use super::period::{Period, PeriodSet};
use crate::error::Result;
use serde::Serialize;

/// Percentage change from `previous` to `current`.
///
/// Growth from zero is reported as a flat 100% (or 0% when `current` is not
/// positive). This is a known approximation: unbounded growth has no
/// distinct representation.
pub fn percent_change(current: f64, previous: f64) -> f64 {
    if previous == 0.0 {
        if current > 0.0 {
            100.0
        } else {
            0.0
        }
    } else {
        finite_or_zero(((current - previous) / previous) * 100.0)
    }
}

/// Difference in percentage points.
pub fn absolute_change(current: f64, previous: f64) -> f64 {
    finite_or_zero(current - previous)
}

/// `numerator / denominator`, or 0 when the denominator is 0.
pub fn safe_ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        finite_or_zero(numerator / denominator)
    }
}

/// `numerator / denominator * 100`, or 0 when the denominator is 0.
pub fn safe_percent(numerator: f64, denominator: f64) -> f64 {
    safe_ratio(numerator, denominator) * 100.0
}

/// Collapse NaN and infinities to 0.
pub fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// How a metric's change between two periods is expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Percent,
    Absolute,
}

impl ChangeKind {
    pub fn apply(self, current: f64, previous: f64) -> f64 {
        match self {
            ChangeKind::Percent => percent_change(current, previous),
            ChangeKind::Absolute => absolute_change(current, previous),
        }
    }
}

/// A metric's current value with its trend.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricValue {
    /// Value in the requested period
    pub value: f64,
    /// Change from the preceding period
    pub change: f64,
    /// The same change one step earlier (P0 -> P1). Absent for two-period metrics.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_period_change: Option<f64>,
    /// Value in the preceding period
    pub previous_value: f64,
}

impl MetricValue {
    /// Current vs. preceding period only.
    pub fn two_period(kind: ChangeKind, current: f64, previous: f64) -> Self {
        Self {
            value: finite_or_zero(current),
            change: kind.apply(current, previous),
            previous_period_change: None,
            previous_value: finite_or_zero(previous),
        }
    }

    /// Current vs. preceding, plus preceding vs. the one before.
    pub fn three_period(kind: ChangeKind, current: f64, previous: f64, prior: f64) -> Self {
        Self {
            previous_period_change: Some(kind.apply(previous, prior)),
            ..Self::two_period(kind, current, previous)
        }
    }
}

/// One value per comparison period.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodValues<T> {
    pub current: T,
    pub previous: T,
    pub prior: T,
}

impl<T> PeriodValues<T> {
    /// Trend of one scalar field across the three periods.
    pub fn metric(&self, kind: ChangeKind, field: impl Fn(&T) -> f64) -> MetricValue {
        MetricValue::three_period(
            kind,
            field(&self.current),
            field(&self.previous),
            field(&self.prior),
        )
    }
}

/// Run `compute` for P2, P1 and P0.
///
/// This is the single place the three-period pattern lives: engines describe
/// what one period looks like and read trends off the result with
/// [`PeriodValues::metric`].
pub fn across_periods<T, F>(periods: &PeriodSet, mut compute: F) -> Result<PeriodValues<T>>
where
    F: FnMut(&Period) -> Result<T>,
{
    Ok(PeriodValues {
        current: compute(&periods.current)?,
        previous: compute(&periods.previous)?,
        prior: compute(&periods.prior)?,
    })
}
