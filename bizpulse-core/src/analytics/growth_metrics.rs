//! Growth metrics: headline trends plus a calendar-month series.
//!
//! Two conventions for client growth live here and are kept apart:
//! - the headline `clientGrowth` is a rate, new clients over the clients
//!   that existed at the period start, compared across P2/P1/P0 by
//!   percentage points
//! - the monthly series compares raw new-client counts month over month
//!   with [`percent_change`]

use super::aggregate::Aggregator;
use super::growth::{
    across_periods, percent_change, safe_percent, safe_ratio, ChangeKind, MetricValue,
};
use super::period::{month_start, Period, PeriodSet};
use super::AnalyticsContext;
use crate::db::SourceFilter;
use crate::error::{Error, Result};
use crate::types::BusinessNote;
use chrono::Datelike;
use serde::Serialize;

/// Figures the growth engine reads for one window.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GrowthSnapshot {
    pub revenue: f64,
    pub expenses: f64,
    pub completed_orders: i64,
    pub new_clients: i64,
    pub clients_at_start: i64,
}

impl GrowthSnapshot {
    pub fn profit(&self) -> f64 {
        self.revenue - self.expenses
    }

    pub fn aov(&self) -> f64 {
        safe_ratio(self.revenue, self.completed_orders as f64)
    }

    /// New clients relative to the cohort at the window start, in percent.
    pub fn client_growth_rate(&self) -> f64 {
        safe_percent(self.new_clients as f64, self.clients_at_start as f64)
    }
}

/// One calendar month of the growth series.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GrowthPoint {
    /// `YYYY-MM`
    pub month: String,
    pub period: Period,
    pub revenue: f64,
    pub profit: f64,
    pub aov: f64,
    pub new_clients: i64,
    /// Growth against the preceding calendar month
    pub revenue_growth: f64,
    pub profit_growth: f64,
    pub aov_growth: f64,
    pub client_growth: f64,
    pub notes: Vec<BusinessNote>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GrowthMetricData {
    pub periods: PeriodSet,
    pub revenue: MetricValue,
    pub profit: MetricValue,
    pub aov: MetricValue,
    /// New clients per 100 clients at the period start. `change` and
    /// `previousPeriodChange` are in percentage points, not percent.
    pub client_growth: MetricValue,
    pub time_series: Vec<GrowthPoint>,
}

pub fn growth_snapshot(agg: &Aggregator<'_>, period: &Period) -> Result<GrowthSnapshot> {
    Ok(GrowthSnapshot {
        revenue: agg.sum_revenue(period)?,
        expenses: agg.sum_expenses(period, None)?,
        completed_orders: agg.count_orders(period)?,
        new_clients: agg.count_new_clients(period)?,
        clients_at_start: agg.count_clients_before(period.from())?,
    })
}

fn month_key(period: &Period) -> String {
    format!("{:04}-{:02}", period.from().year(), period.from().month())
}

/// One point per calendar month intersecting `period`.
///
/// Every month is measured in full, and the first month is compared with
/// the calendar month before it.
pub fn monthly_series(
    ctx: &AnalyticsContext<'_>,
    agg: &Aggregator<'_>,
    period: &Period,
) -> Result<Vec<GrowthPoint>> {
    let months = period.calendar_months();
    let Some(first) = months.first() else {
        return Ok(Vec::new());
    };

    let before_first = first.from().pred_opt().ok_or_else(|| {
        Error::InvalidInput(format!("no calendar month before {}", first.from()))
    })?;
    let lead_in = Period::new(month_start(before_first), before_first)?;
    let mut previous = growth_snapshot(agg, &lead_in)?;

    let mut points = Vec::with_capacity(months.len());
    for month in months {
        let current = growth_snapshot(agg, &month)?;
        points.push(GrowthPoint {
            month: month_key(&month),
            period: month,
            revenue: current.revenue,
            profit: current.profit(),
            aov: current.aov(),
            new_clients: current.new_clients,
            revenue_growth: percent_change(current.revenue, previous.revenue),
            profit_growth: percent_change(current.profit(), previous.profit()),
            aov_growth: percent_change(current.aov(), previous.aov()),
            client_growth: percent_change(current.new_clients as f64, previous.new_clients as f64),
            notes: ctx.db.list_notes(&month)?,
        });
        previous = current;
    }

    tracing::debug!(period = %period, months = points.len(), "Built monthly growth series");
    Ok(points)
}

/// Growth metrics for `period` with its monthly series.
pub fn growth_metrics(
    ctx: &AnalyticsContext<'_>,
    period: Period,
    sources: &SourceFilter,
) -> Result<GrowthMetricData> {
    let periods = PeriodSet::for_period(period)?;
    let agg = Aggregator::new(ctx.db, sources);

    tracing::info!(period = %period, "Computing growth metrics");

    let values = across_periods(&periods, |p| growth_snapshot(&agg, p))?;

    Ok(GrowthMetricData {
        periods,
        revenue: values.metric(ChangeKind::Percent, |s| s.revenue),
        profit: values.metric(ChangeKind::Percent, GrowthSnapshot::profit),
        aov: values.metric(ChangeKind::Percent, GrowthSnapshot::aov),
        client_growth: values.metric(ChangeKind::Absolute, GrowthSnapshot::client_growth_rate),
        time_series: monthly_series(ctx, &agg, &period)?,
    })
}
