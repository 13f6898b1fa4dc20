//! Financial metrics: revenue, expenses, profit, margins, CAC, AOV, CLTV.
//!
//! Every metric is reported for P2 with its change from P1 and P1's change
//! from P0. Margins are percentages already and change by percentage
//! points; everything else changes by percent.

use super::aggregate::{Aggregator, LifespanStats};
use super::clients::ClientActivity;
use super::growth::{across_periods, safe_percent, safe_ratio, ChangeKind, MetricValue};
use super::period::{Period, PeriodSet};
use super::AnalyticsContext;
use crate::db::{CategoryTotal, SourceFilter};
use crate::error::Result;
use serde::Serialize;

/// Raw and derived figures for one period.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FinancialSnapshot {
    pub revenue: f64,
    pub expenses: f64,
    pub salary_expenses: f64,
    pub marketing_expenses: f64,
    pub new_clients: i64,
    pub completed_orders: i64,
    /// Repeat-purchase rate in percent
    pub repeat_purchase_rate: f64,
    pub avg_lifespan_days: f64,
    /// Divisor used to turn lifespan days into months
    pub days_per_month: f64,
}

impl FinancialSnapshot {
    /// Revenue minus expenses. Negative when expenses exceed revenue.
    pub fn net_profit(&self) -> f64 {
        self.revenue - self.expenses
    }

    pub fn profit_margin(&self) -> f64 {
        safe_percent(self.net_profit(), self.revenue)
    }

    pub fn gross_margin(&self) -> f64 {
        safe_percent(self.revenue - self.salary_expenses, self.revenue)
    }

    /// Customer acquisition cost.
    pub fn cac(&self) -> f64 {
        safe_ratio(self.marketing_expenses, self.new_clients as f64)
    }

    /// Average order value.
    pub fn aov(&self) -> f64 {
        safe_ratio(self.revenue, self.completed_orders as f64)
    }

    pub fn avg_lifespan_months(&self) -> f64 {
        safe_ratio(self.avg_lifespan_days, self.days_per_month)
    }

    /// Customer lifetime value: AOV x repeat fraction x lifespan in months.
    pub fn cltv(&self) -> f64 {
        self.aov() * (self.repeat_purchase_rate / 100.0) * self.avg_lifespan_months()
    }
}

/// Financial metrics for a period and its two predecessors.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialMetricData {
    pub periods: PeriodSet,
    pub total_revenue: MetricValue,
    pub total_expenses: MetricValue,
    pub net_profit: MetricValue,
    pub profit_margin: MetricValue,
    pub gross_margin: MetricValue,
    pub cac: MetricValue,
    pub aov: MetricValue,
    pub cltv: MetricValue,
    pub top_spending_category: Option<CategoryTotal>,
    pub top_revenue_source: Option<CategoryTotal>,
}

/// Gather one period's financial figures.
pub fn financial_snapshot(
    ctx: &AnalyticsContext<'_>,
    agg: &Aggregator<'_>,
    period: &Period,
) -> Result<FinancialSnapshot> {
    let config = ctx.config;
    let activity = ClientActivity::from_orders(&agg.orders_by_client(period)?);
    let lifespans = LifespanStats::from_days(&agg.client_lifespans(period)?);

    let snapshot = FinancialSnapshot {
        revenue: agg.sum_revenue(period)?,
        expenses: agg.sum_expenses(period, None)?,
        salary_expenses: agg.sum_expenses(period, Some(config.salary_category.as_str()))?,
        marketing_expenses: agg.sum_expenses(period, Some(config.marketing_category.as_str()))?,
        new_clients: agg.count_new_clients(period)?,
        completed_orders: agg.count_orders(period)?,
        repeat_purchase_rate: activity.repeat_purchase_rate(),
        avg_lifespan_days: lifespans.mean_days,
        days_per_month: config.days_per_month,
    };

    tracing::debug!(
        period = %period,
        revenue = snapshot.revenue,
        expenses = snapshot.expenses,
        orders = snapshot.completed_orders,
        "Financial snapshot"
    );
    Ok(snapshot)
}

/// Financial metrics for `period` compared with the two preceding periods.
pub fn financial_metrics(
    ctx: &AnalyticsContext<'_>,
    period: Period,
    sources: &SourceFilter,
) -> Result<FinancialMetricData> {
    let periods = PeriodSet::for_period(period)?;
    let agg = Aggregator::new(ctx.db, sources);

    tracing::info!(period = %period, "Computing financial metrics");

    let values = across_periods(&periods, |p| financial_snapshot(ctx, &agg, p))?;

    Ok(FinancialMetricData {
        periods,
        total_revenue: values.metric(ChangeKind::Percent, |s| s.revenue),
        total_expenses: values.metric(ChangeKind::Percent, |s| s.expenses),
        net_profit: values.metric(ChangeKind::Percent, FinancialSnapshot::net_profit),
        profit_margin: values.metric(ChangeKind::Absolute, FinancialSnapshot::profit_margin),
        gross_margin: values.metric(ChangeKind::Absolute, FinancialSnapshot::gross_margin),
        cac: values.metric(ChangeKind::Percent, FinancialSnapshot::cac),
        aov: values.metric(ChangeKind::Percent, FinancialSnapshot::aov),
        cltv: values.metric(ChangeKind::Percent, FinancialSnapshot::cltv),
        top_spending_category: agg.top_spending_category(&period)?,
        top_revenue_source: agg.top_revenue_source(&period)?,
    })
}
