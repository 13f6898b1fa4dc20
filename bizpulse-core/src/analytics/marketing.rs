//! Marketing metrics: cost per lead and return on marketing investment.

use super::aggregate::Aggregator;
use super::growth::{safe_percent, safe_ratio, ChangeKind, MetricValue};
use super::period::Period;
use super::AnalyticsContext;
use crate::db::SourceFilter;
use crate::error::{Error, Result};
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MarketingSnapshot {
    pub revenue: f64,
    pub marketing_expenses: f64,
    /// Inbound messages recorded for the selected sources
    pub messages: i64,
}

impl MarketingSnapshot {
    /// Cost per lead.
    pub fn cpl(&self) -> f64 {
        safe_ratio(self.marketing_expenses, self.messages as f64)
    }

    /// Return on marketing investment, in percent.
    pub fn romi(&self) -> f64 {
        safe_percent(self.revenue - self.marketing_expenses, self.marketing_expenses)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketingMetricData {
    pub period: Period,
    pub previous_period: Period,
    pub marketing_expenses: MetricValue,
    pub total_messages: MetricValue,
    pub cpl: MetricValue,
    pub romi: MetricValue,
}

fn marketing_snapshot(
    ctx: &AnalyticsContext<'_>,
    agg: &Aggregator<'_>,
    period: &Period,
) -> Result<MarketingSnapshot> {
    Ok(MarketingSnapshot {
        revenue: agg.sum_revenue(period)?,
        marketing_expenses: agg.sum_expenses(period, Some(ctx.config.marketing_category.as_str()))?,
        messages: ctx.db.sum_source_messages(period, agg.sources())?,
    })
}

/// Marketing metrics for `period` compared with the period right before it.
///
/// Lead counts only make sense per channel, so an unrestricted source
/// filter is rejected with [`Error::InvalidInput`].
pub fn marketing_metrics(
    ctx: &AnalyticsContext<'_>,
    period: Period,
    sources: &SourceFilter,
) -> Result<MarketingMetricData> {
    if *sources == SourceFilter::All {
        return Err(Error::InvalidInput(
            "marketing metrics need at least one income source".to_string(),
        ));
    }

    let previous_period = period.preceding()?;
    let agg = Aggregator::new(ctx.db, sources);

    tracing::info!(period = %period, "Computing marketing metrics");

    let current = marketing_snapshot(ctx, &agg, &period)?;
    let previous = marketing_snapshot(ctx, &agg, &previous_period)?;
    let metric = |f: fn(&MarketingSnapshot) -> f64| {
        MetricValue::two_period(ChangeKind::Percent, f(&current), f(&previous))
    };

    Ok(MarketingMetricData {
        period,
        previous_period,
        marketing_expenses: metric(|s| s.marketing_expenses),
        total_messages: metric(|s| s.messages as f64),
        cpl: metric(MarketingSnapshot::cpl),
        romi: metric(MarketingSnapshot::romi),
    })
}
