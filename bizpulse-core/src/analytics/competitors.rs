//! Monthly market-share benchmark against tracked competitors.

use super::growth::safe_percent;
use super::period::Period;
use super::AnalyticsContext;
use crate::db::SourceFilter;
use crate::error::Result;
use crate::types::OrderStatus;
use chrono::Datelike;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompetitorCount {
    pub name: String,
    pub orders: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkMonth {
    /// `YYYY-MM`
    pub month: String,
    pub own_orders: i64,
    pub competitors: Vec<CompetitorCount>,
    /// Own orders over all orders in the month, in percent
    pub market_share: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompetitorBenchmark {
    pub period: Period,
    pub months: Vec<BenchmarkMonth>,
}

/// Compare completed orders with competitor counts for each calendar month
/// intersecting `period`.
pub fn competitor_benchmark(
    ctx: &AnalyticsContext<'_>,
    period: Period,
) -> Result<CompetitorBenchmark> {
    tracing::info!(period = %period, "Computing competitor benchmark");

    let competitors = ctx.db.list_competitors()?;
    let mut months = Vec::new();
    for month in period.calendar_months() {
        let (year, number) = (month.from().year(), month.from().month());
        let own_orders =
            ctx.db
                .count_orders(&month, &SourceFilter::All, Some(OrderStatus::Completed))?;
        let counts: Vec<CompetitorCount> = competitors
            .iter()
            .map(|c| CompetitorCount {
                name: c.name.clone(),
                orders: c.orders_in(year, number),
            })
            .collect();
        let everyone = own_orders + counts.iter().map(|c| c.orders).sum::<i64>();

        months.push(BenchmarkMonth {
            month: format!("{:04}-{:02}", year, number),
            own_orders,
            competitors: counts,
            market_share: safe_percent(own_orders as f64, everyone as f64),
        });
    }

    Ok(CompetitorBenchmark { period, months })
}
