//! Client metrics: activity, retention, satisfaction and lifespan.
//!
//! Compares the requested period with the immediately preceding one only.
//! Rates and ratings change by absolute difference; counts and lifespans
//! change by percent.

use super::aggregate::{Aggregator, LifespanStats};
use super::growth::{safe_percent, safe_ratio, ChangeKind, MetricValue};
use super::period::Period;
use super::AnalyticsContext;
use crate::db::SourceFilter;
use crate::error::Result;
use crate::types::Order;
use serde::Serialize;
use std::collections::BTreeMap;

/// Who ordered in a period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientActivity {
    /// Distinct clients with at least one order (any status)
    pub total_clients: i64,
    /// Clients with more than one order (any status)
    pub repeat_clients: i64,
}

impl ClientActivity {
    pub fn from_orders(orders_by_client: &BTreeMap<String, Vec<Order>>) -> Self {
        Self {
            total_clients: orders_by_client.len() as i64,
            repeat_clients: orders_by_client
                .values()
                .filter(|orders| orders.len() > 1)
                .count() as i64,
        }
    }

    /// Share of active clients who ordered more than once, in percent.
    pub fn repeat_purchase_rate(&self) -> f64 {
        safe_percent(self.repeat_clients as f64, self.total_clients as f64)
    }
}

/// Rating summary for a set of orders.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RatingSummary {
    pub rated_orders: i64,
    pub positive_ratings: i64,
    pub rating_total: f64,
}

impl RatingSummary {
    pub fn from_orders<'a>(orders: impl IntoIterator<Item = &'a Order>, threshold: f64) -> Self {
        let mut summary = Self::default();
        for rating in orders.into_iter().filter_map(|o| o.rating) {
            summary.rated_orders += 1;
            summary.rating_total += rating;
            if rating >= threshold {
                summary.positive_ratings += 1;
            }
        }
        summary
    }

    /// Share of ratings at or above the threshold, in percent.
    pub fn csat(&self) -> f64 {
        safe_percent(self.positive_ratings as f64, self.rated_orders as f64)
    }

    pub fn avg_rating(&self) -> f64 {
        safe_ratio(self.rating_total, self.rated_orders as f64)
    }
}

/// Client figures for one period.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientSnapshot {
    pub activity: ClientActivity,
    pub new_clients: i64,
    /// Clients acquired before the period start
    pub clients_at_start: i64,
    /// Of those, how many ordered during the period
    pub retained_clients: i64,
    pub ratings: RatingSummary,
    pub cancelled_orders: i64,
    pub avg_lifespan_months: f64,
    pub median_lifespan_months: f64,
}

impl ClientSnapshot {
    pub fn retention_rate(&self) -> f64 {
        safe_percent(self.retained_clients as f64, self.clients_at_start as f64)
    }
}

/// Client metrics for a period compared with the preceding one.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientMetricData {
    pub period: Period,
    pub previous_period: Period,
    pub total_clients: MetricValue,
    pub new_clients: MetricValue,
    pub repeat_clients: MetricValue,
    pub repeat_purchase_rate: MetricValue,
    pub retention_rate: MetricValue,
    /// Months
    pub avg_lifespan: MetricValue,
    /// Months
    pub median_lifespan: MetricValue,
    pub csat: MetricValue,
    pub avg_rating: MetricValue,
    pub cancelled_orders: MetricValue,
}

/// Gather one period's client figures.
pub fn client_snapshot(
    ctx: &AnalyticsContext<'_>,
    agg: &Aggregator<'_>,
    period: &Period,
) -> Result<ClientSnapshot> {
    let config = ctx.config;
    let orders_by_client = agg.orders_by_client(period)?;

    let cohort = ctx.db.list_clients_before(period.from(), agg.sources())?;
    let retained_clients = cohort
        .iter()
        .filter(|client| orders_by_client.contains_key(&client.username))
        .count() as i64;

    let lifespans = LifespanStats::from_days(&agg.client_lifespans(period)?);

    let snapshot = ClientSnapshot {
        activity: ClientActivity::from_orders(&orders_by_client),
        new_clients: agg.count_new_clients(period)?,
        clients_at_start: cohort.len() as i64,
        retained_clients,
        ratings: RatingSummary::from_orders(
            orders_by_client.values().flatten(),
            config.positive_rating_threshold,
        ),
        cancelled_orders: agg.count_cancelled_orders(period)?,
        avg_lifespan_months: safe_ratio(lifespans.mean_days, config.days_per_month),
        median_lifespan_months: safe_ratio(lifespans.median_days, config.days_per_month),
    };

    tracing::debug!(
        period = %period,
        active = snapshot.activity.total_clients,
        cohort = snapshot.clients_at_start,
        retained = snapshot.retained_clients,
        "Client snapshot"
    );
    Ok(snapshot)
}

/// Client metrics for `period` compared with the period right before it.
pub fn client_metrics(
    ctx: &AnalyticsContext<'_>,
    period: Period,
    sources: &SourceFilter,
) -> Result<ClientMetricData> {
    let previous_period = period.preceding()?;
    let agg = Aggregator::new(ctx.db, sources);

    tracing::info!(period = %period, "Computing client metrics");

    let current = client_snapshot(ctx, &agg, &period)?;
    let previous = client_snapshot(ctx, &agg, &previous_period)?;

    let percent = |f: fn(&ClientSnapshot) -> f64| {
        MetricValue::two_period(ChangeKind::Percent, f(&current), f(&previous))
    };
    let absolute = |f: fn(&ClientSnapshot) -> f64| {
        MetricValue::two_period(ChangeKind::Absolute, f(&current), f(&previous))
    };

    Ok(ClientMetricData {
        period,
        previous_period,
        total_clients: percent(|s| s.activity.total_clients as f64),
        new_clients: percent(|s| s.new_clients as f64),
        repeat_clients: percent(|s| s.activity.repeat_clients as f64),
        repeat_purchase_rate: absolute(|s| s.activity.repeat_purchase_rate()),
        retention_rate: absolute(ClientSnapshot::retention_rate),
        avg_lifespan: percent(|s| s.avg_lifespan_months),
        median_lifespan: percent(|s| s.median_lifespan_months),
        csat: absolute(|s| s.ratings.csat()),
        avg_rating: absolute(|s| s.ratings.avg_rating()),
        cancelled_orders: percent(|s| s.cancelled_orders as f64),
    })
}
