//! Order counts split by buyer type.
//!
//! A completed order comes from a new buyer when its client was acquired
//! on or after the period start, and from a repeat buyer otherwise. Orders
//! whose client has no record are treated as new-buyer orders.

use super::growth::{across_periods, ChangeKind, MetricValue, PeriodValues};
use super::period::{Period, PeriodSet};
use super::AnalyticsContext;
use crate::db::SourceFilter;
use crate::error::Result;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Completed orders in one period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCountStats {
    pub total: i64,
    pub from_new_buyers: i64,
    pub from_repeat_buyers: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCountAnalytics {
    pub periods: PeriodSet,
    pub counts: PeriodValues<OrderCountStats>,
    pub total_orders: MetricValue,
    pub from_new_buyers: MetricValue,
    pub from_repeat_buyers: MetricValue,
}

/// Classify one period's completed orders.
pub fn order_count_stats(
    ctx: &AnalyticsContext<'_>,
    period: &Period,
    sources: &SourceFilter,
) -> Result<OrderCountStats> {
    let orders: Vec<_> = ctx
        .db
        .list_orders(period, sources)?
        .into_iter()
        .filter(|o| o.is_completed())
        .collect();
    if orders.is_empty() {
        return Ok(OrderCountStats::default());
    }

    let usernames: Vec<String> = orders
        .iter()
        .map(|o| o.client_username.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let client_since: BTreeMap<String, NaiveDate> = ctx
        .db
        .get_clients(&usernames)?
        .into_iter()
        .map(|c| (c.username, c.client_since))
        .collect();

    let mut stats = OrderCountStats {
        total: orders.len() as i64,
        ..Default::default()
    };
    for order in &orders {
        match client_since.get(&order.client_username) {
            Some(since) if *since < period.from() => stats.from_repeat_buyers += 1,
            _ => stats.from_new_buyers += 1,
        }
    }
    Ok(stats)
}

pub fn order_count_analytics(
    ctx: &AnalyticsContext<'_>,
    period: Period,
    sources: &SourceFilter,
) -> Result<OrderCountAnalytics> {
    let periods = PeriodSet::for_period(period)?;

    tracing::info!(period = %period, "Computing order count analytics");

    let counts = across_periods(&periods, |p| order_count_stats(ctx, p, sources))?;

    Ok(OrderCountAnalytics {
        periods,
        total_orders: counts.metric(ChangeKind::Percent, |c| c.total as f64),
        from_new_buyers: counts.metric(ChangeKind::Percent, |c| c.from_new_buyers as f64),
        from_repeat_buyers: counts.metric(ChangeKind::Percent, |c| c.from_repeat_buyers as f64),
        counts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalyticsConfig;
    use crate::db::Database;
    use crate::types::{Client, Order, OrderStatus};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn order(id: &str, client: &str, date: NaiveDate, status: OrderStatus) -> Order {
        Order {
            id: id.to_string(),
            client_username: client.to_string(),
            date,
            amount: 20.0,
            source: "Fiverr".to_string(),
            gig: None,
            status,
            rating: None,
            cancellation_reasons: Vec::new(),
        }
    }

    #[test]
    fn test_new_and_repeat_buyers() {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        let config = AnalyticsConfig::default();
        let ctx = AnalyticsContext::new(&db, &config);

        for (name, since) in [("old", d(2023, 11, 1)), ("fresh", d(2024, 3, 1))] {
            db.upsert_client(&Client {
                username: name.to_string(),
                client_since: since,
                is_vip: false,
                source: "Fiverr".to_string(),
            })
            .unwrap();
        }
        db.insert_order(&order("o1", "old", d(2024, 3, 2), OrderStatus::Completed))
            .unwrap();
        db.insert_order(&order("o2", "old", d(2024, 3, 3), OrderStatus::Completed))
            .unwrap();
        db.insert_order(&order("o3", "fresh", d(2024, 3, 4), OrderStatus::Completed))
            .unwrap();
        db.insert_order(&order("o4", "ghost", d(2024, 3, 5), OrderStatus::Completed))
            .unwrap();
        db.insert_order(&order("o5", "fresh", d(2024, 3, 6), OrderStatus::Cancelled))
            .unwrap();

        let march = Period::new(d(2024, 3, 1), d(2024, 3, 31)).unwrap();
        let stats = order_count_stats(&ctx, &march, &SourceFilter::All).unwrap();
        assert_eq!(
            stats,
            OrderCountStats {
                total: 4,
                from_new_buyers: 2,
                from_repeat_buyers: 2,
            }
        );
    }

    #[test]
    fn test_no_orders_is_all_zero() {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        let config = AnalyticsConfig::default();
        let ctx = AnalyticsContext::new(&db, &config);

        let period = Period::new(d(2024, 3, 1), d(2024, 3, 31)).unwrap();
        let analytics = order_count_analytics(&ctx, period, &SourceFilter::All).unwrap();
        assert_eq!(analytics.counts.current, OrderCountStats::default());
        assert_eq!(analytics.total_orders.value, 0.0);
        assert_eq!(analytics.total_orders.change, 0.0);
        assert_eq!(analytics.total_orders.previous_period_change, Some(0.0));
    }
}
