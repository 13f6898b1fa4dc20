//! Per-gig and per-source analytics.
//!
//! Both views pair each day of the requested window with the same day of
//! the preceding window of equal length, then total the two windows.
//! Unknown ids yield `Ok(None)`.

use super::growth::{safe_percent, ChangeKind, MetricValue};
use super::period::{parse_date, Period};
use super::AnalyticsContext;
use crate::db::SourceFilter;
use crate::error::Result;
use chrono::{Duration, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;

/// Resolve an optional `from`/`to` pair into a window.
///
/// Missing bounds fall back to a trailing `default_days` window: no bounds
/// ends on `today`, `from` alone ends on `today`, `to` alone starts
/// `default_days - 1` days earlier.
pub fn resolve_window(
    from: Option<&str>,
    to: Option<&str>,
    today: NaiveDate,
    default_days: u32,
) -> Result<Period> {
    let from = from.map(parse_date).transpose()?;
    let to = to.map(parse_date).transpose()?;
    match (from, to) {
        (Some(from), Some(to)) => Period::new(from, to),
        (Some(from), None) => Period::new(from, today),
        (None, Some(to)) => Period::trailing(to, default_days),
        (None, None) => Period::trailing(today, default_days),
    }
}

/// A day of the current window next to its counterpart in the previous one.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlignedDay<T> {
    pub date: NaiveDate,
    pub previous_date: NaiveDate,
    pub current: T,
    pub previous: T,
}

fn align<T: Clone + Default>(
    period: &Period,
    current: &BTreeMap<NaiveDate, T>,
    previous: &BTreeMap<NaiveDate, T>,
) -> Vec<AlignedDay<T>> {
    let offset = Duration::days(period.day_count());
    period
        .days()
        .map(|date| {
            let previous_date = date - offset;
            AlignedDay {
                date,
                previous_date,
                current: current.get(&date).cloned().unwrap_or_default(),
                previous: previous.get(&previous_date).cloned().unwrap_or_default(),
            }
        })
        .collect()
}

// ============================================
// Gigs
// ============================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GigDay {
    pub impressions: i64,
    pub clicks: i64,
    pub orders: i64,
    pub revenue: f64,
}

impl GigDay {
    fn add(&mut self, other: &GigDay) {
        self.impressions += other.impressions;
        self.clicks += other.clicks;
        self.orders += other.orders;
        self.revenue += other.revenue;
    }

    /// Click-through rate, in percent.
    pub fn ctr(&self) -> f64 {
        safe_percent(self.clicks as f64, self.impressions as f64)
    }

    /// Completed orders per click, in percent.
    pub fn conversion_rate(&self) -> f64 {
        safe_percent(self.orders as f64, self.clicks as f64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GigTotals {
    pub impressions: MetricValue,
    pub clicks: MetricValue,
    pub orders: MetricValue,
    pub revenue: MetricValue,
    pub ctr: MetricValue,
    pub conversion_rate: MetricValue,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GigAnalyticsData {
    pub gig_id: String,
    pub gig_name: String,
    pub source_id: String,
    pub period: Period,
    pub previous_period: Period,
    pub daily: Vec<AlignedDay<GigDay>>,
    pub totals: GigTotals,
}

fn gig_days(
    ctx: &AnalyticsContext<'_>,
    gig: &crate::types::Gig,
    period: &Period,
) -> Result<BTreeMap<NaiveDate, GigDay>> {
    let mut days: BTreeMap<NaiveDate, GigDay> = BTreeMap::new();
    for point in gig.analytics.iter().filter(|p| period.contains(p.date)) {
        let day = days.entry(point.date).or_default();
        day.impressions += point.impressions;
        day.clicks += point.clicks;
    }
    for order in ctx.db.list_gig_orders(&gig.id, period)? {
        if order.is_completed() {
            let day = days.entry(order.date).or_default();
            day.orders += 1;
            day.revenue += order.amount;
        }
    }
    Ok(days)
}

fn total<'a, T: Default + 'a>(
    values: impl Iterator<Item = &'a T>,
    add: impl Fn(&mut T, &T),
) -> T {
    values.fold(T::default(), |mut acc, v| {
        add(&mut acc, v);
        acc
    })
}

/// Analytics for one gig over `period`, or `None` if the gig does not exist.
pub fn gig_analytics(
    ctx: &AnalyticsContext<'_>,
    gig_id: &str,
    period: Period,
) -> Result<Option<GigAnalyticsData>> {
    let Some(gig) = ctx.db.get_gig(gig_id)? else {
        tracing::debug!(gig_id, "Gig not found");
        return Ok(None);
    };
    let previous_period = period.preceding()?;

    tracing::info!(gig_id, period = %period, "Computing gig analytics");

    let current = gig_days(ctx, &gig, &period)?;
    let previous = gig_days(ctx, &gig, &previous_period)?;
    let now = total(current.values(), GigDay::add);
    let before = total(previous.values(), GigDay::add);
    let metric = |kind: ChangeKind, f: fn(&GigDay) -> f64| {
        MetricValue::two_period(kind, f(&now), f(&before))
    };

    Ok(Some(GigAnalyticsData {
        totals: GigTotals {
            impressions: metric(ChangeKind::Percent, |d| d.impressions as f64),
            clicks: metric(ChangeKind::Percent, |d| d.clicks as f64),
            orders: metric(ChangeKind::Percent, |d| d.orders as f64),
            revenue: metric(ChangeKind::Percent, |d| d.revenue),
            ctr: metric(ChangeKind::Absolute, GigDay::ctr),
            conversion_rate: metric(ChangeKind::Absolute, GigDay::conversion_rate),
        },
        daily: align(&period, &current, &previous),
        gig_id: gig.id,
        gig_name: gig.name,
        source_id: gig.source_id,
        period,
        previous_period,
    }))
}

// ============================================
// Income sources
// ============================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceDay {
    pub messages: i64,
    pub orders: i64,
    pub revenue: f64,
}

impl SourceDay {
    fn add(&mut self, other: &SourceDay) {
        self.messages += other.messages;
        self.orders += other.orders;
        self.revenue += other.revenue;
    }

    /// Completed orders per inbound message, in percent.
    pub fn conversion_rate(&self) -> f64 {
        safe_percent(self.orders as f64, self.messages as f64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceTotals {
    pub messages: MetricValue,
    pub orders: MetricValue,
    pub revenue: MetricValue,
    pub conversion_rate: MetricValue,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceAnalyticsData {
    pub source_id: String,
    pub source_name: String,
    pub gig_count: usize,
    pub period: Period,
    pub previous_period: Period,
    pub daily: Vec<AlignedDay<SourceDay>>,
    pub totals: SourceTotals,
}

fn source_days(
    ctx: &AnalyticsContext<'_>,
    source: &crate::types::IncomeSource,
    period: &Period,
) -> Result<BTreeMap<NaiveDate, SourceDay>> {
    let mut days: BTreeMap<NaiveDate, SourceDay> = BTreeMap::new();
    for point in source.data_points.iter().filter(|p| period.contains(p.date)) {
        days.entry(point.date).or_default().messages += point.messages;
    }
    let filter = SourceFilter::from_names([source.name.as_str()]);
    for totals in ctx.db.daily_order_totals(period, &filter)? {
        let day = days.entry(totals.date).or_default();
        day.orders += totals.completed_orders;
        day.revenue += totals.revenue;
    }
    Ok(days)
}

/// Analytics for one income source over `period`, or `None` if it does not exist.
pub fn source_analytics(
    ctx: &AnalyticsContext<'_>,
    source_id: &str,
    period: Period,
) -> Result<Option<SourceAnalyticsData>> {
    let Some(source) = ctx.db.get_income_source(source_id)? else {
        tracing::debug!(source_id, "Income source not found");
        return Ok(None);
    };
    let previous_period = period.preceding()?;

    tracing::info!(source_id, period = %period, "Computing source analytics");

    let current = source_days(ctx, &source, &period)?;
    let previous = source_days(ctx, &source, &previous_period)?;
    let now = total(current.values(), SourceDay::add);
    let before = total(previous.values(), SourceDay::add);
    let metric = |kind: ChangeKind, f: fn(&SourceDay) -> f64| {
        MetricValue::two_period(kind, f(&now), f(&before))
    };

    Ok(Some(SourceAnalyticsData {
        totals: SourceTotals {
            messages: metric(ChangeKind::Percent, |d| d.messages as f64),
            orders: metric(ChangeKind::Percent, |d| d.orders as f64),
            revenue: metric(ChangeKind::Percent, |d| d.revenue),
            conversion_rate: metric(ChangeKind::Absolute, SourceDay::conversion_rate),
        },
        daily: align(&period, &current, &previous),
        gig_count: source.gigs.len(),
        source_id: source.id,
        source_name: source.name,
        period,
        previous_period,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalyticsConfig;
    use crate::db::Database;
    use crate::error::Error;
    use crate::types::{Gig, GigAnalyticsPoint, IncomeSource, Order, OrderStatus, SourceDataPoint};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn seeded_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        db.upsert_income_source(&IncomeSource {
            id: "src-1".to_string(),
            name: "Fiverr".to_string(),
            gigs: vec![Gig {
                id: "gig-1".to_string(),
                source_id: "src-1".to_string(),
                name: "Logo design".to_string(),
                date: d(2024, 1, 1),
                analytics: vec![
                    GigAnalyticsPoint {
                        date: d(2024, 3, 8),
                        impressions: 200,
                        clicks: 10,
                    },
                    GigAnalyticsPoint {
                        date: d(2024, 3, 10),
                        impressions: 100,
                        clicks: 10,
                    },
                ],
            }],
            data_points: vec![
                SourceDataPoint {
                    date: d(2024, 3, 10),
                    messages: 8,
                },
                SourceDataPoint {
                    date: d(2024, 3, 1),
                    messages: 4,
                },
            ],
        })
        .unwrap();
        db.insert_order(&Order {
            id: "o1".to_string(),
            client_username: "ann".to_string(),
            date: d(2024, 3, 10),
            amount: 80.0,
            source: "Fiverr".to_string(),
            gig: Some("Logo design".to_string()),
            status: OrderStatus::Completed,
            rating: Some(5.0),
            cancellation_reasons: Vec::new(),
        })
        .unwrap();
        db
    }

    #[test]
    fn test_resolve_window_defaults() {
        let today = d(2024, 3, 30);
        let window = resolve_window(None, None, today, 30).unwrap();
        assert_eq!(window, Period::new(d(2024, 3, 1), today).unwrap());

        let window = resolve_window(Some("2024-03-20"), None, today, 30).unwrap();
        assert_eq!(window, Period::new(d(2024, 3, 20), today).unwrap());

        let window = resolve_window(None, Some("2024-02-29"), today, 7).unwrap();
        assert_eq!(window, Period::new(d(2024, 2, 23), d(2024, 2, 29)).unwrap());

        assert!(matches!(
            resolve_window(Some("2024-04-01"), None, today, 30),
            Err(Error::InvalidRange { .. })
        ));
    }

    #[test]
    fn test_gig_analytics_aligns_days() {
        let db = seeded_db();
        let config = AnalyticsConfig::default();
        let ctx = AnalyticsContext::new(&db, &config);

        let period = Period::new(d(2024, 3, 9), d(2024, 3, 10)).unwrap();
        let data = gig_analytics(&ctx, "gig-1", period).unwrap().unwrap();

        assert_eq!(data.previous_period, Period::new(d(2024, 3, 7), d(2024, 3, 8)).unwrap());
        assert_eq!(data.daily.len(), 2);
        assert_eq!(data.daily[1].date, d(2024, 3, 10));
        assert_eq!(data.daily[1].previous_date, d(2024, 3, 8));
        assert_eq!(data.daily[1].current.clicks, 10);
        assert_eq!(data.daily[1].previous.impressions, 200);

        assert_eq!(data.totals.impressions.value, 100.0);
        assert_eq!(data.totals.impressions.change, -50.0);
        assert_eq!(data.totals.ctr.value, 10.0);
        // 10% now vs 5% before: percentage points, not percent.
        assert_eq!(data.totals.ctr.change, 5.0);
        assert_eq!(data.totals.conversion_rate.value, 10.0);
        assert_eq!(data.totals.revenue.value, 80.0);
    }

    #[test]
    fn test_unknown_entities_are_none() {
        let db = seeded_db();
        let config = AnalyticsConfig::default();
        let ctx = AnalyticsContext::new(&db, &config);
        let period = Period::new(d(2024, 3, 1), d(2024, 3, 10)).unwrap();

        assert!(gig_analytics(&ctx, "nope", period).unwrap().is_none());
        assert!(source_analytics(&ctx, "nope", period).unwrap().is_none());
    }

    #[test]
    fn test_source_analytics_totals() {
        let db = seeded_db();
        let config = AnalyticsConfig::default();
        let ctx = AnalyticsContext::new(&db, &config);

        let period = Period::new(d(2024, 3, 6), d(2024, 3, 10)).unwrap();
        let data = source_analytics(&ctx, "src-1", period).unwrap().unwrap();

        assert_eq!(data.source_name, "Fiverr");
        assert_eq!(data.gig_count, 1);
        assert_eq!(data.daily.len(), 5);
        assert_eq!(data.totals.messages.value, 8.0);
        assert_eq!(data.totals.messages.previous_value, 4.0);
        assert_eq!(data.totals.messages.change, 100.0);
        assert_eq!(data.totals.orders.value, 1.0);
        assert_eq!(data.totals.conversion_rate.value, 12.5);
    }

    #[test]
    fn test_same_named_gigs_keep_their_own_orders() {
        let db = seeded_db();
        db.upsert_income_source(&IncomeSource {
            id: "src-2".to_string(),
            name: "Upwork".to_string(),
            gigs: vec![Gig {
                id: "gig-2".to_string(),
                source_id: "src-2".to_string(),
                name: "Logo design".to_string(),
                date: d(2024, 1, 1),
                analytics: Vec::new(),
            }],
            data_points: Vec::new(),
        })
        .unwrap();
        db.insert_order(&Order {
            id: "o2".to_string(),
            client_username: "bob".to_string(),
            date: d(2024, 3, 10),
            amount: 100.0,
            source: "Upwork".to_string(),
            gig: Some("Logo design".to_string()),
            status: OrderStatus::Completed,
            rating: None,
            cancellation_reasons: Vec::new(),
        })
        .unwrap();
        let config = AnalyticsConfig::default();
        let ctx = AnalyticsContext::new(&db, &config);
        let period = Period::new(d(2024, 3, 1), d(2024, 3, 31)).unwrap();

        let fiverr = gig_analytics(&ctx, "gig-1", period).unwrap().unwrap();
        assert_eq!(fiverr.totals.orders.value, 1.0);
        assert_eq!(fiverr.totals.revenue.value, 80.0);

        let upwork = gig_analytics(&ctx, "gig-2", period).unwrap().unwrap();
        assert_eq!(upwork.totals.orders.value, 1.0);
        assert_eq!(upwork.totals.revenue.value, 100.0);
        assert_eq!(upwork.totals.conversion_rate.value, 0.0);
    }
}
