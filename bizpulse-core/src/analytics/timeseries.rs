//! Time-series bucketing.
//!
//! Daily points are summed into calendar-aligned buckets (ISO weeks start on
//! Monday). Days without data count as zero, so every bucket in range is
//! present even when nothing happened. Each bucket carries the notes dated
//! inside it and its growth against the bucket before it.

use super::growth::percent_change;
use super::period::{month_end, month_start, quarter_end, quarter_start, week_start, Period};
use super::AnalyticsContext;
use crate::db::SourceFilter;
use crate::error::{Error, Result};
use crate::types::BusinessNote;
use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::AddAssign;

/// Bucket size for a time series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    #[default]
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Daily => "daily",
            Granularity::Weekly => "weekly",
            Granularity::Monthly => "monthly",
            Granularity::Quarterly => "quarterly",
            Granularity::Yearly => "yearly",
        }
    }

    /// Calendar bucket containing `date`.
    pub fn bucket(&self, date: NaiveDate) -> (NaiveDate, NaiveDate) {
        match self {
            Granularity::Daily => (date, date),
            Granularity::Weekly => {
                let start = week_start(date);
                (start, start + Duration::days(6))
            }
            Granularity::Monthly => (month_start(date), month_end(date)),
            Granularity::Quarterly => (quarter_start(date), quarter_end(date)),
            Granularity::Yearly => (
                NaiveDate::from_ymd_opt(date.year(), 1, 1).unwrap_or(date),
                NaiveDate::from_ymd_opt(date.year(), 12, 31).unwrap_or(date),
            ),
        }
    }

    /// Display key for the bucket starting at `start`.
    pub fn key(&self, start: NaiveDate) -> String {
        match self {
            Granularity::Daily => start.format("%Y-%m-%d").to_string(),
            Granularity::Weekly => {
                let week = start.iso_week();
                format!("{}-W{:02}", week.year(), week.week())
            }
            Granularity::Monthly => format!("{:04}-{:02}", start.year(), start.month()),
            Granularity::Quarterly => format!("{}-Q{}", start.year(), start.month0() / 3 + 1),
            Granularity::Yearly => start.year().to_string(),
        }
    }
}

impl std::str::FromStr for Granularity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "daily" | "day" => Ok(Granularity::Daily),
            "weekly" | "week" => Ok(Granularity::Weekly),
            "monthly" | "month" => Ok(Granularity::Monthly),
            "quarterly" | "quarter" => Ok(Granularity::Quarterly),
            "yearly" | "year" => Ok(Granularity::Yearly),
            _ => Err(Error::InvalidInput(format!("unknown granularity: {}", s))),
        }
    }
}

impl std::fmt::Display for Granularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summable business figures for a day or bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSet {
    pub revenue: f64,
    pub completed_orders: f64,
    pub expenses: f64,
    pub profit: f64,
    pub new_clients: f64,
}

impl MetricSet {
    /// Field-wise [`percent_change`] from `previous`.
    pub fn growth_from(&self, previous: &MetricSet) -> MetricSet {
        MetricSet {
            revenue: percent_change(self.revenue, previous.revenue),
            completed_orders: percent_change(self.completed_orders, previous.completed_orders),
            expenses: percent_change(self.expenses, previous.expenses),
            profit: percent_change(self.profit, previous.profit),
            new_clients: percent_change(self.new_clients, previous.new_clients),
        }
    }
}

impl AddAssign<&MetricSet> for MetricSet {
    fn add_assign(&mut self, other: &MetricSet) {
        self.revenue += other.revenue;
        self.completed_orders += other.completed_orders;
        self.expenses += other.expenses;
        self.profit += other.profit;
        self.new_clients += other.new_clients;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyPoint {
    pub date: NaiveDate,
    pub metrics: MetricSet,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeBucket {
    pub key: String,
    /// First day covered, clipped to the requested range
    pub start: NaiveDate,
    /// Last day covered, clipped to the requested range
    pub end: NaiveDate,
    pub totals: MetricSet,
    /// Growth against the preceding bucket; absent for the first bucket
    pub growth: Option<MetricSet>,
    pub notes: Vec<BusinessNote>,
}

/// Bucket `points` over every day of `period`.
///
/// Points and notes outside the period are ignored.
pub fn aggregate_range(
    period: &Period,
    points: &[DailyPoint],
    notes: &[BusinessNote],
    granularity: Granularity,
) -> Vec<TimeBucket> {
    let mut buckets: BTreeMap<NaiveDate, TimeBucket> = BTreeMap::new();
    for day in period.days() {
        let (start, end) = granularity.bucket(day);
        buckets.entry(start).or_insert_with(|| TimeBucket {
            key: granularity.key(start),
            start: start.max(period.from()),
            end: end.min(period.to()),
            totals: MetricSet::default(),
            growth: None,
            notes: Vec::new(),
        });
    }

    for point in points.iter().filter(|p| period.contains(p.date)) {
        let (start, _) = granularity.bucket(point.date);
        if let Some(bucket) = buckets.get_mut(&start) {
            bucket.totals += &point.metrics;
        }
    }

    let mut sorted_notes: Vec<&BusinessNote> =
        notes.iter().filter(|n| period.contains(n.date)).collect();
    sorted_notes.sort_by_key(|n| n.date);
    for note in sorted_notes {
        let (start, _) = granularity.bucket(note.date);
        if let Some(bucket) = buckets.get_mut(&start) {
            bucket.notes.push(note.clone());
        }
    }

    let mut series: Vec<TimeBucket> = buckets.into_values().collect();
    for i in 1..series.len() {
        let previous = series[i - 1].totals;
        series[i].growth = Some(series[i].totals.growth_from(&previous));
    }
    series
}

/// Bucket `points` over the range they span.
pub fn aggregate(
    points: &[DailyPoint],
    notes: &[BusinessNote],
    granularity: Granularity,
) -> Vec<TimeBucket> {
    let first = points.iter().map(|p| p.date).min();
    let last = points.iter().map(|p| p.date).max();
    match (first, last) {
        (Some(from), Some(to)) => match Period::new(from, to) {
            Ok(period) => aggregate_range(&period, points, notes, granularity),
            Err(_) => Vec::new(),
        },
        _ => Vec::new(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessTimeline {
    pub period: Period,
    pub granularity: Granularity,
    pub buckets: Vec<TimeBucket>,
}

/// Daily figures for every day of `period`, zero-filled.
pub fn daily_points(
    ctx: &AnalyticsContext<'_>,
    period: &Period,
    sources: &SourceFilter,
) -> Result<Vec<DailyPoint>> {
    let orders: BTreeMap<NaiveDate, (f64, i64)> = ctx
        .db
        .daily_order_totals(period, sources)?
        .into_iter()
        .map(|t| (t.date, (t.revenue, t.completed_orders)))
        .collect();
    let expenses = ctx.db.daily_expense_totals(period)?;
    let new_clients = ctx.db.daily_new_clients(period, sources)?;

    Ok(period
        .days()
        .map(|date| {
            let (revenue, completed) = orders.get(&date).copied().unwrap_or_default();
            let spent = expenses.get(&date).copied().unwrap_or_default();
            DailyPoint {
                date,
                metrics: MetricSet {
                    revenue,
                    completed_orders: completed as f64,
                    expenses: spent,
                    profit: revenue - spent,
                    new_clients: new_clients.get(&date).copied().unwrap_or_default() as f64,
                },
            }
        })
        .collect())
}

/// Revenue, orders, expenses, profit and client acquisition bucketed over `period`.
pub fn business_timeline(
    ctx: &AnalyticsContext<'_>,
    period: Period,
    sources: &SourceFilter,
    granularity: Granularity,
) -> Result<BusinessTimeline> {
    tracing::info!(period = %period, granularity = %granularity, "Building business timeline");

    let points = daily_points(ctx, &period, sources)?;
    let notes = ctx.db.list_notes(&period)?;
    let buckets = aggregate_range(&period, &points, &notes, granularity);

    tracing::debug!(buckets = buckets.len(), notes = notes.len(), "Timeline bucketed");
    Ok(BusinessTimeline {
        period,
        granularity,
        buckets,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn revenue_point(date: NaiveDate, revenue: f64) -> DailyPoint {
        DailyPoint {
            date,
            metrics: MetricSet {
                revenue,
                profit: revenue,
                ..Default::default()
            },
        }
    }

    fn note(date: NaiveDate, title: &str) -> BusinessNote {
        BusinessNote {
            date,
            title: title.to_string(),
            content: String::new(),
        }
    }

    #[test]
    fn test_weekly_bucket_sums_monday_and_tuesday() {
        let points = [revenue_point(d(2024, 3, 4), 100.0), revenue_point(d(2024, 3, 5), 200.0)];
        let buckets = aggregate(&points, &[], Granularity::Weekly);
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].totals.revenue, 300.0);
        assert_eq!(buckets[0].key, "2024-W10");
        assert!(buckets[0].growth.is_none());
    }

    #[test]
    fn test_gaps_are_zero_and_buckets_kept() {
        let period = Period::new(d(2024, 1, 15), d(2024, 3, 10)).unwrap();
        let points = [revenue_point(d(2024, 1, 20), 50.0), revenue_point(d(2024, 3, 1), 75.0)];
        let buckets = aggregate_range(&period, &points, &[], Granularity::Monthly);

        assert_eq!(buckets.len(), 3);
        assert_eq!(buckets[0].start, d(2024, 1, 15));
        assert_eq!(buckets[1].totals.revenue, 0.0);
        assert_eq!(buckets[1].growth.unwrap().revenue, -100.0);
        assert_eq!(buckets[2].end, d(2024, 3, 10));
        assert_eq!(buckets[2].growth.unwrap().revenue, 100.0);
    }

    #[test]
    fn test_notes_attach_chronologically() {
        let period = Period::new(d(2024, 3, 4), d(2024, 3, 17)).unwrap();
        let notes = [
            note(d(2024, 3, 8), "second"),
            note(d(2024, 3, 5), "first"),
            note(d(2024, 3, 12), "next week"),
            note(d(2024, 4, 1), "outside"),
        ];
        let buckets = aggregate_range(&period, &[], &notes, Granularity::Weekly);

        assert_eq!(buckets.len(), 2);
        let titles: Vec<_> = buckets[0].notes.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, vec!["first", "second"]);
        assert_eq!(buckets[1].notes.len(), 1);
    }

    #[test]
    fn test_keys_per_granularity() {
        let date = d(2024, 5, 20);
        assert_eq!(Granularity::Daily.key(date), "2024-05-20");
        assert_eq!(Granularity::Quarterly.key(quarter_start(date)), "2024-Q2");
        assert_eq!(Granularity::Yearly.key(date), "2024");
        assert_eq!(Granularity::Yearly.bucket(date), (d(2024, 1, 1), d(2024, 12, 31)));
        assert_eq!("Weekly".parse::<Granularity>().unwrap(), Granularity::Weekly);
        assert!("hourly".parse::<Granularity>().is_err());
    }

    #[test]
    fn test_empty_input_yields_no_buckets() {
        assert!(aggregate(&[], &[], Granularity::Monthly).is_empty());
    }
}
