//! Aggregation primitives shared by every metric engine.
//!
//! Each primitive reads only the records of one [`Period`] (plus, for
//! lifespans, the history leading up to it) and reduces them to a scalar or
//! a small typed record. No matching records means zero or empty; a failed
//! query is an error.

use super::period::Period;
use crate::db::{CategoryTotal, Database, SourceFilter};
use crate::error::Result;
use crate::types::{Order, OrderStatus};
use chrono::NaiveDate;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Primitive queries bound to one store and source filter.
#[derive(Clone, Copy)]
pub struct Aggregator<'a> {
    db: &'a Database,
    sources: &'a SourceFilter,
}

impl<'a> Aggregator<'a> {
    pub fn new(db: &'a Database, sources: &'a SourceFilter) -> Self {
        Self { db, sources }
    }

    pub fn sources(&self) -> &'a SourceFilter {
        self.sources
    }

    /// Sum of completed order amounts.
    pub fn sum_revenue(&self, period: &Period) -> Result<f64> {
        self.db.sum_completed_revenue(period, self.sources)
    }

    /// Number of completed orders.
    pub fn count_orders(&self, period: &Period) -> Result<i64> {
        self.db
            .count_orders(period, self.sources, Some(OrderStatus::Completed))
    }

    /// Number of cancelled orders.
    pub fn count_cancelled_orders(&self, period: &Period) -> Result<i64> {
        self.db
            .count_orders(period, self.sources, Some(OrderStatus::Cancelled))
    }

    /// Sum of expenses, optionally for one category. Never source-filtered.
    pub fn sum_expenses(&self, period: &Period, category: Option<&str>) -> Result<f64> {
        self.db.sum_expenses(period, category)
    }

    /// Clients whose `client_since` falls in the period.
    pub fn count_new_clients(&self, period: &Period) -> Result<i64> {
        self.db.count_clients_acquired(period, self.sources)
    }

    /// Clients acquired strictly before `date`: the cohort at the start of a period.
    pub fn count_clients_before(&self, date: NaiveDate) -> Result<i64> {
        self.db.count_clients_before(date, self.sources)
    }

    /// Orders of any status in the period, grouped by client username.
    pub fn orders_by_client(&self, period: &Period) -> Result<BTreeMap<String, Vec<Order>>> {
        let mut grouped: BTreeMap<String, Vec<Order>> = BTreeMap::new();
        for order in self.db.list_orders(period, self.sources)? {
            grouped
                .entry(order.client_username.clone())
                .or_default()
                .push(order);
        }
        Ok(grouped)
    }

    /// Lifespans in days of clients whose latest qualifying order is in the period.
    ///
    /// Qualifying orders are the non-cancelled orders up to the period end.
    /// Clients with fewer than two are left out rather than counted as zero.
    pub fn client_lifespans(&self, period: &Period) -> Result<Vec<i64>> {
        let spans = self.db.client_order_spans(period.to(), self.sources)?;
        let lifespans: Vec<i64> = spans
            .into_iter()
            .filter(|span| span.order_count >= 2 && period.contains(span.last_order))
            .map(|span| (span.last_order - span.first_order).num_days().max(0))
            .collect();

        tracing::debug!(
            period = %period,
            clients = lifespans.len(),
            "Computed client lifespans"
        );
        Ok(lifespans)
    }

    /// Expense category with the largest total.
    pub fn top_spending_category(&self, period: &Period) -> Result<Option<CategoryTotal>> {
        Ok(top_by_amount(self.db.expense_totals_by_category(period)?))
    }

    /// Income source with the largest completed revenue.
    pub fn top_revenue_source(&self, period: &Period) -> Result<Option<CategoryTotal>> {
        Ok(top_by_amount(
            self.db.revenue_by_source(period, self.sources)?,
        ))
    }
}

/// Largest amount wins; ties go to the alphabetically first name.
pub fn top_by_amount(mut totals: Vec<CategoryTotal>) -> Option<CategoryTotal> {
    totals.sort_by(|a, b| {
        b.amount
            .partial_cmp(&a.amount)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.name.cmp(&b.name))
    });
    totals.into_iter().next()
}

/// Arithmetic mean, 0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Median, 0 for an empty slice. Even counts average the two middle values.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Lifespan summary in days.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LifespanStats {
    pub mean_days: f64,
    pub median_days: f64,
    pub clients: usize,
}

impl LifespanStats {
    pub fn from_days(lifespans: &[i64]) -> Self {
        let days: Vec<f64> = lifespans.iter().map(|&d| d as f64).collect();
        Self {
            mean_days: mean(&days),
            median_days: median(&days),
            clients: days.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Expense, OrderStatus};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn test_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        db
    }

    fn insert_order(db: &Database, id: &str, client: &str, date: NaiveDate, status: OrderStatus) {
        db.insert_order(&Order {
            id: id.to_string(),
            client_username: client.to_string(),
            date,
            amount: 25.0,
            source: "Fiverr".to_string(),
            gig: None,
            status,
            rating: None,
            cancellation_reasons: Vec::new(),
        })
        .unwrap();
    }

    #[test]
    fn test_median_odd_even_empty() {
        assert_eq!(median(&[30.0, 10.0, 20.0]), 20.0);
        assert_eq!(median(&[20.0, 10.0]), 15.0);
        assert_eq!(median(&[]), 0.0);
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(mean(&[10.0, 20.0, 30.0]), 20.0);
    }

    #[test]
    fn test_top_by_amount_tie_breaks_on_name() {
        let totals = vec![
            CategoryTotal {
                name: "Tools".to_string(),
                amount: 50.0,
            },
            CategoryTotal {
                name: "Ads".to_string(),
                amount: 50.0,
            },
            CategoryTotal {
                name: "Rent".to_string(),
                amount: 10.0,
            },
        ];
        assert_eq!(top_by_amount(totals).unwrap().name, "Ads");
        assert!(top_by_amount(Vec::new()).is_none());
    }

    #[test]
    fn test_lifespan_requires_last_order_in_period() {
        let db = test_db();
        insert_order(&db, "o1", "ann", d(2024, 1, 5), OrderStatus::Completed);
        insert_order(&db, "o2", "ann", d(2024, 3, 5), OrderStatus::Completed);

        let all = SourceFilter::All;
        let agg = Aggregator::new(&db, &all);

        let march = Period::new(d(2024, 3, 1), d(2024, 3, 31)).unwrap();
        assert_eq!(agg.client_lifespans(&march).unwrap(), vec![60]);

        let february = Period::new(d(2024, 2, 1), d(2024, 2, 29)).unwrap();
        assert!(agg.client_lifespans(&february).unwrap().is_empty());
    }

    #[test]
    fn test_single_order_clients_have_no_lifespan() {
        let db = test_db();
        insert_order(&db, "o1", "bob", d(2024, 3, 5), OrderStatus::Completed);
        insert_order(&db, "o2", "bob", d(2024, 3, 6), OrderStatus::Cancelled);
        insert_order(&db, "o3", "cat", d(2024, 3, 7), OrderStatus::Completed);
        insert_order(&db, "o4", "cat", d(2024, 3, 7), OrderStatus::Completed);

        let all = SourceFilter::All;
        let agg = Aggregator::new(&db, &all);
        let march = Period::new(d(2024, 3, 1), d(2024, 3, 31)).unwrap();
        // bob has one qualifying order; cat's two orders share a day.
        assert_eq!(agg.client_lifespans(&march).unwrap(), vec![0]);
    }

    #[test]
    fn test_orders_by_client_includes_every_status() {
        let db = test_db();
        insert_order(&db, "o1", "ann", d(2024, 3, 5), OrderStatus::Completed);
        insert_order(&db, "o2", "ann", d(2024, 3, 6), OrderStatus::Cancelled);
        insert_order(&db, "o3", "bob", d(2024, 3, 7), OrderStatus::InProgress);

        let all = SourceFilter::All;
        let agg = Aggregator::new(&db, &all);
        let march = Period::new(d(2024, 3, 1), d(2024, 3, 31)).unwrap();
        let grouped = agg.orders_by_client(&march).unwrap();
        assert_eq!(grouped["ann"].len(), 2);
        assert_eq!(grouped["bob"].len(), 1);
        assert_eq!(agg.count_orders(&march).unwrap(), 1);
        assert_eq!(agg.count_cancelled_orders(&march).unwrap(), 1);
    }

    #[test]
    fn test_top_spending_category() {
        let db = test_db();
        for (id, category, amount) in [("e1", "Rent", 30.0), ("e2", "Ads", 45.0)] {
            db.insert_expense(&Expense {
                id: id.to_string(),
                date: d(2024, 3, 1),
                amount,
                category: category.to_string(),
                is_recurring: true,
            })
            .unwrap();
        }
        let all = SourceFilter::All;
        let agg = Aggregator::new(&db, &all);
        let march = Period::new(d(2024, 3, 1), d(2024, 3, 31)).unwrap();
        let top = agg.top_spending_category(&march).unwrap().unwrap();
        assert_eq!(top.name, "Ads");
        assert_eq!(top.amount, 45.0);
    }

    #[test]
    fn test_lifespan_stats() {
        let stats = LifespanStats::from_days(&[10, 20, 30]);
        assert_eq!(stats.median_days, 20.0);
        assert_eq!(stats.mean_days, 20.0);
        assert_eq!(stats.clients, 3);
        assert_eq!(LifespanStats::from_days(&[]), LifespanStats::default());
    }
}
