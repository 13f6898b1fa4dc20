//! Analytics module for bizpulse
//!
//! Period-comparison metrics computed from the read store:
//! - Financial metrics (revenue, profit, margins, CAC, AOV, CLTV)
//! - Client metrics (retention, repeat purchases, CSAT, lifespan)
//! - Growth metrics with a calendar-month series
//! - Marketing metrics (CPL, ROMI)
//! - Order counts by buyer type
//! - Gig and income-source analytics
//! - Business timeline and competitor benchmark
//!
//! ## Building blocks
//!
//! [`period`] derives the comparison windows, [`growth`] holds the change
//! formulas and the three-period helper, [`aggregate`] wraps the store
//! queries every engine reads through. Engines take a typed [`Period`] and
//! [`SourceFilter`]; [`AnalyticsContext`] exposes the same engines to
//! callers holding ISO date strings.

pub mod aggregate;
pub mod clients;
pub mod competitors;
pub mod entity;
pub mod financial;
pub mod growth;
pub mod growth_metrics;
pub mod marketing;
pub mod orders;
pub mod period;
pub mod timeseries;

pub use aggregate::{Aggregator, LifespanStats};
pub use clients::{client_metrics, ClientMetricData};
pub use competitors::{competitor_benchmark, CompetitorBenchmark};
pub use entity::{gig_analytics, source_analytics, GigAnalyticsData, SourceAnalyticsData};
pub use financial::{financial_metrics, FinancialMetricData};
pub use growth::{absolute_change, percent_change, ChangeKind, MetricValue};
pub use growth_metrics::{growth_metrics, GrowthMetricData, GrowthPoint};
pub use marketing::{marketing_metrics, MarketingMetricData};
pub use orders::{order_count_analytics, OrderCountAnalytics, OrderCountStats};
pub use period::{derive_periods, Period, PeriodSet};
pub use timeseries::{business_timeline, BusinessTimeline, Granularity, TimeBucket};

use crate::config::AnalyticsConfig;
use crate::db::{Database, SourceFilter};
use crate::error::Result;
use chrono::{NaiveDate, Utc};

/// Store and settings shared by every metric computation.
///
/// Holds no state of its own, so concurrent calls on one context are
/// independent.
#[derive(Clone, Copy)]
pub struct AnalyticsContext<'a> {
    pub db: &'a Database,
    pub config: &'a AnalyticsConfig,
}

impl<'a> AnalyticsContext<'a> {
    pub fn new(db: &'a Database, config: &'a AnalyticsConfig) -> Self {
        Self { db, config }
    }

    /// Today's date in UTC.
    pub fn today() -> NaiveDate {
        Utc::now().date_naive()
    }

    pub fn get_financial_metrics(
        &self,
        from: &str,
        to: &str,
        sources: &[String],
    ) -> Result<FinancialMetricData> {
        financial_metrics(self, Period::parse(from, to)?, &SourceFilter::from_names(sources))
    }

    pub fn get_client_metrics(
        &self,
        from: &str,
        to: &str,
        sources: &[String],
    ) -> Result<ClientMetricData> {
        client_metrics(self, Period::parse(from, to)?, &SourceFilter::from_names(sources))
    }

    pub fn get_growth_metrics(
        &self,
        from: &str,
        to: &str,
        sources: &[String],
    ) -> Result<GrowthMetricData> {
        growth_metrics(self, Period::parse(from, to)?, &SourceFilter::from_names(sources))
    }

    /// Sources are required here; an empty list is [`crate::Error::InvalidInput`].
    pub fn get_marketing_metrics(
        &self,
        from: &str,
        to: &str,
        sources: &[String],
    ) -> Result<MarketingMetricData> {
        marketing_metrics(self, Period::parse(from, to)?, &SourceFilter::from_names(sources))
    }

    pub fn get_order_count_analytics(
        &self,
        from: &str,
        to: &str,
        sources: &[String],
    ) -> Result<OrderCountAnalytics> {
        order_count_analytics(self, Period::parse(from, to)?, &SourceFilter::from_names(sources))
    }

    /// `None` when the gig does not exist.
    pub fn get_gig_analytics(
        &self,
        gig_id: &str,
        from: Option<&str>,
        to: Option<&str>,
    ) -> Result<Option<GigAnalyticsData>> {
        let window = entity::resolve_window(
            from,
            to,
            Self::today(),
            self.config.default_window_days,
        )?;
        gig_analytics(self, gig_id, window)
    }

    /// `None` when the income source does not exist.
    pub fn get_source_analytics(
        &self,
        source_id: &str,
        from: Option<&str>,
        to: Option<&str>,
    ) -> Result<Option<SourceAnalyticsData>> {
        let window = entity::resolve_window(
            from,
            to,
            Self::today(),
            self.config.default_window_days,
        )?;
        source_analytics(self, source_id, window)
    }

    pub fn get_business_timeline(
        &self,
        from: &str,
        to: &str,
        sources: &[String],
        granularity: Granularity,
    ) -> Result<BusinessTimeline> {
        business_timeline(
            self,
            Period::parse(from, to)?,
            &SourceFilter::from_names(sources),
            granularity,
        )
    }

    pub fn get_competitor_benchmark(&self, from: &str, to: &str) -> Result<CompetitorBenchmark> {
        competitor_benchmark(self, Period::parse(from, to)?)
    }
}
