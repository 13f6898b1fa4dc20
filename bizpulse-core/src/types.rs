//! Core domain types for bizpulse
//!
//! These types mirror the records kept by the business's operational store.
//! The analytics core only ever reads them.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Client** | A buyer, identified by a stable username that orders refer to |
//! | **Order** | A single sale to a client, attributed to an income source |
//! | **Income source** | A channel the business sells through (a marketplace, referrals, ...) |
//! | **Gig** | A listing offered on an income source, with impression/click analytics |
//! | **Expense** | Money spent, tagged with a free-form category |
//! | **Competitor** | Another seller whose monthly order counts are tracked by hand |
//! | **Business note** | A dated annotation shown next to time-series points |

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ============================================
// Orders
// ============================================

/// Lifecycle state of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    Completed,
    #[serde(rename = "In Progress")]
    InProgress,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Completed => "Completed",
            OrderStatus::InProgress => "In Progress",
            OrderStatus::Cancelled => "Cancelled",
        }
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Completed" => Ok(OrderStatus::Completed),
            "In Progress" => Ok(OrderStatus::InProgress),
            "Cancelled" => Ok(OrderStatus::Cancelled),
            _ => Err(format!("unknown order status: {}", s)),
        }
    }
}

/// A sale to a client.
///
/// Only [`OrderStatus::Completed`] orders count toward revenue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    /// Join key into [`Client::username`]
    pub client_username: String,
    pub date: NaiveDate,
    pub amount: f64,
    /// Income source name
    pub source: String,
    pub gig: Option<String>,
    pub status: OrderStatus,
    /// Client rating, 0-5
    pub rating: Option<f64>,
    #[serde(default)]
    pub cancellation_reasons: Vec<String>,
}

impl Order {
    pub fn is_completed(&self) -> bool {
        self.status == OrderStatus::Completed
    }
}

// ============================================
// Expenses and clients
// ============================================

/// Money spent by the business. Never attributed to an income source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    pub id: String,
    pub date: NaiveDate,
    pub amount: f64,
    /// Free-form, e.g. "Marketing" or "Salary"
    pub category: String,
    pub is_recurring: bool,
}

/// A buyer.
///
/// `client_since` should precede every order of the client, but nothing
/// upstream enforces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub username: String,
    pub client_since: NaiveDate,
    pub is_vip: bool,
    /// Income source the client was acquired through
    pub source: String,
}

// ============================================
// Income sources and gigs
// ============================================

/// Inbound message count recorded for an income source on one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceDataPoint {
    pub date: NaiveDate,
    pub messages: i64,
}

/// Listing analytics recorded for a gig on one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GigAnalyticsPoint {
    pub date: NaiveDate,
    pub impressions: i64,
    pub clicks: i64,
}

/// A listing published on an income source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Gig {
    pub id: String,
    /// Owning [`IncomeSource::id`]
    pub source_id: String,
    pub name: String,
    /// Publication date
    pub date: NaiveDate,
    #[serde(default)]
    pub analytics: Vec<GigAnalyticsPoint>,
}

/// A sales channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomeSource {
    pub id: String,
    /// Unique; orders and clients refer to the source by name
    pub name: String,
    #[serde(default)]
    pub gigs: Vec<Gig>,
    #[serde(default)]
    pub data_points: Vec<SourceDataPoint>,
}

// ============================================
// Competitors and notes
// ============================================

/// Orders a competitor received in one calendar month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompetitorMonth {
    pub year: i32,
    /// 1-12
    pub month: u32,
    pub orders: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Competitor {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub monthly_orders: Vec<CompetitorMonth>,
}

impl Competitor {
    /// Recorded order count for a month, 0 when nothing was recorded.
    pub fn orders_in(&self, year: i32, month: u32) -> i64 {
        self.monthly_orders
            .iter()
            .find(|m| m.year == year && m.month == month)
            .map(|m| m.orders)
            .unwrap_or(0)
    }
}

/// Free-text annotation attached to a day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessNote {
    pub date: NaiveDate,
    pub title: String,
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_status_roundtrip() {
        for status in [
            OrderStatus::Completed,
            OrderStatus::InProgress,
            OrderStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert!("Refunded".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_order_status_serializes_display_name() {
        let json = serde_json::to_string(&OrderStatus::InProgress).unwrap();
        assert_eq!(json, "\"In Progress\"");
    }

    #[test]
    fn test_competitor_missing_month_is_zero() {
        let competitor = Competitor {
            id: "c1".to_string(),
            name: "Rival".to_string(),
            monthly_orders: vec![CompetitorMonth {
                year: 2024,
                month: 3,
                orders: 12,
            }],
        };
        assert_eq!(competitor.orders_in(2024, 3), 12);
        assert_eq!(competitor.orders_in(2024, 4), 0);
    }
}
