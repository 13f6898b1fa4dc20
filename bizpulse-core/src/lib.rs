//! # bizpulse-core
//!
//! Core library for bizpulse - a small-business operations dashboard.
//!
//! This library provides:
//! - Domain types for clients, orders, expenses, income sources and competitors
//! - A read store on SQLite
//! - Period-comparison analytics (financial, client, growth, marketing, ...)
//! - Configuration management
//! - Logging infrastructure
//!
//! ## Architecture
//!
//! Data flows one way:
//! - **Records:** orders, expenses, clients, sources, notes in the store
//! - **Primitives:** range-bounded sums and counts ([`analytics::aggregate`])
//! - **Engines:** metric sets compared across P2/P1/P0 or two periods
//!
//! Nothing in [`analytics`] writes to the store.
//!
//! ## Example
//!
//! ```rust,no_run
//! use bizpulse_core::analytics::AnalyticsContext;
//! use bizpulse_core::{Config, Database};
//!
//! let config = Config::load().expect("failed to load config");
//! let db = Database::open(&config.resolved_database_path()).expect("failed to open database");
//! db.migrate().expect("failed to run migrations");
//!
//! let ctx = AnalyticsContext::new(&db, &config.analytics);
//! let metrics = ctx
//!     .get_financial_metrics("2024-03-01", "2024-03-31", &[])
//!     .expect("failed to compute metrics");
//! println!("revenue: {}", metrics.total_revenue.value);
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use db::{Database, SourceFilter};
pub use error::{Error, Result};
pub use types::*;

// Public modules
pub mod analytics;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod types;
