//! Database layer for bizpulse
//!
//! This module provides the read store using SQLite with:
//! - Schema migrations
//! - Repository pattern for filter/group/sum queries
//! - A write API used by the CRUD layer and test fixtures

pub mod repo;
pub mod schema;

pub use repo::{CategoryTotal, ClientOrderSpan, Database, DailyOrderTotals};

use std::collections::BTreeSet;

/// Restricts queries to a set of income sources.
///
/// Applies to orders, clients and source message counts. Expenses are
/// never source-filtered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SourceFilter {
    /// Every source
    #[default]
    All,
    /// Only the named sources
    Only(BTreeSet<String>),
}

impl SourceFilter {
    /// Build a filter from caller input. An empty list means every source.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set: BTreeSet<String> = names.into_iter().map(Into::into).collect();
        if set.is_empty() {
            SourceFilter::All
        } else {
            SourceFilter::Only(set)
        }
    }

    pub fn matches(&self, source: &str) -> bool {
        match self {
            SourceFilter::All => true,
            SourceFilter::Only(names) => names.contains(source),
        }
    }

    /// Append ` AND <column> IN (?, ...)` and its parameters.
    pub(crate) fn push_clause(
        &self,
        column: &str,
        sql: &mut String,
        params: &mut Vec<Box<dyn rusqlite::ToSql>>,
    ) {
        if let SourceFilter::Only(names) = self {
            let placeholders = vec!["?"; names.len()].join(", ");
            sql.push_str(&format!(" AND {} IN ({})", column, placeholders));
            for name in names {
                params.push(Box::new(name.clone()));
            }
        }
    }
}
