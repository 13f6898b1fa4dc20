//! Database repository layer
//!
//! Provides insert operations for every record type and the filter/group/sum
//! queries the analytics core is built on. Query helpers propagate every
//! SQLite failure; an empty result is the only thing reported as zero.

use super::SourceFilter;
use crate::analytics::period::Period;
use crate::error::{Error, Result};
use crate::types::*;
use chrono::NaiveDate;
use rusqlite::types::FromSql;
use rusqlite::{params, Connection, OptionalExtension, Row, ToSql};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// A named amount (expense category, income source, ...).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryTotal {
    pub name: String,
    pub amount: f64,
}

/// First and last non-cancelled order of a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOrderSpan {
    pub username: String,
    pub first_order: NaiveDate,
    pub last_order: NaiveDate,
    pub order_count: i64,
}

/// Completed-order totals for one day.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyOrderTotals {
    pub date: NaiveDate,
    pub revenue: f64,
    pub completed_orders: i64,
}

type SqlParams = Vec<Box<dyn ToSql>>;

/// `<select> WHERE <date_column> BETWEEN from AND to`, ready for more clauses.
fn ranged(select: &str, date_column: &str, period: &Period) -> (String, SqlParams) {
    let sql = format!("{} WHERE {} >= ? AND {} <= ?", select, date_column, date_column);
    let params: SqlParams = vec![Box::new(period.from()), Box::new(period.to())];
    (sql, params)
}

fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(err))
}

#[derive(Debug)]
struct UnknownStatus(String);

impl std::fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for UnknownStatus {}

/// Database handle with connection pooling (single connection for now)
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA cache_size = -64000;  -- 64MB cache
            ",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run migrations on this database
    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn()?;
        super::schema::run_migrations(&conn)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Store("connection lock poisoned".to_string()))
    }

    fn query_scalar<T: FromSql>(&self, sql: &str, params: &SqlParams) -> Result<T> {
        let conn = self.conn()?;
        let params_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let value = conn.query_row(sql, params_refs.as_slice(), |r| r.get(0))?;
        Ok(value)
    }

    fn query_list<T, F>(&self, sql: &str, params: &SqlParams, map: F) -> Result<Vec<T>>
    where
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        let conn = self.conn()?;
        let params_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params_refs.as_slice(), map)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ============================================
    // Write operations (CRUD layer and fixtures)
    // ============================================

    /// Insert or update a client
    pub fn upsert_client(&self, client: &Client) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO clients (username, client_since, is_vip, source)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(username) DO UPDATE SET
                client_since = excluded.client_since,
                is_vip = excluded.is_vip,
                source = excluded.source
            "#,
            params![
                client.username,
                client.client_since,
                client.is_vip,
                client.source
            ],
        )?;
        Ok(())
    }

    /// Insert or replace an order
    pub fn insert_order(&self, order: &Order) -> Result<()> {
        let reasons = if order.cancellation_reasons.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&order.cancellation_reasons)?)
        };
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT OR REPLACE INTO orders
                (id, client_username, date, amount, source, gig, status, rating, cancellation_reasons)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                order.id,
                order.client_username,
                order.date,
                order.amount,
                order.source,
                order.gig,
                order.status.as_str(),
                order.rating,
                reasons,
            ],
        )?;
        Ok(())
    }

    /// Insert or replace an expense
    pub fn insert_expense(&self, expense: &Expense) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT OR REPLACE INTO expenses (id, date, amount, category, is_recurring)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                expense.id,
                expense.date,
                expense.amount,
                expense.category,
                expense.is_recurring
            ],
        )?;
        Ok(())
    }

    /// Insert or update an income source together with its gigs and data points
    pub fn upsert_income_source(&self, source: &IncomeSource) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            r#"
            INSERT INTO income_sources (id, name) VALUES (?1, ?2)
            ON CONFLICT(id) DO UPDATE SET name = excluded.name
            "#,
            params![source.id, source.name],
        )?;
        for point in &source.data_points {
            Self::write_source_data_point(&tx, &source.id, point)?;
        }
        for gig in &source.gigs {
            Self::write_gig(&tx, gig)?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Insert or update a gig and its analytics points
    pub fn insert_gig(&self, gig: &Gig) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        Self::write_gig(&tx, gig)?;
        tx.commit()?;
        Ok(())
    }

    /// Record impressions/clicks for a gig on one day (replaces that day)
    pub fn insert_gig_analytics_point(
        &self,
        gig_id: &str,
        point: &GigAnalyticsPoint,
    ) -> Result<()> {
        let conn = self.conn()?;
        Self::write_gig_point(&conn, gig_id, point)
    }

    /// Record inbound messages for a source on one day (replaces that day)
    pub fn insert_source_data_point(&self, source_id: &str, point: &SourceDataPoint) -> Result<()> {
        let conn = self.conn()?;
        Self::write_source_data_point(&conn, source_id, point)
    }

    fn write_gig(conn: &Connection, gig: &Gig) -> Result<()> {
        conn.execute(
            r#"
            INSERT INTO gigs (id, source_id, name, date) VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET
                source_id = excluded.source_id,
                name = excluded.name,
                date = excluded.date
            "#,
            params![gig.id, gig.source_id, gig.name, gig.date],
        )?;
        for point in &gig.analytics {
            Self::write_gig_point(conn, &gig.id, point)?;
        }
        Ok(())
    }

    fn write_gig_point(conn: &Connection, gig_id: &str, point: &GigAnalyticsPoint) -> Result<()> {
        conn.execute(
            r#"
            INSERT OR REPLACE INTO gig_analytics (gig_id, date, impressions, clicks)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![gig_id, point.date, point.impressions, point.clicks],
        )?;
        Ok(())
    }

    fn write_source_data_point(
        conn: &Connection,
        source_id: &str,
        point: &SourceDataPoint,
    ) -> Result<()> {
        conn.execute(
            r#"
            INSERT OR REPLACE INTO source_data_points (source_id, date, messages)
            VALUES (?1, ?2, ?3)
            "#,
            params![source_id, point.date, point.messages],
        )?;
        Ok(())
    }

    /// Insert or update a competitor and its monthly counts
    pub fn upsert_competitor(&self, competitor: &Competitor) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            r#"
            INSERT INTO competitors (id, name) VALUES (?1, ?2)
            ON CONFLICT(id) DO UPDATE SET name = excluded.name
            "#,
            params![competitor.id, competitor.name],
        )?;
        for month in &competitor.monthly_orders {
            Self::write_competitor_month(&tx, &competitor.id, month)?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Set a competitor's order count for one month
    pub fn set_competitor_month(&self, competitor_id: &str, month: &CompetitorMonth) -> Result<()> {
        let conn = self.conn()?;
        Self::write_competitor_month(&conn, competitor_id, month)
    }

    fn write_competitor_month(
        conn: &Connection,
        competitor_id: &str,
        month: &CompetitorMonth,
    ) -> Result<()> {
        conn.execute(
            r#"
            INSERT OR REPLACE INTO competitor_monthly_orders (competitor_id, year, month, orders)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![competitor_id, month.year, month.month, month.orders],
        )?;
        Ok(())
    }

    /// Add a business note
    pub fn insert_note(&self, note: &BusinessNote) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO business_notes (date, title, content) VALUES (?1, ?2, ?3)",
            params![note.date, note.title, note.content],
        )?;
        Ok(conn.last_insert_rowid())
    }

    // ============================================
    // Order queries
    // ============================================

    fn row_to_order(row: &Row) -> rusqlite::Result<Order> {
        let status: String = row.get("status")?;
        let reasons: Option<String> = row.get("cancellation_reasons")?;
        let cancellation_reasons = match reasons {
            Some(json) => serde_json::from_str(&json).map_err(|e| conversion_error(8, e))?,
            None => Vec::new(),
        };

        Ok(Order {
            id: row.get("id")?,
            client_username: row.get("client_username")?,
            date: row.get("date")?,
            amount: row.get("amount")?,
            source: row.get("source")?,
            gig: row.get("gig")?,
            status: status
                .parse()
                .map_err(|e: String| conversion_error(6, UnknownStatus(e)))?,
            rating: row.get("rating")?,
            cancellation_reasons,
        })
    }

    /// Sum of completed order amounts in a period
    pub fn sum_completed_revenue(&self, period: &Period, sources: &SourceFilter) -> Result<f64> {
        let (mut sql, mut params) = ranged(
            "SELECT COALESCE(SUM(amount), 0.0) FROM orders",
            "date",
            period,
        );
        sql.push_str(" AND status = 'Completed'");
        sources.push_clause("source", &mut sql, &mut params);
        self.query_scalar(&sql, &params)
    }

    /// Count orders in a period, optionally restricted to one status
    pub fn count_orders(
        &self,
        period: &Period,
        sources: &SourceFilter,
        status: Option<OrderStatus>,
    ) -> Result<i64> {
        let (mut sql, mut params) = ranged("SELECT COUNT(*) FROM orders", "date", period);
        if let Some(status) = status {
            sql.push_str(" AND status = ?");
            params.push(Box::new(status.as_str()));
        }
        sources.push_clause("source", &mut sql, &mut params);
        self.query_scalar(&sql, &params)
    }

    /// All orders (any status) in a period, oldest first
    pub fn list_orders(&self, period: &Period, sources: &SourceFilter) -> Result<Vec<Order>> {
        let (mut sql, mut params) = ranged("SELECT * FROM orders", "date", period);
        sources.push_clause("source", &mut sql, &mut params);
        sql.push_str(" ORDER BY date, id");
        self.query_list(&sql, &params, Self::row_to_order)
    }

    /// Orders placed through a gig in a period, oldest first
    ///
    /// Orders name the gig, not its id, so they are matched on the gig name
    /// and the name of the gig's own income source.
    pub fn list_gig_orders(&self, gig_id: &str, period: &Period) -> Result<Vec<Order>> {
        let (mut sql, mut params) = ranged(
            r#"
            SELECT o.*
            FROM orders o
            JOIN gigs g ON g.name = o.gig
            JOIN income_sources s ON s.id = g.source_id AND s.name = o.source
            "#,
            "o.date",
            period,
        );
        sql.push_str(" AND g.id = ? ORDER BY o.date, o.id");
        params.push(Box::new(gig_id.to_string()));
        self.query_list(&sql, &params, Self::row_to_order)
    }

    /// Per-client first/last non-cancelled order dates up to `until` (inclusive)
    pub fn client_order_spans(
        &self,
        until: NaiveDate,
        sources: &SourceFilter,
    ) -> Result<Vec<ClientOrderSpan>> {
        let mut sql = String::from(
            r#"
            SELECT client_username, MIN(date), MAX(date), COUNT(*)
            FROM orders
            WHERE status != 'Cancelled' AND date <= ?
            "#,
        );
        let mut params: SqlParams = vec![Box::new(until)];
        sources.push_clause("source", &mut sql, &mut params);
        sql.push_str(" GROUP BY client_username ORDER BY client_username");

        self.query_list(&sql, &params, |row| {
            Ok(ClientOrderSpan {
                username: row.get(0)?,
                first_order: row.get(1)?,
                last_order: row.get(2)?,
                order_count: row.get(3)?,
            })
        })
    }

    /// Completed revenue per income source in a period
    pub fn revenue_by_source(
        &self,
        period: &Period,
        sources: &SourceFilter,
    ) -> Result<Vec<CategoryTotal>> {
        let (mut sql, mut params) =
            ranged("SELECT source, SUM(amount) FROM orders", "date", period);
        sql.push_str(" AND status = 'Completed'");
        sources.push_clause("source", &mut sql, &mut params);
        sql.push_str(" GROUP BY source");

        self.query_list(&sql, &params, |row| {
            Ok(CategoryTotal {
                name: row.get(0)?,
                amount: row.get(1)?,
            })
        })
    }

    /// Completed revenue and order count per day (days without orders are absent)
    pub fn daily_order_totals(
        &self,
        period: &Period,
        sources: &SourceFilter,
    ) -> Result<Vec<DailyOrderTotals>> {
        let (mut sql, mut params) = ranged(
            "SELECT date, SUM(amount), COUNT(*) FROM orders",
            "date",
            period,
        );
        sql.push_str(" AND status = 'Completed'");
        sources.push_clause("source", &mut sql, &mut params);
        sql.push_str(" GROUP BY date ORDER BY date");

        self.query_list(&sql, &params, |row| {
            Ok(DailyOrderTotals {
                date: row.get(0)?,
                revenue: row.get(1)?,
                completed_orders: row.get(2)?,
            })
        })
    }

    // ============================================
    // Expense queries
    // ============================================

    /// Sum of expenses in a period, optionally for one category
    pub fn sum_expenses(&self, period: &Period, category: Option<&str>) -> Result<f64> {
        let (mut sql, mut params) = ranged(
            "SELECT COALESCE(SUM(amount), 0.0) FROM expenses",
            "date",
            period,
        );
        if let Some(category) = category {
            sql.push_str(" AND category = ?");
            params.push(Box::new(category.to_string()));
        }
        self.query_scalar(&sql, &params)
    }

    /// Expense totals per category in a period
    pub fn expense_totals_by_category(&self, period: &Period) -> Result<Vec<CategoryTotal>> {
        let (mut sql, params) =
            ranged("SELECT category, SUM(amount) FROM expenses", "date", period);
        sql.push_str(" GROUP BY category");

        self.query_list(&sql, &params, |row| {
            Ok(CategoryTotal {
                name: row.get(0)?,
                amount: row.get(1)?,
            })
        })
    }

    /// Expense totals per day (days without expenses are absent)
    pub fn daily_expense_totals(&self, period: &Period) -> Result<BTreeMap<NaiveDate, f64>> {
        let (mut sql, params) = ranged("SELECT date, SUM(amount) FROM expenses", "date", period);
        sql.push_str(" GROUP BY date");

        let rows = self.query_list(&sql, &params, |row| Ok((row.get(0)?, row.get(1)?)))?;
        Ok(rows.into_iter().collect())
    }

    // ============================================
    // Client queries
    // ============================================

    fn row_to_client(row: &Row) -> rusqlite::Result<Client> {
        Ok(Client {
            username: row.get("username")?,
            client_since: row.get("client_since")?,
            is_vip: row.get("is_vip")?,
            source: row.get("source")?,
        })
    }

    /// Clients whose `client_since` falls in the period
    pub fn count_clients_acquired(&self, period: &Period, sources: &SourceFilter) -> Result<i64> {
        let (mut sql, mut params) =
            ranged("SELECT COUNT(*) FROM clients", "client_since", period);
        sources.push_clause("source", &mut sql, &mut params);
        self.query_scalar(&sql, &params)
    }

    /// Clients acquired strictly before `date`
    pub fn count_clients_before(&self, date: NaiveDate, sources: &SourceFilter) -> Result<i64> {
        let mut sql = String::from("SELECT COUNT(*) FROM clients WHERE client_since < ?");
        let mut params: SqlParams = vec![Box::new(date)];
        sources.push_clause("source", &mut sql, &mut params);
        self.query_scalar(&sql, &params)
    }

    /// Clients acquired strictly before `date`, by username
    pub fn list_clients_before(
        &self,
        date: NaiveDate,
        sources: &SourceFilter,
    ) -> Result<Vec<Client>> {
        let mut sql = String::from("SELECT * FROM clients WHERE client_since < ?");
        let mut params: SqlParams = vec![Box::new(date)];
        sources.push_clause("source", &mut sql, &mut params);
        sql.push_str(" ORDER BY username");
        self.query_list(&sql, &params, Self::row_to_client)
    }

    /// New clients per day (days without acquisitions are absent)
    pub fn daily_new_clients(
        &self,
        period: &Period,
        sources: &SourceFilter,
    ) -> Result<BTreeMap<NaiveDate, i64>> {
        let (mut sql, mut params) = ranged(
            "SELECT client_since, COUNT(*) FROM clients",
            "client_since",
            period,
        );
        sources.push_clause("source", &mut sql, &mut params);
        sql.push_str(" GROUP BY client_since");

        let rows = self.query_list(&sql, &params, |row| Ok((row.get(0)?, row.get(1)?)))?;
        Ok(rows.into_iter().collect())
    }

    /// Look up clients by username; unknown usernames are simply missing
    pub fn get_clients(&self, usernames: &[String]) -> Result<Vec<Client>> {
        if usernames.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; usernames.len()].join(", ");
        let sql = format!(
            "SELECT * FROM clients WHERE username IN ({}) ORDER BY username",
            placeholders
        );
        let params: SqlParams = usernames
            .iter()
            .map(|u| Box::new(u.clone()) as Box<dyn ToSql>)
            .collect();
        self.query_list(&sql, &params, Self::row_to_client)
    }

    // ============================================
    // Income sources and gigs
    // ============================================

    /// Inbound messages recorded for the selected sources in a period
    pub fn sum_source_messages(&self, period: &Period, sources: &SourceFilter) -> Result<i64> {
        let (mut sql, mut params) = ranged(
            r#"
            SELECT COALESCE(SUM(p.messages), 0)
            FROM source_data_points p
            JOIN income_sources s ON s.id = p.source_id
            "#,
            "p.date",
            period,
        );
        sources.push_clause("s.name", &mut sql, &mut params);
        self.query_scalar(&sql, &params)
    }

    /// Get an income source with its gigs and data points
    pub fn get_income_source(&self, id: &str) -> Result<Option<IncomeSource>> {
        let name: Option<String> = {
            let conn = self.conn()?;
            conn.query_row(
                "SELECT name FROM income_sources WHERE id = ?",
                [id],
                |r| r.get(0),
            )
            .optional()?
        };
        let Some(name) = name else {
            return Ok(None);
        };

        let params: SqlParams = vec![Box::new(id.to_string())];
        let data_points = self.query_list(
            "SELECT date, messages FROM source_data_points WHERE source_id = ? ORDER BY date",
            &params,
            |row| {
                Ok(SourceDataPoint {
                    date: row.get(0)?,
                    messages: row.get(1)?,
                })
            },
        )?;
        let gig_ids: Vec<String> = self.query_list(
            "SELECT id FROM gigs WHERE source_id = ? ORDER BY date, id",
            &params,
            |row| row.get(0),
        )?;

        let mut gigs = Vec::with_capacity(gig_ids.len());
        for gig_id in gig_ids {
            if let Some(gig) = self.get_gig(&gig_id)? {
                gigs.push(gig);
            }
        }

        Ok(Some(IncomeSource {
            id: id.to_string(),
            name,
            gigs,
            data_points,
        }))
    }

    /// Get a gig with its analytics points
    pub fn get_gig(&self, id: &str) -> Result<Option<Gig>> {
        let gig = {
            let conn = self.conn()?;
            conn.query_row(
                "SELECT id, source_id, name, date FROM gigs WHERE id = ?",
                [id],
                |row| {
                    Ok(Gig {
                        id: row.get(0)?,
                        source_id: row.get(1)?,
                        name: row.get(2)?,
                        date: row.get(3)?,
                        analytics: Vec::new(),
                    })
                },
            )
            .optional()?
        };
        let Some(mut gig) = gig else {
            return Ok(None);
        };

        let params: SqlParams = vec![Box::new(id.to_string())];
        gig.analytics = self.query_list(
            "SELECT date, impressions, clicks FROM gig_analytics WHERE gig_id = ? ORDER BY date",
            &params,
            |row| {
                Ok(GigAnalyticsPoint {
                    date: row.get(0)?,
                    impressions: row.get(1)?,
                    clicks: row.get(2)?,
                })
            },
        )?;
        Ok(Some(gig))
    }

    // ============================================
    // Competitors and notes
    // ============================================

    /// All competitors with their monthly counts, by name
    pub fn list_competitors(&self) -> Result<Vec<Competitor>> {
        let mut competitors = self.query_list(
            "SELECT id, name FROM competitors ORDER BY name, id",
            &Vec::new(),
            |row| {
                Ok(Competitor {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    monthly_orders: Vec::new(),
                })
            },
        )?;

        for competitor in &mut competitors {
            let params: SqlParams = vec![Box::new(competitor.id.clone())];
            competitor.monthly_orders = self.query_list(
                r#"
                SELECT year, month, orders FROM competitor_monthly_orders
                WHERE competitor_id = ?
                ORDER BY year, month
                "#,
                &params,
                |row| {
                    Ok(CompetitorMonth {
                        year: row.get(0)?,
                        month: row.get(1)?,
                        orders: row.get(2)?,
                    })
                },
            )?;
        }

        Ok(competitors)
    }

    /// Notes dated within a period, chronological
    pub fn list_notes(&self, period: &Period) -> Result<Vec<BusinessNote>> {
        let (mut sql, params) =
            ranged("SELECT date, title, content FROM business_notes", "date", period);
        sql.push_str(" ORDER BY date, id");

        self.query_list(&sql, &params, |row| {
            Ok(BusinessNote {
                date: row.get(0)?,
                title: row.get(1)?,
                content: row.get(2)?,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn march() -> Period {
        Period::new(d(2024, 3, 1), d(2024, 3, 31)).unwrap()
    }

    fn test_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        db
    }

    fn order(id: &str, client: &str, date: NaiveDate, amount: f64, status: OrderStatus) -> Order {
        Order {
            id: id.to_string(),
            client_username: client.to_string(),
            date,
            amount,
            source: "Fiverr".to_string(),
            gig: None,
            status,
            rating: None,
            cancellation_reasons: Vec::new(),
        }
    }

    #[test]
    fn test_order_roundtrip() {
        let db = test_db();
        let mut cancelled = order("o1", "ann", d(2024, 3, 2), 40.0, OrderStatus::Cancelled);
        cancelled.cancellation_reasons = vec!["Scope changed".to_string()];
        cancelled.rating = Some(2.0);
        cancelled.gig = Some("Logo design".to_string());
        db.insert_order(&cancelled).unwrap();

        let orders = db.list_orders(&march(), &SourceFilter::All).unwrap();
        assert_eq!(orders, vec![cancelled]);
    }

    #[test]
    fn test_revenue_counts_only_completed_orders() {
        let db = test_db();
        db.insert_order(&order("o1", "ann", d(2024, 3, 2), 100.0, OrderStatus::Completed))
            .unwrap();
        db.insert_order(&order("o2", "ann", d(2024, 3, 3), 50.0, OrderStatus::Cancelled))
            .unwrap();
        db.insert_order(&order("o3", "bob", d(2024, 3, 4), 70.0, OrderStatus::InProgress))
            .unwrap();
        db.insert_order(&order("o4", "bob", d(2024, 4, 1), 500.0, OrderStatus::Completed))
            .unwrap();

        let all = SourceFilter::All;
        assert_eq!(db.sum_completed_revenue(&march(), &all).unwrap(), 100.0);
        assert_eq!(
            db.count_orders(&march(), &all, Some(OrderStatus::Completed))
                .unwrap(),
            1
        );
        assert_eq!(
            db.count_orders(&march(), &all, Some(OrderStatus::Cancelled))
                .unwrap(),
            1
        );
        assert_eq!(db.count_orders(&march(), &all, None).unwrap(), 3);
    }

    #[test]
    fn test_source_filter_applies_to_orders() {
        let db = test_db();
        let mut direct = order("o1", "ann", d(2024, 3, 2), 100.0, OrderStatus::Completed);
        direct.source = "Direct".to_string();
        db.insert_order(&direct).unwrap();
        db.insert_order(&order("o2", "bob", d(2024, 3, 2), 30.0, OrderStatus::Completed))
            .unwrap();

        let fiverr = SourceFilter::from_names(["Fiverr"]);
        assert_eq!(db.sum_completed_revenue(&march(), &fiverr).unwrap(), 30.0);

        let by_source = db.revenue_by_source(&march(), &SourceFilter::All).unwrap();
        assert_eq!(by_source.len(), 2);
    }

    #[test]
    fn test_empty_store_sums_are_zero() {
        let db = test_db();
        assert_eq!(db.sum_completed_revenue(&march(), &SourceFilter::All).unwrap(), 0.0);
        assert_eq!(db.sum_expenses(&march(), None).unwrap(), 0.0);
        assert_eq!(db.sum_source_messages(&march(), &SourceFilter::All).unwrap(), 0);
        assert!(db.list_notes(&march()).unwrap().is_empty());
    }

    #[test]
    fn test_expense_sums_by_category() {
        let db = test_db();
        for (id, category, amount) in [
            ("e1", "Marketing", 20.0),
            ("e2", "Salary", 50.0),
            ("e3", "Marketing", 5.0),
        ] {
            db.insert_expense(&Expense {
                id: id.to_string(),
                date: d(2024, 3, 10),
                amount,
                category: category.to_string(),
                is_recurring: false,
            })
            .unwrap();
        }

        assert_eq!(db.sum_expenses(&march(), None).unwrap(), 75.0);
        assert_eq!(db.sum_expenses(&march(), Some("Marketing")).unwrap(), 25.0);
        let totals = db.expense_totals_by_category(&march()).unwrap();
        assert_eq!(totals.len(), 2);
    }

    #[test]
    fn test_client_counts() {
        let db = test_db();
        for (name, since, source) in [
            ("ann", d(2024, 1, 10), "Fiverr"),
            ("bob", d(2024, 3, 5), "Fiverr"),
            ("cat", d(2024, 3, 6), "Direct"),
        ] {
            db.upsert_client(&Client {
                username: name.to_string(),
                client_since: since,
                is_vip: false,
                source: source.to_string(),
            })
            .unwrap();
        }

        let all = SourceFilter::All;
        assert_eq!(db.count_clients_acquired(&march(), &all).unwrap(), 2);
        assert_eq!(
            db.count_clients_acquired(&march(), &SourceFilter::from_names(["Direct"]))
                .unwrap(),
            1
        );
        assert_eq!(db.count_clients_before(d(2024, 3, 1), &all).unwrap(), 1);
        assert_eq!(db.list_clients_before(d(2024, 3, 6), &all).unwrap().len(), 2);

        let found = db
            .get_clients(&["bob".to_string(), "zed".to_string()])
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].client_since, d(2024, 3, 5));
    }

    #[test]
    fn test_client_order_spans_skip_cancelled_and_future() {
        let db = test_db();
        db.insert_order(&order("o1", "ann", d(2024, 1, 5), 10.0, OrderStatus::Completed))
            .unwrap();
        db.insert_order(&order("o2", "ann", d(2024, 3, 5), 10.0, OrderStatus::InProgress))
            .unwrap();
        db.insert_order(&order("o3", "ann", d(2024, 3, 20), 10.0, OrderStatus::Cancelled))
            .unwrap();
        db.insert_order(&order("o4", "ann", d(2024, 5, 1), 10.0, OrderStatus::Completed))
            .unwrap();

        let spans = db
            .client_order_spans(d(2024, 3, 31), &SourceFilter::All)
            .unwrap();
        assert_eq!(
            spans,
            vec![ClientOrderSpan {
                username: "ann".to_string(),
                first_order: d(2024, 1, 5),
                last_order: d(2024, 3, 5),
                order_count: 2,
            }]
        );
    }

    #[test]
    fn test_income_source_with_gigs() {
        let db = test_db();
        db.upsert_income_source(&IncomeSource {
            id: "src-1".to_string(),
            name: "Fiverr".to_string(),
            gigs: vec![Gig {
                id: "gig-1".to_string(),
                source_id: "src-1".to_string(),
                name: "Logo design".to_string(),
                date: d(2024, 2, 1),
                analytics: vec![GigAnalyticsPoint {
                    date: d(2024, 3, 1),
                    impressions: 100,
                    clicks: 7,
                }],
            }],
            data_points: vec![
                SourceDataPoint {
                    date: d(2024, 3, 1),
                    messages: 4,
                },
                SourceDataPoint {
                    date: d(2024, 4, 1),
                    messages: 9,
                },
            ],
        })
        .unwrap();

        let source = db.get_income_source("src-1").unwrap().unwrap();
        assert_eq!(source.gigs.len(), 1);
        assert_eq!(source.gigs[0].analytics[0].clicks, 7);
        assert_eq!(source.data_points.len(), 2);
        assert_eq!(
            db.sum_source_messages(&march(), &SourceFilter::from_names(["Fiverr"]))
                .unwrap(),
            4
        );
        assert_eq!(
            db.sum_source_messages(&march(), &SourceFilter::from_names(["Upwork"]))
                .unwrap(),
            0
        );
        assert!(db.get_income_source("missing").unwrap().is_none());
        assert!(db.get_gig("missing").unwrap().is_none());
    }

    #[test]
    fn test_competitors_and_notes() {
        let db = test_db();
        db.upsert_competitor(&Competitor {
            id: "c1".to_string(),
            name: "Rival".to_string(),
            monthly_orders: vec![CompetitorMonth {
                year: 2024,
                month: 3,
                orders: 11,
            }],
        })
        .unwrap();
        db.set_competitor_month(
            "c1",
            &CompetitorMonth {
                year: 2024,
                month: 4,
                orders: 3,
            },
        )
        .unwrap();

        let competitors = db.list_competitors().unwrap();
        assert_eq!(competitors[0].monthly_orders.len(), 2);

        db.insert_note(&BusinessNote {
            date: d(2024, 3, 9),
            title: "Price change".to_string(),
            content: "Raised base tier".to_string(),
        })
        .unwrap();
        db.insert_note(&BusinessNote {
            date: d(2024, 3, 2),
            title: "Launch".to_string(),
            content: String::new(),
        })
        .unwrap();
        let notes = db.list_notes(&march()).unwrap();
        assert_eq!(notes[0].title, "Launch");
        assert_eq!(notes[1].title, "Price change");
    }
}
