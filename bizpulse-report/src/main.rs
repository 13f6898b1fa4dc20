//! bizpulse-report - business metrics from the command line
//!
//! Prints period-over-period metrics from the bizpulse store as a terminal
//! summary or JSON.

use anyhow::{Context, Result};
use bizpulse_core::analytics::{
    AnalyticsContext, BusinessTimeline, ClientMetricData, CompetitorBenchmark,
    FinancialMetricData, GigAnalyticsData, Granularity, GrowthMetricData, MarketingMetricData,
    MetricValue, OrderCountAnalytics, Period, SourceAnalyticsData,
};
use bizpulse_core::{Config, Database};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "bizpulse-report")]
#[command(about = "Period-over-period business metrics")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Print JSON instead of a terminal summary
    #[arg(long, global = true)]
    json: bool,

    /// Database file (default: from config, then $XDG_DATA_HOME/bizpulse/data.db)
    #[arg(long, global = true)]
    db: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
struct RangeArgs {
    /// First day of the period (YYYY-MM-DD)
    #[arg(long)]
    from: String,

    /// Last day of the period, inclusive (YYYY-MM-DD)
    #[arg(long)]
    to: String,

    /// Only count this income source (repeatable)
    #[arg(long = "source")]
    sources: Vec<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Revenue, expenses, profit, margins, CAC, AOV and CLTV
    Financial(RangeArgs),
    /// Retention, repeat purchases, satisfaction and lifespan
    Clients(RangeArgs),
    /// Growth trends with a month-by-month series
    Growth(RangeArgs),
    /// Cost per lead and marketing ROI (needs --source)
    Marketing(RangeArgs),
    /// Completed orders from new vs repeat buyers
    Orders(RangeArgs),
    /// Daily analytics for one gig
    Gig {
        id: String,
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
    },
    /// Daily analytics for one income source
    Source {
        id: String,
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
    },
    /// Revenue, expenses and clients bucketed over time, with notes
    Timeline {
        #[command(flatten)]
        range: RangeArgs,

        /// daily, weekly, monthly, quarterly or yearly
        #[arg(long, default_value = "monthly")]
        granularity: String,
    },
    /// Monthly market share against tracked competitors
    Competitors {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration and database
    let config = Config::load().context("failed to load configuration")?;
    let _log_guard = bizpulse_core::logging::init(&config.logging).ok();

    let db_path = args
        .db
        .clone()
        .unwrap_or_else(|| config.resolved_database_path());
    let db = Database::open(&db_path)
        .with_context(|| format!("failed to open database at {}", db_path.display()))?;
    db.migrate().context("failed to migrate database")?;
    tracing::debug!(db = %db_path.display(), command = ?args.command, "Running report");

    let ctx = AnalyticsContext::new(&db, &config.analytics);
    let json = args.json;

    match &args.command {
        Command::Financial(r) => {
            let data = ctx
                .get_financial_metrics(&r.from, &r.to, &r.sources)
                .context("failed to compute financial metrics")?;
            emit(json, &data, print_financial)
        }
        Command::Clients(r) => {
            let data = ctx
                .get_client_metrics(&r.from, &r.to, &r.sources)
                .context("failed to compute client metrics")?;
            emit(json, &data, print_clients)
        }
        Command::Growth(r) => {
            let data = ctx
                .get_growth_metrics(&r.from, &r.to, &r.sources)
                .context("failed to compute growth metrics")?;
            emit(json, &data, print_growth)
        }
        Command::Marketing(r) => {
            let data = ctx
                .get_marketing_metrics(&r.from, &r.to, &r.sources)
                .context("failed to compute marketing metrics")?;
            emit(json, &data, print_marketing)
        }
        Command::Orders(r) => {
            let data = ctx
                .get_order_count_analytics(&r.from, &r.to, &r.sources)
                .context("failed to compute order counts")?;
            emit(json, &data, print_orders)
        }
        Command::Gig { id, from, to } => {
            let data = ctx
                .get_gig_analytics(id, from.as_deref(), to.as_deref())
                .context("failed to compute gig analytics")?
                .with_context(|| format!("gig not found: {}", id))?;
            emit(json, &data, print_gig)
        }
        Command::Source { id, from, to } => {
            let data = ctx
                .get_source_analytics(id, from.as_deref(), to.as_deref())
                .context("failed to compute source analytics")?
                .with_context(|| format!("income source not found: {}", id))?;
            emit(json, &data, print_source)
        }
        Command::Timeline { range, granularity } => {
            let granularity: Granularity = granularity.parse()?;
            let data = ctx
                .get_business_timeline(&range.from, &range.to, &range.sources, granularity)
                .context("failed to build timeline")?;
            emit(json, &data, print_timeline)
        }
        Command::Competitors { from, to } => {
            let data = ctx
                .get_competitor_benchmark(from, to)
                .context("failed to compute competitor benchmark")?;
            emit(json, &data, print_competitors)
        }
    }
}

fn emit<T: Serialize>(json: bool, data: &T, print_terminal: fn(&T)) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(data)?);
    } else {
        print_terminal(data);
    }
    Ok(())
}

// ============================================
// Terminal formatting
// ============================================

fn header(title: &str, period: &Period) {
    let subtitle = format!("{} to {} ({} days)", period.from(), period.to(), period.day_count());
    println!();
    println!("╭{}╮", "─".repeat(60));
    println!("│{:^60}│", title);
    println!("│{:^60}│", subtitle);
    println!("╰{}╯", "─".repeat(60));
    println!();
}

fn format_delta(delta: f64) -> String {
    if delta >= 0.0 {
        format!("+{:.1}%", delta)
    } else {
        format!("{:.1}%", delta)
    }
}

fn format_points(delta: f64) -> String {
    if delta >= 0.0 {
        format!("+{:.1}pp", delta)
    } else {
        format!("{:.1}pp", delta)
    }
}

/// One metric row. Rates (`points`) show their change in percentage points.
fn row(label: &str, metric: &MetricValue, points: bool) {
    let fmt: fn(f64) -> String = if points { format_points } else { format_delta };
    let prior = metric
        .previous_period_change
        .map(|c| format!("  (prev {})", fmt(c)))
        .unwrap_or_default();
    println!(
        "   {:<22} {:>12.2}  {:>9}{}",
        label,
        metric.value,
        fmt(metric.change),
        prior
    );
}

fn print_financial(data: &FinancialMetricData) {
    header("FINANCIAL METRICS", &data.periods.current);
    row("Revenue", &data.total_revenue, false);
    row("Expenses", &data.total_expenses, false);
    row("Net profit", &data.net_profit, false);
    row("Profit margin %", &data.profit_margin, true);
    row("Gross margin %", &data.gross_margin, true);
    row("CAC", &data.cac, false);
    row("AOV", &data.aov, false);
    row("CLTV", &data.cltv, false);
    println!();
    if let Some(top) = &data.top_spending_category {
        println!("   Top spending category: {} ({:.2})", top.name, top.amount);
    }
    if let Some(top) = &data.top_revenue_source {
        println!("   Top revenue source:    {} ({:.2})", top.name, top.amount);
    }
}

fn print_clients(data: &ClientMetricData) {
    header("CLIENT METRICS", &data.period);
    row("Active clients", &data.total_clients, false);
    row("New clients", &data.new_clients, false);
    row("Repeat clients", &data.repeat_clients, false);
    row("Repeat purchase %", &data.repeat_purchase_rate, true);
    row("Retention %", &data.retention_rate, true);
    row("Avg lifespan (mo)", &data.avg_lifespan, false);
    row("Median lifespan (mo)", &data.median_lifespan, false);
    row("CSAT %", &data.csat, true);
    row("Avg rating", &data.avg_rating, true);
    row("Cancelled orders", &data.cancelled_orders, false);
}

fn print_growth(data: &GrowthMetricData) {
    header("GROWTH", &data.periods.current);
    row("Revenue", &data.revenue, false);
    row("Profit", &data.profit, false);
    row("AOV", &data.aov, false);
    row("Client growth %", &data.client_growth, true);
    println!();

    if data.time_series.is_empty() {
        return;
    }
    println!(
        "   {:<8} {:>12} {:>9} {:>12} {:>6} {:>9}",
        "Month", "Revenue", "Growth", "Profit", "New", "Growth"
    );
    for point in &data.time_series {
        println!(
            "   {:<8} {:>12.2} {:>9} {:>12.2} {:>6} {:>9}",
            point.month,
            point.revenue,
            format_delta(point.revenue_growth),
            point.profit,
            point.new_clients,
            format_delta(point.client_growth)
        );
        for note in &point.notes {
            println!("            * {} {}", note.date, note.title);
        }
    }
}

fn print_marketing(data: &MarketingMetricData) {
    header("MARKETING", &data.period);
    row("Marketing spend", &data.marketing_expenses, false);
    row("Messages", &data.total_messages, false);
    row("Cost per lead", &data.cpl, false);
    row("ROMI %", &data.romi, false);
}

fn print_orders(data: &OrderCountAnalytics) {
    header("ORDER COUNTS", &data.periods.current);
    row("Completed orders", &data.total_orders, false);
    row("From new buyers", &data.from_new_buyers, false);
    row("From repeat buyers", &data.from_repeat_buyers, false);
}

fn print_gig(data: &GigAnalyticsData) {
    header(&format!("GIG: {}", data.gig_name), &data.period);
    row("Impressions", &data.totals.impressions, false);
    row("Clicks", &data.totals.clicks, false);
    row("Orders", &data.totals.orders, false);
    row("Revenue", &data.totals.revenue, false);
    row("CTR %", &data.totals.ctr, true);
    row("Conversion %", &data.totals.conversion_rate, true);
}

fn print_source(data: &SourceAnalyticsData) {
    header(&format!("SOURCE: {}", data.source_name), &data.period);
    println!("   Gigs: {}", data.gig_count);
    row("Messages", &data.totals.messages, false);
    row("Orders", &data.totals.orders, false);
    row("Revenue", &data.totals.revenue, false);
    row("Conversion %", &data.totals.conversion_rate, true);
}

fn print_timeline(data: &BusinessTimeline) {
    header(&format!("TIMELINE ({})", data.granularity), &data.period);
    println!(
        "   {:<12} {:>12} {:>7} {:>12} {:>12} {:>5}",
        "Bucket", "Revenue", "Orders", "Expenses", "Profit", "New"
    );
    for bucket in &data.buckets {
        println!(
            "   {:<12} {:>12.2} {:>7} {:>12.2} {:>12.2} {:>5}",
            bucket.key,
            bucket.totals.revenue,
            bucket.totals.completed_orders,
            bucket.totals.expenses,
            bucket.totals.profit,
            bucket.totals.new_clients
        );
        for note in &bucket.notes {
            println!("                * {} {}", note.date, note.title);
        }
    }
}

fn print_competitors(data: &CompetitorBenchmark) {
    header("COMPETITOR BENCHMARK", &data.period);
    if data.months.is_empty() {
        println!("  No months in range.");
        return;
    }
    for month in &data.months {
        println!(
            "   {}  own {:>5}  share {:>6.1}%",
            month.month, month.own_orders, month.market_share
        );
        for competitor in &month.competitors {
            println!("            {:<20} {:>5}", competitor.name, competitor.orders);
        }
    }
}
