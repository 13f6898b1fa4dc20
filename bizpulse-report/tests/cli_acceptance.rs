use bizpulse_core::types::{BusinessNote, Client, Expense, Order, OrderStatus};
use bizpulse_core::Database;
use chrono::NaiveDate;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

struct CliTestEnv {
    _temp_dir: TempDir,
    home: PathBuf,
    xdg_data: PathBuf,
    xdg_config: PathBuf,
    xdg_state: PathBuf,
}

impl CliTestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let base = temp_dir.path().to_path_buf();
        let home = base.join("home");
        let xdg_data = base.join("xdg-data");
        let xdg_config = base.join("xdg-config");
        let xdg_state = base.join("xdg-state");

        fs::create_dir_all(&home).expect("failed to create HOME");
        fs::create_dir_all(&xdg_data).expect("failed to create XDG_DATA_HOME");
        fs::create_dir_all(&xdg_config).expect("failed to create XDG_CONFIG_HOME");
        fs::create_dir_all(&xdg_state).expect("failed to create XDG_STATE_HOME");

        let env = Self {
            _temp_dir: temp_dir,
            home,
            xdg_data,
            xdg_config,
            xdg_state,
        };
        seed_store(&env.db_path());
        env
    }

    fn db_path(&self) -> PathBuf {
        self.xdg_data.join("bizpulse/data.db")
    }
}

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).expect("valid date")
}

fn seed_store(path: &Path) {
    let db = Database::open(path).expect("failed to open db");
    db.migrate().expect("failed to migrate db");

    db.upsert_client(&Client {
        username: "ann".to_string(),
        client_since: d(2024, 1, 2),
        is_vip: true,
        source: "Fiverr".to_string(),
    })
    .expect("failed to seed client");

    for (id, date, amount, status) in [
        ("o1", d(2024, 3, 4), 100.0, OrderStatus::Completed),
        ("o2", d(2024, 3, 5), 200.0, OrderStatus::Completed),
        ("o3", d(2024, 3, 6), 50.0, OrderStatus::Cancelled),
    ] {
        db.insert_order(&Order {
            id: id.to_string(),
            client_username: "ann".to_string(),
            date,
            amount,
            source: "Fiverr".to_string(),
            gig: None,
            status,
            rating: Some(5.0),
            cancellation_reasons: Vec::new(),
        })
        .expect("failed to seed order");
    }

    db.insert_expense(&Expense {
        id: "e1".to_string(),
        date: d(2024, 3, 7),
        amount: 30.0,
        category: "Marketing".to_string(),
        is_recurring: false,
    })
    .expect("failed to seed expense");

    db.insert_note(&BusinessNote {
        date: d(2024, 3, 5),
        title: "Spring promo".to_string(),
        content: "Discount on the starter tier".to_string(),
    })
    .expect("failed to seed note");
}

fn run_report(env: &CliTestEnv, args: &[&str]) -> Output {
    let bin_path = PathBuf::from(assert_cmd::cargo::cargo_bin!("bizpulse-report"));

    Command::new(bin_path)
        .args(args)
        .env("HOME", &env.home)
        .env("XDG_DATA_HOME", &env.xdg_data)
        .env("XDG_CONFIG_HOME", &env.xdg_config)
        .env("XDG_STATE_HOME", &env.xdg_state)
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("failed to execute bizpulse-report: {e}"))
}

fn assert_success(args: &[&str], output: &Output) {
    if output.status.success() {
        return;
    }

    let rendered_args = args
        .iter()
        .map(|arg| OsString::from(arg).to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ");
    panic!(
        "bizpulse-report {rendered_args} failed\nstatus: {}\nstdout:\n{}\nstderr:\n{}",
        output.status,
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}

fn run_json(env: &CliTestEnv, args: &[&str]) -> serde_json::Value {
    let output = run_report(env, args);
    assert_success(args, &output);
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

#[test]
fn financial_json_reports_completed_revenue() {
    let env = CliTestEnv::new();

    let json = run_json(
        &env,
        &["financial", "--from", "2024-03-01", "--to", "2024-03-31", "--json"],
    );

    assert_eq!(json["totalRevenue"]["value"], 100.0 + 200.0);
    assert_eq!(json["totalExpenses"]["value"], 30.0);
    assert_eq!(json["netProfit"]["value"], 270.0);
    assert_eq!(json["totalRevenue"]["previousPeriodChange"], 0.0);
    assert_eq!(json["periods"]["previous"]["to"], "2024-02-29");
    assert_eq!(json["topSpendingCategory"]["name"], "Marketing");
}

#[test]
fn financial_terminal_summary_lists_metrics() {
    let env = CliTestEnv::new();
    let args = ["financial", "--from", "2024-03-01", "--to", "2024-03-31"];

    let output = run_report(&env, &args);
    assert_success(&args, &output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("FINANCIAL METRICS"), "got:\n{stdout}");
    assert!(stdout.contains("Net profit"));
    assert!(stdout.contains("Top revenue source:    Fiverr"));
}

#[test]
fn clients_json_uses_camel_case_fields() {
    let env = CliTestEnv::new();

    let json = run_json(
        &env,
        &["clients", "--from", "2024-03-01", "--to", "2024-03-31", "--json"],
    );

    assert_eq!(json["totalClients"]["value"], 1.0);
    assert_eq!(json["repeatClients"]["value"], 1.0);
    assert_eq!(json["csat"]["value"], 100.0);
    assert_eq!(json["cancelledOrders"]["value"], 1.0);
    assert!(json["csat"].get("previousPeriodChange").is_none());
}

#[test]
fn timeline_weekly_buckets_carry_notes() {
    let env = CliTestEnv::new();

    let json = run_json(
        &env,
        &[
            "timeline",
            "--from",
            "2024-03-04",
            "--to",
            "2024-03-10",
            "--granularity",
            "weekly",
            "--json",
        ],
    );

    let buckets = json["buckets"].as_array().expect("buckets array");
    assert_eq!(buckets.len(), 1);
    assert_eq!(buckets[0]["totals"]["revenue"], 300.0);
    assert_eq!(buckets[0]["notes"][0]["title"], "Spring promo");
}

#[test]
fn marketing_requires_a_source() {
    let env = CliTestEnv::new();

    let output = run_report(&env, &["marketing", "--from", "2024-03-01", "--to", "2024-03-31"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("income source"), "got:\n{stderr}");

    let json = run_json(
        &env,
        &[
            "marketing", "--from", "2024-03-01", "--to", "2024-03-31", "--source", "Fiverr",
            "--json",
        ],
    );
    assert_eq!(json["romi"]["value"], 900.0);
}

#[test]
fn inverted_range_and_unknown_gig_fail() {
    let env = CliTestEnv::new();

    let output = run_report(&env, &["growth", "--from", "2024-03-31", "--to", "2024-03-01"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid date range"), "got:\n{stderr}");

    let output = run_report(&env, &["gig", "nope", "--from", "2024-03-01", "--to", "2024-03-31"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("gig not found: nope"), "got:\n{stderr}");
}

#[test]
fn database_flag_overrides_default_location() {
    let env = CliTestEnv::new();
    let other = env.xdg_data.join("other.db");
    let other_arg = other.to_string_lossy().into_owned();

    let json = run_json(
        &env,
        &[
            "financial", "--from", "2024-03-01", "--to", "2024-03-31", "--db", &other_arg, "--json",
        ],
    );
    assert_eq!(json["totalRevenue"]["value"], 0.0);
    assert!(other.exists());
}
