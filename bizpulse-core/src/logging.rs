//! Logging infrastructure for bizpulse
//!
//! Logs go to `$XDG_STATE_HOME/bizpulse/` (~/.local/state/bizpulse/). The
//! appender rotates daily, so each day's events land in
//! `bizpulse.log.YYYY-MM-DD` (UTC date) and only the newest `max_files`
//! files are kept.

use crate::config::{Config, LoggingConfig};
use crate::error::{Error, Result};
use chrono::{NaiveDate, Utc};
use std::path::{Path, PathBuf};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// File name prefix; rotation appends `.YYYY-MM-DD`.
pub const LOG_FILE_PREFIX: &str = "bizpulse.log";

/// Install the file logger.
///
/// `RUST_LOG` wins over `config.level`. An unparseable configured level is
/// [`Error::Logging`]. Hold the returned guard for the life of the process.
pub fn init(config: &LoggingConfig) -> Result<LoggingGuard> {
    let log_dir = Config::log_dir();
    let filter = level_filter(&config.level)?;
    let appender = rolling_appender(config, &log_dir)?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .try_init()
        .map_err(|e| Error::Logging(e.to_string()))?;

    tracing::info!(
        log_file = %log_file_path().display(),
        level = %config.level,
        max_files = config.max_files,
        "Logging initialized"
    );

    Ok(LoggingGuard { _guard: guard })
}

/// Engine debug output on the test writer; `RUST_LOG` overrides.
pub fn init_test() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("bizpulse_core=debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

fn level_filter(level: &str) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(level)
        .map_err(|e| Error::Logging(format!("invalid log level {level:?}: {e}")))
}

fn rolling_appender(config: &LoggingConfig, dir: &Path) -> Result<RollingFileAppender> {
    std::fs::create_dir_all(dir)?;
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .max_log_files(config.max_files.max(1))
        .build(dir)
        .map_err(|e| Error::Logging(e.to_string()))
}

/// Keeps the background log writer alive; pending lines flush on drop.
pub struct LoggingGuard {
    _guard: tracing_appender::non_blocking::WorkerGuard,
}

/// Name of the file holding the logs written on `date`.
pub fn log_file_name(date: NaiveDate) -> String {
    format!("{}.{}", LOG_FILE_PREFIX, date.format("%Y-%m-%d"))
}

/// The file receiving today's logs.
pub fn log_file_path() -> PathBuf {
    Config::log_dir().join(log_file_name(Utc::now().date_naive()))
}
