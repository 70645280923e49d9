//! Logging Infrastructure
//!
//! Console logging with an `EnvFilter` (`RUST_LOG` wins over the configured
//! level), optional JSON output, and optional daily rotating files:
//! `<log_dir>/display.YYYY-MM-DD.log`, kept for [`RETENTION_DAYS`] days.

use chrono::{Local, NaiveDate};
use std::fs;
use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

const FILE_PREFIX: &str = "display";
const FILE_SUFFIX: &str = "log";

/// Days of rotated log files to keep
pub const RETENTION_DAYS: i64 = 14;

/// Initialize the logging system
///
/// # Arguments
/// * `level` - Log level (e.g., "info", "debug"), overridden by `RUST_LOG`
/// * `json_format` - JSON lines instead of human-readable output
/// * `log_dir` - Optional directory for daily rotating log files
pub fn init_logger(level: &str, json_format: bool, log_dir: Option<&str>) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let console_layer = if json_format {
        fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(true)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed()
    };

    let file_layer = match log_dir {
        Some(dir) => {
            let log_dir = Path::new(dir);
            fs::create_dir_all(log_dir)?;

            let removed = cleanup_old_logs(log_dir, RETENTION_DAYS)?;

            let appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix(FILE_PREFIX)
                .filename_suffix(FILE_SUFFIX)
                .build(log_dir)?;

            let layer = fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .with_writer(std::sync::Mutex::new(appender));
            let layer = if json_format {
                layer.json().boxed()
            } else {
                layer.boxed()
            };
            Some((layer, removed))
        }
        None => None,
    };

    let (file_layer, removed) = match file_layer {
        Some((layer, removed)) => (Some(layer), removed),
        None => (None, 0),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    if removed > 0 {
        tracing::info!(removed, "Deleted old log files");
    }
    Ok(())
}

/// Delete rotated log files older than `days`. Returns how many were removed.
pub fn cleanup_old_logs(log_dir: &Path, days: i64) -> anyhow::Result<usize> {
    let cutoff = Local::now().date_naive() - chrono::Duration::days(days);
    let mut removed = 0;

    for entry in fs::read_dir(log_dir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if let Some(date) = log_file_date(name)
            && date < cutoff
        {
            fs::remove_file(&path)?;
            removed += 1;
        }
    }

    Ok(removed)
}

/// `display.2024-05-01.log` → 2024-05-01
fn log_file_date(name: &str) -> Option<NaiveDate> {
    let date = name
        .strip_prefix(FILE_PREFIX)?
        .strip_prefix('.')?
        .strip_suffix(FILE_SUFFIX)?
        .strip_suffix('.')?;
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}
