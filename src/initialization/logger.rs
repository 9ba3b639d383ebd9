//! Logger initialization.
//!
//! Plain output is colored and meant for a terminal; JSON output is one object
//! per line for log shippers.

use std::io::Write;

use crate::config::LogFormat;
use crate::error_handling::InitializationError;
use colored::*;
use log::{LevelFilter, Record};

fn level_emoji(level: log::Level) -> &'static str {
    match level {
        log::Level::Error => "❌",
        log::Level::Warn => "⚠️",
        log::Level::Info => "✔️",
        log::Level::Debug => "🔍",
        log::Level::Trace => "🔬",
    }
}

/// One JSON log line, without the trailing newline.
fn json_line(record: &Record<'_>, timestamp_millis: i64) -> String {
    format!(
        "{{\"ts\":{},\"level\":\"{}\",\"target\":\"{}\",\"msg\":{}}}",
        timestamp_millis,
        record.level(),
        record.target(),
        serde_json::to_string(&record.args().to_string()).unwrap_or_else(|_| "\"\"".into())
    )
}

fn plain_line(record: &Record<'_>) -> String {
    let level = record.level();
    let colored_level = match level {
        log::Level::Error => level.to_string().red(),
        log::Level::Warn => level.to_string().yellow(),
        log::Level::Info => level.to_string().green(),
        log::Level::Debug => level.to_string().blue(),
        log::Level::Trace => level.to_string().purple(),
    };
    format!(
        "{} {} [{}] {}",
        level_emoji(level),
        record.target().cyan(),
        colored_level,
        record.args()
    )
}

/// Initializes the logger with the specified level and format.
///
/// The logger reads `RUST_LOG` first; the provided `level` overrides it for
/// this crate. Browser and broker client crates are held at quieter levels.
///
/// # Arguments
///
/// * `level` - Minimum log level to display (overrides `RUST_LOG` if set)
/// * `format` - Log format (Plain or Json)
///
/// # Errors
///
/// Returns `InitializationError::LoggerError` if a logger is already installed.
///
/// # Examples
///
/// ```bash
/// # Use RUST_LOG for quick debugging (no CLI args needed)
/// RUST_LOG=debug page_trace
///
/// # Override with CLI args (takes precedence)
/// RUST_LOG=debug page_trace --log-level info
///
/// # Per-module filtering via RUST_LOG
/// RUST_LOG=page_trace=debug,lapin=info page_trace
/// ```
pub fn init_logger_with(level: LevelFilter, format: LogFormat) -> Result<(), InitializationError> {
    colored::control::set_override(true);

    let mut builder = env_logger::Builder::from_default_env();

    builder.filter_level(level);
    builder.filter_module("sqlx", LevelFilter::Info);
    builder.filter_module("lapin", LevelFilter::Warn);
    builder.filter_module("amq_protocol", LevelFilter::Warn);
    // The DevTools handler reports every unknown protocol message as an error
    builder.filter_module("chromiumoxide", LevelFilter::Off);
    builder.filter_module("tungstenite", LevelFilter::Warn);
    builder.filter_module("page_trace", level);

    match format {
        LogFormat::Json => {
            builder.format(|buf, record| {
                writeln!(
                    buf,
                    "{}",
                    json_line(record, chrono::Utc::now().timestamp_millis())
                )
            });
        }
        LogFormat::Plain => {
            builder.format(|buf, record| writeln!(buf, "{}", plain_line(record)));
        }
    }

    // try_init so tests and embedding applications can call this more than once
    builder.try_init().map_err(InitializationError::from)?;

    Ok(())
}
