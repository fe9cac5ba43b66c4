//! Logging setup: rolling file via `tracing-appender`, optional JSON
//! output for log shippers, plus a colored stdout layer in text mode.
//! The returned guard must be held for the process lifetime or buffered
//! lines are lost on exit.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::AppConfig;

fn file_appender(config: &AppConfig) -> RollingFileAppender {
    use tracing_appender::rolling;
    match config.rotation.as_str() {
        "hourly" => rolling::hourly(&config.log_dir, &config.log_file),
        "daily" => rolling::daily(&config.log_dir, &config.log_file),
        other => {
            if other != "never" {
                eprintln!("Unknown log rotation '{}', not rotating", other);
            }
            rolling::never(&config.log_dir, &config.log_file)
        }
    }
}

pub fn init_logging(config: &AppConfig) -> WorkerGuard {
    let (writer, guard) = tracing_appender::non_blocking(file_appender(config));

    // RUST_LOG wins over the config when present
    let default_filter = if config.enable_tracing {
        config.log_level.clone()
    } else {
        format!("{},remitflow=off", config.log_level)
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let registry = tracing_subscriber::registry().with(filter);

    if config.use_json {
        // JSON to file only; targets kept for structured queries
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(writer)
                    .with_ansi(false),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(writer)
                    .with_ansi(false),
            )
            .with(fmt::layer().with_target(false).with_ansi(true))
            .init();
    }

    guard
}
