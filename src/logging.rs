//! Tracing subscriber setup
//!
//! `RUST_LOG` takes precedence over the configured level. Output goes to
//! stdout, or to a daily rolling file when `logging.directory` is set.

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::LoggingConfig;

/// Install the global subscriber. The returned guard flushes buffered lines
/// on drop and must live as long as the process logs.
pub fn init_tracing(config: &LoggingConfig) -> anyhow::Result<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "assetdesk_server={level},tower_http={level},sqlx=warn",
            level = config.level
        ))
    });

    let (writer, guard) = match &config.directory {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir))?;
            tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, "assetdesk.log"))
        }
        None => tracing_appender::non_blocking(std::io::stdout()),
    };
    let to_file = config.directory.is_some();

    let layer = match config.format.as_str() {
        "json" => fmt::layer()
            .json()
            .with_writer(writer)
            .with_target(true)
            .with_current_span(true)
            .boxed(),
        "pretty" => fmt::layer()
            .with_writer(writer)
            .with_target(true)
            .with_ansi(!to_file)
            .boxed(),
        other => anyhow::bail!("Unknown log format '{}' (expected pretty or json)", other),
    };

    tracing_subscriber::registry()
        .with(layer.with_filter(filter))
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(guard)
}
