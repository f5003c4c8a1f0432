//! Logger initialization using tracing.

use anyhow::Result;
use std::io;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::domain::models::LoggingConfig;

/// Holds the non-blocking writer guard so file output keeps flushing
/// for the process lifetime.
pub struct LoggerHandle {
    _guard: Option<WorkerGuard>,
}

/// Initialize the global subscriber from the logging configuration.
///
/// Stdout output honors the configured format; file output (when
/// `log_dir` is set) is always JSON with daily rotation.
pub fn init(config: &LoggingConfig) -> Result<LoggerHandle> {
    let default_level = parse_log_level(&config.level)?;

    let env_filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    let guard = if let Some(ref log_dir) = config.log_dir {
        let file_appender = rolling::daily(log_dir, "appraise.log");
        let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

        let file_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_writer(non_blocking_file)
            .with_ansi(false)
            .with_target(true)
            .with_filter(EnvFilter::builder()
                .with_default_directive(default_level.into())
                .from_env_lossy());

        let stdout_layer = stdout_layer(config)?.with_filter(env_filter);

        tracing_subscriber::registry()
            .with(file_layer)
            .with(stdout_layer)
            .init();

        Some(guard)
    } else {
        let stdout_layer = stdout_layer(config)?.with_filter(env_filter);
        tracing_subscriber::registry().with(stdout_layer).init();
        None
    };

    Ok(LoggerHandle { _guard: guard })
}

fn stdout_layer<S>(config: &LoggingConfig) -> Result<Box<dyn Layer<S> + Send + Sync>>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    let layer = match config.format.as_str() {
        "json" => tracing_subscriber::fmt::layer()
            .json()
            .with_writer(io::stdout)
            .with_target(true)
            .with_span_events(FmtSpan::CLOSE)
            .boxed(),
        _ => tracing_subscriber::fmt::layer()
            .pretty()
            .with_writer(io::stdout)
            .with_target(true)
            .boxed(),
    };
    Ok(layer)
}

fn parse_log_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        other => anyhow::bail!("invalid log level: {other}"),
    }
}
