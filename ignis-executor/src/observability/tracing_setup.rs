use super::config::{LogFormat, TracingConfig};
use anyhow::{Context, Result};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

/// Keeps the subscriber installed; hold it for the life of the program.
#[derive(Debug)]
pub struct TracingGuard {
    _private: (),
}

/// Install the global tracing subscriber.
///
/// Fails if the filter directives are invalid or a subscriber is already
/// installed.
///
/// ```ignore
/// let _guard = init_tracing(TracingConfig::from_env())?;
/// ```
pub fn init_tracing(config: TracingConfig) -> Result<TracingGuard> {
    let filter = EnvFilter::try_new(config.log_filter())
        .with_context(|| format!("Invalid log filter '{}'", config.log_filter()))?;

    tracing_subscriber::registry()
        .with(format_layer(&config))
        .with(filter)
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    Ok(TracingGuard { _private: () })
}

fn format_layer(config: &TracingConfig) -> Box<dyn Layer<Registry> + Send + Sync> {
    let layer = fmt::layer()
        .with_file(config.include_location())
        .with_line_number(config.include_location())
        .with_target(config.include_target());

    match config.log_format() {
        // Span closes carry timing for each action in JSON output.
        LogFormat::Json => layer
            .json()
            .with_span_events(FmtSpan::CLOSE)
            .flatten_event(true)
            .boxed(),
        LogFormat::Pretty => layer.pretty().boxed(),
        LogFormat::Compact => layer.compact().boxed(),
    }
}
