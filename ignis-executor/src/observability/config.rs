//! Logging configuration.

use std::env;
use std::str::FromStr;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per event, for log shippers.
    Json,
    /// Multi-line, human-readable output.
    Pretty,
    /// Single-line output.
    #[default]
    Compact,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            other => Err(format!("unknown log format '{}'", other)),
        }
    }
}

/// Configuration for the tracing subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracingConfig {
    log_format: LogFormat,
    /// `EnvFilter` directives, e.g. `info,ignis_executor=debug`.
    log_filter: String,
    include_location: bool,
    include_target: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::default(),
            log_filter: "info".to_string(),
            include_location: false,
            include_target: true,
        }
    }
}

impl TracingConfig {
    /// Read configuration from the environment.
    ///
    /// - `IGNIS_LOG_FORMAT`: `json`, `pretty` or `compact`. Unset means
    ///   pretty on a terminal and JSON otherwise.
    /// - `IGNIS_LOG_LEVEL`, then `RUST_LOG`: filter directives
    /// - `IGNIS_LOG_LOCATION`: include file and line
    pub fn from_env() -> Self {
        let log_format = match env::var("IGNIS_LOG_FORMAT") {
            Ok(raw) => raw.parse().unwrap_or_else(|e: String| {
                eprintln!("Warning: {}, falling back to compact", e);
                LogFormat::Compact
            }),
            Err(_) if std::io::IsTerminal::is_terminal(&std::io::stdout()) => LogFormat::Pretty,
            Err(_) => LogFormat::Json,
        };

        let log_filter = env::var("IGNIS_LOG_LEVEL")
            .or_else(|_| env::var("RUST_LOG"))
            .unwrap_or_else(|_| "info".to_string());

        Self {
            log_format,
            log_filter,
            include_location: env::var("IGNIS_LOG_LOCATION")
                .map(|s| s == "true" || s == "1")
                .unwrap_or(false),
            include_target: true,
        }
    }

    /// Set the output format.
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.log_format = format;
        self
    }

    /// Set the filter directives.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }

    /// Include source file and line in each event.
    pub fn with_location(mut self, include: bool) -> Self {
        self.include_location = include;
        self
    }

    /// Include the event target (module path).
    pub fn with_target(mut self, include: bool) -> Self {
        self.include_target = include;
        self
    }

    /// The output format.
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// The filter directives.
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Whether events carry file and line.
    pub fn include_location(&self) -> bool {
        self.include_location
    }

    /// Whether events carry their target.
    pub fn include_target(&self) -> bool {
        self.include_target
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_format_parses_case_insensitively() {
        assert_eq!("JSON".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert_eq!(" pretty ".parse::<LogFormat>(), Ok(LogFormat::Pretty));
        assert_eq!("compact".parse::<LogFormat>(), Ok(LogFormat::Compact));
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn builder_overrides_defaults() {
        let config = TracingConfig::default()
            .with_format(LogFormat::Json)
            .with_filter("debug,ignis_core=trace")
            .with_location(true)
            .with_target(false);

        assert_eq!(config.log_format(), LogFormat::Json);
        assert_eq!(config.log_filter(), "debug,ignis_core=trace");
        assert!(config.include_location());
        assert!(!config.include_target());
    }
}
