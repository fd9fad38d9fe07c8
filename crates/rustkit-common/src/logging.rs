//! Logging configuration and setup.
//!
//! The sanitizer crates only emit `tracing` events; installing a subscriber
//! is left to the embedding application, which can use [`init_logging`] or
//! [`LogConfig::from_env`] to get the same output the RustKit tools use.

use std::str::FromStr;

use thiserror::Error;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
    EnvFilter,
};

/// Environment variable holding a filter directive (e.g. `rustkit_sanitize=debug`).
pub const LOG_ENV: &str = "RUSTKIT_LOG";

/// Environment variable selecting the output format (`pretty`, `compact`, `json`).
pub const LOG_FORMAT_ENV: &str = "RUSTKIT_LOG_FORMAT";

/// Errors from logging setup.
#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("invalid log filter: {0}")]
    InvalidFilter(#[from] tracing_subscriber::filter::ParseError),

    #[error("unknown log format: {0}")]
    UnknownFormat(String),

    #[error("global subscriber already set: {0}")]
    AlreadyInitialized(#[from] TryInitError),
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format.
    #[default]
    Pretty,
    /// Compact single-line format.
    Compact,
    /// JSON format for structured logging.
    Json,
}

impl FromStr for LogFormat {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(LoggingError::UnknownFormat(other.to_string())),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level.
    pub level: Level,
    /// Output format.
    pub format: LogFormat,
    /// Include source file location.
    pub include_location: bool,
    /// Include span events (enter, exit).
    pub include_span_events: bool,
    /// Custom filter string (e.g., "rustkit_html=trace,rustkit_sanitize=debug").
    pub filter: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Pretty,
            include_location: false,
            include_span_events: false,
            filter: None,
        }
    }
}

impl LogConfig {
    /// Create a debug configuration.
    pub fn debug() -> Self {
        Self {
            level: Level::DEBUG,
            include_location: true,
            include_span_events: true,
            ..Default::default()
        }
    }

    /// Create a trace configuration. Tree construction is very chatty at this level.
    pub fn trace() -> Self {
        Self {
            level: Level::TRACE,
            include_location: true,
            include_span_events: true,
            ..Default::default()
        }
    }

    /// Create a production configuration.
    pub fn production() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Json,
            ..Default::default()
        }
    }

    /// Read `RUSTKIT_LOG` and `RUSTKIT_LOG_FORMAT`, falling back to defaults.
    pub fn from_env() -> Result<Self, LoggingError> {
        let mut config = Self::default();
        if let Ok(filter) = std::env::var(LOG_ENV) {
            if !filter.trim().is_empty() {
                config.filter = Some(filter);
            }
        }
        if let Ok(format) = std::env::var(LOG_FORMAT_ENV) {
            config.format = format.parse()?;
        }
        Ok(config)
    }

    /// Set a custom filter.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Set the output format.
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    fn env_filter(&self) -> Result<EnvFilter, LoggingError> {
        match self.filter {
            Some(ref custom_filter) => Ok(EnvFilter::try_new(custom_filter)?),
            None => Ok(EnvFilter::new(self.level.to_string())),
        }
    }
}

/// Initialize logging with the given configuration.
pub fn try_init_logging(config: LogConfig) -> Result<(), LoggingError> {
    let filter = config.env_filter()?;

    // Span events
    let span_events = if config.include_span_events {
        FmtSpan::ENTER | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    match config.format {
        LogFormat::Pretty => {
            let fmt_layer = fmt::layer()
                .with_target(true)
                .with_file(config.include_location)
                .with_line_number(config.include_location)
                .with_span_events(span_events);

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()?;
        }
        LogFormat::Compact => {
            let fmt_layer = fmt::layer()
                .compact()
                .with_target(true)
                .with_span_events(span_events);

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()?;
        }
        LogFormat::Json => {
            let fmt_layer = fmt::layer().json().with_span_events(span_events);

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()?;
        }
    }

    Ok(())
}

/// Initialize logging, reporting setup problems on stderr instead of failing.
pub fn init_logging(config: LogConfig) {
    if let Err(err) = try_init_logging(config) {
        eprintln!("rustkit: logging not initialized: {}", err);
    }
}

/// Route events to the test harness's captured output. Safe to call from
/// every test; only the first call installs anything.
pub fn init_test_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
