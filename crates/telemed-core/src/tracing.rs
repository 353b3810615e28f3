//! Subscriber setup for hosts of the telemed crates.
//!
//! Providers open one span per operation (`get_doctors`, `schedule`, ...)
//! carrying a `provider` field, and emit events inside it. Nothing is
//! printed until the host installs a subscriber, typically with
//! [`init_tracing`]:
//!
//! ```ignore
//! use telemed_core::tracing::{init_tracing, TracingConfig};
//!
//! // JSON lines, one close event per provider call with its timings.
//! init_tracing(TracingConfig::service())?;
//! ```
//!
//! `RUST_LOG` overrides the preset level unless a directive is set with
//! [`TracingConfig::with_directive`].

use thiserror::Error;
use tracing::Level;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    prelude::*,
    util::TryInitError,
};

/// Crates whose targets the default directive enables.
const TELEMED_TARGETS: [&str; 2] = ["telemed_core", "telemed_providers"];

#[derive(Debug, Error)]
pub enum TracingError {
    #[error("invalid tracing directive: {0}")]
    Directive(#[from] tracing_subscriber::filter::ParseError),

    #[error("tracing subscriber already installed: {0}")]
    Init(#[from] TryInitError),
}

/// How log lines are rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// One line per event, no timestamps.
    #[default]
    Compact,
    /// Multi-line, for reading provider payloads by eye.
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Subscriber settings passed to [`init_tracing`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracingConfig {
    pub level: Level,
    pub format: LogFormat,
    /// Emit an event when a provider operation span closes.
    pub span_events: bool,
    /// Include file and line of each event.
    pub location: bool,
    /// Filter directive replacing both `RUST_LOG` and `level`.
    pub directive: Option<String>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Compact,
            span_events: false,
            location: false,
            directive: None,
        }
    }
}

impl TracingConfig {
    /// Long-running scheduling services: JSON with operation timings.
    #[must_use]
    pub fn service() -> Self {
        Self {
            format: LogFormat::Json,
            span_events: true,
            ..Self::default()
        }
    }

    /// Local debugging of provider calls.
    #[must_use]
    pub fn debug() -> Self {
        Self {
            level: Level::DEBUG,
            format: LogFormat::Pretty,
            span_events: true,
            location: true,
            directive: None,
        }
    }

    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn with_directive(mut self, directive: impl Into<String>) -> Self {
        self.directive = Some(directive.into());
        self
    }

    /// `level` applied to every telemed crate and nothing else.
    pub fn default_directive(&self) -> String {
        let level = self.level.to_string().to_lowercase();
        TELEMED_TARGETS
            .iter()
            .map(|target| format!("{target}={level}"))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Builds the filter: explicit directive, else `RUST_LOG`, else the default directive.
    pub fn filter(&self) -> Result<EnvFilter, TracingError> {
        if let Some(directive) = &self.directive {
            return Ok(EnvFilter::try_new(directive)?);
        }
        Ok(EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.default_directive())))
    }

    /// Span lifecycle events to log. Close events carry busy and idle times.
    pub fn fmt_span(&self) -> FmtSpan {
        if self.span_events {
            FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    }
}

/// Installs the global subscriber described by `config`.
///
/// # Errors
///
/// Fails on an invalid directive or when a global subscriber is already set.
pub fn init_tracing(config: TracingConfig) -> Result<(), TracingError> {
    let filter = config.filter()?;
    let base = fmt::layer()
        .with_file(config.location)
        .with_line_number(config.location)
        .with_span_events(config.fmt_span());

    let layer = match config.format {
        LogFormat::Compact => base.compact().without_time().boxed(),
        LogFormat::Pretty => base.pretty().boxed(),
        LogFormat::Json => base.json().with_current_span(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_preset_reports_operation_spans() {
        let config = TracingConfig::service();
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.level, Level::INFO);
        assert_eq!(config.fmt_span(), FmtSpan::CLOSE);
    }

    #[test]
    fn default_preset_is_quiet_about_spans() {
        let config = TracingConfig::default();
        assert_eq!(config.format, LogFormat::Compact);
        assert_eq!(config.fmt_span(), FmtSpan::NONE);
        assert!(!config.location);
    }

    #[test]
    fn debug_preset() {
        let config = TracingConfig::debug().with_format(LogFormat::Compact);
        assert_eq!(config.level, Level::DEBUG);
        assert_eq!(config.format, LogFormat::Compact);
        assert!(config.location);
    }

    #[test]
    fn default_directive_covers_telemed_crates() {
        let config = TracingConfig::default().with_level(Level::TRACE);
        assert_eq!(
            config.default_directive(),
            "telemed_core=trace,telemed_providers=trace"
        );
        assert!(EnvFilter::try_new(config.default_directive()).is_ok());
    }

    #[test]
    fn explicit_directive_wins() {
        let filter = TracingConfig::default()
            .with_directive("telemed_providers=warn")
            .filter()
            .unwrap();
        assert_eq!(filter.to_string(), "telemed_providers=warn");
    }

    #[test]
    fn invalid_directive_is_an_error() {
        let err = TracingConfig::default()
            .with_directive("telemed_providers=loud")
            .filter()
            .unwrap_err();
        assert!(matches!(err, TracingError::Directive(_)));
    }
}
