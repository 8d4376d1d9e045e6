//! Tracing and logging setup
//!
//! Logs always go to stderr; stdout belongs to the feed the client renders.
//! `RUST_LOG` overrides the preset filter when it is set.

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::Environment;

/// Filter used when nothing more specific is asked for
const DEFAULT_FILTER: &str = "warn,feed_service=info,feed_cache=info,feed_client=info";

/// How log lines are laid out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Single line per event, suited to an interactive terminal
    Compact,
    /// Multi-line, with span context
    Pretty,
    /// One JSON object per line
    Json,
}

/// Tracing configuration options
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// `EnvFilter` directives, e.g. `"warn,feed_service=debug"`
    pub filter: String,
    pub format: LogFormat,
    /// Log span open/close (useful around store calls)
    pub span_events: bool,
    pub file_line: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_FILTER.to_string(),
            format: LogFormat::Compact,
            span_events: false,
            file_line: false,
        }
    }
}

impl TracingConfig {
    /// Debug output from the feed crates, with spans
    #[must_use]
    pub fn development() -> Self {
        Self {
            filter: "info,feed_service=debug,feed_cache=debug,feed_db=debug,feed_client=debug"
                .to_string(),
            format: LogFormat::Pretty,
            span_events: true,
            file_line: true,
        }
    }

    #[must_use]
    pub fn production() -> Self {
        Self {
            filter: "info".to_string(),
            format: LogFormat::Json,
            span_events: false,
            file_line: false,
        }
    }

    /// Preset for the deployment environment
    #[must_use]
    pub fn for_environment(env: Environment) -> Self {
        match env {
            Environment::Development => Self::development(),
            Environment::Staging => Self::default(),
            Environment::Production => Self::production(),
        }
    }

    fn span_events(&self) -> FmtSpan {
        if self.span_events {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.filter))
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    }
}

/// Install the default subscriber
pub fn try_init_tracing() -> Result<(), TracingError> {
    try_init_tracing_with_config(&TracingConfig::default())
}

/// Install a subscriber built from `config`
///
/// Fails instead of panicking when a global subscriber is already set.
pub fn try_init_tracing_with_config(config: &TracingConfig) -> Result<(), TracingError> {
    // One of the three is present
    let compact = (config.format == LogFormat::Compact).then(|| {
        fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_file(config.file_line)
            .with_line_number(config.file_line)
            .with_span_events(config.span_events())
    });
    let pretty = (config.format == LogFormat::Pretty).then(|| {
        fmt::layer()
            .pretty()
            .with_writer(std::io::stderr)
            .with_file(config.file_line)
            .with_line_number(config.file_line)
            .with_span_events(config.span_events())
    });
    let json = (config.format == LogFormat::Json).then(|| {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_span_events(config.span_events())
    });

    tracing_subscriber::registry()
        .with(config.env_filter())
        .with(compact)
        .with(pretty)
        .with(json)
        .try_init()
        .map_err(|_| TracingError::AlreadyInitialized)
}

#[derive(Debug, thiserror::Error)]
pub enum TracingError {
    #[error("Tracing subscriber already initialized")]
    AlreadyInitialized,
}
