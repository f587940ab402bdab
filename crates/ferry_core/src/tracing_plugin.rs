//! Tracing and observability plugin.
//!
//! Provides [`TracingPlugin`] which installs the `tracing` subscriber that
//! renders the engine's `debug!`/`info!`/`warn!` events.
//!
//! # Lifecycle
//!
//! - **`build()`** does nothing; settings are fixed when the plugin is added.
//! - **`ready()`** installs the subscriber once every plugin has been built,
//!   so the first logged event sees every registered codec.
//! - **`cleanup()`** logs the shutdown.
//!
//! # Example
//!
//! ```
//! use ferry_convert::EngineBuilder;
//! use ferry_core::{TracingFormat, TracingPlugin};
//! use tracing::Level;
//!
//! let engine = EngineBuilder::new()
//!     .add_plugins(
//!         TracingPlugin::default()
//!             .with_level(Level::DEBUG)
//!             .with_format(TracingFormat::Compact),
//!     )
//!     .build();
//! engine.shutdown();
//! ```

use ferry_convert::{Engine, EngineBuilder, Plugin};
use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

// ─────────────────────────────────────────────────────────────────────────────
// TracingFormat
// ─────────────────────────────────────────────────────────────────────────────

/// Tracing output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TracingFormat {
    /// Human-readable colored output (default).
    #[default]
    Pretty,
    /// Compact single-line output.
    Compact,
    /// JSON structured output for log aggregation.
    Json,
}

// ─────────────────────────────────────────────────────────────────────────────
// TracingConfig
// ─────────────────────────────────────────────────────────────────────────────

/// The settings a [`TracingPlugin`] installs its subscriber with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TracingConfig {
    /// The configured log level.
    pub level: Level,
    /// The configured output format.
    pub format: TracingFormat,
}

// ─────────────────────────────────────────────────────────────────────────────
// TracingPlugin
// ─────────────────────────────────────────────────────────────────────────────

/// Tracing and logging plugin.
///
/// Installs a [`tracing_subscriber`] registry with an [`EnvFilter`] and one
/// formatting layer. Installation uses `try_init`, so a second plugin (or a
/// subscriber the host application installed first) is left in place.
///
/// # Configuration Options
///
/// ```
/// use ferry_core::{TracingFormat, TracingPlugin};
/// use tracing::Level;
///
/// // Interactive use: pretty output with span enter/exit
/// let dev = TracingPlugin::default()
///     .with_level(Level::DEBUG)
///     .with_span_events(true);
///
/// // Batch jobs: JSON lines for log aggregation
/// let batch = TracingPlugin::default()
///     .with_format(TracingFormat::Json)
///     .with_env_filter("ferry_convert=info,ferry_remote=debug");
/// ```
#[derive(Debug, Clone)]
pub struct TracingPlugin {
    /// Maximum log level.
    level: Level,
    /// Output format.
    format: TracingFormat,
    /// Environment filter (e.g., "`ferry_remote=debug`").
    env_filter: Option<String>,
    /// Whether to include span events (enter/exit).
    span_events: bool,
}

impl Default for TracingPlugin {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: TracingFormat::Pretty,
            env_filter: None,
            span_events: false,
        }
    }
}

impl TracingPlugin {
    /// Creates a new `TracingPlugin` with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum log level.
    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Sets the output format.
    #[must_use]
    pub fn with_format(mut self, format: TracingFormat) -> Self {
        self.format = format;
        self
    }

    /// Sets a custom environment filter string.
    ///
    /// Format: `target=level,target=level,...`. An unparsable filter falls
    /// back to the configured level.
    #[must_use]
    pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Enables span enter/exit events in output.
    #[must_use]
    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.span_events = enabled;
        self
    }

    /// Returns the level and format this plugin installs.
    #[must_use]
    pub fn config(&self) -> TracingConfig {
        TracingConfig {
            level: self.level,
            format: self.format,
        }
    }

    fn env_filter(&self) -> EnvFilter {
        match &self.env_filter {
            Some(filter) => {
                EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new(self.level.as_str()))
            }
            None => EnvFilter::new(self.level.as_str()),
        }
    }
}

impl Plugin for TracingPlugin {
    fn build(&self, _builder: &mut EngineBuilder) {}

    fn ready(&self, builder: &mut EngineBuilder) {
        let env_filter = self.env_filter();
        let span_events = if self.span_events {
            FmtSpan::ENTER | FmtSpan::EXIT
        } else {
            FmtSpan::NONE
        };

        // try_init fails when a global subscriber already exists; keep it.
        match self.format {
            TracingFormat::Pretty => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(
                        tracing_subscriber::fmt::layer()
                            .pretty()
                            .with_span_events(span_events),
                    )
                    .try_init()
                    .ok();
            }
            TracingFormat::Compact => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(
                        tracing_subscriber::fmt::layer()
                            .compact()
                            .with_span_events(span_events),
                    )
                    .try_init()
                    .ok();
            }
            TracingFormat::Json => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(
                        tracing_subscriber::fmt::layer()
                            .json()
                            .with_span_events(span_events),
                    )
                    .try_init()
                    .ok();
            }
        }

        tracing::info!(
            level = %self.level,
            format = ?self.format,
            formats = builder.codecs().len(),
            "TracingPlugin initialized"
        );
    }

    fn cleanup(&self, _engine: &Engine) {
        tracing::info!("TracingPlugin shutting down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracing_format_default_is_pretty() {
        assert_eq!(TracingFormat::default(), TracingFormat::Pretty);
    }

    #[test]
    fn tracing_plugin_default_level_is_info() {
        let plugin = TracingPlugin::default();
        assert_eq!(plugin.config().level, Level::INFO);
    }

    #[test]
    fn tracing_plugin_builders() {
        let plugin = TracingPlugin::new()
            .with_level(Level::DEBUG)
            .with_format(TracingFormat::Json)
            .with_env_filter("ferry_remote=debug")
            .with_span_events(true);
        assert_eq!(
            plugin.config(),
            TracingConfig {
                level: Level::DEBUG,
                format: TracingFormat::Json,
            }
        );
        assert_eq!(plugin.env_filter.as_deref(), Some("ferry_remote=debug"));
        assert!(plugin.span_events);
    }

    #[test]
    fn bad_env_filter_falls_back_to_level() {
        let plugin = TracingPlugin::new()
            .with_level(Level::WARN)
            .with_env_filter("ferry=notalevel");
        assert!(EnvFilter::try_new("ferry=notalevel").is_err());
        assert_eq!(
            plugin.env_filter().max_level_hint(),
            Some(tracing_subscriber::filter::LevelFilter::WARN)
        );
    }

    #[test]
    fn installing_twice_is_harmless() {
        for format in [TracingFormat::Compact, TracingFormat::Json] {
            let engine = EngineBuilder::new()
                .add_plugins(TracingPlugin::new().with_format(format))
                .build();
            engine.shutdown();
        }
    }
}
