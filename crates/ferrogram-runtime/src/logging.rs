//! Logging setup.
//!
//! Installs a global `tracing-subscriber` registry from a [`LoggingConfig`].
//! When `RUST_LOG` is set it replaces the configured base level; the
//! per-module `filters` are added on top either way.
//!
//! ```rust,ignore
//! use ferrogram_runtime::config::{LogFormat, SpanEventConfig};
//! use ferrogram_runtime::logging::{self, LoggingBuilder};
//!
//! // From configuration; the runtime does this in `from_config`
//! logging::init_from_config(&config.logging);
//!
//! // Or by hand, before the runtime is created
//! LoggingBuilder::new()
//!     .with_level(tracing::Level::DEBUG)
//!     .directive("ferrogram_transport=trace")
//!     .span_events(SpanEventConfig::LIFECYCLE)
//!     .format(LogFormat::Pretty)
//!     .init();
//! ```

use std::path::{Path, PathBuf};

use tracing::warn;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::{
    LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig, SpanEventConfig,
};

/// Initializes logging from configuration.
///
/// Does nothing if a global subscriber is already installed, so a bot can
/// set up logging itself before building the runtime.
pub fn init_from_config(config: &LoggingConfig) {
    let _ = LoggingBuilder::from_config(config).try_init();
}

impl From<LogRotation> for Rotation {
    fn from(rotation: LogRotation) -> Self {
        match rotation {
            LogRotation::Never => Rotation::NEVER,
            LogRotation::Hourly => Rotation::HOURLY,
            LogRotation::Daily => Rotation::DAILY,
        }
    }
}

fn fmt_span(events: SpanEventConfig) -> FmtSpan {
    [
        (events.new, FmtSpan::NEW),
        (events.enter, FmtSpan::ENTER),
        (events.exit, FmtSpan::EXIT),
        (events.close, FmtSpan::CLOSE),
    ]
    .into_iter()
    .filter(|(enabled, _)| *enabled)
    .fold(FmtSpan::NONE, |acc, (_, span)| acc | span)
}

// =============================================================================
// LoggingBuilder
// =============================================================================

/// Builder for the global tracing subscriber.
#[derive(Debug, Clone, Default)]
pub struct LoggingBuilder {
    config: LoggingConfig,
    directives: Vec<String>,
    hide_target: bool,
}

impl LoggingBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &LoggingConfig) -> Self {
        Self {
            config: config.clone(),
            ..Self::default()
        }
    }

    pub fn with_level(mut self, level: tracing::Level) -> Self {
        self.config.level = [
            LogLevel::Trace,
            LogLevel::Debug,
            LogLevel::Info,
            LogLevel::Warn,
        ]
        .into_iter()
        .find(|candidate| candidate.to_tracing_level() == level)
        .unwrap_or(LogLevel::Error);
        self
    }

    /// Adds a raw filter directive such as `ferrogram_core=debug`.
    pub fn directive(mut self, directive: impl Into<String>) -> Self {
        self.directives.push(directive.into());
        self
    }

    pub fn span_events(mut self, events: SpanEventConfig) -> Self {
        self.config.span_events = events;
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.config.format = format;
        self
    }

    pub fn output(mut self, output: LogOutput) -> Self {
        self.config.output = output;
        self
    }

    /// Writes to a rotating file under `path`'s directory.
    pub fn file(mut self, path: impl Into<PathBuf>, rotation: LogRotation) -> Self {
        self.config.output = LogOutput::File;
        self.config.file_path = Some(path.into());
        self.config.rotation = rotation;
        self
    }

    pub fn with_target(mut self, enabled: bool) -> Self {
        self.hide_target = !enabled;
        self
    }

    pub fn with_thread_ids(mut self, enabled: bool) -> Self {
        self.config.thread_ids = enabled;
        self
    }

    /// Includes the source file and line of each event.
    pub fn with_file_location(mut self, enabled: bool) -> Self {
        self.config.file_location = enabled;
        self
    }

    fn filter_directives(&self) -> impl Iterator<Item = String> + '_ {
        self.config
            .filters
            .iter()
            .map(|(module, level)| format!("{module}={level}"))
            .chain(self.directives.iter().cloned())
    }

    fn build_filter(&self) -> EnvFilter {
        let mut filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.config.level.as_str()));

        for directive in self.filter_directives() {
            match directive.parse() {
                Ok(parsed) => filter = filter.add_directive(parsed),
                Err(err) => eprintln!("Ignoring invalid log directive {directive:?}: {err}"),
            }
        }
        filter
    }

    /// Opens the rolling log file. `None` when the path has no file name or
    /// the directory cannot be created.
    fn file_appender(&self, path: &Path) -> Option<RollingFileAppender> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let prefix = path.file_name()?.to_string_lossy().into_owned();

        let mut builder = RollingFileAppender::builder()
            .rotation(self.config.rotation.into())
            .filename_prefix(prefix);
        if self.config.max_files > 0 {
            builder = builder.max_log_files(self.config.max_files);
        }

        builder
            .build(dir)
            .map_err(|err| eprintln!("Cannot open log file {}: {err}", path.display()))
            .ok()
    }

    /// The writer for the configured output, and whether a requested log
    /// file had to be replaced by stdout.
    fn make_writer(&self) -> (BoxMakeWriter, bool) {
        match self.config.output {
            LogOutput::Stdout => (BoxMakeWriter::new(std::io::stdout), false),
            LogOutput::Stderr => (BoxMakeWriter::new(std::io::stderr), false),
            LogOutput::File => {
                let appender = self
                    .config
                    .file_path
                    .as_deref()
                    .and_then(|path| self.file_appender(path));
                match appender {
                    Some(appender) => (BoxMakeWriter::new(appender), false),
                    None => (BoxMakeWriter::new(std::io::stdout), true),
                }
            }
        }
    }

    /// Installs the subscriber, ignoring an already installed one.
    pub fn init(self) {
        let _ = self.try_init();
    }

    /// Installs the subscriber.
    pub fn try_init(self) -> Result<(), TryInitError> {
        let (writer, file_fallback) = self.make_writer();
        let layer = fmt::layer()
            .with_writer(writer)
            .with_span_events(fmt_span(self.config.span_events))
            .with_target(!self.hide_target)
            .with_thread_ids(self.config.thread_ids)
            .with_file(self.config.file_location)
            .with_line_number(self.config.file_location);
        let registry = tracing_subscriber::registry().with(self.build_filter());

        let result = match self.config.format {
            LogFormat::Compact => registry.with(layer.compact()).try_init(),
            LogFormat::Pretty => registry.with(layer.pretty()).try_init(),
            #[cfg(feature = "json-log")]
            LogFormat::Json => registry.with(layer.json()).try_init(),
            _ => registry.with(layer).try_init(),
        };

        if result.is_ok() {
            if file_fallback {
                warn!("No usable log file, logging to stdout");
            }
            if cfg!(not(feature = "json-log")) && self.config.format == LogFormat::Json {
                warn!("JSON log format requires the `json-log` feature, using full format");
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config() {
        let mut config = LoggingConfig {
            level: LogLevel::Debug,
            file_location: true,
            ..Default::default()
        };
        config
            .filters
            .insert("ferrogram_transport".into(), LogLevel::Trace);

        let builder = LoggingBuilder::from_config(&config).directive("hyper=warn");

        assert_eq!(builder.config.level, LogLevel::Debug);
        assert!(builder.config.file_location);
        assert_eq!(
            builder.filter_directives().collect::<Vec<_>>(),
            vec!["ferrogram_transport=trace", "hyper=warn"]
        );
    }

    #[test]
    fn test_with_level() {
        let builder = LoggingBuilder::new().with_level(tracing::Level::WARN);
        assert_eq!(builder.config.level, LogLevel::Warn);
    }

    #[test]
    fn test_span_events() {
        assert_eq!(fmt_span(SpanEventConfig::NONE), FmtSpan::NONE);
        assert_eq!(
            fmt_span(SpanEventConfig::LIFECYCLE),
            FmtSpan::NEW | FmtSpan::CLOSE
        );
        assert_eq!(fmt_span(SpanEventConfig::FULL), FmtSpan::FULL);
    }

    #[test]
    fn test_file_output_without_path_falls_back() {
        let builder = LoggingBuilder::new().output(LogOutput::File);
        let (_, fallback) = builder.make_writer();
        assert!(fallback);
    }
}
