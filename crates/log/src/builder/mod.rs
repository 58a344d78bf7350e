//! Logger builder implementation
//!
//! - `reload`: runtime filter reload logic

mod reload;

pub use reload::ReloadHandle;

use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::{self, TestWriter, writer::BoxMakeWriter},
    layer::{Layered, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{Config, Format, WriterConfig};
use crate::core::{LogError, LogResult};

/// Subscriber the fmt layer sits on top of
type FilteredRegistry = Layered<Box<dyn Layer<Registry> + Send + Sync + 'static>, Registry>;

/// Logger builder
#[derive(Debug)]
pub struct LoggerBuilder {
    config: Config,
}

/// Guard returned by [`LoggerBuilder::build`]
///
/// Holds the reload handle when the filter was built reloadable.
#[derive(Debug, Default)]
pub struct LoggerGuard {
    reload_handle: Option<ReloadHandle>,
}

impl LoggerBuilder {
    /// Create builder from config
    #[must_use]
    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    /// Build and install the global subscriber
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Filter string cannot be parsed
    /// - A global subscriber is already installed
    pub fn build(self) -> LogResult<LoggerGuard> {
        let filter = EnvFilter::try_new(&self.config.level)
            .map_err(|e| LogError::Filter(format!("{}: {}", &self.config.level, e)))?;

        let (filter_layer, reload_handle) =
            reload::create_filter_layer(filter, &self.config.level, self.config.reloadable);

        let subscriber = Registry::default()
            .with(filter_layer)
            .with(fmt_layer(&self.config));

        subscriber
            .try_init()
            .map_err(|e| LogError::Init(e.to_string()))?;

        tracing::debug!(
            level = %self.config.level,
            format = ?self.config.format,
            "logger initialized"
        );

        Ok(LoggerGuard { reload_handle })
    }
}

impl LoggerGuard {
    /// Handle for swapping the filter at runtime, if the logger is reloadable
    #[must_use]
    pub fn reload_handle(&self) -> Option<&ReloadHandle> {
        self.reload_handle.as_ref()
    }
}

fn make_writer(writer: WriterConfig) -> BoxMakeWriter {
    match writer {
        WriterConfig::Stderr => BoxMakeWriter::new(std::io::stderr),
        WriterConfig::Stdout => BoxMakeWriter::new(std::io::stdout),
        WriterConfig::Test => BoxMakeWriter::new(TestWriter::new),
    }
}

fn fmt_layer(config: &Config) -> Box<dyn Layer<FilteredRegistry> + Send + Sync + 'static> {
    let display = &config.display;
    let layer = fmt::layer()
        .with_writer(make_writer(config.writer))
        .with_ansi(display.colors)
        .with_target(display.target)
        .with_file(display.source)
        .with_line_number(display.source)
        .with_thread_names(display.thread_names);

    match (config.format, display.time) {
        (Format::Pretty, true) => layer.pretty().boxed(),
        (Format::Pretty, false) => layer.pretty().without_time().boxed(),
        (Format::Compact, true) => layer.compact().boxed(),
        (Format::Compact, false) => layer.compact().without_time().boxed(),
        (Format::Json, true) => layer.json().flatten_event(display.flatten).boxed(),
        (Format::Json, false) => layer
            .json()
            .flatten_event(display.flatten)
            .without_time()
            .boxed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_filter_is_rejected() {
        let config = Config {
            level: "strata_memory=verbose".to_string(),
            ..Config::default()
        };
        let err = LoggerBuilder::from_config(config).build().unwrap_err();
        assert!(matches!(err, LogError::Filter(_)));
    }

    #[test]
    fn test_default_guard_has_no_reload_handle() {
        assert!(LoggerGuard::default().reload_handle().is_none());
    }
}
