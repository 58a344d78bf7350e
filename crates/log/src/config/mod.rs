//! Logger configuration

mod presets;

/// Output format of the fmt layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    /// Multi-line, human oriented
    Pretty,
    /// Single line per event
    #[default]
    Compact,
    /// Newline-delimited JSON
    Json,
}

impl Format {
    /// Parse a format name, falling back to [`Format::Compact`]
    #[must_use]
    pub fn parse_lossy(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "pretty" => Self::Pretty,
            "json" => Self::Json,
            _ => Self::Compact,
        }
    }
}

/// Where formatted events are written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriterConfig {
    /// Standard error
    #[default]
    Stderr,
    /// Standard output
    Stdout,
    /// libtest-captured output
    Test,
}

/// What each formatted line shows
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct DisplayConfig {
    /// ANSI colors
    pub colors: bool,
    /// Event timestamps
    pub time: bool,
    /// Event target (module path)
    pub target: bool,
    /// Source file and line
    pub source: bool,
    /// Thread names
    pub thread_names: bool,
    /// Emit event fields at the top level of JSON objects
    pub flatten: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            colors: true,
            time: true,
            target: true,
            source: false,
            thread_names: false,
            flatten: false,
        }
    }
}

impl DisplayConfig {
    /// Apply `STRATA_LOG_COLORS`, `STRATA_LOG_TIME`, `STRATA_LOG_SOURCE`
    /// and `STRATA_LOG_THREADS` overrides
    pub(crate) fn parse_env(&mut self) {
        fn flag(name: &str) -> Option<bool> {
            let value = std::env::var(name).ok()?;
            match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Some(true),
                "0" | "false" | "no" | "off" => Some(false),
                _ => None,
            }
        }

        if let Some(v) = flag("STRATA_LOG_COLORS") {
            self.colors = v;
        }
        if let Some(v) = flag("STRATA_LOG_TIME") {
            self.time = v;
        }
        if let Some(v) = flag("STRATA_LOG_SOURCE") {
            self.source = v;
        }
        if let Some(v) = flag("STRATA_LOG_THREADS") {
            self.thread_names = v;
        }
    }
}

/// Logger configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// `EnvFilter` directive string, e.g. `info` or `strata_memory=trace`
    pub level: String,
    /// Output format
    pub format: Format,
    /// Output target
    pub writer: WriterConfig,
    /// Line contents
    pub display: DisplayConfig,
    /// Wrap the filter so it can be swapped at runtime
    pub reloadable: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: Format::default(),
            writer: WriterConfig::default(),
            display: DisplayConfig::default(),
            reloadable: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("pretty", Format::Pretty)]
    #[case("JSON", Format::Json)]
    #[case(" compact ", Format::Compact)]
    #[case("logfmt", Format::Compact)]
    fn test_format_parse_lossy(#[case] input: &str, #[case] expected: Format) {
        assert_eq!(Format::parse_lossy(input), expected);
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.level, "info");
        assert_eq!(config.format, Format::Compact);
        assert_eq!(config.writer, WriterConfig::Stderr);
        assert!(!config.reloadable);
    }
}
