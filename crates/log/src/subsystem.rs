//! Per-subsystem verbosity
//!
//! A [`Subsystem`] is a named log source with its own threshold, checked
//! before an event ever reaches the global subscriber. The threshold is read
//! once from an environment variable on first use and can be overridden at
//! runtime with [`Subsystem::set_level`].
//!
//! ```
//! use strata_log::{Level, LevelFilter, Subsystem};
//!
//! static NET: Subsystem = Subsystem::new("net", "MYAPP_NET_LOG_LEVEL");
//!
//! NET.set_level(LevelFilter::WARN);
//! assert!(NET.enabled(Level::ERROR));
//! assert!(!NET.enabled(Level::DEBUG));
//! ```

use std::sync::Once;
use std::sync::atomic::{AtomicU8, Ordering};

use tracing::Level;
use tracing::level_filters::LevelFilter;

use crate::core::{LogError, LogResult};

const OFF: u8 = 0;
const ERROR: u8 = 1;
const WARN: u8 = 2;
const INFO: u8 = 3;
const DEBUG: u8 = 4;
const TRACE: u8 = 5;

/// Named log source with its own verbosity threshold
#[derive(Debug)]
pub struct Subsystem {
    name: &'static str,
    env_var: &'static str,
    threshold: AtomicU8,
    env_read: Once,
}

impl Subsystem {
    /// Declare a subsystem. Defaults to `info` until the environment says otherwise.
    #[must_use]
    pub const fn new(name: &'static str, env_var: &'static str) -> Self {
        Self {
            name,
            env_var,
            threshold: AtomicU8::new(INFO),
            env_read: Once::new(),
        }
    }

    /// Subsystem name, attached to every event as the `subsystem` field
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Environment variable consulted on first use
    #[must_use]
    pub const fn env_var(&self) -> &'static str {
        self.env_var
    }

    /// Current threshold
    pub fn level(&self) -> LevelFilter {
        self.read_env_once();
        decode(self.threshold.load(Ordering::Relaxed))
    }

    /// Override the threshold. Later environment reads are skipped.
    pub fn set_level(&self, level: LevelFilter) {
        self.env_read.call_once(|| {});
        self.threshold.store(encode(level), Ordering::Relaxed);
    }

    /// Override the threshold from a level name
    ///
    /// # Errors
    /// Returns [`LogError::Level`] for unknown names; the threshold is unchanged.
    pub fn set_level_str(&self, level: &str) -> LogResult<()> {
        let level = parse_level(level)?;
        self.set_level(level);
        Ok(())
    }

    /// Whether an event at `level` passes this subsystem's threshold
    pub fn enabled(&self, level: Level) -> bool {
        self.read_env_once();
        encode(LevelFilter::from_level(level)) <= self.threshold.load(Ordering::Relaxed)
    }

    fn read_env_once(&self) {
        self.env_read.call_once(|| {
            let Ok(value) = std::env::var(self.env_var) else {
                return;
            };
            match parse_level(&value) {
                Ok(level) => self.threshold.store(encode(level), Ordering::Relaxed),
                Err(_) => tracing::warn!(
                    subsystem = self.name,
                    variable = self.env_var,
                    value = %value,
                    "ignoring unrecognised log level"
                ),
            }
        });
    }
}

/// Parse a level name, case-insensitively
///
/// Accepts `trace`, `debug`, `info`, `warn`, `warning`, `error` and `off`.
///
/// # Errors
/// Returns [`LogError::Level`] for anything else.
pub fn parse_level(name: &str) -> LogResult<LevelFilter> {
    match name.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok(LevelFilter::TRACE),
        "debug" => Ok(LevelFilter::DEBUG),
        "info" => Ok(LevelFilter::INFO),
        "warn" | "warning" => Ok(LevelFilter::WARN),
        "error" => Ok(LevelFilter::ERROR),
        "off" | "none" => Ok(LevelFilter::OFF),
        _ => Err(LogError::Level(name.to_string())),
    }
}

fn encode(level: LevelFilter) -> u8 {
    match level.into_level() {
        None => OFF,
        Some(Level::ERROR) => ERROR,
        Some(Level::WARN) => WARN,
        Some(Level::INFO) => INFO,
        Some(Level::DEBUG) => DEBUG,
        Some(_) => TRACE,
    }
}

fn decode(raw: u8) -> LevelFilter {
    match raw {
        OFF => LevelFilter::OFF,
        ERROR => LevelFilter::ERROR,
        WARN => LevelFilter::WARN,
        INFO => LevelFilter::INFO,
        DEBUG => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}
