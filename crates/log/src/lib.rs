//! # strata-log
//!
//! Logging for the strata crates, built on `tracing`.
//!
//! ## Features
//!
//! - **Presets**: [`Config::from_env`], [`Config::development`],
//!   [`Config::production`] and [`Config::test`]
//! - **Formats**: pretty, compact and JSON output
//! - **Reloadable filters**: swap the `EnvFilter` at runtime
//! - **Subsystems**: named log sources with their own verbosity threshold,
//!   each read once from an environment variable
//!
//! ## Quick start
//!
//! ```no_run
//! use strata_log::{Config, LoggerBuilder, info};
//!
//! let _guard = LoggerBuilder::from_config(Config::from_env()).build()?;
//! info!("ready");
//! # Ok::<(), strata_log::LogError>(())
//! ```
//!
//! Subsystem-gated events carry a `subsystem` field:
//!
//! ```
//! use strata_log::{Subsystem, sub_debug};
//!
//! static POOL: Subsystem = Subsystem::new("pool", "MYAPP_POOL_LOG_LEVEL");
//! sub_debug!(POOL, bytes = 64, "data alloc");
//! ```

#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

mod builder;
mod config;
mod core;
mod macros;
mod subsystem;

pub use builder::{LoggerBuilder, LoggerGuard, ReloadHandle};
pub use config::{Config, DisplayConfig, Format, WriterConfig};
pub use crate::core::{LogError, LogResult};
pub use subsystem::{Subsystem, parse_level};

pub use tracing::{self, Level, debug, error, info, trace, warn};
pub use tracing::level_filters::LevelFilter;

/// Initialize logging from the environment (`STRATA_LOG`, then `RUST_LOG`)
///
/// # Errors
/// Returns error if the filter is invalid or a subscriber is already installed
pub fn init() -> LogResult<LoggerGuard> {
    LoggerBuilder::from_config(Config::from_env()).build()
}

/// Initialize logging for tests
///
/// Safe to call from every test: a subscriber installed earlier is kept.
pub fn init_test() {
    let _ = LoggerBuilder::from_config(Config::test()).build();
}

/// Prelude for glob imports
pub mod prelude {
    pub use crate::{
        Config, Level, LevelFilter, LogError, LogResult, LoggerBuilder, LoggerGuard, Subsystem,
        debug, error, info, trace, warn,
    };
}
