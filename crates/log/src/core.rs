//! Error type shared by the logging crate

use thiserror::Error;

/// Logging setup errors
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LogError {
    /// A filter directive string could not be parsed
    #[error("invalid log filter: {0}")]
    Filter(String),

    /// A verbosity level string was not recognised
    #[error("invalid log level '{0}' (expected trace, debug, info, warn, error or off)")]
    Level(String),

    /// Configuration could not be applied
    #[error("log configuration error: {0}")]
    Config(String),

    /// A global subscriber was already installed
    #[error("failed to install subscriber: {0}")]
    Init(String),
}

/// Result alias for logging setup
pub type LogResult<T> = Result<T, LogError>;
