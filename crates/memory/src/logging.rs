//! Log subsystems for the memory crate
//!
//! Each component logs through its own [`Subsystem`], so pool tracing can be
//! turned up without drowning in list events. Thresholds default to `info`
//! and are read once, on first use, from:
//!
//! | Subsystem | Variable |
//! |-----------|----------|
//! | `pool`    | `STRATA_POOL_LOG_LEVEL` |
//! | `list`    | `STRATA_LIST_LOG_LEVEL` |
//! | `cleanup` | `STRATA_CLEANUP_LOG_LEVEL` |
//!
//! Events still pass through the global `tracing` subscriber afterwards.

use strata_log::Subsystem;

use crate::error::{MemoryError, MemoryResult};

/// Pool allocation and tree events
pub static POOL: Subsystem = Subsystem::new("pool", "STRATA_POOL_LOG_LEVEL");

/// List growth, removal and sort events
pub static LIST: Subsystem = Subsystem::new("list", "STRATA_LIST_LOG_LEVEL");

/// Cleanup registry events
pub static CLEANUP: Subsystem = Subsystem::new("cleanup", "STRATA_CLEANUP_LOG_LEVEL");

/// Set the pool subsystem threshold by name
pub fn set_pool_log_level(level: &str) -> MemoryResult<()> {
    set_level(&POOL, level)
}

/// Set the list subsystem threshold by name
pub fn set_list_log_level(level: &str) -> MemoryResult<()> {
    set_level(&LIST, level)
}

/// Set the cleanup subsystem threshold by name
pub fn set_cleanup_log_level(level: &str) -> MemoryResult<()> {
    set_level(&CLEANUP, level)
}

fn set_level(subsystem: &Subsystem, level: &str) -> MemoryResult<()> {
    subsystem
        .set_level_str(level)
        .map_err(|e| MemoryError::invalid_config(subsystem, &e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_unknown_level() {
        let err = set_cleanup_log_level("shouting").unwrap_err();
        assert_eq!(err.code(), "MEM:CONFIG:INVALID");
    }

    #[test]
    fn test_subsystem_names() {
        assert_eq!(POOL.name(), "pool");
        assert_eq!(LIST.env_var(), "STRATA_LIST_LOG_LEVEL");
        assert_eq!(CLEANUP.name(), "cleanup");
    }
}
