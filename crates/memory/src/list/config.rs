//! List configuration

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{MemoryError, MemoryResult};
use crate::logging::LIST;

/// Entries added per growth when no step is configured
pub const DEFAULT_STEP_SIZE: usize = 0x10;

static DEFAULT_STEP: AtomicUsize = AtomicUsize::new(DEFAULT_STEP_SIZE);

/// Current process-wide default growth step
pub fn default_step_size() -> usize {
    DEFAULT_STEP.load(Ordering::Relaxed)
}

/// Change the growth step used by lists created without an explicit step
pub fn set_default_step_size(step: usize) -> MemoryResult<()> {
    if step == 0 {
        return Err(MemoryError::invalid_config(&LIST, "list step size must be non-zero"));
    }
    DEFAULT_STEP.store(step, Ordering::Relaxed);
    Ok(())
}

/// Access discipline of a list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ListKind {
    /// Indexed access only; `push`/`pop` are rejected
    #[default]
    Plain,
    /// `pop` takes the oldest entry
    Fifo,
    /// `pop` takes the newest entry
    Stack,
}

/// List construction options
///
/// ```
/// use strata_memory::list::{ListConfig, ListKind};
///
/// let config = ListConfig::fifo().with_step(64);
/// assert_eq!(config.kind, ListKind::Fifo);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ListConfig {
    pub kind: ListKind,
    /// Growth step in entries; `None` uses [`default_step_size`]
    pub step: Option<usize>,
}

impl ListConfig {
    #[must_use]
    pub const fn new(kind: ListKind) -> Self {
        Self { kind, step: None }
    }

    #[must_use]
    pub const fn fifo() -> Self {
        Self::new(ListKind::Fifo)
    }

    #[must_use]
    pub const fn stack() -> Self {
        Self::new(ListKind::Stack)
    }

    #[must_use]
    pub const fn with_step(mut self, step: usize) -> Self {
        self.step = Some(step);
        self
    }

    pub(crate) fn resolved_step(&self) -> MemoryResult<usize> {
        match self.step {
            Some(0) => Err(MemoryError::invalid_config(&LIST, "list step size must be non-zero")),
            Some(step) => Ok(step),
            None => Ok(default_step_size()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_default_step_rejected() {
        assert!(set_default_step_size(0).is_err());
        assert!(default_step_size() > 0);
    }

    #[test]
    fn test_resolved_step() {
        assert_eq!(ListConfig::stack().with_step(3).resolved_step(), Ok(3));
        assert!(ListConfig::default().with_step(0).resolved_step().is_err());
        assert!(ListConfig::default().resolved_step().unwrap() > 0);
    }
}
