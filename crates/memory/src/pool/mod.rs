//! Hierarchical memory pools
//!
//! A pool tracks the raw blocks allocated through it and owns a set of child
//! pools. Freeing a pool releases its whole subtree: every node is marked
//! [`PoolState::Freed`] first, then blocks are released children-first.
//!
//! Pools live in a [`PoolRegistry`]. Each registry lazily creates a hidden
//! master pool; every pool created with [`PoolRegistry::create_root`] hangs
//! off it, so [`PoolRegistry::cleanup_all`] reclaims everything at once.
//!
//! The free functions [`create_root`] and [`cleanup_all`] work on the
//! process-wide registry. A root created in a separate registry is
//! unmanaged: global cleanup never reaches it, so it lives until it is freed
//! explicitly or its own registry is cleaned up.
//!
//! ```
//! use strata_memory::pool::{self, PoolRegistry};
//!
//! let managed = pool::create_root()?;
//! let unmanaged = PoolRegistry::new().create_root()?;
//!
//! pool::cleanup_all();
//! assert!(!managed.is_valid());
//! assert!(unmanaged.is_valid());
//!
//! unmanaged.free();
//! # Ok::<(), strata_memory::MemoryError>(())
//! ```
//!
//! Typical use of a single tree:
//!
//! ```
//! use strata_memory::pool::PoolRegistry;
//!
//! let registry = PoolRegistry::new();
//! let root = registry.create_root()?;
//! let scratch = root.create_subpool()?;
//!
//! let block = scratch.allocate_zeroed(64)?;
//! scratch.with_bytes_mut(block, |bytes| bytes[0] = 7)?;
//!
//! root.free();
//! assert!(!scratch.is_valid());
//! # Ok::<(), strata_memory::MemoryError>(())
//! ```

mod handle;
mod node;
mod registry;
mod stats;

use std::fmt;

pub use handle::Pool;
pub use node::BLOCK_ALIGN;
pub use registry::{DEFAULT_TRACKING_INCREMENT, PoolRegistry};
pub use stats::PoolStats;

use crate::error::MemoryResult;

/// Generation-checked pool handle
///
/// Freeing a pool bumps the generation of its slot, so an old id resolves to
/// "freed" instead of naming whatever pool reuses the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoolId {
    index: u32,
    generation: u32,
}

impl PoolId {
    /// Build an id from raw parts
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Slot index in the registry arena
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Slot generation this id was issued for
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

/// Lifecycle state of a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    /// Accepting allocations
    Valid,
    /// Released; every operation fails
    Freed,
}

/// Create a root pool in the process-wide registry
pub fn create_root() -> MemoryResult<Pool> {
    PoolRegistry::global().create_root()
}

/// Free every pool in the process-wide registry
pub fn cleanup_all() {
    PoolRegistry::global().cleanup_all();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_id_display() {
        assert_eq!(PoolId::new(4, 2).to_string(), "#4.2");
    }

    #[test]
    fn test_pool_id_parts() {
        let id = PoolId::new(7, 1);
        assert_eq!(id.index(), 7);
        assert_eq!(id.generation(), 1);
        assert_ne!(id, PoolId::new(7, 2));
    }
}
