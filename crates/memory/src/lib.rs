//! # strata-memory
//!
//! Hierarchical memory pools with pool-backed dynamic lists.
//!
//! - [`pool`]: pools track raw blocks and own child pools; freeing a pool
//!   releases its whole subtree in one call
//! - [`list`]: growable arrays of plain-old-data entries living in a private
//!   subpool, with FIFO/stack modes and stable sorting by a numeric key
//! - [`sort`]: the byte-level key extraction and merge sort lists use
//! - [`cleanup`]: a LIFO registry of shutdown actions, optionally run on SIGINT
//!
//! ## Quick Start
//!
//! ```rust
//! use strata_memory::prelude::*;
//!
//! let registry = PoolRegistry::new();
//! let root = registry.create_root()?;
//!
//! let list = List::<i32>::new(&root)?;
//! for i in 0..10 {
//!     list.new_entry(|e| *e = i)?;
//! }
//! list.remove_index(9)?;
//! assert_eq!(list.len(), 9);
//!
//! // Freeing the root releases the list's storage too.
//! root.free();
//! assert!(!list.is_valid());
//! # Ok::<(), MemoryError>(())
//! ```
//!
//! ## Logging
//!
//! Events go through `tracing` via `strata-log`, tagged with a per-component
//! subsystem whose threshold is set from the environment (see [`logging`]).
//!
//! ## Architecture
//!
//! - Errors are a single [`MemoryError`] enum with stable codes
//! - Pools are generation-checked slots in a [`PoolRegistry`] arena
//! - Each pool and each list has its own lock; no global lock on the hot path

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(rust_2018_idioms)]
// Pool blocks are raw allocations; access is funneled through checked accessors.
#![allow(unsafe_code)]

pub mod cleanup;
pub mod error;
pub mod list;
pub mod logging;
pub mod pool;
pub mod sort;

pub use crate::error::{MemoryError, MemoryResult};
pub use crate::list::List;
pub use crate::pool::{Pool, PoolRegistry};

pub mod prelude {
    //! Convenient re-exports of commonly used types.

    pub use crate::cleanup::CleanupRegistry;
    pub use crate::error::{MemoryError, MemoryResult};
    pub use crate::list::{List, ListConfig, ListGuard, ListKind};
    pub use crate::pool::{Pool, PoolId, PoolRegistry, PoolState};
    pub use crate::sort::{SortField, SortKind, SortSpec};
}
