//! Public pool handle

use std::fmt;
use std::ptr::NonNull;
use std::sync::Arc;

use super::{PoolId, PoolRegistry, PoolState, PoolStats};
use crate::error::{MemoryError, MemoryResult};

/// Handle to a pool in a [`PoolRegistry`]
///
/// Cloning is cheap and every clone names the same pool. Handles do not keep
/// the pool alive: once any clone (or an ancestor) frees it, every operation
/// on every clone fails with [`MemoryError::PoolFreed`](crate::MemoryError::PoolFreed).
///
/// Blocks returned by [`allocate`](Self::allocate) are raw memory owned by the
/// pool. Dereferencing them directly is `unsafe` and only valid until the block
/// is freed, resized or its pool released; [`with_bytes`](Self::with_bytes)
/// and [`with_bytes_mut`](Self::with_bytes_mut) give checked access instead.
#[derive(Clone)]
pub struct Pool {
    registry: Arc<PoolRegistry>,
    id: PoolId,
}

impl Pool {
    pub(crate) fn from_parts(registry: Arc<PoolRegistry>, id: PoolId) -> Self {
        Self { registry, id }
    }

    /// Create a root pool in the process-wide registry
    pub fn create_root() -> MemoryResult<Self> {
        PoolRegistry::global().create_root()
    }

    /// Id of this pool within its registry
    pub fn id(&self) -> PoolId {
        self.id
    }

    /// Registry owning this pool
    pub fn registry(&self) -> &Arc<PoolRegistry> {
        &self.registry
    }

    /// Create a child pool, freed together with this one
    pub fn create_subpool(&self) -> MemoryResult<Self> {
        self.registry.create_child(self.id)
    }

    /// Allocate `len` bytes aligned to [`BLOCK_ALIGN`](super::BLOCK_ALIGN)
    ///
    /// Contents are unspecified; use [`allocate_zeroed`](Self::allocate_zeroed)
    /// when the caller relies on zeros.
    pub fn allocate(&self, len: usize) -> MemoryResult<NonNull<u8>> {
        self.registry.allocate(self.id, len)
    }

    /// Allocate `len` zeroed bytes
    pub fn allocate_zeroed(&self, len: usize) -> MemoryResult<NonNull<u8>> {
        self.registry.allocate(self.id, len)
    }

    /// Resize a block tracked by this pool or any descendant
    ///
    /// `None` allocates a fresh block. The block may move; the old address is
    /// invalid afterwards. Contents past the old length are unspecified.
    pub fn reallocate(&self, addr: Option<NonNull<u8>>, len: usize) -> MemoryResult<NonNull<u8>> {
        self.registry.reallocate(self.id, addr, len)
    }

    /// Deep-copy this pool and its subtree into a new root pool
    pub fn copy(&self) -> MemoryResult<Self> {
        self.registry.copy_tree(self.id)
    }

    /// Release this pool, its descendants and every block they track
    ///
    /// Freeing an already freed pool does nothing.
    pub fn free(&self) {
        self.registry.free(self.id);
    }

    /// Release one block tracked by this pool (descendants are not searched)
    pub fn free_at(&self, addr: NonNull<u8>) -> MemoryResult<()> {
        self.registry.free_at(self.id, addr)
    }

    /// Run `f` over a tracked block's bytes
    ///
    /// The pool is locked for the duration of `f`, so `f` must not call back
    /// into this pool.
    pub fn with_bytes<R>(&self, addr: NonNull<u8>, f: impl FnOnce(&[u8]) -> R) -> MemoryResult<R> {
        self.registry.with_block(self.id, addr, |bytes| f(bytes))
    }

    /// Run `f` over a tracked block's bytes, mutably
    ///
    /// Same locking rules as [`with_bytes`](Self::with_bytes).
    pub fn with_bytes_mut<R>(
        &self,
        addr: NonNull<u8>,
        f: impl FnOnce(&mut [u8]) -> R,
    ) -> MemoryResult<R> {
        self.registry.with_block(self.id, addr, f)
    }

    pub(crate) fn try_with_bytes_mut<R, F>(
        &self,
        addr: NonNull<u8>,
        f: F,
    ) -> Result<R, (MemoryError, F)>
    where
        F: FnOnce(&mut [u8]) -> R,
    {
        self.registry.try_with_block(self.id, addr, f)
    }

    /// Whether the pool still accepts operations
    pub fn is_valid(&self) -> bool {
        self.state() == PoolState::Valid
    }

    /// Current lifecycle state
    pub fn state(&self) -> PoolState {
        self.registry.state(self.id)
    }

    /// Parent pool; `None` for root pools and freed pools
    pub fn parent(&self) -> Option<Self> {
        self.registry
            .parent(self.id)
            .ok()
            .flatten()
            .map(|id| Self::from_parts(Arc::clone(&self.registry), id))
    }

    /// Direct children, in creation order
    pub fn children(&self) -> Vec<Self> {
        self.registry
            .children(self.id)
            .unwrap_or_default()
            .into_iter()
            .map(|id| Self::from_parts(Arc::clone(&self.registry), id))
            .collect()
    }

    /// Live blocks as `(address, length)`, in tracking order
    pub fn allocations(&self) -> Vec<(NonNull<u8>, usize)> {
        self.registry.allocations(self.id).unwrap_or_default()
    }

    /// Statistics for this pool alone
    pub fn stats(&self) -> MemoryResult<PoolStats> {
        self.registry.stats(self.id)
    }

    /// Statistics summed over this pool and its descendants
    pub fn subtree_stats(&self) -> MemoryResult<PoolStats> {
        self.registry.subtree_stats(self.id)
    }
}

impl PartialEq for Pool {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.registry, &other.registry) && self.id == other.id
    }
}

impl Eq for Pool {}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}
