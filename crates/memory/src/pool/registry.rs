//! Pool arena and master root
//!
//! # Locking
//!
//! - The slot table is an `RwLock` held only long enough to resolve or
//!   vacate a slot, never while waiting on a node lock.
//! - Node locks nest ancestor before descendant (reallocation search) or
//!   source before copy target. `free` never holds two node locks at once.
//! - The master lock is taken before any node lock.

use std::ptr::NonNull;
use std::sync::{Arc, OnceLock};

use parking_lot::{Mutex, RwLock};
use strata_log::{sub_debug, sub_info, sub_trace};

use super::node::{AllocRecord, PoolNode, alloc_block, dealloc_block, realloc_block};
use super::{Pool, PoolId, PoolState, PoolStats};
use crate::error::{MemoryError, MemoryResult};
use crate::logging::POOL;

/// Records added to a node's tracking table each time it fills up
pub const DEFAULT_TRACKING_INCREMENT: usize = 0x80;

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    node: Option<Arc<PoolNode>>,
}

#[derive(Debug, Default)]
struct Arena {
    slots: Vec<Slot>,
    vacant: Vec<u32>,
}

/// Owner of a pool tree
///
/// Pools are addressed by [`PoolId`] and reached through [`Pool`] handles,
/// which keep the registry alive. Dropping the last handle releases every
/// block still tracked.
#[derive(Debug)]
pub struct PoolRegistry {
    arena: RwLock<Arena>,
    master: Mutex<Option<PoolId>>,
    tracking_increment: usize,
}

impl PoolRegistry {
    /// Create an empty registry
    pub fn new() -> Arc<Self> {
        Self::with_tracking_increment(DEFAULT_TRACKING_INCREMENT)
    }

    /// Create an empty registry whose tracking tables grow by `increment` records
    pub fn with_tracking_increment(increment: usize) -> Arc<Self> {
        Arc::new(Self {
            arena: RwLock::new(Arena::default()),
            master: Mutex::new(None),
            tracking_increment: increment.max(1),
        })
    }

    /// The process-wide registry
    pub fn global() -> &'static Arc<Self> {
        static GLOBAL: OnceLock<Arc<PoolRegistry>> = OnceLock::new();
        GLOBAL.get_or_init(Self::new)
    }

    /// Tracking-table growth step
    pub fn tracking_increment(&self) -> usize {
        self.tracking_increment
    }

    /// Create a pool under the master root, creating the master on first use
    pub fn create_root(self: &Arc<Self>) -> MemoryResult<Pool> {
        let mut master = self.master.lock();
        let master_id = match *master {
            Some(id) => id,
            None => {
                let id = self.insert(None)?;
                sub_debug!(POOL, pool = %id, "master pool initialized");
                *master = Some(id);
                id
            }
        };
        let pool = self.create_child(master_id)?;
        drop(master);

        sub_info!(POOL, pool = %pool.id(), "root pool created");
        Ok(pool)
    }

    /// Free the master root and every pool still attached to it
    ///
    /// A later [`create_root`](Self::create_root) starts a fresh master.
    pub fn cleanup_all(self: &Arc<Self>) {
        let mut master = self.master.lock();
        if let Some(id) = master.take() {
            let released = self.free(id);
            sub_info!(POOL, pool = %id, released, "all pools released");
        }
    }

    /// Number of live pools, the master included
    pub fn live_pools(&self) -> usize {
        self.arena
            .read()
            .slots
            .iter()
            .filter(|slot| slot.node.is_some())
            .count()
    }

    // ------------------------------------------------------------------------
    // Arena
    // ------------------------------------------------------------------------

    fn insert(&self, parent: Option<PoolId>) -> MemoryResult<PoolId> {
        let node = Arc::new(PoolNode::new(parent));
        let mut arena = self.arena.write();
        if let Some(index) = arena.vacant.pop() {
            let slot = &mut arena.slots[index as usize];
            slot.node = Some(node);
            return Ok(PoolId::new(index, slot.generation));
        }
        let index = u32::try_from(arena.slots.len())
            .map_err(|_| MemoryError::size_overflow(&POOL, "pool arena"))?;
        arena.slots.push(Slot {
            generation: 0,
            node: Some(node),
        });
        Ok(PoolId::new(index, 0))
    }

    fn vacate(&self, id: PoolId) {
        let mut arena = self.arena.write();
        let Some(slot) = arena.slots.get_mut(id.index() as usize) else {
            return;
        };
        if slot.generation == id.generation() && slot.node.take().is_some() {
            slot.generation = slot.generation.wrapping_add(1);
            arena.vacant.push(id.index());
        }
    }

    pub(crate) fn resolve(&self, id: PoolId) -> MemoryResult<Arc<PoolNode>> {
        let arena = self.arena.read();
        let Some(slot) = arena.slots.get(id.index() as usize) else {
            return Err(MemoryError::invalid_handle(id, "slot was never issued"));
        };
        if id.generation() > slot.generation {
            return Err(MemoryError::invalid_handle(id, "generation was never issued"));
        }
        match &slot.node {
            Some(node) if slot.generation == id.generation() && !node.is_freed() => {
                Ok(Arc::clone(node))
            }
            _ => Err(MemoryError::pool_freed(id)),
        }
    }

    fn master_id(&self) -> Option<PoolId> {
        *self.master.lock()
    }

    // ------------------------------------------------------------------------
    // Tree
    // ------------------------------------------------------------------------

    pub(crate) fn create_child(self: &Arc<Self>, parent: PoolId) -> MemoryResult<Pool> {
        let parent_node = self.resolve(parent)?;
        let id = self.insert(Some(parent))?;
        {
            let mut inner = parent_node.inner.lock();
            if parent_node.is_freed() {
                drop(inner);
                self.vacate(id);
                return Err(MemoryError::pool_freed(parent));
            }
            inner.children.push(id);
        }
        sub_debug!(POOL, pool = %id, parent = %parent, "subpool created");
        Ok(Pool::from_parts(Arc::clone(self), id))
    }

    /// Unlink and release `id` with its whole subtree. Returns the number of
    /// pools released; zero if `id` was already freed.
    pub(crate) fn free(&self, id: PoolId) -> usize {
        let Ok(node) = self.resolve(id) else {
            return 0;
        };
        let parent = {
            let inner = node.inner.lock();
            if node.is_freed() {
                return 0;
            }
            inner.parent
        };
        if let Some(parent) = parent {
            self.unlink(parent, id);
        }
        let released = self.release_subtree(id, node);
        if released > 0 {
            sub_debug!(POOL, pool = %id, released, "pool freed");
        }
        released
    }

    fn unlink(&self, parent: PoolId, child: PoolId) {
        let Ok(parent_node) = self.resolve(parent) else {
            return;
        };
        let mut inner = parent_node.inner.lock();
        if let Some(pos) = inner.children.iter().position(|c| *c == child) {
            inner.children.remove(pos);
        }
    }

    fn release_subtree(&self, root: PoolId, root_node: Arc<PoolNode>) -> usize {
        // Mark every node first so concurrent users fail fast.
        let mut order = Vec::new();
        let mut pending = vec![(root, root_node)];
        while let Some((id, node)) = pending.pop() {
            let inner = node.inner.lock();
            if !node.mark_freed() {
                // Another thread is already releasing this subtree.
                continue;
            }
            for &child in &inner.children {
                if let Ok(child_node) = self.resolve(child) {
                    pending.push((child, child_node));
                }
            }
            drop(inner);
            order.push((id, node));
        }

        // Parents precede their children in `order`; release in reverse.
        for (id, node) in order.iter().rev() {
            let records = {
                let mut inner = node.inner.lock();
                inner.children.clear();
                std::mem::take(&mut inner.records)
            };
            for record in records {
                if let Some(addr) = record.addr {
                    // SAFETY: the node is marked freed, so no accessor can reach
                    // this block any more, and the record was taken out of the
                    // table so it is released exactly once.
                    unsafe { dealloc_block(addr, record.len) };
                    sub_trace!(POOL, pool = %id, addr = ?addr, len = record.len, "block released");
                }
            }
            self.vacate(*id);
        }
        order.len()
    }

    // ------------------------------------------------------------------------
    // Blocks
    // ------------------------------------------------------------------------

    pub(crate) fn allocate(&self, id: PoolId, len: usize) -> MemoryResult<NonNull<u8>> {
        let node = self.resolve(id)?;
        let mut inner = node.inner.lock();
        if node.is_freed() {
            return Err(MemoryError::pool_freed(id));
        }
        let addr = alloc_block(len)?;
        let grows = inner.records.len() == inner.records.capacity()
            && inner.records.iter().all(|r| r.addr.is_some());
        inner.track(addr, len, self.tracking_increment);
        if grows {
            sub_trace!(POOL, pool = %id, capacity = inner.records.capacity(), "tracking table grown");
        }
        sub_trace!(POOL, pool = %id, addr = ?addr, len, "block allocated");
        Ok(addr)
    }

    pub(crate) fn reallocate(
        &self,
        id: PoolId,
        addr: Option<NonNull<u8>>,
        len: usize,
    ) -> MemoryResult<NonNull<u8>> {
        let Some(addr) = addr else {
            return self.allocate(id, len);
        };
        match self.reallocate_in_subtree(id, addr, len)? {
            Some(moved) => Ok(moved),
            None => Err(MemoryError::not_tracked(id, addr.as_ptr().addr())),
        }
    }

    /// Depth-first search for the block, resizing it where found.
    /// `Ok(None)` means no pool in the subtree tracks `addr`.
    fn reallocate_in_subtree(
        &self,
        id: PoolId,
        addr: NonNull<u8>,
        len: usize,
    ) -> MemoryResult<Option<NonNull<u8>>> {
        let node = self.resolve(id)?;
        let mut inner = node.inner.lock();
        if node.is_freed() {
            return Err(MemoryError::pool_freed(id));
        }

        if let Some(pos) = inner.position(addr) {
            let old_len = inner.records[pos].len;
            // SAFETY: the record proves the block is live with length old_len,
            // and the node lock keeps every other accessor out.
            let moved = unsafe { realloc_block(addr, old_len, len) }?;
            inner.records[pos] = AllocRecord {
                addr: Some(moved),
                len,
            };
            sub_trace!(POOL, pool = %id, from = ?addr, to = ?moved, old_len, len, "block resized");
            return Ok(Some(moved));
        }

        let children = inner.children.clone();
        for child in children {
            match self.reallocate_in_subtree(child, addr, len) {
                Ok(Some(moved)) => return Ok(Some(moved)),
                Ok(None) => {}
                Err(e) if e.is_freed() => {}
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }

    pub(crate) fn free_at(&self, id: PoolId, addr: NonNull<u8>) -> MemoryResult<()> {
        let node = self.resolve(id)?;
        let mut inner = node.inner.lock();
        if node.is_freed() {
            return Err(MemoryError::pool_freed(id));
        }
        let pos = inner
            .position(addr)
            .ok_or_else(|| MemoryError::not_tracked(id, addr.as_ptr().addr()))?;
        let len = inner.records[pos].len;
        inner.records[pos] = AllocRecord::VACANT;
        // SAFETY: the block was live in this node's table and its record has
        // just been cleared under the node lock.
        unsafe { dealloc_block(addr, len) };
        sub_trace!(POOL, pool = %id, addr = ?addr, len, "block freed");
        Ok(())
    }

    /// Run `f` over a tracked block while holding the node lock
    pub(crate) fn with_block<R>(
        &self,
        id: PoolId,
        addr: NonNull<u8>,
        f: impl FnOnce(&mut [u8]) -> R,
    ) -> MemoryResult<R> {
        self.try_with_block(id, addr, f).map_err(|(e, _)| e)
    }

    /// Like [`with_block`](Self::with_block), but hands `f` back on failure
    pub(crate) fn try_with_block<R, F>(
        &self,
        id: PoolId,
        addr: NonNull<u8>,
        f: F,
    ) -> Result<R, (MemoryError, F)>
    where
        F: FnOnce(&mut [u8]) -> R,
    {
        let node = match self.resolve(id) {
            Ok(node) => node,
            Err(e) => return Err((e, f)),
        };
        let inner = node.inner.lock();
        if node.is_freed() {
            return Err((MemoryError::pool_freed(id), f));
        }
        let Some(pos) = inner.position(addr) else {
            return Err((MemoryError::not_tracked(id, addr.as_ptr().addr()), f));
        };
        let len = inner.records[pos].len;
        // SAFETY: Viewing a live block.
        // - the record proves addr points to len initialized bytes
        //   owned by this node (u8 has no invalid bit patterns)
        // - the node lock is held for the whole borrow, so free, free_at and
        //   reallocate cannot release or move the block meanwhile
        let bytes = unsafe { std::slice::from_raw_parts_mut(addr.as_ptr(), len) };
        Ok(f(bytes))
    }

    // ------------------------------------------------------------------------
    // Copy
    // ------------------------------------------------------------------------

    pub(crate) fn copy_tree(self: &Arc<Self>, source: PoolId) -> MemoryResult<Pool> {
        // Created before the source is locked: the master lock must not be
        // taken while a node lock is held.
        let target = self.create_root()?;
        match self.copy_into(source, &target) {
            Ok(()) => {
                sub_debug!(POOL, source = %source, copy = %target.id(), "pool copied");
                Ok(target)
            }
            Err(e) => {
                target.free();
                Err(e)
            }
        }
    }

    fn copy_into(self: &Arc<Self>, source: PoolId, target: &Pool) -> MemoryResult<()> {
        let node = self.resolve(source)?;
        let children = {
            let inner = node.inner.lock();
            if node.is_freed() {
                return Err(MemoryError::pool_freed(source));
            }
            for (addr, len) in inner.live() {
                // SAFETY: the source block is live (tracked) and the source
                // node lock is held, so it is neither moved nor released.
                let src = unsafe { std::slice::from_raw_parts(addr.as_ptr(), len) };
                let dst = target.allocate(len)?;
                target.with_bytes_mut(dst, |bytes| bytes.copy_from_slice(src))?;
            }
            inner.children.clone()
        };

        for child in children {
            let sub = target.create_subpool()?;
            match self.copy_into(child, &sub) {
                Ok(()) => {}
                // Freed while we were copying its siblings.
                Err(e) if e.is_freed() => sub.free(),
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------------

    pub(crate) fn state(&self, id: PoolId) -> PoolState {
        match self.resolve(id) {
            Ok(_) => PoolState::Valid,
            Err(_) => PoolState::Freed,
        }
    }

    pub(crate) fn parent(&self, id: PoolId) -> MemoryResult<Option<PoolId>> {
        let node = self.resolve(id)?;
        let parent = node.inner.lock().parent;
        let master = self.master_id();
        Ok(parent.filter(|p| Some(*p) != master))
    }

    pub(crate) fn children(&self, id: PoolId) -> MemoryResult<Vec<PoolId>> {
        let node = self.resolve(id)?;
        let children = node.inner.lock().children.clone();
        Ok(children)
    }

    pub(crate) fn allocations(&self, id: PoolId) -> MemoryResult<Vec<(NonNull<u8>, usize)>> {
        let node = self.resolve(id)?;
        let inner = node.inner.lock();
        Ok(inner.live().collect())
    }

    pub(crate) fn stats(&self, id: PoolId) -> MemoryResult<PoolStats> {
        let node = self.resolve(id)?;
        let inner = node.inner.lock();
        Ok(PoolStats::from_node(&inner))
    }

    pub(crate) fn subtree_stats(&self, id: PoolId) -> MemoryResult<PoolStats> {
        let mut total = self.stats(id)?;
        for child in self.children(id)? {
            match self.subtree_stats(child) {
                Ok(stats) => total.absorb(&stats),
                Err(e) if e.is_freed() => {}
                Err(e) => return Err(e),
            }
        }
        Ok(total)
    }
}

impl Drop for PoolRegistry {
    fn drop(&mut self) {
        let arena = self.arena.get_mut();
        let mut released = 0usize;
        for slot in &mut arena.slots {
            let Some(node) = slot.node.take() else {
                continue;
            };
            let mut inner = node.inner.lock();
            for record in inner.records.drain(..) {
                if let Some(addr) = record.addr {
                    // SAFETY: the registry is being dropped, so no handle can
                    // reach this node; each record is drained exactly once.
                    unsafe { dealloc_block(addr, record.len) };
                    released += 1;
                }
            }
        }
        if released > 0 {
            sub_debug!(POOL, blocks = released, "registry dropped with live blocks");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_master_created_lazily() {
        let registry = PoolRegistry::new();
        assert_eq!(registry.live_pools(), 0);
        let _root = registry.create_root().unwrap();
        assert_eq!(registry.live_pools(), 2);
    }

    #[test]
    fn test_stale_id_resolves_freed() {
        let registry = PoolRegistry::new();
        let root = registry.create_root().unwrap();
        let id = root.id();
        root.free();

        let err = registry.resolve(id).unwrap_err();
        assert!(err.is_freed());

        // The slot is reused under a new generation.
        let again = registry.create_root().unwrap();
        assert_eq!(again.id().index(), id.index());
        assert_ne!(again.id().generation(), id.generation());
        assert!(registry.resolve(id).unwrap_err().is_freed());
    }

    #[test]
    fn test_unissued_id_is_invalid_handle() {
        let registry = PoolRegistry::new();
        let err = registry.resolve(PoolId::new(42, 0)).unwrap_err();
        assert_eq!(err.code(), "MEM:POOL:HANDLE");
    }

    #[test]
    fn test_cleanup_all_resets_master() {
        let registry = PoolRegistry::new();
        let a = registry.create_root().unwrap();
        let b = registry.create_root().unwrap();
        registry.cleanup_all();
        assert!(!a.is_valid());
        assert!(!b.is_valid());
        assert_eq!(registry.live_pools(), 0);

        let c = registry.create_root().unwrap();
        assert!(c.is_valid());
        assert_eq!(registry.live_pools(), 2);
    }

    #[test]
    fn test_tracking_increment_is_at_least_one() {
        assert_eq!(PoolRegistry::with_tracking_increment(0).tracking_increment(), 1);
        assert_eq!(
            PoolRegistry::new().tracking_increment(),
            DEFAULT_TRACKING_INCREMENT
        );
    }

    #[test]
    fn test_drop_releases_live_blocks() {
        let registry = PoolRegistry::new();
        let root = registry.create_root().unwrap();
        root.allocate(128).unwrap();
        drop(root);
        drop(registry);
    }
}
