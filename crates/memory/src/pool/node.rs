//! Pool nodes and the raw blocks they track

use std::alloc::{Layout, alloc_zeroed, dealloc, realloc};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use super::PoolId;
use crate::error::{MemoryError, MemoryResult};
use crate::logging::POOL;

/// Alignment of every block handed out by a pool
pub const BLOCK_ALIGN: usize = 16;

fn block_layout(len: usize) -> MemoryResult<Layout> {
    Layout::from_size_align(len.max(1), BLOCK_ALIGN)
        .map_err(|_| MemoryError::size_overflow(&POOL, "block layout"))
}

/// Allocate a zero-filled block of `len` bytes from the system allocator
///
/// Blocks are always initialized: the checked accessors hand them out as
/// `&mut [u8]`.
pub(crate) fn alloc_block(len: usize) -> MemoryResult<NonNull<u8>> {
    let layout = block_layout(len)?;
    // SAFETY: layout has a non-zero size (len.max(1)) and a power-of-two alignment.
    let ptr = unsafe { alloc_zeroed(layout) };
    NonNull::new(ptr).ok_or_else(|| MemoryError::allocation_failed(layout.size(), layout.align()))
}

/// Resize a block, zero-filling any growth. On failure the original block
/// is untouched.
///
/// # Safety
///
/// `ptr` must be a live block returned by [`alloc_block`] or
/// [`realloc_block`] with length `old_len`.
pub(crate) unsafe fn realloc_block(
    ptr: NonNull<u8>,
    old_len: usize,
    new_len: usize,
) -> MemoryResult<NonNull<u8>> {
    let old = block_layout(old_len)?;
    let new = block_layout(new_len)?;
    // SAFETY: Resizing a block we own.
    // - ptr was allocated with `old` (caller contract)
    // - new.size() is non-zero and was validated against the alignment above
    let moved = unsafe { realloc(ptr.as_ptr(), old, new.size()) };
    let moved =
        NonNull::new(moved).ok_or_else(|| MemoryError::allocation_failed(new.size(), new.align()))?;
    if new_len > old_len {
        // SAFETY: the block now spans new_len bytes, so the tail is in bounds.
        unsafe { moved.add(old_len).write_bytes(0, new_len - old_len) };
    }
    Ok(moved)
}

/// Return a block to the system allocator
///
/// # Safety
///
/// `ptr` must be a live block of length `len` and must not be used afterwards.
pub(crate) unsafe fn dealloc_block(ptr: NonNull<u8>, len: usize) {
    // The layout was valid when the block was created, so this cannot fail.
    if let Ok(layout) = block_layout(len) {
        // SAFETY: ptr was allocated with this exact layout (caller contract).
        unsafe { dealloc(ptr.as_ptr(), layout) };
    }
}

/// One tracked block. `addr == None` marks a slot vacated by `free_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct AllocRecord {
    pub(crate) addr: Option<NonNull<u8>>,
    pub(crate) len: usize,
}

impl AllocRecord {
    pub(crate) const VACANT: Self = Self { addr: None, len: 0 };
}

/// Mutable part of a node, guarded by the node's mutex
#[derive(Debug)]
pub(crate) struct NodeInner {
    pub(crate) records: Vec<AllocRecord>,
    pub(crate) children: Vec<PoolId>,
    pub(crate) parent: Option<PoolId>,
}

// SAFETY: NodeInner is Send because:
// - the NonNull pointers are addresses of blocks owned by this node, not
//   references into thread-local data
// - the blocks are only read or written while the owning node's mutex is held
// - deallocation happens exactly once, after the node is marked freed
unsafe impl Send for NodeInner {}

impl NodeInner {
    /// Record a block, reusing a vacated slot before growing the table
    pub(crate) fn track(&mut self, addr: NonNull<u8>, len: usize, increment: usize) {
        let record = AllocRecord {
            addr: Some(addr),
            len,
        };
        if let Some(slot) = self.records.iter_mut().find(|r| r.addr.is_none()) {
            *slot = record;
            return;
        }
        if self.records.len() == self.records.capacity() {
            self.records.reserve_exact(increment);
        }
        self.records.push(record);
    }

    pub(crate) fn position(&self, addr: NonNull<u8>) -> Option<usize> {
        self.records.iter().position(|r| r.addr == Some(addr))
    }

    /// Live blocks in allocation-slot order
    pub(crate) fn live(&self) -> impl Iterator<Item = (NonNull<u8>, usize)> + '_ {
        self.records
            .iter()
            .filter_map(|r| r.addr.map(|addr| (addr, r.len)))
    }
}

/// A node in the pool tree
#[derive(Debug)]
pub(crate) struct PoolNode {
    freed: AtomicBool,
    pub(crate) inner: Mutex<NodeInner>,
}

impl PoolNode {
    pub(crate) fn new(parent: Option<PoolId>) -> Self {
        Self {
            freed: AtomicBool::new(false),
            inner: Mutex::new(NodeInner {
                records: Vec::new(),
                children: Vec::new(),
                parent,
            }),
        }
    }

    pub(crate) fn is_freed(&self) -> bool {
        self.freed.load(Ordering::Acquire)
    }

    /// Flip the node to freed. Returns `false` if it already was.
    ///
    /// Callers hold `inner`, so a thread that checks `is_freed` under the
    /// same lock never sees a half-released node.
    pub(crate) fn mark_freed(&self) -> bool {
        !self.freed.swap(true, Ordering::AcqRel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(len: usize) -> NonNull<u8> {
        alloc_block(len).unwrap()
    }

    #[test]
    fn test_zeroed_block_is_aligned_and_zero() {
        let ptr = block(32);
        assert_eq!(ptr.as_ptr().addr() % BLOCK_ALIGN, 0);
        // SAFETY: 32 zeroed bytes were just allocated.
        let bytes = unsafe { std::slice::from_raw_parts(ptr.as_ptr(), 32) };
        assert!(bytes.iter().all(|&b| b == 0));
        unsafe { dealloc_block(ptr, 32) };
    }

    #[test]
    fn test_zero_length_block() {
        let ptr = block(0);
        unsafe { dealloc_block(ptr, 0) };
    }

    #[test]
    fn test_realloc_preserves_prefix_and_zeroes_tail() {
        let ptr = block(8);
        unsafe { ptr.as_ptr().write_bytes(0xAB, 8) };
        let grown = unsafe { realloc_block(ptr, 8, 4096) }.unwrap();
        let bytes = unsafe { std::slice::from_raw_parts(grown.as_ptr(), 4096) };
        assert_eq!(&bytes[..8], &[0xAB; 8]);
        assert!(bytes[8..].iter().all(|&b| b == 0));
        unsafe { dealloc_block(grown, 4096) };
    }

    #[test]
    fn test_track_reuses_vacant_slot() {
        let mut inner = NodeInner {
            records: Vec::new(),
            children: Vec::new(),
            parent: None,
        };
        let a = block(4);
        let b = block(4);
        inner.track(a, 4, 8);
        inner.track(b, 4, 8);
        assert!(inner.records.capacity() >= 8);

        inner.records[0] = AllocRecord::VACANT;
        let c = block(4);
        inner.track(c, 4, 8);
        assert_eq!(inner.records.len(), 2);
        assert_eq!(inner.position(c), Some(0));

        for (addr, len) in inner.live().collect::<Vec<_>>() {
            unsafe { dealloc_block(addr, len) };
        }
        unsafe { dealloc_block(a, 4) };
    }

    #[test]
    fn test_mark_freed_once() {
        let node = PoolNode::new(None);
        assert!(!node.is_freed());
        assert!(node.mark_freed());
        assert!(!node.mark_freed());
        assert!(node.is_freed());
    }
}
