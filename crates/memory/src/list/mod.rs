//! Pool-backed dynamic lists
//!
//! A [`List<T>`] is a growable array of plain-old-data entries stored in a
//! private subpool of the pool it was created on. Freeing that pool (or any
//! ancestor) destroys the list; afterwards reads see no entries and writes
//! fail with [`MemoryError::ListFreed`](crate::MemoryError::ListFreed).
//!
//! ```
//! use strata_memory::list::List;
//! use strata_memory::pool::PoolRegistry;
//!
//! let registry = PoolRegistry::new();
//! let pool = registry.create_root()?;
//!
//! let list = List::<u32>::new(&pool)?;
//! for i in 0..4 {
//!     list.new_entry(|e| *e = i * 10)?;
//! }
//! list.remove_index(1)?;
//! assert_eq!(list.entries_copy(), vec![0, 20, 30]);
//! # Ok::<(), strata_memory::MemoryError>(())
//! ```
//!
//! FIFO and stack lists additionally support [`List::push`] and [`List::pop`].
//!
//! # Concurrency
//!
//! Every operation takes the list's lock. [`List::acquire`] hands out the
//! lock as a [`ListGuard`] for sequences that must not interleave with
//! other threads.

mod config;
mod guard;
mod state;

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use bytemuck::Pod;
use parking_lot::Mutex;

pub use config::{DEFAULT_STEP_SIZE, ListConfig, ListKind, default_step_size, set_default_step_size};
pub use guard::ListGuard;

use self::state::ListState;
use crate::error::MemoryResult;
use crate::pool::Pool;
use crate::sort::{SortField, SortKind, SortSpec};

/// Growable, pool-backed list of `T`
///
/// Cloning yields another handle to the same list.
pub struct List<T: Pod> {
    state: Arc<Mutex<ListState>>,
    _entry: PhantomData<T>,
}

impl<T: Pod> Clone for List<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            _entry: PhantomData,
        }
    }
}

impl<T: Pod> List<T> {
    /// Plain list on a new subpool of `pool`
    pub fn new(pool: &Pool) -> MemoryResult<Self> {
        Self::with_config(pool, ListConfig::default())
    }

    /// FIFO list: `pop` returns the oldest entry
    pub fn fifo(pool: &Pool) -> MemoryResult<Self> {
        Self::with_config(pool, ListConfig::fifo())
    }

    /// Stack: `pop` returns the newest entry
    pub fn stack(pool: &Pool) -> MemoryResult<Self> {
        Self::with_config(pool, ListConfig::stack())
    }

    pub fn with_kind(pool: &Pool, kind: ListKind) -> MemoryResult<Self> {
        Self::with_config(pool, ListConfig::new(kind))
    }

    /// Zero-sized `T` and a zero step are rejected
    pub fn with_config(pool: &Pool, config: ListConfig) -> MemoryResult<Self> {
        let state = ListState::new(pool, size_of::<T>(), align_of::<T>(), config)?;
        Ok(Self::from_state(state))
    }

    fn from_state(state: ListState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
            _entry: PhantomData,
        }
    }

    // ------------------------------------------------------------------------
    // Entries
    // ------------------------------------------------------------------------

    /// Append a zeroed entry, let `init` fill it in, and return its index
    ///
    /// Grows the buffer by the step size when full.
    pub fn new_entry(&self, init: impl FnOnce(&mut T)) -> MemoryResult<usize> {
        self.state.lock().new_entry(init)
    }

    /// Run `f` over the live entries
    ///
    /// A destroyed list shows no entries.
    pub fn with_entries<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        self.state.lock().entries(f)
    }

    /// Run `f` over the live entries, mutably
    pub fn with_entries_mut<R>(&self, f: impl FnOnce(&mut [T]) -> R) -> MemoryResult<R> {
        self.state.lock().entries_mut(f)
    }

    /// Snapshot of the entries, independent of the list buffer
    pub fn entries_copy(&self) -> Vec<T> {
        self.state.lock().entries(<[T]>::to_vec)
    }

    /// Copy of the entry at `index`
    pub fn get(&self, index: usize) -> Option<T> {
        self.state.lock().get(index)
    }

    pub fn len(&self) -> usize {
        self.state.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries the buffer holds before it must grow
    pub fn capacity(&self) -> usize {
        self.state.lock().capacity()
    }

    pub fn kind(&self) -> ListKind {
        self.state.lock().kind()
    }

    pub fn is_valid(&self) -> bool {
        self.state.lock().is_valid()
    }

    // ------------------------------------------------------------------------
    // Removal
    // ------------------------------------------------------------------------

    /// Drop every entry, keeping the capacity
    pub fn clear(&self) -> MemoryResult<()> {
        self.state.lock().clear()
    }

    /// Remove the entry at `index`; out of range is a no-op returning `false`
    pub fn remove_index(&self, index: usize) -> MemoryResult<bool> {
        self.state.lock().remove_index(index)
    }

    /// Remove every entry before `index`; returns how many were removed
    pub fn remove_before_index(&self, index: usize) -> MemoryResult<usize> {
        self.state.lock().remove_before(index)
    }

    /// Remove every entry after `index`; returns how many were removed
    pub fn remove_after_index(&self, index: usize) -> MemoryResult<usize> {
        self.state.lock().remove_after(index)
    }

    // ------------------------------------------------------------------------
    // Queue / stack
    // ------------------------------------------------------------------------

    /// Append to a FIFO or stack list
    pub fn push(&self, value: T) -> MemoryResult<()> {
        self.state.lock().push(value)
    }

    /// Take the oldest (FIFO) or newest (stack) entry
    pub fn pop(&self) -> MemoryResult<Option<T>> {
        self.state.lock().pop()
    }

    // ------------------------------------------------------------------------
    // Locking
    // ------------------------------------------------------------------------

    /// Hold the list lock until the guard is released
    pub fn acquire(&self) -> ListGuard<'_, T> {
        ListGuard::new(self.state.lock())
    }

    // ------------------------------------------------------------------------
    // Sorting
    // ------------------------------------------------------------------------

    /// Store the key used by [`sort`](Self::sort)
    ///
    /// The key must fit inside `T`.
    pub fn set_sort_key(&self, offset: usize, kind: SortKind) -> MemoryResult<()> {
        self.state.lock().set_sort_key(SortSpec::new(offset, kind))
    }

    pub fn sort_key(&self) -> Option<SortSpec> {
        self.state.lock().sort_key()
    }

    /// Sort by the stored key
    pub fn sort(&self) -> MemoryResult<()> {
        self.state.lock().sort()
    }

    /// Store the key and sort by it in one locked step
    pub fn sort_by_offset(&self, offset: usize, kind: SortKind) -> MemoryResult<()> {
        let mut state = self.state.lock();
        state.set_sort_key(SortSpec::new(offset, kind))?;
        state.sort()
    }

    /// Stable sort by a numeric field
    ///
    /// ```
    /// # use strata_memory::{list::List, pool::PoolRegistry};
    /// #[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
    /// #[repr(C)]
    /// struct Job {
    ///     id: u32,
    ///     cost: f32,
    /// }
    ///
    /// # let pool = PoolRegistry::new().create_root()?;
    /// let jobs = List::<Job>::new(&pool)?;
    /// jobs.new_entry(|j| *j = Job { id: 1, cost: 2.5 })?;
    /// jobs.new_entry(|j| *j = Job { id: 2, cost: 0.5 })?;
    /// jobs.sort_by_field(|j| j.cost)?;
    /// assert_eq!(jobs.get(0).map(|j| j.id), Some(2));
    /// # Ok::<(), strata_memory::MemoryError>(())
    /// ```
    pub fn sort_by_field<K: SortField>(&self, key: impl Fn(&T) -> K) -> MemoryResult<()> {
        self.state.lock().sort_by_field(key)
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Free the list's private pool. Later reads are empty, writes fail.
    pub fn destroy(&self) {
        self.state.lock().destroy();
    }

    /// Independent copy with the same kind, step and entries, on a new
    /// subpool of `pool`
    pub fn copy(&self, pool: &Pool) -> MemoryResult<Self> {
        let copy = self.state.lock().copy_to(pool, align_of::<T>())?;
        Ok(Self::from_state(copy))
    }

    /// The list's private pool
    pub fn pool(&self) -> Pool {
        self.state.lock().pool().clone()
    }

    pub fn step_size(&self) -> usize {
        self.state.lock().step()
    }

    /// Change how many entries each growth adds; zero is rejected
    pub fn set_step_size(&self, step: usize) -> MemoryResult<()> {
        self.state.lock().set_step(step)
    }
}

impl<T: Pod> fmt::Debug for List<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("List")
            .field("kind", &state.kind())
            .field("len", &state.len())
            .field("capacity", &state.capacity())
            .field("pool", &state.pool().id())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MemoryError;
    use crate::pool::PoolRegistry;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
    #[repr(C)]
    struct Sample {
        id: u32,
        weight: i32,
        score: f64,
    }

    fn pool() -> Pool {
        PoolRegistry::new().create_root().unwrap()
    }

    fn filled(n: i32) -> List<i32> {
        let list = List::<i32>::new(&pool()).unwrap();
        for i in 0..n {
            list.new_entry(|e| *e = i).unwrap();
        }
        list
    }

    #[test]
    fn test_new_entry_is_zeroed_and_indexed() {
        let list = List::<Sample>::new(&pool()).unwrap();
        let idx = list.new_entry(|_| {}).unwrap();
        assert_eq!(idx, 0);
        assert_eq!(
            list.get(0),
            Some(Sample {
                id: 0,
                weight: 0,
                score: 0.0
            })
        );
    }

    #[test]
    fn test_growth_by_step() {
        let list = List::<u8>::with_config(&pool(), ListConfig::default().with_step(4)).unwrap();
        assert_eq!(list.capacity(), 0);
        list.new_entry(|e| *e = 1).unwrap();
        assert_eq!(list.capacity(), 4);
        for _ in 0..4 {
            list.new_entry(|_| {}).unwrap();
        }
        assert_eq!(list.capacity(), 8);
        assert_eq!(list.len(), 5);
    }

    #[test]
    fn test_clear_keeps_capacity() {
        let list = filled(20);
        let capacity = list.capacity();
        list.clear().unwrap();
        assert!(list.is_empty());
        assert_eq!(list.capacity(), capacity);
        assert!(list.is_valid());
    }

    #[rstest]
    #[case(0, vec![1, 2, 3, 4])]
    #[case(2, vec![0, 1, 3, 4])]
    #[case(4, vec![0, 1, 2, 3])]
    #[case(5, vec![0, 1, 2, 3, 4])]
    fn test_remove_index(#[case] index: usize, #[case] expected: Vec<i32>) {
        let list = filled(5);
        list.remove_index(index).unwrap();
        assert_eq!(list.entries_copy(), expected);
    }

    #[rstest]
    #[case(0, vec![0, 1, 2, 3, 4])]
    #[case(3, vec![3, 4])]
    #[case(5, vec![0, 1, 2, 3, 4])]
    fn test_remove_before_index(#[case] index: usize, #[case] expected: Vec<i32>) {
        let list = filled(5);
        list.remove_before_index(index).unwrap();
        assert_eq!(list.entries_copy(), expected);
    }

    #[rstest]
    #[case(0, vec![0])]
    #[case(2, vec![0, 1, 2])]
    #[case(4, vec![0, 1, 2, 3, 4])]
    #[case(9, vec![0, 1, 2, 3, 4])]
    fn test_remove_after_index(#[case] index: usize, #[case] expected: Vec<i32>) {
        let list = filled(5);
        list.remove_after_index(index).unwrap();
        assert_eq!(list.entries_copy(), expected);
    }

    #[test]
    fn test_plain_list_rejects_push_pop() {
        let list = filled(1);
        assert!(matches!(
            list.push(7),
            Err(MemoryError::InvalidOperation { .. })
        ));
        assert!(list.pop().is_err());
    }

    #[test]
    fn test_fifo_and_stack_order() {
        let pool = pool();
        let fifo = List::<u16>::fifo(&pool).unwrap();
        let stack = List::<u16>::stack(&pool).unwrap();
        for v in [1, 2, 3] {
            fifo.push(v).unwrap();
            stack.push(v).unwrap();
        }
        let drain = |l: &List<u16>| std::iter::from_fn(|| l.pop().unwrap()).collect::<Vec<_>>();
        assert_eq!(drain(&fifo), vec![1, 2, 3]);
        assert_eq!(drain(&stack), vec![3, 2, 1]);
        assert_eq!(fifo.pop().unwrap(), None);
    }

    #[test]
    fn test_zero_sized_entries_rejected() {
        assert!(matches!(
            List::<()>::new(&pool()),
            Err(MemoryError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_destroy_empties_and_blocks_writes() {
        let list = filled(3);
        let backing = list.pool();
        list.destroy();
        assert!(!list.is_valid());
        assert!(!backing.is_valid());
        assert!(list.entries_copy().is_empty());
        assert_eq!(list.len(), 0);
        assert_eq!(list.new_entry(|_| {}), Err(MemoryError::ListFreed));
        list.destroy();
    }

    #[test]
    fn test_parent_free_invalidates_list() {
        let parent = pool();
        let list = List::<u64>::new(&parent).unwrap();
        list.new_entry(|e| *e = 9).unwrap();
        parent.free();
        assert!(list.with_entries(<[u64]>::is_empty));
        assert_eq!(list.clear(), Err(MemoryError::ListFreed));
    }

    #[test]
    fn test_copy_is_independent() {
        let root = pool();
        let list = filled(4);
        list.set_step_size(2).unwrap();
        let copy = list.copy(&root).unwrap();
        assert_eq!(copy.entries_copy(), vec![0, 1, 2, 3]);
        assert_eq!(copy.step_size(), 2);

        list.destroy();
        copy.new_entry(|e| *e = 4).unwrap();
        assert_eq!(copy.entries_copy(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_set_step_size_rejects_zero() {
        let list = filled(0);
        assert!(list.set_step_size(0).is_err());
        assert_eq!(list.step_size(), default_step_size());
    }

    #[test]
    fn test_sort_by_offset_and_field() {
        let list = List::<Sample>::new(&pool()).unwrap();
        for (id, weight, score) in [(1, 5, 0.5), (2, -3, 2.0), (3, 5, -1.0), (4, 0, 1.0)] {
            list.new_entry(|s| *s = Sample { id, weight, score }).unwrap();
        }

        list.sort_by_offset(4, SortKind::I32).unwrap();
        let ids: Vec<u32> = list.entries_copy().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![2, 4, 1, 3]);

        list.sort_by_field(|s| s.score).unwrap();
        let ids: Vec<u32> = list.entries_copy().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![3, 1, 4, 2]);
    }

    #[test]
    fn test_sort_without_key_is_config_error() {
        let list = filled(3);
        assert!(matches!(list.sort(), Err(MemoryError::InvalidConfig { .. })));
        assert!(list.set_sort_key(2, SortKind::I32).is_err());
        assert_eq!(list.entries_copy(), vec![0, 1, 2]);
    }

    #[test]
    fn test_guard_operations() {
        let list = List::<i32>::stack(&pool()).unwrap();
        let mut guard = list.acquire();
        guard.push(1).unwrap();
        guard.push(2).unwrap();
        guard.new_entry(|e| *e = 3).unwrap();
        assert_eq!(guard.len(), 3);
        assert_eq!(guard.pop().unwrap(), Some(3));
        guard.with_entries_mut(|e| e[0] = 10).unwrap();
        guard.release();
        assert_eq!(list.entries_copy(), vec![10, 2]);
    }
}
