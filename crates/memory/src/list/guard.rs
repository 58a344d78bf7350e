//! Held list lock

use std::marker::PhantomData;

use bytemuck::Pod;
use parking_lot::MutexGuard;

use super::config::ListKind;
use super::state::ListState;
use crate::error::MemoryResult;
use crate::sort::{SortField, SortKind, SortSpec};

/// Exclusive access to a list for a multi-step sequence
///
/// Returned by [`List::acquire`](super::List::acquire). Other threads block
/// on the list until the guard is released or dropped. Operations on the
/// guard do not lock again, so calling the [`List`](super::List) handle from
/// the thread that holds the guard deadlocks; use the guard instead.
pub struct ListGuard<'a, T: Pod> {
    state: MutexGuard<'a, ListState>,
    _entry: PhantomData<T>,
}

impl<'a, T: Pod> ListGuard<'a, T> {
    pub(super) fn new(state: MutexGuard<'a, ListState>) -> Self {
        Self {
            state,
            _entry: PhantomData,
        }
    }

    /// Give the lock back
    pub fn release(self) {}

    pub fn new_entry(&mut self, init: impl FnOnce(&mut T)) -> MemoryResult<usize> {
        self.state.new_entry(init)
    }

    pub fn with_entries<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        self.state.entries(f)
    }

    pub fn with_entries_mut<R>(&mut self, f: impl FnOnce(&mut [T]) -> R) -> MemoryResult<R> {
        self.state.entries_mut(f)
    }

    pub fn entries_copy(&self) -> Vec<T> {
        self.state.entries(<[T]>::to_vec)
    }

    pub fn get(&self, index: usize) -> Option<T> {
        self.state.get(index)
    }

    pub fn len(&self) -> usize {
        self.state.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.state.capacity()
    }

    pub fn kind(&self) -> ListKind {
        self.state.kind()
    }

    pub fn clear(&mut self) -> MemoryResult<()> {
        self.state.clear()
    }

    pub fn remove_index(&mut self, index: usize) -> MemoryResult<bool> {
        self.state.remove_index(index)
    }

    pub fn remove_before_index(&mut self, index: usize) -> MemoryResult<usize> {
        self.state.remove_before(index)
    }

    pub fn remove_after_index(&mut self, index: usize) -> MemoryResult<usize> {
        self.state.remove_after(index)
    }

    pub fn push(&mut self, value: T) -> MemoryResult<()> {
        self.state.push(value)
    }

    pub fn pop(&mut self) -> MemoryResult<Option<T>> {
        self.state.pop()
    }

    pub fn sort_by_offset(&mut self, offset: usize, kind: SortKind) -> MemoryResult<()> {
        self.state.set_sort_key(SortSpec::new(offset, kind))?;
        self.state.sort()
    }

    pub fn sort_by_field<K: SortField>(&mut self, key: impl Fn(&T) -> K) -> MemoryResult<()> {
        self.state.sort_by_field(key)
    }
}

impl<T: Pod> std::fmt::Debug for ListGuard<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListGuard")
            .field("len", &self.state.len())
            .field("capacity", &self.state.capacity())
            .finish()
    }
}
