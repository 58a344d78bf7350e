//! Untyped list state
//!
//! Everything here runs with the list mutex held. The entry buffer is one
//! block in the list's private pool and is only touched through that pool's
//! locked accessor, so lock order is always list then pool.

use std::ptr::NonNull;

use bytemuck::Pod;
use strata_log::{sub_debug, sub_trace};

use super::config::{ListConfig, ListKind};
use crate::error::{MemoryError, MemoryResult};
use crate::logging::LIST;
use crate::pool::{BLOCK_ALIGN, Pool};
use crate::sort::{self, SortField, SortRecord, SortSpec};

#[derive(Debug)]
pub(crate) struct ListState {
    pool: Pool,
    buffer: Option<NonNull<u8>>,
    entry_size: usize,
    capacity: usize,
    count: usize,
    step: usize,
    kind: ListKind,
    sort_key: Option<SortSpec>,
    freed: bool,
}

// SAFETY: ListState is Send because:
// - `buffer` is used only as a key into the private pool, never dereferenced here
// - the bytes behind it are reached through `Pool::with_bytes_mut`, which
//   holds the pool node lock
// - every other field is plain data or a Send handle
unsafe impl Send for ListState {}

impl ListState {
    pub(crate) fn new(
        parent: &Pool,
        entry_size: usize,
        align: usize,
        config: ListConfig,
    ) -> MemoryResult<Self> {
        if entry_size == 0 {
            return Err(MemoryError::invalid_config(&LIST, "list entries must not be zero-sized"));
        }
        if align > BLOCK_ALIGN {
            return Err(MemoryError::invalid_config(&LIST, &format!(
                "list entry alignment {align} exceeds pool block alignment {BLOCK_ALIGN}"
            )));
        }
        let step = config.resolved_step()?;
        let pool = parent.create_subpool()?;
        sub_debug!(LIST, pool = %pool.id(), entry_size, step, kind = ?config.kind, "list created");

        Ok(Self {
            pool,
            buffer: None,
            entry_size,
            capacity: 0,
            count: 0,
            step,
            kind: config.kind,
            sort_key: None,
            freed: false,
        })
    }

    // ------------------------------------------------------------------------
    // State
    // ------------------------------------------------------------------------

    pub(crate) fn is_valid(&self) -> bool {
        !self.freed && self.pool.is_valid()
    }

    fn check(&mut self) -> MemoryResult<()> {
        if self.freed {
            return Err(MemoryError::list_freed());
        }
        if !self.pool.is_valid() {
            self.mark_freed();
            return Err(MemoryError::list_freed());
        }
        Ok(())
    }

    /// Translate a pool error, noticing when the pool went away under us
    fn pool_error(&mut self, e: MemoryError) -> MemoryError {
        if e.is_freed() {
            self.mark_freed();
            MemoryError::list_freed()
        } else {
            e
        }
    }

    fn mark_freed(&mut self) {
        self.freed = true;
        self.buffer = None;
        self.count = 0;
        self.capacity = 0;
    }

    pub(crate) fn len(&self) -> usize {
        if self.is_valid() { self.count } else { 0 }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn kind(&self) -> ListKind {
        self.kind
    }

    pub(crate) fn step(&self) -> usize {
        self.step
    }

    pub(crate) fn pool(&self) -> &Pool {
        &self.pool
    }

    pub(crate) fn set_step(&mut self, step: usize) -> MemoryResult<()> {
        self.check()?;
        if step == 0 {
            return Err(MemoryError::invalid_config(&LIST, "list step size must be non-zero"));
        }
        self.step = step;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Buffer access
    // ------------------------------------------------------------------------

    /// Occupied bytes, or an empty slice when the list is gone
    pub(crate) fn read<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        let len = self.count * self.entry_size;
        let reader = move |bytes: &mut [u8]| f(&bytes[..len.min(bytes.len())]);
        match self.buffer {
            Some(buffer) if !self.freed => match self.pool.try_with_bytes_mut(buffer, reader) {
                Ok(r) => r,
                Err((_, reader)) => reader(&mut []),
            },
            _ => reader(&mut []),
        }
    }

    /// Occupied bytes, mutably
    fn write<R>(&mut self, f: impl FnOnce(&mut [u8]) -> R) -> MemoryResult<R> {
        self.check()?;
        let Some(buffer) = self.buffer else {
            return Ok(f(&mut []));
        };
        let len = self.count * self.entry_size;
        match self.pool.with_bytes_mut(buffer, |bytes| bytes.get_mut(..len).map(f)) {
            Ok(Some(result)) => Ok(result),
            Ok(None) => Err(self.short_buffer(len)),
            Err(e) => Err(self.pool_error(e)),
        }
    }

    /// The backing block was resized behind the list's back
    fn short_buffer(&self, needed: usize) -> MemoryError {
        MemoryError::invalid_operation(
            &LIST,
            &format!(
                "list buffer in pool {} is shorter than the {needed} bytes its entries need",
                self.pool.id()
            ),
        )
    }

    /// Make room for one more entry, growing by `step` entries when full
    fn reserve_one(&mut self) -> MemoryResult<NonNull<u8>> {
        self.check()?;
        if let Some(buffer) = self.buffer.filter(|_| self.count < self.capacity) {
            return Ok(buffer);
        }

        let capacity = self
            .capacity
            .checked_add(self.step)
            .ok_or_else(|| MemoryError::size_overflow(&LIST, "list capacity"))?;
        let bytes = capacity
            .checked_mul(self.entry_size)
            .ok_or_else(|| MemoryError::size_overflow(&LIST, "list buffer"))?;
        let buffer = match self.pool.reallocate(self.buffer, bytes) {
            Ok(buffer) => buffer,
            Err(e) => return Err(self.pool_error(e)),
        };
        sub_debug!(LIST, pool = %self.pool.id(), from = self.capacity, to = capacity, "list grown");
        self.buffer = Some(buffer);
        self.capacity = capacity;
        Ok(buffer)
    }

    // ------------------------------------------------------------------------
    // Typed entry access
    // ------------------------------------------------------------------------

    pub(crate) fn entries<T: Pod, R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        self.read(|bytes| f(bytemuck::try_cast_slice(bytes).unwrap_or_default()))
    }

    pub(crate) fn entries_mut<T: Pod, R>(
        &mut self,
        f: impl FnOnce(&mut [T]) -> R,
    ) -> MemoryResult<R> {
        self.write(|bytes| f(bytemuck::try_cast_slice_mut(bytes).unwrap_or_default()))
    }

    pub(crate) fn get<T: Pod>(&self, index: usize) -> Option<T> {
        self.entries(|entries: &[T]| entries.get(index).copied())
    }

    /// Append a zeroed entry, let `init` fill it, and return its index
    pub(crate) fn new_entry<T: Pod>(&mut self, init: impl FnOnce(&mut T)) -> MemoryResult<usize> {
        let buffer = self.reserve_one()?;
        let index = self.count;
        let size = self.entry_size;
        let end = (index + 1) * size;
        let written = self.pool.with_bytes_mut(buffer, |bytes| {
            let slot = bytes.get_mut(index * size..end)?;
            slot.fill(0);
            Some(bytemuck::try_from_bytes_mut::<T>(slot).map(init).is_ok())
        });
        match written {
            Ok(Some(true)) => {}
            Ok(None) => return Err(self.short_buffer(end)),
            Ok(Some(false)) => {
                return Err(MemoryError::invalid_config(&LIST, "entry type does not match list layout"));
            }
            Err(e) => return Err(self.pool_error(e)),
        }
        self.count += 1;
        sub_trace!(LIST, pool = %self.pool.id(), index, count = self.count, "entry added");
        Ok(index)
    }

    // ------------------------------------------------------------------------
    // Removal
    // ------------------------------------------------------------------------

    pub(crate) fn clear(&mut self) -> MemoryResult<()> {
        self.check()?;
        self.count = 0;
        sub_trace!(LIST, pool = %self.pool.id(), "list cleared");
        Ok(())
    }

    /// Remove one entry, shifting the tail down. Returns whether anything was removed.
    pub(crate) fn remove_index(&mut self, index: usize) -> MemoryResult<bool> {
        self.check()?;
        if index >= self.count {
            return Ok(false);
        }
        let size = self.entry_size;
        self.write(|bytes| bytes.copy_within((index + 1) * size.., index * size))?;
        self.count -= 1;
        sub_trace!(LIST, pool = %self.pool.id(), index, count = self.count, "entry removed");
        Ok(true)
    }

    /// Keep entries at `index` and after. Returns how many were removed.
    pub(crate) fn remove_before(&mut self, index: usize) -> MemoryResult<usize> {
        self.check()?;
        if index == 0 || index >= self.count {
            return Ok(0);
        }
        let size = self.entry_size;
        self.write(|bytes| bytes.copy_within(index * size.., 0))?;
        self.count -= index;
        sub_trace!(LIST, pool = %self.pool.id(), removed = index, count = self.count, "head removed");
        Ok(index)
    }

    /// Keep entries up to and including `index`. Returns how many were removed.
    pub(crate) fn remove_after(&mut self, index: usize) -> MemoryResult<usize> {
        self.check()?;
        if index >= self.count {
            return Ok(0);
        }
        let removed = self.count - (index + 1);
        self.count = index + 1;
        sub_trace!(LIST, pool = %self.pool.id(), removed, count = self.count, "tail removed");
        Ok(removed)
    }

    // ------------------------------------------------------------------------
    // Queue / stack
    // ------------------------------------------------------------------------

    fn require_queue(&mut self, op: &str) -> MemoryResult<()> {
        self.check()?;
        if self.kind == ListKind::Plain {
            return Err(MemoryError::invalid_operation(&LIST, &format!(
                "{op} requires a FIFO or stack list"
            )));
        }
        Ok(())
    }

    pub(crate) fn push<T: Pod>(&mut self, value: T) -> MemoryResult<()> {
        self.require_queue("push")?;
        self.new_entry(|entry: &mut T| *entry = value).map(drop)
    }

    pub(crate) fn pop<T: Pod>(&mut self) -> MemoryResult<Option<T>> {
        self.require_queue("pop")?;
        if self.count == 0 {
            return Ok(None);
        }
        let size = self.entry_size;
        let index = match self.kind {
            ListKind::Fifo => 0,
            _ => self.count - 1,
        };
        let fifo = self.kind == ListKind::Fifo;
        let value = self.write(|bytes| {
            let value: T = bytemuck::pod_read_unaligned(&bytes[index * size..(index + 1) * size]);
            if fifo {
                bytes.copy_within(size.., 0);
            }
            value
        })?;
        self.count -= 1;
        sub_trace!(LIST, pool = %self.pool.id(), index, count = self.count, "entry popped");
        Ok(Some(value))
    }

    // ------------------------------------------------------------------------
    // Sorting
    // ------------------------------------------------------------------------

    pub(crate) fn set_sort_key(&mut self, spec: SortSpec) -> MemoryResult<()> {
        self.check()?;
        spec.validate(self.entry_size)?;
        self.sort_key = Some(spec);
        Ok(())
    }

    pub(crate) fn sort_key(&self) -> Option<SortSpec> {
        self.sort_key
    }

    pub(crate) fn sort(&mut self) -> MemoryResult<()> {
        self.check()?;
        let Some(spec) = self.sort_key else {
            return Err(MemoryError::invalid_config(&LIST, "list has no sort key"));
        };
        let size = self.entry_size;
        self.write(|bytes| sort::sort_bytes(bytes, size, spec))?
    }

    pub(crate) fn sort_by_field<T: Pod, K: SortField>(
        &mut self,
        key: impl Fn(&T) -> K,
    ) -> MemoryResult<()> {
        self.entries_mut(|entries: &mut [T]| {
            if entries.len() <= 1 {
                return;
            }
            let mut records: Vec<SortRecord> = entries
                .iter()
                .enumerate()
                .map(|(index, entry)| SortRecord {
                    index,
                    value: key(entry).sort_value(),
                })
                .collect();
            sort::merge_sort(&mut records);
            let sorted: Vec<T> = records.iter().map(|r| entries[r.index]).collect();
            entries.copy_from_slice(&sorted);
            sub_trace!(LIST, entries = entries.len(), "entries sorted by field");
        })
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    pub(crate) fn destroy(&mut self) {
        if self.freed {
            return;
        }
        self.pool.free();
        self.mark_freed();
        sub_debug!(LIST, pool = %self.pool.id(), "list destroyed");
    }

    /// Independent copy on a fresh subpool of `parent`
    pub(crate) fn copy_to(&mut self, parent: &Pool, align: usize) -> MemoryResult<Self> {
        self.check()?;
        let config = ListConfig {
            kind: self.kind,
            step: Some(self.step),
        };
        let mut copy = Self::new(parent, self.entry_size, align, config)?;
        copy.sort_key = self.sort_key;

        if self.count > 0 {
            let contents = self.read(<[u8]>::to_vec);
            if let Err(e) = copy.adopt(&contents, self.capacity, self.count) {
                copy.destroy();
                return Err(e);
            }
        }
        sub_debug!(LIST, source = %self.pool.id(), copy = %copy.pool.id(), count = copy.count, "list copied");
        Ok(copy)
    }

    /// Take over `contents` as the first `count` entries of a fresh buffer
    fn adopt(&mut self, contents: &[u8], capacity: usize, count: usize) -> MemoryResult<()> {
        let bytes = capacity
            .checked_mul(self.entry_size)
            .ok_or_else(|| MemoryError::size_overflow(&LIST, "list buffer"))?;
        let buffer = self.pool.allocate(bytes)?;
        self.pool
            .with_bytes_mut(buffer, |dst| dst[..contents.len()].copy_from_slice(contents))?;
        self.buffer = Some(buffer);
        self.capacity = capacity;
        self.count = count;
        Ok(())
    }
}
