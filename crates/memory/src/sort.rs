//! Merge sort over a numeric field of fixed-size entries
//!
//! Entries are opaque byte strings. A [`SortSpec`] says where the key lives
//! (`offset`) and how to read it ([`SortKind`]); each entry's key is read
//! once into a [`SortRecord`], the records are merge-sorted, and the entries
//! are written back in record order.
//!
//! Unsigned 64-bit keys compare as `u64`, every other integer kind as a
//! widened `i64`, and floating kinds as `f64`. Equal keys keep their original
//! order.

use strata_log::sub_trace;

use crate::error::{MemoryError, MemoryResult};
use crate::logging::LIST;

/// Numeric interpretation of a sort key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortKind {
    /// No key configured; sorting is refused
    #[default]
    Unset,
    F64,
    F32,
    U64,
    I64,
    U32,
    I32,
    U16,
    I16,
    U8,
    I8,
}

impl SortKind {
    /// Key width in bytes (zero for [`SortKind::Unset`])
    #[must_use]
    pub const fn width(self) -> usize {
        match self {
            Self::Unset => 0,
            Self::F64 | Self::U64 | Self::I64 => 8,
            Self::F32 | Self::U32 | Self::I32 => 4,
            Self::U16 | Self::I16 => 2,
            Self::U8 | Self::I8 => 1,
        }
    }

    /// Decode a native-endian key of exactly [`width`](Self::width) bytes
    #[must_use]
    pub fn read(self, bytes: &[u8]) -> Option<SortValue> {
        macro_rules! decode {
            ($ty:ty) => {
                <[u8; size_of::<$ty>()]>::try_from(bytes)
                    .ok()
                    .map(<$ty>::from_ne_bytes)
            };
        }

        match self {
            Self::Unset => None,
            Self::F64 => decode!(f64).map(SortValue::Float),
            Self::F32 => decode!(f32).map(|v| SortValue::Float(f64::from(v))),
            Self::U64 => decode!(u64).map(SortValue::Unsigned),
            Self::I64 => decode!(i64).map(SortValue::Signed),
            Self::U32 => decode!(u32).map(|v| SortValue::Signed(i64::from(v))),
            Self::I32 => decode!(i32).map(|v| SortValue::Signed(i64::from(v))),
            Self::U16 => decode!(u16).map(|v| SortValue::Signed(i64::from(v))),
            Self::I16 => decode!(i16).map(|v| SortValue::Signed(i64::from(v))),
            Self::U8 => decode!(u8).map(|v| SortValue::Signed(i64::from(v))),
            Self::I8 => decode!(i8).map(|v| SortValue::Signed(i64::from(v))),
        }
    }
}

/// A widened sort key
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SortValue {
    Float(f64),
    Signed(i64),
    Unsigned(u64),
}

impl SortValue {
    /// Strictly less than `other`
    #[must_use]
    pub fn precedes(self, other: Self) -> bool {
        match (self, other) {
            (Self::Float(a), Self::Float(b)) => a < b,
            (Self::Signed(a), Self::Signed(b)) => a < b,
            (Self::Unsigned(a), Self::Unsigned(b)) => a < b,
            (a, b) => a.as_f64() < b.as_f64(),
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Self::Float(v) => v,
            Self::Signed(v) => v as f64,
            Self::Unsigned(v) => v as f64,
        }
    }
}

/// Field types usable as sort keys with [`List::sort_by_field`](crate::list::List::sort_by_field)
pub trait SortField: Copy {
    /// Kind used when the key is read from raw bytes
    const KIND: SortKind;

    /// Widen to a comparable value
    fn sort_value(self) -> SortValue;
}

macro_rules! impl_sort_field {
    ($($ty:ty => $kind:ident, $variant:ident($wide:ty);)*) => {
        $(
            impl SortField for $ty {
                const KIND: SortKind = SortKind::$kind;

                fn sort_value(self) -> SortValue {
                    SortValue::$variant(<$wide>::from(self))
                }
            }
        )*
    };
}

impl_sort_field! {
    f64 => F64, Float(f64);
    f32 => F32, Float(f64);
    u64 => U64, Unsigned(u64);
    i64 => I64, Signed(i64);
    u32 => U32, Signed(i64);
    i32 => I32, Signed(i64);
    u16 => U16, Signed(i64);
    i16 => I16, Signed(i64);
    u8 => U8, Signed(i64);
    i8 => I8, Signed(i64);
}

/// Where a key lives inside an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SortSpec {
    /// Byte offset of the key within the entry
    pub offset: usize,
    /// How the key bytes are interpreted
    pub kind: SortKind,
}

impl SortSpec {
    #[must_use]
    pub const fn new(offset: usize, kind: SortKind) -> Self {
        Self { offset, kind }
    }

    /// Check the key fits inside entries of `entry_size` bytes
    pub fn validate(&self, entry_size: usize) -> MemoryResult<()> {
        if self.kind == SortKind::Unset {
            return Err(MemoryError::invalid_config(&LIST, "sort kind is unset"));
        }
        match self.offset.checked_add(self.kind.width()) {
            Some(end) if end <= entry_size => Ok(()),
            _ => Err(MemoryError::invalid_config(&LIST, &format!(
                "sort key at offset {} ({:?}) does not fit a {entry_size}-byte entry",
                self.offset, self.kind
            ))),
        }
    }

    /// Read the key out of one entry
    #[must_use]
    pub fn extract(&self, entry: &[u8]) -> Option<SortValue> {
        let end = self.offset.checked_add(self.kind.width())?;
        self.kind.read(entry.get(self.offset..end)?)
    }
}

/// One entry's position and key during a sort pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SortRecord {
    pub index: usize,
    pub value: SortValue,
}

/// Stable top-down merge sort by `value`
///
/// The left half takes the extra record on odd lengths, and on equal keys the
/// left head is taken first.
pub fn merge_sort(records: &mut [SortRecord]) {
    let len = records.len();
    if len <= 1 {
        return;
    }

    let mut halves = records.to_vec();
    let (left, right) = halves.split_at_mut(len.div_ceil(2));
    merge_sort(left);
    merge_sort(right);

    let (mut i, mut j) = (0, 0);
    for slot in records.iter_mut() {
        let take_right =
            i == left.len() || (j < right.len() && right[j].value.precedes(left[i].value));
        if take_right {
            *slot = right[j];
            j += 1;
        } else {
            *slot = left[i];
            i += 1;
        }
    }
}

/// Sort `entry_size`-byte entries packed in `bytes` by the key `spec` names
///
/// Fewer than two entries is a no-op. An unset kind, or a key that does not
/// fit the entry, is a configuration error and leaves `bytes` untouched.
pub fn sort_bytes(bytes: &mut [u8], entry_size: usize, spec: SortSpec) -> MemoryResult<()> {
    let count = bytes.len().checked_div(entry_size).unwrap_or(0);
    if count <= 1 {
        return Ok(());
    }
    spec.validate(entry_size)?;

    let mut records: Vec<SortRecord> = bytes
        .chunks_exact(entry_size)
        .enumerate()
        .filter_map(|(index, entry)| spec.extract(entry).map(|value| SortRecord { index, value }))
        .collect();
    merge_sort(&mut records);
    apply_order(bytes, entry_size, &records);

    sub_trace!(LIST, entries = count, offset = spec.offset, kind = ?spec.kind, "entries sorted");
    Ok(())
}

/// Rewrite `bytes` so entry `k` is the entry `records[k].index` used to be
pub(crate) fn apply_order(bytes: &mut [u8], entry_size: usize, records: &[SortRecord]) {
    let mut sorted = Vec::with_capacity(records.len() * entry_size);
    for record in records {
        let start = record.index * entry_size;
        sorted.extend_from_slice(&bytes[start..start + entry_size]);
    }
    bytes[..sorted.len()].copy_from_slice(&sorted);
}
