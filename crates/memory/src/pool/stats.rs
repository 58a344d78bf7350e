//! Pool statistics

use std::fmt;

use super::node::NodeInner;

/// Snapshot of what a pool (or subtree) holds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Pools covered by this snapshot
    pub pools: usize,
    /// Live tracked blocks
    pub allocations: usize,
    /// Bytes held by live blocks
    pub bytes: usize,
    /// Tracking-table slots, vacated ones included
    pub tracked_slots: usize,
    /// Direct children (subtree snapshots sum every node's children)
    pub children: usize,
}

impl PoolStats {
    pub(crate) fn from_node(inner: &NodeInner) -> Self {
        let (allocations, bytes) = inner
            .live()
            .fold((0, 0), |(count, total), (_, len)| (count + 1, total + len));
        Self {
            pools: 1,
            allocations,
            bytes,
            tracked_slots: inner.records.len(),
            children: inner.children.len(),
        }
    }

    /// Add another snapshot into this one
    pub fn absorb(&mut self, other: &Self) {
        self.pools += other.pools;
        self.allocations += other.allocations;
        self.bytes += other.bytes;
        self.tracked_slots += other.tracked_slots;
        self.children += other.children;
    }

    /// Fraction of tracking slots holding a live block
    pub fn slot_utilization(&self) -> f64 {
        if self.tracked_slots == 0 {
            return 0.0;
        }
        self.allocations as f64 / self.tracked_slots as f64
    }
}

impl fmt::Display for PoolStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} pool(s), {} block(s), {} byte(s), {} child link(s)",
            self.pools, self.allocations, self.bytes, self.children
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absorb_sums_fields() {
        let mut a = PoolStats {
            pools: 1,
            allocations: 2,
            bytes: 64,
            tracked_slots: 4,
            children: 1,
        };
        a.absorb(&PoolStats {
            pools: 1,
            allocations: 1,
            bytes: 16,
            tracked_slots: 1,
            children: 0,
        });
        assert_eq!(a.pools, 2);
        assert_eq!(a.allocations, 3);
        assert_eq!(a.bytes, 80);
        assert_eq!(a.tracked_slots, 5);
    }

    #[test]
    fn test_slot_utilization() {
        assert_eq!(PoolStats::default().slot_utilization(), 0.0);
        let stats = PoolStats {
            allocations: 1,
            tracked_slots: 4,
            ..PoolStats::default()
        };
        assert!((stats.slot_utilization() - 0.25).abs() < f64::EPSILON);
    }
}
