//! Index node: a fixed-fanout array of child `Shift` slots living
//! inside the backing `Region`, written only via CAS on one slot at a
//! time.
//!
//! The root node is the same layout, just wider: fanout `1 << root_bits`
//! instead of the fixed `FANOUT = 16` of every other node. Both are
//! modeled as a view over region bytes rather than an owned Rust
//! struct, since node identity *is* a byte offset — an arena, not
//! language-level pointers.

use crate::offset::{Shift, CACHE_LINE, FANOUT};
use crate::region::Region;

/// A read/write view of an index node's children, located at
/// `offset` bytes into `region`. `fanout` is `FANOUT` for every
/// non-root node and `1 << root_bits` for the root.
#[derive(Clone, Copy)]
pub struct NodeView<'r> {
    region: &'r Region,
    offset: u32,
    fanout: usize,
}

impl<'r> NodeView<'r> {
    pub fn new(region: &'r Region, offset: u32, fanout: usize) -> NodeView<'r> {
        NodeView {
            region,
            offset,
            fanout,
        }
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn fanout(&self) -> usize {
        self.fanout
    }

    fn slot_offset(&self, i: usize) -> u32 {
        debug_assert!(i < self.fanout, "child index out of fanout range");
        self.offset + (i * 4) as u32
    }

    /// Load child `i`.
    pub fn get(&self, i: usize) -> Shift {
        Shift::from_raw(
            self.region
                .u32_at(self.slot_offset(i))
                .load(std::sync::atomic::Ordering::Acquire),
        )
    }

    /// CAS child `i` from `old` to `new`. Returns the racing value on failure.
    pub fn compare_exchange(&self, i: usize, old: Shift, new: Shift) -> Result<(), Shift> {
        self.region
            .u32_at(self.slot_offset(i))
            .compare_exchange(
                old.raw(),
                new.raw(),
                std::sync::atomic::Ordering::AcqRel,
                std::sync::atomic::Ordering::Acquire,
            )
            .map(|_| ())
            .map_err(Shift::from_raw)
    }

    /// Unconditional store to child `i`. Safety/soundness is the
    /// caller's responsibility: only sound before this node is
    /// published to any index slot another worker might read (fresh
    /// allocation during burst), matching the exclusivity discipline
    /// `BucketView::slot_bytes_mut` documents for pre-publish writes.
    pub fn set_raw(&self, i: usize, shift: Shift) {
        self.region
            .u32_at(self.slot_offset(i))
            .store(shift.raw(), std::sync::atomic::Ordering::Release);
    }

    /// Zero every child slot. Caller owns this node exclusively (fresh
    /// allocation, not yet published).
    pub fn zero_init(&self) {
        for i in 0..self.fanout {
            self.set_raw(i, Shift::EMPTY);
        }
    }

    /// Iterate non-empty children, for `walk`.
    pub fn children(&self) -> impl Iterator<Item = (usize, Shift)> + '_ {
        (0..self.fanout).filter_map(move |i| {
            let s = self.get(i);
            if s.is_empty() {
                None
            } else {
                Some((i, s))
            }
        })
    }
}

/// Byte size of a node with the given fanout; `FANOUT`-wide nodes are
/// exactly one cache line.
pub fn node_size(fanout: usize) -> usize {
    fanout * 4
}

/// Invariant check used by tests and `open`: a non-root node must be
/// exactly one cache line.
pub fn is_cacheline_sized(fanout: usize) -> bool {
    node_size(fanout) == CACHE_LINE && fanout == FANOUT
}

#[cfg(test)]
#[path = "node_test.rs"]
mod node_test;
