//! Bucket: the trie's leaf node. A header (`col_map` occupancy bitmap
//! plus a `next` free-list link) followed by a fixed number of
//! fixed-size slots.
//!
//! `col_map` bit `b` (1-indexed, `1 <= b <= COLL_MAX`) marks slot
//! `COLL_MAX - b` occupied. Physical storage backs only `BUCKET_SLOTS =
//! COLL_MAX - BURST_MIN_BITS` of those bit positions — the top
//! `BURST_MIN_BITS` bits (`b` in `1..=BURST_MIN_BITS`) have no slot
//! behind them at all. A free-bit scan only ever looks at the backed
//! range, so exhausting it *is* "signal full — must burst": there is
//! nowhere left to record a slot even though the word still has unset
//! bits above the backed range.

use std::sync::atomic::Ordering;

use crate::region::Region;

/// Highest bit position used in `col_map`. Strictly less than 64 (the
/// machine word width).
pub const COLL_MAX: u32 = 60;

/// Bit positions `1..=BURST_MIN_BITS` have no backing slot; once the
/// real slot range is exhausted, these are the only bits left to try,
/// which is exactly the burst trigger.
pub const BURST_MIN_BITS: u32 = 4;

/// Number of physically addressable slots per bucket.
pub const BUCKET_SLOTS: usize = (COLL_MAX - BURST_MIN_BITS) as usize;

/// `col_map` (8 bytes) + `next` (4 bytes), padded to 16 for slot alignment.
pub const HEADER_SIZE: usize = 16;

const NEXT_OFFSET: u32 = 8;

/// Bit mask for physical slot `idx` (`0 <= idx < BUCKET_SLOTS`).
fn slot_mask(idx: usize) -> u64 {
    debug_assert!(idx < BUCKET_SLOTS);
    let b = COLL_MAX - idx as u32; // b in BURST_MIN_BITS+1 ..= COLL_MAX
    1u64 << (b - 1)
}

/// Scan the backed slot range of `map` for the first clear bit.
/// Returns `None` if every real slot is occupied — the bucket must burst.
pub fn find_free_slot(map: u64) -> Option<usize> {
    (0..BUCKET_SLOTS).find(|&idx| map & slot_mask(idx) == 0)
}

pub fn is_occupied(map: u64, idx: usize) -> bool {
    map & slot_mask(idx) != 0
}

/// Public accessor for physical slot `idx`'s `col_map` bit, needed by
/// burst/remove to build a fresh `new_map` from a set of retained indices.
pub fn slot_bit(idx: usize) -> u64 {
    slot_mask(idx)
}

/// Byte layout of a bucket's slots, parameterized by the store's record mode.
#[derive(Clone, Copy)]
pub struct BucketLayout {
    pub slot_size: usize,
}

impl BucketLayout {
    pub fn bucket_size(&self) -> usize {
        HEADER_SIZE + BUCKET_SLOTS * self.slot_size
    }
}

/// A view of one bucket's header and slots at `offset` in `region`.
#[derive(Clone, Copy)]
pub struct BucketView<'r> {
    region: &'r Region,
    offset: u32,
    layout: BucketLayout,
}

impl<'r> BucketView<'r> {
    pub fn new(region: &'r Region, offset: u32, layout: BucketLayout) -> BucketView<'r> {
        BucketView {
            region,
            offset,
            layout,
        }
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Zero the header of a freshly allocated bucket. Caller guarantees
    /// exclusivity (not yet published to any index slot).
    pub fn init(&self) {
        self.region.u64_at(self.offset).store(0, Ordering::Relaxed);
        self.region
            .u32_at(self.offset + NEXT_OFFSET)
            .store(0, Ordering::Relaxed);
    }

    pub fn col_map(&self) -> u64 {
        self.region.u64_at(self.offset).load(Ordering::Acquire)
    }

    pub fn compare_exchange_col_map(&self, old: u64, new: u64) -> Result<u64, u64> {
        self.region.u64_at(self.offset).compare_exchange(
            old,
            new,
            Ordering::AcqRel,
            Ordering::Acquire,
        )
    }

    /// Atomically set `idx`'s bit. Returns the map value *before* the set;
    /// if that already had the bit set, the caller lost a race and must
    /// retry with a different candidate slot.
    pub fn fetch_set_slot(&self, idx: usize) -> u64 {
        self.region
            .u64_at(self.offset)
            .fetch_or(slot_mask(idx), Ordering::AcqRel)
    }

    /// Free-list link, valid only while this bucket is retired and
    /// owned exclusively by one worker's reclamation queue.
    pub fn next(&self) -> u32 {
        self.region
            .u32_at(self.offset + NEXT_OFFSET)
            .load(Ordering::Relaxed)
    }

    pub fn set_next(&self, next: u32) {
        self.region
            .u32_at(self.offset + NEXT_OFFSET)
            .store(next, Ordering::Relaxed);
    }

    fn slot_offset(&self, idx: usize) -> u32 {
        self.offset + HEADER_SIZE as u32 + (idx * self.layout.slot_size) as u32
    }

    pub fn slot_bytes(&self, idx: usize) -> &[u8] {
        self.region.bytes_at(self.slot_offset(idx), self.layout.slot_size)
    }

    /// Write a slot body before its occupancy bit is published.
    ///
    /// Safety: only sound for a slot this call is the sole writer of —
    /// true for a fresh empty slot, and for the re-write-after-bit-win
    /// step in insert, never for a slot another reader may already
    /// treat as live.
    pub unsafe fn slot_bytes_mut(&self, idx: usize) -> &mut [u8] {
        self.region.bytes_at_mut(self.slot_offset(idx), self.layout.slot_size)
    }

    /// Occupied slot indices in `map`, in ascending order — the order
    /// `bscan_for_rec` and `walk` iterate a bucket's collision chain.
    pub fn occupied(&self, map: u64) -> impl Iterator<Item = usize> + '_ {
        (0..BUCKET_SLOTS).filter(move |&idx| is_occupied(map, idx))
    }
}

#[cfg(test)]
#[path = "bucket_test.rs"]
mod bucket_test;
