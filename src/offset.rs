//! Offset space: the mapping between a byte offset inside the backing
//! region and the typed, tagged 32-bit "shift" values stored in index
//! node slots.
//!
//! Two granularities are in play. Index nodes are addressed at
//! cache-line granularity; buckets and data payloads are addressed at
//! twice that (`MINDREC`). A shift's high bit tells which kind of
//! child it names; the remaining 31 bits are a unit count in the
//! granularity implied by that bit.

use std::convert::TryFrom;

/// Machine word width the descent algorithm consumes key bits from.
pub const WORD_BITS: u32 = 64;

/// Index-node fanout: 16 children, one 32-bit shift apiece, one cache line.
pub const FANOUT: usize = 16;

/// Bits of key consumed per trie level.
pub const LEVEL_BITS: u32 = 4;

/// Cache line size in bytes; the index-granularity unit.
pub const CACHE_LINE: usize = 64;

/// Data granularity: buckets and data payloads are addressed in units
/// of `MINDREC` bytes (twice a cache line).
pub const MINDREC: usize = 2 * CACHE_LINE;

/// High bit of a shift: set means the child is a bucket (data);
/// clear means index-node-or-empty.
pub const DATA_BIT: u32 = 0x8000_0000;

/// Remaining 31 bits of a shift: the unit count.
const UNIT_MASK: u32 = 0x7FFF_FFFF;

/// A tagged, granularity-scaled child reference as stored in an index
/// node slot. `0` is the empty sentinel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Shift(u32);

impl Shift {
    /// The empty-slot sentinel.
    pub const EMPTY: Shift = Shift(0);

    /// Build the raw `u32` representation, for storing into an `AtomicU32` slot.
    pub fn raw(self) -> u32 {
        self.0
    }

    /// Reconstruct a `Shift` from a value loaded out of an `AtomicU32` slot.
    pub fn from_raw(raw: u32) -> Shift {
        Shift(raw)
    }

    /// A shift naming a bucket at data-granularity unit `units`.
    pub fn data(units: u32) -> Shift {
        debug_assert_eq!(units & DATA_BIT, 0, "unit count overflowed 31 bits");
        Shift(units | DATA_BIT)
    }

    /// A shift naming an index node at cache-line-granularity unit `units`.
    pub fn index(units: u32) -> Shift {
        debug_assert_eq!(units & DATA_BIT, 0, "unit count overflowed 31 bits");
        Shift(units)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn is_data(self) -> bool {
        self.0 & DATA_BIT != 0
    }

    /// The unit count with the tag bit stripped.
    pub fn units(self) -> u32 {
        self.0 & UNIT_MASK
    }

    /// Byte offset of a data (bucket) shift into the backing region.
    pub fn data_offset(self) -> u32 {
        debug_assert!(self.is_data());
        self.units() * MINDREC as u32
    }

    /// Byte offset of an index-node shift into the backing region.
    pub fn index_offset(self) -> u32 {
        debug_assert!(!self.is_data() && !self.is_empty());
        self.units() * CACHE_LINE as u32
    }
}

/// Encode a byte offset as a data-granularity shift. Returns `None` if
/// the offset is not `MINDREC`-aligned or exceeds the 31-bit unit budget.
pub fn encode_data_offset(byte_offset: usize) -> Option<Shift> {
    if byte_offset % MINDREC != 0 {
        return None;
    }
    let units = u32::try_from(byte_offset / MINDREC).ok()?;
    if units & DATA_BIT != 0 {
        return None;
    }
    Some(Shift::data(units))
}

/// Encode a byte offset as an index-granularity shift.
pub fn encode_index_offset(byte_offset: usize) -> Option<Shift> {
    if byte_offset % CACHE_LINE != 0 {
        return None;
    }
    let units = u32::try_from(byte_offset / CACHE_LINE).ok()?;
    if units & DATA_BIT != 0 {
        return None;
    }
    Some(Shift::index(units))
}

/// Slice out the 4-bit branch selector for level starting at bit `bits`.
pub fn branch(key: u64, bits: u32) -> usize {
    ((key >> bits) & 0xF) as usize
}

#[cfg(test)]
#[path = "offset_test.rs"]
mod offset_test;
