//! Data-chunk cache: size-classed lock-free LIFO stacks in front of
//! the allocator, so the common case of freeing and re-allocating a
//! similarly-sized varlen chunk or indirect payload never touches the
//! allocator at all.
//!
//! Size classes are `{256, 512, 1024, 2048}`, each double the last;
//! there is no class below 256 bytes, so anything smaller still costs
//! one stack's worth of internal fragmentation, and nothing between
//! consecutive classes, so worst-case fragmentation within a class is
//! bounded at 2x a chunk's actual size. Kept exactly this sparse rather
//! than densified with intermediate classes. One additional shared
//! stack caches fixed-size records (inplace/indirect mode, `rec_len`
//! bytes).

use std::sync::atomic::{AtomicU32, Ordering};

use crate::alloc::{Allocator, WorkerAlloc};
use crate::region::Region;

/// The size classes, in the sparse order documented above.
pub const SIZE_CLASSES: [usize; 4] = [256, 512, 1024, 2048];

const NIL: u32 = u32::MAX;

struct Stack(AtomicU32);

impl Stack {
    fn new() -> Stack {
        Stack(AtomicU32::new(NIL))
    }

    fn pop(&self, region: &Region) -> Option<u32> {
        loop {
            let head = self.0.load(Ordering::Acquire);
            if head == NIL {
                return None;
            }
            let next = region.u32_at(head).load(Ordering::Relaxed);
            if self
                .0
                .compare_exchange_weak(head, next, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                return Some(head);
            }
        }
    }

    fn push(&self, region: &Region, offset: u32) {
        loop {
            let head = self.0.load(Ordering::Acquire);
            region.u32_at(offset).store(head, Ordering::Relaxed);
            if self
                .0
                .compare_exchange_weak(head, offset, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                return;
            }
        }
    }
}

/// Choose the smallest size class that fits `len`, if any.
pub fn class_for_len(len: usize) -> Option<usize> {
    SIZE_CLASSES.iter().copied().find(|&c| c >= len)
}

/// Size-classed free-list array plus the one shared fixed-record stack.
pub struct DataCache {
    classes: [Stack; SIZE_CLASSES.len()],
    fixed: Stack,
}

impl DataCache {
    pub fn new() -> DataCache {
        DataCache {
            classes: [Stack::new(), Stack::new(), Stack::new(), Stack::new()],
            fixed: Stack::new(),
        }
    }

    /// Allocate a varlen/indirect payload of at least `len` bytes.
    /// Consults the matching size-class stack first; on miss, falls
    /// through to the allocator. Payloads at or above the largest
    /// class bypass the cache entirely and go straight to the
    /// allocator.
    pub fn alloc_data(
        &self,
        region: &Region,
        allocator: &dyn Allocator,
        overhead: usize,
        len: &mut usize,
        worker: &mut WorkerAlloc,
    ) -> Option<u32> {
        match class_for_len(*len) {
            Some(class_size) => {
                let idx = SIZE_CLASSES.iter().position(|&c| c == class_size).unwrap();
                if let Some(offset) = self.classes[idx].pop(region) {
                    *len = class_size;
                    return Some(offset);
                }
                let mut granted = class_size;
                let offset = allocator.alloc_data(overhead, &mut granted, worker)?;
                *len = class_size;
                Some(offset)
            }
            None => allocator.alloc_data(overhead, len, worker),
        }
    }

    /// Allocate a fixed-size record payload (indirect mode), consulting
    /// the shared fixed-record stack before the allocator.
    pub fn alloc_fixed(
        &self,
        region: &Region,
        allocator: &dyn Allocator,
        rec_len: usize,
        worker: &mut WorkerAlloc,
    ) -> Option<u32> {
        self.fixed
            .pop(region)
            .or_else(|| allocator.alloc_fix(rec_len, worker))
    }

    /// Free `offset` (of logical size `len`) back to the matching
    /// stack, or straight to the allocator if `len` bypasses the cache.
    pub fn free_data(&self, region: &Region, allocator: &dyn Allocator, offset: u32, len: usize) {
        match class_for_len(len) {
            Some(class_size) => {
                let idx = SIZE_CLASSES.iter().position(|&c| c == class_size).unwrap();
                self.classes[idx].push(region, offset);
            }
            None => allocator.free_blk(offset, len),
        }
    }

    pub fn free_fixed(&self, region: &Region, offset: u32) {
        self.fixed.push(region, offset);
    }
}

impl Default for DataCache {
    fn default() -> DataCache {
        DataCache::new()
    }
}

#[cfg(test)]
#[path = "dcache_test.rs"]
mod dcache_test;
