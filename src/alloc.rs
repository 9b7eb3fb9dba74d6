//! Allocator contract plus a reference bump/free-list implementation
//! over a `Region`.
//!
//! The real collaborator here is a slab/extent allocator with per-CPU
//! write-combining lists; that is explicitly out of scope for this
//! crate. This reference implementation is deliberately simple: a bump
//! cursor for fresh extents, backed by a handful of lazily-claimed
//! intrusive free-list stacks keyed by exact block size, so repeated
//! requests for the same size (an index node, a bucket, one of
//! `dcache`'s size classes) recycle freed blocks instead of exhausting
//! the region.

use std::convert::TryFrom;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use crate::offset::MINDREC;
use crate::region::Region;

/// Per-worker allocation state: single-writer, read only by its own
/// worker.
#[derive(Default)]
pub struct WorkerAlloc {
    last_offset: Option<u32>,
    last_size: usize,
}

/// The allocator contract the core calls into. Implemented here by
/// [`SlabAllocator`]; a persistence-aware implementation would satisfy
/// the same trait without the core needing to change.
pub trait Allocator: Send + Sync {
    /// Return an aligned block of exactly `size` bytes.
    fn alloc_fix(&self, size: usize, worker: &mut WorkerAlloc) -> Option<u32>;

    /// Return a payload region of at least `*len + overhead` bytes,
    /// updating `*len` to the size actually granted.
    fn alloc_data(&self, overhead: usize, len: &mut usize, worker: &mut WorkerAlloc) -> Option<u32>;

    /// Undo the most recent `alloc_fix`/`alloc_data` made by `worker`,
    /// if the bump cursor has not moved past it since.
    fn alloc_rollback(&self, worker: &mut WorkerAlloc);

    /// Return a block of `size` bytes to the allocator for reuse.
    fn free_blk(&self, offset: u32, size: usize);
}

const NIL: u32 = u32::MAX;

/// Up to this many distinct block sizes get a recycling free-list; a
/// store only ever requests a handful (one index-node size, one bucket
/// size, `dcache`'s four classes), so this comfortably covers it.
const FREE_CLASSES: usize = 8;

struct FreeClass {
    /// 0 means unclaimed; any other value is the size this slot recycles.
    size: AtomicUsize,
    head: AtomicU32,
}

/// Bump-and-recycle allocator over a fixed `Region`.
///
/// `base` is the first byte past the header and root index (those are
/// laid out by `store::HTrie::open`, not by this allocator).
pub struct SlabAllocator<'r> {
    region: &'r Region,
    cursor: AtomicUsize,
    free_classes: [FreeClass; FREE_CLASSES],
}

impl<'r> SlabAllocator<'r> {
    pub fn new(region: &'r Region, base: u32) -> SlabAllocator<'r> {
        SlabAllocator {
            region,
            cursor: AtomicUsize::new(base as usize),
            free_classes: [
                FreeClass::empty(),
                FreeClass::empty(),
                FreeClass::empty(),
                FreeClass::empty(),
                FreeClass::empty(),
                FreeClass::empty(),
                FreeClass::empty(),
                FreeClass::empty(),
            ],
        }
    }

    /// Find the free-list slot for `size`, claiming an unused one if
    /// none matches yet. Returns `None` if every slot is claimed by a
    /// different size (the store only ever uses a handful of sizes, so
    /// this is not expected in practice).
    fn class_for(&self, size: usize) -> Option<&FreeClass> {
        for class in self.free_classes.iter() {
            let current = class.size.load(Ordering::Acquire);
            if current == size {
                return Some(class);
            }
            if current == 0
                && class
                    .size
                    .compare_exchange(0, size, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
            {
                return Some(class);
            }
        }
        None
    }

    fn pop_free(&self, size: usize) -> Option<u32> {
        let class = self.class_for(size)?;
        loop {
            let head = class.head.load(Ordering::Acquire);
            if head == NIL {
                return None;
            }
            let next = self.region.u32_at(head).load(Ordering::Relaxed);
            if class
                .head
                .compare_exchange_weak(head, next, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                return Some(head);
            }
        }
    }

    fn push_free(&self, size: usize, offset: u32) {
        let class = match self.class_for(size) {
            Some(class) => class,
            None => {
                log::debug!("free_blk: no free-list slot for size {}, abandoning", size);
                return;
            }
        };
        loop {
            let head = class.head.load(Ordering::Acquire);
            self.region.u32_at(offset).store(head, Ordering::Relaxed);
            if class
                .head
                .compare_exchange_weak(head, offset, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                return;
            }
        }
    }

    fn bump(&self, size: usize) -> Option<u32> {
        let mut cur = self.cursor.load(Ordering::Relaxed);
        loop {
            let aligned = align_up(cur, size.min(MINDREC).max(4));
            let next = aligned + size;
            if next > self.region.len() {
                return None;
            }
            match self.cursor.compare_exchange_weak(cur, next, Ordering::Relaxed, Ordering::Relaxed) {
                Ok(_) => return u32::try_from(aligned).ok(),
                Err(observed) => cur = observed,
            }
        }
    }

    fn alloc_exact(&self, size: usize, worker: &mut WorkerAlloc) -> Option<u32> {
        let offset = self.pop_free(size).or_else(|| self.bump(size))?;
        worker.last_offset = Some(offset);
        worker.last_size = size;
        Some(offset)
    }
}

impl FreeClass {
    fn empty() -> FreeClass {
        FreeClass {
            size: AtomicUsize::new(0),
            head: AtomicU32::new(NIL),
        }
    }
}

fn align_up(value: usize, align: usize) -> usize {
    (value + align - 1) / align * align
}

impl<'r> Allocator for SlabAllocator<'r> {
    fn alloc_fix(&self, size: usize, worker: &mut WorkerAlloc) -> Option<u32> {
        self.alloc_exact(size, worker)
    }

    fn alloc_data(&self, overhead: usize, len: &mut usize, worker: &mut WorkerAlloc) -> Option<u32> {
        let needed = overhead + *len;
        let offset = self.alloc_exact(needed, worker)?;
        Some(offset)
    }

    fn alloc_rollback(&self, worker: &mut WorkerAlloc) {
        if let Some(offset) = worker.last_offset.take() {
            let size = worker.last_size;
            let expect = offset as usize + size;
            let _ =
                self.cursor
                    .compare_exchange(expect, offset as usize, Ordering::Relaxed, Ordering::Relaxed);
            log::debug!("alloc_rollback offset={} size={}", offset, size);
        }
    }

    fn free_blk(&self, offset: u32, size: usize) {
        self.push_free(size, offset);
    }
}

#[cfg(test)]
#[path = "alloc_test.rs"]
mod alloc_test;
