//! Per-worker mutable state: allocation watermarks and a retired-bucket
//! free queue, both single-writer — touched only by the worker that
//! owns them. The epoch slot itself lives in `EpochTable`, read by
//! every other worker, which is why it is not duplicated here.

use crate::alloc::WorkerAlloc;
use crate::bucket::BucketView;

const NIL: u32 = u32::MAX;

/// One caller thread's handle into the store. Callers construct one
/// `Worker` per thread (or per task, if tasks never migrate threads
/// mid-operation) and pass it to every `HTrie` method; the `id` indexes
/// that thread's slot in the store's `EpochTable`.
pub struct Worker {
    id: usize,
    pub(crate) alloc: WorkerAlloc,
    /// Head of this worker's retired-bucket stack — the per-worker
    /// reclamation queue. `NIL` when empty. Buckets are linked through
    /// their own `next` field, which is otherwise only meaningful while
    /// a bucket is live as the `col_map`/slot area's owner considers it
    /// retired.
    free_head: u32,
}

impl Worker {
    pub fn new(id: usize) -> Worker {
        Worker {
            id,
            alloc: WorkerAlloc::default(),
            free_head: NIL,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Pop a previously-retired bucket for reuse, if this worker has one
    /// queued. Caller must still re-initialize the bucket's header
    /// (`col_map = 0`) before publishing it.
    pub(crate) fn pop_free_bucket(&mut self, region: &crate::region::Region, layout: crate::bucket::BucketLayout) -> Option<u32> {
        if self.free_head == NIL {
            return None;
        }
        let offset = self.free_head;
        let view = BucketView::new(region, offset, layout);
        self.free_head = view.next();
        Some(offset)
    }

    /// Push a retired bucket onto this worker's free stack. Caller must
    /// have already epoch-synchronized so no reader can still be
    /// dereferencing `offset`.
    pub(crate) fn push_free_bucket(&mut self, region: &crate::region::Region, layout: crate::bucket::BucketLayout, offset: u32) {
        let view = BucketView::new(region, offset, layout);
        view.set_next(self.free_head);
        self.free_head = offset;
    }
}

#[cfg(test)]
#[path = "worker_test.rs"]
mod worker_test;
