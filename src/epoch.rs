//! Generation / epoch protocol: quiescent-state reclamation with no
//! per-reader atomic cost beyond one relaxed-ish store on entry and
//! exit.
//!
//! The retry/spin-wait shape (CAS loop, `thread::yield_now` between
//! attempts) is the familiar "spin with periodic yield" idiom from a
//! spinlock's write-acquire loop, adapted here to a quiescent-state
//! protocol rather than a latch.

use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use crossbeam_utils::CachePadded;

/// Sentinel published by an idle worker: "not inside a critical section".
pub const IDLE: u64 = u64::MAX;

/// Global generation counter plus one published-epoch slot per worker.
pub struct EpochTable {
    generation: AtomicU64,
    slots: Box<[CachePadded<AtomicU64>]>,
}

impl EpochTable {
    pub fn new(workers: usize) -> EpochTable {
        let slots = (0..workers)
            .map(|_| CachePadded::new(AtomicU64::new(IDLE)))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        EpochTable {
            generation: AtomicU64::new(0),
            slots,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.slots.len()
    }

    /// Publish the current global generation to `worker`'s slot. Call
    /// before any read or write operation.
    pub fn observe(&self, worker: usize) -> u64 {
        let gen = self.generation.load(Ordering::Acquire);
        self.slots[worker].store(gen, Ordering::Release);
        gen
    }

    /// Mark `worker` idle. Call at the end of every operation.
    pub fn free_generation(&self, worker: usize) {
        self.slots[worker].store(IDLE, Ordering::Release);
    }

    /// Atomically bump the global generation and return the new value.
    pub fn advance(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Spin until every worker's published epoch exceeds `target`
    /// (idle workers, published as `IDLE`, always satisfy this).
    pub fn synchronize(&self, target: u64) {
        for slot in self.slots.iter() {
            let mut spins = 0u32;
            while slot.load(Ordering::Acquire) <= target {
                spins += 1;
                if spins % 64 == 0 {
                    thread::yield_now();
                } else {
                    std::hint::spin_loop();
                }
            }
        }
    }

    /// Advance the generation and wait for all workers to move past
    /// it; the combination `remove` needs before it can safely reclaim
    /// a retired bucket or payload.
    pub fn synchronize_advance(&self) {
        let target = self.advance();
        self.synchronize(target);
    }
}

#[cfg(test)]
#[path = "epoch_test.rs"]
mod epoch_test;
