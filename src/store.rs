//! `HTrie`: the burst hash trie engine itself — descent, insert, burst,
//! remove, lookup/`bscan_for_rec`/`walk`, wired together with the
//! generation protocol.
//!
//! A single struct owns every collaborator (region, allocator, data
//! cache, epoch table) and exposes CRUD-shaped methods that each
//! publish an epoch, do the work, and release it, the way a
//! spinlock-guarded method brackets an acquire/drop pair, just
//! epoch-based instead of latch-based.

use std::sync::atomic::Ordering;

use log::{debug, info, warn};

use crate::alloc::{Allocator, SlabAllocator};
use crate::bucket::{self, BucketLayout, BucketView};
use crate::config::Config;
use crate::epoch::EpochTable;
use crate::error::{Error, Result};
use crate::node::{self, NodeView};
use crate::offset::{self, Shift, CACHE_LINE, FANOUT, LEVEL_BITS, MINDREC, WORD_BITS};
use crate::record::{self, Mode, RecordLayout};
use crate::worker::Worker;
use crate::{dcache::DataCache, err_at};

const MAGIC: u32 = 0x4854_5249; // "HTRI", little-endian in the header's first word.
const HEADER_SIZE: u32 = CACHE_LINE as u32;
const FLAG_INPLACE: u32 = 0x1;
const FLAG_VARLEN: u32 = 0x2;

fn align_up(value: u32, align: u32) -> u32 {
    (value + align - 1) / align * align
}

/// A lookup/burst-distribution result naming the exact index-node slot
/// a writer must CAS: `(parent node, slot index)` plus the child found
/// there and the key-bit depth already consumed at that slot.
struct Descent {
    parent_offset: u32,
    parent_fanout: usize,
    index: usize,
    shift: Shift,
    bits: u32,
}

fn root_index(key: u64, root_bits: u32) -> usize {
    (key & ((1u64 << root_bits) - 1)) as usize
}

/// A stable reference to a leaf bucket returned by `lookup`. The epoch
/// that made it valid stays published until the caller calls
/// `HTrie::free_generation`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BucketHandle(u32);

impl BucketHandle {
    pub fn offset(self) -> u32 {
        self.0
    }
}

/// A freshly-inserted record's location, for callers that want to
/// revisit the exact slot without a full `lookup` + `bscan_for_rec`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordHandle {
    pub bucket: BucketHandle,
    pub slot: usize,
}

/// A record's key and body, reassembled by `bscan_for_rec`/`walk`.
/// `data_offset` is `None` in inplace mode and is otherwise pointer-
/// stable for the record's lifetime.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    pub key: u64,
    pub data_offset: Option<u32>,
    pub body: Vec<u8>,
}

/// Read-only introspection counters. Epoch-protected only in the
/// sense that reading them never dereferences store memory; they are
/// plain relaxed loads.
#[derive(Clone, Copy, Debug, Default)]
pub struct Stats {
    pub bursts: u64,
    pub degenerate_bursts: u64,
    pub alias_fallbacks: u64,
    pub cas_retries: u64,
    pub removed_records: u64,
    pub workers: usize,
}

impl std::fmt::Display for Stats {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{{ bursts: {}, degenerate_bursts: {}, alias_fallbacks: {}, cas_retries: {}, removed_records: {}, workers: {} }}",
            self.bursts, self.degenerate_bursts, self.alias_fallbacks, self.cas_retries, self.removed_records, self.workers,
        )
    }
}

enum BurstOutcome {
    Progressed,
    Degenerate,
    Retry,
}

/// The store. Borrows its backing `Region` rather than owning it: a
/// real deployment's region lives behind a file mapping this crate
/// does not own (persistence and file mapping are out of scope here).
pub struct HTrie<'r> {
    region: &'r crate::region::Region,
    config: Config,
    record_layout: RecordLayout,
    bucket_layout: BucketLayout,
    allocator: SlabAllocator<'r>,
    dcache: DataCache,
    epochs: EpochTable,
    root_offset: u32,
    bursts: std::sync::atomic::AtomicU64,
    degenerate_bursts: std::sync::atomic::AtomicU64,
    alias_fallbacks: std::sync::atomic::AtomicU64,
    cas_retries: std::sync::atomic::AtomicU64,
    removed_records: std::sync::atomic::AtomicU64,
}

impl<'r> HTrie<'r> {
    /// Validate `config`, lay out header and root index over `region`,
    /// and return an opened store. `region.len()` must equal
    /// `config.db_size`.
    pub fn open(region: &'r crate::region::Region, config: Config) -> Result<HTrie<'r>> {
        config.validate()?;
        debug_assert!(node::is_cacheline_sized(FANOUT), "non-root index node must be one cache line");

        if region.len() != config.db_size {
            return err_at!(
                InvalidConfig,
                msg: "region length {} does not match configured db_size {}",
                region.len(),
                config.db_size
            );
        }

        let record_layout = RecordLayout {
            mode: config.mode(),
            rec_len: config.rec_len,
        };
        let bucket_layout = BucketLayout {
            slot_size: record_layout.slot_size(),
        };

        let root_fanout = 1usize << config.root_bits;
        let root_offset = HEADER_SIZE;
        let root_size = node::node_size(root_fanout) as u32;
        let base = align_up(root_offset + root_size, MINDREC as u32);
        if base as usize >= config.db_size {
            return err_at!(
                InvalidConfig,
                msg: "db_size {} too small to hold header ({}) and root index ({} bytes)",
                config.db_size,
                HEADER_SIZE,
                root_size
            );
        }

        let flags = match record_layout.mode {
            Mode::Inplace => FLAG_INPLACE,
            Mode::Varlen => FLAG_VARLEN,
            Mode::Indirect => 0,
        };
        region.u32_at(0).store(MAGIC, Ordering::Relaxed);
        region.u32_at(4).store(flags, Ordering::Relaxed);
        region.u32_at(8).store(config.rec_len as u32, Ordering::Relaxed);
        region.u32_at(12).store(config.root_bits, Ordering::Relaxed);

        NodeView::new(region, root_offset, root_fanout).zero_init();

        info!("htrie: opened store config={}", config);

        Ok(HTrie {
            region,
            config,
            record_layout,
            bucket_layout,
            allocator: SlabAllocator::new(region, base),
            dcache: DataCache::new(),
            epochs: EpochTable::new(config.workers),
            root_offset,
            bursts: std::sync::atomic::AtomicU64::new(0),
            degenerate_bursts: std::sync::atomic::AtomicU64::new(0),
            alias_fallbacks: std::sync::atomic::AtomicU64::new(0),
            cas_retries: std::sync::atomic::AtomicU64::new(0),
            removed_records: std::sync::atomic::AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn root_fanout(&self) -> usize {
        1usize << self.config.root_bits
    }

    fn root_node(&self) -> NodeView<'r> {
        NodeView::new(self.region, self.root_offset, self.root_fanout())
    }

    fn bucket(&self, offset: u32) -> BucketView<'r> {
        BucketView::new(self.region, offset, self.bucket_layout)
    }

    /// Wait-free descent: reads only, no CAS, no epoch side effects of
    /// its own — callers bracket it with `observe`.
    fn descend(&self, key: u64) -> Descent {
        let mut offset = self.root_offset;
        let mut fanout = self.root_fanout();
        let mut index = root_index(key, self.config.root_bits);
        let mut bits = self.config.root_bits;
        loop {
            let node = NodeView::new(self.region, offset, fanout);
            let shift = node.get(index);
            if shift.is_empty() || shift.is_data() {
                return Descent {
                    parent_offset: offset,
                    parent_fanout: fanout,
                    index,
                    shift,
                    bits,
                };
            }
            offset = shift.index_offset();
            fanout = FANOUT;
            index = offset::branch(key, bits);
            bits += LEVEL_BITS;
        }
    }

    fn alloc_bucket(&self, worker: &mut Worker) -> Result<u32> {
        if let Some(off) = worker.pop_free_bucket(self.region, self.bucket_layout) {
            return Ok(off);
        }
        self.allocator
            .alloc_fix(self.bucket_layout.bucket_size(), &mut worker.alloc)
            .ok_or_else(|| Error::OutOfMemory("bucket".into()))
    }

    fn free_bucket_to_worker(&self, worker: &mut Worker, offset: u32) {
        worker.push_free_bucket(self.region, self.bucket_layout, offset);
    }

    fn write_slot(&self, bucket: &BucketView, idx: usize, key: u64, data: &[u8], data_offset: Option<u32>) {
        unsafe {
            let slot = bucket.slot_bytes_mut(idx);
            self.record_layout.write_key(slot, key);
            match self.record_layout.mode {
                Mode::Inplace => self.record_layout.write_inplace_body(slot, data),
                Mode::Indirect | Mode::Varlen => self
                    .record_layout
                    .write_data_offset(slot, data_offset.expect("indirect/varlen slot needs a data offset")),
            }
        }
    }

    fn free_payload(&self, offset: u32) {
        match self.record_layout.mode {
            Mode::Indirect => self.dcache.free_fixed(self.region, offset),
            Mode::Varlen => record::free_chunk_chain(self.region, &self.allocator, &self.dcache, offset),
            Mode::Inplace => {}
        }
    }

    fn read_record(&self, slot: &[u8], key: u64) -> Record {
        match self.record_layout.mode {
            Mode::Inplace => Record {
                key,
                data_offset: None,
                body: self.record_layout.inplace_body(slot).to_vec(),
            },
            Mode::Indirect => {
                let off = self.record_layout.data_offset_of(slot);
                let body = self.region.bytes_at(off, self.record_layout.rec_len).to_vec();
                Record {
                    key,
                    data_offset: Some(off),
                    body,
                }
            }
            Mode::Varlen => {
                let off = self.record_layout.data_offset_of(slot);
                let body = record::read_chunk_chain(self.region, off);
                Record {
                    key,
                    data_offset: Some(off),
                    body,
                }
            }
        }
    }

    /// `insert(key, data) -> record handle | error`. `data` must be
    /// non-empty; in inplace mode it must be exactly `rec_len` bytes.
    pub fn insert(&self, worker: &mut Worker, key: u64, data: &[u8]) -> Result<RecordHandle> {
        if data.is_empty() {
            return err_at!(InvalidInput, msg: "empty record body for key {:#x}", key);
        }
        if self.record_layout.mode == Mode::Inplace && data.len() != self.record_layout.rec_len {
            return err_at!(
                InvalidInput,
                msg: "inplace body length {} != configured rec_len {}",
                data.len(),
                self.record_layout.rec_len
            );
        }

        self.epochs.observe(worker.id());
        let result = self.insert_inner(worker, key, data);
        self.epochs.free_generation(worker.id());
        result
    }

    fn insert_inner(&self, worker: &mut Worker, key: u64, data: &[u8]) -> Result<RecordHandle> {
        // Allocate the data payload first (varlen/indirect), before
        // touching the trie at all.
        let data_offset = match self.record_layout.mode {
            Mode::Inplace => None,
            Mode::Indirect => {
                let off = self
                    .dcache
                    .alloc_fixed(self.region, &self.allocator, self.record_layout.rec_len, &mut worker.alloc)
                    .ok_or_else(|| Error::OutOfMemory("indirect payload".into()))?;
                unsafe {
                    self.region
                        .bytes_at_mut(off, self.record_layout.rec_len)
                        .copy_from_slice(data);
                }
                Some(off)
            }
            Mode::Varlen => Some(record::alloc_chunk_chain(
                self.region,
                &self.allocator,
                &self.dcache,
                data,
                &mut worker.alloc,
            )?),
        };

        match self.insert_descend(worker, key, data, data_offset) {
            Ok(handle) => Ok(handle),
            Err(err) => {
                if let Some(off) = data_offset {
                    warn!("htrie: insert failed for key {:#x}, rolling back data payload: {}", key, err);
                    self.free_payload(off);
                }
                Err(err)
            }
        }
    }

    fn insert_descend(&self, worker: &mut Worker, key: u64, data: &[u8], data_offset: Option<u32>) -> Result<RecordHandle> {
        loop {
            let descent = self.descend(key);

            if descent.shift.is_empty() {
                let bucket_off = self.alloc_bucket(worker)?;
                let bucket = self.bucket(bucket_off);
                bucket.init();
                self.write_slot(&bucket, 0, key, data, data_offset);
                bucket.fetch_set_slot(0);

                let parent = NodeView::new(self.region, descent.parent_offset, descent.parent_fanout);
                let tagged = offset::encode_data_offset(bucket_off as usize).expect("bucket offset must be MINDREC-aligned");
                match parent.compare_exchange(descent.index, Shift::EMPTY, tagged) {
                    Ok(()) => return Ok(RecordHandle { bucket: BucketHandle(bucket_off), slot: 0 }),
                    Err(_) => {
                        self.allocator.free_blk(bucket_off, self.bucket_layout.bucket_size());
                        self.cas_retries.fetch_add(1, Ordering::Relaxed);
                        continue;
                    }
                }
            }

            debug_assert!(descent.shift.is_data());
            let bucket_off = descent.shift.data_offset();
            let bucket = self.bucket(bucket_off);
            let mut map = bucket.col_map();

            loop {
                let idx = match bucket::find_free_slot(map) {
                    Some(idx) => idx,
                    None => break,
                };
                self.write_slot(&bucket, idx, key, data, data_offset);
                let before = bucket.fetch_set_slot(idx);
                if bucket::is_occupied(before, idx) {
                    // lost the bit race for this slot; look for another.
                    map = bucket.col_map();
                    self.cas_retries.fetch_add(1, Ordering::Relaxed);
                    continue;
                }
                // The speculative write above may have been stomped by a
                // racing inserter that also tried this slot and lost the
                // bit; now that the bit is ours alone, rewrite.
                self.write_slot(&bucket, idx, key, data, data_offset);
                return Ok(RecordHandle { bucket: BucketHandle(bucket_off), slot: idx });
            }

            if descent.bits + LEVEL_BITS > WORD_BITS {
                return err_at!(
                    KeySpaceExhausted,
                    msg: "key {:#x} exhausted trie depth at bits={}",
                    key,
                    descent.bits
                );
            }
            match self.burst(worker, bucket_off, &descent)? {
                BurstOutcome::Retry => {
                    self.cas_retries.fetch_add(1, Ordering::Relaxed);
                }
                BurstOutcome::Degenerate => {
                    debug!("htrie: degenerate burst for key {:#x} at bits={}", key, descent.bits);
                    self.degenerate_bursts.fetch_add(1, Ordering::Relaxed);
                }
                BurstOutcome::Progressed => {} // already counted inside burst()
            }
        }
    }

    /// Turn a full bucket into a new index node.
    fn burst(&self, worker: &mut Worker, source_offset: u32, descent: &Descent) -> Result<BurstOutcome> {
        let source = self.bucket(source_offset);
        let map = source.col_map();
        let bits = descent.bits;

        let in_size = node::node_size(FANOUT);
        let in_offset = self
            .allocator
            .alloc_fix(in_size, &mut worker.alloc)
            .ok_or_else(|| Error::OutOfMemory("burst index node".into()))?;
        let in_node = NodeView::new(self.region, in_offset, FANOUT);
        in_node.zero_init();

        let mut new_buckets: Vec<u32> = Vec::new();
        let mut bucket_next: [Option<(u32, usize)>; FANOUT] = [None; FANOUT];
        let mut alias_used = false;
        let mut new_map = 0u64;

        for idx in source.occupied(map) {
            self.distribute_one(
                worker, &source, source_offset, &in_node, bits, idx, &mut alias_used, &mut bucket_next, &mut new_buckets, &mut new_map,
            );
        }
        let original_new_map = new_map;

        let parent = NodeView::new(self.region, descent.parent_offset, descent.parent_fanout);
        let old_tagged = offset::encode_data_offset(source_offset as usize).expect("source offset must be MINDREC-aligned");
        let in_tagged = offset::encode_index_offset(in_offset as usize).expect("index offset must be cache-line-aligned");

        if parent.compare_exchange(descent.index, old_tagged, in_tagged).is_err() {
            for b in new_buckets {
                self.allocator.free_blk(b, self.bucket_layout.bucket_size());
            }
            self.allocator.free_blk(in_offset, in_size);
            return Ok(BurstOutcome::Retry);
        }
        self.bursts.fetch_add(1, Ordering::Relaxed);

        let mut processed = map;
        let mut current = map;
        let mut target = new_map;
        loop {
            match source.compare_exchange_col_map(current, target) {
                Ok(_) => break,
                Err(observed) => {
                    let delta = observed & !processed;
                    for idx in source.occupied(delta) {
                        self.distribute_one(
                            worker, &source, source_offset, &in_node, bits, idx, &mut alias_used, &mut bucket_next, &mut new_buckets,
                            &mut target,
                        );
                    }
                    processed = observed;
                    current = observed;
                }
            }
        }

        if original_new_map == map {
            Ok(BurstOutcome::Degenerate)
        } else {
            Ok(BurstOutcome::Progressed)
        }
    }

    /// Place one occupied source slot into the new index node being
    /// built by `burst`. Exactly one branch gets the "alias the source
    /// bucket" freebie (the first occupied slot whose branch is still
    /// unassigned); every other distinct branch gets a freshly allocated
    /// bucket, falling back to aliasing on allocator exhaustion.
    #[allow(clippy::too_many_arguments)]
    fn distribute_one(
        &self,
        worker: &mut Worker,
        source: &BucketView,
        source_offset: u32,
        in_node: &NodeView,
        bits: u32,
        idx: usize,
        alias_used: &mut bool,
        bucket_next: &mut [Option<(u32, usize)>; FANOUT],
        new_buckets: &mut Vec<u32>,
        new_map: &mut u64,
    ) {
        let slot = source.slot_bytes(idx);
        let key = self.record_layout.key_of(slot);
        let i = offset::branch(key, bits);
        let child = in_node.get(i);

        if child.is_empty() {
            if !*alias_used {
                in_node.set_raw(i, offset::encode_data_offset(source_offset as usize).unwrap());
                *alias_used = true;
                *new_map |= bucket::slot_bit(idx);
                return;
            }
            match self.alloc_bucket(worker) {
                Ok(off) => {
                    let nb = self.bucket(off);
                    nb.init();
                    unsafe { nb.slot_bytes_mut(0).copy_from_slice(slot) };
                    nb.fetch_set_slot(0);
                    in_node.set_raw(i, offset::encode_data_offset(off as usize).unwrap());
                    new_buckets.push(off);
                    bucket_next[i] = Some((off, 1));
                }
                Err(_) => {
                    in_node.set_raw(i, offset::encode_data_offset(source_offset as usize).unwrap());
                    self.alias_fallbacks.fetch_add(1, Ordering::Relaxed);
                    *new_map |= bucket::slot_bit(idx);
                }
            }
            return;
        }

        if child.data_offset() == source_offset {
            *new_map |= bucket::slot_bit(idx);
            return;
        }

        match bucket_next[i] {
            Some((off, next_idx)) if next_idx < bucket::BUCKET_SLOTS => {
                let nb = self.bucket(off);
                unsafe { nb.slot_bytes_mut(next_idx).copy_from_slice(slot) };
                nb.fetch_set_slot(next_idx);
                bucket_next[i] = Some((off, next_idx + 1));
            }
            _ => {
                // Either this branch's new bucket is itself already full
                // (more than BUCKET_SLOTS records share every bit down to
                // this depth and this branch) or it was never tracked;
                // alias the source bucket rather than overflow. The next
                // insert overflow on this branch triggers another burst.
                in_node.set_raw(i, offset::encode_data_offset(source_offset as usize).unwrap());
                self.alias_fallbacks.fetch_add(1, Ordering::Relaxed);
                *new_map |= bucket::slot_bit(idx);
            }
        }
    }

    /// `lookup(key) -> bucket handle | null`. The epoch published here
    /// stays live until the caller calls `free_generation`.
    pub fn lookup(&self, worker: &mut Worker, key: u64) -> Option<BucketHandle> {
        self.epochs.observe(worker.id());
        let descent = self.descend(key);
        if descent.shift.is_data() {
            Some(BucketHandle(descent.shift.data_offset()))
        } else {
            None
        }
    }

    /// Release the epoch a prior `lookup` (or `walk`) published.
    pub fn free_generation(&self, worker: &Worker) {
        self.epochs.free_generation(worker.id());
    }

    /// `bscan_for_rec(bucket, key, &i)`: linear scan from `*cursor`,
    /// skipping unoccupied slots, returning the first record whose key
    /// equals `key`. Advances `*cursor` past the match so a repeat call
    /// continues the collision chain.
    pub fn bscan_for_rec(&self, bucket: BucketHandle, key: u64, cursor: &mut usize) -> Option<Record> {
        let view = self.bucket(bucket.0);
        let map = view.col_map();
        while *cursor < bucket::BUCKET_SLOTS {
            let idx = *cursor;
            *cursor += 1;
            if !bucket::is_occupied(map, idx) {
                continue;
            }
            let slot = view.slot_bytes(idx);
            let k = self.record_layout.key_of(slot);
            if k == key {
                return Some(self.read_record(slot, k));
            }
        }
        None
    }

    /// `remove(key)`: deletes every record with key `key` and
    /// reclaims their payloads once every worker's epoch has moved
    /// past the removal. Returns the number of records removed.
    pub fn remove(&self, worker: &mut Worker, key: u64) -> Result<usize> {
        self.epochs.observe(worker.id());
        let result = self.remove_inner(worker, key);
        self.epochs.free_generation(worker.id());
        if let Ok(count) = result {
            if count > 0 {
                self.removed_records.fetch_add(count as u64, Ordering::Relaxed);
            }
        }
        result
    }

    fn remove_inner(&self, worker: &mut Worker, key: u64) -> Result<usize> {
        let b_new_off = self.alloc_bucket(worker)?;
        let b_new = self.bucket(b_new_off);
        b_new.init();

        loop {
            let descent = self.descend(key);
            if descent.shift.is_empty() {
                self.free_bucket_to_worker(worker, b_new_off);
                return Ok(0);
            }
            debug_assert!(descent.shift.is_data());
            let old_off = descent.shift.data_offset();
            let old = self.bucket(old_off);
            let map = old.col_map();

            let mut next_idx = 0usize;
            let mut removed_payloads: Vec<u32> = Vec::new();
            let mut removed_count = 0usize;
            for idx in old.occupied(map) {
                let slot = old.slot_bytes(idx);
                let k = self.record_layout.key_of(slot);
                if k == key {
                    removed_count += 1;
                    if self.record_layout.mode != Mode::Inplace {
                        removed_payloads.push(self.record_layout.data_offset_of(slot));
                    }
                } else {
                    unsafe { b_new.slot_bytes_mut(next_idx).copy_from_slice(slot) };
                    b_new.fetch_set_slot(next_idx);
                    next_idx += 1;
                }
            }

            if removed_count == 0 {
                self.free_bucket_to_worker(worker, b_new_off);
                return Ok(0);
            }

            let parent = NodeView::new(self.region, descent.parent_offset, descent.parent_fanout);
            let old_tagged = offset::encode_data_offset(old_off as usize).expect("bucket offset must be MINDREC-aligned");
            let new_tagged = offset::encode_data_offset(b_new_off as usize).expect("bucket offset must be MINDREC-aligned");

            match parent.compare_exchange(descent.index, old_tagged, new_tagged) {
                Ok(()) => {
                    // Epoch-synchronize before reclaiming so no in-flight
                    // reader can still be dereferencing `old`.
                    self.epochs.synchronize_advance();
                    self.free_bucket_to_worker(worker, old_off);
                    for payload in removed_payloads {
                        self.free_payload(payload);
                    }
                    debug!("htrie: removed {} record(s) for key {:#x}", removed_count, key);
                    return Ok(removed_count);
                }
                Err(_) => {
                    self.cas_retries.fetch_add(1, Ordering::Relaxed);
                    b_new.init();
                    continue;
                }
            }
        }
    }

    /// `extend_rec(rec, size)`: append a chunk to an existing varlen
    /// record's chain, preserving the head offset (pointer stability).
    pub fn extend_rec(&self, worker: &mut Worker, head: u32, body: &[u8]) -> Result<u32> {
        record::extend_rec(self.region, &self.allocator, &self.dcache, head, body, &mut worker.alloc)
    }

    /// `walk(fn)`: depth-first visit of every occupied slot in the
    /// trie, returning the sum of the visitor's return values.
    /// Recursion depth is bounded by `(WORD_BITS - root_bits) / 4 + 1`
    /// since descent cannot exceed the key's bit width.
    pub fn walk<F>(&self, worker: &mut Worker, mut visitor: F) -> i64
    where
        F: FnMut(&Record) -> i64,
    {
        self.epochs.observe(worker.id());
        let sum = self.walk_node(self.root_node(), &mut visitor);
        self.epochs.free_generation(worker.id());
        sum
    }

    fn walk_node<F>(&self, node: NodeView<'r>, visitor: &mut F) -> i64
    where
        F: FnMut(&Record) -> i64,
    {
        let mut sum = 0i64;
        for (_, shift) in node.children() {
            if shift.is_data() {
                sum += self.walk_bucket(shift.data_offset(), visitor);
            } else {
                sum += self.walk_node(NodeView::new(self.region, shift.index_offset(), FANOUT), visitor);
            }
        }
        sum
    }

    fn walk_bucket<F>(&self, offset: u32, visitor: &mut F) -> i64
    where
        F: FnMut(&Record) -> i64,
    {
        let view = self.bucket(offset);
        let map = view.col_map();
        let mut sum = 0i64;
        for idx in view.occupied(map) {
            let slot = view.slot_bytes(idx);
            let key = self.record_layout.key_of(slot);
            let record = self.read_record(slot, key);
            sum += visitor(&record);
        }
        sum
    }

    pub fn stats(&self) -> Stats {
        Stats {
            bursts: self.bursts.load(Ordering::Relaxed),
            degenerate_bursts: self.degenerate_bursts.load(Ordering::Relaxed),
            alias_fallbacks: self.alias_fallbacks.load(Ordering::Relaxed),
            cas_retries: self.cas_retries.load(Ordering::Relaxed),
            removed_records: self.removed_records.load(Ordering::Relaxed),
            workers: self.epochs.worker_count(),
        }
    }
}

#[cfg(test)]
#[path = "store_test.rs"]
mod store_test;
