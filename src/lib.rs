//! `htrie`: a cache-conscious burst hash trie — the core index engine
//! of an embedded, in-memory, concurrent key-value store.
//!
//! A [`store::HTrie`] maps fixed-width integer keys (expected to be
//! hashes; entropy concentrated in the low-order bits) to one or more
//! records apiece, duplicates forming a collision chain within a leaf
//! [`bucket`]. Internal nodes are fixed-fanout arrays of tagged child
//! [`offset::Shift`]s; a leaf that fills up *bursts* into a fresh index
//! level instead of growing (see [`store::HTrie::insert`]). Readers
//! never block: mutation proceeds by CAS, and storage is reclaimed only
//! once every worker's published [`epoch`] has moved past the
//! generation that unlinked it.
//!
//! Persistence, NUMA sharding, the CLI/bench harness, and the
//! underlying extent allocator are out of scope here — the allocator is
//! a contract ([`alloc::Allocator`]) this crate calls into, with a
//! reference bump/free-list implementation ([`alloc::SlabAllocator`])
//! provided for tests and single-process use.
//!
//! Ordered iteration, range queries, cross-key transactions, durability
//! and per-record delete are explicit non-goals: [`store::HTrie::remove`]
//! always deletes every record sharing a key.

pub mod error;

pub mod alloc;
pub mod bucket;
pub mod config;
pub mod dcache;
pub mod epoch;
pub mod node;
pub mod offset;
pub mod record;
pub mod region;
pub mod store;
pub mod worker;

pub use crate::alloc::{Allocator, SlabAllocator, WorkerAlloc};
pub use crate::config::Config;
pub use crate::error::{Error, Result};
pub use crate::record::Mode;
pub use crate::region::Region;
pub use crate::store::{BucketHandle, HTrie, Record, RecordHandle, Stats};
pub use crate::worker::Worker;
