//! Record bodies: the three storage modes (inplace, indirect, varlen),
//! and the variable-length chunk chain that backs varlen payloads.
//!
//! A bucket slot always starts with the 8-byte key. What follows
//! depends on `Mode`:
//! - `Inplace`: the record body itself, `rec_len` bytes.
//! - `Indirect`/`Varlen`: a 4-byte data offset (padded to 8) pointing
//!   at a separately allocated payload — one fixed block for
//!   `Indirect`, the head of a chunk chain for `Varlen`.

use crate::alloc::{Allocator, WorkerAlloc};
use crate::dcache::DataCache;
use crate::error::{Error, Result};
use crate::region::Region;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Inplace,
    Indirect,
    Varlen,
}

const KEY_SIZE: usize = 8;
const INDIRECT_SLOT_SIZE: usize = 16;

#[derive(Clone, Copy)]
pub struct RecordLayout {
    pub mode: Mode,
    pub rec_len: usize,
}

impl RecordLayout {
    pub fn slot_size(&self) -> usize {
        match self.mode {
            Mode::Inplace => KEY_SIZE + self.rec_len,
            Mode::Indirect | Mode::Varlen => INDIRECT_SLOT_SIZE,
        }
    }

    pub fn key_of(&self, slot: &[u8]) -> u64 {
        u64::from_le_bytes(slot[0..KEY_SIZE].try_into().unwrap())
    }

    pub fn write_key(&self, slot: &mut [u8], key: u64) {
        slot[0..KEY_SIZE].copy_from_slice(&key.to_le_bytes());
    }

    /// Data offset stored after the key, for `Indirect`/`Varlen` slots.
    pub fn data_offset_of(&self, slot: &[u8]) -> u32 {
        debug_assert_ne!(self.mode, Mode::Inplace);
        u32::from_le_bytes(slot[KEY_SIZE..KEY_SIZE + 4].try_into().unwrap())
    }

    pub fn write_data_offset(&self, slot: &mut [u8], offset: u32) {
        debug_assert_ne!(self.mode, Mode::Inplace);
        slot[KEY_SIZE..KEY_SIZE + 4].copy_from_slice(&offset.to_le_bytes());
    }

    /// The inline record body, for `Inplace` slots.
    pub fn inplace_body<'a>(&self, slot: &'a [u8]) -> &'a [u8] {
        debug_assert_eq!(self.mode, Mode::Inplace);
        &slot[KEY_SIZE..KEY_SIZE + self.rec_len]
    }

    pub fn write_inplace_body(&self, slot: &mut [u8], body: &[u8]) {
        debug_assert_eq!(self.mode, Mode::Inplace);
        debug_assert_eq!(body.len(), self.rec_len);
        slot[KEY_SIZE..KEY_SIZE + self.rec_len].copy_from_slice(body);
    }
}

/// Chunk header: `{len: u32, next_chunk_offset: u32}` followed by
/// `len` bytes of payload. `next_chunk_offset == 0` marks the tail.
pub const CHUNK_HEADER: usize = 8;

pub fn chunk_len(region: &Region, chunk: u32) -> u32 {
    u32::from_le_bytes(region.bytes_at(chunk, 4).try_into().unwrap())
}

pub fn chunk_next(region: &Region, chunk: u32) -> u32 {
    u32::from_le_bytes(region.bytes_at(chunk + 4, 4).try_into().unwrap())
}

pub fn chunk_body<'r>(region: &'r Region, chunk: u32, len: u32) -> &'r [u8] {
    region.bytes_at(chunk + CHUNK_HEADER as u32, len as usize)
}

/// Write a fresh chunk's header and body. Caller owns this chunk
/// exclusively (just allocated, not yet linked into any chain).
fn init_chunk(region: &Region, chunk: u32, next: u32, body: &[u8]) {
    unsafe {
        let header = region.bytes_at_mut(chunk, CHUNK_HEADER);
        header[0..4].copy_from_slice(&(body.len() as u32).to_le_bytes());
        header[4..8].copy_from_slice(&next.to_le_bytes());
        region
            .bytes_at_mut(chunk + CHUNK_HEADER as u32, body.len())
            .copy_from_slice(body);
    }
}

/// Allocate and initialize the chunk chain for a fresh varlen record,
/// returning the head chunk's offset. The whole `body` is written
/// before any chunk is linked to another, so a concurrent reader can
/// only ever observe a fully-formed chain once the slot's data offset
/// is published.
pub fn alloc_chunk_chain(
    region: &Region,
    allocator: &dyn Allocator,
    dcache: &DataCache,
    body: &[u8],
    worker: &mut WorkerAlloc,
) -> Result<u32> {
    if body.is_empty() {
        return Err(Error::InvalidInput("empty record body".into()));
    }

    // Build from tail to head so each chunk's `next` is known at init time.
    let mut next = 0u32;
    let mut offsets = Vec::new();
    for chunk_body_bytes in body.chunks(crate::dcache::SIZE_CLASSES[crate::dcache::SIZE_CLASSES.len() - 1]).rev()
    {
        let mut len = chunk_body_bytes.len();
        let offset = dcache
            .alloc_data(region, allocator, CHUNK_HEADER, &mut len, worker)
            .ok_or_else(|| Error::OutOfMemory("chunk chain".into()))?;
        init_chunk(region, offset, next, chunk_body_bytes);
        offsets.push(offset);
        next = offset;
    }
    Ok(*offsets.last().unwrap())
}

/// Append a new chunk to the end of an existing varlen record's chain
/// and publish it by linking the current tail to it, preserving the
/// head offset (pointer-stability invariant).
///
/// Single-writer per record: concurrent `extend_rec` on the same
/// record is not a scenario this crate needs to support, so this walks
/// the chain without a CAS race on `next`.
pub fn extend_rec(
    region: &Region,
    allocator: &dyn Allocator,
    dcache: &DataCache,
    head: u32,
    body: &[u8],
    worker: &mut WorkerAlloc,
) -> Result<u32> {
    if body.is_empty() {
        return Err(Error::InvalidInput("empty chunk extension".into()));
    }
    let mut len = body.len();
    let new_chunk = dcache
        .alloc_data(region, allocator, CHUNK_HEADER, &mut len, worker)
        .ok_or_else(|| Error::OutOfMemory("extend_rec".into()))?;
    init_chunk(region, new_chunk, 0, body);

    let mut tail = head;
    loop {
        let next = chunk_next(region, tail);
        if next == 0 {
            break;
        }
        tail = next;
    }
    unsafe {
        region.bytes_at_mut(tail + 4, 4).copy_from_slice(&new_chunk.to_le_bytes());
    }
    Ok(new_chunk)
}

/// Free every chunk in a varlen chain back to the data cache.
pub fn free_chunk_chain(region: &Region, allocator: &dyn Allocator, dcache: &DataCache, head: u32) {
    let mut cur = head;
    while cur != 0 {
        let len = chunk_len(region, cur);
        let next = chunk_next(region, cur);
        dcache.free_data(region, allocator, cur, CHUNK_HEADER + len as usize);
        cur = next;
    }
}

/// Reassemble a varlen record's full body by walking its chunk chain.
pub fn read_chunk_chain(region: &Region, head: u32) -> Vec<u8> {
    let mut out = Vec::new();
    let mut cur = head;
    while cur != 0 {
        let len = chunk_len(region, cur);
        out.extend_from_slice(chunk_body(region, cur, len));
        cur = chunk_next(region, cur);
    }
    out
}

#[cfg(test)]
#[path = "record_test.rs"]
mod record_test;
