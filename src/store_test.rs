use rand::prelude::random;

use super::*;
use crate::config::Config;
use crate::region::Region;
use crate::worker::Worker;

fn open_varlen(root_bits: u32, db_size: usize) -> (Region, Config) {
    let region = Region::new(db_size);
    let config = Config::varlen(root_bits, db_size, 1);
    (region, config)
}

#[test]
fn varlen_duplicate_keys_and_distinct_key() {
    let (region, config) = open_varlen(8, 1 << 20);
    let htrie = HTrie::open(&region, config).unwrap();
    let mut worker = Worker::new(0);

    htrie.insert(&mut worker, 0x1, b"abc").unwrap();
    htrie.insert(&mut worker, 0x1, b"defg").unwrap();
    htrie.insert(&mut worker, 0x11, b"xy").unwrap();

    let bucket = htrie.lookup(&mut worker, 0x1).expect("key 0x1 must resolve to a bucket");
    let mut cursor = 0;
    let mut bodies = Vec::new();
    while let Some(rec) = htrie.bscan_for_rec(bucket, 0x1, &mut cursor) {
        bodies.push(rec.body);
    }
    htrie.free_generation(&worker);
    bodies.sort();
    assert_eq!(bodies, vec![b"abc".to_vec(), b"defg".to_vec()]);

    let bucket = htrie.lookup(&mut worker, 0x11).expect("key 0x11 must resolve to a bucket");
    let mut cursor = 0;
    let rec = htrie.bscan_for_rec(bucket, 0x11, &mut cursor).expect("one record for 0x11");
    assert_eq!(rec.body, b"xy");
    assert!(htrie.bscan_for_rec(bucket, 0x11, &mut cursor).is_none());
    htrie.free_generation(&worker);
}

#[test]
fn inplace_burst_keeps_every_record_reachable() {
    let db_size = 4 << 20;
    let region = Region::new(db_size);
    let config = Config::fixed(4, 16, true, db_size, 1);
    let htrie = HTrie::open(&region, config).unwrap();
    let mut worker = Worker::new(0);

    let n = 70u64; // exceeds BUCKET_SLOTS (56), forcing at least one burst.
    for i in 0..n {
        let key = i << 4; // shares root_bits=4 low nibble (0) across all records.
        let mut body = vec![0u8; 16];
        body[0..8].copy_from_slice(&i.to_le_bytes());
        htrie.insert(&mut worker, key, &body).unwrap();
    }
    assert!(htrie.stats().bursts >= 1, "70 records sharing a 4-bit root slot must burst at least once");

    for i in 0..n {
        let key = i << 4;
        let bucket = htrie.lookup(&mut worker, key).unwrap_or_else(|| panic!("key {:#x} must resolve", key));
        let mut cursor = 0;
        let rec = htrie
            .bscan_for_rec(bucket, key, &mut cursor)
            .unwrap_or_else(|| panic!("key {:#x} must have a record", key));
        assert_eq!(&rec.body[0..8], &i.to_le_bytes());
        htrie.free_generation(&worker);
    }
}

#[test]
fn remove_deletes_every_duplicate() {
    let (region, config) = open_varlen(8, 1 << 20);
    let htrie = HTrie::open(&region, config).unwrap();
    let mut worker = Worker::new(0);

    let key = 0xdead_beef_u64;
    for i in 0..5u8 {
        htrie.insert(&mut worker, key, &[i]).unwrap();
    }

    let removed = htrie.remove(&mut worker, key).unwrap();
    assert_eq!(removed, 5);

    match htrie.lookup(&mut worker, key) {
        None => {}
        Some(bucket) => {
            let mut cursor = 0;
            assert!(htrie.bscan_for_rec(bucket, key, &mut cursor).is_none());
        }
    }
    htrie.free_generation(&worker);
}

#[test]
fn indirect_insert_lookup_remove_round_trip_with_stable_offset() {
    let db_size = 4 << 20;
    let region = Region::new(db_size);
    let config = Config::fixed(8, 8, false, db_size, 1);
    let htrie = HTrie::open(&region, config).unwrap();
    let mut worker = Worker::new(0);
    assert_eq!(config.mode(), Mode::Indirect);

    let key = 0x1_u64;
    htrie.insert(&mut worker, key, &1u64.to_le_bytes()).unwrap();
    htrie.insert(&mut worker, key, &2u64.to_le_bytes()).unwrap();

    let bucket = htrie.lookup(&mut worker, key).expect("key must resolve to a bucket");
    let mut cursor = 0;
    let first = htrie.bscan_for_rec(bucket, key, &mut cursor).expect("first duplicate");
    let offset_before = first.data_offset.expect("indirect mode must report a data offset");
    let mut bodies = vec![first.body];
    while let Some(rec) = htrie.bscan_for_rec(bucket, key, &mut cursor) {
        bodies.push(rec.body);
    }
    htrie.free_generation(&worker);
    bodies.sort();
    assert_eq!(bodies, vec![1u64.to_le_bytes().to_vec(), 2u64.to_le_bytes().to_vec()]);

    // Unrelated inserts sharing a different root slot, enough to force a
    // burst there, must not move `key`'s payload offset (pointer
    // stability, spec.md §3/§8 property 4).
    let n = 70u64;
    for i in 0..n {
        let other_key = i << 8; // root_index 0, distinct from key's root_index 1.
        htrie.insert(&mut worker, other_key, &i.to_le_bytes()).unwrap();
    }
    assert!(htrie.stats().bursts >= 1, "70 records sharing a root slot must burst at least once");

    let bucket = htrie.lookup(&mut worker, key).expect("key must still resolve after unrelated burst");
    let mut cursor = 0;
    let rec = htrie.bscan_for_rec(bucket, key, &mut cursor).expect("a duplicate for key");
    assert_eq!(rec.data_offset, Some(offset_before), "payload offset must be pointer-stable across unrelated inserts/bursts");
    htrie.free_generation(&worker);

    // Removing an unrelated key must also leave the offset untouched.
    htrie.remove(&mut worker, 1u64 << 8).unwrap();
    let bucket = htrie.lookup(&mut worker, key).unwrap();
    let mut cursor = 0;
    let rec = htrie.bscan_for_rec(bucket, key, &mut cursor).unwrap();
    assert_eq!(rec.data_offset, Some(offset_before));
    htrie.free_generation(&worker);

    let removed = htrie.remove(&mut worker, key).unwrap();
    assert_eq!(removed, 2);
    match htrie.lookup(&mut worker, key) {
        None => {}
        Some(bucket) => {
            let mut cursor = 0;
            assert!(htrie.bscan_for_rec(bucket, key, &mut cursor).is_none());
        }
    }
    htrie.free_generation(&worker);
}

#[test]
fn remove_of_absent_key_is_a_no_op() {
    let (region, config) = open_varlen(8, 1 << 20);
    let htrie = HTrie::open(&region, config).unwrap();
    let mut worker = Worker::new(0);

    htrie.insert(&mut worker, 1, b"present").unwrap();
    let removed = htrie.remove(&mut worker, 2).unwrap();
    assert_eq!(removed, 0);

    let bucket = htrie.lookup(&mut worker, 1).unwrap();
    let mut cursor = 0;
    assert!(htrie.bscan_for_rec(bucket, 1, &mut cursor).is_some());
    htrie.free_generation(&worker);
}

#[test]
fn key_space_exhaustion_on_pathological_collision() {
    let (region, config) = open_varlen(4, 8 << 20);
    let htrie = HTrie::open(&region, config).unwrap();
    let mut worker = Worker::new(0);

    // Every record shares the same key, so every burst is degenerate:
    // the whole collision chain keeps re-aliasing one bucket, one level
    // deeper, until the word's key bits run out.
    for i in 0..bucket::BUCKET_SLOTS {
        htrie.insert(&mut worker, 0x1, format!("rec{}", i).as_bytes()).unwrap();
    }
    let err = htrie.insert(&mut worker, 0x1, b"one-too-many").unwrap_err();
    assert!(matches!(err, Error::KeySpaceExhausted(_)));
}

#[test]
fn walk_visits_every_live_record_exactly_once() {
    let (region, config) = open_varlen(8, 1 << 20);
    let htrie = HTrie::open(&region, config).unwrap();
    let mut worker = Worker::new(0);

    for key in 0..200u64 {
        htrie.insert(&mut worker, key, format!("v{}", key).as_bytes()).unwrap();
    }

    let count = htrie.walk(&mut worker, |_rec| 1);
    assert_eq!(count, 200);
}

#[test]
fn extend_rec_appends_and_is_readable_via_bscan() {
    let (region, config) = open_varlen(8, 1 << 20);
    let htrie = HTrie::open(&region, config).unwrap();
    let mut worker = Worker::new(0);

    let handle = htrie.insert(&mut worker, 42, b"head-").unwrap();
    let bucket = htrie.bucket(handle.bucket.offset());
    let slot = bucket.slot_bytes(handle.slot);
    let head_offset = htrie.record_layout.data_offset_of(slot);

    htrie.extend_rec(&mut worker, head_offset, b"tail").unwrap();

    let bucket = htrie.lookup(&mut worker, 42).unwrap();
    let mut cursor = 0;
    let rec = htrie.bscan_for_rec(bucket, 42, &mut cursor).unwrap();
    assert_eq!(rec.body, b"head-tail");
    htrie.free_generation(&worker);
}

#[test]
fn insert_rejects_empty_body() {
    let (region, config) = open_varlen(8, 1 << 20);
    let htrie = HTrie::open(&region, config).unwrap();
    let mut worker = Worker::new(0);

    let err = htrie.insert(&mut worker, 1, b"").unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

#[test]
fn inplace_insert_rejects_wrong_length_body() {
    let db_size = 1 << 20;
    let region = Region::new(db_size);
    let config = Config::fixed(4, 16, true, db_size, 1);
    let htrie = HTrie::open(&region, config).unwrap();
    let mut worker = Worker::new(0);

    let err = htrie.insert(&mut worker, 1, b"too-short").unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

#[test]
fn random_keys_are_all_reachable_after_insert() {
    let (region, config) = open_varlen(8, 4 << 20);
    let htrie = HTrie::open(&region, config).unwrap();
    let mut worker = Worker::new(0);

    let mut keys = Vec::with_capacity(2_000);
    for _ in 0..2_000 {
        let key: u64 = random::<u64>();
        let body = key.to_le_bytes();
        htrie.insert(&mut worker, key, &body).unwrap();
        keys.push(key);
    }
    htrie.free_generation(&worker);

    for key in keys {
        let bucket = htrie.lookup(&mut worker, key).expect("every inserted key must resolve to a bucket");
        let mut cursor = 0;
        let rec = htrie
            .bscan_for_rec(bucket, key, &mut cursor)
            .expect("every inserted key must have a reachable record");
        assert_eq!(rec.body, key.to_le_bytes());
    }
    htrie.free_generation(&worker);
}
