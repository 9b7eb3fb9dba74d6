use super::*;
use crate::offset::{encode_data_offset, encode_index_offset, MINDREC};

#[test]
fn test_fresh_node_is_all_empty() {
    let region = Region::new(1 << 16);
    let view = NodeView::new(&region, 0, FANOUT);
    for i in 0..FANOUT {
        assert!(view.get(i).is_empty());
    }
}

#[test]
fn test_cas_installs_child_once() {
    let region = Region::new(1 << 16);
    let view = NodeView::new(&region, 0, FANOUT);
    let bucket = encode_data_offset(4 * MINDREC).unwrap();

    assert!(view.compare_exchange(2, Shift::EMPTY, bucket).is_ok());
    assert_eq!(view.get(2), bucket);

    // A second CAS against the stale EMPTY value must fail.
    let other = encode_data_offset(6 * MINDREC).unwrap();
    assert!(view.compare_exchange(2, Shift::EMPTY, other).is_err());
    assert_eq!(view.get(2), bucket);
}

#[test]
fn test_children_skips_empty_slots() {
    let region = Region::new(1 << 16);
    let view = NodeView::new(&region, 0, FANOUT);
    let a = encode_index_offset(CACHE_LINE).unwrap();
    view.compare_exchange(0, Shift::EMPTY, a).unwrap();
    view.compare_exchange(5, Shift::EMPTY, a).unwrap();

    let present: Vec<usize> = view.children().map(|(i, _)| i).collect();
    assert_eq!(present, vec![0, 5]);
}

#[test]
fn test_root_node_is_wider_than_cacheline() {
    assert!(!is_cacheline_sized(1 << 8));
    assert!(is_cacheline_sized(FANOUT));
}
