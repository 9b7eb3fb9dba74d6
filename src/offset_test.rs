use super::*;

#[test]
fn test_data_shift_roundtrip() {
    let shift = encode_data_offset(5 * MINDREC).unwrap();
    assert!(shift.is_data());
    assert_eq!(shift.data_offset() as usize, 5 * MINDREC);
}

#[test]
fn test_index_shift_roundtrip() {
    let shift = encode_index_offset(3 * CACHE_LINE).unwrap();
    assert!(!shift.is_data());
    assert!(!shift.is_empty());
    assert_eq!(shift.index_offset() as usize, 3 * CACHE_LINE);
}

#[test]
fn test_empty_is_neither() {
    assert!(Shift::EMPTY.is_empty());
    assert!(!Shift::EMPTY.is_data());
}

#[test]
fn test_misaligned_offset_rejected() {
    assert!(encode_data_offset(MINDREC + 1).is_none());
    assert!(encode_index_offset(CACHE_LINE + 1).is_none());
}

#[test]
fn test_branch_extracts_four_bits() {
    let key: u64 = 0b1010_0110;
    assert_eq!(branch(key, 0), 0b0110);
    assert_eq!(branch(key, 4), 0b1010);
}
