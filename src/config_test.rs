use super::*;

#[test]
fn varlen_config_validates() {
    let cfg = Config::varlen(8, 1 << 20, 4);
    cfg.validate().unwrap();
    assert_eq!(cfg.mode(), Mode::Varlen);
}

#[test]
fn fixed_indirect_config_validates() {
    let cfg = Config::fixed(8, 64, false, 1 << 20, 4);
    cfg.validate().unwrap();
    assert_eq!(cfg.mode(), Mode::Indirect);
}

#[test]
fn fixed_inplace_config_validates() {
    let cfg = Config::fixed(4, 32, true, 1 << 20, 2);
    cfg.validate().unwrap();
    assert_eq!(cfg.mode(), Mode::Inplace);
}

#[test]
fn root_bits_must_be_multiple_of_four() {
    let cfg = Config::varlen(6, 1 << 20, 1);
    assert!(matches!(cfg.validate(), Err(Error::InvalidConfig(_))));
}

#[test]
fn root_bits_must_be_at_least_four() {
    let cfg = Config::varlen(0, 1 << 20, 1);
    assert!(matches!(cfg.validate(), Err(Error::InvalidConfig(_))));
}

#[test]
fn inplace_without_rec_len_is_rejected() {
    let cfg = Config::fixed(4, 0, true, 1 << 20, 1);
    assert!(matches!(cfg.validate(), Err(Error::InvalidConfig(_))));
}

#[test]
fn inplace_rec_len_over_half_mindrec_is_rejected() {
    let cfg = Config::fixed(4, MINDREC, true, 1 << 20, 1);
    assert!(matches!(cfg.validate(), Err(Error::InvalidConfig(_))));
}

#[test]
fn db_size_over_max_shard_is_rejected() {
    let cfg = Config::varlen(4, 1, 1); // too small, also covers the too-small branch.
    assert!(cfg.validate().is_err());
}

#[test]
fn zero_workers_is_rejected() {
    let cfg = Config::varlen(4, 1 << 20, 0);
    assert!(matches!(cfg.validate(), Err(Error::InvalidConfig(_))));
}
