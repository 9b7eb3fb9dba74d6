use super::*;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[test]
fn test_idle_worker_does_not_block_synchronize() {
    let table = EpochTable::new(4);
    table.synchronize_advance();
}

#[test]
fn test_active_worker_blocks_until_it_moves_on() {
    let table = Arc::new(EpochTable::new(2));
    table.observe(0);

    let t = {
        let table = table.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            table.observe(0);
            table.free_generation(0);
        })
    };

    table.synchronize_advance();
    t.join().unwrap();
}

#[test]
fn test_observe_returns_current_generation() {
    let table = EpochTable::new(1);
    assert_eq!(table.observe(0), 0);
    table.synchronize_advance();
    assert_eq!(table.observe(0), 1);
}
