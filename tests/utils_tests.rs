use manis_ipc::utils::{ClientId, mask_call_id, next_call_id};
use std::collections::HashSet;

#[test]
fn test_next_call_id_uniqueness_and_range() {
    let mut seen = HashSet::new();

    for _ in 0..10_000 {
        let id = next_call_id();
        assert!(id >= 0, "Call id out of range: {}", id);
        assert!(seen.insert(id), "Duplicate call id generated: {}", id);
    }
}

#[test]
fn test_next_call_id_is_unique_across_threads() {
    let handles: Vec<_> = (0..8)
        .map(|_| std::thread::spawn(|| (0..1_000).map(|_| next_call_id()).collect::<Vec<_>>()))
        .collect();

    let mut seen = HashSet::new();
    for handle in handles {
        for id in handle.join().unwrap() {
            assert!(seen.insert(id), "Duplicate call id generated: {}", id);
        }
    }
}

#[test]
fn test_mask_call_id_wraps_into_positive_range() {
    assert_eq!(mask_call_id(0), 0);
    assert_eq!(mask_call_id(0x7FFF_FFFF), i32::MAX);
    assert_eq!(mask_call_id(0x8000_0000), 0);
    assert_eq!(mask_call_id(u32::MAX), i32::MAX);
    assert_eq!(mask_call_id(0x8000_0005), 5);
}

#[test]
fn test_client_ids_are_random() {
    let a = ClientId::random();
    let b = ClientId::random();

    assert_eq!(a.as_bytes().len(), 16);
    assert_ne!(a, b);
}
