//! End-to-end behavior of the index with leaf capacity 4.

mod common;

use bplus_index::{AttrType, BTreeIndex, Error, MetaField, Operator, PageId};
use common::*;
use tempfile::tempdir;

#[test]
fn test_four_keys_fill_single_leaf() {
    let dir = tempdir().unwrap();
    let mut index = empty_index(&dir);

    insert_keys(&mut index, &[10, 20, 30, 40]);

    assert!(index.is_single_leaf().unwrap());
    assert_eq!(index.root_page_id(), PageId::new(3));
    assert_eq!(index.stats().leaf_splits, 0);

    let report = index.verify().unwrap();
    assert_eq!(report.leaf_count, 1);
    assert_eq!(report.entry_count, 4);
}

#[test]
fn test_fifth_key_splits_and_scan_crosses_leaves() {
    let dir = tempdir().unwrap();
    let mut index = empty_index(&dir);
    insert_keys(&mut index, &[10, 20, 30, 40, 25]);

    assert!(!index.is_single_leaf().unwrap());
    assert_ne!(index.root_page_id(), PageId::new(3));
    let report = index.verify().unwrap();
    assert_eq!(report.internal_levels, 1);
    assert_eq!(report.leaf_count, 2);

    index.start_scan(15, Operator::Gte, 35, Operator::Lte).unwrap();
    assert_eq!(drain(&mut index), vec![20, 25, 30]);
    assert!(matches!(index.scan_next(), Err(Error::ScanExhausted)));
    index.end_scan().unwrap();
}

#[test]
fn test_inverted_range_is_rejected() {
    let dir = tempdir().unwrap();
    let mut index = empty_index(&dir);
    insert_keys(&mut index, &[10, 20]);

    assert!(matches!(
        index.start_scan(50, Operator::Gte, 10, Operator::Lte),
        Err(Error::BadRange { low: 50, high: 10 })
    ));
    assert_eq!(index.buffer_pool().pinned_frame_count(), 0);
}

#[test]
fn test_next_without_scan() {
    let dir = tempdir().unwrap();
    let mut index = empty_index(&dir);

    assert!(matches!(index.scan_next(), Err(Error::ScanNotStarted)));
    assert!(matches!(index.end_scan(), Err(Error::ScanNotStarted)));
}

#[test]
fn test_reopen_with_other_offset_is_mismatch() {
    let dir = tempdir().unwrap();
    let config = small_config(&dir);
    let rel = relation("orders", &[1, 2, 3]);

    BTreeIndex::open(&rel, 4, AttrType::Integer, &config)
        .unwrap()
        .close()
        .unwrap();

    // same file name, different stored offset
    std::fs::rename(dir.path().join("orders.4"), dir.path().join("orders.8")).unwrap();
    let result = BTreeIndex::open(&rel, 8, AttrType::Integer, &config);
    assert!(matches!(
        result,
        Err(Error::ConfigMismatch(MetaField::AttrByteOffset))
    ));
}

#[test]
fn test_reopen_with_other_type_is_mismatch() {
    let dir = tempdir().unwrap();
    let config = small_config(&dir);
    let rel = relation("orders", &[1]);

    drop(BTreeIndex::open(&rel, 4, AttrType::Integer, &config).unwrap());

    assert!(matches!(
        BTreeIndex::open(&rel, 4, AttrType::String, &config),
        Err(Error::ConfigMismatch(MetaField::AttrType))
    ));
}

#[test]
fn test_bad_operators_rejected() {
    let dir = tempdir().unwrap();
    let mut index = empty_index(&dir);
    insert_keys(&mut index, &[1, 2, 3]);
    let reads_before = index.buffer_stats();

    for (low_op, high_op) in [
        (Operator::Lt, Operator::Lte),
        (Operator::Lte, Operator::Lt),
        (Operator::Gte, Operator::Gt),
        (Operator::Gt, Operator::Gte),
    ] {
        assert!(matches!(
            index.start_scan(0, low_op, 10, high_op),
            Err(Error::BadOperator)
        ));
    }

    // rejected before any page was touched
    let reads_after = index.buffer_stats();
    assert_eq!(reads_before.cache_hits, reads_after.cache_hits);
    assert_eq!(reads_before.cache_misses, reads_after.cache_misses);
}

#[test]
fn test_negative_one_is_indexable() {
    let dir = tempdir().unwrap();
    let mut index = empty_index(&dir);
    insert_keys(&mut index, &[-1, 5, -3, -1, 0, 7, -2]);

    index.start_scan(-2, Operator::Gte, 0, Operator::Lte).unwrap();
    assert_eq!(drain(&mut index), vec![-2, -1, -1, 0]);
    index.end_scan().unwrap();

    assert_eq!(index.verify().unwrap().entry_count, 7);
}

#[test]
fn test_exclusive_bounds_and_empty_results() {
    let dir = tempdir().unwrap();
    let mut index = empty_index(&dir);
    insert_keys(&mut index, &(0..30).map(|k| k * 10).collect::<Vec<_>>());

    index.start_scan(50, Operator::Gt, 100, Operator::Lt).unwrap();
    assert_eq!(drain(&mut index), vec![60, 70, 80, 90]);
    index.end_scan().unwrap();

    index.start_scan(51, Operator::Gte, 59, Operator::Lte).unwrap();
    assert!(matches!(index.scan_next(), Err(Error::ScanExhausted)));
    index.end_scan().unwrap();

    index.start_scan(1000, Operator::Gte, 2000, Operator::Lte).unwrap();
    assert_eq!(drain(&mut index), Vec::<i32>::new());
    index.end_scan().unwrap();

    index.start_scan(i32::MIN, Operator::Gte, i32::MAX, Operator::Lte).unwrap();
    assert_eq!(drain(&mut index).len(), 30);
    index.end_scan().unwrap();
}

#[test]
fn test_second_start_scan_replaces_first() {
    let dir = tempdir().unwrap();
    let mut index = empty_index(&dir);
    insert_keys(&mut index, &(1..=20).collect::<Vec<_>>());

    index.start_scan(1, Operator::Gte, 20, Operator::Lte).unwrap();
    assert_eq!(key_of(index.scan_next().unwrap()), 1);
    assert_eq!(index.buffer_pool().pinned_frame_count(), 1);

    index.start_scan(15, Operator::Gte, 17, Operator::Lte).unwrap();
    assert_eq!(index.buffer_pool().pinned_frame_count(), 1);
    assert_eq!(drain(&mut index), vec![15, 16, 17]);
    index.end_scan().unwrap();
    assert_eq!(index.buffer_pool().pinned_frame_count(), 0);
}

#[test]
fn test_duplicates_across_leaves_are_all_returned() {
    let dir = tempdir().unwrap();
    let mut index = empty_index(&dir);
    insert_keys(&mut index, &[1, 2, 9]);
    for _ in 0..10 {
        index.insert_entry(5, rid_for(5)).unwrap();
    }

    index.start_scan(5, Operator::Gte, 5, Operator::Lte).unwrap();
    assert_eq!(drain(&mut index), vec![5; 10]);
    index.end_scan().unwrap();

    index.start_scan(4, Operator::Gt, 9, Operator::Lt).unwrap();
    assert_eq!(drain(&mut index).len(), 10);
    index.end_scan().unwrap();

    index.start_scan(5, Operator::Gt, 9, Operator::Lte).unwrap();
    assert_eq!(drain(&mut index), vec![9]);
    index.end_scan().unwrap();
}

#[test]
fn test_pins_released_between_operations() {
    let dir = tempdir().unwrap();
    let mut index = empty_index(&dir);

    for k in (0..200).rev() {
        index.insert_entry(k, rid_for(k)).unwrap();
        assert_eq!(index.buffer_pool().pinned_frame_count(), 0);
    }

    index.start_scan(10, Operator::Gte, 150, Operator::Lt).unwrap();
    for _ in 0..50 {
        index.scan_next().unwrap();
        assert_eq!(index.buffer_pool().pinned_frame_count(), 1);
    }
    index.end_scan().unwrap();
    assert_eq!(index.buffer_pool().pinned_frame_count(), 0);
    assert_eq!(index.stats().pages_deferred, 0);
}
