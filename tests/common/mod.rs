//! Helpers shared by the integration tests.
#![allow(dead_code)]

use bplus_index::{AttrType, BTreeIndex, Error, IndexConfig, Key, MemRelation, RecordId};
use tempfile::TempDir;

/// Byte offset of the key inside test tuples.
pub const KEY_OFFSET: u32 = 4;

/// Record id derived from a key so scans can be checked by key.
pub fn rid_for(key: Key) -> RecordId {
    RecordId::new(key as u32, (key as u32 % 97) as u16)
}

pub fn key_of(rid: RecordId) -> Key {
    rid.page_number as Key
}

/// A relation whose tuples carry `keys` at [`KEY_OFFSET`].
pub fn relation(name: &str, keys: &[Key]) -> MemRelation {
    let mut relation = MemRelation::new(name);
    for &k in keys {
        relation.push_key(rid_for(k), KEY_OFFSET as usize, k);
    }
    relation
}

pub fn small_config(dir: &TempDir) -> IndexConfig {
    IndexConfig::new(dir.path())
        .with_leaf_capacity(4)
        .with_node_capacity(4)
        .with_pool_size(16)
}

/// An empty index with leaf and node capacity 4.
pub fn empty_index(dir: &TempDir) -> BTreeIndex {
    BTreeIndex::open(&relation("rel", &[]), KEY_OFFSET, AttrType::Integer, &small_config(dir))
        .unwrap()
}

pub fn insert_keys(index: &mut BTreeIndex, keys: &[Key]) {
    for &k in keys {
        index.insert_entry(k, rid_for(k)).unwrap();
    }
}

/// Drain the active scan, returning keys in the order produced.
pub fn drain(index: &mut BTreeIndex) -> Vec<Key> {
    let mut keys = Vec::new();
    loop {
        match index.scan_next() {
            Ok(rid) => keys.push(key_of(rid)),
            Err(Error::ScanExhausted) => return keys,
            Err(e) => panic!("scan failed: {e}"),
        }
    }
}
