//! The public index handle: open / create, bulk load, insert, and scans.

use std::fmt;

use log::{debug, info, warn};

use crate::buffer::{BufferPoolManager, StatsSnapshot};
use crate::common::{AttrType, Error, IndexConfig, Key, Operator, PageId, RecordId, Result};
use crate::common::config::MIN_NODE_CAPACITY;
use crate::index::btree::meta::IndexMeta;
use crate::index::btree::navigator::{find_path, Routing};
use crate::index::btree::node::{LeafNode, NodePage, Root, MAX_LEAF_CAPACITY, MAX_NODE_CAPACITY};
use crate::index::btree::scan::{ScanBounds, ScanCursor};
use crate::index::btree::store::NodeStore;
use crate::relation::RelationSource;
use crate::storage::DiskManager;

/// Counters for the structural work an index has done since it was opened.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IndexStats {
    pub entries_inserted: u64,
    pub leaf_splits: u64,
    pub internal_splits: u64,
    pub root_splits: u64,
    /// Pages released after being replaced by a split.
    pub pages_discarded: u64,
    /// Replaced pages still waiting for their pins to drop.
    pub pages_deferred: u64,
}

impl fmt::Display for IndexStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "inserts={} leaf_splits={} internal_splits={} root_splits={} discarded={} deferred={}",
            self.entries_inserted,
            self.leaf_splits,
            self.internal_splits,
            self.root_splits,
            self.pages_discarded,
            self.pages_deferred
        )
    }
}

/// A disk-resident B+Tree over one integer attribute of a relation.
///
/// The index file is `<directory>/<relation>.<attr_byte_offset>`. Opening a
/// missing file creates it and bulk-loads every tuple of the relation;
/// opening an existing file checks its metadata and never rescans.
///
/// # Example
/// ```no_run
/// use bplus_index::{AttrType, BTreeIndex, IndexConfig, MemRelation, Operator, RecordId};
///
/// let mut relation = MemRelation::new("orders");
/// relation.push(RecordId::new(0, 0), 42i32.to_le_bytes().to_vec());
///
/// let config = IndexConfig::new("/tmp/idx");
/// let mut index = BTreeIndex::open(&relation, 0, AttrType::Integer, &config)?;
///
/// index.start_scan(0, Operator::Gte, 100, Operator::Lte)?;
/// let rid = index.scan_next()?;
/// index.end_scan()?;
/// # Ok::<(), bplus_index::Error>(())
/// ```
pub struct BTreeIndex {
    pub(crate) store: NodeStore,
    pub(crate) meta: IndexMeta,
    pub(crate) stats: IndexStats,
    cursor: ScanCursor,
    index_name: String,
    closed: bool,
}

impl BTreeIndex {
    /// Open the index for `relation`'s attribute at `attr_byte_offset`,
    /// creating and bulk-loading it if the file does not exist.
    ///
    /// # Errors
    /// - `Error::InvalidConfig` if `config` is rejected
    /// - `Error::ConfigMismatch` if an existing file was built differently
    /// - `Error::UnsupportedKeyType` when creating a non-integer index
    /// - `Error::TupleTooShort` if a tuple cannot hold the attribute
    /// - relation scan and I/O errors
    pub fn open<R: RelationSource + ?Sized>(
        relation: &R,
        attr_byte_offset: u32,
        attr_type: AttrType,
        config: &IndexConfig,
    ) -> Result<Self> {
        config.validate()?;

        let relation_name = relation.relation_name();
        let index_name = format!("{relation_name}.{attr_byte_offset}");
        let path = config.directory.join(&index_name);

        if !path.exists() && attr_type != AttrType::Integer {
            return Err(Error::UnsupportedKeyType(attr_type));
        }

        let (dm, existed) = DiskManager::open_or_create(&path)?;
        let bpm = BufferPoolManager::new(config.pool_size, dm);

        if existed {
            let meta = IndexMeta::read(&bpm)?;
            meta.check_matches(relation_name, attr_byte_offset, attr_type)?;

            let leaf_capacity = meta.leaf_capacity as usize;
            let node_capacity = meta.node_capacity as usize;
            if !(MIN_NODE_CAPACITY..=MAX_LEAF_CAPACITY).contains(&leaf_capacity)
                || !(MIN_NODE_CAPACITY..=MAX_NODE_CAPACITY).contains(&node_capacity)
            {
                return Err(Error::corrupt(
                    PageId::META.0,
                    format!("stored capacities {leaf_capacity}/{node_capacity} do not fit a page"),
                ));
            }
            info!(
                "reopened index {} (root {}, leaf capacity {}, node capacity {})",
                index_name, meta.root_page_id, leaf_capacity, node_capacity
            );

            return Ok(Self::from_parts(
                NodeStore::new(bpm, leaf_capacity, node_capacity),
                meta,
                index_name,
            ));
        }

        let store = NodeStore::new(bpm, config.leaf_capacity(), config.node_capacity());
        let meta = Self::create_layout(&store, relation_name, attr_byte_offset, attr_type)?;
        info!(
            "created index {} (leaf capacity {}, node capacity {})",
            index_name,
            store.leaf_capacity(),
            store.node_capacity()
        );

        let mut index = Self::from_parts(store, meta, index_name);
        index.bulk_load(relation)?;
        index.flush()?;
        Ok(index)
    }

    fn from_parts(store: NodeStore, meta: IndexMeta, index_name: String) -> Self {
        Self {
            store,
            meta,
            stats: IndexStats::default(),
            cursor: ScanCursor::new(),
            index_name,
            closed: false,
        }
    }

    /// Lay out a new file: reserved page, metadata, empty leaf, root wrapper.
    fn create_layout(
        store: &NodeStore,
        relation_name: &str,
        attr_byte_offset: u32,
        attr_type: AttrType,
    ) -> Result<IndexMeta> {
        let reserved = store.allocate_reserved()?;
        let meta_page = store.bpm().new_page()?.page_id();
        if reserved != PageId::RESERVED || meta_page != PageId::META {
            return Err(Error::corrupt(meta_page.0, "new index file is not empty"));
        }

        let leaf = store.allocate(&NodePage::Leaf(LeafNode::new()))?;
        let root = store.allocate(&NodePage::RootLeaf(leaf))?;

        let meta = IndexMeta::new(
            relation_name,
            attr_byte_offset,
            attr_type,
            root,
            store.leaf_capacity(),
            store.node_capacity(),
        );
        meta.write(store.bpm())?;
        debug!("initial leaf {}, root wrapper {}", leaf, root);
        Ok(meta)
    }

    /// Insert every tuple of `relation` in scan order.
    fn bulk_load<R: RelationSource + ?Sized>(&mut self, relation: &R) -> Result<()> {
        let offset = self.meta.attr_byte_offset as usize;
        let mut loaded = 0u64;

        for item in relation.scan()? {
            let (rid, tuple) = item?;
            let key = extract_key(&tuple, offset, rid)?;
            self.insert_entry(key, rid)?;
            loaded += 1;
        }

        info!(
            "bulk-loaded {} entries into {} ({} leaf splits, {} root splits)",
            loaded, self.index_name, self.stats.leaf_splits, self.stats.root_splits
        );
        Ok(())
    }

    // ========================================================================
    // Insertion
    // ========================================================================

    /// Insert one (key, record) pair.
    ///
    /// An active scan is ended first; its position would not survive the
    /// pages a split replaces.
    pub fn insert_entry(&mut self, key: Key, rid: RecordId) -> Result<()> {
        if !self.cursor.is_idle() {
            debug!("insert into {} ends the active scan", self.index_name);
            self.cursor.end(&self.store)?;
        }

        let root = self.store.load_root(self.meta.root_page_id)?;
        let path = find_path(&self.store, self.meta.root_page_id, root, key, Routing::EqualRight)?;

        let mut leaf = self.store.read_leaf(path.leaf)?;
        if leaf.is_full(self.store.leaf_capacity()) {
            self.split_leaf(path, leaf, key, rid)?;
        } else {
            leaf.insert(key, rid);
            self.store.write_leaf(path.leaf, &leaf)?;
        }

        self.stats.entries_inserted += 1;
        self.store.reclaim_deferred()
    }

    // ========================================================================
    // Scans
    // ========================================================================

    /// Begin a range scan over `low <low_op> key <high_op> high`.
    ///
    /// A scan already in progress is ended first.
    ///
    /// # Errors
    /// - `Error::BadOperator` unless `low_op` is GT/GTE and `high_op` LT/LTE
    /// - `Error::BadRange` if `high < low`
    pub fn start_scan(&mut self, low: Key, low_op: Operator, high: Key, high_op: Operator) -> Result<()> {
        let bounds = ScanBounds::new(low, low_op, high, high_op)?;

        if !self.cursor.is_idle() {
            debug!("new scan on {} replaces the previous one", self.index_name);
            self.cursor.end(&self.store)?;
        }

        let root = self.store.load_root(self.meta.root_page_id)?;
        let path = find_path(&self.store, self.meta.root_page_id, root, low, bounds.routing())?;
        self.cursor.start(&self.store, path.leaf, bounds)
    }

    /// Next record id in the scan range.
    ///
    /// # Errors
    /// - `Error::ScanNotStarted` if no scan is in progress
    /// - `Error::ScanExhausted` once the range has been fully returned
    pub fn scan_next(&mut self) -> Result<RecordId> {
        self.cursor.next(&self.store)
    }

    /// Finish the current scan and release its page.
    ///
    /// # Errors
    /// `Error::ScanNotStarted` if no scan is in progress.
    pub fn end_scan(&mut self) -> Result<()> {
        self.cursor.end(&self.store)?;
        self.store.reclaim_deferred()
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Write every dirty page back to the index file.
    pub fn flush(&mut self) -> Result<()> {
        self.store.reclaim_deferred()?;
        self.store.bpm().flush_all_pages()
    }

    /// End any scan, release deferred pages, and flush.
    pub fn close(mut self) -> Result<()> {
        let result = self.shutdown();
        self.closed = true;
        result
    }

    fn shutdown(&mut self) -> Result<()> {
        if !self.cursor.is_idle() {
            self.cursor.end(&self.store)?;
        }
        self.flush()?;
        if self.store.deferred_count() > 0 {
            warn!(
                "{} pages of {} still pinned at close",
                self.store.deferred_count(),
                self.index_name
            );
        }
        info!("closed index {} ({})", self.index_name, self.stats());
        Ok(())
    }

    // ========================================================================
    // Info
    // ========================================================================

    /// File name of the index, `<relation>.<attr_byte_offset>`.
    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    pub fn root_page_id(&self) -> PageId {
        self.meta.root_page_id
    }

    /// Whether the root is still the wrapper around a single leaf.
    pub fn is_single_leaf(&self) -> Result<bool> {
        Ok(matches!(
            self.store.load_root(self.meta.root_page_id)?,
            Root::SingleLeaf(_)
        ))
    }

    pub fn relation_name(&self) -> String {
        self.meta.relation_name()
    }

    pub fn attr_byte_offset(&self) -> u32 {
        self.meta.attr_byte_offset
    }

    pub fn attr_type(&self) -> AttrType {
        self.meta.attr_type
    }

    pub fn leaf_capacity(&self) -> usize {
        self.store.leaf_capacity()
    }

    pub fn node_capacity(&self) -> usize {
        self.store.node_capacity()
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            pages_discarded: self.store.discarded_count(),
            pages_deferred: self.store.deferred_count() as u64,
            ..self.stats
        }
    }

    pub fn buffer_stats(&self) -> StatsSnapshot {
        self.store.bpm().stats().snapshot()
    }

    pub fn buffer_pool(&self) -> &BufferPoolManager {
        self.store.bpm()
    }
}

impl Drop for BTreeIndex {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.shutdown() {
                warn!("failed to close index {}: {}", self.index_name, e);
            }
        }
    }
}

impl fmt::Debug for BTreeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BTreeIndex")
            .field("index_name", &self.index_name)
            .field("root_page_id", &self.meta.root_page_id)
            .field("leaf_capacity", &self.store.leaf_capacity())
            .field("node_capacity", &self.store.node_capacity())
            .field("stats", &self.stats())
            .finish()
    }
}

/// Read the little-endian `i32` key at `offset` of a tuple.
fn extract_key(tuple: &[u8], offset: usize, rid: RecordId) -> Result<Key> {
    let needed = offset + AttrType::Integer.width();
    let bytes = tuple.get(offset..needed).ok_or(Error::TupleTooShort {
        rid,
        len: tuple.len(),
        needed,
    })?;
    Ok(Key::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relation::MemRelation;
    use tempfile::tempdir;

    fn tuple(prefix: u32, key: Key) -> Vec<u8> {
        let mut t = prefix.to_le_bytes().to_vec();
        t.extend_from_slice(&key.to_le_bytes());
        t
    }

    #[test]
    fn test_extract_key() {
        let rid = RecordId::new(1, 1);
        assert_eq!(extract_key(&tuple(9, -7), 4, rid).unwrap(), -7);
        assert_eq!(extract_key(&tuple(9, -7), 0, rid).unwrap(), 9);
        assert!(matches!(
            extract_key(&tuple(9, -7), 6, rid),
            Err(Error::TupleTooShort { len: 8, needed: 10, .. })
        ));
    }

    #[test]
    fn test_create_layout() {
        let dir = tempdir().unwrap();
        let relation = MemRelation::new("empty");
        let index = BTreeIndex::open(&relation, 4, AttrType::Integer, &IndexConfig::new(dir.path())).unwrap();

        assert_eq!(index.index_name(), "empty.4");
        assert_eq!(index.root_page_id(), PageId::new(3));
        assert!(index.is_single_leaf().unwrap());
        assert_eq!(index.buffer_pool().disk_page_count(), 4);
        assert!(dir.path().join("empty.4").exists());
    }

    #[test]
    fn test_non_integer_key_rejected_on_create() {
        let dir = tempdir().unwrap();
        let relation = MemRelation::new("r");
        let result = BTreeIndex::open(&relation, 0, AttrType::Double, &IndexConfig::new(dir.path()));

        assert!(matches!(result, Err(Error::UnsupportedKeyType(AttrType::Double))));
        assert!(!dir.path().join("r.0").exists());
    }

    #[test]
    fn test_bulk_load_short_tuple() {
        let dir = tempdir().unwrap();
        let mut relation = MemRelation::new("short");
        relation.push(RecordId::new(0, 0), tuple(1, 10));
        relation.push(RecordId::new(0, 1), vec![1, 2, 3]);

        let result = BTreeIndex::open(&relation, 4, AttrType::Integer, &IndexConfig::new(dir.path()));
        assert!(matches!(result, Err(Error::TupleTooShort { len: 3, .. })));
    }

    #[test]
    fn test_insert_ends_active_scan() {
        let dir = tempdir().unwrap();
        let relation = MemRelation::new("r");
        let config = IndexConfig::new(dir.path()).with_leaf_capacity(4);
        let mut index = BTreeIndex::open(&relation, 0, AttrType::Integer, &config).unwrap();

        index.insert_entry(1, RecordId::new(1, 0)).unwrap();
        index.start_scan(0, Operator::Gte, 10, Operator::Lte).unwrap();
        index.insert_entry(2, RecordId::new(2, 0)).unwrap();

        assert!(matches!(index.scan_next(), Err(Error::ScanNotStarted)));
        assert_eq!(index.buffer_pool().pinned_frame_count(), 0);
    }
}
