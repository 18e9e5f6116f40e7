//! Range-scan cursor over the leaf chain.
//!
//! ```text
//!            start                    end_scan
//!   Idle ─────────────▶ Active ─────────────────▶ Idle
//!                         │  ▲                     ▲
//!              next past  │  │ next                │ end_scan
//!              the range  ▼  │                     │
//!                       Exhausted ─────────────────┘
//! ```
//!
//! While `Active` the cursor holds one explicit pin on its current leaf and
//! a decoded copy of it. Moving to the next leaf releases that pin before
//! taking the next one, so at most one page is ever held.

use log::{trace, warn};

use crate::common::{Error, Key, Operator, PageId, RecordId, Result};
use crate::index::btree::navigator::Routing;
use crate::index::btree::node::LeafNode;
use crate::index::btree::store::NodeStore;

/// Validated bounds of a range scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanBounds {
    pub low: Key,
    pub low_op: Operator,
    pub high: Key,
    pub high_op: Operator,
}

impl ScanBounds {
    /// # Errors
    /// - `Error::BadOperator` unless `low_op` is GT/GTE and `high_op` LT/LTE
    /// - `Error::BadRange` if `high < low`
    pub fn new(low: Key, low_op: Operator, high: Key, high_op: Operator) -> Result<Self> {
        if !low_op.is_lower() || !high_op.is_upper() {
            return Err(Error::BadOperator);
        }
        if high < low {
            return Err(Error::BadRange { low, high });
        }
        Ok(Self {
            low,
            low_op,
            high,
            high_op,
        })
    }

    #[inline]
    pub fn admits(&self, key: Key) -> bool {
        self.low_op.admits(key, self.low) && self.high_op.admits(key, self.high)
    }

    #[inline]
    fn above_high(&self, key: Key) -> bool {
        !self.high_op.admits(key, self.high)
    }

    /// Descent routing that reaches the first leaf able to hold a match.
    pub(crate) fn routing(&self) -> Routing {
        match self.low_op {
            Operator::Gte => Routing::EqualLeft,
            _ => Routing::EqualRight,
        }
    }
}

#[derive(Debug)]
struct Position {
    page_id: PageId,
    leaf: LeafNode,
    /// Next entry to return; always within bounds.
    next: usize,
    bounds: ScanBounds,
}

#[derive(Debug, Default)]
enum ScanState {
    #[default]
    Idle,
    Active(Position),
    Exhausted,
}

#[derive(Debug, Default)]
pub struct ScanCursor {
    state: ScanState,
}

impl ScanCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, ScanState::Idle)
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self.state, ScanState::Exhausted)
    }

    /// Leaf the cursor currently pins.
    pub fn current_page(&self) -> Option<PageId> {
        match &self.state {
            ScanState::Active(position) => Some(position.page_id),
            _ => None,
        }
    }

    /// Position on the first match at or after `leaf_id`.
    ///
    /// The cursor must be idle.
    pub(crate) fn start(&mut self, store: &NodeStore, leaf_id: PageId, bounds: ScanBounds) -> Result<()> {
        debug_assert!(self.is_idle(), "scan started over an existing one");

        let leaf = pin_leaf(store, leaf_id)?;
        self.settle(store, leaf_id, leaf, 0, bounds)
    }

    /// Return the current match and advance.
    ///
    /// # Errors
    /// - `Error::ScanNotStarted` when idle
    /// - `Error::ScanExhausted` once every match has been returned
    pub(crate) fn next(&mut self, store: &NodeStore) -> Result<RecordId> {
        let position = match std::mem::take(&mut self.state) {
            ScanState::Idle => return Err(Error::ScanNotStarted),
            ScanState::Exhausted => {
                self.state = ScanState::Exhausted;
                return Err(Error::ScanExhausted);
            }
            ScanState::Active(position) => position,
        };

        let Position {
            page_id,
            leaf,
            next,
            bounds,
        } = position;
        let rid = leaf.entries[next].rid;
        self.settle(store, page_id, leaf, next + 1, bounds)?;
        Ok(rid)
    }

    /// Release any held page and return to idle.
    ///
    /// # Errors
    /// `Error::ScanNotStarted` if no scan was started.
    pub(crate) fn end(&mut self, store: &NodeStore) -> Result<()> {
        match std::mem::take(&mut self.state) {
            ScanState::Idle => Err(Error::ScanNotStarted),
            ScanState::Exhausted => Ok(()),
            ScanState::Active(position) => store.unpin(position.page_id),
        }
    }

    /// Find the first match in `leaf` from index `from`, else hop right.
    ///
    /// The caller holds a pin on `page_id`; it is kept if a match is found
    /// here and released otherwise.
    fn settle(
        &mut self,
        store: &NodeStore,
        page_id: PageId,
        leaf: LeafNode,
        from: usize,
        bounds: ScanBounds,
    ) -> Result<()> {
        self.state = ScanState::Exhausted;

        let stop = leaf
            .entries
            .iter()
            .enumerate()
            .skip(from)
            .find(|(_, e)| bounds.admits(e.key) || bounds.above_high(e.key))
            .map(|(i, e)| (i, bounds.admits(e.key)));

        match stop {
            Some((next, true)) => {
                self.state = ScanState::Active(Position {
                    page_id,
                    leaf,
                    next,
                    bounds,
                });
                return Ok(());
            }
            Some((_, false)) => return store.unpin(page_id),
            None => {}
        }

        let sibling = leaf.right_sibling;
        store.unpin(page_id)?;
        self.hop(store, sibling, bounds)
    }

    /// Follow the sibling link and test its first key.
    ///
    /// Empty leaves are stepped over.
    fn hop(&mut self, store: &NodeStore, mut sibling: Option<PageId>, bounds: ScanBounds) -> Result<()> {
        while let Some(page_id) = sibling {
            let leaf = pin_leaf(store, page_id)?;
            match leaf.first_key() {
                None => {
                    trace!("scan stepping over empty {}", page_id);
                    sibling = leaf.right_sibling;
                    store.unpin(page_id)?;
                }
                Some(key) if bounds.admits(key) => {
                    self.state = ScanState::Active(Position {
                        page_id,
                        leaf,
                        next: 0,
                        bounds,
                    });
                    return Ok(());
                }
                Some(_) => return store.unpin(page_id),
            }
        }
        Ok(())
    }
}

/// Pin a leaf and decode it, dropping the pin again if decoding fails.
fn pin_leaf(store: &NodeStore, page_id: PageId) -> Result<LeafNode> {
    store.pin(page_id)?;
    store.read_leaf(page_id).map_err(|e| {
        if let Err(unpin) = store.unpin(page_id) {
            warn!("failed to unpin {} after a bad read: {}", page_id, unpin);
        }
        e
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferPoolManager;
    use crate::index::btree::node::NodePage;
    use crate::storage::DiskManager;
    use tempfile::tempdir;

    fn rid_of(key: Key) -> RecordId {
        RecordId::new(key as u32, 0)
    }

    /// Writes a chain of leaves from right to left so each can name its
    /// successor, and returns them left to right.
    fn chain(store: &NodeStore, leaves: &[&[Key]]) -> Vec<PageId> {
        let mut ids = Vec::new();
        let mut next = None;
        for keys in leaves.iter().rev() {
            let mut leaf = LeafNode::new();
            for &k in keys.iter() {
                leaf.insert(k, rid_of(k));
            }
            leaf.right_sibling = next;
            let pid = store.allocate(&NodePage::Leaf(leaf)).unwrap();
            ids.push(pid);
            next = Some(pid);
        }
        ids.reverse();
        ids
    }

    fn collect(cursor: &mut ScanCursor, store: &NodeStore) -> Vec<Key> {
        let mut keys = Vec::new();
        loop {
            match cursor.next(store) {
                Ok(rid) => keys.push(rid.page_number as Key),
                Err(Error::ScanExhausted) => return keys,
                Err(e) => panic!("unexpected error {e:?}"),
            }
        }
    }

    fn with_store<F: FnOnce(&NodeStore)>(f: F) {
        let dir = tempdir().unwrap();
        let dm = DiskManager::create(dir.path().join("scan.0")).unwrap();
        let store = NodeStore::new(BufferPoolManager::new(8, dm), 4, 4);
        f(&store);
    }

    #[test]
    fn test_bounds_validation() {
        assert!(matches!(
            ScanBounds::new(1, Operator::Lt, 5, Operator::Lte),
            Err(Error::BadOperator)
        ));
        assert!(matches!(
            ScanBounds::new(1, Operator::Gte, 5, Operator::Gt),
            Err(Error::BadOperator)
        ));
        assert!(matches!(
            ScanBounds::new(50, Operator::Gte, 10, Operator::Lte),
            Err(Error::BadRange { low: 50, high: 10 })
        ));
        assert!(ScanBounds::new(5, Operator::Gt, 5, Operator::Lt).is_ok());
    }

    #[test]
    fn test_scan_crosses_leaves() {
        with_store(|store| {
            let ids = chain(store, &[&[10, 20], &[25, 30, 40]]);
            let bounds = ScanBounds::new(15, Operator::Gte, 35, Operator::Lte).unwrap();

            let mut cursor = ScanCursor::new();
            cursor.start(store, ids[0], bounds).unwrap();
            assert_eq!(cursor.current_page(), Some(ids[0]));
            assert_eq!(store.bpm().get_pin_count(ids[0]), Some(1));

            assert_eq!(collect(&mut cursor, store), vec![20, 25, 30]);
            assert!(cursor.is_exhausted());
            assert_eq!(store.bpm().pinned_frame_count(), 0);

            cursor.end(store).unwrap();
            assert!(cursor.is_idle());
        });
    }

    #[test]
    fn test_exclusive_bounds() {
        with_store(|store| {
            let ids = chain(store, &[&[10, 20, 30]]);
            let bounds = ScanBounds::new(10, Operator::Gt, 30, Operator::Lt).unwrap();

            let mut cursor = ScanCursor::new();
            cursor.start(store, ids[0], bounds).unwrap();
            assert_eq!(collect(&mut cursor, store), vec![20]);
        });
    }

    #[test]
    fn test_start_hops_once_to_sibling() {
        with_store(|store| {
            let ids = chain(store, &[&[1, 2], &[8, 9]]);
            let bounds = ScanBounds::new(5, Operator::Gte, 8, Operator::Lte).unwrap();

            let mut cursor = ScanCursor::new();
            cursor.start(store, ids[0], bounds).unwrap();
            assert_eq!(cursor.current_page(), Some(ids[1]));
            assert_eq!(store.bpm().get_pin_count(ids[0]), Some(0));
            assert_eq!(collect(&mut cursor, store), vec![8]);
        });
    }

    #[test]
    fn test_start_with_no_match_is_exhausted() {
        with_store(|store| {
            let ids = chain(store, &[&[1, 2], &[8, 9]]);
            let bounds = ScanBounds::new(3, Operator::Gte, 7, Operator::Lte).unwrap();

            let mut cursor = ScanCursor::new();
            cursor.start(store, ids[0], bounds).unwrap();
            assert!(cursor.is_exhausted());
            assert!(matches!(cursor.next(store), Err(Error::ScanExhausted)));
            assert_eq!(store.bpm().pinned_frame_count(), 0);
        });
    }

    #[test]
    fn test_empty_leaves_are_stepped_over() {
        with_store(|store| {
            let ids = chain(store, &[&[1, 2], &[], &[3, 4]]);
            let bounds = ScanBounds::new(2, Operator::Gte, 10, Operator::Lte).unwrap();

            let mut cursor = ScanCursor::new();
            cursor.start(store, ids[0], bounds).unwrap();
            assert_eq!(collect(&mut cursor, store), vec![2, 3, 4]);
            assert_eq!(store.bpm().pinned_frame_count(), 0);
        });
    }

    #[test]
    fn test_next_and_end_when_idle() {
        with_store(|store| {
            let mut cursor = ScanCursor::new();
            assert!(matches!(cursor.next(store), Err(Error::ScanNotStarted)));
            assert!(matches!(cursor.end(store), Err(Error::ScanNotStarted)));
        });
    }

    #[test]
    fn test_end_releases_active_pin() {
        with_store(|store| {
            let ids = chain(store, &[&[1, 2, 3]]);
            let bounds = ScanBounds::new(1, Operator::Gte, 3, Operator::Lte).unwrap();

            let mut cursor = ScanCursor::new();
            cursor.start(store, ids[0], bounds).unwrap();
            cursor.next(store).unwrap();
            cursor.end(store).unwrap();

            assert_eq!(store.bpm().get_pin_count(ids[0]), Some(0));
            assert!(matches!(cursor.next(store), Err(Error::ScanNotStarted)));
        });
    }

    #[test]
    fn test_start_on_non_leaf_releases_pin() {
        with_store(|store| {
            let ids = chain(store, &[&[10, 20]]);
            let wrapper = store.allocate(&NodePage::RootLeaf(ids[0])).unwrap();
            let bounds = ScanBounds::new(0, Operator::Gte, 50, Operator::Lte).unwrap();

            let mut cursor = ScanCursor::new();
            assert!(matches!(
                cursor.start(store, wrapper, bounds),
                Err(Error::CorruptPage { .. })
            ));
            assert!(cursor.is_idle());
            assert_eq!(store.bpm().pinned_frame_count(), 0);
        });
    }
}

