//! Root-to-leaf descent.
//!
//! A descent records every internal node it passes through together with
//! the child slot it followed. The split engine consumes that record from
//! the bottom up instead of re-reading parents.

use crate::common::{Key, PageId, Result};
use crate::index::btree::node::{ChildKind, InternalNode, Root};
use crate::index::btree::store::NodeStore;

/// How a descent treats a key equal to a separator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routing {
    /// Follow the child right of an equal separator. Used by inserts.
    EqualRight,
    /// Follow the child left of an equal separator, reaching the leftmost
    /// leaf that can hold the key. Used to seed inclusive scans.
    EqualLeft,
}

/// One internal node visited on the way down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathStep {
    pub page_id: PageId,
    pub slot: usize,
}

/// Result of a descent: the target leaf and its ancestors, root first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescentPath {
    pub ancestors: Vec<PathStep>,
    pub leaf: PageId,
}

impl DescentPath {
    /// Path of a tree that has never split.
    pub fn single_leaf(leaf: PageId) -> Self {
        Self {
            ancestors: Vec::new(),
            leaf,
        }
    }
}

/// Descend from the root to the leaf responsible for `key`.
pub fn find_path(
    store: &NodeStore,
    root_page_id: PageId,
    root: Root,
    key: Key,
    routing: Routing,
) -> Result<DescentPath> {
    let mut node = match root {
        Root::SingleLeaf(leaf) => return Ok(DescentPath::single_leaf(leaf)),
        Root::Tree(node) => node,
    };

    let mut page_id = root_page_id;
    let mut ancestors = Vec::new();
    loop {
        let slot = match routing {
            Routing::EqualRight => node.child_slot(key),
            Routing::EqualLeft => node.lower_bound_slot(key),
        };
        let child = node.children[slot];
        ancestors.push(PathStep { page_id, slot });

        match node.child_kind {
            ChildKind::Leaf => return Ok(DescentPath { ancestors, leaf: child }),
            ChildKind::Internal => {
                node = store.read_internal(child)?;
                page_id = child;
            }
        }
    }
}

/// The leaf immediately left of the path's leaf in the leaf chain.
///
/// Walks up to the deepest ancestor where the descent did not take the
/// first child, then follows rightmost children down from the slot to its
/// left. `None` when the path's leaf is the leftmost leaf.
pub fn left_neighbor(store: &NodeStore, ancestors: &[PathStep]) -> Result<Option<PageId>> {
    let Some(step) = ancestors.iter().rev().find(|step| step.slot > 0) else {
        return Ok(None);
    };

    let node = store.read_internal(step.page_id)?;
    let mut child = node.children[step.slot - 1];
    let mut kind = node.child_kind;
    while kind == ChildKind::Internal {
        let inner = store.read_internal(child)?;
        child = rightmost_child(&inner);
        kind = inner.child_kind;
    }
    Ok(Some(child))
}

/// The leftmost leaf under `root`.
pub fn leftmost_leaf(store: &NodeStore, root: Root) -> Result<PageId> {
    let mut node = match root {
        Root::SingleLeaf(leaf) => return Ok(leaf),
        Root::Tree(node) => node,
    };
    loop {
        let child = node.children[0];
        match node.child_kind {
            ChildKind::Leaf => return Ok(child),
            ChildKind::Internal => node = store.read_internal(child)?,
        }
    }
}

fn rightmost_child(node: &InternalNode) -> PageId {
    node.children[node.children.len() - 1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferPoolManager;
    use crate::index::btree::node::{LeafNode, NodePage};
    use crate::storage::DiskManager;
    use tempfile::tempdir;

    /// Two-level tree by hand:
    ///
    /// ```text
    ///                 root [30]
    ///         /                    \
    ///    a [20]                    b [40]
    ///   /      \                  /      \
    /// l0{10}  l1{20,25}      l2{30}    l3{40,50}
    /// ```
    struct Fixture {
        store: NodeStore,
        root: PageId,
        leaves: Vec<PageId>,
        _dir: tempfile::TempDir,
    }

    fn fixture() -> Fixture {
        let dir = tempdir().unwrap();
        let dm = DiskManager::create(dir.path().join("nav.0")).unwrap();
        let store = NodeStore::new(BufferPoolManager::new(8, dm), 4, 4);

        let leaves: Vec<PageId> = [vec![10], vec![20, 25], vec![30], vec![40, 50]]
            .iter()
            .map(|keys| {
                let mut leaf = LeafNode::new();
                for &k in keys {
                    leaf.insert(k, crate::common::RecordId::new(k as u32, 0));
                }
                store.allocate(&NodePage::Leaf(leaf)).unwrap()
            })
            .collect();

        let a = store
            .allocate(&NodePage::Internal(InternalNode::new_root(
                20, leaves[0], leaves[1], ChildKind::Leaf,
            )))
            .unwrap();
        let b = store
            .allocate(&NodePage::Internal(InternalNode::new_root(
                40, leaves[2], leaves[3], ChildKind::Leaf,
            )))
            .unwrap();
        let root = store
            .allocate(&NodePage::Internal(InternalNode::new_root(
                30, a, b, ChildKind::Internal,
            )))
            .unwrap();

        Fixture {
            store,
            root,
            leaves,
            _dir: dir,
        }
    }

    fn descend(f: &Fixture, key: Key, routing: Routing) -> DescentPath {
        let root = f.store.load_root(f.root).unwrap();
        find_path(&f.store, f.root, root, key, routing).unwrap()
    }

    #[test]
    fn test_single_leaf_has_empty_path() {
        let f = fixture();
        let path = find_path(
            &f.store,
            PageId::new(3),
            Root::SingleLeaf(f.leaves[0]),
            99,
            Routing::EqualRight,
        )
        .unwrap();
        assert!(path.ancestors.is_empty());
        assert_eq!(path.leaf, f.leaves[0]);
    }

    #[test]
    fn test_descent_records_slots() {
        let f = fixture();

        let path = descend(&f, 27, Routing::EqualRight);
        assert_eq!(path.leaf, f.leaves[1]);
        assert_eq!(path.ancestors.len(), 2);
        assert_eq!(path.ancestors[0].page_id, f.root);
        assert_eq!(path.ancestors[0].slot, 0);
        assert_eq!(path.ancestors[1].slot, 1);

        assert_eq!(descend(&f, -100, Routing::EqualRight).leaf, f.leaves[0]);
        assert_eq!(descend(&f, 1000, Routing::EqualRight).leaf, f.leaves[3]);
    }

    #[test]
    fn test_equal_keys_route_by_mode() {
        let f = fixture();
        assert_eq!(descend(&f, 30, Routing::EqualRight).leaf, f.leaves[2]);
        assert_eq!(descend(&f, 30, Routing::EqualLeft).leaf, f.leaves[1]);
        assert_eq!(descend(&f, 20, Routing::EqualRight).leaf, f.leaves[1]);
        assert_eq!(descend(&f, 20, Routing::EqualLeft).leaf, f.leaves[0]);
    }

    #[test]
    fn test_left_neighbor_same_parent_and_across_subtrees() {
        let f = fixture();

        let path = descend(&f, 25, Routing::EqualRight);
        assert_eq!(
            left_neighbor(&f.store, &path.ancestors).unwrap(),
            Some(f.leaves[0])
        );

        // l2's predecessor lives under a different parent
        let path = descend(&f, 30, Routing::EqualRight);
        assert_eq!(
            left_neighbor(&f.store, &path.ancestors).unwrap(),
            Some(f.leaves[1])
        );

        let path = descend(&f, 5, Routing::EqualRight);
        assert_eq!(left_neighbor(&f.store, &path.ancestors).unwrap(), None);
    }

    #[test]
    fn test_leftmost_leaf() {
        let f = fixture();
        let root = f.store.load_root(f.root).unwrap();
        assert_eq!(leftmost_leaf(&f.store, root).unwrap(), f.leaves[0]);
        assert_eq!(f.store.bpm().pinned_frame_count(), 0);
    }
}
