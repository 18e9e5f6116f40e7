//! Cascading splits: leaf, then internal nodes up the descent path, then
//! the root.
//!
//! A split never edits the full node in place. Both halves go to freshly
//! allocated pages and the parent (or a new root) is pointed at them. The
//! replaced pages are collected along the way and discarded only once the
//! cascade has installed every new node, so a failure part way leaves the
//! old tree reachable and intact. The tree only grows a level when the
//! root splits.

use log::debug;

use crate::common::{Error, Key, PageId, RecordId, Result};
use crate::index::btree::index::BTreeIndex;
use crate::index::btree::navigator::{left_neighbor, DescentPath, PathStep};
use crate::index::btree::node::{ChildKind, InternalNode, LeafEntry, LeafNode, NodePage};

impl BTreeIndex {
    /// Insert into the full leaf at the end of `path` by splitting it.
    pub(crate) fn split_leaf(
        &mut self,
        path: DescentPath,
        leaf: LeafNode,
        key: Key,
        rid: RecordId,
    ) -> Result<()> {
        let LeafNode {
            mut entries,
            right_sibling,
        } = leaf;
        let at = entries.partition_point(|e| e.key <= key);
        entries.insert(at, LeafEntry::new(key, rid));

        let right_entries = entries.split_off(split_point(self.store.leaf_capacity()));
        let separator = right_entries[0].key;

        let right = self
            .store
            .allocate(&NodePage::Leaf(LeafNode::from_entries(right_entries, right_sibling)))?;
        let left = self
            .store
            .allocate(&NodePage::Leaf(LeafNode::from_entries(entries, Some(right))))?;

        let predecessor = left_neighbor(&self.store, &path.ancestors)?;
        let mut replaced = vec![path.leaf];
        self.promote(
            path.ancestors,
            path.leaf,
            separator,
            left,
            right,
            ChildKind::Leaf,
            &mut replaced,
        )?;
        if let Some(predecessor) = predecessor {
            self.relink_predecessor(predecessor, path.leaf, left)?;
        }

        for page_id in replaced {
            self.store.discard(page_id)?;
        }
        self.stats.leaf_splits += 1;
        debug!(
            "split leaf {} into {} | {} at key {}",
            path.leaf, left, right, separator
        );
        Ok(())
    }

    /// Point the leaf left of `old_leaf` at its replacement.
    fn relink_predecessor(&mut self, predecessor: PageId, old_leaf: PageId, new_leaf: PageId) -> Result<()> {
        let mut leaf = self.store.read_leaf(predecessor)?;
        if leaf.right_sibling != Some(old_leaf) {
            return Err(Error::corrupt(
                predecessor.0,
                format!("leaf chain does not lead to {old_leaf}"),
            ));
        }
        leaf.right_sibling = Some(new_leaf);
        self.store.write_leaf(predecessor, &leaf)
    }

    /// Hand a separator and two halves to the parent popped off `ancestors`.
    ///
    /// `old_child` is the page the halves replace. Pages retired further up
    /// are appended to `replaced`.
    #[allow(clippy::too_many_arguments)]
    fn promote(
        &mut self,
        mut ancestors: Vec<PathStep>,
        old_child: PageId,
        key: Key,
        left: PageId,
        right: PageId,
        child_kind: ChildKind,
        replaced: &mut Vec<PageId>,
    ) -> Result<()> {
        let Some(step) = ancestors.pop() else {
            // A leaf without ancestors sits under the root wrapper, which
            // is retired along with it.
            if child_kind == ChildKind::Leaf {
                replaced.push(self.meta.root_page_id);
            }
            return self.split_root(key, left, right, child_kind);
        };

        let mut parent = self.store.read_internal(step.page_id)?;
        if parent.is_full(self.store.node_capacity()) {
            return self.split_internal(
                ancestors,
                step.page_id,
                parent,
                (old_child, key, left, right),
                replaced,
            );
        }

        parent
            .insert_split_child(old_child, key, left, right)
            .ok_or_else(|| missing_child(step.page_id, old_child))?;
        self.store.write_internal(step.page_id, &parent)
    }

    /// Absorb a promoted separator into a full internal node by splitting it.
    ///
    /// `split` is the child being replaced, the separator, and the two
    /// halves replacing it.
    fn split_internal(
        &mut self,
        ancestors: Vec<PathStep>,
        page_id: PageId,
        node: InternalNode,
        split: (PageId, Key, PageId, PageId),
        replaced: &mut Vec<PageId>,
    ) -> Result<()> {
        let (old_child, key, left_child, right_child) = split;
        let InternalNode {
            mut keys,
            mut children,
            child_kind,
        } = node;

        let slot = children
            .iter()
            .position(|&c| c == old_child)
            .ok_or_else(|| missing_child(page_id, old_child))?;
        children[slot] = left_child;
        children.insert(slot + 1, right_child);
        keys.insert(slot, key);

        let mid = split_point(self.store.node_capacity());
        let right_keys = keys.split_off(mid + 1);
        let right_children = children.split_off(mid + 1);
        let median = keys
            .pop()
            .ok_or_else(|| Error::corrupt(page_id.0, "internal split on an empty node"))?;

        let right = self.store.allocate(&NodePage::Internal(InternalNode {
            keys: right_keys,
            children: right_children,
            child_kind,
        }))?;
        let left = self.store.allocate(&NodePage::Internal(InternalNode {
            keys,
            children,
            child_kind,
        }))?;

        replaced.push(page_id);
        self.promote(ancestors, page_id, median, left, right, ChildKind::Internal, replaced)?;

        self.stats.internal_splits += 1;
        debug!(
            "split internal {} into {} | {}, promoting {}",
            page_id, left, right, median
        );
        Ok(())
    }

    /// Install a new root above `left` and `right` and record it in the
    /// metadata page.
    fn split_root(&mut self, key: Key, left: PageId, right: PageId, child_kind: ChildKind) -> Result<()> {
        let root = self
            .store
            .allocate(&NodePage::Internal(InternalNode::new_root(key, left, right, child_kind)))?;

        let mut meta = self.meta.clone();
        meta.root_page_id = root;
        meta.write(self.store.bpm())?;
        self.meta = meta;

        self.stats.root_splits += 1;
        debug!("new root {} with separator {}", root, key);
        Ok(())
    }
}

/// Entries (or keys) kept by the left half when `capacity + 1` are split.
#[inline]
fn split_point(capacity: usize) -> usize {
    (capacity + 1) / 2
}

fn missing_child(parent: PageId, child: PageId) -> Error {
    Error::corrupt(parent.0, format!("{child} is not a child of this node"))
}
