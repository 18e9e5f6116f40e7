//! Structural integrity check.

use std::fmt;

use crate::common::{Error, Key, PageId, Result};
use crate::index::btree::index::BTreeIndex;
use crate::index::btree::navigator::leftmost_leaf;
use crate::index::btree::node::{ChildKind, Root};

/// Shape of a tree that passed [`BTreeIndex::verify`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TreeReport {
    /// Levels of internal nodes above the leaves; 0 for a single leaf.
    pub internal_levels: usize,
    pub internal_nodes: usize,
    pub leaf_count: usize,
    pub entry_count: usize,
}

impl fmt::Display for TreeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} internal levels, {} internal nodes, {} leaves, {} entries",
            self.internal_levels, self.internal_nodes, self.leaf_count, self.entry_count
        )
    }
}

/// Key range a subtree must stay within. Both ends are inclusive because
/// duplicates of a separator may sit on either side of it.
#[derive(Debug, Clone, Copy)]
struct Range {
    low: Option<Key>,
    high: Option<Key>,
}

impl Range {
    fn contains(&self, key: Key) -> bool {
        self.low.map_or(true, |l| key >= l) && self.high.map_or(true, |h| key <= h)
    }
}

struct Walk<'a> {
    index: &'a BTreeIndex,
    report: TreeReport,
    leaves: Vec<PageId>,
    leaf_depth: Option<usize>,
}

impl BTreeIndex {
    /// Walk the whole tree and check its invariants.
    ///
    /// Checks node occupancy, key order within and across nodes, that all
    /// leaves sit at one depth, and that the sibling chain visits the
    /// leaves in tree order and ends at the rightmost leaf.
    ///
    /// # Errors
    /// `Error::CorruptPage` naming the first page that breaks an invariant.
    pub fn verify(&self) -> Result<TreeReport> {
        let root_id = self.meta.root_page_id;
        let root = self.store.load_root(root_id)?;
        let first_leaf = leftmost_leaf(&self.store, root.clone())?;

        let mut walk = Walk {
            index: self,
            report: TreeReport::default(),
            leaves: Vec::new(),
            leaf_depth: None,
        };
        let everything = Range {
            low: None,
            high: None,
        };

        match root {
            Root::SingleLeaf(leaf) => walk.leaf(leaf, everything, 0)?,
            Root::Tree(node) => {
                walk.report.internal_nodes += 1;
                walk.children(root_id, &node.keys, &node.children, node.child_kind, everything, 1)?;
            }
        }

        let mut report = walk.report;
        report.internal_levels = walk.leaf_depth.unwrap_or(0);
        self.check_chain(first_leaf, &walk.leaves)?;
        Ok(report)
    }

    fn check_chain(&self, first: PageId, expected: &[PageId]) -> Result<()> {
        let mut current = Some(first);
        for &page_id in expected {
            match current {
                Some(pid) if pid == page_id => {}
                other => {
                    return Err(Error::corrupt(
                        page_id.0,
                        format!("leaf chain reached {other:?} where {page_id} was expected"),
                    ));
                }
            }
            current = self.store.read_leaf(page_id)?.right_sibling;
        }
        match current {
            None => Ok(()),
            Some(extra) => Err(Error::corrupt(extra.0, "leaf chain continues past the rightmost leaf")),
        }
    }
}

impl Walk<'_> {
    fn children(
        &mut self,
        page_id: PageId,
        keys: &[Key],
        children: &[PageId],
        kind: ChildKind,
        range: Range,
        depth: usize,
    ) -> Result<()> {
        let index = self.index;
        let store = &index.store;
        if keys.len() > store.node_capacity() || children.len() != keys.len() + 1 {
            return Err(Error::corrupt(
                page_id.0,
                format!("{} keys with {} children", keys.len(), children.len()),
            ));
        }
        if keys.windows(2).any(|w| w[0] > w[1]) {
            return Err(Error::corrupt(page_id.0, "separator keys out of order"));
        }
        if let Some(&bad) = keys.iter().find(|&&k| !range.contains(k)) {
            return Err(Error::corrupt(page_id.0, format!("separator {bad} outside parent range")));
        }

        for (slot, &child) in children.iter().enumerate() {
            let child_range = Range {
                low: if slot == 0 { range.low } else { Some(keys[slot - 1]) },
                high: if slot == keys.len() { range.high } else { Some(keys[slot]) },
            };
            match kind {
                ChildKind::Leaf => self.leaf(child, child_range, depth)?,
                ChildKind::Internal => {
                    let node = store.read_internal(child)?;
                    self.report.internal_nodes += 1;
                    self.children(child, &node.keys, &node.children, node.child_kind, child_range, depth + 1)?;
                }
            }
        }
        Ok(())
    }

    fn leaf(&mut self, page_id: PageId, range: Range, depth: usize) -> Result<()> {
        match self.leaf_depth {
            None => self.leaf_depth = Some(depth),
            Some(d) if d != depth => {
                return Err(Error::corrupt(
                    page_id.0,
                    format!("leaf at depth {depth}, others at {d}"),
                ));
            }
            Some(_) => {}
        }

        let leaf = self.index.store.read_leaf(page_id)?;
        if leaf.len() > self.index.store.leaf_capacity() {
            return Err(Error::corrupt(page_id.0, "leaf over capacity"));
        }
        if leaf.entries.windows(2).any(|w| w[0].key > w[1].key) {
            return Err(Error::corrupt(page_id.0, "leaf entries out of order"));
        }
        if let Some(bad) = leaf.entries.iter().find(|e| !range.contains(e.key)) {
            return Err(Error::corrupt(page_id.0, format!("key {} outside parent range", bad.key)));
        }

        self.report.leaf_count += 1;
        self.report.entry_count += leaf.len();
        self.leaves.push(page_id);
        Ok(())
    }
}
