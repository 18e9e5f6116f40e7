//! Node layouts and the non-splitting mutations on them.
//!
//! Each tree page decodes into a [`NodePage`]; the page header's type tag
//! picks the variant, so no page is ever interpreted by position alone.
//!
//! # Leaf layout
//! ```text
//! Offset  Size        Field
//! ------  ----        -----
//! 0       13          PageHeader (type = BTreeLeaf)
//! 13      2           entry count
//! 15      5           right sibling link (presence byte + page id)
//! 20      10 × cap    entries: key (i32) + RecordId (u32 page, u16 slot)
//! ```
//!
//! # Internal layout
//! ```text
//! 0       13          PageHeader (type = BTreeInternal)
//! 13      2           key count
//! 15      1           child kind (0 = internal children, 1 = leaf children)
//! 16      4 × MAX     keys
//! ..      4 × MAX+1   child page ids
//! ```
//!
//! # Root wrapper layout
//! ```text
//! 0       13          PageHeader (type = BTreeRootLeaf)
//! 13      4           the only leaf
//! ```

use crate::common::config::PAGE_SIZE;
use crate::common::{Error, Key, PageId, RecordId, Result};
use crate::storage::page::{Page, PageHeader, PageType};

const COUNT_OFFSET: usize = PageHeader::SIZE;

const LEAF_SIBLING_OFFSET: usize = COUNT_OFFSET + 2;
const LEAF_ENTRIES_OFFSET: usize = LEAF_SIBLING_OFFSET + 5;
const LEAF_ENTRY_SIZE: usize = 4 + RecordId::SIZE;

const INTERNAL_KIND_OFFSET: usize = COUNT_OFFSET + 2;
const INTERNAL_KEYS_OFFSET: usize = INTERNAL_KIND_OFFSET + 1;
const INTERNAL_CHILDREN_OFFSET: usize = INTERNAL_KEYS_OFFSET + 4 * MAX_NODE_CAPACITY;

const ROOT_LEAF_OFFSET: usize = PageHeader::SIZE;

/// Most entries a leaf page can hold.
pub const MAX_LEAF_CAPACITY: usize = (PAGE_SIZE - LEAF_ENTRIES_OFFSET) / LEAF_ENTRY_SIZE;

/// Most keys an internal page can hold (with one more child than keys).
pub const MAX_NODE_CAPACITY: usize = (PAGE_SIZE - INTERNAL_KEYS_OFFSET - 4) / 8;

/// A (key, record) pair stored in a leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeafEntry {
    pub key: Key,
    pub rid: RecordId,
}

impl LeafEntry {
    pub fn new(key: Key, rid: RecordId) -> Self {
        Self { key, rid }
    }
}

/// Leaf node: sorted entries plus a link to the next leaf in key order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeafNode {
    pub entries: Vec<LeafEntry>,
    pub right_sibling: Option<PageId>,
}

impl LeafNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<LeafEntry>, right_sibling: Option<PageId>) -> Self {
        Self {
            entries,
            right_sibling,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn is_full(&self, capacity: usize) -> bool {
        self.entries.len() >= capacity
    }

    pub fn first_key(&self) -> Option<Key> {
        self.entries.first().map(|e| e.key)
    }

    /// Index of the first entry whose key exceeds `key`, or the length.
    ///
    /// Equal keys therefore land after existing duplicates.
    pub fn insertion_point(&self, key: Key) -> usize {
        self.entries.partition_point(|e| e.key <= key)
    }

    /// Insert into a leaf that still has a free slot.
    ///
    /// Entries from the insertion point shift one slot right.
    pub fn insert(&mut self, key: Key, rid: RecordId) {
        let index = self.insertion_point(key);
        self.entries.insert(index, LeafEntry::new(key, rid));
    }

    pub fn encode(&self, page: &mut Page) {
        page.init(PageType::BTreeLeaf);
        let data = page.as_mut_slice();

        data[COUNT_OFFSET..COUNT_OFFSET + 2].copy_from_slice(&(self.entries.len() as u16).to_le_bytes());
        PageId::write_link(self.right_sibling, &mut data[LEAF_SIBLING_OFFSET..]);

        for (i, entry) in self.entries.iter().enumerate() {
            let at = LEAF_ENTRIES_OFFSET + i * LEAF_ENTRY_SIZE;
            data[at..at + 4].copy_from_slice(&entry.key.to_le_bytes());
            entry.rid.write_to(&mut data[at + 4..at + LEAF_ENTRY_SIZE]);
        }

        page.seal();
    }

    pub fn decode(page_id: PageId, page: &Page) -> Result<Self> {
        page.check(page_id, &[PageType::BTreeLeaf])?;
        Self::decode_body(page_id, page.as_slice())
    }

    fn decode_body(page_id: PageId, data: &[u8]) -> Result<Self> {
        let count = read_count(data);
        if count > MAX_LEAF_CAPACITY {
            return Err(Error::corrupt(page_id.0, format!("leaf count {count} exceeds page capacity")));
        }

        let entries = (0..count)
            .map(|i| {
                let at = LEAF_ENTRIES_OFFSET + i * LEAF_ENTRY_SIZE;
                LeafEntry {
                    key: read_i32(data, at),
                    rid: RecordId::from_bytes(&data[at + 4..at + LEAF_ENTRY_SIZE]),
                }
            })
            .collect();

        Ok(Self {
            entries,
            right_sibling: PageId::read_link(&data[LEAF_SIBLING_OFFSET..]),
        })
    }
}

/// What the children of an internal node are.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildKind {
    Internal = 0,
    Leaf = 1,
}

/// Internal node: `keys.len() + 1` children separated by `keys`.
///
/// Child `i` covers keys below `keys[i]` and at or above `keys[i - 1]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalNode {
    pub keys: Vec<Key>,
    pub children: Vec<PageId>,
    pub child_kind: ChildKind,
}

impl InternalNode {
    /// A fresh root with one separator and two children.
    pub fn new_root(key: Key, left: PageId, right: PageId, child_kind: ChildKind) -> Self {
        Self {
            keys: vec![key],
            children: vec![left, right],
            child_kind,
        }
    }

    #[inline]
    pub fn is_full(&self, capacity: usize) -> bool {
        self.keys.len() >= capacity
    }

    /// Child slot a descent for `key` follows: the first `i` with
    /// `key < keys[i]`, else the last child. Equal keys route right.
    pub fn child_slot(&self, key: Key) -> usize {
        self.keys.partition_point(|&k| k <= key)
    }

    /// Like [`child_slot`](Self::child_slot) but equal keys route left,
    /// reaching the leftmost leaf that may hold `key`.
    pub fn lower_bound_slot(&self, key: Key) -> usize {
        self.keys.partition_point(|&k| k < key)
    }

    pub fn slot_of(&self, child: PageId) -> Option<usize> {
        self.children.iter().position(|&c| c == child)
    }

    /// Replace a split child with its two halves, separated by `key`.
    ///
    /// The node must have a free key slot. Returns the slot `left` now
    /// occupies, or `None` if `old_child` is not a child of this node.
    pub fn insert_split_child(
        &mut self,
        old_child: PageId,
        key: Key,
        left: PageId,
        right: PageId,
    ) -> Option<usize> {
        let slot = self.slot_of(old_child)?;
        self.children[slot] = left;
        self.children.insert(slot + 1, right);
        self.keys.insert(slot, key);
        Some(slot)
    }

    pub fn encode(&self, page: &mut Page) {
        page.init(PageType::BTreeInternal);
        let data = page.as_mut_slice();

        data[COUNT_OFFSET..COUNT_OFFSET + 2].copy_from_slice(&(self.keys.len() as u16).to_le_bytes());
        data[INTERNAL_KIND_OFFSET] = self.child_kind as u8;

        for (i, key) in self.keys.iter().enumerate() {
            let at = INTERNAL_KEYS_OFFSET + 4 * i;
            data[at..at + 4].copy_from_slice(&key.to_le_bytes());
        }
        for (i, child) in self.children.iter().enumerate() {
            let at = INTERNAL_CHILDREN_OFFSET + 4 * i;
            data[at..at + 4].copy_from_slice(&child.0.to_le_bytes());
        }

        page.seal();
    }

    pub fn decode(page_id: PageId, page: &Page) -> Result<Self> {
        page.check(page_id, &[PageType::BTreeInternal])?;
        Self::decode_body(page_id, page.as_slice())
    }

    fn decode_body(page_id: PageId, data: &[u8]) -> Result<Self> {
        let count = read_count(data);
        if count == 0 || count > MAX_NODE_CAPACITY {
            return Err(Error::corrupt(page_id.0, format!("internal key count {count} out of range")));
        }
        let child_kind = match data[INTERNAL_KIND_OFFSET] {
            0 => ChildKind::Internal,
            1 => ChildKind::Leaf,
            other => {
                return Err(Error::corrupt(page_id.0, format!("unknown child kind {other}")));
            }
        };

        let keys = (0..count)
            .map(|i| read_i32(data, INTERNAL_KEYS_OFFSET + 4 * i))
            .collect();
        let children = (0..=count)
            .map(|i| PageId(read_u32(data, INTERNAL_CHILDREN_OFFSET + 4 * i)))
            .collect();

        Ok(Self {
            keys,
            children,
            child_kind,
        })
    }
}

/// A decoded tree page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodePage {
    Leaf(LeafNode),
    Internal(InternalNode),
    /// Root of a tree that has never split, naming its only leaf.
    RootLeaf(PageId),
}

impl NodePage {
    pub fn encode(&self, page: &mut Page) {
        match self {
            NodePage::Leaf(leaf) => leaf.encode(page),
            NodePage::Internal(node) => node.encode(page),
            NodePage::RootLeaf(leaf) => {
                page.init(PageType::BTreeRootLeaf);
                page.as_mut_slice()[ROOT_LEAF_OFFSET..ROOT_LEAF_OFFSET + 4]
                    .copy_from_slice(&leaf.0.to_le_bytes());
                page.seal();
            }
        }
    }

    pub fn decode(page_id: PageId, page: &Page) -> Result<Self> {
        let kind = page.check(
            page_id,
            &[PageType::BTreeLeaf, PageType::BTreeInternal, PageType::BTreeRootLeaf],
        )?;
        let data = page.as_slice();
        match kind {
            PageType::BTreeLeaf => Ok(NodePage::Leaf(LeafNode::decode_body(page_id, data)?)),
            PageType::BTreeInternal => {
                Ok(NodePage::Internal(InternalNode::decode_body(page_id, data)?))
            }
            _ => Ok(NodePage::RootLeaf(PageId(read_u32(data, ROOT_LEAF_OFFSET)))),
        }
    }
}

/// The root of the tree.
///
/// Until the first split the root is a wrapper around a single leaf; after
/// it, a proper internal node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Root {
    SingleLeaf(PageId),
    Tree(InternalNode),
}

fn read_count(data: &[u8]) -> usize {
    u16::from_le_bytes([data[COUNT_OFFSET], data[COUNT_OFFSET + 1]]) as usize
}

fn read_i32(data: &[u8], at: usize) -> i32 {
    i32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

fn read_u32(data: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}
