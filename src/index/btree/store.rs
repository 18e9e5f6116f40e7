//! Typed node access over the buffer pool.
//!
//! [`NodeStore`] is the only place tree pages are fetched, so every read
//! decodes through the page's type tag and every write re-encodes and seals
//! the page under a write guard.

use log::{debug, warn};

use crate::buffer::BufferPoolManager;
use crate::common::{Error, PageId, Result};
use crate::index::btree::node::{InternalNode, LeafNode, NodePage, Root};
use crate::storage::page::PageType;

pub struct NodeStore {
    bpm: BufferPoolManager,
    leaf_capacity: usize,
    node_capacity: usize,
    /// Discarded pages that were pinned at the time; retried later.
    deferred: Vec<PageId>,
    discarded: u64,
}

impl NodeStore {
    pub fn new(bpm: BufferPoolManager, leaf_capacity: usize, node_capacity: usize) -> Self {
        Self {
            bpm,
            leaf_capacity,
            node_capacity,
            deferred: Vec::new(),
            discarded: 0,
        }
    }

    #[inline]
    pub fn bpm(&self) -> &BufferPoolManager {
        &self.bpm
    }

    #[inline]
    pub fn leaf_capacity(&self) -> usize {
        self.leaf_capacity
    }

    #[inline]
    pub fn node_capacity(&self) -> usize {
        self.node_capacity
    }

    pub fn read_node(&self, page_id: PageId) -> Result<NodePage> {
        let guard = self.bpm.fetch_page_read(page_id)?;
        NodePage::decode(page_id, &guard)
    }

    pub fn read_leaf(&self, page_id: PageId) -> Result<LeafNode> {
        let guard = self.bpm.fetch_page_read(page_id)?;
        LeafNode::decode(page_id, &guard)
    }

    pub fn read_internal(&self, page_id: PageId) -> Result<InternalNode> {
        let guard = self.bpm.fetch_page_read(page_id)?;
        InternalNode::decode(page_id, &guard)
    }

    /// Decode the root named by the metadata record.
    pub fn load_root(&self, root_page_id: PageId) -> Result<Root> {
        match self.read_node(root_page_id)? {
            NodePage::RootLeaf(leaf) => Ok(Root::SingleLeaf(leaf)),
            NodePage::Internal(node) => Ok(Root::Tree(node)),
            NodePage::Leaf(_) => Err(Error::corrupt(
                root_page_id.0,
                "root is a bare leaf instead of a wrapper or internal node",
            )),
        }
    }

    pub fn write_leaf(&self, page_id: PageId, leaf: &LeafNode) -> Result<()> {
        let mut guard = self.bpm.fetch_page_write(page_id)?;
        leaf.encode(&mut guard);
        Ok(())
    }

    pub fn write_internal(&self, page_id: PageId, node: &InternalNode) -> Result<()> {
        let mut guard = self.bpm.fetch_page_write(page_id)?;
        node.encode(&mut guard);
        Ok(())
    }

    /// Allocate a fresh page holding `node`.
    pub fn allocate(&self, node: &NodePage) -> Result<PageId> {
        let mut guard = self.bpm.new_page()?;
        node.encode(&mut guard);
        Ok(guard.page_id())
    }

    /// Allocate the placeholder page 0 of a new file.
    pub fn allocate_reserved(&self) -> Result<PageId> {
        let mut guard = self.bpm.new_page()?;
        guard.init(PageType::Reserved);
        guard.seal();
        Ok(guard.page_id())
    }

    /// Keep a page resident across calls. Paired with [`unpin`](Self::unpin).
    pub fn pin(&self, page_id: PageId) -> Result<()> {
        self.bpm.pin_page(page_id)
    }

    pub fn unpin(&self, page_id: PageId) -> Result<()> {
        self.bpm.unpin_page(page_id, false)
    }

    /// Retire a page replaced by a split.
    ///
    /// A page still pinned (by an active scan) is queued and retried by
    /// [`reclaim_deferred`](Self::reclaim_deferred).
    pub fn discard(&mut self, page_id: PageId) -> Result<()> {
        match self.bpm.delete_page(page_id) {
            Ok(()) => {
                self.discarded += 1;
                Ok(())
            }
            Err(Error::PagePinned(_)) => {
                warn!("{} is pinned, deferring its release", page_id);
                self.deferred.push(page_id);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Retry deletion of every deferred page that is no longer pinned.
    pub fn reclaim_deferred(&mut self) -> Result<()> {
        if self.deferred.is_empty() {
            return Ok(());
        }

        let pending = std::mem::take(&mut self.deferred);
        for page_id in pending {
            match self.bpm.delete_page(page_id) {
                Ok(()) => {
                    self.discarded += 1;
                    debug!("released deferred {}", page_id);
                }
                Err(Error::PagePinned(_)) => self.deferred.push(page_id),
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    pub fn deferred_count(&self) -> usize {
        self.deferred.len()
    }

    pub fn discarded_count(&self) -> u64 {
        self.discarded
    }
}
