//! The metadata record on page 1 of an index file.
//!
//! # Layout
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0       13    PageHeader (type = IndexMeta)
//! 13      20    relation name, truncated / null-padded
//! 33      4     attribute byte offset
//! 37      1     attribute type tag
//! 38      4     root page id
//! 42      2     leaf capacity
//! 44      2     internal node capacity
//! ```

use log::debug;

use crate::buffer::BufferPoolManager;
use crate::common::{AttrType, Error, MetaField, PageId, Result};
use crate::storage::page::{Page, PageHeader, PageType};

/// Width of the stored relation name.
pub const RELATION_NAME_LEN: usize = 20;

const NAME_OFFSET: usize = PageHeader::SIZE;
const ATTR_OFFSET_OFFSET: usize = NAME_OFFSET + RELATION_NAME_LEN;
const ATTR_TYPE_OFFSET: usize = ATTR_OFFSET_OFFSET + 4;
const ROOT_OFFSET: usize = ATTR_TYPE_OFFSET + 1;
const LEAF_CAP_OFFSET: usize = ROOT_OFFSET + 4;
const NODE_CAP_OFFSET: usize = LEAF_CAP_OFFSET + 2;

/// Decoded metadata record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexMeta {
    pub relation_name: [u8; RELATION_NAME_LEN],
    pub attr_byte_offset: u32,
    pub attr_type: AttrType,
    pub root_page_id: PageId,
    pub leaf_capacity: u16,
    pub node_capacity: u16,
}

impl IndexMeta {
    pub fn new(
        relation_name: &str,
        attr_byte_offset: u32,
        attr_type: AttrType,
        root_page_id: PageId,
        leaf_capacity: usize,
        node_capacity: usize,
    ) -> Self {
        Self {
            relation_name: pad_name(relation_name),
            attr_byte_offset,
            attr_type,
            root_page_id,
            leaf_capacity: leaf_capacity as u16,
            node_capacity: node_capacity as u16,
        }
    }

    /// The stored name with the null padding stripped.
    pub fn relation_name(&self) -> String {
        let end = self
            .relation_name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(RELATION_NAME_LEN);
        String::from_utf8_lossy(&self.relation_name[..end]).into_owned()
    }

    /// Compare against the parameters of an open request.
    ///
    /// Fields are checked in stored order and the first difference wins.
    ///
    /// # Errors
    /// `Error::ConfigMismatch` naming the field that differs.
    pub fn check_matches(
        &self,
        relation_name: &str,
        attr_byte_offset: u32,
        attr_type: AttrType,
    ) -> Result<()> {
        if self.relation_name != pad_name(relation_name) {
            return Err(Error::ConfigMismatch(MetaField::RelationName));
        }
        if self.attr_byte_offset != attr_byte_offset {
            return Err(Error::ConfigMismatch(MetaField::AttrByteOffset));
        }
        if self.attr_type != attr_type {
            return Err(Error::ConfigMismatch(MetaField::AttrType));
        }
        Ok(())
    }

    pub fn encode(&self, page: &mut Page) {
        page.init(PageType::IndexMeta);
        let data = page.as_mut_slice();

        data[NAME_OFFSET..NAME_OFFSET + RELATION_NAME_LEN].copy_from_slice(&self.relation_name);
        data[ATTR_OFFSET_OFFSET..ATTR_OFFSET_OFFSET + 4]
            .copy_from_slice(&self.attr_byte_offset.to_le_bytes());
        data[ATTR_TYPE_OFFSET] = self.attr_type as u8;
        data[ROOT_OFFSET..ROOT_OFFSET + 4].copy_from_slice(&self.root_page_id.0.to_le_bytes());
        data[LEAF_CAP_OFFSET..LEAF_CAP_OFFSET + 2].copy_from_slice(&self.leaf_capacity.to_le_bytes());
        data[NODE_CAP_OFFSET..NODE_CAP_OFFSET + 2].copy_from_slice(&self.node_capacity.to_le_bytes());

        page.seal();
    }

    pub fn decode(page: &Page) -> Result<Self> {
        page.check(PageId::META, &[PageType::IndexMeta])?;
        let data = page.as_slice();

        let mut relation_name = [0u8; RELATION_NAME_LEN];
        relation_name.copy_from_slice(&data[NAME_OFFSET..NAME_OFFSET + RELATION_NAME_LEN]);

        let attr_type = AttrType::from_u8(data[ATTR_TYPE_OFFSET]).ok_or_else(|| {
            Error::corrupt(
                PageId::META.0,
                format!("unknown attribute type tag {}", data[ATTR_TYPE_OFFSET]),
            )
        })?;

        let root = u32::from_le_bytes([
            data[ROOT_OFFSET],
            data[ROOT_OFFSET + 1],
            data[ROOT_OFFSET + 2],
            data[ROOT_OFFSET + 3],
        ]);
        if !PageId(root).is_node_page() {
            return Err(Error::corrupt(PageId::META.0, format!("root page id {root} is not a node page")));
        }

        Ok(Self {
            relation_name,
            attr_byte_offset: u32::from_le_bytes([
                data[ATTR_OFFSET_OFFSET],
                data[ATTR_OFFSET_OFFSET + 1],
                data[ATTR_OFFSET_OFFSET + 2],
                data[ATTR_OFFSET_OFFSET + 3],
            ]),
            attr_type,
            root_page_id: PageId(root),
            leaf_capacity: u16::from_le_bytes([data[LEAF_CAP_OFFSET], data[LEAF_CAP_OFFSET + 1]]),
            node_capacity: u16::from_le_bytes([data[NODE_CAP_OFFSET], data[NODE_CAP_OFFSET + 1]]),
        })
    }

    /// Load the record from page 1.
    pub fn read(bpm: &BufferPoolManager) -> Result<Self> {
        let guard = bpm.fetch_page_read(PageId::META)?;
        Self::decode(&guard)
    }

    /// Rewrite page 1 and force it to disk.
    pub fn write(&self, bpm: &BufferPoolManager) -> Result<()> {
        {
            let mut guard = bpm.fetch_page_write(PageId::META)?;
            self.encode(&mut guard);
        }
        bpm.flush_page(PageId::META)?;
        debug!("meta page written, root is {}", self.root_page_id);
        Ok(())
    }
}

/// Truncate or null-pad a relation name to the stored width.
pub fn pad_name(name: &str) -> [u8; RELATION_NAME_LEN] {
    let mut padded = [0u8; RELATION_NAME_LEN];
    let bytes = name.as_bytes();
    let len = bytes.len().min(RELATION_NAME_LEN);
    padded[..len].copy_from_slice(&bytes[..len]);
    padded
}
