//! Page - the fundamental 4KB unit of storage.
//!
//! A [`Page`] is a raw 4KB byte array that serves as the unit of I/O
//! between disk and memory. Index nodes and heap pages are encoded into
//! pages and decoded back out; nothing casts a page buffer to a struct.

use crate::common::config::PAGE_SIZE;
use crate::common::{Error, PageId, Result};

use super::page_header::{PageHeader, PageType};

/// A page of data (4KB, 4KB-aligned).
///
/// # Clone Implementation
/// `Page` does NOT implement `Clone` in production code: copying 4KB should
/// be explicit. A `#[cfg(test)]` Clone is provided for tests.
///
/// # Example
/// ```
/// use bplus_index::storage::page::{Page, PageType};
///
/// let mut page = Page::new();
/// page.init(PageType::BTreeLeaf);
/// page.as_mut_slice()[100] = 0xFF;
/// page.seal();
/// assert!(page.verify_checksum());
/// ```
#[repr(align(4096))]
pub struct Page {
    data: [u8; PAGE_SIZE],
}

impl Page {
    /// Create a new zeroed page.
    #[inline]
    pub fn new() -> Self {
        Self {
            data: [0u8; PAGE_SIZE],
        }
    }

    /// Get immutable slice of page data.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Get mutable slice of page data.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Zero out the entire page.
    pub fn reset(&mut self) {
        self.data.fill(0);
    }

    /// Get the size of a page.
    #[inline]
    pub const fn size() -> usize {
        PAGE_SIZE
    }

    /// Read the page header.
    pub fn header(&self) -> PageHeader {
        PageHeader::from_bytes(&self.data)
    }

    /// Write a page header.
    pub fn set_header(&mut self, header: &PageHeader) {
        header.write_to(&mut self.data);
    }

    /// Type tag from the header.
    pub fn page_type(&self) -> PageType {
        PageType::from_u8(self.data[PageHeader::OFFSET_PAGE_TYPE])
    }

    /// Zero the page and stamp a fresh header of the given type.
    pub fn init(&mut self, page_type: PageType) {
        self.reset();
        self.set_header(&PageHeader::new(page_type));
    }

    /// Compute and store checksum in the header.
    ///
    /// Call this after all modifications to the page are complete.
    pub fn seal(&mut self) {
        let checksum = PageHeader::compute_checksum(&self.data);
        self.data[PageHeader::OFFSET_CHECKSUM..PageHeader::OFFSET_CHECKSUM + 4]
            .copy_from_slice(&checksum.to_le_bytes());
    }

    /// Verify the page checksum is valid.
    pub fn verify_checksum(&self) -> bool {
        self.header().verify_checksum(&self.data)
    }

    /// Check the checksum and that the page carries one of `expected` types.
    ///
    /// # Errors
    /// Returns `Error::CorruptPage` describing the first failed check.
    pub fn check(&self, page_id: PageId, expected: &[PageType]) -> Result<PageType> {
        if !self.verify_checksum() {
            return Err(Error::corrupt(page_id.0, "checksum mismatch"));
        }
        let page_type = self.page_type();
        if !expected.contains(&page_type) {
            return Err(Error::corrupt(
                page_id.0,
                format!("unexpected page type {page_type:?}, wanted one of {expected:?}"),
            ));
        }
        Ok(page_type)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}

// Clone only available in tests - forces explicit copying in production
#[cfg(test)]
impl Clone for Page {
    fn clone(&self) -> Self {
        let mut new_page = Page::new();
        new_page.data.copy_from_slice(&self.data);
        new_page
    }
}
