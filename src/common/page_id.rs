//! Page identifier type.

use std::fmt;

/// Identifies a page in an index or heap file.
///
/// Page `N` lives at byte offset `N × PAGE_SIZE`. In an index file page 0
/// is reserved and page 1 holds the metadata record, so node pages always
/// have ids of 2 or more and 0 never names a node.
///
/// # Example
/// ```
/// use bplus_index::PageId;
///
/// let page_id = PageId::new(42);
/// assert!(page_id.is_node_page());
/// assert!(!PageId::META.is_node_page());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(pub u32);

impl PageId {
    /// Reserved first page of an index file.
    pub const RESERVED: PageId = PageId(0);

    /// Metadata page of an index file.
    pub const META: PageId = PageId(1);

    /// Create a new PageId.
    #[inline]
    pub fn new(id: u32) -> Self {
        PageId(id)
    }

    /// Whether this id can refer to a tree node.
    #[inline]
    pub fn is_node_page(&self) -> bool {
        self.0 > Self::META.0
    }

    /// Encode an optional link as a presence byte followed by the id.
    pub(crate) fn write_link(link: Option<PageId>, buf: &mut [u8]) {
        match link {
            Some(pid) => {
                buf[0] = 1;
                buf[1..5].copy_from_slice(&pid.0.to_le_bytes());
            }
            None => buf[..5].fill(0),
        }
    }

    /// Decode a link written by [`PageId::write_link`].
    pub(crate) fn read_link(buf: &[u8]) -> Option<PageId> {
        if buf[0] == 0 {
            None
        } else {
            Some(PageId(u32::from_le_bytes([buf[1], buf[2], buf[3], buf[4]])))
        }
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Page({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_id_new() {
        let pid = PageId::new(42);
        assert_eq!(pid.0, 42);
        assert!(pid.is_node_page());
    }

    #[test]
    fn test_reserved_pages_are_not_nodes() {
        assert!(!PageId::RESERVED.is_node_page());
        assert!(!PageId::META.is_node_page());
        assert!(PageId::new(2).is_node_page());
    }

    #[test]
    fn test_page_id_ordering() {
        assert!(PageId::new(1) < PageId::new(2));
        assert!(PageId::new(5) > PageId::new(3));
    }

    #[test]
    fn test_page_id_display() {
        assert_eq!(format!("{}", PageId::new(42)), "Page(42)");
    }

    #[test]
    fn test_link_encoding() {
        let mut buf = [0xFFu8; 5];
        PageId::write_link(None, &mut buf);
        assert_eq!(buf, [0; 5]);
        assert_eq!(PageId::read_link(&buf), None);

        PageId::write_link(Some(PageId::new(0x0102_0304)), &mut buf);
        assert_eq!(buf, [1, 0x04, 0x03, 0x02, 0x01]);
        assert_eq!(PageId::read_link(&buf), Some(PageId::new(0x0102_0304)));
    }
}
