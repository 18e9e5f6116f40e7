//! Relation stored as an append-only file of slotted pages.
//!
//! # Page layout
//! ```text
//! Offset  Size      Field
//! ------  ----      -----
//! 0       13        PageHeader (type = Data)
//! 13      2         slot count
//! 15      2         start of the tuple area
//! 17      4 × n     slots: tuple offset (u16) + length (u16)
//! ...               free space
//! ..4096            tuples, packed from the end of the page
//! ```

use std::path::Path;

use log::debug;
use parking_lot::Mutex;

use crate::common::config::PAGE_SIZE;
use crate::common::{Error, PageId, RecordId, Result};
use crate::relation::{RelationSource, TupleIter};
use crate::storage::page::{Page, PageHeader, PageType};
use crate::storage::DiskManager;

const SLOT_COUNT_OFFSET: usize = PageHeader::SIZE;
const TUPLE_START_OFFSET: usize = SLOT_COUNT_OFFSET + 2;
const SLOTS_OFFSET: usize = TUPLE_START_OFFSET + 2;
const SLOT_SIZE: usize = 4;

/// Largest tuple a single page can hold.
pub const MAX_TUPLE_SIZE: usize = PAGE_SIZE - SLOTS_OFFSET - SLOT_SIZE;

/// A heap file relation named after its file.
pub struct HeapFile {
    name: String,
    disk: Mutex<DiskManager>,
    tuple_count: usize,
}

impl HeapFile {
    /// Create an empty relation at `<directory>/<name>`.
    pub fn create<P: AsRef<Path>>(directory: P, name: &str) -> Result<Self> {
        let disk = DiskManager::create(directory.as_ref().join(name))?;
        Ok(Self {
            name: name.to_string(),
            disk: Mutex::new(disk),
            tuple_count: 0,
        })
    }

    /// Open an existing relation at `<directory>/<name>`.
    pub fn open<P: AsRef<Path>>(directory: P, name: &str) -> Result<Self> {
        let mut disk = DiskManager::open(directory.as_ref().join(name))?;

        let mut tuple_count = 0;
        for page_id in 0..disk.page_count() {
            let page = disk.read_page(PageId::new(page_id))?;
            page.check(PageId::new(page_id), &[PageType::Data])?;
            tuple_count += slot_count(&page);
        }
        debug!("opened heap file {} with {} tuples", name, tuple_count);

        Ok(Self {
            name: name.to_string(),
            disk: Mutex::new(disk),
            tuple_count,
        })
    }

    /// Append a tuple, returning where it was stored.
    ///
    /// # Errors
    /// `Error::TupleTooLarge` if the tuple cannot fit in an empty page.
    pub fn insert(&mut self, tuple: &[u8]) -> Result<RecordId> {
        if tuple.len() > MAX_TUPLE_SIZE {
            return Err(Error::TupleTooLarge(tuple.len()));
        }

        let disk = self.disk.get_mut();
        let last = disk.page_count().checked_sub(1).map(PageId::new);

        let (page_id, mut page) = match last {
            Some(page_id) => {
                let page = disk.read_page(page_id)?;
                page.check(page_id, &[PageType::Data])?;
                if free_space(&page) >= tuple.len() + SLOT_SIZE {
                    (page_id, page)
                } else {
                    (disk.allocate_page()?, empty_page())
                }
            }
            None => (disk.allocate_page()?, empty_page()),
        };

        let slot = append(&mut page, tuple);
        disk.write_page(page_id, &page)?;
        self.tuple_count += 1;

        Ok(RecordId::new(page_id.0, slot))
    }

    /// Read the tuple stored at `rid`.
    pub fn get(&self, rid: RecordId) -> Result<Vec<u8>> {
        let page_id = PageId::new(rid.page_number);
        let page = self.read_data_page(page_id)?;
        tuple_at(&page, rid.slot_number)
            .map(<[u8]>::to_vec)
            .ok_or_else(|| Error::corrupt(page_id.0, format!("no tuple in slot {}", rid.slot_number)))
    }

    pub fn tuple_count(&self) -> usize {
        self.tuple_count
    }

    pub fn page_count(&self) -> u32 {
        self.disk.lock().page_count()
    }

    /// Force written pages to disk.
    pub fn sync(&mut self) -> Result<()> {
        self.disk.get_mut().sync()
    }

    fn read_data_page(&self, page_id: PageId) -> Result<Page> {
        let page = self.disk.lock().read_page(page_id)?;
        page.check(page_id, &[PageType::Data])?;
        Ok(page)
    }

    fn read_tuples(&self, page_id: PageId) -> Result<Vec<(RecordId, Vec<u8>)>> {
        let page = self.read_data_page(page_id)?;
        (0..slot_count(&page) as u16)
            .map(|slot| {
                tuple_at(&page, slot)
                    .map(|t| (RecordId::new(page_id.0, slot), t.to_vec()))
                    .ok_or_else(|| Error::corrupt(page_id.0, format!("slot {slot} out of bounds")))
            })
            .collect()
    }
}

impl RelationSource for HeapFile {
    fn relation_name(&self) -> &str {
        &self.name
    }

    fn scan(&self) -> Result<TupleIter<'_>> {
        Ok(Box::new(HeapScan {
            file: self,
            next_page: 0,
            page_count: self.page_count(),
            buffered: Vec::new().into_iter(),
        }))
    }
}

/// Page-at-a-time sequential scan.
struct HeapScan<'a> {
    file: &'a HeapFile,
    next_page: u32,
    page_count: u32,
    buffered: std::vec::IntoIter<(RecordId, Vec<u8>)>,
}

impl Iterator for HeapScan<'_> {
    type Item = Result<(RecordId, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(tuple) = self.buffered.next() {
                return Some(Ok(tuple));
            }
            if self.next_page >= self.page_count {
                return None;
            }

            let page_id = PageId::new(self.next_page);
            self.next_page += 1;
            match self.file.read_tuples(page_id) {
                Ok(tuples) => self.buffered = tuples.into_iter(),
                Err(e) => {
                    self.next_page = self.page_count;
                    return Some(Err(e));
                }
            }
        }
    }
}

fn empty_page() -> Page {
    let mut page = Page::new();
    page.init(PageType::Data);
    write_u16(&mut page, TUPLE_START_OFFSET, PAGE_SIZE as u16);
    page.seal();
    page
}

fn read_u16(page: &Page, at: usize) -> u16 {
    let data = page.as_slice();
    u16::from_le_bytes([data[at], data[at + 1]])
}

fn write_u16(page: &mut Page, at: usize, value: u16) {
    page.as_mut_slice()[at..at + 2].copy_from_slice(&value.to_le_bytes());
}

fn slot_count(page: &Page) -> usize {
    read_u16(page, SLOT_COUNT_OFFSET) as usize
}

fn free_space(page: &Page) -> usize {
    let slots_end = SLOTS_OFFSET + SLOT_SIZE * slot_count(page);
    (read_u16(page, TUPLE_START_OFFSET) as usize).saturating_sub(slots_end)
}

/// Store a tuple in a page known to have room for it.
fn append(page: &mut Page, tuple: &[u8]) -> u16 {
    let slot = slot_count(page);
    let start = read_u16(page, TUPLE_START_OFFSET) as usize - tuple.len();

    page.as_mut_slice()[start..start + tuple.len()].copy_from_slice(tuple);
    let slot_at = SLOTS_OFFSET + SLOT_SIZE * slot;
    write_u16(page, slot_at, start as u16);
    write_u16(page, slot_at + 2, tuple.len() as u16);
    write_u16(page, SLOT_COUNT_OFFSET, (slot + 1) as u16);
    write_u16(page, TUPLE_START_OFFSET, start as u16);
    page.seal();

    slot as u16
}

fn tuple_at(page: &Page, slot: u16) -> Option<&[u8]> {
    if slot as usize >= slot_count(page) {
        return None;
    }
    let slot_at = SLOTS_OFFSET + SLOT_SIZE * slot as usize;
    let start = read_u16(page, slot_at) as usize;
    let len = read_u16(page, slot_at + 2) as usize;
    page.as_slice().get(start..start + len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_insert_and_get() {
        let dir = tempdir().unwrap();
        let mut heap = HeapFile::create(dir.path(), "people").unwrap();

        let a = heap.insert(b"alice").unwrap();
        let b = heap.insert(b"bob").unwrap();

        assert_eq!(a, RecordId::new(0, 0));
        assert_eq!(b, RecordId::new(0, 1));
        assert_eq!(heap.get(a).unwrap(), b"alice");
        assert_eq!(heap.get(b).unwrap(), b"bob");
        assert!(heap.get(RecordId::new(0, 9)).is_err());
    }

    #[test]
    fn test_tuples_spill_to_new_pages() {
        let dir = tempdir().unwrap();
        let mut heap = HeapFile::create(dir.path(), "wide").unwrap();

        let tuple = vec![7u8; 1000];
        let rids: Vec<RecordId> = (0..10).map(|_| heap.insert(&tuple).unwrap()).collect();

        // four 1000-byte tuples (plus slots) fit in a page
        assert_eq!(rids[3], RecordId::new(0, 3));
        assert_eq!(rids[4], RecordId::new(1, 0));
        assert_eq!(heap.page_count(), 3);
        assert_eq!(heap.tuple_count(), 10);
    }

    #[test]
    fn test_scan_returns_everything_in_order() {
        let dir = tempdir().unwrap();
        let mut heap = HeapFile::create(dir.path(), "nums").unwrap();
        let mut expected = Vec::new();
        for i in 0..600i32 {
            let rid = heap.insert(&i.to_le_bytes()).unwrap();
            expected.push((rid, i.to_le_bytes().to_vec()));
        }

        let scanned: Vec<_> = heap.scan().unwrap().map(|t| t.unwrap()).collect();
        assert_eq!(scanned, expected);
    }

    #[test]
    fn test_reopen_counts_tuples() {
        let dir = tempdir().unwrap();
        {
            let mut heap = HeapFile::create(dir.path(), "r").unwrap();
            heap.insert(b"one").unwrap();
            heap.insert(b"two").unwrap();
            heap.sync().unwrap();
        }

        let heap = HeapFile::open(dir.path(), "r").unwrap();
        assert_eq!(heap.tuple_count(), 2);
        assert_eq!(heap.relation_name(), "r");
    }

    #[test]
    fn test_oversized_tuple_rejected() {
        let dir = tempdir().unwrap();
        let mut heap = HeapFile::create(dir.path(), "big").unwrap();
        assert!(matches!(
            heap.insert(&vec![0u8; MAX_TUPLE_SIZE + 1]),
            Err(Error::TupleTooLarge(_))
        ));
        assert!(heap.insert(&vec![0u8; MAX_TUPLE_SIZE]).is_ok());
    }
}
