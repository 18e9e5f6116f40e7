//! Buffer Pool Manager - the page caching layer under the index.
//!
//! The [`BufferPoolManager`] provides:
//! - Page caching between disk and memory
//! - Pin-based reference counting, through RAII guards or the explicit
//!   [`pin_page`](BufferPoolManager::pin_page) /
//!   [`unpin_page`](BufferPoolManager::unpin_page) pair
//! - Automatic dirty page write-back
//! - Best-effort page deletion that refuses pinned pages

use std::collections::HashMap;

use log::{debug, trace};
use parking_lot::{Mutex, RwLock};

use crate::buffer::frame::{Frame, FrameId};
use crate::buffer::replacer::LruReplacer;
use crate::buffer::{BufferPoolStats, PageReadGuard, PageWriteGuard};
use crate::common::{Error, PageId, Result};
use crate::storage::DiskManager;

/// Manages a pool of buffer frames caching the pages of one file.
///
/// # Architecture
/// ```text
/// ┌─────────────────────────────────────────────────────────────┐
/// │                    BufferPoolManager                        │
/// │  ┌──────────────┐  ┌───────────────────────────────────┐   │
/// │  │ page_table   │  │        frames: Vec<Frame>         │   │
/// │  │PageId → Fid  │─▶│  [Frame0] [Frame1] [Frame2] ...   │   │
/// │  └──────────────┘  └───────────────────────────────────┘   │
/// │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐      │
/// │  │  free_list   │  │   replacer   │  │disk_manager  │      │
/// │  │ Vec<FrameId> │  │ LruReplacer  │  │   Mutex      │      │
/// │  └──────────────┘  └──────────────┘  └──────────────┘      │
/// └─────────────────────────────────────────────────────────────┘
/// ```
///
/// # Pin protocol
/// Every fetch or allocation pins the frame. Guards unpin on drop (write
/// guards also mark the page dirty). A caller that must keep a page
/// resident across calls, such as a scan cursor, uses `pin_page` and a
/// matching `unpin_page`.
///
/// # Usage
/// ```ignore
/// let dm = DiskManager::create("orders.4")?;
/// let bpm = BufferPoolManager::new(16, dm);
///
/// let mut guard = bpm.new_page()?;
/// guard.as_mut_slice()[0] = 0xAB;
/// // guard drops: page marked dirty, unpinned
///
/// let guard = bpm.fetch_page_read(PageId::new(0))?;
/// let data = guard.as_slice();
/// ```
pub struct BufferPoolManager {
    /// Fixed pool of frames allocated at startup.
    frames: Vec<Frame>,

    /// Maps page IDs to frame IDs.
    page_table: RwLock<HashMap<PageId, FrameId>>,

    /// Stack of free frame IDs (LIFO for cache locality).
    free_list: Mutex<Vec<FrameId>>,

    /// Eviction policy for selecting victim frames.
    replacer: Mutex<LruReplacer>,

    /// Handles all disk I/O.
    disk_manager: Mutex<DiskManager>,

    /// Performance statistics.
    stats: BufferPoolStats,
}

impl BufferPoolManager {
    /// Create a new buffer pool manager.
    ///
    /// # Panics
    /// Panics if `pool_size` is 0.
    pub fn new(pool_size: usize, disk_manager: DiskManager) -> Self {
        assert!(pool_size > 0, "pool_size must be > 0");

        let frames: Vec<Frame> = (0..pool_size).map(|_| Frame::new()).collect();
        let free_list: Vec<FrameId> = (0..pool_size).rev().map(FrameId::new).collect();

        Self {
            frames,
            page_table: RwLock::new(HashMap::new()),
            free_list: Mutex::new(free_list),
            replacer: Mutex::new(LruReplacer::new()),
            disk_manager: Mutex::new(disk_manager),
            stats: BufferPoolStats::new(),
        }
    }

    // ========================================================================
    // Fetch and allocate
    // ========================================================================

    /// Fetch a page for reading (shared access).
    ///
    /// # Errors
    /// - `Error::PageNotFound` if the page doesn't exist on disk
    /// - `Error::NoFreeFrames` if all frames are pinned
    pub fn fetch_page_read(&self, page_id: PageId) -> Result<PageReadGuard<'_>> {
        let frame_id = self.fetch_page_internal(page_id)?;
        let lock = self.frames[frame_id.0].page();

        Ok(PageReadGuard::new(self, frame_id, page_id, lock))
    }

    /// Fetch a page for writing (exclusive access).
    ///
    /// The page is marked dirty when the guard drops.
    ///
    /// # Errors
    /// - `Error::PageNotFound` if the page doesn't exist on disk
    /// - `Error::NoFreeFrames` if all frames are pinned
    pub fn fetch_page_write(&self, page_id: PageId) -> Result<PageWriteGuard<'_>> {
        let frame_id = self.fetch_page_internal(page_id)?;
        let lock = self.frames[frame_id.0].page_mut();

        Ok(PageWriteGuard::new(self, frame_id, page_id, lock))
    }

    /// Allocate a new zeroed page on disk and pin it in the pool.
    ///
    /// # Errors
    /// - `Error::NoFreeFrames` if all frames are pinned
    /// - I/O errors from disk allocation
    pub fn new_page(&self) -> Result<PageWriteGuard<'_>> {
        let frame_id = self.get_free_frame()?;

        let allocated = self.disk_manager.lock().allocate_page();
        let page_id = match allocated {
            Ok(pid) => pid,
            Err(e) => {
                self.free_list.lock().push(frame_id);
                return Err(e);
            }
        };

        let frame = &self.frames[frame_id.0];
        frame.page_mut().reset();
        self.install(frame_id, page_id);
        trace!("allocated {} in {}", page_id, frame_id);

        let lock = frame.page_mut();
        Ok(PageWriteGuard::new(self, frame_id, page_id, lock))
    }

    // ========================================================================
    // Explicit pinning
    // ========================================================================

    /// Pin a page without holding a lock on it.
    ///
    /// The page stays resident until a matching [`unpin_page`] call.
    ///
    /// [`unpin_page`]: BufferPoolManager::unpin_page
    pub fn pin_page(&self, page_id: PageId) -> Result<()> {
        self.fetch_page_internal(page_id).map(|_| ())
    }

    /// Release one pin on a resident page.
    ///
    /// # Errors
    /// Returns `Error::PageNotPinned` if the page is not resident or has no
    /// outstanding pins.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> Result<()> {
        let frame_id = self
            .lookup(page_id)
            .ok_or(Error::PageNotPinned(page_id.0))?;
        if !self.frames[frame_id.0].is_pinned() {
            return Err(Error::PageNotPinned(page_id.0));
        }
        self.unpin_page_internal(frame_id, is_dirty);
        Ok(())
    }

    /// Pin count of a resident page, `None` if it is not in the pool.
    pub fn get_pin_count(&self, page_id: PageId) -> Option<u32> {
        self.lookup(page_id)
            .map(|frame_id| self.frames[frame_id.0].pin_count())
    }

    /// Number of frames currently pinned by anyone.
    pub fn pinned_frame_count(&self) -> usize {
        self.frames.iter().filter(|f| f.is_pinned()).count()
    }

    // ========================================================================
    // Delete and flush
    // ========================================================================

    /// Drop a page from the pool and retire it on disk.
    ///
    /// Pending modifications are discarded, not written back.
    ///
    /// # Errors
    /// Returns `Error::PagePinned` if someone still holds the page.
    pub fn delete_page(&self, page_id: PageId) -> Result<()> {
        {
            let mut pt = self.page_table.write();
            if let Some(&frame_id) = pt.get(&page_id) {
                let frame = &self.frames[frame_id.0];
                if frame.is_pinned() {
                    BufferPoolStats::bump(&self.stats.delete_refusals);
                    return Err(Error::PagePinned(page_id.0));
                }

                pt.remove(&page_id);
                frame.clear();
                self.replacer.lock().remove(frame_id);
                self.free_list.lock().push(frame_id);
            }
        }

        self.disk_manager.lock().deallocate_page(page_id)?;
        BufferPoolStats::bump(&self.stats.pages_deleted);
        debug!("deleted {}", page_id);
        Ok(())
    }

    /// Write a page back to disk if it is resident and dirty.
    pub fn flush_page(&self, page_id: PageId) -> Result<()> {
        if let Some(frame_id) = self.lookup(page_id) {
            self.flush_frame(frame_id, page_id)?;
        }
        self.disk_manager.lock().sync()
    }

    /// Write every dirty page back and sync the file.
    pub fn flush_all_pages(&self) -> Result<()> {
        let pages: Vec<(PageId, FrameId)> = {
            let pt = self.page_table.read();
            pt.iter().map(|(&pid, &fid)| (pid, fid)).collect()
        };

        for (page_id, frame_id) in pages {
            self.flush_frame(frame_id, page_id)?;
        }

        self.disk_manager.lock().sync()
    }

    // ========================================================================
    // Stats and info
    // ========================================================================

    pub fn stats(&self) -> &BufferPoolStats {
        &self.stats
    }

    pub fn pool_size(&self) -> usize {
        self.frames.len()
    }

    pub fn free_frame_count(&self) -> usize {
        self.free_list.lock().len()
    }

    /// Number of pages resident in the pool.
    pub fn page_count(&self) -> usize {
        self.page_table.read().len()
    }

    /// Number of pages in the backing file.
    pub fn disk_page_count(&self) -> u32 {
        self.disk_manager.lock().page_count()
    }

    // ========================================================================
    // Internal
    // ========================================================================

    /// Unpin a frame. Called by the guards on drop and by `unpin_page`.
    pub(crate) fn unpin_page_internal(&self, frame_id: FrameId, is_dirty: bool) {
        let frame = &self.frames[frame_id.0];

        if is_dirty {
            frame.mark_dirty();
        }

        if frame.unpin() == 0 {
            self.replacer.lock().set_evictable(frame_id, true);
        }
    }

    fn lookup(&self, page_id: PageId) -> Option<FrameId> {
        self.page_table.read().get(&page_id).copied()
    }

    fn fetch_page_internal(&self, page_id: PageId) -> Result<FrameId> {
        if let Some(frame_id) = self.lookup(page_id) {
            self.frames[frame_id.0].pin();
            self.touch(frame_id);
            BufferPoolStats::bump(&self.stats.cache_hits);
            return Ok(frame_id);
        }

        BufferPoolStats::bump(&self.stats.cache_misses);
        let frame_id = self.get_free_frame()?;

        let loaded = self.disk_manager.lock().read_page(page_id);
        let page_data = match loaded {
            Ok(page) => page,
            Err(e) => {
                self.free_list.lock().push(frame_id);
                return Err(e);
            }
        };
        BufferPoolStats::bump(&self.stats.pages_read);

        self.frames[frame_id.0]
            .page_mut()
            .as_mut_slice()
            .copy_from_slice(page_data.as_slice());
        self.install(frame_id, page_id);

        Ok(frame_id)
    }

    /// Bind a prepared frame to `page_id` with a single pin.
    fn install(&self, frame_id: FrameId, page_id: PageId) {
        let frame = &self.frames[frame_id.0];
        frame.set_page_id(Some(page_id));
        frame.pin();
        self.page_table.write().insert(page_id, frame_id);
        self.touch(frame_id);
    }

    fn touch(&self, frame_id: FrameId) {
        let mut replacer = self.replacer.lock();
        replacer.record_access(frame_id);
        replacer.set_evictable(frame_id, false);
    }

    fn get_free_frame(&self) -> Result<FrameId> {
        if let Some(frame_id) = self.free_list.lock().pop() {
            return Ok(frame_id);
        }
        self.evict_page()
    }

    fn evict_page(&self) -> Result<FrameId> {
        let frame_id = self.replacer.lock().evict().ok_or(Error::NoFreeFrames)?;
        BufferPoolStats::bump(&self.stats.evictions);

        let frame = &self.frames[frame_id.0];
        if let Some(old_page_id) = frame.page_id() {
            self.flush_frame(frame_id, old_page_id)?;
            self.page_table.write().remove(&old_page_id);
            trace!("evicted {} from {}", old_page_id, frame_id);
        }
        frame.clear();

        Ok(frame_id)
    }

    fn flush_frame(&self, frame_id: FrameId, page_id: PageId) -> Result<()> {
        let frame = &self.frames[frame_id.0];

        if frame.is_dirty() {
            let page = frame.page();
            self.disk_manager.lock().write_page(page_id, &page)?;
            drop(page);

            frame.clear_dirty();
            BufferPoolStats::bump(&self.stats.pages_written);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::page::PageType;
    use tempfile::tempdir;

    fn create_test_bpm(pool_size: usize) -> (BufferPoolManager, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let dm = DiskManager::create(dir.path().join("rel.0")).unwrap();
        (BufferPoolManager::new(pool_size, dm), dir)
    }

    #[test]
    fn test_new_page_ids_are_sequential() {
        let (bpm, _dir) = create_test_bpm(4);

        assert_eq!(bpm.new_page().unwrap().page_id(), PageId::new(0));
        assert_eq!(bpm.new_page().unwrap().page_id(), PageId::new(1));
        assert_eq!(bpm.disk_page_count(), 2);
    }

    #[test]
    fn test_dirty_page_flushed_on_eviction() {
        let (bpm, _dir) = create_test_bpm(1);

        {
            let mut guard = bpm.new_page().unwrap();
            guard.as_mut_slice()[0] = 0x42;
        }
        {
            let _guard = bpm.new_page().unwrap();
        }

        let guard = bpm.fetch_page_read(PageId::new(0)).unwrap();
        assert_eq!(guard.as_slice()[0], 0x42);
        assert!(bpm.stats().snapshot().evictions >= 1);
    }

    #[test]
    fn test_explicit_pin_and_unpin() {
        let (bpm, _dir) = create_test_bpm(4);
        let pid = bpm.new_page().unwrap().page_id();
        assert_eq!(bpm.get_pin_count(pid), Some(0));

        bpm.pin_page(pid).unwrap();
        bpm.pin_page(pid).unwrap();
        assert_eq!(bpm.get_pin_count(pid), Some(2));
        assert_eq!(bpm.pinned_frame_count(), 1);

        bpm.unpin_page(pid, false).unwrap();
        bpm.unpin_page(pid, false).unwrap();
        assert_eq!(bpm.get_pin_count(pid), Some(0));
        assert!(matches!(
            bpm.unpin_page(pid, false),
            Err(Error::PageNotPinned(_))
        ));
    }

    #[test]
    fn test_unpin_unknown_page_fails() {
        let (bpm, _dir) = create_test_bpm(4);
        assert!(matches!(
            bpm.unpin_page(PageId::new(9), true),
            Err(Error::PageNotPinned(9))
        ));
    }

    #[test]
    fn test_delete_page_retires_on_disk() {
        let (bpm, _dir) = create_test_bpm(4);
        let pid = {
            let mut guard = bpm.new_page().unwrap();
            guard.init(PageType::BTreeLeaf);
            guard.seal();
            guard.page_id()
        };

        bpm.delete_page(pid).unwrap();
        assert_eq!(bpm.page_count(), 0);
        assert_eq!(bpm.free_frame_count(), 4);

        let guard = bpm.fetch_page_read(pid).unwrap();
        assert_eq!(guard.page_type(), PageType::Free);
        assert_eq!(bpm.stats().snapshot().pages_deleted, 1);
    }

    #[test]
    fn test_delete_pinned_page_is_refused() {
        let (bpm, _dir) = create_test_bpm(4);
        let guard = bpm.new_page().unwrap();
        let pid = guard.page_id();

        assert!(matches!(bpm.delete_page(pid), Err(Error::PagePinned(_))));
        assert_eq!(bpm.stats().snapshot().delete_refusals, 1);

        drop(guard);
        assert!(bpm.delete_page(pid).is_ok());
    }

    #[test]
    fn test_no_free_frames() {
        let (bpm, _dir) = create_test_bpm(2);

        let _guard1 = bpm.new_page().unwrap();
        let _guard2 = bpm.new_page().unwrap();

        assert!(matches!(bpm.new_page(), Err(Error::NoFreeFrames)));
    }

    #[test]
    fn test_failed_fetch_returns_frame() {
        let (bpm, _dir) = create_test_bpm(2);

        assert!(bpm.fetch_page_read(PageId::new(99)).is_err());
        assert_eq!(bpm.free_frame_count(), 2);
    }

    #[test]
    fn test_flush_all_pages_writes_dirty_frames() {
        let (bpm, _dir) = create_test_bpm(8);
        for i in 0..5u8 {
            let mut guard = bpm.new_page().unwrap();
            guard.as_mut_slice()[0] = i;
        }

        bpm.flush_all_pages().unwrap();
        assert_eq!(bpm.stats().snapshot().pages_written, 5);

        bpm.flush_all_pages().unwrap();
        assert_eq!(bpm.stats().snapshot().pages_written, 5);
    }
}
