//! LRU (Least-Recently-Used) replacement policy.

use std::collections::{HashMap, HashSet};

use crate::buffer::frame::FrameId;

/// Evicts the unpinned frame whose last access is oldest.
pub struct LruReplacer {
    /// Logical clock, bumped on every access.
    tick: u64,

    /// Last access tick per tracked frame.
    last_access: HashMap<FrameId, u64>,

    /// Frames that are currently evictable (pin_count == 0).
    evictable: HashSet<FrameId>,
}

impl LruReplacer {
    pub fn new() -> Self {
        Self {
            tick: 0,
            last_access: HashMap::new(),
            evictable: HashSet::new(),
        }
    }

    /// Record that a frame was accessed.
    pub fn record_access(&mut self, frame_id: FrameId) {
        self.tick += 1;
        self.last_access.insert(frame_id, self.tick);
    }

    /// Mark a frame as evictable (pin_count dropped to 0) or not.
    pub fn set_evictable(&mut self, frame_id: FrameId, evictable: bool) {
        if evictable {
            self.evictable.insert(frame_id);
        } else {
            self.evictable.remove(&frame_id);
        }
    }

    /// Select a victim frame for eviction.
    ///
    /// Returns the least recently accessed evictable frame, or None if all
    /// tracked frames are pinned. Linear in the pool size.
    pub fn evict(&mut self) -> Option<FrameId> {
        let victim = self
            .evictable
            .iter()
            .min_by_key(|fid| self.last_access.get(fid).copied().unwrap_or(0))
            .copied()?;

        self.remove(victim);
        Some(victim)
    }

    /// Stop tracking a frame entirely.
    ///
    /// Called when a page is deleted from the buffer pool.
    pub fn remove(&mut self, frame_id: FrameId) {
        self.evictable.remove(&frame_id);
        self.last_access.remove(&frame_id);
    }

    /// Number of evictable frames.
    pub fn size(&self) -> usize {
        self.evictable.len()
    }
}

impl Default for LruReplacer {
    fn default() -> Self {
        Self::new()
    }
}
