use crate::common::types::FrameId;

/// LRU (Least Recently Used) victim selection over occupied frames.
///
/// Recency lives in each page's last-access tick, which is stamped on every
/// pin under the frame's shared latch. The replacer only tracks which frames
/// hold a page; the caller reports the tick of each evictable frame.
pub struct LRUReplacer {
    occupied: Vec<FrameId>,
}

impl LRUReplacer {
    pub fn new(pool_size: usize) -> Self {
        Self {
            occupied: Vec::with_capacity(pool_size),
        }
    }

    /// Start tracking a frame that now holds a page
    pub fn insert(&mut self, frame_id: FrameId) {
        if !self.occupied.contains(&frame_id) {
            self.occupied.push(frame_id);
        }
    }

    /// Pick the evictable frame with the oldest last-access tick and stop
    /// tracking it. `last_access` returns None for frames that must stay.
    pub fn victim(
        &mut self,
        mut last_access: impl FnMut(FrameId) -> Option<u64>,
    ) -> Option<FrameId> {
        let (pos, _) = self
            .occupied
            .iter()
            .enumerate()
            .filter_map(|(pos, &id)| last_access(id).map(|tick| (pos, tick)))
            .min_by_key(|&(_, tick)| tick)?;
        Some(self.occupied.swap_remove(pos))
    }
}
