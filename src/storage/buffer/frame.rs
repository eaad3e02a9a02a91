use std::sync::Arc;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::common::types::{FrameId, Page, PageId};

/// One slot of the buffer pool.
///
/// The latch protects the resident page independently of the pool-wide lock.
/// Guards must be dropped before calling back into the pool (`fetch_page`,
/// `unpin_page`, ...) for the same frame.
#[derive(Debug)]
pub struct Frame {
    frame_id: FrameId,
    latch: RwLock<Page>,
}

/// Handle to a pinned page
pub type PagePtr = Arc<Frame>;

impl Frame {
    pub(crate) fn new(frame_id: FrameId) -> Self {
        Self {
            frame_id,
            latch: RwLock::new(Page::new(PageId::INVALID)),
        }
    }

    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    /// Take the shared latch
    pub fn read(&self) -> RwLockReadGuard<'_, Page> {
        self.latch.read()
    }

    /// Take the exclusive latch
    pub fn write(&self) -> RwLockWriteGuard<'_, Page> {
        self.latch.write()
    }

    pub(crate) fn try_read(&self) -> Option<RwLockReadGuard<'_, Page>> {
        self.latch.try_read()
    }
}
