use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use log::{debug, trace};
use parking_lot::{Mutex, RwLockWriteGuard};

use crate::common::types::{FileId, FrameId, PAGE_SIZE, Page, PageId};
use crate::storage::buffer::error::BufferPoolError;
use crate::storage::buffer::frame::{Frame, PagePtr};
use crate::storage::buffer::replacer::LRUReplacer;
use crate::storage::disk::PageManager;

/// State guarded by the pool-wide lock
struct PoolState {
    page_table: HashMap<PageId, FrameId>,
    free_list: VecDeque<FrameId>,
    replacer: LRUReplacer,
}

/// Fixed-capacity page cache over a PageManager.
///
/// Dirty pages may be written back when evicted (STEAL) and nothing is
/// flushed on commit (NO-FORCE).
pub struct BufferPool {
    pool_size: usize,
    frames: Vec<PagePtr>,
    state: Mutex<PoolState>,
    clock: AtomicU64,
    page_manager: Arc<PageManager>,
}

impl BufferPool {
    pub fn new(pool_size: usize, page_manager: Arc<PageManager>) -> Self {
        let mut frames = Vec::with_capacity(pool_size);
        let mut free_list = VecDeque::with_capacity(pool_size);

        for frame_id in 0..pool_size {
            frames.push(Arc::new(Frame::new(frame_id)));
            free_list.push_back(frame_id);
        }

        Self {
            pool_size,
            frames,
            state: Mutex::new(PoolState {
                page_table: HashMap::new(),
                free_list,
                replacer: LRUReplacer::new(pool_size),
            }),
            clock: AtomicU64::new(1),
            page_manager,
        }
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn page_manager(&self) -> &Arc<PageManager> {
        &self.page_manager
    }

    /// Fetch a page, loading it from disk if it is not resident, and pin it
    pub fn fetch_page(&self, page_id: PageId) -> Result<PagePtr, BufferPoolError> {
        if page_id == PageId::INVALID {
            return Err(BufferPoolError::InvalidOperation(
                "Cannot fetch invalid page ID".to_string(),
            ));
        }

        loop {
            let mut state = self.state.lock();

            if let Some(&frame_id) = state.page_table.get(&page_id) {
                drop(state);

                // Membership is confirmed; pinning only needs the shared latch.
                // The frame may have been recycled in between, so re-check.
                let frame = &self.frames[frame_id];
                let page = frame.read();
                if page.page_id == page_id {
                    page.pin(self.tick());
                    return Ok(Arc::clone(frame));
                }
                continue;
            }

            // The frame stays latched until the new page is installed, so a
            // fetch racing on the evicted id can never pin it.
            let (frame_id, mut slot) = self.allocate_frame(&mut state)?;
            let page = match self.page_manager.read_page(page_id) {
                Ok(page) => page,
                Err(e) => {
                    drop(slot);
                    state.free_list.push_back(frame_id);
                    return Err(e.into());
                }
            };
            page.pin(self.tick());
            *slot = page;
            drop(slot);

            state.page_table.insert(page_id, frame_id);
            state.replacer.insert(frame_id);

            trace!("Loaded {} into frame {}", page_id, frame_id);
            return Ok(Arc::clone(&self.frames[frame_id]));
        }
    }

    /// Allocate a fresh page in `file_id` and return it pinned
    pub fn new_page(&self, file_id: FileId) -> Result<(PagePtr, PageId), BufferPoolError> {
        let page_id = self.page_manager.allocate_page(file_id)?;
        let page = self.fetch_page(page_id)?;
        Ok((page, page_id))
    }

    /// Unpin a page, potentially marking it as dirty
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> Result<(), BufferPoolError> {
        let frame = self.resident_frame(page_id)?;
        let page = frame.read();
        if page.page_id != page_id {
            return Err(BufferPoolError::PageNotResident(page_id));
        }

        if is_dirty {
            page.mark_dirty();
        }
        if !page.unpin() {
            trace!("Unpin of {} with pin count already 0", page_id);
        }

        Ok(())
    }

    /// Write a resident page back to disk if it is dirty. The page stays cached.
    pub fn flush_page(&self, page_id: PageId) -> Result<(), BufferPoolError> {
        let frame = self.resident_frame(page_id)?;
        let page = frame.read();
        if page.page_id != page_id {
            return Err(BufferPoolError::PageNotResident(page_id));
        }

        if page.is_dirty() {
            self.page_manager.write_page(&page)?;
        }
        Ok(())
    }

    /// Flush all dirty pages in the buffer pool to disk
    pub fn flush_all_pages(&self) -> Result<(), BufferPoolError> {
        let mut flushed = 0;
        for (page_id, frame_id) in self.resident_pages() {
            let page = self.frames[frame_id].read();
            // Evicted pages were already written back.
            if page.page_id == page_id && page.is_dirty() {
                self.page_manager.write_page(&page)?;
                flushed += 1;
            }
        }

        debug!("Flushed {} dirty pages", flushed);
        Ok(())
    }

    /// Copy `len` bytes at `offset` out of a page
    pub fn read_bytes(
        &self,
        page_id: PageId,
        offset: usize,
        len: usize,
    ) -> Result<Vec<u8>, BufferPoolError> {
        check_range(page_id, offset, len)?;
        let frame = self.fetch_page(page_id)?;
        let bytes = frame.read().data[offset..offset + len].to_vec();
        self.unpin_page(page_id, false)?;
        Ok(bytes)
    }

    /// Overwrite bytes at `offset` in a page and leave it dirty in the pool
    pub fn write_bytes(
        &self,
        page_id: PageId,
        offset: usize,
        bytes: &[u8],
    ) -> Result<(), BufferPoolError> {
        check_range(page_id, offset, bytes.len())?;
        let frame = self.fetch_page(page_id)?;
        {
            let mut page = frame.write();
            page.data[offset..offset + bytes.len()].copy_from_slice(bytes);
        }
        self.unpin_page(page_id, true)
    }

    pub fn is_resident(&self, page_id: PageId) -> bool {
        self.state.lock().page_table.contains_key(&page_id)
    }

    /// Pin count of a resident page
    pub fn pin_count(&self, page_id: PageId) -> Option<u32> {
        let frame = self.resident_frame(page_id).ok()?;
        let page = frame.read();
        (page.page_id == page_id).then(|| page.pin_count())
    }

    /// IDs of resident pages that have not been written back
    pub fn dirty_pages(&self) -> Vec<PageId> {
        let mut dirty: Vec<PageId> = self
            .resident_pages()
            .into_iter()
            .filter(|&(page_id, frame_id)| {
                let page = self.frames[frame_id].read();
                page.page_id == page_id && page.is_dirty()
            })
            .map(|(page_id, _)| page_id)
            .collect();
        dirty.sort();
        dirty
    }

    fn resident_frame(&self, page_id: PageId) -> Result<PagePtr, BufferPoolError> {
        let state = self.state.lock();
        match state.page_table.get(&page_id) {
            Some(&frame_id) => Ok(Arc::clone(&self.frames[frame_id])),
            None => Err(BufferPoolError::PageNotResident(page_id)),
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    /// Snapshot of the page table. Frame latches must not be taken while the
    /// pool lock is held, so callers inspect frames after this returns.
    fn resident_pages(&self) -> Vec<(PageId, FrameId)> {
        let state = self.state.lock();
        state.page_table.iter().map(|(&page_id, &frame_id)| (page_id, frame_id)).collect()
    }

    /// Take a frame from the free list, or evict the least recently accessed
    /// unpinned page. Dirty victims are written back first. The frame comes
    /// back latched and holding an invalid page.
    fn allocate_frame(
        &self,
        state: &mut PoolState,
    ) -> Result<(FrameId, RwLockWriteGuard<'_, Page>), BufferPoolError> {
        if let Some(frame_id) = state.free_list.pop_front() {
            return Ok((frame_id, self.frames[frame_id].write()));
        }

        loop {
            // A frame whose latch is held exclusively is being modified, and
            // modification requires a pin.
            let frames = &self.frames;
            let frame_id = state
                .replacer
                .victim(|id| {
                    let page = frames[id].try_read()?;
                    (page.pin_count() == 0).then(|| page.last_access())
                })
                .ok_or(BufferPoolError::NoVictimFrame)?;

            let mut page = self.frames[frame_id].write();
            if page.pin_count() > 0 {
                // Pinned between the check and the latch
                drop(page);
                state.replacer.insert(frame_id);
                continue;
            }

            if page.is_dirty() {
                if let Err(e) = self.page_manager.write_page(&page) {
                    drop(page);
                    state.replacer.insert(frame_id);
                    return Err(e.into());
                }
            }

            debug!("Evicted {} from frame {}", page.page_id, frame_id);
            state.page_table.remove(&page.page_id);
            *page = Page::new(PageId::INVALID);
            return Ok((frame_id, page));
        }
    }
}

fn check_range(page_id: PageId, offset: usize, len: usize) -> Result<(), BufferPoolError> {
    if offset.checked_add(len).is_none_or(|end| end > PAGE_SIZE) {
        return Err(BufferPoolError::InvalidOperation(format!(
            "byte range {}+{} outside {}",
            offset, len, page_id
        )));
    }
    Ok(())
}
