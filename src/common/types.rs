use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

/// Page size in bytes (4KB)
pub const PAGE_SIZE: usize = 4096;

/// Identifies one storage file under the data directory
pub type FileId = u32;

/// Transaction ID type
pub type TxnId = u64;

/// Table-level surrogate record ID (1-based)
pub type RecordId = u32;

/// Slot index inside a slotted page
pub type SlotId = u32;

/// Buffer pool frame ID type
pub type FrameId = usize;

/// LSN (Log Sequence Number) type
pub type Lsn = u64;

/// Address of a page: which file it lives in and where in that file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId {
    pub file_id: FileId,
    pub page_number: u32,
}

impl PageId {
    /// Placeholder held by frames that have no resident page
    pub const INVALID: PageId = PageId {
        file_id: u32::MAX,
        page_number: u32::MAX,
    };

    pub fn new(file_id: FileId, page_number: u32) -> Self {
        Self { file_id, page_number }
    }

    /// Byte offset of this page inside its file
    pub fn file_offset(&self) -> u64 {
        self.page_number as u64 * PAGE_SIZE as u64
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Page({}:{})", self.file_id, self.page_number)
    }
}

/// In-memory copy of one disk page.
///
/// The bookkeeping fields are atomic so that pinning and marking dirty only
/// need the frame's shared latch.
#[derive(Debug)]
pub struct Page {
    pub data: [u8; PAGE_SIZE],
    pub page_id: PageId,
    dirty: AtomicBool,
    pin_count: AtomicU32,
    last_access: AtomicU64,
}

impl Page {
    pub fn new(page_id: PageId) -> Self {
        Self {
            data: [0; PAGE_SIZE],
            page_id,
            dirty: AtomicBool::new(false),
            pin_count: AtomicU32::new(0),
            last_access: AtomicU64::new(0),
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    pub fn mark_clean(&self) {
        self.dirty.store(false, Ordering::Release);
    }

    pub fn pin_count(&self) -> u32 {
        self.pin_count.load(Ordering::Acquire)
    }

    /// Pin the page and stamp it with the pool's access tick
    pub fn pin(&self, tick: u64) {
        self.pin_count.fetch_add(1, Ordering::AcqRel);
        self.last_access.store(tick, Ordering::Release);
    }

    /// Drop one pin. Returns false if the page was not pinned.
    pub fn unpin(&self) -> bool {
        self.pin_count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| count.checked_sub(1))
            .is_ok()
    }

    /// Tick of the most recent pin. Victim selection evicts the smallest.
    pub fn last_access(&self) -> u64 {
        self.last_access.load(Ordering::Acquire)
    }
}
