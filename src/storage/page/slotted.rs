use crate::common::types::{PAGE_SIZE, SlotId};
use crate::storage::page::error::PageError;
use crate::storage::page::header::PageHeader;
use crate::storage::page::layout::{HEADER_SIZE, RecordLocation, SLOT_SIZE, slot_position};

/// Result of updating a record in place
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Same length, bytes overwritten in the same slot
    InPlace,
    /// Old slot tombstoned, record appended under a new slot of this page
    Relocated(SlotId),
    /// The new bytes do not fit in this page; the original record is untouched
    NoSpace,
}

/// Variable-length records inside one page buffer.
///
/// Layout: an 8-byte header, then the slot directory growing forward from
/// byte 8, while record bytes grow backward from the end of the page.
#[derive(Clone)]
pub struct SlottedPage {
    data: Box<[u8; PAGE_SIZE]>,
}

impl Default for SlottedPage {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SlottedPage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let header = self.header();
        f.debug_struct("SlottedPage")
            .field("slot_count", &header.slot_count)
            .field("free_space_pointer", &header.free_space_pointer)
            .finish()
    }
}

impl SlottedPage {
    pub fn new() -> Self {
        let mut page = Self {
            data: Box::new([0u8; PAGE_SIZE]),
        };
        page.write_header(&PageHeader::new());
        page
    }

    /// Wrap an existing page image, validating its header
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PageError> {
        if bytes.len() != PAGE_SIZE {
            return Err(PageError::CorruptHeader(format!(
                "expected {} bytes, got {}",
                PAGE_SIZE,
                bytes.len()
            )));
        }

        let mut data = Box::new([0u8; PAGE_SIZE]);
        data.copy_from_slice(bytes);
        let page = Self { data };

        let header = page.header();
        if header.free_space_pointer as usize > PAGE_SIZE
            || header.directory_end() > header.free_space_pointer as usize
        {
            return Err(PageError::CorruptHeader(format!(
                "slot count {} with free space pointer {}",
                header.slot_count, header.free_space_pointer
            )));
        }

        Ok(page)
    }

    pub fn as_bytes(&self) -> &[u8; PAGE_SIZE] {
        &self.data
    }

    pub fn header(&self) -> PageHeader {
        PageHeader::from_bytes(&self.data[0..HEADER_SIZE])
    }

    pub fn slot_count(&self) -> u32 {
        self.header().slot_count
    }

    /// Bytes available between the slot directory and the record area
    pub fn free_space(&self) -> usize {
        let header = self.header();
        header.free_space_pointer as usize - header.directory_end()
    }

    /// Whether a record of `len` bytes (plus its new slot) would fit
    pub fn can_fit(&self, len: usize) -> bool {
        self.free_space() >= len + SLOT_SIZE
    }

    pub fn insert_record(&mut self, data: &[u8]) -> Result<SlotId, PageError> {
        if data.is_empty() {
            return Err(PageError::EmptyRecord);
        }
        if !self.can_fit(data.len()) {
            return Err(PageError::InsufficientSpace);
        }

        let mut header = self.header();
        let offset = header.free_space_pointer - data.len() as u32;
        self.data[offset as usize..header.free_space_pointer as usize].copy_from_slice(data);

        let slot = header.slot_count;
        self.write_slot(slot, RecordLocation { offset, length: data.len() as u32 });

        header.slot_count += 1;
        header.free_space_pointer = offset;
        self.write_header(&header);

        Ok(slot)
    }

    /// Bytes of a live record, or None if the slot is out of range or deleted
    pub fn get_record(&self, slot: SlotId) -> Option<&[u8]> {
        let loc = self.slot(slot).ok()?;
        if loc.is_deleted() {
            return None;
        }
        let start = loc.offset as usize;
        Some(&self.data[start..start + loc.length as usize])
    }

    pub fn update_record(&mut self, slot: SlotId, data: &[u8]) -> Result<UpdateOutcome, PageError> {
        if data.is_empty() {
            return Err(PageError::EmptyRecord);
        }

        let loc = self.slot(slot)?;
        if loc.is_deleted() {
            return Err(PageError::RecordNotFound(slot));
        }

        if loc.length as usize == data.len() {
            let start = loc.offset as usize;
            self.data[start..start + data.len()].copy_from_slice(data);
            return Ok(UpdateOutcome::InPlace);
        }

        if !self.can_fit(data.len()) {
            return Ok(UpdateOutcome::NoSpace);
        }

        self.delete_record(slot)?;
        let new_slot = self.insert_record(data)?;
        Ok(UpdateOutcome::Relocated(new_slot))
    }

    /// Tombstone a record. Its bytes are reclaimed only by `compact`.
    pub fn delete_record(&mut self, slot: SlotId) -> Result<(), PageError> {
        let mut loc = self.slot(slot)?;
        if loc.is_deleted() {
            return Err(PageError::RecordNotFound(slot));
        }

        loc.length = 0;
        self.write_slot(slot, loc);
        Ok(())
    }

    /// Live records in slot order
    pub fn records(&self) -> impl Iterator<Item = (SlotId, &[u8])> + '_ {
        (0..self.slot_count()).filter_map(move |slot| self.get_record(slot).map(|bytes| (slot, bytes)))
    }

    pub fn live_record_count(&self) -> usize {
        self.records().count()
    }

    /// Rebuild the page from its live records in their original order.
    ///
    /// Returns, for every old slot, the slot the record now occupies
    /// (None for deleted slots).
    pub fn compact(&mut self) -> Vec<Option<SlotId>> {
        let old_slots = self.slot_count();
        let live: Vec<(SlotId, Vec<u8>)> = self
            .records()
            .map(|(slot, bytes)| (slot, bytes.to_vec()))
            .collect();

        let mut compacted = SlottedPage::new();
        let mut mapping = vec![None; old_slots as usize];
        for (old_slot, bytes) in live {
            // Live bytes fit in an empty page by construction.
            if let Ok(new_slot) = compacted.insert_record(&bytes) {
                mapping[old_slot as usize] = Some(new_slot);
            }
        }

        *self = compacted;
        mapping
    }

    fn slot(&self, slot: SlotId) -> Result<RecordLocation, PageError> {
        if slot >= self.slot_count() {
            return Err(PageError::InvalidSlotId(slot));
        }
        let pos = slot_position(slot);
        Ok(RecordLocation::from_bytes(&self.data[pos..pos + SLOT_SIZE]))
    }

    fn write_slot(&mut self, slot: SlotId, loc: RecordLocation) {
        let pos = slot_position(slot);
        self.data[pos..pos + SLOT_SIZE].copy_from_slice(&loc.to_bytes());
    }

    fn write_header(&mut self, header: &PageHeader) {
        self.data[0..HEADER_SIZE].copy_from_slice(&header.to_bytes());
    }
}
