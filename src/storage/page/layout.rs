use byteorder::{BigEndian, ByteOrder};
use crate::common::types::{PAGE_SIZE, SlotId};

pub const HEADER_SIZE: usize = 8; // slot count + free space pointer
pub const SLOT_SIZE: usize = 8; // 4 bytes for offset + 4 bytes for length

/// Largest record a single empty page can hold
pub const MAX_RECORD_SIZE: usize = PAGE_SIZE - HEADER_SIZE - SLOT_SIZE;

/// Slot directory entry. A length of 0 marks a deleted record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLocation {
    pub offset: u32,
    pub length: u32,
}

impl RecordLocation {
    pub fn is_deleted(&self) -> bool {
        self.length == 0
    }

    pub fn to_bytes(&self) -> [u8; SLOT_SIZE] {
        let mut bytes = [0u8; SLOT_SIZE];
        BigEndian::write_u32(&mut bytes[0..4], self.offset);
        BigEndian::write_u32(&mut bytes[4..8], self.length);
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        let offset = BigEndian::read_u32(&bytes[0..4]);
        let length = BigEndian::read_u32(&bytes[4..8]);
        Self { offset, length }
    }
}

/// Byte position of a slot's directory entry
pub fn slot_position(slot: SlotId) -> usize {
    HEADER_SIZE + slot as usize * SLOT_SIZE
}
