use byteorder::{BigEndian, ByteOrder};
use crate::common::types::PAGE_SIZE;
use crate::storage::page::layout::{HEADER_SIZE, SLOT_SIZE};

/// Slotted page header: number of slots and start of the record area
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageHeader {
    pub slot_count: u32,
    pub free_space_pointer: u32,
}

impl Default for PageHeader {
    fn default() -> Self {
        Self::new()
    }
}

impl PageHeader {
    pub fn new() -> Self {
        Self {
            slot_count: 0,
            free_space_pointer: PAGE_SIZE as u32,
        }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        BigEndian::write_u32(&mut bytes[0..4], self.slot_count);
        BigEndian::write_u32(&mut bytes[4..8], self.free_space_pointer);
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            slot_count: BigEndian::read_u32(&bytes[0..4]),
            free_space_pointer: BigEndian::read_u32(&bytes[4..8]),
        }
    }

    /// First byte after the slot directory
    pub fn directory_end(&self) -> usize {
        HEADER_SIZE + self.slot_count as usize * SLOT_SIZE
    }
}
