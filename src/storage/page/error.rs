use thiserror::Error;
use crate::common::types::SlotId;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PageError {
    #[error("Not enough space in page")]
    InsufficientSpace,
    #[error("Record in slot {0} not found")]
    RecordNotFound(SlotId),
    #[error("Invalid slot ID: {0}")]
    InvalidSlotId(SlotId),
    #[error("Empty records cannot be stored")]
    EmptyRecord,
    #[error("Corrupt page header: {0}")]
    CorruptHeader(String),
}
