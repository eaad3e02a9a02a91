use thiserror::Error;
use crate::common::types::PageId;
use crate::storage::disk::PageManagerError;

#[derive(Error, Debug)]
pub enum BufferPoolError {
    #[error("{0} is not resident in the buffer pool")]
    PageNotResident(PageId),
    #[error("Buffer pool is full: every frame is pinned")]
    NoVictimFrame,
    #[error("Page manager error: {0}")]
    PageManagerError(#[from] PageManagerError),
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}
