use thiserror::Error;

use crate::common::types::RecordId;
use crate::storage::page::PageError;
use crate::storage::table::record::RecordError;

#[derive(Error, Debug)]
pub enum TableError {
    #[error("Table '{0}' has no primary key index")]
    NoIndex(String),
    #[error("Record {0} not found")]
    RecordNotFound(RecordId),
    #[error("Record of {size} bytes exceeds the {max} bytes a page can hold")]
    RecordTooLarge { size: usize, max: usize },
    #[error("Primary key must be a 4-byte integer in the first field")]
    InvalidPrimaryKey,
    #[error("Duplicate primary key {0}")]
    DuplicateKey(i32),
    #[error("Table storage is inconsistent: {0}")]
    Inconsistent(String),
    #[error("Page error: {0}")]
    PageError(#[from] PageError),
    #[error("Record error: {0}")]
    RecordError(#[from] RecordError),
}

pub type Result<T> = std::result::Result<T, TableError>;
