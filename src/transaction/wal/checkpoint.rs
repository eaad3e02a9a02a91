use std::sync::Arc;

use log::info;
use thiserror::Error;

use crate::common::types::Lsn;
use crate::storage::buffer::{BufferPool, BufferPoolError};
use crate::transaction::wal::log_record::LogRecord;
use crate::transaction::wal::wal_manager::{WalError, WalManager};

/// Error type for checkpoint operations
#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("WAL error: {0}")]
    Wal(#[from] WalError),

    #[error("Buffer pool error: {0}")]
    BufferPool(#[from] BufferPoolError),
}

/// Result type for checkpoint operations
pub type Result<T> = std::result::Result<T, CheckpointError>;

/// Writes quiescent checkpoints: with logged changes held off, flush every
/// dirty page, then mark the log.
///
/// Transactions that finished before a checkpoint have all their effects on
/// disk, so recovery no longer needs their records.
pub struct CheckpointManager {
    buffer_pool: Arc<BufferPool>,
    wal: Arc<WalManager>,
}

impl CheckpointManager {
    pub fn new(buffer_pool: Arc<BufferPool>, wal: Arc<WalManager>) -> Self {
        Self { buffer_pool, wal }
    }

    /// Create a checkpoint and return the LSN of its marker
    pub fn create_checkpoint(&self) -> Result<Lsn> {
        let _quiet = self.wal.quiesce();
        self.buffer_pool.flush_all_pages()?;
        let lsn = self.wal.append_next(|lsn| LogRecord::Checkpoint { lsn })?;

        info!("Checkpoint written at LSN {}", lsn);
        Ok(lsn)
    }
}
