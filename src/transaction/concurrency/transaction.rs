use std::time::Instant;

use thiserror::Error;

use crate::common::types::{PageId, TxnId};
use crate::storage::buffer::BufferPoolError;
use crate::transaction::wal::WalError;

/// Transaction isolation levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolationLevel {
    /// Reads take no locks
    ReadUncommitted,
    #[default]
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

/// Transaction states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Active,
    Committed,
    Aborted,
}

/// Errors that can occur during transaction processing
#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("Transaction {0} is already committed or aborted")]
    InvalidState(TxnId),

    #[error("Transaction {0} not found")]
    NotFound(TxnId),

    #[error("Transaction {txn_id} timed out waiting for lock on {resource}")]
    LockTimeout { txn_id: TxnId, resource: String },

    #[error("Transaction {0} was chosen as deadlock victim")]
    Deadlock(TxnId),

    #[error("Range of {len} bytes at offset {offset} does not fit in {page_id}")]
    InvalidRange {
        page_id: PageId,
        offset: usize,
        len: usize,
    },

    #[error("WAL error: {0}")]
    Wal(#[from] WalError),

    #[error("Buffer pool error: {0}")]
    BufferPool(#[from] BufferPoolError),
}

/// Result type for transaction operations
pub type Result<T> = std::result::Result<T, TransactionError>;

/// Snapshot of a transaction's bookkeeping
#[derive(Debug, Clone)]
pub struct Transaction {
    id: TxnId,
    isolation_level: IsolationLevel,
    state: TransactionState,
    start_time: Instant,
    finishing: bool,
}

impl Transaction {
    pub fn new(id: TxnId, isolation_level: IsolationLevel) -> Self {
        Self {
            id,
            isolation_level,
            state: TransactionState::Active,
            start_time: Instant::now(),
            finishing: false,
        }
    }

    pub fn id(&self) -> TxnId {
        self.id
    }

    pub fn isolation_level(&self) -> IsolationLevel {
        self.isolation_level
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn start_time(&self) -> Instant {
        self.start_time
    }

    /// Active and not already being committed or aborted
    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Active && !self.finishing
    }

    /// Reserve the transaction for a commit or abort. Only one caller wins.
    pub(crate) fn claim_finish(&mut self) -> bool {
        if !self.is_active() {
            return false;
        }
        self.finishing = true;
        true
    }

    /// Give a claim back after the commit or abort failed
    pub(crate) fn release_claim(&mut self) {
        self.finishing = false;
    }

    /// Move to a terminal state. Only the transaction manager does this.
    pub(crate) fn finish(&mut self, state: TransactionState) {
        self.state = state;
        self.finishing = false;
    }
}
