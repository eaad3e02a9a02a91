use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use log::{debug, info};
use thiserror::Error;

use crate::common::types::{Lsn, PAGE_SIZE, PageId, TxnId};
use crate::storage::buffer::{BufferPool, BufferPoolError};
use crate::transaction::wal::log_record::LogRecord;
use crate::transaction::wal::wal_manager::{WalError, WalManager};

/// Error type for recovery operations
#[derive(Error, Debug)]
pub enum RecoveryError {
    #[error("WAL error: {0}")]
    Wal(#[from] WalError),

    #[error("Buffer pool error: {0}")]
    BufferPool(#[from] BufferPoolError),

    #[error("Update at LSN {lsn} does not fit in {page_id}")]
    InvalidUpdate { lsn: Lsn, page_id: PageId },
}

/// Result type for recovery operations
pub type Result<T> = std::result::Result<T, RecoveryError>;

/// Status of a transaction found in the log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    Committed,
    Aborted,
    /// No Commit or Abort record: in progress at crash time
    Active,
}

/// Summary of one recovery run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    pub committed: Vec<TxnId>,
    pub aborted: Vec<TxnId>,
    /// Losers rolled back during undo
    pub rolled_back: Vec<TxnId>,
    pub redo_count: usize,
    pub undo_count: usize,
}

impl RecoveryReport {
    pub fn is_empty(&self) -> bool {
        self.committed.is_empty() && self.aborted.is_empty() && self.rolled_back.is_empty()
    }
}

/// ARIES-style restart: analysis, redo, undo.
///
/// Must run before any new transaction is admitted.
pub struct RecoveryManager {
    wal: Arc<WalManager>,
    buffer_pool: Arc<BufferPool>,
}

impl RecoveryManager {
    pub fn new(wal: Arc<WalManager>, buffer_pool: Arc<BufferPool>) -> Self {
        Self { wal, buffer_pool }
    }

    /// Bring the pages back to the state where every committed transaction is
    /// applied and every other transaction is rolled back
    pub fn recover(&self) -> Result<RecoveryReport> {
        let logs: BTreeMap<TxnId, Vec<LogRecord>> = self
            .wal
            .transaction_ids()
            .into_iter()
            .map(|txn_id| (txn_id, self.wal.transaction_logs(txn_id)))
            .collect();

        if logs.is_empty() {
            debug!("Nothing to recover");
            return Ok(RecoveryReport::default());
        }

        let statuses = analyze(&logs);
        let mut report = RecoveryReport::default();
        for (&txn_id, &status) in &statuses {
            match status {
                TransactionStatus::Committed => report.committed.push(txn_id),
                TransactionStatus::Aborted => report.aborted.push(txn_id),
                TransactionStatus::Active => report.rolled_back.push(txn_id),
            }
        }
        info!(
            "Recovery analysis: {} committed, {} aborted, {} in progress",
            report.committed.len(),
            report.aborted.len(),
            report.rolled_back.len()
        );

        report.redo_count = self.redo(&logs, &statuses)?;
        report.undo_count = self.undo(&logs, &report.rolled_back)?;

        for &txn_id in &report.rolled_back {
            self.wal.append_next(|lsn| LogRecord::Abort { lsn, txn_id })?;
        }
        for &txn_id in logs.keys() {
            self.wal.clear_transaction_logs(txn_id);
        }

        info!(
            "Recovery complete: {} redone, {} undone",
            report.redo_count, report.undo_count
        );
        Ok(report)
    }

    /// Repeat history for finished transactions in LSN order, including the
    /// rollbacks of transactions that aborted
    fn redo(
        &self,
        logs: &BTreeMap<TxnId, Vec<LogRecord>>,
        statuses: &HashMap<TxnId, TransactionStatus>,
    ) -> Result<usize> {
        let mut history: Vec<&LogRecord> = logs
            .iter()
            .filter(|(txn_id, _)| statuses.get(txn_id) != Some(&TransactionStatus::Active))
            .flat_map(|(_, records)| records.iter())
            .collect();
        history.sort_by_key(|record| record.lsn());

        let mut applied = 0;
        for record in history {
            match record {
                LogRecord::Update { .. } => {
                    self.apply(record, false)?;
                    applied += 1;
                }
                LogRecord::Abort { lsn, txn_id } => {
                    let rollback = logs[txn_id]
                        .iter()
                        .rev()
                        .filter(|r| r.lsn() < *lsn && matches!(r, LogRecord::Update { .. }));
                    for update in rollback {
                        self.apply(update, true)?;
                        applied += 1;
                    }
                }
                _ => {}
            }
        }

        debug!("Redo applied {} images", applied);
        Ok(applied)
    }

    /// Restore the before-images of in-progress transactions, newest first
    fn undo(&self, logs: &BTreeMap<TxnId, Vec<LogRecord>>, losers: &[TxnId]) -> Result<usize> {
        let mut updates: Vec<&LogRecord> = losers
            .iter()
            .flat_map(|txn_id| logs[txn_id].iter())
            .filter(|record| matches!(record, LogRecord::Update { .. }))
            .collect();
        updates.sort_by_key(|record| std::cmp::Reverse(record.lsn()));

        for record in &updates {
            self.apply(record, true)?;
        }

        debug!("Undo restored {} images", updates.len());
        Ok(updates.len())
    }

    fn apply(&self, record: &LogRecord, before: bool) -> Result<()> {
        if let LogRecord::Update {
            lsn,
            page_id,
            offset,
            before_image,
            after_image,
            ..
        } = record
        {
            let image = if before { before_image } else { after_image };
            let offset = *offset as usize;
            if offset + image.len() > PAGE_SIZE {
                return Err(RecoveryError::InvalidUpdate {
                    lsn: *lsn,
                    page_id: *page_id,
                });
            }
            self.buffer_pool.write_bytes(*page_id, offset, image)?;
        }
        Ok(())
    }
}

/// Analysis: classify every transaction by its terminal record
fn analyze(logs: &BTreeMap<TxnId, Vec<LogRecord>>) -> HashMap<TxnId, TransactionStatus> {
    logs.iter()
        .map(|(&txn_id, records)| {
            let status = records
                .iter()
                .find_map(|record| match record {
                    LogRecord::Commit { .. } => Some(TransactionStatus::Committed),
                    LogRecord::Abort { .. } => Some(TransactionStatus::Aborted),
                    _ => None,
                })
                .unwrap_or(TransactionStatus::Active);
            (txn_id, status)
        })
        .collect()
}
