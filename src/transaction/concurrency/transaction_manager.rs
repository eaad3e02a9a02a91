use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use log::{debug, info};
use parking_lot::Mutex;

use crate::common::types::{Lsn, PAGE_SIZE, PageId, TxnId};
use crate::storage::buffer::BufferPool;
use crate::transaction::concurrency::lock_manager::{LockError, LockManager, LockMode};
use crate::transaction::concurrency::transaction::{
    IsolationLevel, Result, Transaction, TransactionError, TransactionState,
};
use crate::transaction::wal::{LogRecord, WalManager};

/// Transaction manager - responsible for creating and tracking transactions
pub struct TransactionManager {
    next_txn_id: AtomicU64,
    wal: Arc<WalManager>,
    buffer_pool: Arc<BufferPool>,
    lock_manager: Arc<LockManager>,
    lock_timeout: Duration,
    transactions: Mutex<HashMap<TxnId, Transaction>>,
}

impl TransactionManager {
    /// Transaction ids continue after the highest one already in the log
    pub fn new(
        wal: Arc<WalManager>,
        buffer_pool: Arc<BufferPool>,
        lock_manager: Arc<LockManager>,
        lock_timeout: Duration,
    ) -> Self {
        Self {
            next_txn_id: AtomicU64::new(wal.max_txn_id() + 1),
            wal,
            buffer_pool,
            lock_manager,
            lock_timeout,
            transactions: Mutex::new(HashMap::new()),
        }
    }

    pub fn lock_manager(&self) -> &Arc<LockManager> {
        &self.lock_manager
    }

    /// Begin a new transaction
    pub fn begin(&self, isolation_level: IsolationLevel) -> Result<TxnId> {
        let txn_id = self.next_txn_id.fetch_add(1, Ordering::SeqCst);
        self.wal.append_next(|lsn| LogRecord::Begin { lsn, txn_id })?;

        self.transactions
            .lock()
            .insert(txn_id, Transaction::new(txn_id, isolation_level));
        debug!("Began txn {} ({:?})", txn_id, isolation_level);
        Ok(txn_id)
    }

    /// Commit a transaction. Only the log is forced; dirty pages stay cached.
    pub fn commit(&self, txn_id: TxnId) -> Result<()> {
        self.claim_finish(txn_id)?;

        let logged = {
            let _change = self.wal.change_guard();
            self.wal.append_next(|lsn| LogRecord::Commit { lsn, txn_id })
        };
        if let Err(e) = logged {
            self.release_claim(txn_id);
            return Err(e.into());
        }
        self.finish(txn_id, TransactionState::Committed);

        info!("Committed txn {}", txn_id);
        Ok(())
    }

    /// Roll back every change of a transaction, newest first
    pub fn abort(&self, txn_id: TxnId) -> Result<()> {
        self.claim_finish(txn_id)?;

        let undone = match self.roll_back(txn_id) {
            Ok(undone) => undone,
            Err(e) => {
                self.release_claim(txn_id);
                return Err(e);
            }
        };
        self.finish(txn_id, TransactionState::Aborted);

        info!("Aborted txn {} ({} updates undone)", txn_id, undone);
        Ok(())
    }

    /// Overwrite bytes of a page on behalf of a transaction.
    ///
    /// Takes an exclusive lock on the page and makes the Update record
    /// durable before the page is touched.
    pub fn write(&self, txn_id: TxnId, page_id: PageId, offset: usize, bytes: &[u8]) -> Result<Lsn> {
        self.active(txn_id)?;
        if offset + bytes.len() > PAGE_SIZE {
            return Err(TransactionError::InvalidRange {
                page_id,
                offset,
                len: bytes.len(),
            });
        }

        self.lock(txn_id, &page_id.to_string(), LockMode::Exclusive)?;

        let _change = self.wal.change_guard();
        let before_image = self.buffer_pool.read_bytes(page_id, offset, bytes.len())?;
        let lsn = self.wal.append_next(|lsn| LogRecord::Update {
            lsn,
            txn_id,
            page_id,
            offset: offset as u32,
            before_image,
            after_image: bytes.to_vec(),
        })?;
        self.buffer_pool.write_bytes(page_id, offset, bytes)?;

        Ok(lsn)
    }

    /// Read bytes of a page, taking a shared lock unless the transaction
    /// reads uncommitted data
    pub fn read(&self, txn_id: TxnId, page_id: PageId, offset: usize, len: usize) -> Result<Vec<u8>> {
        let txn = self.active(txn_id)?;
        if offset + len > PAGE_SIZE {
            return Err(TransactionError::InvalidRange { page_id, offset, len });
        }

        if txn.isolation_level() != IsolationLevel::ReadUncommitted {
            self.lock(txn_id, &page_id.to_string(), LockMode::Shared)?;
        }
        Ok(self.buffer_pool.read_bytes(page_id, offset, len)?)
    }

    /// Lock an arbitrary resource for a transaction. On timeout or deadlock
    /// the caller is expected to abort.
    pub fn lock(&self, txn_id: TxnId, resource: &str, mode: LockMode) -> Result<()> {
        match self
            .lock_manager
            .acquire_lock(txn_id, resource, mode, self.lock_timeout)
        {
            Ok(true) => Ok(()),
            Ok(false) => Err(TransactionError::LockTimeout {
                txn_id,
                resource: resource.to_string(),
            }),
            Err(LockError::Deadlock { .. }) => Err(TransactionError::Deadlock(txn_id)),
        }
    }

    pub fn get_transaction(&self, txn_id: TxnId) -> Option<Transaction> {
        self.transactions.lock().get(&txn_id).cloned()
    }

    pub fn active_transaction_ids(&self) -> Vec<TxnId> {
        let mut ids: Vec<TxnId> = self
            .transactions
            .lock()
            .values()
            .filter(|txn| txn.is_active())
            .map(Transaction::id)
            .collect();
        ids.sort_unstable();
        ids
    }

    fn active(&self, txn_id: TxnId) -> Result<Transaction> {
        match self.transactions.lock().get(&txn_id) {
            Some(txn) if txn.is_active() => Ok(txn.clone()),
            Some(_) => Err(TransactionError::InvalidState(txn_id)),
            None => Err(TransactionError::NotFound(txn_id)),
        }
    }

    fn claim_finish(&self, txn_id: TxnId) -> Result<()> {
        match self.transactions.lock().get_mut(&txn_id) {
            Some(txn) => {
                if txn.claim_finish() {
                    Ok(())
                } else {
                    Err(TransactionError::InvalidState(txn_id))
                }
            }
            None => Err(TransactionError::NotFound(txn_id)),
        }
    }

    fn release_claim(&self, txn_id: TxnId) {
        if let Some(txn) = self.transactions.lock().get_mut(&txn_id) {
            txn.release_claim();
        }
    }

    /// Restore before-images newest first and log the Abort
    fn roll_back(&self, txn_id: TxnId) -> Result<usize> {
        let _change = self.wal.change_guard();
        let logs = self.wal.transaction_logs(txn_id);
        let mut undone = 0;
        for record in logs.iter().rev() {
            if let LogRecord::Update {
                page_id,
                offset,
                before_image,
                ..
            } = record
            {
                self.buffer_pool
                    .write_bytes(*page_id, *offset as usize, before_image)?;
                undone += 1;
            }
        }

        self.wal.append_next(|lsn| LogRecord::Abort { lsn, txn_id })?;
        Ok(undone)
    }

    fn finish(&self, txn_id: TxnId, state: TransactionState) {
        self.lock_manager.release_all_locks(txn_id);
        if let Some(txn) = self.transactions.lock().get_mut(&txn_id) {
            txn.finish(state);
        }
        self.wal.clear_transaction_logs(txn_id);
    }
}
