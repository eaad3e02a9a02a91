use std::collections::HashMap;
use std::sync::Arc;

use log::info;
use parking_lot::RwLock;
use thiserror::Error;

use crate::common::DatabaseConfig;
use crate::common::types::{Lsn, TxnId};
use crate::storage::buffer::{BufferPool, BufferPoolError};
use crate::storage::disk::{PageManager, PageManagerError};
use crate::storage::table::{Table, TableError};
use crate::transaction::concurrency::{
    IsolationLevel, LockManager, TransactionError, TransactionManager,
};
use crate::transaction::wal::checkpoint::CheckpointError;
use crate::transaction::wal::{
    CheckpointManager, RecoveryError, RecoveryManager, RecoveryReport, WalError, WalManager,
};

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Page manager error: {0}")]
    PageManager(#[from] PageManagerError),

    #[error("Buffer pool error: {0}")]
    BufferPool(#[from] BufferPoolError),

    #[error("WAL error: {0}")]
    Wal(#[from] WalError),

    #[error("Recovery failed: {0}")]
    Recovery(#[from] RecoveryError),

    #[error("Checkpoint failed: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] TableError),

    #[error("Table '{0}' already exists")]
    TableExists(String),
}

pub type Result<T> = std::result::Result<T, DatabaseError>;

/// Shared handle to a table
pub type TableRef = Arc<RwLock<Table>>;

/// Owns every engine component for one data directory.
///
/// Opening runs crash recovery before any transaction can begin.
pub struct Database {
    config: DatabaseConfig,
    page_manager: Arc<PageManager>,
    buffer_pool: Arc<BufferPool>,
    wal: Arc<WalManager>,
    checkpoints: CheckpointManager,
    txn_manager: TransactionManager,
    tables: RwLock<HashMap<String, TableRef>>,
    last_recovery: RecoveryReport,
}

impl Database {
    pub fn open(config: DatabaseConfig) -> Result<Self> {
        let page_manager = Arc::new(PageManager::new(&config.data_dir)?);
        let buffer_pool = Arc::new(BufferPool::new(config.pool_size, Arc::clone(&page_manager)));
        let wal = Arc::new(WalManager::open(config.wal_path())?);

        let last_recovery =
            RecoveryManager::new(Arc::clone(&wal), Arc::clone(&buffer_pool)).recover()?;

        let checkpoints = CheckpointManager::new(Arc::clone(&buffer_pool), Arc::clone(&wal));
        if config.checkpoint_on_open {
            checkpoints.create_checkpoint()?;
        }

        let lock_manager = Arc::new(LockManager::new(config.lock_retry_interval));
        let txn_manager = TransactionManager::new(
            Arc::clone(&wal),
            Arc::clone(&buffer_pool),
            lock_manager,
            config.lock_timeout,
        );

        info!("Opened database in {}", config.data_dir.display());
        Ok(Self {
            config,
            page_manager,
            buffer_pool,
            wal,
            checkpoints,
            txn_manager,
            tables: RwLock::new(HashMap::new()),
            last_recovery,
        })
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    pub fn buffer_pool(&self) -> &Arc<BufferPool> {
        &self.buffer_pool
    }

    pub fn page_manager(&self) -> &Arc<PageManager> {
        &self.page_manager
    }

    pub fn wal(&self) -> &Arc<WalManager> {
        &self.wal
    }

    pub fn transaction_manager(&self) -> &TransactionManager {
        &self.txn_manager
    }

    /// What recovery did when this database was opened
    pub fn last_recovery(&self) -> &RecoveryReport {
        &self.last_recovery
    }

    pub fn begin(&self, isolation_level: IsolationLevel) -> Result<TxnId> {
        Ok(self.txn_manager.begin(isolation_level)?)
    }

    pub fn commit(&self, txn_id: TxnId) -> Result<()> {
        Ok(self.txn_manager.commit(txn_id)?)
    }

    pub fn abort(&self, txn_id: TxnId) -> Result<()> {
        Ok(self.txn_manager.abort(txn_id)?)
    }

    pub fn create_table(&self, name: &str, has_primary_key: bool) -> Result<TableRef> {
        let mut tables = self.tables.write();
        if tables.contains_key(name) {
            return Err(DatabaseError::TableExists(name.to_string()));
        }

        let table = Arc::new(RwLock::new(Table::new(name, has_primary_key)));
        tables.insert(name.to_string(), Arc::clone(&table));
        Ok(table)
    }

    pub fn table(&self, name: &str) -> Option<TableRef> {
        self.tables.read().get(name).cloned()
    }

    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn checkpoint(&self) -> Result<Lsn> {
        Ok(self.checkpoints.create_checkpoint()?)
    }

    /// Checkpoint and release file handles
    pub fn close(self) -> Result<()> {
        self.checkpoints.create_checkpoint()?;
        self.page_manager.close()?;
        info!("Closed database in {}", self.config.data_dir.display());
        Ok(())
    }
}
