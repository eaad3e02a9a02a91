// Transaction management: WAL, locking, recovery

pub mod concurrency;
pub mod wal;

pub use concurrency::{
    IsolationLevel, LockManager, LockMode, Transaction, TransactionError, TransactionManager,
    TransactionState,
};
pub use wal::{CheckpointManager, LogRecord, LogRecordType, RecoveryManager, RecoveryReport, WalManager};
