// Write-ahead logging, checkpoints and crash recovery

pub mod checkpoint;
pub mod log_record;
pub mod recovery;
pub mod wal_manager;

pub use checkpoint::CheckpointManager;
pub use log_record::{LogRecord, LogRecordError, LogRecordType};
pub use recovery::{RecoveryError, RecoveryManager, RecoveryReport};
pub use wal_manager::{WalError, WalManager};
