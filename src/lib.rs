// MiniDB storage and transaction engine

pub mod common;
pub mod database;
pub mod index;
pub mod storage;
pub mod transaction;

// Re-export key items for convenient access
pub use common::DatabaseConfig;
pub use database::{Database, DatabaseError, TableRef};
pub use index::BPlusTree;
pub use storage::buffer::{BufferPool, BufferPoolError};
pub use storage::disk::{PageManager, PageManagerError};
pub use storage::page::{PageError, SlottedPage};
pub use storage::table::{Record, Table, TableError};
pub use transaction::{
    IsolationLevel, LockManager, LockMode, TransactionError, TransactionManager, WalManager,
};
