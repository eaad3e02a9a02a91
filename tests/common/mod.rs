#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;
use tempfile::TempDir;

use minidb::storage::buffer::BufferPool;
use minidb::storage::disk::PageManager;
use minidb::{Database, DatabaseConfig};

// Create a buffer pool over a fresh temporary data directory
pub fn create_test_buffer_pool(pool_size: usize) -> Result<(Arc<BufferPool>, TempDir)> {
    let dir = tempfile::tempdir()?;
    let page_manager = Arc::new(PageManager::new(dir.path())?);
    Ok((Arc::new(BufferPool::new(pool_size, page_manager)), dir))
}

// Config for a test database with short lock waits
pub fn test_config(dir: &TempDir) -> DatabaseConfig {
    let mut config = DatabaseConfig::with_data_dir(dir.path());
    config.pool_size = 16;
    config.lock_timeout = std::time::Duration::from_millis(100);
    config.lock_retry_interval = std::time::Duration::from_millis(5);
    config
}

pub fn open_test_database(dir: &TempDir) -> Result<Database> {
    Ok(Database::open(test_config(dir))?)
}

// Generate test data of specified size
pub fn generate_test_data(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 256) as u8).collect()
}
