use std::path::PathBuf;
use std::time::Duration;

/// Configuration for opening a database directory
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Directory holding the page files and the WAL
    pub data_dir: PathBuf,

    /// Number of frames in the buffer pool
    pub pool_size: usize,

    /// File name of the write-ahead log inside `data_dir`
    pub wal_file_name: String,

    /// How long a transaction waits for a lock before giving up
    pub lock_timeout: Duration,

    /// Sleep between lock acquisition attempts
    pub lock_retry_interval: Duration,

    /// Flush all pages and write a checkpoint once recovery finishes
    pub checkpoint_on_open: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            pool_size: 100,
            wal_file_name: "wal.log".to_string(),
            lock_timeout: Duration::from_secs(5),
            lock_retry_interval: Duration::from_millis(10),
            checkpoint_on_open: true,
        }
    }
}

impl DatabaseConfig {
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join(&self.wal_file_name)
    }
}
