use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;

use crate::common::types::{Lsn, TxnId};
use crate::transaction::wal::log_record::{LogRecord, LogRecordError};

/// Size of the length prefix in front of every record
const FRAME_HEADER_SIZE: usize = 4;

#[derive(Error, Debug)]
pub enum WalError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Corrupt log frame at offset {offset}: {source}")]
    Corrupt {
        offset: u64,
        source: LogRecordError,
    },

    #[error("LSN {lsn} is not greater than the last appended LSN {last}")]
    LsnOutOfOrder { lsn: Lsn, last: Lsn },
}

/// Result type for WAL operations
pub type Result<T> = std::result::Result<T, WalError>;

/// Append side of the log, guarded by the write lock
struct LogWriter {
    file: File,
    end_offset: u64,
    last_lsn: Option<Lsn>,
}

/// Durable, strictly ordered write-ahead log.
///
/// Every append is forced to stable storage before it returns. Records are
/// also retained in memory per transaction until the transaction finishes,
/// which is what abort and recovery read.
pub struct WalManager {
    path: PathBuf,
    writer: Mutex<LogWriter>,
    next_lsn: AtomicU64,
    max_txn_id: AtomicU64,
    txn_logs: Mutex<HashMap<TxnId, Vec<LogRecord>>>,
    checkpoint_gate: RwLock<()>,
}

impl WalManager {
    /// Open or create the log at `path` and reload whatever it already holds
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        let (records, valid_len) = decode_frames(&bytes)?;

        if valid_len < bytes.len() as u64 {
            warn!(
                "Truncating {} bytes of torn log tail in {}",
                bytes.len() as u64 - valid_len,
                path.display()
            );
            file.set_len(valid_len)?;
            file.sync_all()?;
        }
        file.seek(SeekFrom::Start(valid_len))?;

        let last_lsn = records.last().map(LogRecord::lsn);
        let wal = Self {
            path,
            writer: Mutex::new(LogWriter {
                file,
                end_offset: valid_len,
                last_lsn,
            }),
            next_lsn: AtomicU64::new(last_lsn.map_or(1, |lsn| lsn + 1)),
            max_txn_id: AtomicU64::new(0),
            txn_logs: Mutex::new(HashMap::new()),
            checkpoint_gate: RwLock::new(()),
        };

        for record in &records {
            wal.retain(record);
        }

        info!(
            "Opened WAL {} with {} records, next LSN {}",
            wal.path.display(),
            records.len(),
            wal.next_lsn.load(Ordering::SeqCst)
        );
        Ok(wal)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reserve the next LSN
    pub fn get_next_lsn(&self) -> Lsn {
        self.next_lsn.fetch_add(1, Ordering::SeqCst)
    }

    /// Append a record carrying an LSN obtained from `get_next_lsn` and force
    /// it to disk. LSNs must strictly increase in append order.
    pub fn append_log(&self, record: LogRecord) -> Result<Lsn> {
        let mut writer = self.writer.lock();
        self.append_locked(&mut writer, record)
    }

    /// Allocate an LSN and append the record built from it, both under the
    /// write lock, so concurrent appenders can never interleave out of order.
    pub fn append_next(&self, build: impl FnOnce(Lsn) -> LogRecord) -> Result<Lsn> {
        let mut writer = self.writer.lock();
        let record = build(self.get_next_lsn());
        self.append_locked(&mut writer, record)
    }

    /// Hold across a logged change and the page writes it describes.
    /// A checkpoint cannot start while any such guard is alive.
    pub fn change_guard(&self) -> RwLockReadGuard<'_, ()> {
        self.checkpoint_gate.read()
    }

    /// Wait for in-flight changes to drain and keep new ones out
    pub fn quiesce(&self) -> RwLockWriteGuard<'_, ()> {
        self.checkpoint_gate.write()
    }

    /// LSN of the most recently appended record
    pub fn last_lsn(&self) -> Option<Lsn> {
        self.writer.lock().last_lsn
    }

    /// Highest transaction ID seen in the log
    pub fn max_txn_id(&self) -> TxnId {
        self.max_txn_id.load(Ordering::SeqCst)
    }

    /// Records retained for a transaction, in LSN order
    pub fn transaction_logs(&self, txn_id: TxnId) -> Vec<LogRecord> {
        self.txn_logs.lock().get(&txn_id).cloned().unwrap_or_default()
    }

    pub fn clear_transaction_logs(&self, txn_id: TxnId) {
        self.txn_logs.lock().remove(&txn_id);
    }

    /// Transactions that currently have retained records
    pub fn transaction_ids(&self) -> Vec<TxnId> {
        let mut ids: Vec<TxnId> = self.txn_logs.lock().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Re-read every durable record from disk
    pub fn read_all(&self) -> Result<Vec<LogRecord>> {
        let mut bytes = Vec::new();
        File::open(&self.path)?.read_to_end(&mut bytes)?;
        let (records, _) = decode_frames(&bytes)?;
        Ok(records)
    }

    fn append_locked(&self, writer: &mut LogWriter, record: LogRecord) -> Result<Lsn> {
        let lsn = record.lsn();
        if let Some(last) = writer.last_lsn.filter(|&last| lsn <= last) {
            return Err(WalError::LsnOutOfOrder { lsn, last });
        }

        let body = record.serialize();
        let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + body.len());
        frame.extend_from_slice(&(body.len() as u32).to_be_bytes());
        frame.extend_from_slice(&body);

        let written = writer
            .file
            .write_all(&frame)
            .and_then(|_| writer.file.sync_data());
        if let Err(e) = written {
            // Drop any partial frame so later appends stay readable
            let _ = writer.file.set_len(writer.end_offset);
            let _ = writer.file.seek(SeekFrom::Start(writer.end_offset));
            return Err(e.into());
        }

        writer.end_offset += frame.len() as u64;
        writer.last_lsn = Some(lsn);
        self.next_lsn.fetch_max(lsn + 1, Ordering::SeqCst);
        self.retain(&record);

        debug!("Appended {}", record);
        Ok(lsn)
    }

    fn retain(&self, record: &LogRecord) {
        let mut txn_logs = self.txn_logs.lock();
        match record {
            LogRecord::Checkpoint { .. } => {
                // Checkpoints are quiescent, so every change of a finished
                // transaction reached disk before the marker
                txn_logs.retain(|_, logs| !logs.last().is_some_and(LogRecord::is_terminal));
            }
            _ => {
                let txn_id = record.txn_id();
                self.max_txn_id.fetch_max(txn_id, Ordering::SeqCst);
                txn_logs.entry(txn_id).or_default().push(record.clone());
            }
        }
    }
}

/// Split a log image into records. Returns the records and the length of the
/// prefix made of complete frames; anything after it is a torn write.
fn decode_frames(bytes: &[u8]) -> Result<(Vec<LogRecord>, u64)> {
    let mut records = Vec::new();
    let mut pos = 0usize;

    while bytes.len() - pos >= FRAME_HEADER_SIZE {
        let mut len_bytes = [0u8; FRAME_HEADER_SIZE];
        len_bytes.copy_from_slice(&bytes[pos..pos + FRAME_HEADER_SIZE]);
        let len = u32::from_be_bytes(len_bytes) as usize;

        let start = pos + FRAME_HEADER_SIZE;
        if bytes.len() - start < len {
            break;
        }

        let record = LogRecord::deserialize(&bytes[start..start + len]).map_err(|source| {
            WalError::Corrupt {
                offset: pos as u64,
                source,
            }
        })?;
        records.push(record);
        pos = start + len;
    }

    Ok((records, pos as u64))
}
