use std::fmt;
use std::io::{Cursor, Read};

use byteorder::{BigEndian, ReadBytesExt};
use thiserror::Error;

use crate::common::types::{Lsn, PageId, TxnId};

/// Error type for log record operations
#[derive(Error, Debug, PartialEq, Eq)]
pub enum LogRecordError {
    #[error("Unknown log record type {0}")]
    UnknownType(u8),

    #[error("Log record truncated at offset {0}")]
    Truncated(usize),

    #[error("{0} unexpected bytes after log record")]
    TrailingBytes(usize),
}

/// Result type for log record operations
pub type Result<T> = std::result::Result<T, LogRecordError>;

/// On-disk tag of each record kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LogRecordType {
    Begin = 0,
    Update = 1,
    Commit = 2,
    Abort = 3,
    Checkpoint = 4,
}

impl TryFrom<u8> for LogRecordType {
    type Error = LogRecordError;

    fn try_from(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(LogRecordType::Begin),
            1 => Ok(LogRecordType::Update),
            2 => Ok(LogRecordType::Commit),
            3 => Ok(LogRecordType::Abort),
            4 => Ok(LogRecordType::Checkpoint),
            other => Err(LogRecordError::UnknownType(other)),
        }
    }
}

/// One entry of the write-ahead log
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogRecord {
    Begin {
        lsn: Lsn,
        txn_id: TxnId,
    },
    /// Byte range of a page changed from `before_image` to `after_image`
    Update {
        lsn: Lsn,
        txn_id: TxnId,
        page_id: PageId,
        offset: u32,
        before_image: Vec<u8>,
        after_image: Vec<u8>,
    },
    Commit {
        lsn: Lsn,
        txn_id: TxnId,
    },
    Abort {
        lsn: Lsn,
        txn_id: TxnId,
    },
    /// Every page dirtied before this record has been flushed
    Checkpoint {
        lsn: Lsn,
    },
}

// tag + lsn + txn id
const COMMON_HEADER_SIZE: usize = 1 + 8 + 8;

impl LogRecord {
    pub fn lsn(&self) -> Lsn {
        match self {
            LogRecord::Begin { lsn, .. }
            | LogRecord::Update { lsn, .. }
            | LogRecord::Commit { lsn, .. }
            | LogRecord::Abort { lsn, .. }
            | LogRecord::Checkpoint { lsn } => *lsn,
        }
    }

    /// Owning transaction; checkpoints belong to none and report 0
    pub fn txn_id(&self) -> TxnId {
        match self {
            LogRecord::Begin { txn_id, .. }
            | LogRecord::Update { txn_id, .. }
            | LogRecord::Commit { txn_id, .. }
            | LogRecord::Abort { txn_id, .. } => *txn_id,
            LogRecord::Checkpoint { .. } => 0,
        }
    }

    pub fn record_type(&self) -> LogRecordType {
        match self {
            LogRecord::Begin { .. } => LogRecordType::Begin,
            LogRecord::Update { .. } => LogRecordType::Update,
            LogRecord::Commit { .. } => LogRecordType::Commit,
            LogRecord::Abort { .. } => LogRecordType::Abort,
            LogRecord::Checkpoint { .. } => LogRecordType::Checkpoint,
        }
    }

    /// Commit or Abort: nothing follows for this transaction
    pub fn is_terminal(&self) -> bool {
        matches!(self, LogRecord::Commit { .. } | LogRecord::Abort { .. })
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(COMMON_HEADER_SIZE);
        buf.push(self.record_type() as u8);
        buf.extend_from_slice(&self.lsn().to_be_bytes());
        buf.extend_from_slice(&self.txn_id().to_be_bytes());

        if let LogRecord::Update {
            page_id,
            offset,
            before_image,
            after_image,
            ..
        } = self
        {
            buf.extend_from_slice(&page_id.file_id.to_be_bytes());
            buf.extend_from_slice(&page_id.page_number.to_be_bytes());
            buf.extend_from_slice(&offset.to_be_bytes());
            buf.extend_from_slice(&(before_image.len() as u32).to_be_bytes());
            buf.extend_from_slice(before_image);
            buf.extend_from_slice(&(after_image.len() as u32).to_be_bytes());
            buf.extend_from_slice(after_image);
        }

        buf
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(bytes);

        let tag = cursor.read_u8().map_err(|_| LogRecordError::Truncated(0))?;
        let record_type = LogRecordType::try_from(tag)?;
        let lsn = read_u64(&mut cursor)?;
        let txn_id = read_u64(&mut cursor)?;

        let record = match record_type {
            LogRecordType::Begin => LogRecord::Begin { lsn, txn_id },
            LogRecordType::Commit => LogRecord::Commit { lsn, txn_id },
            LogRecordType::Abort => LogRecord::Abort { lsn, txn_id },
            LogRecordType::Checkpoint => LogRecord::Checkpoint { lsn },
            LogRecordType::Update => {
                let file_id = read_u32(&mut cursor)?;
                let page_number = read_u32(&mut cursor)?;
                let offset = read_u32(&mut cursor)?;
                let before_len = read_u32(&mut cursor)? as usize;
                let before_image = read_image(&mut cursor, before_len)?;
                let after_len = read_u32(&mut cursor)? as usize;
                let after_image = read_image(&mut cursor, after_len)?;

                LogRecord::Update {
                    lsn,
                    txn_id,
                    page_id: PageId::new(file_id, page_number),
                    offset,
                    before_image,
                    after_image,
                }
            }
        };

        let trailing = bytes.len() - cursor.position() as usize;
        if trailing > 0 {
            return Err(LogRecordError::TrailingBytes(trailing));
        }
        Ok(record)
    }
}

fn read_u32(cursor: &mut Cursor<&[u8]>) -> Result<u32> {
    let position = cursor.position() as usize;
    cursor
        .read_u32::<BigEndian>()
        .map_err(|_| LogRecordError::Truncated(position))
}

fn read_u64(cursor: &mut Cursor<&[u8]>) -> Result<u64> {
    let position = cursor.position() as usize;
    cursor
        .read_u64::<BigEndian>()
        .map_err(|_| LogRecordError::Truncated(position))
}

fn read_image(cursor: &mut Cursor<&[u8]>, len: usize) -> Result<Vec<u8>> {
    let remaining = cursor.get_ref().len() - cursor.position() as usize;
    if len > remaining {
        return Err(LogRecordError::Truncated(cursor.position() as usize));
    }
    let mut image = vec![0u8; len];
    cursor
        .read_exact(&mut image)
        .map_err(|_| LogRecordError::Truncated(cursor.position() as usize))?;
    Ok(image)
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogRecord::Begin { lsn, txn_id } => write!(f, "[{}] BEGIN txn={}", lsn, txn_id),
            LogRecord::Commit { lsn, txn_id } => write!(f, "[{}] COMMIT txn={}", lsn, txn_id),
            LogRecord::Abort { lsn, txn_id } => write!(f, "[{}] ABORT txn={}", lsn, txn_id),
            LogRecord::Checkpoint { lsn } => write!(f, "[{}] CHECKPOINT", lsn),
            LogRecord::Update {
                lsn,
                txn_id,
                page_id,
                offset,
                before_image,
                after_image,
            } => write!(
                f,
                "[{}] UPDATE txn={} {} offset={} before={} after={}",
                lsn,
                txn_id,
                page_id,
                offset,
                hex::encode(before_image),
                hex::encode(after_image)
            ),
        }
    }
}
