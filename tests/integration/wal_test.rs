// WAL durability and format tests

use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Arc;
use std::thread;

use anyhow::Result;

use minidb::common::types::PageId;
use minidb::transaction::wal::{LogRecord, WalError, WalManager};

#[test]
fn test_records_survive_reopen() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("wal.log");

    {
        let wal = WalManager::open(&path)?;
        wal.append_next(|lsn| LogRecord::Begin { lsn, txn_id: 1 })?;
        wal.append_next(|lsn| LogRecord::Update {
            lsn,
            txn_id: 1,
            page_id: PageId::new(0, 2),
            offset: 16,
            before_image: vec![0; 4],
            after_image: b"data".to_vec(),
        })?;
    }

    let wal = WalManager::open(&path)?;
    let records = wal.read_all()?;
    assert_eq!(records.len(), 2);
    assert_eq!(records.iter().map(LogRecord::lsn).collect::<Vec<_>>(), vec![1, 2]);
    assert_eq!(wal.transaction_logs(1), records);
    assert_eq!(wal.max_txn_id(), 1);
    assert_eq!(wal.get_next_lsn(), 3);
    Ok(())
}

#[test]
fn test_frame_layout_on_disk() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("wal.log");
    let wal = WalManager::open(&path)?;
    wal.append_next(|lsn| LogRecord::Commit { lsn, txn_id: 5 })?;

    let bytes = std::fs::read(&path)?;
    assert_eq!(&bytes[0..4], &17u32.to_be_bytes());
    assert_eq!(bytes[4], 2);
    assert_eq!(&bytes[5..13], &1u64.to_be_bytes());
    assert_eq!(&bytes[13..21], &5u64.to_be_bytes());
    assert_eq!(bytes.len(), 21);
    Ok(())
}

#[test]
fn test_concurrent_appends_stay_ordered() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let wal = Arc::new(WalManager::open(dir.path().join("wal.log"))?);

    let handles: Vec<_> = (1..=4u64)
        .map(|txn_id| {
            let wal = Arc::clone(&wal);
            thread::spawn(move || -> Result<(), WalError> {
                for _ in 0..25 {
                    wal.append_next(|lsn| LogRecord::Begin { lsn, txn_id })?;
                }
                Ok(())
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("appender panicked")?;
    }

    let lsns: Vec<u64> = wal.read_all()?.iter().map(LogRecord::lsn).collect();
    assert_eq!(lsns, (1..=100).collect::<Vec<_>>());
    Ok(())
}

#[test]
fn test_torn_tail_then_append() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("wal.log");
    {
        let wal = WalManager::open(&path)?;
        wal.append_next(|lsn| LogRecord::Begin { lsn, txn_id: 1 })?;
    }
    // Crash in the middle of writing a length prefix
    OpenOptions::new().append(true).open(&path)?.write_all(&[0, 0])?;

    let wal = WalManager::open(&path)?;
    wal.append_next(|lsn| LogRecord::Commit { lsn, txn_id: 1 })?;

    let reopened = WalManager::open(&path)?;
    let records = reopened.read_all()?;
    assert_eq!(records.len(), 2);
    assert!(records[1].is_terminal());
    Ok(())
}
