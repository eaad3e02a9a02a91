// Crash recovery integration tests

use anyhow::Result;
use tempfile::TempDir;

#[path = "../common/mod.rs"]
mod common;
use common::{open_test_database, test_config};

use minidb::common::types::PageId;
use minidb::transaction::wal::LogRecord;
use minidb::{Database, IsolationLevel, PageManager};

/// Two allocated, empty pages in file 0
fn allocate_pages(dir: &TempDir) -> Result<(PageId, PageId)> {
    let pm = PageManager::new(dir.path())?;
    Ok((pm.allocate_page(0)?, pm.allocate_page(0)?))
}

fn on_disk(dir: &TempDir, page_id: PageId, offset: usize, len: usize) -> Result<Vec<u8>> {
    let pm = PageManager::new(dir.path())?;
    Ok(pm.read_page(page_id)?.data[offset..offset + len].to_vec())
}

/// Committed write never flushed, uncommitted write stolen to disk, then crash
fn crash_with_winner_and_loser(dir: &TempDir) -> Result<(PageId, PageId)> {
    let (page_a, page_b) = allocate_pages(dir)?;
    let db = open_test_database(dir)?;
    let tm = db.transaction_manager();

    let winner = db.begin(IsolationLevel::ReadCommitted)?;
    tm.write(winner, page_a, 0, b"committed")?;
    db.commit(winner)?;

    let loser = db.begin(IsolationLevel::ReadCommitted)?;
    tm.write(loser, page_b, 0, b"uncommitted")?;
    db.buffer_pool().flush_page(page_b)?;

    // Crash: the pool is dropped without flushing
    drop(db);
    Ok((page_a, page_b))
}

#[test]
fn test_committed_redone_uncommitted_undone() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let (page_a, page_b) = crash_with_winner_and_loser(&dir)?;

    assert_eq!(on_disk(&dir, page_a, 0, 9)?, [0; 9]);
    assert_eq!(on_disk(&dir, page_b, 0, 11)?, b"uncommitted");

    let db = open_test_database(&dir)?;
    let report = db.last_recovery().clone();
    assert_eq!(report.committed.len(), 1);
    assert_eq!(report.rolled_back.len(), 1);
    assert_eq!(report.redo_count, 1);
    assert_eq!(report.undo_count, 1);

    assert_eq!(db.buffer_pool().read_bytes(page_a, 0, 9)?, b"committed");
    assert_eq!(db.buffer_pool().read_bytes(page_b, 0, 11)?, [0; 11]);
    db.close()?;

    // The checkpoint on open made the result durable
    assert_eq!(on_disk(&dir, page_a, 0, 9)?, b"committed");
    assert_eq!(on_disk(&dir, page_b, 0, 11)?, [0; 11]);
    Ok(())
}

#[test]
fn test_recovery_is_idempotent_across_repeated_crashes() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let (page_a, page_b) = crash_with_winner_and_loser(&dir)?;

    let mut config = test_config(&dir);
    config.checkpoint_on_open = false;

    // Recover, then crash again before anything is flushed
    for _ in 0..3 {
        let db = Database::open(config.clone())?;
        assert_eq!(db.buffer_pool().read_bytes(page_a, 0, 9)?, b"committed");
        assert_eq!(db.buffer_pool().read_bytes(page_b, 0, 11)?, [0; 11]);
        drop(db);
    }

    // The loser got its Abort record exactly once
    let db = Database::open(config)?;
    let aborts = db
        .wal()
        .read_all()?
        .into_iter()
        .filter(|record| matches!(record, LogRecord::Abort { .. }))
        .count();
    assert_eq!(aborts, 1);
    assert_eq!(db.last_recovery().aborted.len(), 1);
    Ok(())
}

#[test]
fn test_aborted_transaction_stays_rolled_back() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let (page_a, _) = allocate_pages(&dir)?;
    {
        let db = open_test_database(&dir)?;
        let tm = db.transaction_manager();
        let txn = db.begin(IsolationLevel::ReadCommitted)?;
        tm.write(txn, page_a, 40, b"rollback")?;
        // Stolen before the abort restored it in memory
        db.buffer_pool().flush_page(page_a)?;
        db.abort(txn)?;
    }

    assert_eq!(on_disk(&dir, page_a, 40, 8)?, b"rollback");
    let db = open_test_database(&dir)?;
    assert_eq!(db.buffer_pool().read_bytes(page_a, 40, 8)?, [0; 8]);
    Ok(())
}

#[test]
fn test_transaction_without_updates_is_noop() -> Result<()> {
    let dir = tempfile::tempdir()?;
    {
        let db = open_test_database(&dir)?;
        db.begin(IsolationLevel::Serializable)?;
    }

    let db = open_test_database(&dir)?;
    assert_eq!(db.last_recovery().rolled_back.len(), 1);
    assert_eq!(db.last_recovery().undo_count, 0);
    assert!(db.buffer_pool().dirty_pages().is_empty());
    Ok(())
}

#[test]
fn test_checkpoint_bounds_recovery() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let (page_a, _) = allocate_pages(&dir)?;
    {
        let db = open_test_database(&dir)?;
        let tm = db.transaction_manager();
        let txn = db.begin(IsolationLevel::ReadCommitted)?;
        tm.write(txn, page_a, 0, b"before checkpoint")?;
        db.commit(txn)?;
        db.checkpoint()?;
    }

    let db = open_test_database(&dir)?;
    assert!(db.last_recovery().is_empty());
    assert_eq!(on_disk(&dir, page_a, 0, 17)?, b"before checkpoint");

    // New ids continue after the ones in the log
    let next = db.begin(IsolationLevel::ReadCommitted)?;
    assert!(next > 1);
    Ok(())
}

#[test]
fn test_commits_racing_checkpoints_survive_crash() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let (page_a, page_b) = allocate_pages(&dir)?;
    {
        let db = open_test_database(&dir)?;
        std::thread::scope(|s| -> Result<()> {
            let writer = s.spawn(|| -> Result<()> {
                let tm = db.transaction_manager();
                for i in 0..60u32 {
                    let page_id = if i % 2 == 0 { page_a } else { page_b };
                    let txn = db.begin(IsolationLevel::ReadCommitted)?;
                    tm.write(txn, page_id, 0, &i.to_be_bytes())?;
                    db.commit(txn)?;
                }
                Ok(())
            });

            while !writer.is_finished() {
                db.checkpoint()?;
            }
            writer.join().expect("writer panicked")
        })?;
        // Crash: no checkpoint after the last commit
    }

    let db = open_test_database(&dir)?;
    assert_eq!(db.buffer_pool().read_bytes(page_a, 0, 4)?, 58u32.to_be_bytes());
    assert_eq!(db.buffer_pool().read_bytes(page_b, 0, 4)?, 59u32.to_be_bytes());
    Ok(())
}
