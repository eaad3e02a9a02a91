// Transaction lifecycle and locking tests

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Result;

#[path = "../common/mod.rs"]
mod common;
use common::open_test_database;

use minidb::common::types::PageId;
use minidb::transaction::{LockMode, TransactionState};
use minidb::{IsolationLevel, TransactionError};

fn new_page(db: &minidb::Database) -> Result<PageId> {
    let (_, page_id) = db.buffer_pool().new_page(0)?;
    db.buffer_pool().unpin_page(page_id, false)?;
    Ok(page_id)
}

#[test]
fn test_commit_is_visible_and_abort_is_not() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let db = open_test_database(&dir)?;
    let page_id = new_page(&db)?;
    let tm = db.transaction_manager();

    let t1 = db.begin(IsolationLevel::ReadCommitted)?;
    tm.write(t1, page_id, 0, b"first")?;
    db.commit(t1)?;

    let t2 = db.begin(IsolationLevel::ReadCommitted)?;
    tm.write(t2, page_id, 0, b"second")?;
    db.abort(t2)?;

    let t3 = db.begin(IsolationLevel::RepeatableRead)?;
    assert_eq!(tm.read(t3, page_id, 0, 6)?, b"first\0");
    db.commit(t3)?;

    assert_eq!(tm.get_transaction(t2).map(|t| t.state()), Some(TransactionState::Aborted));
    assert!(tm.active_transaction_ids().is_empty());
    Ok(())
}

#[test]
fn test_finished_transaction_rejects_operations() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let db = open_test_database(&dir)?;
    let page_id = new_page(&db)?;

    let txn = db.begin(IsolationLevel::ReadCommitted)?;
    db.abort(txn)?;

    let tm = db.transaction_manager();
    assert!(matches!(tm.commit(txn), Err(TransactionError::InvalidState(_))));
    assert!(matches!(tm.abort(txn), Err(TransactionError::InvalidState(_))));
    assert!(matches!(
        tm.write(txn, page_id, 0, b"late"),
        Err(TransactionError::InvalidState(_))
    ));
    Ok(())
}

#[test]
fn test_out_of_page_write_rejected() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let db = open_test_database(&dir)?;
    let page_id = new_page(&db)?;

    let txn = db.begin(IsolationLevel::ReadCommitted)?;
    let result = db.transaction_manager().write(txn, page_id, 4090, b"too long");
    assert!(matches!(result, Err(TransactionError::InvalidRange { .. })));
    Ok(())
}

#[test]
fn test_reader_waits_for_writer_then_times_out() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let db = open_test_database(&dir)?;
    let page_id = new_page(&db)?;
    let tm = db.transaction_manager();

    let writer = db.begin(IsolationLevel::ReadCommitted)?;
    let reader = db.begin(IsolationLevel::Serializable)?;
    tm.write(writer, page_id, 0, b"locked")?;

    let result = tm.read(reader, page_id, 0, 6);
    assert!(matches!(result, Err(TransactionError::LockTimeout { .. })));

    db.commit(writer)?;
    assert_eq!(tm.read(reader, page_id, 0, 6)?, b"locked");
    Ok(())
}

#[test]
fn test_deadlock_is_reported_and_victim_aborts() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut config = common::test_config(&dir);
    config.lock_timeout = Duration::from_secs(5);
    let db = Arc::new(minidb::Database::open(config)?);
    let page_a = new_page(&db)?;
    let page_b = new_page(&db)?;

    let t1 = db.begin(IsolationLevel::ReadCommitted)?;
    let t2 = db.begin(IsolationLevel::ReadCommitted)?;
    db.transaction_manager().write(t1, page_a, 0, b"t1")?;
    db.transaction_manager().write(t2, page_b, 0, b"t2")?;

    let blocked = {
        let db = Arc::clone(&db);
        thread::spawn(move || db.transaction_manager().write(t1, page_b, 0, b"t1"))
    };
    thread::sleep(Duration::from_millis(100));

    let result = db.transaction_manager().write(t2, page_a, 0, b"t2");
    assert!(matches!(result, Err(TransactionError::Deadlock(id)) if id == t2));

    db.abort(t2)?;
    blocked.join().expect("writer panicked")?;
    db.commit(t1)?;

    assert_eq!(db.buffer_pool().read_bytes(page_b, 0, 2)?, b"t1");
    assert!(db.transaction_manager().lock_manager().holders(&page_a.to_string()).is_empty());
    Ok(())
}

#[test]
fn test_explicit_resource_locks() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let db = open_test_database(&dir)?;
    let tm = db.transaction_manager();

    let t1 = db.begin(IsolationLevel::ReadCommitted)?;
    let t2 = db.begin(IsolationLevel::ReadCommitted)?;
    tm.lock(t1, "table:users", LockMode::Shared)?;
    tm.lock(t2, "table:users", LockMode::Shared)?;
    assert!(matches!(
        tm.lock(t2, "table:users", LockMode::Exclusive),
        Err(TransactionError::LockTimeout { .. })
    ));

    db.commit(t1)?;
    tm.lock(t2, "table:users", LockMode::Exclusive)?;
    Ok(())
}
