// Table and database facade tests

use anyhow::Result;

#[path = "../common/mod.rs"]
mod common;
use common::open_test_database;

use minidb::{DatabaseError, Record, TableError};

fn user(id: i32, name: &str) -> Record {
    let mut record = Record::new();
    record.add_int(id).add_string(name);
    record
}

#[test]
fn test_indexed_table_queries() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let db = open_test_database(&dir)?;
    let users = db.create_table("users", true)?;

    {
        let mut users = users.write();
        for id in (0..500).rev() {
            users.insert_record(&user(id, &format!("user-{}", id)))?;
        }
        assert!(users.page_count() > 1);
    }

    let users = users.read();
    let found = users.search_by_primary_key(123)?.expect("key 123 present");
    assert_eq!(found.field_as_string(1).as_deref(), Some("user-123"));
    assert!(users.search_by_primary_key(1000)?.is_none());

    let range: Vec<i32> = users
        .range_scan_by_primary_key(10, 14)?
        .iter()
        .filter_map(|r| r.field_as_int(0))
        .collect();
    assert_eq!(range, vec![10, 11, 12, 13, 14]);
    Ok(())
}

#[test]
fn test_unindexed_table_requires_scan() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let db = open_test_database(&dir)?;
    let log = db.create_table("log", false)?;

    let mut log = log.write();
    for i in 0..5 {
        log.insert_record(&user(i, "entry"))?;
    }

    assert!(matches!(
        log.search_by_primary_key(1),
        Err(TableError::NoIndex(_))
    ));

    // Restartable: each call starts a fresh pass
    let first: Vec<u32> = log.full_scan().map(|row| row.map(|(id, _)| id)).collect::<Result<_, _>>()?;
    let second = log.full_scan().count();
    assert_eq!(first, vec![1, 2, 3, 4, 5]);
    assert_eq!(second, 5);
    Ok(())
}

#[test]
fn test_update_and_delete_by_record_id() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let db = open_test_database(&dir)?;
    let users = db.create_table("users", true)?;
    let mut users = users.write();

    let alice = users.insert_record(&user(10, "Alice"))?;
    let bob = users.insert_record(&user(20, "Bob"))?;

    users.update_record(bob, &user(25, "Robert the longer name"))?;
    assert!(users.search_by_primary_key(20)?.is_none());
    let robert = users.search_by_primary_key(25)?.expect("moved key");
    assert_eq!(robert.field_as_string(1).as_deref(), Some("Robert the longer name"));
    assert_eq!(users.get_record(bob)?, Some(robert));

    users.delete_record(alice)?;
    assert!(users.search_by_primary_key(10)?.is_none());
    assert!(matches!(
        users.delete_record(alice),
        Err(TableError::RecordNotFound(_))
    ));
    assert_eq!(users.record_count(), 1);
    assert!(matches!(
        users.insert_record(&user(25, "dup")),
        Err(TableError::DuplicateKey(25))
    ));
    Ok(())
}

#[test]
fn test_table_registry() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let db = open_test_database(&dir)?;

    db.create_table("b", false)?;
    db.create_table("a", true)?;
    assert!(matches!(
        db.create_table("a", false),
        Err(DatabaseError::TableExists(_))
    ));
    assert_eq!(db.table_names(), vec!["a", "b"]);
    assert!(db.table("a").is_some_and(|t| t.read().has_primary_key()));
    assert!(db.table("missing").is_none());
    Ok(())
}

#[test]
fn test_close_then_reopen_is_clean() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let db = open_test_database(&dir)?;
    let txn = db.begin(minidb::IsolationLevel::ReadCommitted)?;
    db.commit(txn)?;
    db.close()?;

    let db = open_test_database(&dir)?;
    assert!(db.last_recovery().is_empty());
    Ok(())
}
