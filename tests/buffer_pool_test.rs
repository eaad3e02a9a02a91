use anyhow::Result;

mod common;
use common::{create_test_buffer_pool, generate_test_data};

use minidb::BufferPoolError;
use minidb::common::types::PAGE_SIZE;

#[test]
fn test_new_page_is_pinned_and_zeroed() -> Result<()> {
    let (buffer_pool, _dir) = create_test_buffer_pool(10)?;

    let (page, page_id) = buffer_pool.new_page(0)?;
    {
        let page_guard = page.read();
        assert_eq!(page_guard.page_id, page_id);
        assert!(page_guard.data.iter().all(|&b| b == 0));
    }
    assert_eq!(buffer_pool.pin_count(page_id), Some(1));

    buffer_pool.unpin_page(page_id, false)?;
    assert_eq!(buffer_pool.pin_count(page_id), Some(0));
    Ok(())
}

#[test]
fn test_modified_page_survives_eviction() -> Result<()> {
    let (buffer_pool, _dir) = create_test_buffer_pool(2)?;
    let data = generate_test_data(PAGE_SIZE);

    let (page, page_id) = buffer_pool.new_page(0)?;
    page.write().data.copy_from_slice(&data);
    buffer_pool.unpin_page(page_id, true)?;

    // Push the page out
    for _ in 0..2 {
        let (_, other) = buffer_pool.new_page(0)?;
        buffer_pool.unpin_page(other, false)?;
    }
    assert!(!buffer_pool.is_resident(page_id));

    let fetched = buffer_pool.fetch_page(page_id)?;
    assert_eq!(&fetched.read().data[..], &data[..]);
    buffer_pool.unpin_page(page_id, false)?;
    Ok(())
}

#[test]
fn test_full_pool_then_one_unpin() -> Result<()> {
    let (buffer_pool, _dir) = create_test_buffer_pool(3)?;

    let mut ids = Vec::new();
    for _ in 0..3 {
        let (_, page_id) = buffer_pool.new_page(0)?;
        ids.push(page_id);
    }
    let extra = buffer_pool.page_manager().allocate_page(0)?;

    assert!(matches!(
        buffer_pool.fetch_page(extra),
        Err(BufferPoolError::NoVictimFrame)
    ));

    buffer_pool.unpin_page(ids[1], false)?;
    buffer_pool.fetch_page(extra)?;
    assert!(!buffer_pool.is_resident(ids[1]));
    assert!(buffer_pool.is_resident(ids[0]));

    // Everything pinned again
    let another = buffer_pool.page_manager().allocate_page(0)?;
    assert!(matches!(
        buffer_pool.fetch_page(another),
        Err(BufferPoolError::NoVictimFrame)
    ));
    Ok(())
}

#[test]
fn test_least_recently_used_is_evicted() -> Result<()> {
    let (buffer_pool, _dir) = create_test_buffer_pool(3)?;

    let mut ids = Vec::new();
    for _ in 0..3 {
        let (_, page_id) = buffer_pool.new_page(0)?;
        buffer_pool.unpin_page(page_id, false)?;
        ids.push(page_id);
    }

    // Touch the oldest page so the second becomes least recently used
    buffer_pool.fetch_page(ids[0])?;
    buffer_pool.unpin_page(ids[0], false)?;

    let (_, newest) = buffer_pool.new_page(0)?;
    buffer_pool.unpin_page(newest, false)?;

    assert!(buffer_pool.is_resident(ids[0]));
    assert!(!buffer_pool.is_resident(ids[1]));
    assert!(buffer_pool.is_resident(ids[2]));
    Ok(())
}

#[test]
fn test_flush_page_keeps_page_cached() -> Result<()> {
    let (buffer_pool, _dir) = create_test_buffer_pool(4)?;
    let (_, page_id) = buffer_pool.new_page(3)?;
    buffer_pool.unpin_page(page_id, false)?;

    buffer_pool.write_bytes(page_id, 100, b"flushed")?;
    assert_eq!(buffer_pool.dirty_pages(), vec![page_id]);

    buffer_pool.flush_page(page_id)?;
    assert!(buffer_pool.dirty_pages().is_empty());
    assert!(buffer_pool.is_resident(page_id));

    let on_disk = buffer_pool.page_manager().read_page(page_id)?;
    assert_eq!(&on_disk.data[100..107], b"flushed");
    Ok(())
}

#[test]
fn test_concurrent_fetch_and_unpin() -> Result<()> {
    let (buffer_pool, _dir) = create_test_buffer_pool(4)?;
    let mut ids = Vec::new();
    for _ in 0..8 {
        let (_, page_id) = buffer_pool.new_page(0)?;
        buffer_pool.unpin_page(page_id, false)?;
        ids.push(page_id);
    }

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let buffer_pool = buffer_pool.clone();
            let ids = ids.clone();
            std::thread::spawn(move || -> Result<()> {
                for i in 0..200 {
                    let page_id = ids[(i * 3 + t) % ids.len()];
                    let page = buffer_pool.fetch_page(page_id)?;
                    assert_eq!(page.read().page_id, page_id);
                    buffer_pool.unpin_page(page_id, false)?;
                }
                Ok(())
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("worker panicked")?;
    }
    for page_id in ids {
        assert!(buffer_pool.pin_count(page_id).unwrap_or(0) == 0);
    }
    Ok(())
}

#[test]
fn test_single_frame_contention_never_hands_out_wrong_page() -> Result<()> {
    let (buffer_pool, _dir) = create_test_buffer_pool(1)?;
    let mut ids = Vec::new();
    for _ in 0..2 {
        let (_, page_id) = buffer_pool.new_page(0)?;
        buffer_pool.unpin_page(page_id, false)?;
        ids.push(page_id);
    }

    let handles: Vec<_> = ids
        .iter()
        .map(|&page_id| {
            let buffer_pool = buffer_pool.clone();
            std::thread::spawn(move || -> Result<()> {
                let mut pinned = 0;
                while pinned < 300 {
                    let page = match buffer_pool.fetch_page(page_id) {
                        Ok(page) => page,
                        // The other thread holds the only frame
                        Err(BufferPoolError::NoVictimFrame) => continue,
                        Err(e) => return Err(e.into()),
                    };
                    assert_eq!(page.read().page_id, page_id);
                    assert!(buffer_pool.pin_count(page_id) >= Some(1));
                    buffer_pool.unpin_page(page_id, false)?;
                    pinned += 1;
                }
                Ok(())
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("worker panicked")?;
    }
    Ok(())
}
