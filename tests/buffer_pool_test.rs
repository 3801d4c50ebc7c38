//! Integration tests for the buffer pool manager

use std::sync::Arc;
use std::thread;

use quarry::buffer::{BufferPoolManager, PageGuard};
use quarry::common::PageId;
use quarry::storage::disk::DiskManager;
use tempfile::NamedTempFile;

fn create_bpm(pool_size: usize) -> (Arc<BufferPoolManager>, NamedTempFile) {
    let temp_file = NamedTempFile::new().unwrap();
    let dm = Arc::new(DiskManager::new(temp_file.path()).unwrap());
    (Arc::new(BufferPoolManager::new(pool_size, dm)), temp_file)
}

#[test]
fn test_basic_read_write() {
    let (bpm, _temp) = create_bpm(10);

    let (page_id, page) = bpm.new_page().unwrap().unwrap();
    {
        let mut data = page.data_mut();
        data[0] = 0xDE;
        data[1] = 0xAD;
        data[2] = 0xBE;
        data[3] = 0xEF;
    }
    assert!(bpm.unpin_page(page_id, true));

    let page = bpm.fetch_page(page_id).unwrap().unwrap();
    {
        let data = page.data();
        assert_eq!(data[0], 0xDE);
        assert_eq!(data[1], 0xAD);
        assert_eq!(data[2], 0xBE);
        assert_eq!(data[3], 0xEF);
    }
    assert!(bpm.unpin_page(page_id, false));
}

#[test]
fn test_pin_exhaustion_and_recovery() {
    let (bpm, _temp) = create_bpm(4);

    // Fill every frame without unpinning.
    let mut page_ids = Vec::new();
    for _ in 0..4 {
        let (page_id, _page) = bpm.new_page().unwrap().unwrap();
        page_ids.push(page_id);
    }

    // No frame is evictable: both allocation and fetch must report none.
    assert!(bpm.new_page().unwrap().is_none());
    assert!(bpm.fetch_page(PageId::new(100)).unwrap().is_none());

    // Unpin one frame and retry.
    assert!(bpm.unpin_page(page_ids[0], false));
    let (new_id, _page) = bpm.new_page().unwrap().unwrap();
    assert_eq!(new_id, PageId::new(4));
}

#[test]
fn test_dirty_page_survives_eviction() {
    let (bpm, _temp) = create_bpm(4);

    let (victim_id, page) = bpm.new_page().unwrap().unwrap();
    {
        let mut data = page.data_mut();
        data[0] = 0x11;
        data[4095] = 0x22;
    }
    assert!(bpm.unpin_page(victim_id, true));

    // Churn enough fresh pages through the pool to evict the dirty one.
    for _ in 0..4 {
        let (page_id, _page) = bpm.new_page().unwrap().unwrap();
        assert!(bpm.unpin_page(page_id, false));
    }

    // The mutated bytes must come back from disk.
    let page = bpm.fetch_page(victim_id).unwrap().unwrap();
    assert_eq!(page.data()[0], 0x11);
    assert_eq!(page.data()[4095], 0x22);
    assert!(bpm.unpin_page(victim_id, false));
}

#[test]
fn test_pool_of_one_reloads_correctly() {
    let (bpm, _temp) = create_bpm(1);

    let (id_a, page) = bpm.new_page().unwrap().unwrap();
    page.data_mut()[0] = 0xAA;
    assert!(bpm.unpin_page(id_a, true));

    let (id_b, page) = bpm.new_page().unwrap().unwrap();
    page.data_mut()[0] = 0xBB;
    assert!(bpm.unpin_page(id_b, true));

    // Each fetch evicts the other page and reloads from disk.
    let page = bpm.fetch_page(id_a).unwrap().unwrap();
    assert_eq!(page.data()[0], 0xAA);
    assert!(bpm.unpin_page(id_a, false));

    let page = bpm.fetch_page(id_b).unwrap().unwrap();
    assert_eq!(page.data()[0], 0xBB);
    assert!(bpm.unpin_page(id_b, false));
}

#[test]
fn test_unpin_protocol_violations_return_false() {
    let (bpm, _temp) = create_bpm(4);

    let (page_id, _page) = bpm.new_page().unwrap().unwrap();

    assert!(bpm.unpin_page(page_id, false));
    // Already at zero pins.
    assert!(!bpm.unpin_page(page_id, false));
    // Never resident.
    assert!(!bpm.unpin_page(PageId::new(1000), false));
}

#[test]
fn test_flush_page_persists_latest_content() {
    let temp_file = NamedTempFile::new().unwrap();
    let path = temp_file.path().to_path_buf();

    let page_id = {
        let dm = Arc::new(DiskManager::new(&path).unwrap());
        let bpm = Arc::new(BufferPoolManager::new(4, dm));

        let (page_id, page) = bpm.new_page().unwrap().unwrap();
        page.data_mut()[0] = 0x77;
        assert!(bpm.unpin_page(page_id, true));

        assert!(bpm.flush_page(page_id).unwrap());
        assert!(!bpm.flush_page(PageId::new(1000)).unwrap());
        page_id
    };

    // A fresh pool over the same file sees the flushed bytes.
    let dm = Arc::new(DiskManager::new(&path).unwrap());
    let bpm = Arc::new(BufferPoolManager::new(4, dm));
    let page = bpm.fetch_page(page_id).unwrap().unwrap();
    assert_eq!(page.data()[0], 0x77);
    assert!(bpm.unpin_page(page_id, false));
}

#[test]
fn test_flush_all_pages() {
    let temp_file = NamedTempFile::new().unwrap();
    let path = temp_file.path().to_path_buf();

    let page_ids = {
        let dm = Arc::new(DiskManager::new(&path).unwrap());
        let bpm = Arc::new(BufferPoolManager::new(10, dm));

        let page_ids: Vec<_> = (0..5)
            .map(|i| {
                let (page_id, page) = bpm.new_page().unwrap().unwrap();
                page.data_mut()[0] = i as u8 + 1;
                assert!(bpm.unpin_page(page_id, true));
                page_id
            })
            .collect();

        bpm.flush_all_pages().unwrap();
        page_ids
    };

    let dm = Arc::new(DiskManager::new(&path).unwrap());
    let bpm = Arc::new(BufferPoolManager::new(10, dm));
    for (i, &page_id) in page_ids.iter().enumerate() {
        let page = bpm.fetch_page(page_id).unwrap().unwrap();
        assert_eq!(page.data()[0], i as u8 + 1);
        assert!(bpm.unpin_page(page_id, false));
    }
}

#[test]
fn test_delete_page() {
    let (bpm, _temp) = create_bpm(4);

    let (page_id, _page) = bpm.new_page().unwrap().unwrap();

    // Pinned: refuse.
    assert!(!bpm.delete_page(page_id).unwrap());

    assert!(bpm.unpin_page(page_id, false));
    assert!(bpm.delete_page(page_id).unwrap());
    assert_eq!(bpm.pin_count(page_id), None);
    assert_eq!(bpm.free_frame_count(), 4);

    // Not resident: deallocate and report success.
    assert!(bpm.delete_page(page_id).unwrap());
}

#[test]
fn test_fetch_after_eviction_reads_flushed_bytes() {
    let (bpm, _temp) = create_bpm(2);

    let (page_id, page) = bpm.new_page().unwrap().unwrap();
    page.data_mut()[7] = 0x3C;
    assert!(bpm.unpin_page(page_id, true));
    assert!(bpm.flush_page(page_id).unwrap());

    // Push the page out of the pool.
    for _ in 0..2 {
        let (other, _page) = bpm.new_page().unwrap().unwrap();
        assert!(bpm.unpin_page(other, false));
    }

    let page = bpm.fetch_page(page_id).unwrap().unwrap();
    assert_eq!(page.data()[7], 0x3C);
    assert!(bpm.unpin_page(page_id, false));
}

#[test]
fn test_concurrent_readers() {
    let (bpm, _temp) = create_bpm(8);

    let (page_id, page) = bpm.new_page().unwrap().unwrap();
    page.data_mut()[0] = 42;
    assert!(bpm.unpin_page(page_id, true));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let bpm = Arc::clone(&bpm);
            thread::spawn(move || {
                for _ in 0..100 {
                    let guard = PageGuard::fetch(&bpm, page_id).unwrap().unwrap();
                    assert_eq!(guard.data()[0], 42);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(bpm.pin_count(page_id), Some(0));
}
