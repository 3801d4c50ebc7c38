use std::sync::Arc;

use quarry::buffer::BufferPoolManager;
use quarry::common::RecordId;
use quarry::index::{BPlusTree, GenericKey, IntegerComparator};
use quarry::storage::disk::DiskManager;

type Key = GenericKey<8>;

fn main() {
    println!("Quarry - a disk-oriented storage engine core in Rust");
    println!("====================================================\n");

    let db_path = "demo.db";

    let disk_manager = Arc::new(DiskManager::new(db_path).expect("Failed to create disk manager"));
    println!("Created disk manager for: {}", db_path);

    let bpm = Arc::new(BufferPoolManager::new(16, disk_manager));
    println!("Created buffer pool manager with 16 frames\n");

    // Small fan-out so a handful of keys already builds a multi-level tree
    let mut index = BPlusTree::<Key, _>::with_max_sizes(Arc::clone(&bpm), IntegerComparator, 4, 4);

    for key in [5, 3, 8, 1, 9, 2, 7, 4, 6] {
        index
            .insert(&Key::from_i32(key), RecordId::new(key as u32 * 100))
            .expect("Failed to insert");
        println!("Inserted key={}", key);
    }

    println!("\nPoint lookups:");
    for key in [1, 6, 9] {
        let value = index.get_value(&Key::from_i32(key)).expect("Lookup failed");
        println!("  get({}) -> {:?}", key, value);
    }

    println!("\nFull scan:");
    for entry in index.begin().expect("Failed to build iterator") {
        let (key, value) = entry.expect("Iterator failed");
        println!("  {} -> {}", key.as_i32(), value);
    }

    for key in [3, 4, 5] {
        index.remove(&Key::from_i32(key)).expect("Failed to remove");
        println!("Removed key={}", key);
    }

    println!("\nScan from key 2 after removals:");
    for entry in index.begin_at(&Key::from_i32(2)).expect("Failed to build iterator") {
        let (key, value) = entry.expect("Iterator failed");
        println!("  {} -> {}", key.as_i32(), value);
    }

    bpm.flush_all_pages().expect("Failed to flush");
    println!("\nFlushed all pages to disk");

    std::fs::remove_file(db_path).ok();
    println!("Demo completed successfully!");
}
