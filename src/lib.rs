//! Quarry - the storage-engine core of a disk-oriented RDBMS
//!
//! This crate provides the three subsystems at the heart of a
//! disk-oriented database: a page-granular disk layer, a buffer pool
//! that caches pages in a fixed set of frames, and a B+ tree index
//! built on top of the buffer pool.
//!
//! # Architecture
//!
//! - **Storage Layer** (`storage`): page-granular disk I/O
//!   - `DiskManager`: reads, writes, and allocates pages in the database file
//!   - `DiskScheduler`: background worker the buffer pool funnels I/O through
//!
//! - **Buffer Pool** (`buffer`): memory management for database pages
//!   - `BufferPoolManager`: pins pages into frames, evicting via LRU on miss
//!   - `LruReplacer`: least-recently-unpinned victim selection
//!   - `Page`: one frame's bytes plus pin count and dirty bit
//!   - `PageGuard`: RAII pin with guaranteed unpin on every exit path
//!
//! - **Index** (`index`): a B+ tree keyed by fixed-width `GenericKey`s
//!   - `BPlusTree`: insert/remove/lookup with splits, merges, and rotations
//!   - `BTreeIterator`: in-order scan along the pinned leaf chain
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use quarry::buffer::BufferPoolManager;
//! use quarry::common::RecordId;
//! use quarry::index::{BPlusTree, GenericKey, IntegerComparator};
//! use quarry::storage::disk::DiskManager;
//!
//! let disk_manager = Arc::new(DiskManager::new("test.db").unwrap());
//! let bpm = Arc::new(BufferPoolManager::new(64, disk_manager));
//!
//! let mut index = BPlusTree::<GenericKey<8>, _>::new(Arc::clone(&bpm), IntegerComparator);
//! index.insert(&GenericKey::from_i32(42), RecordId::new(7)).unwrap();
//! assert_eq!(
//!     index.get_value(&GenericKey::from_i32(42)).unwrap(),
//!     Some(RecordId::new(7)),
//! );
//! ```

pub mod buffer;
pub mod common;
pub mod index;
pub mod storage;

// Re-export commonly used types at the crate root
pub use common::{FrameId, PageId, QuarryError, RecordId, Result};
