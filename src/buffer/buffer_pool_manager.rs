use std::collections::{HashMap, LinkedList};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::common::{FrameId, PageId, Result, INVALID_PAGE_ID, PAGE_SIZE};
use crate::common::QuarryError;
use crate::storage::disk::{DiskManager, DiskScheduler};

use super::{LruReplacer, Page};

/// State guarded by the manager-wide mutex. A frame is either on the free
/// list or mapped by exactly one page id in the page table, never both.
struct PoolState {
    /// Page table: maps resident page IDs to frame IDs
    page_table: HashMap<PageId, FrameId>,
    /// Frames that currently hold no page
    free_list: LinkedList<FrameId>,
}

/// BufferPoolManager mediates all access to disk pages through a fixed
/// array of in-memory frames. Frames are handed out pinned; callers must
/// pair every successful fetch/new_page with exactly one unpin, passing
/// the dirty flag if they wrote. Unpinned frames are tracked by an LRU
/// replacer and may be evicted (with write-back when dirty) to satisfy a
/// later fetch.
///
/// A single mutex serializes every public operation, disk I/O included.
pub struct BufferPoolManager {
    /// Number of frames in the buffer pool
    pool_size: usize,
    /// The buffer pool frames
    frames: Vec<Arc<Page>>,
    /// LRU replacer over unpinned frames
    replacer: LruReplacer,
    /// Page table and free list
    state: Mutex<PoolState>,
    /// All disk I/O goes through the scheduler
    disk_scheduler: DiskScheduler,
}

impl BufferPoolManager {
    /// Creates a new BufferPoolManager with the given pool size and disk
    /// manager. Initially every frame is on the free list.
    pub fn new(pool_size: usize, disk_manager: Arc<DiskManager>) -> Self {
        let mut frames = Vec::with_capacity(pool_size);
        let mut free_list = LinkedList::new();

        for i in 0..pool_size {
            let frame_id = FrameId::new(i as u32);
            frames.push(Arc::new(Page::new(frame_id)));
            free_list.push_back(frame_id);
        }

        Self {
            pool_size,
            frames,
            replacer: LruReplacer::new(pool_size),
            state: Mutex::new(PoolState {
                page_table: HashMap::new(),
                free_list,
            }),
            disk_scheduler: DiskScheduler::new(disk_manager),
        }
    }

    /// Fetches the page with the given id, pinned.
    ///
    /// A resident page is pinned and returned directly. Otherwise a target
    /// frame is taken from the free list, or failing that from the
    /// replacer (writing a dirty victim back first), and the page is read
    /// in from disk. Returns Ok(None) when every frame is pinned.
    pub fn fetch_page(&self, page_id: PageId) -> Result<Option<Arc<Page>>> {
        if page_id == INVALID_PAGE_ID {
            return Err(QuarryError::InvalidPageId(page_id));
        }

        let mut state = self.state.lock();

        if let Some(&frame_id) = state.page_table.get(&page_id) {
            let page = &self.frames[frame_id.as_usize()];
            page.pin();
            self.replacer.pin(frame_id);
            return Ok(Some(Arc::clone(page)));
        }

        let frame_id = match self.acquire_frame(&mut state)? {
            Some(frame_id) => frame_id,
            None => return Ok(None),
        };

        let page = &self.frames[frame_id.as_usize()];
        page.set_page_id(page_id);
        page.pin();
        state.page_table.insert(page_id, frame_id);
        self.replacer.pin(frame_id);

        let mut buf = [0u8; PAGE_SIZE];
        self.disk_scheduler.schedule_read_sync(page_id, &mut buf)?;
        page.copy_from(&buf);
        page.set_dirty(false);

        Ok(Some(Arc::clone(page)))
    }

    /// Drops one pin on the page, ORing in the dirty flag. When the pin
    /// count reaches zero the frame becomes evictable. Returns false if
    /// the page is not resident or was not pinned.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        let state = self.state.lock();

        let frame_id = match state.page_table.get(&page_id) {
            Some(&frame_id) => frame_id,
            None => return false,
        };

        let page = &self.frames[frame_id.as_usize()];
        match page.unpin() {
            None => false,
            Some(remaining) => {
                if is_dirty {
                    page.set_dirty(true);
                }
                if remaining == 0 {
                    self.replacer.unpin(frame_id);
                }
                true
            }
        }
    }

    /// Allocates a fresh page on disk and pins it into a frame.
    /// Returns Ok(None) when every frame is pinned; in that case nothing
    /// is allocated.
    pub fn new_page(&self) -> Result<Option<(PageId, Arc<Page>)>> {
        let mut state = self.state.lock();

        if state.free_list.is_empty() && self.replacer.size() == 0 {
            return Ok(None);
        }

        let page_id = self.disk_scheduler.disk_manager().allocate_page()?;

        let frame_id = match self.acquire_frame(&mut state)? {
            Some(frame_id) => frame_id,
            None => return Ok(None),
        };

        let page = &self.frames[frame_id.as_usize()];
        page.set_page_id(page_id);
        page.pin();
        state.page_table.insert(page_id, frame_id);
        self.replacer.pin(frame_id);

        Ok(Some((page_id, Arc::clone(page))))
    }

    /// Deletes a page. A non-resident page is deallocated directly; a
    /// pinned page cannot be deleted (returns false). Otherwise the frame
    /// is unmapped, removed from the replacer, and returned to the free
    /// list.
    pub fn delete_page(&self, page_id: PageId) -> Result<bool> {
        let mut state = self.state.lock();

        let frame_id = match state.page_table.get(&page_id) {
            Some(&frame_id) => frame_id,
            None => {
                self.disk_scheduler.disk_manager().deallocate_page(page_id)?;
                return Ok(true);
            }
        };

        let page = &self.frames[frame_id.as_usize()];
        if page.pin_count() > 0 {
            return Ok(false);
        }

        state.page_table.remove(&page_id);
        self.replacer.pin(frame_id);
        page.reset();
        state.free_list.push_back(frame_id);
        self.disk_scheduler.disk_manager().deallocate_page(page_id)?;

        Ok(true)
    }

    /// Writes the page's buffer to disk unconditionally and clears its
    /// dirty bit. Returns false if the page is not resident.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        let state = self.state.lock();

        let frame_id = match state.page_table.get(&page_id) {
            Some(&frame_id) => frame_id,
            None => return Ok(false),
        };

        let page = &self.frames[frame_id.as_usize()];
        let mut buf = [0u8; PAGE_SIZE];
        page.copy_to(&mut buf);
        self.disk_scheduler.schedule_write_sync(page_id, &buf)?;
        page.set_dirty(false);

        Ok(true)
    }

    /// Flushes every resident page.
    pub fn flush_all_pages(&self) -> Result<()> {
        let state = self.state.lock();

        for (&page_id, &frame_id) in state.page_table.iter() {
            let page = &self.frames[frame_id.as_usize()];
            let mut buf = [0u8; PAGE_SIZE];
            page.copy_to(&mut buf);
            self.disk_scheduler.schedule_write_sync(page_id, &buf)?;
            page.set_dirty(false);
        }

        Ok(())
    }

    /// Returns the pin count of a resident page.
    pub fn pin_count(&self, page_id: PageId) -> Option<u32> {
        let state = self.state.lock();
        state
            .page_table
            .get(&page_id)
            .map(|&frame_id| self.frames[frame_id.as_usize()].pin_count())
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn free_frame_count(&self) -> usize {
        self.state.lock().free_list.len()
    }

    pub fn disk_manager(&self) -> &Arc<DiskManager> {
        self.disk_scheduler.disk_manager()
    }

    /// Picks a target frame: free list first, then the replacer. A dirty
    /// victim is written back synchronously before its frame is reused.
    /// Returns Ok(None) when neither source has a frame.
    fn acquire_frame(&self, state: &mut PoolState) -> Result<Option<FrameId>> {
        if let Some(frame_id) = state.free_list.pop_front() {
            return Ok(Some(frame_id));
        }

        let frame_id = match self.replacer.victim() {
            Some(frame_id) => frame_id,
            None => return Ok(None),
        };

        let victim = &self.frames[frame_id.as_usize()];
        if victim.is_dirty() {
            let mut buf = [0u8; PAGE_SIZE];
            victim.copy_to(&mut buf);
            self.disk_scheduler
                .schedule_write_sync(victim.page_id(), &buf)?;
        }

        state.page_table.remove(&victim.page_id());
        victim.reset();

        Ok(Some(frame_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn create_bpm(pool_size: usize) -> (BufferPoolManager, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let dm = Arc::new(DiskManager::new(temp_file.path()).unwrap());
        (BufferPoolManager::new(pool_size, dm), temp_file)
    }

    #[test]
    fn test_new_pool_is_all_free() {
        let (bpm, _temp) = create_bpm(10);
        assert_eq!(bpm.pool_size(), 10);
        assert_eq!(bpm.free_frame_count(), 10);
    }

    #[test]
    fn test_new_page_is_pinned() {
        let (bpm, _temp) = create_bpm(10);

        let (page_id, page) = bpm.new_page().unwrap().unwrap();
        assert_eq!(page_id, PageId::new(0));
        assert_eq!(page.pin_count(), 1);
        assert_eq!(bpm.free_frame_count(), 9);

        assert!(bpm.unpin_page(page_id, false));
        assert_eq!(bpm.pin_count(page_id), Some(0));
    }

    #[test]
    fn test_unpin_below_zero_fails() {
        let (bpm, _temp) = create_bpm(10);

        let (page_id, _page) = bpm.new_page().unwrap().unwrap();
        assert!(bpm.unpin_page(page_id, false));
        assert!(!bpm.unpin_page(page_id, false));
        assert!(!bpm.unpin_page(PageId::new(999), false));
    }

    #[test]
    fn test_fetch_hit_increments_pin() {
        let (bpm, _temp) = create_bpm(10);

        let (page_id, _page) = bpm.new_page().unwrap().unwrap();
        let fetched = bpm.fetch_page(page_id).unwrap().unwrap();
        assert_eq!(fetched.pin_count(), 2);

        assert!(bpm.unpin_page(page_id, false));
        assert!(bpm.unpin_page(page_id, false));
    }

    #[test]
    fn test_delete_page_semantics() {
        let (bpm, _temp) = create_bpm(10);

        let (page_id, _page) = bpm.new_page().unwrap().unwrap();

        // Pinned pages cannot be deleted.
        assert!(!bpm.delete_page(page_id).unwrap());

        assert!(bpm.unpin_page(page_id, false));
        assert!(bpm.delete_page(page_id).unwrap());
        assert_eq!(bpm.pin_count(page_id), None);
        assert_eq!(bpm.free_frame_count(), 10);

        // Deleting a non-resident page succeeds.
        assert!(bpm.delete_page(PageId::new(42)).unwrap());
    }
}
