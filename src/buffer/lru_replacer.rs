use hashlink::LinkedHashMap;
use parking_lot::Mutex;

use crate::common::FrameId;

/// LRU replacement policy.
///
/// Tracks the set of unpinned frames in least-recently-unpinned order:
/// `unpin` appends at the MRU end, `victim` pops the LRU end, and `pin`
/// removes a frame from wherever it sits. Re-unpinning a frame that is
/// already tracked keeps its original position - "unpinned" means
/// "evictable since the last transition to zero pins".
pub struct LruReplacer {
    /// Unpinned frames, front = least recently unpinned. The linked hash
    /// map gives O(1) remove-by-key, push-to-back, and pop-front.
    unpinned: Mutex<LinkedHashMap<FrameId, ()>>,
}

impl LruReplacer {
    /// Creates a replacer able to track up to `num_frames` frames.
    pub fn new(num_frames: usize) -> Self {
        Self {
            unpinned: Mutex::new(LinkedHashMap::with_capacity(num_frames)),
        }
    }

    /// Removes and returns the least recently unpinned frame, or None if
    /// no frame is evictable.
    pub fn victim(&self) -> Option<FrameId> {
        self.unpinned.lock().pop_front().map(|(frame_id, _)| frame_id)
    }

    /// Removes `frame_id` from the replacer if present. Called when a
    /// frame's pin count leaves zero.
    pub fn pin(&self, frame_id: FrameId) {
        self.unpinned.lock().remove(&frame_id);
    }

    /// Adds `frame_id` at the most-recently-used end. Called when a
    /// frame's pin count reaches zero. A no-op if already present.
    pub fn unpin(&self, frame_id: FrameId) {
        let mut unpinned = self.unpinned.lock();
        if !unpinned.contains_key(&frame_id) {
            unpinned.insert(frame_id, ());
        }
    }

    /// Returns the number of evictable frames.
    pub fn size(&self) -> usize {
        self.unpinned.lock().len()
    }
}
