use std::marker::PhantomData;
use std::sync::Arc;

use crate::buffer::{BufferPoolManager, PageGuard};
use crate::common::{PageId, QuarryError, RecordId, Result, INVALID_PAGE_ID};

use super::generic_key::IndexKey;
use super::leaf_page::LeafPageRef;

/// In-order iterator over the leaf chain. The current leaf stays pinned
/// between `next` calls and is unpinned when the iterator advances past
/// it (or is dropped); iteration ends at the invalid sentinel.
pub struct BTreeIterator<K: IndexKey> {
    bpm: Arc<BufferPoolManager>,
    guard: Option<PageGuard>,
    index: usize,
    _marker: PhantomData<K>,
}

impl<K: IndexKey> BTreeIterator<K> {
    pub(crate) fn new(
        bpm: Arc<BufferPoolManager>,
        page_id: PageId,
        index: usize,
    ) -> Result<Self> {
        let guard = PageGuard::fetch(&bpm, page_id)?.ok_or(QuarryError::BufferPoolFull)?;
        Ok(Self {
            bpm,
            guard: Some(guard),
            index,
            _marker: PhantomData,
        })
    }

    pub(crate) fn empty(bpm: Arc<BufferPoolManager>) -> Self {
        Self {
            bpm,
            guard: None,
            index: 0,
            _marker: PhantomData,
        }
    }

    fn advance(&mut self) -> Result<Option<(K, RecordId)>> {
        loop {
            let guard = match self.guard.as_ref() {
                Some(guard) => guard,
                None => return Ok(None),
            };

            let next_page_id = {
                let data = guard.data();
                let leaf = LeafPageRef::<K>::new(&data);
                if self.index < leaf.size() as usize {
                    let item = (leaf.key_at(self.index), leaf.value_at(self.index));
                    self.index += 1;
                    return Ok(Some(item));
                }
                leaf.next_page_id()
            };

            // Done with this leaf: release its pin before moving on.
            self.guard = None;
            if next_page_id == INVALID_PAGE_ID {
                return Ok(None);
            }
            let guard =
                PageGuard::fetch(&self.bpm, next_page_id)?.ok_or(QuarryError::BufferPoolFull)?;
            self.guard = Some(guard);
            self.index = 0;
        }
    }
}

impl<K: IndexKey> Iterator for BTreeIterator<K> {
    type Item = Result<(K, RecordId)>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.advance() {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}
