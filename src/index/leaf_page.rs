use std::cmp::Ordering;
use std::marker::PhantomData;

use crate::common::{PageId, RecordId, INVALID_PAGE_ID, PAGE_SIZE};

use super::btree_page::{self, IndexPageType, LEAF_HEADER_SIZE};
use super::generic_key::IndexKey;
use super::key_comparator::KeyComparator;

/// Mutable view over a leaf B+ tree page.
///
/// Entries are sorted (key, record_id) pairs with no duplicates. Leaves
/// form a singly-linked chain in ascending key order through
/// `next_page_id`; the last leaf points at the invalid sentinel.
pub struct LeafPage<'a, K: IndexKey> {
    data: &'a mut [u8],
    _marker: PhantomData<K>,
}

impl<'a, K: IndexKey> LeafPage<'a, K> {
    const ENTRY_SIZE: usize = K::SIZE + 4;

    pub fn new(data: &'a mut [u8]) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        Self {
            data,
            _marker: PhantomData,
        }
    }

    /// Number of entries the page can physically hold.
    pub fn capacity() -> usize {
        (PAGE_SIZE - LEAF_HEADER_SIZE) / Self::ENTRY_SIZE
    }

    pub fn init(&mut self, page_id: PageId, parent_id: PageId, max_size: u32) {
        assert!(
            max_size as usize <= Self::capacity(),
            "leaf max_size exceeds page capacity"
        );
        btree_page::set_page_type(self.data, IndexPageType::Leaf);
        btree_page::set_size(self.data, 0);
        btree_page::set_max_size(self.data, max_size);
        btree_page::set_page_id(self.data, page_id);
        btree_page::set_parent_page_id(self.data, parent_id);
        btree_page::set_next_page_id(self.data, INVALID_PAGE_ID);
    }

    pub fn size(&self) -> u32 {
        btree_page::size(self.data)
    }

    pub fn max_size(&self) -> u32 {
        btree_page::max_size(self.data)
    }

    pub fn page_id(&self) -> PageId {
        btree_page::page_id(self.data)
    }

    pub fn parent_page_id(&self) -> PageId {
        btree_page::parent_page_id(self.data)
    }

    pub fn set_parent_page_id(&mut self, parent: PageId) {
        btree_page::set_parent_page_id(self.data, parent);
    }

    pub fn next_page_id(&self) -> PageId {
        btree_page::next_page_id(self.data)
    }

    pub fn set_next_page_id(&mut self, next: PageId) {
        btree_page::set_next_page_id(self.data, next);
    }

    pub fn key_at(&self, index: usize) -> K {
        assert!(index < self.size() as usize, "key index out of range");
        self.entry_key(index)
    }

    pub fn value_at(&self, index: usize) -> RecordId {
        assert!(index < self.size() as usize, "value index out of range");
        self.entry_value(index)
    }

    /// Returns the first index whose key is >= `key` (== size when every
    /// key is smaller).
    pub fn key_index<C: KeyComparator<K>>(&self, key: &K, comparator: &C) -> usize {
        let n = self.size() as usize;
        let mut lo = 0;
        let mut hi = n;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if comparator.compare(&self.entry_key(mid), key) == Ordering::Less {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    }

    /// Looks up `key`, returning its record id on an exact match.
    pub fn lookup<C: KeyComparator<K>>(&self, key: &K, comparator: &C) -> Option<RecordId> {
        let index = self.key_index(key, comparator);
        if index < self.size() as usize
            && comparator.compare(&self.entry_key(index), key) == Ordering::Equal
        {
            Some(self.entry_value(index))
        } else {
            None
        }
    }

    /// Inserts (key, value) keeping the entries sorted. Duplicate keys
    /// and full pages are rejected without change. Returns the size after
    /// the attempt.
    pub fn insert<C: KeyComparator<K>>(&mut self, key: &K, value: RecordId, comparator: &C) -> u32 {
        let n = self.size() as usize;
        let index = self.key_index(key, comparator);

        if index < n && comparator.compare(&self.entry_key(index), key) == Ordering::Equal {
            return n as u32;
        }
        if n as u32 >= self.max_size() {
            return n as u32;
        }

        let (src_start, src_end, dst) = (
            self.entry_offset(index),
            self.entry_offset(n),
            self.entry_offset(index + 1),
        );
        self.data.copy_within(src_start..src_end, dst);
        self.write_entry(index, key, value);
        btree_page::set_size(self.data, (n + 1) as u32);
        (n + 1) as u32
    }

    /// Removes `key` if present, keeping the array dense. Returns the
    /// size after the attempt.
    pub fn remove_and_delete<C: KeyComparator<K>>(&mut self, key: &K, comparator: &C) -> u32 {
        let n = self.size() as usize;
        let index = self.key_index(key, comparator);

        if index >= n || comparator.compare(&self.entry_key(index), key) != Ordering::Equal {
            return n as u32;
        }

        let (src_start, src_end, dst) = (
            self.entry_offset(index + 1),
            self.entry_offset(n),
            self.entry_offset(index),
        );
        self.data.copy_within(src_start..src_end, dst);
        btree_page::set_size(self.data, (n - 1) as u32);
        (n - 1) as u32
    }

    /// Moves the tail half of this page's entries to the end of
    /// `recipient`.
    pub fn move_half_to(&mut self, recipient: &mut LeafPage<'_, K>) {
        let n = self.size() as usize;
        let start = n / 2;
        let moved = n - start;
        let r_start = recipient.size() as usize;

        let (dst_start, dst_end) = (
            recipient.entry_offset(r_start),
            recipient.entry_offset(r_start + moved),
        );
        let (src_start, src_end) = (self.entry_offset(start), self.entry_offset(n));
        recipient.data[dst_start..dst_end].copy_from_slice(&self.data[src_start..src_end]);
        btree_page::set_size(recipient.data, (r_start + moved) as u32);
        btree_page::set_size(self.data, start as u32);
    }

    /// Appends `count` entries copied from the start of `src`'s entry
    /// array.
    pub fn copy_n_from(&mut self, src: &LeafPage<'_, K>, count: usize) {
        let n = self.size() as usize;
        let (dst_start, dst_end) = (self.entry_offset(n), self.entry_offset(n + count));
        let (src_start, src_end) = (src.entry_offset(0), src.entry_offset(count));
        self.data[dst_start..dst_end].copy_from_slice(&src.data[src_start..src_end]);
        btree_page::set_size(self.data, (n + count) as u32);
    }

    /// Moves every entry to the end of `recipient` for a merge, and hands
    /// the leaf chain's next pointer over so the recipient stays linked
    /// to this page's successor.
    pub fn move_all_to(&mut self, recipient: &mut LeafPage<'_, K>) {
        let n = self.size() as usize;
        recipient.copy_n_from(self, n);
        recipient.set_next_page_id(self.next_page_id());
        btree_page::set_size(self.data, 0);
    }

    /// Rotates this page's first entry to the end of `recipient` (its
    /// left sibling).
    pub fn move_first_to_end_of(&mut self, recipient: &mut LeafPage<'_, K>) {
        let n = self.size() as usize;
        assert!(n > 0, "rotation from an empty page");
        let moved_key = self.entry_key(0);
        let moved_value = self.entry_value(0);

        let (src_start, src_end, dst) = (
            self.entry_offset(1),
            self.entry_offset(n),
            self.entry_offset(0),
        );
        self.data.copy_within(src_start..src_end, dst);
        btree_page::set_size(self.data, (n - 1) as u32);

        let r = recipient.size() as usize;
        recipient.write_entry(r, &moved_key, moved_value);
        btree_page::set_size(recipient.data, (r + 1) as u32);
    }

    /// Rotates this page's last entry to the front of `recipient` (its
    /// right sibling).
    pub fn move_last_to_front_of(&mut self, recipient: &mut LeafPage<'_, K>) {
        let n = self.size() as usize;
        assert!(n > 0, "rotation from an empty page");
        let moved_key = self.entry_key(n - 1);
        let moved_value = self.entry_value(n - 1);
        btree_page::set_size(self.data, (n - 1) as u32);

        let r = recipient.size() as usize;
        let (src_start, src_end, dst) = (
            recipient.entry_offset(0),
            recipient.entry_offset(r),
            recipient.entry_offset(1),
        );
        recipient.data.copy_within(src_start..src_end, dst);
        recipient.write_entry(0, &moved_key, moved_value);
        btree_page::set_size(recipient.data, (r + 1) as u32);
    }

    fn entry_offset(&self, index: usize) -> usize {
        LEAF_HEADER_SIZE + index * Self::ENTRY_SIZE
    }

    fn entry_key(&self, index: usize) -> K {
        let offset = self.entry_offset(index);
        K::read_from(&self.data[offset..offset + K::SIZE])
    }

    fn entry_value(&self, index: usize) -> RecordId {
        let offset = self.entry_offset(index) + K::SIZE;
        RecordId::new(u32::from_le_bytes(
            self.data[offset..offset + 4].try_into().unwrap(),
        ))
    }

    fn write_entry(&mut self, index: usize, key: &K, value: RecordId) {
        let offset = self.entry_offset(index);
        key.write_to(&mut self.data[offset..offset + K::SIZE]);
        self.data[offset + K::SIZE..offset + K::SIZE + 4]
            .copy_from_slice(&value.as_u32().to_le_bytes());
    }
}

/// Read-only view over a leaf page, for lookups and iteration.
pub struct LeafPageRef<'a, K: IndexKey> {
    data: &'a [u8],
    _marker: PhantomData<K>,
}

impl<'a, K: IndexKey> LeafPageRef<'a, K> {
    const ENTRY_SIZE: usize = K::SIZE + 4;

    pub fn new(data: &'a [u8]) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        Self {
            data,
            _marker: PhantomData,
        }
    }

    pub fn size(&self) -> u32 {
        btree_page::size(self.data)
    }

    pub fn next_page_id(&self) -> PageId {
        btree_page::next_page_id(self.data)
    }

    pub fn key_at(&self, index: usize) -> K {
        assert!(index < self.size() as usize, "key index out of range");
        self.entry_key(index)
    }

    pub fn value_at(&self, index: usize) -> RecordId {
        assert!(index < self.size() as usize, "value index out of range");
        self.entry_value(index)
    }

    pub fn key_index<C: KeyComparator<K>>(&self, key: &K, comparator: &C) -> usize {
        let n = self.size() as usize;
        let mut lo = 0;
        let mut hi = n;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if comparator.compare(&self.entry_key(mid), key) == Ordering::Less {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    }

    pub fn lookup<C: KeyComparator<K>>(&self, key: &K, comparator: &C) -> Option<RecordId> {
        let index = self.key_index(key, comparator);
        if index < self.size() as usize
            && comparator.compare(&self.entry_key(index), key) == Ordering::Equal
        {
            Some(self.entry_value(index))
        } else {
            None
        }
    }

    fn entry_key(&self, index: usize) -> K {
        let offset = LEAF_HEADER_SIZE + index * Self::ENTRY_SIZE;
        K::read_from(&self.data[offset..offset + K::SIZE])
    }

    fn entry_value(&self, index: usize) -> RecordId {
        let offset = LEAF_HEADER_SIZE + index * Self::ENTRY_SIZE + K::SIZE;
        RecordId::new(u32::from_le_bytes(
            self.data[offset..offset + 4].try_into().unwrap(),
        ))
    }
}
