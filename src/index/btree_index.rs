use std::cmp::Ordering;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::buffer::{BufferPoolManager, PageGuard};
use crate::common::{PageId, QuarryError, RecordId, Result, INVALID_PAGE_ID};

use super::btree_iterator::BTreeIterator;
use super::btree_page;
use super::generic_key::IndexKey;
use super::internal_page::{InternalPage, InternalPageRef};
use super::key_comparator::KeyComparator;
use super::leaf_page::{LeafPage, LeafPageRef};

/// An order-m B+ tree index whose nodes live one-per-page in the buffer
/// pool. Keys are unique; leaves hold (key, record id) entries and chain
/// together in ascending key order.
///
/// Mutating operations take `&mut self`: the tree is single-writer with
/// concurrent readers, and callers that share one across threads supply
/// their own outer lock. Every page touched is pinned through a guard
/// and unpinned exactly once on every path.
pub struct BPlusTree<K: IndexKey, C: KeyComparator<K>> {
    /// Root page id; the invalid sentinel when the tree is empty
    root_page_id: PageId,
    bpm: Arc<BufferPoolManager>,
    comparator: C,
    leaf_max_size: u32,
    internal_max_size: u32,
    _marker: PhantomData<K>,
}

impl<K: IndexKey, C: KeyComparator<K>> BPlusTree<K, C> {
    /// Creates an empty tree with node fan-out derived from the page
    /// capacity, rounded down to even so a split never leaves either half
    /// below minimum occupancy.
    pub fn new(bpm: Arc<BufferPoolManager>, comparator: C) -> Self {
        let leaf_cap = LeafPage::<K>::capacity();
        let internal_cap = InternalPage::<K>::capacity() - 1;
        let leaf_max = (leaf_cap - leaf_cap % 2) as u32;
        let internal_max = (internal_cap - internal_cap % 2) as u32;
        Self::with_max_sizes(bpm, comparator, leaf_max, internal_max)
    }

    /// Creates an empty tree with explicit node fan-out, mainly to force
    /// splits and merges with few keys.
    pub fn with_max_sizes(
        bpm: Arc<BufferPoolManager>,
        comparator: C,
        leaf_max_size: u32,
        internal_max_size: u32,
    ) -> Self {
        assert!(leaf_max_size >= 2, "leaf max_size must be at least 2");
        assert!(internal_max_size >= 3, "internal max_size must be at least 3");
        assert!(leaf_max_size as usize <= LeafPage::<K>::capacity());
        assert!((internal_max_size as usize) < InternalPage::<K>::capacity());

        Self {
            root_page_id: INVALID_PAGE_ID,
            bpm,
            comparator,
            leaf_max_size,
            internal_max_size,
            _marker: PhantomData,
        }
    }

    /// Reattaches a tree persisted under `root_page_id` (fan-out must
    /// match what the tree was built with; pass the same overrides if it
    /// was built with `with_max_sizes`).
    pub fn open(bpm: Arc<BufferPoolManager>, comparator: C, root_page_id: PageId) -> Self {
        let mut tree = Self::new(bpm, comparator);
        tree.root_page_id = root_page_id;
        tree
    }

    pub fn root_page_id(&self) -> PageId {
        self.root_page_id
    }

    pub fn is_empty(&self) -> bool {
        self.root_page_id == INVALID_PAGE_ID
    }

    /// Point lookup. Returns the record id stored under `key`, if any.
    pub fn get_value(&self, key: &K) -> Result<Option<RecordId>> {
        if self.is_empty() {
            return Ok(None);
        }
        let leaf_pid = self.find_leaf(key)?;
        let guard = self.fetch_node(leaf_pid)?;
        let data = guard.data();
        let leaf = LeafPageRef::<K>::new(&data);
        Ok(leaf.lookup(key, &self.comparator))
    }

    /// Inserts (key, value). Returns false (and changes nothing) if the
    /// key already exists.
    pub fn insert(&mut self, key: &K, value: RecordId) -> Result<bool> {
        if self.is_empty() {
            self.start_new_tree(key, value)?;
            return Ok(true);
        }

        let leaf_pid = self.find_leaf(key)?;
        let mut guard = self.fetch_node(leaf_pid)?;

        let (duplicate, full) = {
            let data = guard.data();
            let leaf = LeafPageRef::<K>::new(&data);
            (
                leaf.lookup(key, &self.comparator).is_some(),
                leaf.size() >= self.leaf_max_size,
            )
        };
        if duplicate {
            return Ok(false);
        }

        if !full {
            let mut data = guard.data_mut();
            let mut leaf = LeafPage::<K>::new(&mut data);
            leaf.insert(key, value, &self.comparator);
            return Ok(true);
        }

        self.split_and_insert_leaf(leaf_pid, guard, key, value)?;
        Ok(true)
    }

    /// Removes `key` if present, rebalancing underfull nodes by merge or
    /// redistribution.
    pub fn remove(&mut self, key: &K) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }

        let leaf_pid = self.find_leaf(key)?;
        let mut guard = self.fetch_node(leaf_pid)?;

        let present = {
            let data = guard.data();
            LeafPageRef::<K>::new(&data)
                .lookup(key, &self.comparator)
                .is_some()
        };
        if !present {
            return Ok(());
        }

        let new_size = {
            let mut data = guard.data_mut();
            let mut leaf = LeafPage::<K>::new(&mut data);
            leaf.remove_and_delete(key, &self.comparator)
        };
        drop(guard);

        if leaf_pid == self.root_page_id {
            if new_size == 0 {
                self.adjust_root(leaf_pid)?;
            }
            return Ok(());
        }

        if new_size < Self::min_size(self.leaf_max_size) {
            self.coalesce_or_redistribute(leaf_pid)?;
        }
        Ok(())
    }

    /// Iterator over the whole tree in ascending key order.
    pub fn begin(&self) -> Result<BTreeIterator<K>> {
        if self.is_empty() {
            return Ok(BTreeIterator::empty(Arc::clone(&self.bpm)));
        }
        let leaf_pid = self.find_leftmost_leaf()?;
        BTreeIterator::new(Arc::clone(&self.bpm), leaf_pid, 0)
    }

    /// Iterator starting at the first key >= `key`.
    pub fn begin_at(&self, key: &K) -> Result<BTreeIterator<K>> {
        if self.is_empty() {
            return Ok(BTreeIterator::empty(Arc::clone(&self.bpm)));
        }
        let leaf_pid = self.find_leaf(key)?;
        let index = {
            let guard = self.fetch_node(leaf_pid)?;
            let data = guard.data();
            LeafPageRef::<K>::new(&data).key_index(key, &self.comparator)
        };
        BTreeIterator::new(Arc::clone(&self.bpm), leaf_pid, index)
    }

    /// Descends from the root to the leaf that owns `key`, unpinning each
    /// internal page before moving to its child.
    fn find_leaf(&self, key: &K) -> Result<PageId> {
        let mut page_id = self.root_page_id;
        loop {
            let guard = self.fetch_node(page_id)?;
            let data = guard.data();
            if btree_page::is_leaf(&data) {
                return Ok(page_id);
            }
            page_id = InternalPageRef::<K>::new(&data).lookup(key, &self.comparator);
        }
    }

    fn find_leftmost_leaf(&self) -> Result<PageId> {
        let mut page_id = self.root_page_id;
        loop {
            let guard = self.fetch_node(page_id)?;
            let data = guard.data();
            if btree_page::is_leaf(&data) {
                return Ok(page_id);
            }
            page_id = InternalPageRef::<K>::new(&data).value_at(0);
        }
    }

    fn start_new_tree(&mut self, key: &K, value: RecordId) -> Result<()> {
        let (page_id, mut guard) = self.allocate_node()?;
        {
            let mut data = guard.data_mut();
            let mut leaf = LeafPage::<K>::new(&mut data);
            leaf.init(page_id, INVALID_PAGE_ID, self.leaf_max_size);
            leaf.insert(key, value, &self.comparator);
        }
        self.root_page_id = page_id;
        Ok(())
    }

    /// Splits a full leaf: the tail half moves to a fresh right sibling,
    /// the chain is spliced, the pending key goes to whichever half owns
    /// it, and the new sibling's first key is pushed up as separator.
    fn split_and_insert_leaf(
        &mut self,
        leaf_pid: PageId,
        mut leaf_guard: PageGuard,
        key: &K,
        value: RecordId,
    ) -> Result<()> {
        let (new_pid, mut new_guard) = self.allocate_node()?;
        let parent_pid;
        let separator;
        {
            let mut leaf_data = leaf_guard.data_mut();
            let mut leaf = LeafPage::<K>::new(&mut leaf_data);
            parent_pid = leaf.parent_page_id();

            let mut new_data = new_guard.data_mut();
            let mut new_leaf = LeafPage::<K>::new(&mut new_data);
            new_leaf.init(new_pid, parent_pid, self.leaf_max_size);

            leaf.move_half_to(&mut new_leaf);
            new_leaf.set_next_page_id(leaf.next_page_id());
            leaf.set_next_page_id(new_pid);

            separator = new_leaf.key_at(0);
            if self.comparator.compare(key, &separator) == Ordering::Less {
                leaf.insert(key, value, &self.comparator);
            } else {
                new_leaf.insert(key, value, &self.comparator);
            }
        }
        drop(leaf_guard);
        drop(new_guard);

        self.insert_into_parent(leaf_pid, parent_pid, separator, new_pid)
    }

    /// Links a freshly split-off `right_pid` under `left_pid`'s parent,
    /// growing a new root when the left node was the root and splitting
    /// the parent (recursively) when the insert overfills it.
    fn insert_into_parent(
        &mut self,
        left_pid: PageId,
        parent_pid: PageId,
        key: K,
        right_pid: PageId,
    ) -> Result<()> {
        if parent_pid == INVALID_PAGE_ID {
            let (root_pid, mut root_guard) = self.allocate_node()?;
            {
                let mut data = root_guard.data_mut();
                let mut root = InternalPage::<K>::new(&mut data);
                root.init(root_pid, INVALID_PAGE_ID, self.internal_max_size);
                root.populate_new_root(left_pid, &key, right_pid);
            }
            drop(root_guard);
            self.set_parent(left_pid, root_pid)?;
            self.set_parent(right_pid, root_pid)?;
            self.root_page_id = root_pid;
            return Ok(());
        }

        let mut parent_guard = self.fetch_node(parent_pid)?;
        let new_size = {
            let mut data = parent_guard.data_mut();
            let mut parent = InternalPage::<K>::new(&mut data);
            parent.insert_after(left_pid, &key, right_pid)
        };

        if new_size > self.internal_max_size {
            self.split_internal(parent_pid, parent_guard)
        } else {
            Ok(())
        }
    }

    /// Splits an overfilled internal node. The entry at the split point
    /// becomes the new sibling's (dummy-keyed) head; its key is saved
    /// beforehand and promoted to the grandparent.
    fn split_internal(&mut self, node_pid: PageId, mut node_guard: PageGuard) -> Result<()> {
        let (new_pid, mut new_guard) = self.allocate_node()?;
        let parent_pid;
        let promoted;
        {
            let mut node_data = node_guard.data_mut();
            let mut node = InternalPage::<K>::new(&mut node_data);
            parent_pid = node.parent_page_id();

            let mut new_data = new_guard.data_mut();
            let mut new_node = InternalPage::<K>::new(&mut new_data);
            new_node.init(new_pid, parent_pid, self.internal_max_size);

            promoted = node.key_at(node.size() as usize / 2);
            node.move_half_to(&mut new_node, &self.bpm)?;
        }
        drop(node_guard);
        drop(new_guard);

        self.insert_into_parent(node_pid, parent_pid, promoted, new_pid)
    }

    /// Restores minimum occupancy for an underfull node by merging with a
    /// sibling when the combined entries fit, or borrowing one entry
    /// otherwise. Merging may leave the parent underfull, in which case
    /// the repair recurses upward.
    fn coalesce_or_redistribute(&mut self, node_pid: PageId) -> Result<()> {
        if node_pid == self.root_page_id {
            return self.adjust_root(node_pid);
        }

        let mut node_guard = self.fetch_node(node_pid)?;
        let (parent_pid, node_size, node_is_leaf) = {
            let data = node_guard.data();
            (
                btree_page::parent_page_id(&data),
                btree_page::size(&data),
                btree_page::is_leaf(&data),
            )
        };

        let mut parent_guard = self.fetch_node(parent_pid)?;
        let (node_index, sibling_pid) = {
            let data = parent_guard.data();
            let parent = InternalPageRef::<K>::new(&data);
            let index = parent
                .value_index(node_pid)
                .expect("underfull node missing from its parent");
            let sibling_index = if index > 0 { index - 1 } else { index + 1 };
            (index, parent.value_at(sibling_index))
        };

        let mut sibling_guard = self.fetch_node(sibling_pid)?;
        let sibling_size = btree_page::size(&sibling_guard.data());

        let max_size = if node_is_leaf {
            self.leaf_max_size
        } else {
            self.internal_max_size
        };
        let fits = if node_is_leaf {
            node_size + sibling_size <= max_size
        } else {
            node_size + sibling_size < max_size
        };

        if fits {
            // Merge, normalized so the right node drains into the left;
            // the parent entry for the right node goes away with it.
            let (mut left_guard, mut right_guard, right_pid, separator_index) =
                if node_index > 0 {
                    (sibling_guard, node_guard, node_pid, node_index)
                } else {
                    (node_guard, sibling_guard, sibling_pid, node_index + 1)
                };

            let parent_size = {
                let mut parent_data = parent_guard.data_mut();
                let mut parent = InternalPage::<K>::new(&mut parent_data);
                let middle_key = parent.key_at(separator_index);

                {
                    let mut left_data = left_guard.data_mut();
                    let mut right_data = right_guard.data_mut();
                    if node_is_leaf {
                        let mut left = LeafPage::<K>::new(&mut left_data);
                        let mut right = LeafPage::<K>::new(&mut right_data);
                        right.move_all_to(&mut left);
                    } else {
                        let mut left = InternalPage::<K>::new(&mut left_data);
                        let mut right = InternalPage::<K>::new(&mut right_data);
                        right.move_all_to(&mut left, &middle_key, &self.bpm)?;
                    }
                }

                parent.remove(separator_index);
                parent.size()
            };

            drop(left_guard);
            drop(right_guard);
            drop(parent_guard);
            self.bpm.delete_page(right_pid)?;

            if parent_size < Self::min_size(self.internal_max_size) {
                self.coalesce_or_redistribute(parent_pid)?;
            }
            return Ok(());
        }

        // Redistribute a single entry from the sibling, updating the
        // parent separator to the new boundary.
        let mut parent_data = parent_guard.data_mut();
        let mut parent = InternalPage::<K>::new(&mut parent_data);
        let mut node_data = node_guard.data_mut();
        let mut sibling_data = sibling_guard.data_mut();

        if node_index > 0 {
            // Sibling on the left: take its last entry.
            let middle_key = parent.key_at(node_index);
            if node_is_leaf {
                let mut node = LeafPage::<K>::new(&mut node_data);
                let mut sibling = LeafPage::<K>::new(&mut sibling_data);
                sibling.move_last_to_front_of(&mut node);
                parent.set_key_at(node_index, &node.key_at(0));
            } else {
                let mut node = InternalPage::<K>::new(&mut node_data);
                let mut sibling = InternalPage::<K>::new(&mut sibling_data);
                let promoted = sibling.key_at(sibling.size() as usize - 1);
                sibling.move_last_to_front_of(&mut node, &middle_key, &self.bpm)?;
                parent.set_key_at(node_index, &promoted);
            }
        } else {
            // Node is leftmost: take the right sibling's first entry.
            let separator_index = node_index + 1;
            let middle_key = parent.key_at(separator_index);
            if node_is_leaf {
                let mut node = LeafPage::<K>::new(&mut node_data);
                let mut sibling = LeafPage::<K>::new(&mut sibling_data);
                sibling.move_first_to_end_of(&mut node);
                parent.set_key_at(separator_index, &sibling.key_at(0));
            } else {
                let mut node = InternalPage::<K>::new(&mut node_data);
                let mut sibling = InternalPage::<K>::new(&mut sibling_data);
                sibling.move_first_to_end_of(&mut node, &middle_key, &self.bpm)?;
                parent.set_key_at(separator_index, &sibling.key_at(0));
            }
        }

        Ok(())
    }

    /// Handles an underfull root: an internal root with a single child is
    /// collapsed onto that child, and an empty leaf root empties the
    /// whole tree. Anything else is left alone (the root is exempt from
    /// minimum occupancy).
    fn adjust_root(&mut self, root_pid: PageId) -> Result<()> {
        let mut guard = self.fetch_node(root_pid)?;
        let (is_leaf, size) = {
            let data = guard.data();
            (btree_page::is_leaf(&data), btree_page::size(&data))
        };

        if !is_leaf && size == 1 {
            let child_pid = {
                let mut data = guard.data_mut();
                let mut root = InternalPage::<K>::new(&mut data);
                root.remove_and_return_only_child()
            };
            drop(guard);
            self.set_parent(child_pid, INVALID_PAGE_ID)?;
            self.root_page_id = child_pid;
            self.bpm.delete_page(root_pid)?;
        } else if is_leaf && size == 0 {
            drop(guard);
            self.root_page_id = INVALID_PAGE_ID;
            self.bpm.delete_page(root_pid)?;
        }
        Ok(())
    }

    fn set_parent(&self, child_pid: PageId, parent_pid: PageId) -> Result<()> {
        let mut guard = self.fetch_node(child_pid)?;
        let mut data = guard.data_mut();
        btree_page::set_parent_page_id(&mut data, parent_pid);
        Ok(())
    }

    fn fetch_node(&self, page_id: PageId) -> Result<PageGuard> {
        PageGuard::fetch(&self.bpm, page_id)?.ok_or(QuarryError::BufferPoolFull)
    }

    fn allocate_node(&self) -> Result<(PageId, PageGuard)> {
        PageGuard::allocate(&self.bpm)?.ok_or(QuarryError::BufferPoolFull)
    }

    /// Minimum occupancy for a non-root node: ceil(max_size / 2).
    fn min_size(max_size: u32) -> u32 {
        (max_size + 1) / 2
    }
}
