pub mod btree_index;
pub mod btree_iterator;
pub mod btree_page;
pub mod generic_key;
pub mod internal_page;
pub mod key_comparator;
pub mod leaf_page;

pub use btree_index::BPlusTree;
pub use btree_iterator::BTreeIterator;
pub use btree_page::IndexPageType;
pub use generic_key::{GenericKey, IndexKey};
pub use internal_page::{InternalPage, InternalPageRef};
pub use key_comparator::{BytewiseComparator, IntegerComparator, KeyComparator};
pub use leaf_page::{LeafPage, LeafPageRef};
