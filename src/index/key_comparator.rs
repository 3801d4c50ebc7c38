use std::cmp::Ordering;

use super::generic_key::GenericKey;

/// Three-way comparison over index keys. The tree never inspects key
/// bytes itself; all ordering decisions go through the comparator.
pub trait KeyComparator<K>: Send + Sync {
    fn compare(&self, a: &K, b: &K) -> Ordering;
}

/// Orders keys by their leading 4 bytes interpreted as a little-endian
/// i32. The standard comparator for integer-keyed indexes of any width.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntegerComparator;

impl<const N: usize> KeyComparator<GenericKey<N>> for IntegerComparator {
    fn compare(&self, a: &GenericKey<N>, b: &GenericKey<N>) -> Ordering {
        a.as_i32().cmp(&b.as_i32())
    }
}

/// Orders keys by raw byte content.
#[derive(Debug, Clone, Copy, Default)]
pub struct BytewiseComparator;

impl<const N: usize> KeyComparator<GenericKey<N>> for BytewiseComparator {
    fn compare(&self, a: &GenericKey<N>, b: &GenericKey<N>) -> Ordering {
        a.as_bytes().cmp(b.as_bytes())
    }
}
