/// A fixed-width key that can be stored inline in an index page entry.
/// The encoded width is a compile-time property; every key of a given
/// type occupies exactly `SIZE` bytes on the page.
pub trait IndexKey: Copy + Default + Send + Sync + 'static {
    /// Encoded width in bytes
    const SIZE: usize;

    /// Writes the key into `dst`, which is exactly `SIZE` bytes.
    fn write_to(&self, dst: &mut [u8]);

    /// Reads a key back from `src`, which is exactly `SIZE` bytes.
    fn read_from(src: &[u8]) -> Self;
}

/// An opaque fixed-width key of `N` bytes (N is 4, 8, 16, 32, or 64 in
/// practice). Interpretation of the bytes is entirely up to the
/// comparator; the tree itself only copies them around.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenericKey<const N: usize> {
    data: [u8; N],
}

impl<const N: usize> GenericKey<N> {
    pub fn new(data: [u8; N]) -> Self {
        Self { data }
    }

    /// Builds a key from a little-endian i32 in the leading 4 bytes,
    /// zero-padded. The conventional encoding for integer-keyed indexes.
    pub fn from_i32(value: i32) -> Self {
        assert!(N >= 4, "key too narrow for an i32");
        let mut data = [0u8; N];
        data[..4].copy_from_slice(&value.to_le_bytes());
        Self { data }
    }

    /// Reads back the leading 4 bytes as a little-endian i32.
    pub fn as_i32(&self) -> i32 {
        assert!(N >= 4, "key too narrow for an i32");
        i32::from_le_bytes(self.data[..4].try_into().unwrap())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

impl<const N: usize> Default for GenericKey<N> {
    fn default() -> Self {
        Self { data: [0u8; N] }
    }
}

impl<const N: usize> IndexKey for GenericKey<N> {
    const SIZE: usize = N;

    fn write_to(&self, dst: &mut [u8]) {
        dst.copy_from_slice(&self.data);
    }

    fn read_from(src: &[u8]) -> Self {
        let mut data = [0u8; N];
        data.copy_from_slice(src);
        Self { data }
    }
}
