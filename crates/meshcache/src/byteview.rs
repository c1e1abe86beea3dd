//! Immutable cached value

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use crate::lru::ByteSize;

/// Immutable view of cached bytes
///
/// Cloning shares the underlying buffer. The bytes themselves can never be
/// mutated after construction; `byte_slice` hands out independent copies.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ByteView {
    bytes: Arc<[u8]>,
}

impl ByteView {
    /// Build a view holding a private copy of `bytes`
    pub fn copy_from(bytes: &[u8]) -> Self {
        Self {
            bytes: Arc::from(bytes),
        }
    }

    /// Number of bytes in the view
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Check if the view is empty
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Copy of the data as an owned buffer
    pub fn byte_slice(&self) -> Vec<u8> {
        self.bytes.to_vec()
    }

    /// Data as text, replacing invalid UTF-8 sequences
    pub fn as_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }
}

impl From<Vec<u8>> for ByteView {
    fn from(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Arc::from(bytes),
        }
    }
}

impl Default for ByteView {
    fn default() -> Self {
        Self::from(Vec::new())
    }
}

impl ByteSize for ByteView {
    fn byte_size(&self) -> usize {
        self.len()
    }
}

impl fmt::Display for ByteView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str())
    }
}

impl fmt::Debug for ByteView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ByteView").field(&self.as_str()).finish()
    }
}
