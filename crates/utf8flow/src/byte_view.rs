use alloc::vec::Vec;
use core::{
    fmt,
    ops::{Bound, Deref, RangeBounds},
};

use bstr::BStr;
use bytes::{BufMut, Bytes, BytesMut};

/// An immutable window over a shared byte buffer.
///
/// A `ByteView` is the unit handed between pipeline stages. It never owns
/// its bytes exclusively: slicing a view yields another view over the *same*
/// buffer, and the buffer is never mutated once a view over it exists.
///
/// The only way to combine two views is [`ByteView::concat`], which copies
/// both into a freshly allocated buffer.
///
/// Invariant: `offset + len <= buffer.len()`.
#[derive(Clone, Default)]
pub struct ByteView {
    buffer: Bytes,
    offset: usize,
    len: usize,
}

impl ByteView {
    /// A view over the whole of `buffer`.
    #[must_use]
    pub fn new(buffer: Bytes) -> Self {
        let len = buffer.len();
        Self {
            buffer,
            offset: 0,
            len,
        }
    }

    /// A view over `len` bytes of `buffer` starting at `offset`.
    ///
    /// Returns `None` if the window does not fit inside the buffer.
    #[must_use]
    pub fn with_window(buffer: Bytes, offset: usize, len: usize) -> Option<Self> {
        let end = offset.checked_add(len)?;
        (end <= buffer.len()).then_some(Self {
            buffer,
            offset,
            len,
        })
    }

    #[must_use]
    pub fn from_static(bytes: &'static [u8]) -> Self {
        Self::new(Bytes::from_static(bytes))
    }

    #[must_use]
    pub fn copy_from_slice(bytes: &[u8]) -> Self {
        Self::new(Bytes::copy_from_slice(bytes))
    }

    /// Offset of the first visible byte within the underlying buffer.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The underlying buffer, including bytes outside this window.
    #[must_use]
    pub fn buffer(&self) -> &Bytes {
        &self.buffer
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer[self.offset..self.offset + self.len]
    }

    /// A sub-view sharing this view's buffer. `range` is relative to this
    /// view, not to the underlying buffer.
    ///
    /// # Panics
    ///
    /// Panics if `range` is out of bounds or decreasing.
    #[must_use]
    pub fn slice(&self, range: impl RangeBounds<usize>) -> Self {
        let start = match range.start_bound() {
            Bound::Included(&n) => n,
            Bound::Excluded(&n) => n + 1,
            Bound::Unbounded => 0,
        };
        let end = match range.end_bound() {
            Bound::Included(&n) => n + 1,
            Bound::Excluded(&n) => n,
            Bound::Unbounded => self.len,
        };
        assert!(
            start <= end && end <= self.len,
            "range {start}..{end} out of bounds for view of length {}",
            self.len
        );
        Self {
            buffer: self.buffer.clone(),
            offset: self.offset + start,
            len: end - start,
        }
    }

    /// Copy `self` followed by `other` into a new buffer.
    #[must_use]
    pub fn concat(&self, other: &ByteView) -> Self {
        let mut buf = BytesMut::with_capacity(self.len + other.len);
        buf.put_slice(self.as_bytes());
        buf.put_slice(other.as_bytes());
        Self::new(buf.freeze())
    }

    /// The visible bytes as a `Bytes` handle sharing the same allocation.
    #[must_use]
    pub fn to_bytes(&self) -> Bytes {
        self.buffer.slice(self.offset..self.offset + self.len)
    }
}

impl Deref for ByteView {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl AsRef<[u8]> for ByteView {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl PartialEq for ByteView {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for ByteView {}

impl PartialEq<[u8]> for ByteView {
    fn eq(&self, other: &[u8]) -> bool {
        self.as_bytes() == other
    }
}

impl fmt::Debug for ByteView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ByteView({:?})", BStr::new(self.as_bytes()))
    }
}

impl From<Bytes> for ByteView {
    fn from(buffer: Bytes) -> Self {
        Self::new(buffer)
    }
}

impl From<Vec<u8>> for ByteView {
    fn from(buffer: Vec<u8>) -> Self {
        Self::new(Bytes::from(buffer))
    }
}

impl From<&'static [u8]> for ByteView {
    fn from(bytes: &'static [u8]) -> Self {
        Self::from_static(bytes)
    }
}
