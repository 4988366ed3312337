//! An explicit byte buffer supporting append/prepend/consume/slice
//! without re-copying the whole receive buffer on every parse.
//!
//! Thin wrapper around `bytes::BytesMut`, which already gives us O(1)
//! `split_to`/cheap-clone slicing; we expose the small vocabulary the
//! rest of the crate needs instead of the full `bytes::Buf` surface.

use bytes::{Bytes, BytesMut};

#[derive(Debug, Default, Clone)]
pub struct Buffer {
    inner: BytesMut,
}

impl Buffer {
    pub fn new() -> Self {
        Self {
            inner: BytesMut::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Append bytes to the end of the buffer.
    pub fn append(&mut self, data: &[u8]) {
        self.inner.extend_from_slice(data);
    }

    /// Prepend bytes to the front of the buffer.
    pub fn prepend(&mut self, data: &[u8]) {
        let mut combined = BytesMut::with_capacity(data.len() + self.inner.len());
        combined.extend_from_slice(data);
        combined.extend_from_slice(&self.inner);
        self.inner = combined;
    }

    /// Consume and return the first `n` bytes, advancing the buffer.
    /// Panics if `n > self.len()` — callers must check `len()` first.
    pub fn read(&mut self, n: usize) -> Bytes {
        self.inner.split_to(n).freeze()
    }

    /// Borrow `len` bytes starting at `start` without consuming them.
    pub fn byteslice(&self, start: usize, len: usize) -> &[u8] {
        &self.inner[start..start + len]
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.inner
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_and_read_round_trips() {
        let mut buf = Buffer::new();
        buf.append(b"hello");
        buf.append(b" world");
        assert_eq!(buf.len(), 11);
        assert_eq!(&buf.read(5)[..], b"hello");
        assert_eq!(buf.len(), 6);
        assert_eq!(&buf.read(6)[..], b" world");
        assert!(buf.is_empty());
    }

    #[test]
    fn prepend_puts_bytes_first() {
        let mut buf = Buffer::new();
        buf.append(b"world");
        buf.prepend(b"hello ");
        assert_eq!(buf.as_slice(), b"hello world");
    }

    #[test]
    fn byteslice_does_not_consume() {
        let mut buf = Buffer::new();
        buf.append(b"abcdef");
        assert_eq!(buf.byteslice(2, 3), b"cde");
        assert_eq!(buf.len(), 6);
    }
}
