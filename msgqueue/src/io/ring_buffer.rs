//! Fixed-capacity byte ring
//!
//! Storage engine for a queue backend. The ring knows nothing about message
//! boundaries; framing is done by the transfer engine on top of it.
//!
//! The ring is not synchronized: it lives inside the backend state and is only
//! touched while the backend lock is held.

use std::collections::TryReserveError;

pub struct RingBuffer {
    storage: Vec<u8>,
    /// Index of the oldest byte
    head: usize,
    /// Number of bytes stored
    used: usize,
}

impl RingBuffer {
    /// Allocate a ring of exactly `capacity` bytes
    ///
    /// # Errors
    ///
    /// Returns the allocator error if the storage cannot be reserved.
    pub fn with_capacity(capacity: usize) -> Result<Self, TryReserveError> {
        let mut storage = Vec::new();
        storage.try_reserve_exact(capacity)?;
        storage.resize(capacity, 0);
        Ok(Self {
            storage,
            head: 0,
            used: 0,
        })
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    #[must_use]
    pub fn used(&self) -> usize {
        self.used
    }

    #[must_use]
    pub fn free(&self) -> usize {
        self.capacity() - self.used
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.used == 0
    }

    /// Copy up to `out.len()` bytes from the front without consuming them
    ///
    /// Returns the number of bytes copied.
    pub fn peek(&self, out: &mut [u8]) -> usize {
        let n = out.len().min(self.used);
        if n == 0 {
            return 0;
        }

        let first = n.min(self.capacity() - self.head);
        out[..first].copy_from_slice(&self.storage[self.head..self.head + first]);
        out[first..n].copy_from_slice(&self.storage[..n - first]);
        n
    }

    /// Copy up to `out.len()` bytes from the front and consume them
    pub fn read(&mut self, out: &mut [u8]) -> usize {
        let n = self.peek(out);
        self.consume(n);
        n
    }

    /// Drop up to `n` bytes from the front
    pub fn consume(&mut self, n: usize) -> usize {
        let n = n.min(self.used);
        if n == 0 {
            return 0;
        }
        self.head = (self.head + n) % self.capacity();
        self.used -= n;
        if self.used == 0 {
            // Keep the next message contiguous when possible
            self.head = 0;
        }
        n
    }

    /// Append up to `data.len()` bytes, limited by the free space
    ///
    /// Returns the number of bytes stored.
    pub fn write(&mut self, data: &[u8]) -> usize {
        let n = data.len().min(self.free());
        if n == 0 {
            return 0;
        }

        let capacity = self.capacity();
        let tail = (self.head + self.used) % capacity;
        let first = n.min(capacity - tail);
        self.storage[tail..tail + first].copy_from_slice(&data[..first]);
        self.storage[..n - first].copy_from_slice(&data[first..n]);
        self.used += n;
        n
    }

    /// Free the storage. The ring has zero capacity afterwards.
    pub fn release(&mut self) {
        self.storage = Vec::new();
        self.head = 0;
        self.used = 0;
    }
}

impl std::fmt::Debug for RingBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingBuffer")
            .field("capacity", &self.capacity())
            .field("head", &self.head)
            .field("used", &self.used)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_ring_is_empty() {
        let ring = RingBuffer::with_capacity(16).unwrap();
        assert!(ring.is_empty());
        assert_eq!(ring.capacity(), 16);
        assert_eq!(ring.used(), 0);
        assert_eq!(ring.free(), 16);
    }

    #[test]
    fn test_write_then_read() {
        let mut ring = RingBuffer::with_capacity(16).unwrap();
        assert_eq!(ring.write(b"hello"), 5);
        assert_eq!(ring.used(), 5);

        let mut out = [0u8; 5];
        assert_eq!(ring.read(&mut out), 5);
        assert_eq!(&out, b"hello");
        assert!(ring.is_empty());
    }

    #[test]
    fn test_peek_does_not_consume() {
        let mut ring = RingBuffer::with_capacity(8).unwrap();
        ring.write(b"abc");

        let mut out = [0u8; 2];
        assert_eq!(ring.peek(&mut out), 2);
        assert_eq!(&out, b"ab");
        assert_eq!(ring.used(), 3);

        let mut out = [0u8; 3];
        assert_eq!(ring.read(&mut out), 3);
        assert_eq!(&out, b"abc");
    }

    #[test]
    fn test_write_limited_by_free_space() {
        let mut ring = RingBuffer::with_capacity(4).unwrap();
        assert_eq!(ring.write(b"abcdef"), 4);
        assert_eq!(ring.free(), 0);
        assert_eq!(ring.write(b"x"), 0);
    }

    #[test]
    fn test_wrap_around() {
        let mut ring = RingBuffer::with_capacity(8).unwrap();
        let mut out = [0u8; 8];

        // Move the head towards the end
        ring.write(b"123456");
        assert_eq!(ring.read(&mut out[..5]), 5);

        // "6" sits at index 5; the new bytes wrap past the end
        assert_eq!(ring.write(b"abcdefg"), 7);
        assert_eq!(ring.free(), 0);

        assert_eq!(ring.read(&mut out), 8);
        assert_eq!(&out, b"6abcdefg");
    }

    #[test]
    fn test_consume() {
        let mut ring = RingBuffer::with_capacity(8).unwrap();
        ring.write(b"abcdef");
        assert_eq!(ring.consume(2), 2);

        let mut out = [0u8; 4];
        ring.peek(&mut out);
        assert_eq!(&out, b"cdef");
        assert_eq!(ring.consume(100), 4);
        assert!(ring.is_empty());
    }

    #[test]
    fn test_zero_capacity() {
        let mut ring = RingBuffer::with_capacity(0).unwrap();
        let mut out = [0u8; 4];
        assert_eq!(ring.write(b"a"), 0);
        assert_eq!(ring.read(&mut out), 0);
        assert_eq!(ring.consume(1), 0);
    }

    #[test]
    fn test_release() {
        let mut ring = RingBuffer::with_capacity(8).unwrap();
        ring.write(b"abc");
        ring.release();
        assert_eq!(ring.capacity(), 0);
        assert!(ring.is_empty());
    }

    #[test]
    fn test_allocation_failure() {
        assert!(RingBuffer::with_capacity(usize::MAX).is_err());
    }
}
