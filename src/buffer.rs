//! Accumulation buffer for bytes received from the server.
//!
//! The buffer is a single pooled allocation. [`Cursor`] marks the window of
//! bytes that were received but not yet consumed:
//!
//! ```text
//! 0          pos              len              capacity
//! ├──────────┼────────────────┼────────────────┤
//! │ consumed │ unread         │ free           │
//! ```
//!
//! Consumers only move `pos` forward. [`ReadBuffer::reserve`] shifts or grows
//! the allocation so that a requested number of unread bytes fits, always
//! preserving `[pos, len)`. Offsets into the consumed region (such as the
//! current row's column spans) stay valid until the next `reserve`.

use std::sync::Arc;

use crate::buffer_pool::{BufferPool, PooledBuffer};

/// Initial size of the accumulation buffer.
pub const INITIAL_READ_CAPACITY: usize = 8192;

/// Window of received-but-unconsumed bytes in a [`ReadBuffer`].
///
/// Invariant: `pos <= len <= capacity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cursor {
    /// Start of the unread region
    pub pos: usize,
    /// End of the received bytes
    pub len: usize,
}

impl Cursor {
    /// Number of unread bytes.
    #[inline]
    pub fn available(self) -> usize {
        self.len - self.pos
    }

    /// Cursor with `n` more bytes consumed.
    #[inline]
    pub fn advance(self, n: usize) -> Self {
        debug_assert!(self.pos + n <= self.len);
        Self {
            pos: self.pos + n,
            len: self.len,
        }
    }
}

/// Growable, shiftable receive buffer.
#[derive(Debug)]
pub struct ReadBuffer {
    /// Always fully initialized: `buf.len()` is the usable capacity.
    buf: PooledBuffer,
    cursor: Cursor,
}

impl ReadBuffer {
    /// Take a buffer of `capacity` bytes from `pool`.
    pub fn new(pool: &Arc<BufferPool>, capacity: usize) -> Self {
        let mut buf = PooledBuffer::take(pool, capacity);
        buf.resize(capacity, 0);
        Self {
            buf,
            cursor: Cursor::default(),
        }
    }

    /// Total capacity.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Current cursor.
    #[inline]
    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// Replace the cursor after consuming bytes.
    #[inline]
    pub fn set_cursor(&mut self, cursor: Cursor) {
        debug_assert!(cursor.pos <= cursor.len && cursor.len == self.cursor.len);
        debug_assert!(cursor.pos >= self.cursor.pos);
        self.cursor = cursor;
    }

    /// The whole buffer. Cursor positions and row offsets index into this.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.buf
    }

    /// Bytes received but not yet consumed.
    #[inline]
    pub fn unread(&self) -> &[u8] {
        &self.buf[self.cursor.pos..self.cursor.len]
    }

    /// Consume `n` unread bytes.
    #[inline]
    pub fn consume(&mut self, n: usize) {
        self.cursor = self.cursor.advance(n);
    }

    /// Make sure `n` unread bytes fit in the buffer.
    ///
    /// If the buffer could hold `n` bytes once the unread region is moved to
    /// the front, the region is shifted. Otherwise a buffer of at least twice
    /// the capacity (and no smaller than `n`) is taken from the pool, the
    /// unread region is copied over and the old buffer goes back to the pool.
    pub fn reserve(&mut self, n: usize) {
        let Cursor { pos, len } = self.cursor;
        let unread = len - pos;
        // Already buffered, or fits after `pos` without moving.
        if pos + n <= self.capacity() {
            return;
        }

        if n <= self.capacity() {
            tracing::trace!(unread, shift = pos, "shifting read buffer");
            self.buf.copy_within(pos..len, 0);
        } else {
            let new_capacity = (self.capacity() * 2).max(n);
            tracing::trace!(
                from = self.capacity(),
                to = new_capacity,
                "growing read buffer"
            );
            let old = self.buf.replace(new_capacity);
            self.buf.extend_from_slice(&old[pos..len]);
            self.buf.resize(new_capacity, 0);
            self.buf.release(old);
        }

        self.cursor = Cursor {
            pos: 0,
            len: unread,
        };
    }

    /// Free space after the received bytes.
    #[inline]
    pub fn spare_mut(&mut self) -> &mut [u8] {
        let len = self.cursor.len;
        &mut self.buf[len..]
    }

    /// Record `n` bytes written into [`ReadBuffer::spare_mut`].
    #[inline]
    pub fn commit(&mut self, n: usize) {
        debug_assert!(self.cursor.len + n <= self.capacity());
        self.cursor.len += n;
    }
}
