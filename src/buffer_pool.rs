//! Buffer pool for reusing byte buffers across connections.

use std::ops::{Deref, DerefMut};
use std::sync::{Arc, LazyLock};

use crossbeam_queue::ArrayQueue;

const POOL_CAPACITY: usize = 128;

/// Global buffer pool for reusing buffers across connections.
pub static GLOBAL_BUFFER_POOL: LazyLock<Arc<BufferPool>> =
    LazyLock::new(|| Arc::new(BufferPool::default()));

/// A pooled `Vec<u8>` that returns itself to the pool on drop.
#[derive(Debug)]
pub struct PooledBuffer {
    pool: Arc<BufferPool>,
    inner: Vec<u8>,
}

impl PooledBuffer {
    /// Take a buffer with at least `min_capacity` bytes of capacity from `pool`.
    pub fn take(pool: &Arc<BufferPool>, min_capacity: usize) -> Self {
        Self {
            pool: Arc::clone(pool),
            inner: pool.take(min_capacity),
        }
    }

    /// Swap in a fresh buffer of at least `min_capacity` from the same pool.
    ///
    /// The new buffer is empty; the old one is handed back to the caller, who
    /// must pass it to [`PooledBuffer::release`] once its contents are copied.
    pub fn replace(&mut self, min_capacity: usize) -> Vec<u8> {
        let fresh = self.pool.take(min_capacity);
        std::mem::replace(&mut self.inner, fresh)
    }

    /// Return a buffer obtained from [`PooledBuffer::replace`] to the pool.
    pub fn release(&self, buffer: Vec<u8>) {
        self.pool.give_back(buffer);
    }
}

impl Deref for PooledBuffer {
    type Target = Vec<u8>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        self.pool.give_back(std::mem::take(&mut self.inner));
    }
}

/// Buffer pool for reusing `Vec<u8>` allocations.
#[derive(Debug)]
pub struct BufferPool {
    buffers: ArrayQueue<Vec<u8>>,
}

impl BufferPool {
    /// Create a new buffer pool with the given capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            buffers: ArrayQueue::new(capacity),
        }
    }

    /// Get an empty buffer from the pool, or allocate one if the pool is empty.
    pub fn take(&self, min_capacity: usize) -> Vec<u8> {
        let mut buffer = self.buffers.pop().unwrap_or_default();
        buffer.reserve(min_capacity);
        buffer
    }

    /// Return a buffer to the pool.
    pub fn give_back(&self, mut buffer: Vec<u8>) {
        // Clear but preserve capacity
        buffer.clear();

        // Ignore if pool is full
        let _ = self.buffers.push(buffer);
    }

    /// Number of idle buffers in the pool.
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    /// Returns true if no idle buffers are pooled.
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(POOL_CAPACITY)
    }
}
