use bytes::BytesMut;
use std::fmt;
use std::mem;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Default number of idle buffers kept by a pool.
pub const DEFAULT_MAX_IDLE: usize = 64;

/// Default largest capacity a buffer may have and still be returned to the pool.
pub const DEFAULT_MAX_CAPACITY: usize = 1024 * 1024;

const INITIAL_CAPACITY: usize = 8 * 1024; // 8KB, matches a typical first body frame

/// A pool of reusable body buffers for the buffered strategy.
///
/// Each [`PooledBuffer`] is owned by exactly one request and goes back to the
/// pool when dropped, whichever way the request ends.
pub struct BufferPool {
    idle: Mutex<Vec<BytesMut>>,
    max_idle: usize,
    max_capacity: usize,
}

impl BufferPool {
    /// Creates a pool with default limits.
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_MAX_IDLE, DEFAULT_MAX_CAPACITY)
    }

    /// Creates a pool that keeps at most `max_idle` buffers, each with a
    /// capacity of at most `max_capacity` bytes.
    pub fn with_limits(max_idle: usize, max_capacity: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::new()),
            max_idle,
            max_capacity,
        }
    }

    /// Takes a cleared buffer out of the pool, allocating one if the pool is empty.
    pub fn acquire(self: &Arc<Self>) -> PooledBuffer {
        let buffer = self
            .lock()
            .pop()
            .unwrap_or_else(|| BytesMut::with_capacity(INITIAL_CAPACITY));

        PooledBuffer {
            buffer,
            pool: Arc::clone(self),
        }
    }

    /// Returns the number of buffers currently waiting in the pool.
    pub fn idle(&self) -> usize {
        self.lock().len()
    }

    fn release(&self, mut buffer: BytesMut) {
        if buffer.capacity() > self.max_capacity {
            return;
        }
        buffer.clear();

        let mut idle = self.lock();
        if idle.len() < self.max_idle {
            idle.push(buffer);
        }
    }

    // A panic while the lock is held cannot leave the Vec half-updated, so a
    // poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, Vec<BytesMut>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferPool")
            .field("idle", &self.idle())
            .field("max_idle", &self.max_idle)
            .field("max_capacity", &self.max_capacity)
            .finish()
    }
}

/// A buffer borrowed from a [`BufferPool`].
///
/// Dereferences to [`BytesMut`]. The buffer is released back to its pool on drop.
pub struct PooledBuffer {
    buffer: BytesMut,
    pool: Arc<BufferPool>,
}

impl Deref for PooledBuffer {
    type Target = BytesMut;

    fn deref(&self) -> &BytesMut {
        &self.buffer
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut BytesMut {
        &mut self.buffer
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        self.pool.release(mem::take(&mut self.buffer));
    }
}

impl fmt::Debug for PooledBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledBuffer")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}
