//! Pooled fixed-size scratch buffers
//!
//! Handshake construction needs a 9-byte header buffer and a padding
//! buffer per session. Sessions are short-lived and plentiful, so the
//! buffers are pooled to keep the allocation rate flat. Buffers are
//! returned on drop, on every exit path. A reacquired buffer still holds
//! the previous user's bytes; callers must fully overwrite it before use.

use std::ops::{Deref, DerefMut};
use std::sync::Mutex;

/// Pool of fixed-size byte buffers
pub(crate) struct BufferPool {
    size: usize,
    free: Mutex<Vec<Vec<u8>>>,
}

impl BufferPool {
    /// Create a pool handing out buffers of `size` bytes
    pub(crate) fn new(size: usize) -> Self {
        Self {
            size,
            free: Mutex::new(Vec::new()),
        }
    }

    /// Acquire a buffer, reusing a returned one when available
    pub(crate) fn acquire(&self) -> PooledBuffer<'_> {
        let buf = self
            .free
            .lock()
            .expect("buffer pool lock poisoned")
            .pop()
            .unwrap_or_else(|| vec![0u8; self.size]);

        debug_assert_eq!(buf.len(), self.size);

        PooledBuffer {
            pool: self,
            buf: Some(buf),
        }
    }

    fn release(&self, buf: Vec<u8>) {
        self.free
            .lock()
            .expect("buffer pool lock poisoned")
            .push(buf);
    }

    #[cfg(test)]
    fn idle(&self) -> usize {
        self.free.lock().unwrap().len()
    }
}

/// A buffer borrowed from a [`BufferPool`], returned on drop
pub(crate) struct PooledBuffer<'a> {
    pool: &'a BufferPool,
    buf: Option<Vec<u8>>,
}

impl Deref for PooledBuffer<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.buf.as_deref().expect("buffer already released")
    }
}

impl DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.buf.as_deref_mut().expect("buffer already released")
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.pool.release(buf);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_release() {
        let pool = BufferPool::new(9);
        assert_eq!(pool.idle(), 0);

        {
            let mut buf = pool.acquire();
            assert_eq!(buf.len(), 9);
            buf[0] = 0xAB;
        }

        // Returned on drop, contents retained until overwritten
        assert_eq!(pool.idle(), 1);
        let buf = pool.acquire();
        assert_eq!(pool.idle(), 0);
        assert_eq!(buf[0], 0xAB);
    }

    #[test]
    fn test_concurrent_borrows() {
        let pool = BufferPool::new(64);

        let a = pool.acquire();
        let b = pool.acquire();
        assert_eq!(a.len(), 64);
        assert_eq!(b.len(), 64);
        drop(a);
        drop(b);

        assert_eq!(pool.idle(), 2);
    }

    #[test]
    fn test_released_on_panic_path() {
        let pool = BufferPool::new(8);

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _buf = pool.acquire();
            panic!("unwound while holding a buffer");
        }));

        assert!(result.is_err());
        assert_eq!(pool.idle(), 1);
    }
}
