//! Connection pooling for the tunnel transport
//!
//! Tunnel sessions are short-lived but connection setup to the remote
//! relay is not, so transport connections are lent out of a shared pool
//! and recycled when the session ends healthy. A session that observes an
//! I/O fault marks its connection unusable before releasing it; the pool
//! then discards the socket instead of handing it to the next caller.

use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tracing::debug;

/// Pool errors
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("Connect to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("Connect to {0} timed out")]
    ConnectTimeout(String),
}

/// Capability to flag a borrowed connection as no longer safe to reuse.
///
/// Sessions decide eviction through this interface only; wrappers layered
/// over a pooled connection delegate it downward.
pub trait Unusable {
    /// Mark the underlying connection as unusable
    fn mark_unusable(&self);
}

/// Default connect timeout for new pool connections
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

struct PoolShared {
    server_addr: String,
    max_idle: usize,
    connect_timeout: Duration,
    idle: Mutex<VecDeque<TcpStream>>,
}

impl PoolShared {
    fn idle_len(&self) -> usize {
        self.idle.lock().expect("pool lock poisoned").len()
    }

    fn release(&self, stream: TcpStream) {
        let mut idle = self.idle.lock().expect("pool lock poisoned");
        if idle.len() < self.max_idle {
            idle.push_back(stream);
            debug!("returned connection to pool, {} idle", idle.len());
        } else {
            debug!("pool full, closing connection");
        }
    }
}

/// Shared pool of transport connections to one remote relay endpoint
#[derive(Clone)]
pub struct ConnectionPool {
    shared: Arc<PoolShared>,
}

impl ConnectionPool {
    /// Create a pool dialing `server_addr`, keeping at most `max_idle`
    /// idle connections
    pub fn new(server_addr: impl Into<String>, max_idle: usize) -> Self {
        Self::with_timeout(server_addr, max_idle, DEFAULT_CONNECT_TIMEOUT)
    }

    /// Create a pool with an explicit connect timeout
    pub fn with_timeout(
        server_addr: impl Into<String>,
        max_idle: usize,
        connect_timeout: Duration,
    ) -> Self {
        Self {
            shared: Arc::new(PoolShared {
                server_addr: server_addr.into(),
                max_idle,
                connect_timeout,
                idle: Mutex::new(VecDeque::new()),
            }),
        }
    }

    /// Borrow a connection, reusing an idle one or dialing a fresh one.
    ///
    /// A reused connection may have gone stale since it was returned; the
    /// caller's first write surfaces that, and marking the connection
    /// unusable keeps it out of circulation. No retry happens here.
    pub async fn acquire(&self) -> Result<PooledConn, PoolError> {
        let reused = self
            .shared
            .idle
            .lock()
            .expect("pool lock poisoned")
            .pop_front();

        let stream = match reused {
            Some(stream) => {
                debug!("reusing pooled connection, {} idle", self.len());
                stream
            }
            None => {
                let addr = &self.shared.server_addr;
                let stream = tokio::time::timeout(
                    self.shared.connect_timeout,
                    TcpStream::connect(addr),
                )
                .await
                .map_err(|_| PoolError::ConnectTimeout(addr.clone()))?
                .map_err(|source| PoolError::Connect {
                    addr: addr.clone(),
                    source,
                })?;

                stream.set_nodelay(true).ok();
                debug!("dialed new connection to {}", addr);
                stream
            }
        };

        Ok(PooledConn {
            stream: Some(stream),
            usable: AtomicBool::new(true),
            shared: Arc::clone(&self.shared),
        })
    }

    /// Number of idle connections currently held
    pub fn len(&self) -> usize {
        self.shared.idle_len()
    }

    /// Whether the pool holds no idle connections
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A transport connection borrowed from a [`ConnectionPool`].
///
/// Returned to the pool on drop unless marked unusable.
pub struct PooledConn {
    stream: Option<TcpStream>,
    usable: AtomicBool,
    shared: Arc<PoolShared>,
}

impl PooledConn {
    /// Whether the connection is still considered reusable
    pub fn is_usable(&self) -> bool {
        self.usable.load(Ordering::Relaxed)
    }

    fn stream_mut(&mut self) -> io::Result<&mut TcpStream> {
        self.stream
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "connection released"))
    }
}

impl Unusable for PooledConn {
    fn mark_unusable(&self) {
        self.usable.store(false, Ordering::Relaxed);
    }
}

impl Drop for PooledConn {
    fn drop(&mut self) {
        if let Some(stream) = self.stream.take() {
            if self.is_usable() {
                self.shared.release(stream);
            } else {
                debug!("discarding connection marked unusable");
            }
        }
    }
}

impl AsyncRead for PooledConn {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.stream_mut() {
            Ok(stream) => Pin::new(stream).poll_read(cx, buf),
            Err(e) => Poll::Ready(Err(e)),
        }
    }
}

impl AsyncWrite for PooledConn {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.stream_mut() {
            Ok(stream) => Pin::new(stream).poll_write(cx, buf),
            Err(e) => Poll::Ready(Err(e)),
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.stream_mut() {
            Ok(stream) => Pin::new(stream).poll_flush(cx),
            Err(e) => Poll::Ready(Err(e)),
        }
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.stream_mut() {
            Ok(stream) => Pin::new(stream).poll_shutdown(cx),
            Err(e) => Poll::Ready(Err(e)),
        }
    }
}
