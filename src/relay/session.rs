//! Relay session orchestration
//!
//! One session per inbound local connection: borrow a pooled transport,
//! send the encrypted handshake naming the target, wrap the transport in
//! the negotiated cipher stream, then hand both streams to the duplex
//! relay engine. The pooled connection is recycled only when the session
//! ended healthy.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use super::relay;
use crate::config::ClientConfig;
use crate::crypto::{random_bytes, Aead, CipherMethod};
use crate::pool::{ConnectionPool, Unusable};
use crate::protocol::{FrameBuilder, ProtocolError};
use crate::stats::RelayStats;
use crate::tunnel::CipherStream;

/// Client-side tunnel relay: the entry point the proxy front ends hand
/// `(local connection, target address)` pairs to.
pub struct TunnelClient {
    pool: ConnectionPool,
    password: String,
    method: String,
    enable_padding: bool,
    stats: Arc<RelayStats>,
    frames: FrameBuilder,
}

impl TunnelClient {
    /// Build a client from configuration and an injected stats sink
    pub fn new(config: &ClientConfig, stats: Arc<RelayStats>) -> Self {
        Self {
            pool: ConnectionPool::with_timeout(
                config.server.clone(),
                config.pool_size,
                config.connect_timeout(),
            ),
            password: config.password.clone(),
            method: config.method.clone(),
            enable_padding: config.enable_padding,
            stats: Arc::clone(&stats),
            frames: FrameBuilder::new(),
        }
    }

    /// Shared statistics counters
    pub fn stats(&self) -> &Arc<RelayStats> {
        &self.stats
    }

    /// Number of idle pooled connections (diagnostic)
    pub fn pool_len(&self) -> usize {
        self.pool.len()
    }

    /// Run one relay session between `local` and the remote target.
    ///
    /// Returns once both relay directions have terminated, or earlier on
    /// a setup failure. Bytes already relayed are never rolled back.
    pub async fn relay_to<L>(&self, local: L, target: &str) -> crate::Result<()>
    where
        L: AsyncRead + AsyncWrite + Unpin,
    {
        // Acquisition failure aborts the session; retry policy, if any,
        // belongs to the pool
        let mut conn = self.pool.acquire().await?;
        debug!("pool holds {} idle connections after acquire", self.pool.len());

        let handshake = self.build_handshake(target)?;
        if let Err(e) = conn.write_all(&handshake).await {
            // A poisoned socket must not reach the next session
            warn!("handshake write to {} failed: {}", target, e);
            conn.mark_unusable();
            return Err(e.into());
        }

        let method = CipherMethod::from_name(&self.method)
            .ok_or_else(|| ProtocolError::UnsupportedMethod(self.method.clone()))?;
        let tunnel = CipherStream::new(conn, &self.password, method)?;

        let (summary, _local, tunnel) = relay(local, tunnel).await;

        if summary.should_close {
            tunnel.mark_unusable();
        } else {
            debug!("underlying connection is healthy, recycling it");
        }
        self.stats.record(summary.a_to_b, summary.b_to_a);

        info!(
            "sent {} bytes to {}, received {} bytes",
            summary.a_to_b, target, summary.b_to_a
        );
        drop(tunnel);
        debug!("pool holds {} idle connections after release", self.pool.len());

        Ok(())
    }

    /// Build the session-opening handshake message.
    ///
    /// Aborts before anything is written if the configured method is
    /// unsupported. The handshake itself is always sealed with
    /// AES-256-GCM; the method byte inside names the cipher the stream
    /// will use afterwards.
    fn build_handshake(&self, target: &str) -> crate::Result<Vec<u8>> {
        let aead = Aead::new(&self.password, CipherMethod::Aes256Gcm)?;
        let pad = self.enable_padding && random_coin();
        let frame = self.frames.build(target, &self.method, &aead, pad)?;
        Ok(frame)
    }
}

/// Fair coin from the system RNG, used to vary handshake lengths
fn random_coin() -> bool {
    let mut byte = [0u8; 1];
    random_bytes(&mut byte);
    byte[0] & 1 == 1
}
