//! Duplex relay engine
//!
//! Copies bytes concurrently in both directions between two streams until
//! each direction reaches end-of-stream or errors, counting bytes as it
//! goes. Whichever direction finishes first half-closes its write side,
//! which unblocks the opposite direction's pending read (a TCP FIN for a
//! socket, a session FIN frame for a cipher stream), so the engine never
//! hangs on a half-open peer. Both copy loops always run to completion
//! before the engine returns.

mod session;

pub use session::TunnelClient;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// Copy buffer size per direction
const COPY_BUF_SIZE: usize = 8 * 1024;

/// Outcome of one relay run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelaySummary {
    /// Bytes copied from `a` to `b`
    pub a_to_b: u64,
    /// Bytes copied from `b` to `a`
    pub b_to_a: u64,
    /// True if either direction ended on an error rather than a clean
    /// end-of-stream; the underlying connection should not be recycled
    pub should_close: bool,
}

/// Relay bytes between `a` and `b` until both directions finish.
///
/// The streams are handed back so the caller can inspect or dispose of
/// them after the counts are known (e.g. evict a pooled connection before
/// it is released). Byte counts are exact even on error paths, reflecting
/// what was transferred before the fault.
pub async fn relay<A, B>(a: A, b: B) -> (RelaySummary, A, B)
where
    A: AsyncRead + AsyncWrite + Unpin,
    B: AsyncRead + AsyncWrite + Unpin,
{
    let (mut a_read, mut a_write) = tokio::io::split(a);
    let (mut b_read, mut b_write) = tokio::io::split(b);

    let forward = async {
        let (copied, errored) = copy_half(&mut a_read, &mut b_write).await;
        // Half-close so the peer's read unblocks promptly
        let _ = b_write.shutdown().await;
        (copied, errored)
    };

    let backward = async {
        let (copied, errored) = copy_half(&mut b_read, &mut a_write).await;
        let _ = a_write.shutdown().await;
        (copied, errored)
    };

    let ((a_to_b, fwd_err), (b_to_a, bwd_err)) = tokio::join!(forward, backward);

    let summary = RelaySummary {
        a_to_b,
        b_to_a,
        should_close: fwd_err || bwd_err,
    };
    debug!(
        "relay finished: {} bytes forward, {} bytes backward, close={}",
        summary.a_to_b, summary.b_to_a, summary.should_close
    );

    (
        summary,
        a_read.unsplit(a_write),
        b_read.unsplit(b_write),
    )
}

/// Copy one direction to completion.
///
/// Returns the byte count and whether the direction ended on an error.
async fn copy_half<R, W>(reader: &mut R, writer: &mut W) -> (u64, bool)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; COPY_BUF_SIZE];
    let mut copied: u64 = 0;

    loop {
        match reader.read(&mut buf).await {
            Ok(0) => return (copied, false),
            Ok(n) => {
                if writer.write_all(&buf[..n]).await.is_err() {
                    return (copied, true);
                }
                if writer.flush().await.is_err() {
                    return (copied, true);
                }
                copied += n as u64;
            }
            Err(e) => {
                debug!("relay direction ended on error: {}", e);
                return (copied, true);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_clean_bidirectional_copy() {
        // relay(left_b, right_a): drivers sit on the far ends
        let (mut left_a, left_b) = tokio::io::duplex(64 * 1024);
        let (right_a, mut right_b) = tokio::io::duplex(64 * 1024);

        let left_driver = tokio::spawn(async move {
            left_a.write_all(&[0xAA; 1000]).await.unwrap();
            left_a.shutdown().await.unwrap();

            let mut received = Vec::new();
            left_a.read_to_end(&mut received).await.unwrap();
            received.len()
        });

        let right_driver = tokio::spawn(async move {
            let mut received = Vec::new();
            right_b.read_to_end(&mut received).await.unwrap();

            right_b.write_all(&[0xBB; 2500]).await.unwrap();
            right_b.shutdown().await.unwrap();
            received.len()
        });

        let (summary, _, _) = relay(left_b, right_a).await;

        assert_eq!(summary.a_to_b, 1000);
        assert_eq!(summary.b_to_a, 2500);
        assert!(!summary.should_close);

        assert_eq!(left_driver.await.unwrap(), 2500);
        assert_eq!(right_driver.await.unwrap(), 1000);
    }

    #[tokio::test]
    async fn test_mid_relay_error_terminates_both_directions() {
        let (mut left_a, left_b) = tokio::io::duplex(64 * 1024);
        let (right_a, mut right_b) = tokio::io::duplex(64 * 1024);
        let (peer_gone_tx, peer_gone_rx) = tokio::sync::oneshot::channel();

        tokio::spawn(async move {
            left_a.write_all(&[0x22; 300]).await.unwrap();
            // Wait until the far peer is gone, then push more bytes so the
            // forward direction hits the dead write side
            peer_gone_rx.await.unwrap();
            left_a.write_all(&[0x22; 50]).await.unwrap();
        });

        tokio::spawn(async move {
            let mut buf = [0u8; 300];
            right_b.read_exact(&mut buf).await.unwrap();
            right_b.write_all(&[0x33; 150]).await.unwrap();
            drop(right_b);
            peer_gone_tx.send(()).unwrap();
        });

        let (summary, _, _) = tokio::time::timeout(
            Duration::from_secs(5),
            relay(left_b, right_a),
        )
        .await
        .expect("relay must terminate in bounded time");

        // Bytes moved before the fault are still reported
        assert_eq!(summary.a_to_b, 300);
        assert_eq!(summary.b_to_a, 150);
        assert!(summary.should_close);
    }
}
