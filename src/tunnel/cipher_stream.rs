//! Authenticated cipher stream over a raw transport
//!
//! Wire format, one frame per sealed chunk:
//!
//! ```text
//! +----------------+---------------------------------------+
//! |  Length (2B BE)|  Nonce (12B) | Ciphertext | Tag (16B) |
//! +----------------+---------------------------------------+
//! ```
//!
//! A frame sealing an empty plaintext is the session FIN: it ends the
//! encrypted stream without touching the transport underneath, so a
//! pooled connection survives a clean session end and can be reused.
//! A transport EOF arriving without a FIN frame is a fault, not a clean
//! close.

use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use bytes::{Buf, BufMut, BytesMut};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use super::TunnelError;
use crate::crypto::{Aead, CipherMethod};
use crate::pool::Unusable;

/// Maximum plaintext bytes sealed into a single wire frame
pub const MAX_CHUNK_SIZE: usize = 16 * 1024;

/// Wire length prefix size
const LEN_PREFIX_SIZE: usize = 2;

/// Read chunk size for draining the inner transport
const READ_CHUNK_SIZE: usize = 4096;

/// A duplex stream that seals outbound bytes and opens inbound frames.
///
/// Bound 1:1 to one transport connection and one (secret, method) pair;
/// construction fails if the pair cannot produce a valid cipher.
pub struct CipherStream<S> {
    stream: S,
    aead: Aead,
    /// Raw bytes read from the transport, not yet framed
    incoming: BytesMut,
    /// Opened plaintext waiting to be handed to the caller
    decrypted: BytesMut,
    /// Sealed frames waiting to be written to the transport
    outgoing: BytesMut,
    fin_received: bool,
    fin_sent: bool,
}

impl<S> CipherStream<S> {
    /// Wrap `stream` with a cipher keyed from the shared passphrase
    pub fn new(stream: S, passphrase: &str, method: CipherMethod) -> Result<Self, TunnelError> {
        let aead = Aead::new(passphrase, method)?;
        Ok(Self {
            stream,
            aead,
            incoming: BytesMut::with_capacity(READ_CHUNK_SIZE),
            decrypted: BytesMut::new(),
            outgoing: BytesMut::new(),
            fin_received: false,
            fin_sent: false,
        })
    }

    /// Reference to the wrapped transport
    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    /// Mutable reference to the wrapped transport
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    /// Unwrap, discarding cipher state
    pub fn into_inner(self) -> S {
        self.stream
    }
}

impl<S: Unusable> Unusable for CipherStream<S> {
    fn mark_unusable(&self) {
        self.stream.mark_unusable();
    }
}

impl<S: AsyncWrite + Unpin> CipherStream<S> {
    /// Drain buffered sealed frames into the transport
    fn poll_write_outgoing(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        while !self.outgoing.is_empty() {
            let n = ready!(Pin::new(&mut self.stream).poll_write(cx, &self.outgoing))?;
            if n == 0 {
                return Poll::Ready(Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "transport closed while writing frame",
                )));
            }
            self.outgoing.advance(n);
        }
        Poll::Ready(Ok(()))
    }

    /// Seal one chunk and queue its wire frame
    fn queue_frame(&mut self, plaintext: &[u8]) -> io::Result<()> {
        let sealed = self
            .aead
            .seal(plaintext)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

        self.outgoing.reserve(LEN_PREFIX_SIZE + sealed.len());
        self.outgoing.put_u16(sealed.len() as u16);
        self.outgoing.extend_from_slice(&sealed);
        Ok(())
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for CipherStream<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        loop {
            // Serve already-opened plaintext first
            if !this.decrypted.is_empty() {
                let n = this.decrypted.len().min(buf.remaining());
                buf.put_slice(&this.decrypted.split_to(n));
                return Poll::Ready(Ok(()));
            }

            if this.fin_received {
                return Poll::Ready(Ok(()));
            }

            // Try to open a complete frame from the raw buffer
            if this.incoming.len() >= LEN_PREFIX_SIZE {
                let body_len =
                    u16::from_be_bytes([this.incoming[0], this.incoming[1]]) as usize;

                if body_len < Aead::overhead() {
                    return Poll::Ready(Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("frame too short: {} bytes", body_len),
                    )));
                }
                if body_len > Aead::sealed_len(MAX_CHUNK_SIZE) {
                    return Poll::Ready(Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("frame too large: {} bytes", body_len),
                    )));
                }

                if this.incoming.len() >= LEN_PREFIX_SIZE + body_len {
                    this.incoming.advance(LEN_PREFIX_SIZE);
                    let body = this.incoming.split_to(body_len);

                    // Authentication failure is terminal, never silently
                    // skipped
                    let plaintext = this
                        .aead
                        .open(&body)
                        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

                    if plaintext.is_empty() {
                        this.fin_received = true;
                        return Poll::Ready(Ok(()));
                    }

                    this.decrypted.extend_from_slice(&plaintext);
                    continue;
                }
            }

            // Need more transport bytes
            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let mut read_buf = ReadBuf::new(&mut chunk);
            ready!(Pin::new(&mut this.stream).poll_read(cx, &mut read_buf))?;

            let filled = read_buf.filled();
            if filled.is_empty() {
                return Poll::Ready(Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "transport closed without session end",
                )));
            }
            this.incoming.extend_from_slice(filled);
        }
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for CipherStream<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();

        if this.fin_sent {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "write after session end",
            )));
        }

        // Backpressure: the previous frame must reach the transport before
        // a new one is sealed
        ready!(this.poll_write_outgoing(cx))?;

        let chunk = &buf[..buf.len().min(MAX_CHUNK_SIZE)];
        this.queue_frame(chunk)?;

        // Opportunistic drain; leftovers go out on the next write or flush
        if let Poll::Ready(Err(e)) = this.poll_write_outgoing(cx) {
            return Poll::Ready(Err(e));
        }

        Poll::Ready(Ok(chunk.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        ready!(this.poll_write_outgoing(cx))?;
        Pin::new(&mut this.stream).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        if !this.fin_sent {
            ready!(this.poll_write_outgoing(cx))?;
            this.queue_frame(&[])?;
            this.fin_sent = true;
        }

        ready!(this.poll_write_outgoing(cx))?;

        // No transport shutdown: the connection may be pooled for reuse,
        // and the FIN frame already ended the encrypted session
        Pin::new(&mut this.stream).poll_flush(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn pair(
        method: CipherMethod,
    ) -> (
        CipherStream<tokio::io::DuplexStream>,
        CipherStream<tokio::io::DuplexStream>,
    ) {
        let (a, b) = tokio::io::duplex(256 * 1024);
        let a = CipherStream::new(a, "test passphrase", method).unwrap();
        let b = CipherStream::new(b, "test passphrase", method).unwrap();
        (a, b)
    }

    #[tokio::test]
    async fn test_roundtrip() {
        for method in [CipherMethod::Aes256Gcm, CipherMethod::ChaCha20Poly1305] {
            let (mut a, mut b) = pair(method);

            a.write_all(b"hello through the tunnel").await.unwrap();
            a.flush().await.unwrap();

            let mut buf = [0u8; 24];
            b.read_exact(&mut buf).await.unwrap();
            assert_eq!(&buf, b"hello through the tunnel");
        }
    }

    #[tokio::test]
    async fn test_large_transfer_chunks() {
        let (mut a, mut b) = pair(CipherMethod::Aes256Gcm);

        let data: Vec<u8> = (0..3 * MAX_CHUNK_SIZE + 17).map(|i| (i % 251) as u8).collect();
        let expected = data.clone();

        let writer = tokio::spawn(async move {
            a.write_all(&data).await.unwrap();
            a.flush().await.unwrap();
            a.shutdown().await.unwrap();
        });

        let mut received = Vec::new();
        b.read_to_end(&mut received).await.unwrap();

        writer.await.unwrap();
        assert_eq!(received, expected);
    }

    #[tokio::test]
    async fn test_fin_ends_session_cleanly() {
        let (mut a, mut b) = pair(CipherMethod::Aes256Gcm);

        a.write_all(b"last words").await.unwrap();
        a.shutdown().await.unwrap();

        let mut buf = [0u8; 10];
        b.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"last words");

        // FIN frame surfaces as clean EOF
        assert_eq!(b.read(&mut buf).await.unwrap(), 0);
        // And stays EOF
        assert_eq!(b.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_write_after_fin_rejected() {
        let (mut a, _b) = pair(CipherMethod::Aes256Gcm);

        a.shutdown().await.unwrap();
        let err = a.write_all(b"too late").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[tokio::test]
    async fn test_transport_eof_without_fin_is_error() {
        let (mut a, b) = pair(CipherMethod::Aes256Gcm);
        drop(b);

        let mut buf = [0u8; 8];
        let err = a.read(&mut buf).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[tokio::test]
    async fn test_tampered_frame_is_terminal() {
        let (raw_a, raw_b) = tokio::io::duplex(64 * 1024);
        let mut a = CipherStream::new(raw_a, "test passphrase", CipherMethod::Aes256Gcm).unwrap();
        let mut b = CipherStream::new(raw_b, "test passphrase", CipherMethod::Aes256Gcm).unwrap();

        a.write_all(b"authentic data").await.unwrap();
        a.flush().await.unwrap();

        // Inject garbage directly into the transport behind the reader's
        // framing
        let mut buf = [0u8; 14];
        b.read_exact(&mut buf).await.unwrap();

        let inner = a.get_mut();
        let bogus_len = (Aead::overhead() as u16).to_be_bytes();
        inner.write_all(&bogus_len).await.unwrap();
        inner.write_all(&vec![0u8; Aead::overhead()]).await.unwrap();

        let err = b.read(&mut buf).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn test_mismatched_passphrases_fail() {
        let (raw_a, raw_b) = tokio::io::duplex(64 * 1024);
        let mut a = CipherStream::new(raw_a, "passphrase one", CipherMethod::Aes256Gcm).unwrap();
        let mut b = CipherStream::new(raw_b, "passphrase two", CipherMethod::Aes256Gcm).unwrap();

        a.write_all(b"hello").await.unwrap();
        a.flush().await.unwrap();

        let mut buf = [0u8; 8];
        let err = b.read(&mut buf).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
