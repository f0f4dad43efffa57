//! Handshake frame construction
//!
//! The session-opening message sent over a freshly acquired (or reused)
//! tunnel connection. Wire layout, each segment sealed independently:
//!
//! ```text
//! +------------------------+---------------------------+- - - - - - - -+
//! | sealed header (9B pt)  | sealed address ++ method  | sealed padding|
//! +------------------------+---------------------------+- - - - - - - -+
//! ```
//!
//! The header's length field equals `len(target) + 1` (the trailing byte
//! is the negotiated cipher method). The padding segment exists iff the
//! header's padded flag is set; it obscures the true handshake length
//! from passive observers.

use super::{encode_header, BufferPool, ProtocolError, HEADER_SIZE, MAX_ADDRESS_LEN};
use crate::crypto::{encode_cipher_method, random_bytes, Aead};

/// Fixed size of the optional padding block, before sealing
pub const PADDING_SIZE: usize = 64;

/// Builds handshake frames, reusing header and padding scratch buffers
/// across sessions.
pub struct FrameBuilder {
    headers: BufferPool,
    padding: BufferPool,
}

impl FrameBuilder {
    /// Create a frame builder with empty buffer pools
    pub fn new() -> Self {
        Self {
            headers: BufferPool::new(HEADER_SIZE),
            padding: BufferPool::new(PADDING_SIZE),
        }
    }

    /// Build the complete handshake message for one session.
    ///
    /// `target` is the destination address (`host:port`), `method_name`
    /// the configured cipher method, `aead` the handshake cipher keyed
    /// from the shared passphrase, and `pad` whether to append a padding
    /// block. Returns the exact byte sequence to write to the transport
    /// in a single call.
    ///
    /// An unsupported method name aborts before anything is sealed for
    /// sending; no partial frame is ever produced.
    pub fn build(
        &self,
        target: &str,
        method_name: &str,
        aead: &Aead,
        pad: bool,
    ) -> Result<Vec<u8>, ProtocolError> {
        if target.len() > MAX_ADDRESS_LEN {
            return Err(ProtocolError::AddressTooLong(target.len()));
        }

        let mut header = self.headers.acquire();
        encode_header(target.len() + 1, pad, &mut header);
        let sealed_header = aead.seal(&header)?;

        let method = encode_cipher_method(method_name);
        if method == 0 {
            return Err(ProtocolError::UnsupportedMethod(method_name.to_string()));
        }

        let mut payload = Vec::with_capacity(target.len() + 1);
        payload.extend_from_slice(target.as_bytes());
        payload.push(method);
        let sealed_payload = aead.seal(&payload)?;

        let padding_len = if pad {
            Aead::sealed_len(PADDING_SIZE)
        } else {
            0
        };
        let mut frame =
            Vec::with_capacity(sealed_header.len() + sealed_payload.len() + padding_len);
        frame.extend_from_slice(&sealed_header);
        frame.extend_from_slice(&sealed_payload);

        if pad {
            let mut padding = self.padding.acquire();
            // Overwrite fully: a reused buffer still holds stale bytes
            random_bytes(&mut padding);
            frame.extend_from_slice(&aead.seal(&padding)?);
        }

        Ok(frame)
    }
}

impl Default for FrameBuilder {
    fn default() -> Self {
        Self::new()
    }
}
