//! Tunnel handshake protocol
//!
//! Provides:
//! - The 9-byte session header codec
//! - The encrypted handshake frame builder
//! - Pooled scratch buffers for header and padding blocks

mod buffer;
mod handshake;
mod header;

pub(crate) use buffer::BufferPool;
pub use handshake::{FrameBuilder, PADDING_SIZE};
pub use header::{decode_header, encode_header, SessionHeader, FLAG_PADDED, HEADER_SIZE};

use thiserror::Error;

/// Protocol errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Unsupported cipher method: {0}")]
    UnsupportedMethod(String),

    #[error("Target address too long: {0} bytes")]
    AddressTooLong(usize),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Crypto error: {0}")]
    Crypto(#[from] crate::crypto::CryptoError),
}

/// Maximum target address length carried in a handshake.
///
/// The header length field is 24-bit, but SOCKS5 domains cap at 255 bytes
/// plus a `:port` suffix; anything longer is malformed input.
pub const MAX_ADDRESS_LEN: usize = 262;
