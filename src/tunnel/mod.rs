//! Tunnel layer - authenticated encrypted byte stream
//!
//! Wraps a raw transport connection in a negotiated AEAD cipher so that
//! callers see an ordinary duplex byte stream while every wire frame is
//! encrypted and authenticated.

mod cipher_stream;

pub use cipher_stream::{CipherStream, MAX_CHUNK_SIZE};

use thiserror::Error;

/// Tunnel layer errors
#[derive(Debug, Error)]
pub enum TunnelError {
    #[error("Cipher setup failed: {0}")]
    CipherSetup(#[from] crate::crypto::CryptoError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
