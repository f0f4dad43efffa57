//! Cryptographic primitives for Veiltun
//!
//! This module provides:
//! - AEAD encryption (AES-256-GCM, ChaCha20-Poly1305)
//! - Cipher method negotiation codec
//! - HKDF-SHA256 key derivation from the shared passphrase
//! - Secure random number generation

mod aead;
mod kdf;
mod method;

pub use aead::Aead;
pub use kdf::{derive_session_key, Hkdf};
pub use method::{encode_cipher_method, CipherMethod};

use thiserror::Error;

/// Length of symmetric key in bytes
pub const KEY_LEN: usize = 32;

/// Length of nonce in bytes
pub const NONCE_LEN: usize = 12;

/// Length of authentication tag in bytes
pub const TAG_LEN: usize = 16;

/// Cryptographic errors
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Decryption failed: {0}")]
    Decryption(String),

    #[error("Invalid key length")]
    InvalidKeyLength,

    #[error("Authentication failed")]
    AuthenticationFailed,
}

/// Generate cryptographically secure random bytes
pub fn random_bytes(buf: &mut [u8]) {
    use ring::rand::{SecureRandom, SystemRandom};
    let rng = SystemRandom::new();
    rng.fill(buf).expect("Failed to generate random bytes");
}
