//! Cipher method negotiation codec
//!
//! The session handshake carries a single byte naming the AEAD cipher the
//! tunnel stream will use. Unknown method names map to the reserved
//! sentinel `0`, which callers must treat as "unsupported, do not send".

/// Supported AEAD cipher methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherMethod {
    /// AES-256-GCM
    Aes256Gcm,
    /// ChaCha20-Poly1305
    ChaCha20Poly1305,
}

/// Wire sentinel for an unsupported cipher method
pub const METHOD_UNSUPPORTED: u8 = 0;

impl CipherMethod {
    /// Parse a human-readable method name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "aes-256-gcm" => Some(CipherMethod::Aes256Gcm),
            "chacha20-poly1305" => Some(CipherMethod::ChaCha20Poly1305),
            _ => None,
        }
    }

    /// The 1-byte wire identifier sent in the handshake
    pub fn wire_code(self) -> u8 {
        match self {
            CipherMethod::Aes256Gcm => 1,
            CipherMethod::ChaCha20Poly1305 => 2,
        }
    }

    /// Reverse mapping from the wire identifier
    pub fn from_wire_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(CipherMethod::Aes256Gcm),
            2 => Some(CipherMethod::ChaCha20Poly1305),
            _ => None,
        }
    }

    /// Canonical method name
    pub fn name(self) -> &'static str {
        match self {
            CipherMethod::Aes256Gcm => "aes-256-gcm",
            CipherMethod::ChaCha20Poly1305 => "chacha20-poly1305",
        }
    }
}

impl std::fmt::Display for CipherMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Encode a method name to its wire byte, `0` if unsupported.
///
/// Total function: unsupported input is a valid sentinel result, not an
/// error.
pub fn encode_cipher_method(name: &str) -> u8 {
    CipherMethod::from_name(name)
        .map(CipherMethod::wire_code)
        .unwrap_or(METHOD_UNSUPPORTED)
}
