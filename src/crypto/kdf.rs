//! Key Derivation Functions
//!
//! Provides HKDF-SHA256 for deriving session keys from the shared
//! passphrase

use super::{CryptoError, KEY_LEN};
use ring::hkdf::{self, Salt, HKDF_SHA256};

/// HKDF-SHA256 key derivation
pub struct Hkdf {
    prk: hkdf::Prk,
}

impl Hkdf {
    /// Create HKDF from input keying material
    ///
    /// # Arguments
    /// * `salt` - Optional salt (if None, uses zeros)
    /// * `ikm` - Input keying material
    pub fn new(salt: Option<&[u8]>, ikm: &[u8]) -> Self {
        let salt = match salt {
            Some(s) => Salt::new(HKDF_SHA256, s),
            None => Salt::new(HKDF_SHA256, &[0u8; 32]),
        };

        let prk = salt.extract(ikm);

        Self { prk }
    }

    /// Derive a key from the PRK
    ///
    /// # Arguments
    /// * `info` - Context and application-specific information
    /// * `output` - Buffer to write derived key to
    pub fn expand(&self, info: &[u8], output: &mut [u8]) -> Result<(), CryptoError> {
        let info_refs = [info];
        let okm = self
            .prk
            .expand(&info_refs, HkdfLen(output.len()))
            .map_err(|_| CryptoError::KeyGeneration("HKDF expand failed".to_string()))?;

        okm.fill(output)
            .map_err(|_| CryptoError::KeyGeneration("HKDF fill failed".to_string()))?;

        Ok(())
    }

    /// Derive a 32-byte key
    pub fn expand_key(&self, info: &[u8]) -> Result<[u8; KEY_LEN], CryptoError> {
        let mut key = [0u8; KEY_LEN];
        self.expand(info, &mut key)?;
        Ok(key)
    }
}

/// Helper struct for HKDF output length
struct HkdfLen(usize);

impl hkdf::KeyType for HkdfLen {
    fn len(&self) -> usize {
        self.0
    }
}

/// Derive the symmetric session key from the shared passphrase.
///
/// Both endpoints derive the same key from the same passphrase, so the
/// derivation is salt-free and deterministic.
pub fn derive_session_key(passphrase: &str) -> Result<[u8; KEY_LEN], CryptoError> {
    let hkdf = Hkdf::new(None, passphrase.as_bytes());
    hkdf.expand_key(b"veiltun_session_key")
}
