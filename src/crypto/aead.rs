//! AEAD encryption/decryption utilities
//!
//! Each sealed message carries its own freshly generated random nonce, so
//! the two tunnel endpoints need no nonce synchronization. Wire layout of
//! a sealed message: `nonce (12) || ciphertext || tag (16)`.

use super::{derive_session_key, random_bytes, CipherMethod, CryptoError, NONCE_LEN, TAG_LEN};
use ring::aead::{Aad, Algorithm, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, CHACHA20_POLY1305};

/// AEAD cipher handle bound to one key and method
pub struct Aead {
    key: LessSafeKey,
}

impl Aead {
    /// Create a cipher handle keyed from the shared passphrase
    pub fn new(passphrase: &str, method: CipherMethod) -> Result<Self, CryptoError> {
        let key = derive_session_key(passphrase)?;
        Self::from_key(&key, method)
    }

    /// Create a cipher handle from a raw 32-byte key
    pub fn from_key(key: &[u8], method: CipherMethod) -> Result<Self, CryptoError> {
        let algorithm: &'static Algorithm = match method {
            CipherMethod::Aes256Gcm => &AES_256_GCM,
            CipherMethod::ChaCha20Poly1305 => &CHACHA20_POLY1305,
        };

        let unbound_key =
            UnboundKey::new(algorithm, key).map_err(|_| CryptoError::InvalidKeyLength)?;

        Ok(Self {
            key: LessSafeKey::new(unbound_key),
        })
    }

    /// Seal a plaintext, generating a fresh random nonce internally.
    ///
    /// Returns `nonce || ciphertext || tag`.
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        random_bytes(&mut nonce_bytes);
        let nonce = Nonce::assume_unique_for_key(nonce_bytes);

        let mut buffer = plaintext.to_vec();
        self.key
            .seal_in_place_append_tag(nonce, Aad::empty(), &mut buffer)
            .map_err(|_| CryptoError::Encryption("seal failed".to_string()))?;

        let mut out = Vec::with_capacity(NONCE_LEN + buffer.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&buffer);
        Ok(out)
    }

    /// Open a sealed message produced by [`seal`](Self::seal).
    ///
    /// Fails if the message was truncated, tampered with, or sealed under
    /// a different key.
    pub fn open(&self, sealed: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if sealed.len() < NONCE_LEN + TAG_LEN {
            return Err(CryptoError::Decryption("message too short".to_string()));
        }

        let nonce = Nonce::try_assume_unique_for_key(&sealed[..NONCE_LEN])
            .map_err(|_| CryptoError::Decryption("invalid nonce".to_string()))?;

        let mut buffer = sealed[NONCE_LEN..].to_vec();
        let plaintext = self
            .key
            .open_in_place(nonce, Aad::empty(), &mut buffer)
            .map_err(|_| CryptoError::AuthenticationFailed)?;

        Ok(plaintext.to_vec())
    }

    /// Bytes added to a plaintext by [`seal`](Self::seal)
    pub const fn overhead() -> usize {
        NONCE_LEN + TAG_LEN
    }

    /// Sealed length for a given plaintext length
    pub const fn sealed_len(plaintext_len: usize) -> usize {
        plaintext_len + NONCE_LEN + TAG_LEN
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_open_roundtrip() {
        for method in [CipherMethod::Aes256Gcm, CipherMethod::ChaCha20Poly1305] {
            let aead = Aead::new("test passphrase", method).unwrap();

            let plaintext = b"Hello, World!";
            let sealed = aead.seal(plaintext).unwrap();
            assert_eq!(sealed.len(), Aead::sealed_len(plaintext.len()));

            let opened = aead.open(&sealed).unwrap();
            assert_eq!(opened, plaintext);
        }
    }

    #[test]
    fn test_nonce_freshness() {
        let aead = Aead::new("test passphrase", CipherMethod::Aes256Gcm).unwrap();

        let sealed1 = aead.seal(b"same plaintext").unwrap();
        let sealed2 = aead.seal(b"same plaintext").unwrap();

        // Fresh nonce per call, so identical plaintexts never repeat on the wire
        assert_ne!(sealed1, sealed2);
    }

    #[test]
    fn test_tamper_detection() {
        let aead = Aead::new("test passphrase", CipherMethod::Aes256Gcm).unwrap();

        let mut sealed = aead.seal(b"secret data").unwrap();
        sealed[NONCE_LEN] ^= 0xFF;

        assert!(matches!(
            aead.open(&sealed),
            Err(CryptoError::AuthenticationFailed)
        ));
    }

    #[test]
    fn test_wrong_key_fails() {
        let a = Aead::new("passphrase one", CipherMethod::Aes256Gcm).unwrap();
        let b = Aead::new("passphrase two", CipherMethod::Aes256Gcm).unwrap();

        let sealed = a.seal(b"secret data").unwrap();
        assert!(b.open(&sealed).is_err());
    }

    #[test]
    fn test_truncated_message_fails() {
        let aead = Aead::new("test passphrase", CipherMethod::Aes256Gcm).unwrap();
        assert!(aead.open(&[0u8; NONCE_LEN + TAG_LEN - 1]).is_err());
        assert!(aead.open(b"").is_err());
    }

    #[test]
    fn test_empty_plaintext() {
        let aead = Aead::new("test passphrase", CipherMethod::ChaCha20Poly1305).unwrap();

        let sealed = aead.seal(b"").unwrap();
        assert_eq!(sealed.len(), Aead::overhead());
        assert_eq!(aead.open(&sealed).unwrap(), b"");
    }

    #[test]
    fn test_bad_key_length() {
        assert!(Aead::from_key(&[0u8; 16], CipherMethod::Aes256Gcm).is_err());
    }
}
