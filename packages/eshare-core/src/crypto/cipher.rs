//! # Symmetric Cipher
//!
//! AES-256-GCM over opaque byte buffers. Used for the packed file blob and,
//! inside [`super::ecies`], for the wrapped per-share key.
//!
//! ## Blob Encryption
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        BLOB ENCRYPTION                                  │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  SymmetricKey::generate()  ──► 32 random bytes (OsRng)                  │
//! │  Iv::random()              ──► 12 random bytes (OsRng)                  │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────┐       │
//! │  │  AES-256-GCM-Encrypt(                                        │       │
//! │  │    key       = symmetric key,                                │       │
//! │  │    nonce     = iv,                                           │       │
//! │  │    plaintext = packed files                                  │       │
//! │  │  )                                                           │       │
//! │  │           ↓                                                  │       │
//! │  │  ciphertext ‖ tag (16 bytes)                                 │       │
//! │  └─────────────────────────────────────────────────────────────┘       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The tag is appended to the ciphertext, matching the Web Crypto layout, so
//! `ciphertext.len() == plaintext.len() + TAG_SIZE`.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce as AesNonce,
};
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Error, Result};

/// Size of the AES-GCM IV in bytes (96 bits)
pub const IV_SIZE: usize = 12;

/// Size of the AES-GCM authentication tag in bytes (128 bits)
pub const TAG_SIZE: usize = 16;

/// Size of the symmetric key in bytes (256 bits)
pub const KEY_SIZE: usize = 32;

/// An initialization vector for AES-GCM
///
/// ## Critical Security Requirement
///
/// **NEVER reuse an IV with the same key!**
///
/// IV reuse breaks both confidentiality and integrity of GCM. Every call to
/// [`encrypt`] in this crate is paired with a freshly drawn [`Iv::random`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Iv(pub [u8; IV_SIZE]);

impl Iv {
    /// Generate a cryptographically random IV
    pub fn random() -> Self {
        let mut bytes = [0u8; IV_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from existing bytes
    pub fn from_bytes(bytes: [u8; IV_SIZE]) -> Self {
        Self(bytes)
    }

    /// Create from a slice, checking the length
    pub fn from_slice(slice: &[u8]) -> Result<Self> {
        let bytes: [u8; IV_SIZE] = slice.try_into().map_err(|_| {
            Error::InvalidKey(format!("IV must be {} bytes, got {}", IV_SIZE, slice.len()))
        })?;
        Ok(Self(bytes))
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; IV_SIZE] {
        &self.0
    }
}

/// An AES-256-GCM key
///
/// Zeroized when dropped. `Debug` never prints the key bytes.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; KEY_SIZE]);

impl SymmetricKey {
    /// Generate a fresh random key
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Create from a slice, checking the length
    pub fn from_slice(slice: &[u8]) -> Result<Self> {
        let bytes: [u8; KEY_SIZE] = slice.try_into().map_err(|_| {
            Error::InvalidKey(format!("Key must be {} bytes, got {}", KEY_SIZE, slice.len()))
        })?;
        Ok(Self(bytes))
    }

    /// Get the raw key bytes
    ///
    /// ## Security Warning
    ///
    /// Only expose this to the legacy envelope encoder or to ECIES wrapping.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SymmetricKey([REDACTED])")
    }
}

/// Generate a random 256-bit key
pub fn generate_key() -> SymmetricKey {
    SymmetricKey::generate()
}

/// Generate a random 96-bit IV
pub fn generate_iv() -> Iv {
    Iv::random()
}

/// Encrypt a buffer using AES-256-GCM
///
/// ## Returns
///
/// Ciphertext with the 16-byte authentication tag appended.
///
/// ## Example
///
/// ```ignore
/// let key = generate_key();
/// let iv = generate_iv();
/// let ciphertext = encrypt(b"packed files", &key, &iv)?;
/// ```
pub fn encrypt(plaintext: &[u8], key: &SymmetricKey, iv: &Iv) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(&key.0)
        .map_err(|e| Error::InvalidKey(format!("Invalid key: {}", e)))?;

    cipher
        .encrypt(AesNonce::from_slice(&iv.0), plaintext)
        .map_err(|e| Error::EncryptionFailed(format!("Encryption failed: {}", e)))
}

/// Decrypt a buffer using AES-256-GCM
///
/// ## Errors
///
/// Returns `AuthenticationFailure` if:
/// - The ciphertext was tampered with
/// - The key is wrong
/// - The IV is wrong
///
/// No plaintext is returned in any of these cases.
pub fn decrypt(ciphertext: &[u8], key: &SymmetricKey, iv: &Iv) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(&key.0)
        .map_err(|e| Error::InvalidKey(format!("Invalid key: {}", e)))?;

    cipher
        .decrypt(AesNonce::from_slice(&iv.0), ciphertext)
        .map_err(|_| Error::AuthenticationFailure)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt_basic() {
        let key = SymmetricKey::from_bytes([42u8; 32]);
        let iv = Iv::random();
        let plaintext = b"Hello, World!";

        let ciphertext = encrypt(plaintext, &key, &iv).unwrap();
        let decrypted = decrypt(&ciphertext, &key, &iv).unwrap();

        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_encrypt_decrypt_empty() {
        let key = generate_key();
        let iv = generate_iv();

        let ciphertext = encrypt(b"", &key, &iv).unwrap();
        assert_eq!(ciphertext.len(), TAG_SIZE);

        let decrypted = decrypt(&ciphertext, &key, &iv).unwrap();
        assert!(decrypted.is_empty());
    }

    #[test]
    fn test_ciphertext_carries_tag() {
        let key = generate_key();
        let iv = generate_iv();
        let plaintext = vec![7u8; 510];

        let ciphertext = encrypt(&plaintext, &key, &iv).unwrap();
        assert_eq!(ciphertext.len(), plaintext.len() + TAG_SIZE);
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let key = generate_key();
        let iv = generate_iv();

        let mut ciphertext = encrypt(b"Hello, World!", &key, &iv).unwrap();
        ciphertext[0] ^= 0xFF;

        let result = decrypt(&ciphertext, &key, &iv);
        assert!(matches!(result, Err(Error::AuthenticationFailure)));
    }

    #[test]
    fn test_tampered_tag_fails() {
        let key = generate_key();
        let iv = generate_iv();

        let mut ciphertext = encrypt(b"Hello, World!", &key, &iv).unwrap();
        let last = ciphertext.len() - 1;
        ciphertext[last] ^= 0x01;

        assert!(matches!(
            decrypt(&ciphertext, &key, &iv),
            Err(Error::AuthenticationFailure)
        ));
    }

    #[test]
    fn test_wrong_key_fails() {
        let key1 = SymmetricKey::from_bytes([42u8; 32]);
        let key2 = SymmetricKey::from_bytes([99u8; 32]);
        let iv = generate_iv();

        let ciphertext = encrypt(b"secret", &key1, &iv).unwrap();
        assert!(matches!(
            decrypt(&ciphertext, &key2, &iv),
            Err(Error::AuthenticationFailure)
        ));
    }

    #[test]
    fn test_wrong_iv_fails() {
        let key = generate_key();
        let iv = Iv::from_bytes([1u8; IV_SIZE]);
        let other = Iv::from_bytes([2u8; IV_SIZE]);

        let ciphertext = encrypt(b"secret", &key, &iv).unwrap();
        assert!(matches!(
            decrypt(&ciphertext, &key, &other),
            Err(Error::AuthenticationFailure)
        ));
    }

    #[test]
    fn test_truncated_ciphertext_fails() {
        let key = generate_key();
        let iv = generate_iv();

        let ciphertext = encrypt(b"secret", &key, &iv).unwrap();
        assert!(decrypt(&ciphertext[..TAG_SIZE - 1], &key, &iv).is_err());
    }

    #[test]
    fn test_fresh_ivs_and_keys_differ() {
        assert_ne!(generate_iv(), generate_iv());
        assert_ne!(generate_key().as_bytes(), generate_key().as_bytes());
    }

    #[test]
    fn test_slice_length_checks() {
        assert!(Iv::from_slice(&[0u8; 11]).is_err());
        assert!(Iv::from_slice(&[0u8; 12]).is_ok());
        assert!(SymmetricKey::from_slice(&[0u8; 16]).is_err());
        assert!(SymmetricKey::from_slice(&[0u8; 32]).is_ok());
    }

    #[test]
    fn test_debug_redacts_key() {
        let key = SymmetricKey::from_bytes([0xAB; 32]);
        let printed = format!("{:?}", key);
        assert!(!printed.contains("171"));
        assert!(printed.contains("REDACTED"));
    }
}
