//! # ECIES Key Wrapping
//!
//! Wraps a per-share symmetric key to a recipient's derived public key.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         ECIES WRAP                                      │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Step 1: Ephemeral keypair (fresh per call, secret dropped after use)  │
//! │                                                                         │
//! │  Step 2: ECDH                                                          │
//! │  ┌─────────────────────────────────────────────────────────────┐       │
//! │  │  ephemeral_secret × recipient_public → shared x (32 bytes)   │       │
//! │  └─────────────────────────────────────────────────────────────┘       │
//! │                                                                         │
//! │  Step 3: HKDF-SHA256                                                   │
//! │  ┌─────────────────────────────────────────────────────────────┐       │
//! │  │  ikm  = shared x                                             │       │
//! │  │  salt = "eshare-ecies-v1-salt"                               │       │
//! │  │  info = "eshare-ecies-v1-info"                               │       │
//! │  │           ↓                                                  │       │
//! │  │  32-byte AES-256-GCM key                                     │       │
//! │  └─────────────────────────────────────────────────────────────┘       │
//! │                                                                         │
//! │  Step 4: AES-256-GCM with a random IV                                  │
//! │                                                                         │
//! │  Output: (ephemeral_public_key, iv, ciphertext‖tag)                    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Unwrapping runs the same ECDH from the recipient side:
//! `recipient_secret × ephemeral_public` yields the same shared x.

use hkdf::Hkdf;
use k256::ecdh::{diffie_hellman, EphemeralSecret, SharedSecret};
use rand::rngs::OsRng;
use sha2::Sha256;

use super::cipher::{self, Iv, SymmetricKey, KEY_SIZE};
use super::keys::{DerivedKeyPair, EncryptionPublicKey};
use crate::error::{Error, Result};

/// HKDF salt for ECIES key conditioning
pub const ECIES_SALT: &[u8] = b"eshare-ecies-v1-salt";

/// HKDF info for ECIES key conditioning
pub const ECIES_INFO: &[u8] = b"eshare-ecies-v1-info";

/// Output of [`ecies_encrypt`]
#[derive(Clone, Debug)]
pub struct EciesPayload {
    /// Public half of the single-use ephemeral keypair
    pub ephemeral_public_key: EncryptionPublicKey,
    /// IV used for the AES-GCM layer
    pub iv: Iv,
    /// Ciphertext with the 16-byte tag appended
    pub ciphertext: Vec<u8>,
}

fn condition_shared_secret(shared: &SharedSecret) -> Result<SymmetricKey> {
    let hkdf = Hkdf::<Sha256>::new(Some(ECIES_SALT), shared.raw_secret_bytes());
    let mut key = [0u8; KEY_SIZE];
    hkdf.expand(ECIES_INFO, &mut key)
        .map_err(|_| Error::KeyDerivationFailed("HKDF expansion failed".into()))?;
    Ok(SymmetricKey::from_bytes(key))
}

/// Encrypt `plaintext` to a recipient's public key
///
/// The recipient key is an [`EncryptionPublicKey`], which is validated on
/// construction; raw bytes from the wire must go through
/// [`EncryptionPublicKey::from_bytes`] first and fail with `InvalidPublicKey`.
pub fn ecies_encrypt(recipient: &EncryptionPublicKey, plaintext: &[u8]) -> Result<EciesPayload> {
    let ephemeral = EphemeralSecret::random(&mut OsRng);
    let ephemeral_public_key = EncryptionPublicKey::from_point(ephemeral.public_key());

    let shared = ephemeral.diffie_hellman(recipient.point());
    drop(ephemeral);

    let key = condition_shared_secret(&shared)?;
    let iv = Iv::random();
    let ciphertext = cipher::encrypt(plaintext, &key, &iv)?;

    Ok(EciesPayload {
        ephemeral_public_key,
        iv,
        ciphertext,
    })
}

/// Decrypt an ECIES payload with the recipient's derived keypair
///
/// ## Errors
///
/// `AuthenticationFailure` when the keypair is not the one the payload was
/// wrapped to, or any part of the payload was modified.
pub fn ecies_decrypt(
    recipient: &DerivedKeyPair,
    ephemeral_public_key: &EncryptionPublicKey,
    iv: &Iv,
    ciphertext: &[u8],
) -> Result<Vec<u8>> {
    let shared = diffie_hellman(
        recipient.secret_key().to_nonzero_scalar(),
        ephemeral_public_key.point().as_affine(),
    );

    let key = condition_shared_secret(&shared)?;
    cipher::decrypt(ciphertext, &key, iv)
}

// ============================================================================
// TESTS
// ============================================================================
