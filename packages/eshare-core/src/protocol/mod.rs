//! # Share Protocol
//!
//! Sealing files into an encrypted blob plus envelope, and opening them again.
//!
//! ## Seal / Open
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          SEAL                                           │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  files ──► pack ──► AES-256-GCM(fresh key, fresh iv) ──► ciphertext    │
//! │                                   │                                     │
//! │                    ┌──────────────┴──────────────┐                      │
//! │                    ▼                             ▼                      │
//! │        recipient key registered?        no registered key              │
//! │        ECIES-wrap key → E2e envelope    key as-is → Legacy envelope    │
//! │                                                                         │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                          OPEN                                           │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Legacy: key from envelope                                             │
//! │  E2e:    key = ECIES-unwrap(derived keypair, envelope)                 │
//! │                                                                         │
//! │  ciphertext ──► AES-256-GCM decrypt ──► unpack(manifest) ──► files     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Mode is fixed when the share is sealed. A recipient who registers later
//! still opens older shares in legacy mode.

mod claim;
mod envelope;

pub use claim::{authenticate_claim, claim_message, verify_claim_signature, ClaimRequest};
pub use envelope::{EncryptionEnvelope, EncryptionMode, EnvelopeRecord, WRAPPED_KEY_SIZE};

use zeroize::Zeroizing;

use crate::crypto::{
    decrypt, ecies_decrypt, ecies_encrypt, encrypt, DerivedKeyPair, EncryptionPublicKey, Iv,
    SymmetricKey,
};
use crate::error::{Error, Result};
use crate::files::{pack, unpack, FileManifest, SharedFile};

/// Output of [`seal_files`]
#[derive(Debug, Clone)]
pub struct SealedShare {
    /// Encrypted packed buffer (ciphertext ‖ tag)
    pub ciphertext: Vec<u8>,
    /// Layout of the packed plaintext
    pub manifest: FileManifest,
    /// Key material for the recipient
    pub envelope: EncryptionEnvelope,
}

/// Pick the mode for a recipient
///
/// `registered` is the recipient's registered key, already validated at
/// ingestion. Its presence alone decides the mode.
pub fn select_mode(registered: Option<&EncryptionPublicKey>) -> EncryptionMode {
    match registered {
        Some(_) => EncryptionMode::E2e,
        None => EncryptionMode::Legacy,
    }
}

/// Pack and encrypt files for a recipient
///
/// With `recipient_key` the per-share key is wrapped to it (e2e); without,
/// the key is placed in the envelope as-is (legacy).
pub fn seal_files(
    files: &[SharedFile],
    recipient_key: Option<&EncryptionPublicKey>,
) -> Result<SealedShare> {
    if files.is_empty() {
        return Err(Error::EmptyShare);
    }

    let (packed, manifest) = pack(files);
    let packed = Zeroizing::new(packed);

    let key = SymmetricKey::generate();
    let file_iv = Iv::random();
    let ciphertext = encrypt(&packed, &key, &file_iv)?;

    let envelope = match recipient_key {
        Some(recipient) => {
            let wrapped = ecies_encrypt(recipient, key.as_bytes())?;
            let wrapped_key = wrapped.ciphertext.as_slice().try_into().map_err(|_| {
                Error::Internal(format!(
                    "wrapped key is {} bytes, expected {}",
                    wrapped.ciphertext.len(),
                    WRAPPED_KEY_SIZE
                ))
            })?;
            EncryptionEnvelope::E2e {
                ephemeral_public_key: wrapped.ephemeral_public_key,
                ecies_iv: wrapped.iv,
                wrapped_key,
                file_iv,
            }
        }
        None => EncryptionEnvelope::Legacy {
            symmetric_key: key,
            iv: file_iv,
        },
    };

    tracing::debug!(
        files = manifest.len(),
        bytes = ciphertext.len(),
        mode = %envelope.mode(),
        "Sealed share"
    );

    Ok(SealedShare {
        ciphertext,
        manifest,
        envelope,
    })
}

/// Recover the per-share symmetric key from an envelope
pub fn unwrap_key(
    envelope: &EncryptionEnvelope,
    derived: Option<&DerivedKeyPair>,
) -> Result<SymmetricKey> {
    match envelope {
        EncryptionEnvelope::Legacy { symmetric_key, .. } => Ok(symmetric_key.clone()),
        EncryptionEnvelope::E2e {
            ephemeral_public_key,
            ecies_iv,
            wrapped_key,
            ..
        } => {
            let keypair = derived.ok_or(Error::DerivedKeyRequired)?;
            let raw = Zeroizing::new(ecies_decrypt(
                keypair,
                ephemeral_public_key,
                ecies_iv,
                wrapped_key,
            )?);
            SymmetricKey::from_slice(&raw)
        }
    }
}

/// Decrypt and unpack a sealed share
///
/// `derived` is required for e2e envelopes and ignored for legacy ones.
/// Nothing is returned unless every authentication tag verifies and the
/// manifest matches the plaintext.
pub fn open_files(
    ciphertext: &[u8],
    manifest: &FileManifest,
    envelope: &EncryptionEnvelope,
    derived: Option<&DerivedKeyPair>,
) -> Result<Vec<SharedFile>> {
    let key = unwrap_key(envelope, derived)?;
    let plaintext = Zeroizing::new(decrypt(ciphertext, &key, envelope.file_iv())?);
    unpack(&plaintext, manifest)
}

// ============================================================================
// TESTS
// ============================================================================
