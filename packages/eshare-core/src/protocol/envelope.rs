//! # Encryption Envelope
//!
//! The key material attached to a share, and its persisted record form.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      ENVELOPE RECORD                                    │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  legacy                                                                │
//! │  ──────                                                                 │
//! │  encryptionMode      "legacy"                                          │
//! │  encryptedKey        base64(symmetric key)                             │
//! │  iv                  base64(file iv)                                   │
//! │  ephemeralPublicKey  null                                              │
//! │                                                                         │
//! │  e2e                                                                   │
//! │  ───                                                                    │
//! │  encryptionMode      "e2e"                                             │
//! │  encryptedKey        null                                              │
//! │  iv                  base64(file iv) ":" base64(ecies iv ‖ wrapped)    │
//! │  ephemeralPublicKey  0x04…                                             │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

use crate::crypto::{EncryptionPublicKey, Iv, SymmetricKey, IV_SIZE, KEY_SIZE, TAG_SIZE};
use crate::error::{Error, Result};

/// Size of an ECIES-wrapped symmetric key (key + GCM tag)
pub const WRAPPED_KEY_SIZE: usize = KEY_SIZE + TAG_SIZE;

/// Separator between the file IV and the ECIES segment in the `iv` field
const IV_SEPARATOR: char = ':';

/// How the per-share key is protected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncryptionMode {
    /// Symmetric key held by the server in plaintext
    Legacy,
    /// Symmetric key wrapped to the recipient's derived public key
    E2e,
}

impl fmt::Display for EncryptionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncryptionMode::Legacy => f.write_str("legacy"),
            EncryptionMode::E2e => f.write_str("e2e"),
        }
    }
}

impl std::str::FromStr for EncryptionMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "legacy" => Ok(EncryptionMode::Legacy),
            "e2e" => Ok(EncryptionMode::E2e),
            other => Err(Error::InvalidEncoding(format!(
                "unknown encryption mode: {}",
                other
            ))),
        }
    }
}

/// Key material for one share
///
/// Exactly one shape exists per mode, so a legacy share can never carry a
/// wrapped key and an e2e share can never carry a plaintext key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "EnvelopeRecord", into = "EnvelopeRecord")]
pub enum EncryptionEnvelope {
    /// Plaintext key and file IV
    Legacy {
        /// AES-256-GCM key for the blob
        symmetric_key: SymmetricKey,
        /// IV used for the blob
        iv: Iv,
    },
    /// ECIES-wrapped key
    E2e {
        /// Ephemeral public key from the wrap
        ephemeral_public_key: EncryptionPublicKey,
        /// IV of the ECIES AES-GCM layer
        ecies_iv: Iv,
        /// Wrapped symmetric key (ciphertext ‖ tag)
        wrapped_key: [u8; WRAPPED_KEY_SIZE],
        /// IV used for the blob
        file_iv: Iv,
    },
}

impl EncryptionEnvelope {
    /// The envelope's mode
    pub fn mode(&self) -> EncryptionMode {
        match self {
            EncryptionEnvelope::Legacy { .. } => EncryptionMode::Legacy,
            EncryptionEnvelope::E2e { .. } => EncryptionMode::E2e,
        }
    }

    /// IV the blob was encrypted with
    pub fn file_iv(&self) -> &Iv {
        match self {
            EncryptionEnvelope::Legacy { iv, .. } => iv,
            EncryptionEnvelope::E2e { file_iv, .. } => file_iv,
        }
    }
}

/// Persisted form of an [`EncryptionEnvelope`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopeRecord {
    /// `"legacy"` or `"e2e"`
    pub encryption_mode: EncryptionMode,
    /// base64 symmetric key (legacy only)
    pub encrypted_key: Option<String>,
    /// File IV, plus the ECIES segment in e2e mode
    pub iv: String,
    /// Hex ephemeral public key (e2e only)
    pub ephemeral_public_key: Option<String>,
}

impl From<&EncryptionEnvelope> for EnvelopeRecord {
    fn from(envelope: &EncryptionEnvelope) -> Self {
        match envelope {
            EncryptionEnvelope::Legacy { symmetric_key, iv } => EnvelopeRecord {
                encryption_mode: EncryptionMode::Legacy,
                encrypted_key: Some(STANDARD.encode(symmetric_key.as_bytes())),
                iv: STANDARD.encode(iv.as_bytes()),
                ephemeral_public_key: None,
            },
            EncryptionEnvelope::E2e {
                ephemeral_public_key,
                ecies_iv,
                wrapped_key,
                file_iv,
            } => {
                let mut ecies_segment = Vec::with_capacity(IV_SIZE + WRAPPED_KEY_SIZE);
                ecies_segment.extend_from_slice(ecies_iv.as_bytes());
                ecies_segment.extend_from_slice(wrapped_key);

                EnvelopeRecord {
                    encryption_mode: EncryptionMode::E2e,
                    encrypted_key: None,
                    iv: format!(
                        "{}{}{}",
                        STANDARD.encode(file_iv.as_bytes()),
                        IV_SEPARATOR,
                        STANDARD.encode(&ecies_segment)
                    ),
                    ephemeral_public_key: Some(ephemeral_public_key.to_hex()),
                }
            }
        }
    }
}

impl From<EncryptionEnvelope> for EnvelopeRecord {
    fn from(envelope: EncryptionEnvelope) -> Self {
        EnvelopeRecord::from(&envelope)
    }
}

impl TryFrom<EnvelopeRecord> for EncryptionEnvelope {
    type Error = Error;

    fn try_from(record: EnvelopeRecord) -> Result<Self> {
        match record.encryption_mode {
            EncryptionMode::Legacy => {
                if record.ephemeral_public_key.is_some() {
                    return Err(Error::InvalidEncoding(
                        "legacy envelope carries an ephemeral public key".into(),
                    ));
                }
                let key = record.encrypted_key.as_deref().ok_or_else(|| {
                    Error::InvalidEncoding("legacy envelope is missing encryptedKey".into())
                })?;

                Ok(EncryptionEnvelope::Legacy {
                    symmetric_key: SymmetricKey::from_slice(&STANDARD.decode(key)?)?,
                    iv: Iv::from_slice(&STANDARD.decode(&record.iv)?)?,
                })
            }
            EncryptionMode::E2e => {
                if record.encrypted_key.is_some() {
                    return Err(Error::InvalidEncoding(
                        "e2e envelope carries a plaintext key".into(),
                    ));
                }
                let ephemeral = record.ephemeral_public_key.as_deref().ok_or_else(|| {
                    Error::InvalidEncoding("e2e envelope is missing ephemeralPublicKey".into())
                })?;
                let (file_iv, ecies_segment) =
                    record.iv.split_once(IV_SEPARATOR).ok_or_else(|| {
                        Error::InvalidEncoding("e2e iv field has no ecies segment".into())
                    })?;

                let ecies_segment = STANDARD.decode(ecies_segment)?;
                if ecies_segment.len() != IV_SIZE + WRAPPED_KEY_SIZE {
                    return Err(Error::InvalidEncoding(format!(
                        "ecies segment must be {} bytes, got {}",
                        IV_SIZE + WRAPPED_KEY_SIZE,
                        ecies_segment.len()
                    )));
                }
                let (ecies_iv, wrapped) = ecies_segment.split_at(IV_SIZE);
                let mut wrapped_key = [0u8; WRAPPED_KEY_SIZE];
                wrapped_key.copy_from_slice(wrapped);

                Ok(EncryptionEnvelope::E2e {
                    ephemeral_public_key: EncryptionPublicKey::from_hex(ephemeral)?,
                    ecies_iv: Iv::from_slice(ecies_iv)?,
                    wrapped_key,
                    file_iv: Iv::from_slice(&STANDARD.decode(file_iv)?)?,
                })
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::DerivedKeyPair;

    fn legacy() -> EncryptionEnvelope {
        EncryptionEnvelope::Legacy {
            symmetric_key: SymmetricKey::from_bytes([7u8; KEY_SIZE]),
            iv: Iv::from_bytes([1u8; IV_SIZE]),
        }
    }

    fn e2e() -> EncryptionEnvelope {
        let kp = DerivedKeyPair::from_secret_bytes(&[5u8; 32]).unwrap();
        EncryptionEnvelope::E2e {
            ephemeral_public_key: kp.public_key().clone(),
            ecies_iv: Iv::from_bytes([2u8; IV_SIZE]),
            wrapped_key: [9u8; WRAPPED_KEY_SIZE],
            file_iv: Iv::from_bytes([3u8; IV_SIZE]),
        }
    }

    #[test]
    fn test_legacy_record_fields() {
        let record = EnvelopeRecord::from(&legacy());
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["encryptionMode"], "legacy");
        assert_eq!(json["encryptedKey"], STANDARD.encode([7u8; KEY_SIZE]));
        assert_eq!(json["iv"], STANDARD.encode([1u8; IV_SIZE]));
        assert!(json["ephemeralPublicKey"].is_null());
    }

    #[test]
    fn test_e2e_record_fields() {
        let record = EnvelopeRecord::from(&e2e());

        assert_eq!(record.encryption_mode, EncryptionMode::E2e);
        assert!(record.encrypted_key.is_none());
        assert!(record.ephemeral_public_key.as_deref().unwrap().starts_with("0x04"));

        let (file_iv, segment) = record.iv.split_once(':').unwrap();
        assert_eq!(STANDARD.decode(file_iv).unwrap(), vec![3u8; IV_SIZE]);
        let segment = STANDARD.decode(segment).unwrap();
        assert_eq!(segment.len(), IV_SIZE + WRAPPED_KEY_SIZE);
        assert_eq!(&segment[..IV_SIZE], &[2u8; IV_SIZE]);
    }

    #[test]
    fn test_envelope_serde_both_modes() {
        for envelope in [legacy(), e2e()] {
            let json = serde_json::to_string(&envelope).unwrap();
            let restored: EncryptionEnvelope = serde_json::from_str(&json).unwrap();
            assert_eq!(EnvelopeRecord::from(&restored), EnvelopeRecord::from(&envelope));
        }
    }

    #[test]
    fn test_mode_and_material_must_agree() {
        let mut record = EnvelopeRecord::from(&legacy());
        record.encryption_mode = EncryptionMode::E2e;
        assert!(EncryptionEnvelope::try_from(record).is_err());

        let mut record = EnvelopeRecord::from(&e2e());
        record.encryption_mode = EncryptionMode::Legacy;
        assert!(EncryptionEnvelope::try_from(record).is_err());
    }

    #[test]
    fn test_short_wrapped_key_rejected() {
        let mut record = EnvelopeRecord::from(&e2e());
        let file_iv = record.iv.split_once(':').unwrap().0.to_string();
        record.iv = format!("{}:{}", file_iv, STANDARD.encode([0u8; 20]));

        assert!(matches!(
            EncryptionEnvelope::try_from(record),
            Err(Error::InvalidEncoding(_))
        ));
    }

    #[test]
    fn test_invalid_ephemeral_key_rejected() {
        let mut record = EnvelopeRecord::from(&e2e());
        record.ephemeral_public_key = Some(format!("0x04{}", "00".repeat(64)));

        assert!(matches!(
            EncryptionEnvelope::try_from(record),
            Err(Error::InvalidPublicKey(_))
        ));
    }

    #[test]
    fn test_mode_display() {
        assert_eq!(EncryptionMode::Legacy.to_string(), "legacy");
        assert_eq!(EncryptionMode::E2e.to_string(), "e2e");
        assert_eq!(serde_json::to_string(&EncryptionMode::E2e).unwrap(), "\"e2e\"");
        assert_eq!("e2e".parse::<EncryptionMode>().unwrap(), EncryptionMode::E2e);
        assert_eq!("legacy".parse::<EncryptionMode>().unwrap(), EncryptionMode::Legacy);
        assert!("E2E".parse::<EncryptionMode>().is_err());
    }
}
