//! # Key Management
//!
//! secp256k1 key types for the end-to-end envelope.
//!
//! ## Key Types
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          KEY TYPES                                      │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  DerivedKeyPair (secp256k1)                                     │   │
//! │  │  ──────────────────────────                                     │   │
//! │  │                                                                  │   │
//! │  │  Purpose:                                                       │   │
//! │  │  • Unwrapping per-share keys sent in e2e mode                   │   │
//! │  │                                                                  │   │
//! │  │  Format:                                                        │   │
//! │  │  • Private key: 32 bytes (re-derived, never stored)             │   │
//! │  │  • Public key: 65 bytes uncompressed (0x04 ‖ x ‖ y)             │   │
//! │  │                                                                  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  EncryptionPublicKey                                            │   │
//! │  │  ───────────────────                                            │   │
//! │  │                                                                  │   │
//! │  │  • Always a validated, on-curve, uncompressed point             │   │
//! │  │  • Used for registered recipient keys and ephemeral keys        │   │
//! │  │  • Serialized as 0x-prefixed lowercase hex                      │   │
//! │  │                                                                  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use k256::{elliptic_curve::sec1::ToEncodedPoint, PublicKey, SecretKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// Uncompressed secp256k1 public key size (0x04 prefix + x + y)
pub const PUBLIC_KEY_SIZE: usize = 65;

/// Compressed secp256k1 public key size (0x02/0x03 prefix + x)
pub const COMPRESSED_PUBLIC_KEY_SIZE: usize = 33;

/// secp256k1 private key size
pub const PRIVATE_KEY_SIZE: usize = 32;

/// SEC1 tag byte for uncompressed points
const UNCOMPRESSED_TAG: u8 = 0x04;

/// A validated, uncompressed secp256k1 public key
///
/// Construction always checks that the bytes decode to a point on the curve,
/// so holding one of these means the key is safe to use in ECDH.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptionPublicKey {
    bytes: [u8; PUBLIC_KEY_SIZE],
    point: PublicKey,
}

impl EncryptionPublicKey {
    /// Parse and validate 65 uncompressed bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != PUBLIC_KEY_SIZE {
            return Err(Error::InvalidPublicKey(format!(
                "expected {} bytes, got {}",
                PUBLIC_KEY_SIZE,
                bytes.len()
            )));
        }
        if bytes[0] != UNCOMPRESSED_TAG {
            return Err(Error::InvalidPublicKey(
                "expected uncompressed point (0x04 prefix)".into(),
            ));
        }

        let point = PublicKey::from_sec1_bytes(bytes)
            .map_err(|_| Error::InvalidPublicKey("point is not on secp256k1".into()))?;

        let mut owned = [0u8; PUBLIC_KEY_SIZE];
        owned.copy_from_slice(bytes);
        Ok(Self { bytes: owned, point })
    }

    /// Parse `0x04…` hex (the `0x` prefix is optional)
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        let bytes = hex::decode(strip_hex_prefix(hex_str))?;
        Self::from_bytes(&bytes)
    }

    pub(crate) fn from_point(point: PublicKey) -> Self {
        let encoded = point.to_encoded_point(false);
        let mut bytes = [0u8; PUBLIC_KEY_SIZE];
        bytes.copy_from_slice(encoded.as_bytes());
        Self { bytes, point }
    }

    /// Raw uncompressed bytes
    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.bytes
    }

    /// `0x`-prefixed lowercase hex
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.bytes))
    }

    pub(crate) fn point(&self) -> &PublicKey {
        &self.point
    }
}

impl std::fmt::Debug for EncryptionPublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EncryptionPublicKey({})", self.to_hex())
    }
}

impl Serialize for EncryptionPublicKey {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for EncryptionPublicKey {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Check that bytes are an uncompressed secp256k1 point on the curve
///
/// Must be called (directly or through [`EncryptionPublicKey::from_bytes`])
/// at every public-key ingestion boundary to rule out invalid-curve attacks.
pub fn is_valid_public_key(bytes: &[u8]) -> bool {
    EncryptionPublicKey::from_bytes(bytes).is_ok()
}

/// Expand a compressed (33-byte) key to the uncompressed form
///
/// Uncompressed input is accepted and re-validated.
pub fn uncompress_public_key(bytes: &[u8]) -> Result<EncryptionPublicKey> {
    if bytes.len() != COMPRESSED_PUBLIC_KEY_SIZE && bytes.len() != PUBLIC_KEY_SIZE {
        return Err(Error::InvalidPublicKey(format!(
            "expected {} or {} bytes, got {}",
            COMPRESSED_PUBLIC_KEY_SIZE,
            PUBLIC_KEY_SIZE,
            bytes.len()
        )));
    }
    let point = PublicKey::from_sec1_bytes(bytes)
        .map_err(|_| Error::InvalidPublicKey("point is not on secp256k1".into()))?;
    Ok(EncryptionPublicKey::from_point(point))
}

/// A secp256k1 keypair derived from a wallet signature
///
/// ## Security
///
/// - The secret scalar is zeroized on drop (by `k256::SecretKey`)
/// - This is NOT the wallet's signing key; it is re-derived on demand from
///   a signature over a fixed message and must never be persisted
pub struct DerivedKeyPair {
    secret: SecretKey,
    public: EncryptionPublicKey,
}

impl DerivedKeyPair {
    /// Build from a 32-byte scalar
    ///
    /// Fails for zero or out-of-range scalars.
    pub fn from_secret_bytes(bytes: &[u8; PRIVATE_KEY_SIZE]) -> Result<Self> {
        let secret = SecretKey::from_slice(bytes)
            .map_err(|_| Error::KeyDerivationFailed("scalar is zero or out of range".into()))?;
        let public = EncryptionPublicKey::from_point(secret.public_key());
        Ok(Self { secret, public })
    }

    /// Get the secret key bytes
    ///
    /// ## Security Warning
    ///
    /// Never log, transmit or persist these bytes.
    pub fn secret_bytes(&self) -> [u8; PRIVATE_KEY_SIZE] {
        let mut out = [0u8; PRIVATE_KEY_SIZE];
        out.copy_from_slice(&self.secret.to_bytes());
        out
    }

    /// The public half, safe to register
    pub fn public_key(&self) -> &EncryptionPublicKey {
        &self.public
    }

    pub(crate) fn secret_key(&self) -> &SecretKey {
        &self.secret
    }
}

impl std::fmt::Debug for DerivedKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKeyPair")
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}

pub(crate) fn strip_hex_prefix(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn keypair(seed: u8) -> DerivedKeyPair {
        DerivedKeyPair::from_secret_bytes(&[seed; 32]).unwrap()
    }

    #[test]
    fn test_keypair_public_key_is_uncompressed() {
        let kp = keypair(7);
        let public = kp.public_key().as_bytes();
        assert_eq!(public.len(), PUBLIC_KEY_SIZE);
        assert_eq!(public[0], 0x04);
        assert!(is_valid_public_key(public));
    }

    #[test]
    fn test_keypair_secret_round_trip() {
        let kp = keypair(9);
        let again = DerivedKeyPair::from_secret_bytes(&kp.secret_bytes()).unwrap();
        assert_eq!(kp.public_key(), again.public_key());
    }

    #[test]
    fn test_zero_scalar_rejected() {
        assert!(DerivedKeyPair::from_secret_bytes(&[0u8; 32]).is_err());
    }

    #[test]
    fn test_out_of_range_scalar_rejected() {
        assert!(DerivedKeyPair::from_secret_bytes(&[0xFF; 32]).is_err());
    }

    #[test]
    fn test_off_curve_point_rejected() {
        let mut bytes = *keypair(3).public_key().as_bytes();
        bytes[64] ^= 0x01;
        assert!(!is_valid_public_key(&bytes));
        assert!(matches!(
            EncryptionPublicKey::from_bytes(&bytes),
            Err(Error::InvalidPublicKey(_))
        ));
    }

    #[test]
    fn test_wrong_length_and_prefix_rejected() {
        let bytes = *keypair(3).public_key().as_bytes();
        assert!(!is_valid_public_key(&bytes[..64]));

        let mut wrong_tag = bytes;
        wrong_tag[0] = 0x05;
        assert!(!is_valid_public_key(&wrong_tag));

        assert!(!is_valid_public_key(&[0u8; PUBLIC_KEY_SIZE]));
    }

    #[test]
    fn test_uncompress_public_key() {
        let kp = keypair(11);
        let compressed = kp.secret_key().public_key().to_encoded_point(true);
        assert_eq!(compressed.as_bytes().len(), COMPRESSED_PUBLIC_KEY_SIZE);

        let expanded = uncompress_public_key(compressed.as_bytes()).unwrap();
        assert_eq!(&expanded, kp.public_key());
    }

    #[test]
    fn test_public_key_hex_round_trip() {
        let kp = keypair(5);
        let hex = kp.public_key().to_hex();
        assert!(hex.starts_with("0x04"));
        assert_eq!(hex.len(), 2 + 130);

        let parsed = EncryptionPublicKey::from_hex(&hex).unwrap();
        assert_eq!(&parsed, kp.public_key());

        let without_prefix = EncryptionPublicKey::from_hex(&hex[2..]).unwrap();
        assert_eq!(&without_prefix, kp.public_key());
    }

    #[test]
    fn test_public_key_serde() {
        let kp = keypair(5);
        let json = serde_json::to_string(kp.public_key()).unwrap();
        let restored: EncryptionPublicKey = serde_json::from_str(&json).unwrap();
        assert_eq!(&restored, kp.public_key());

        let bad = serde_json::from_str::<EncryptionPublicKey>("\"0x04deadbeef\"");
        assert!(bad.is_err());
    }

    #[test]
    fn test_debug_hides_secret() {
        let kp = keypair(5);
        let printed = format!("{:?}", kp);
        assert!(printed.contains("public"));
        assert!(!printed.contains(&hex::encode(kp.secret_bytes())));
    }
}
