//! # Wallet Signatures
//!
//! Ethereum-style addresses and `personal_sign` (EIP-191) signatures over
//! secp256k1, with signer recovery.
//!
//! ## Recovery Flow
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        SIGNER RECOVERY                                  │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  message ──► "\x19Ethereum Signed Message:\n" ‖ len ‖ message           │
//! │                          │                                              │
//! │                          ▼                                              │
//! │                    Keccak-256 ──► prehash (32 bytes)                    │
//! │                                                                         │
//! │  signature (65 bytes) = r (32) ‖ s (32) ‖ v (1)                         │
//! │                          │                                              │
//! │                          ▼                                              │
//! │  ECDSA recover(prehash, r‖s, v) ──► signer public key                   │
//! │                          │                                              │
//! │                          ▼                                              │
//! │  Keccak-256(x ‖ y)[12..32] ──► 20-byte address                          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The wallet itself is an external collaborator. [`WalletSigner`] exists so
//! tests and the command-line dev wallet can produce real signatures.

use std::fmt;
use std::str::FromStr;

use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest, Keccak256};

use crate::crypto::keys::strip_hex_prefix;
use crate::error::{Error, Result};

/// Size of a recoverable wallet signature (r ‖ s ‖ v)
pub const SIGNATURE_SIZE: usize = 65;

/// Size of an address in bytes
pub const ADDRESS_SIZE: usize = 20;

/// EIP-191 personal message prefix
const PERSONAL_MESSAGE_PREFIX: &str = "\x19Ethereum Signed Message:\n";

/// Keccak-256 digest
pub(crate) fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Keccak256::digest(data));
    out
}

/// Hash a message the way `personal_sign` does
pub fn eip191_hash(message: &str) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(PERSONAL_MESSAGE_PREFIX.as_bytes());
    hasher.update(message.len().to_string().as_bytes());
    hasher.update(message.as_bytes());
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

// ============================================================================
// ADDRESS
// ============================================================================

/// A 20-byte wallet address
///
/// Displayed and serialized as `0x` + 40 lowercase hex characters, which is
/// the canonical form. Comparisons are on bytes, so they are case-insensitive
/// with respect to the textual input.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; ADDRESS_SIZE]);

impl Address {
    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; ADDRESS_SIZE]) -> Self {
        Self(bytes)
    }

    /// Derive the address controlled by a signing public key
    pub fn from_verifying_key(key: &VerifyingKey) -> Self {
        let point = key.to_encoded_point(false);
        let hash = keccak256(&point.as_bytes()[1..]);
        let mut bytes = [0u8; ADDRESS_SIZE];
        bytes.copy_from_slice(&hash[12..]);
        Self(bytes)
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8; ADDRESS_SIZE] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl FromStr for Address {
    type Err = Error;

    /// Accepts exactly `^0x[0-9a-fA-F]{40}$`
    fn from_str(s: &str) -> Result<Self> {
        let hex_part = s
            .strip_prefix("0x")
            .ok_or_else(|| Error::InvalidAddress(s.to_string()))?;
        if hex_part.len() != ADDRESS_SIZE * 2 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::InvalidAddress(s.to_string()));
        }

        let mut bytes = [0u8; ADDRESS_SIZE];
        hex::decode_to_slice(hex_part, &mut bytes)
            .map_err(|_| Error::InvalidAddress(s.to_string()))?;
        Ok(Self(bytes))
    }
}

impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// SIGNATURE
// ============================================================================

/// A recoverable secp256k1 signature as produced by wallets (`r ‖ s ‖ v`)
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct WalletSignature([u8; SIGNATURE_SIZE]);

impl WalletSignature {
    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; SIGNATURE_SIZE]) -> Self {
        Self(bytes)
    }

    /// Create from a slice, checking the length
    pub fn from_slice(slice: &[u8]) -> Result<Self> {
        let bytes: [u8; SIGNATURE_SIZE] = slice.try_into().map_err(|_| {
            Error::InvalidSignature(format!(
                "expected {} bytes, got {}",
                SIGNATURE_SIZE,
                slice.len()
            ))
        })?;
        Ok(Self(bytes))
    }

    /// Parse `0x`-prefixed (or bare) hex
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        let bytes = hex::decode(strip_hex_prefix(hex_str))
            .map_err(|e| Error::InvalidSignature(format!("hex: {}", e)))?;
        Self::from_slice(&bytes)
    }

    /// `0x`-prefixed lowercase hex
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8; SIGNATURE_SIZE] {
        &self.0
    }

    /// Split into an ECDSA signature and recovery id
    ///
    /// Accepts `v` in `{0, 1, 27, 28}`. High-`s` signatures are normalized
    /// and the recovery parity flipped accordingly.
    fn to_recoverable(self) -> Result<(Signature, RecoveryId)> {
        let signature = Signature::from_slice(&self.0[..64])
            .map_err(|_| Error::InvalidSignature("r or s out of range".into()))?;

        let v = match self.0[64] {
            v @ (0 | 1) => v,
            v @ (27 | 28) => v - 27,
            other => {
                return Err(Error::InvalidSignature(format!(
                    "unsupported recovery byte {}",
                    other
                )))
            }
        };
        let recovery_id = RecoveryId::from_byte(v)
            .ok_or_else(|| Error::InvalidSignature("bad recovery id".into()))?;

        match signature.normalize_s() {
            Some(normalized) => Ok((
                normalized,
                RecoveryId::new(!recovery_id.is_y_odd(), recovery_id.is_x_reduced()),
            )),
            None => Ok((signature, recovery_id)),
        }
    }
}

impl fmt::Debug for WalletSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WalletSignature({})", self.to_hex())
    }
}

impl Serialize for WalletSignature {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for WalletSignature {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Recover the address that signed `message`
///
/// ## Errors
///
/// Returns `InvalidSignature` if the bytes are malformed or no public key
/// can be recovered. A well-formed signature over a *different* message
/// recovers to some unrelated address rather than failing; callers must
/// compare the result against the address they expect.
pub fn recover_address(message: &str, signature: &WalletSignature) -> Result<Address> {
    let (signature, recovery_id) = signature.to_recoverable()?;
    let prehash = eip191_hash(message);

    let key = VerifyingKey::recover_from_prehash(&prehash, &signature, recovery_id)
        .map_err(|_| Error::InvalidSignature("signer could not be recovered".into()))?;

    Ok(Address::from_verifying_key(&key))
}

// ============================================================================
// SIGNER
// ============================================================================

/// A local secp256k1 wallet that signs `personal_sign` messages
///
/// Signing is deterministic (RFC 6979), so signing the same message twice
/// yields the same signature. Key derivation relies on this.
pub struct WalletSigner {
    key: SigningKey,
}

impl WalletSigner {
    /// Generate a new random wallet
    pub fn generate() -> Self {
        Self {
            key: SigningKey::random(&mut OsRng),
        }
    }

    /// Load from a 32-byte hex private key (`0x` optional)
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        let bytes = hex::decode(strip_hex_prefix(hex_str))?;
        let key = SigningKey::from_slice(&bytes)
            .map_err(|_| Error::InvalidKey("wallet key is not a valid secp256k1 scalar".into()))?;
        Ok(Self { key })
    }

    /// Private key as `0x` hex
    ///
    /// ## Security Warning
    ///
    /// Only for exporting a development wallet.
    pub fn secret_hex(&self) -> String {
        format!("0x{}", hex::encode(self.key.to_bytes()))
    }

    /// The wallet's address
    pub fn address(&self) -> Address {
        Address::from_verifying_key(self.key.verifying_key())
    }

    /// Sign a message with the EIP-191 prefix, `v` encoded as 27/28
    pub fn sign_message(&self, message: &str) -> Result<WalletSignature> {
        let prehash = eip191_hash(message);
        let (signature, recovery_id) = self
            .key
            .sign_prehash_recoverable(&prehash)
            .map_err(|e| Error::Internal(format!("signing failed: {}", e)))?;

        let mut bytes = [0u8; SIGNATURE_SIZE];
        bytes[..64].copy_from_slice(&signature.to_bytes());
        bytes[64] = recovery_id.to_byte() + 27;
        Ok(WalletSignature(bytes))
    }
}

impl fmt::Debug for WalletSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletSigner")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_recover() {
        let wallet = WalletSigner::generate();
        let signature = wallet.sign_message("hello").unwrap();

        let recovered = recover_address("hello", &signature).unwrap();
        assert_eq!(recovered, wallet.address());
    }

    #[test]
    fn test_recover_wrong_message_gives_other_address() {
        let wallet = WalletSigner::generate();
        let signature = wallet.sign_message("hello").unwrap();

        let recovered = recover_address("goodbye", &signature).unwrap();
        assert_ne!(recovered, wallet.address());
    }

    #[test]
    fn test_deterministic_signatures() {
        let wallet = WalletSigner::generate();
        let sig1 = wallet.sign_message("same message").unwrap();
        let sig2 = wallet.sign_message("same message").unwrap();
        assert_eq!(sig1, sig2);
    }

    #[test]
    fn test_recovery_byte_zero_one_accepted() {
        let wallet = WalletSigner::generate();
        let signature = wallet.sign_message("hello").unwrap();

        let mut bytes = *signature.as_bytes();
        bytes[64] -= 27;
        let raw = WalletSignature::from_bytes(bytes);
        assert_eq!(recover_address("hello", &raw).unwrap(), wallet.address());
    }

    #[test]
    fn test_bad_recovery_byte_rejected() {
        let wallet = WalletSigner::generate();
        let mut bytes = *wallet.sign_message("hello").unwrap().as_bytes();
        bytes[64] = 35;
        let result = recover_address("hello", &WalletSignature::from_bytes(bytes));
        assert!(matches!(result, Err(Error::InvalidSignature(_))));
    }

    #[test]
    fn test_zero_signature_rejected() {
        let result = recover_address("hello", &WalletSignature::from_bytes([0u8; 65]));
        assert!(matches!(result, Err(Error::InvalidSignature(_))));
    }

    #[test]
    fn test_known_address_vector() {
        // Private key 1 maps to the well-known address below.
        let mut key = [0u8; 32];
        key[31] = 1;
        let wallet = WalletSigner::from_hex(&hex::encode(key)).unwrap();
        assert_eq!(
            wallet.address().to_string(),
            "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf"
        );
    }

    #[test]
    fn test_address_parsing() {
        let lower: Address = "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf".parse().unwrap();
        let mixed: Address = "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf".parse().unwrap();
        assert_eq!(lower, mixed);
        assert_eq!(mixed.to_string(), "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf");

        assert!("7e5f4552091a69125d5dfcb7b8c2659029395bdf".parse::<Address>().is_err());
        assert!("0x7e5f".parse::<Address>().is_err());
        assert!("0xzz5f4552091a69125d5dfcb7b8c2659029395bdf".parse::<Address>().is_err());
    }

    #[test]
    fn test_signature_hex_round_trip() {
        let wallet = WalletSigner::generate();
        let signature = wallet.sign_message("hello").unwrap();

        let hex = signature.to_hex();
        assert_eq!(hex.len(), 2 + 130);
        assert_eq!(WalletSignature::from_hex(&hex).unwrap(), signature);
        assert!(WalletSignature::from_hex("0xabcd").is_err());
    }

    #[test]
    fn test_signer_hex_round_trip() {
        let wallet = WalletSigner::generate();
        let restored = WalletSigner::from_hex(&wallet.secret_hex()).unwrap();
        assert_eq!(wallet.address(), restored.address());
    }
}
