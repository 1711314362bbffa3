//! # Signature-Derived Keys
//!
//! Turns a wallet signature over a fixed message into a secp256k1 keypair.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    SIGNATURE → KEYPAIR                                  │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  "eshare encryption key v1 for 0xabc…"                          │   │
//! │  │                                                                 │   │
//! │  │  • Stable forever; changing it orphans every registered key     │   │
//! │  │  • Address is lowercased before formatting                      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │  wallet personal_sign (RFC 6979)      │
//! │                                ▼                                        │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  signature (65 bytes)                                           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │  Keccak-256                            │
//! │                                ▼                                        │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  private scalar (32 bytes)  ──►  public key (65 bytes, 0x04…)   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The same wallet signing the same message always produces the same
//! signature, so the private key can be recovered on any device without
//! storing it anywhere.

use zeroize::Zeroizing;

use super::keys::{DerivedKeyPair, EncryptionPublicKey, PRIVATE_KEY_SIZE};
use super::wallet::{keccak256, Address, WalletSignature};
use crate::error::{Error, Result};

/// Prefix of the message signed to derive the encryption key
pub const DERIVATION_MESSAGE_PREFIX: &str = "eshare encryption key v1 for ";

/// The message a wallet signs to derive its encryption keypair
pub fn derivation_message(address: &Address) -> String {
    format!("{}{}", DERIVATION_MESSAGE_PREFIX, address)
}

/// Derive the private scalar from a derivation signature
pub fn derive_private_key(signature: &WalletSignature) -> Result<Zeroizing<[u8; PRIVATE_KEY_SIZE]>> {
    let digest = Zeroizing::new(keccak256(signature.as_bytes()));

    // Reject zero / out-of-range digests here rather than at first use.
    k256::SecretKey::from_slice(&digest[..])
        .map_err(|_| Error::KeyDerivationFailed("digest is not a valid secp256k1 scalar".into()))?;

    Ok(digest)
}

/// Compute the uncompressed public key for a private scalar
pub fn derive_public_key(private_key: &[u8; PRIVATE_KEY_SIZE]) -> Result<EncryptionPublicKey> {
    Ok(DerivedKeyPair::from_secret_bytes(private_key)?
        .public_key()
        .clone())
}

/// Derive the full keypair from a derivation signature
pub fn derive_keypair(signature: &WalletSignature) -> Result<DerivedKeyPair> {
    let private_key = derive_private_key(signature)?;
    DerivedKeyPair::from_secret_bytes(&private_key)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::is_valid_public_key;
    use crate::crypto::wallet::WalletSigner;

    #[test]
    fn test_derivation_message_lowercases() {
        let address: Address = "0xAbCdEf0123456789aBcDeF0123456789AbCdEf01".parse().unwrap();
        assert_eq!(
            derivation_message(&address),
            "eshare encryption key v1 for 0xabcdef0123456789abcdef0123456789abcdef01"
        );
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let wallet = WalletSigner::generate();
        let message = derivation_message(&wallet.address());

        let kp1 = derive_keypair(&wallet.sign_message(&message).unwrap()).unwrap();
        let kp2 = derive_keypair(&wallet.sign_message(&message).unwrap()).unwrap();

        assert_eq!(kp1.public_key(), kp2.public_key());
        assert_eq!(kp1.secret_bytes(), kp2.secret_bytes());
    }

    #[test]
    fn test_different_signatures_different_keys() {
        let wallet = WalletSigner::generate();
        let sig1 = wallet.sign_message("one").unwrap();
        let sig2 = wallet.sign_message("two").unwrap();

        let kp1 = derive_keypair(&sig1).unwrap();
        let kp2 = derive_keypair(&sig2).unwrap();
        assert_ne!(kp1.public_key(), kp2.public_key());
    }

    #[test]
    fn test_derived_key_is_valid_and_not_signing_key() {
        let wallet = WalletSigner::generate();
        let signature = wallet
            .sign_message(&derivation_message(&wallet.address()))
            .unwrap();

        let kp = derive_keypair(&signature).unwrap();
        assert!(is_valid_public_key(kp.public_key().as_bytes()));

        let derived_as_wallet = WalletSigner::from_hex(&hex::encode(kp.secret_bytes())).unwrap();
        assert_ne!(derived_as_wallet.address(), wallet.address());
    }

    #[test]
    fn test_private_and_public_agree() {
        let signature = WalletSigner::generate().sign_message("x").unwrap();
        let private_key = derive_private_key(&signature).unwrap();
        let public = derive_public_key(&private_key).unwrap();
        assert_eq!(&public, derive_keypair(&signature).unwrap().public_key());
    }
}
