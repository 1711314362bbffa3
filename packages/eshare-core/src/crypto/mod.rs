//! # Cryptography Module
//!
//! All cryptographic primitives used by eshare Core.
//!
//! ## Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    CRYPTOGRAPHIC ARCHITECTURE                           │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    WALLET (external)                            │   │
//! │  │                                                                 │   │
//! │  │  secp256k1 signing key, EIP-191 personal_sign                   │   │
//! │  │            │                                   │                │   │
//! │  │            ▼ claim message                     ▼ derivation msg │   │
//! │  │  ┌─────────────────────┐         ┌──────────────────────────┐  │   │
//! │  │  │  recover_address    │         │  derive_keypair          │  │   │
//! │  │  │  • gates key release│         │  • Keccak-256(sig)       │  │   │
//! │  │  │  • never derives    │         │  • secp256k1 keypair     │  │   │
//! │  │  └─────────────────────┘         └──────────────────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 ENCRYPTION SCHEME                               │   │
//! │  ├─────────────────────────────────────────────────────────────────┤   │
//! │  │                                                                 │   │
//! │  │  1. Blob: AES-256-GCM with a fresh per-share key and IV        │   │
//! │  │                                                                 │   │
//! │  │  2. Key wrap (e2e only): ECIES to the recipient's derived key   │   │
//! │  │     secp256k1 ECDH → HKDF-SHA256 → AES-256-GCM                  │   │
//! │  │                                                                 │   │
//! │  │  3. Legacy: the per-share key is held by the server as-is      │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All randomness comes from `OsRng`. Every operation here is pure and safe
//! to call from any thread.

mod cipher;
mod derive;
mod ecies;
mod keys;
mod wallet;

pub use cipher::{
    decrypt, encrypt, generate_iv, generate_key, Iv, SymmetricKey, IV_SIZE, KEY_SIZE, TAG_SIZE,
};
pub use derive::{
    derivation_message, derive_keypair, derive_private_key, derive_public_key,
    DERIVATION_MESSAGE_PREFIX,
};
pub use ecies::{ecies_decrypt, ecies_encrypt, EciesPayload, ECIES_INFO, ECIES_SALT};
pub use keys::{
    is_valid_public_key, uncompress_public_key, DerivedKeyPair, EncryptionPublicKey,
    COMPRESSED_PUBLIC_KEY_SIZE, PRIVATE_KEY_SIZE, PUBLIC_KEY_SIZE,
};
pub use wallet::{
    eip191_hash, recover_address, Address, WalletSignature, WalletSigner, ADDRESS_SIZE,
    SIGNATURE_SIZE,
};
