//! # eshare Core
//!
//! Encrypted file sharing addressed to wallets: only the recipient's wallet
//! can open what was sent to it.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         ESHARE CORE MODULES                             │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────┐  ┌──────────────┐   │
//! │  │    Files    │  │   Crypto    │  │  Protocol   │  │   Service    │   │
//! │  │             │  │             │  │             │  │              │   │
//! │  │ - Pack      │  │ - AES-GCM   │  │ - Envelope  │  │ - Register   │   │
//! │  │ - Unpack    │  │ - ECIES     │  │ - Seal/Open │  │ - Create     │   │
//! │  │ - Manifest  │  │ - Derive    │  │ - Claim     │  │ - Claim      │   │
//! │  │             │  │ - Wallet    │  │             │  │ - Purge      │   │
//! │  └──────┬──────┘  └──────┬──────┘  └──────┬──────┘  └──────┬───────┘   │
//! │         └────────────────┴────────────────┴────────────────┘           │
//! │                                   │                                     │
//! │                      ┌────────────┴────────────┐                        │
//! │                      │         Storage         │                        │
//! │                      │ - BlobStore             │                        │
//! │                      │ - ShareStore            │                        │
//! │                      │ - KeyRegistry           │                        │
//! │                      │ - memory / sqlite       │                        │
//! │                      └─────────────────────────┘                        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Hierarchy
//!
//! - [`error`] - Error types for the entire library
//! - [`crypto`] - Cipher, keys, ECIES, signature-derived keys, wallet signatures
//! - [`files`] - Multi-file packing and manifests
//! - [`protocol`] - Envelopes, mode selection, seal/open and claim checks
//! - [`share`] - Share records and the views handed to callers
//! - [`storage`] - Collaborator traits and bundled stores
//! - [`service`] - [`ShareService`], the protocol over the stores
//! - [`config`] - [`ShareConfig`]
//!
//! ## Security Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          SECURITY LAYERS                                │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Layer 1: Blob Encryption (AES-256-GCM)                                │
//! │  ──────────────────────────────────────                                 │
//! │  Every share gets a fresh key and IV. Blob storage only ever sees      │
//! │  ciphertext.                                                           │
//! │                                                                         │
//! │  Layer 2: Key Wrapping (secp256k1 ECIES), e2e mode                     │
//! │  ──────────────────────────────────────────────                         │
//! │  The per-share key is wrapped to a public key derived from the         │
//! │  recipient's wallet signature. The server never holds a usable key.   │
//! │  Recipients without a registered key fall back to legacy mode, where  │
//! │  the server stores the key and releases it after a valid claim.        │
//! │                                                                         │
//! │  Layer 3: Claim Authentication (EIP-191 signatures)                    │
//! │  ──────────────────────────────────────────────────                     │
//! │  Key material is released once, to the recipient, after it signs a   │
//! │  message naming both the share and its own address.                    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================

pub mod config;
pub mod crypto;
pub mod error;
pub mod files;
pub mod protocol;
pub mod service;
pub mod share;
pub mod storage;

// ============================================================================
// RE-EXPORTS
// ============================================================================

pub use config::ShareConfig;
pub use crypto::{Address, DerivedKeyPair, EncryptionPublicKey, WalletSignature, WalletSigner};
pub use error::{Error, Result};
pub use files::{FileManifest, SharedFile};
pub use protocol::{ClaimRequest, EncryptionEnvelope, EncryptionMode};
pub use service::{CreateShare, ShareService};
pub use share::{ClaimedShare, RegisteredPublicKey, ShareInfo, ShareReceipt, ShareRecord};

// ============================================================================
// VERSION INFO
// ============================================================================

/// Returns the version of eshare Core
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
