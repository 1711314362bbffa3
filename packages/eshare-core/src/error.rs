//! # Error Handling
//!
//! Error types for eshare Core.
//!
//! ## Error Hierarchy
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           ERROR HIERARCHY                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Error (top-level)                                                     │
//! │  │                                                                      │
//! │  ├── Crypto Errors                                                     │
//! │  │   ├── InvalidPublicKey      - Off-curve or malformed point          │
//! │  │   ├── InvalidKey            - Wrong key / IV length                 │
//! │  │   ├── AuthenticationFailure - GCM tag did not verify                │
//! │  │   ├── EncryptionFailed      - AEAD refused to encrypt               │
//! │  │   ├── KeyDerivationFailed   - HKDF / scalar derivation failed       │
//! │  │   └── InvalidSignature      - Malformed or unrecoverable signature  │
//! │  │                                                                      │
//! │  ├── Claim Errors                                                      │
//! │  │   ├── SignatureMismatch     - Recovered signer ≠ claimed address    │
//! │  │   ├── WrongRecipient        - Claimed address ≠ share recipient     │
//! │  │   ├── Expired / NotFound / AlreadyClaimed                           │
//! │  │   └── DerivedKeyRequired    - e2e share opened without derived key  │
//! │  │                                                                      │
//! │  ├── Packing & Wire Errors                                             │
//! │  │   ├── ManifestMismatch      - Manifest inconsistent with buffer     │
//! │  │   ├── InvalidEncoding       - Bad hex / base64 / envelope framing   │
//! │  │   ├── InvalidAddress        - Not a 0x-prefixed 20-byte address     │
//! │  │   ├── PayloadTooLarge       - Blob exceeds configured limit         │
//! │  │   └── EmptyShare            - No files supplied                     │
//! │  │                                                                      │
//! │  ├── Storage Errors                                                    │
//! │  │   ├── StorageReadError / StorageWriteError / BlobNotFound          │
//! │  │   └── DatabaseError         - SQLite open / query failure           │
//! │  │                                                                      │
//! │  └── Internal Errors                                                   │
//! │      ├── Serialization / Internal                                      │
//! │      └── InvalidConfig         - Setting out of range                  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! None of these are retried internally: cryptographic and claim failures are
//! not transient. Callers abort the flow on any error.

use thiserror::Error;

/// Result type alias for eshare Core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for eshare Core
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Crypto Errors (100-199)
    // ========================================================================

    /// Public key bytes do not decode to a valid secp256k1 point
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    /// Key or IV material has the wrong length
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// AES-GCM authentication tag did not verify
    #[error("Authentication failed: ciphertext, key or IV does not match")]
    AuthenticationFailure,

    /// Encryption failed
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// Key derivation failed
    #[error("Failed to derive keys: {0}")]
    KeyDerivationFailed(String),

    /// Signature bytes are malformed or no signer could be recovered
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    // ========================================================================
    // Claim Errors (200-299)
    // ========================================================================

    /// The signature recovers to a different address than the one claimed
    #[error("Signature does not match wallet address")]
    SignatureMismatch,

    /// The claiming wallet is not the share's recipient
    #[error("Wallet is not the intended recipient of this share")]
    WrongRecipient,

    /// The share has passed its expiry time
    #[error("Share has expired")]
    Expired,

    /// No share exists with this identifier
    #[error("Share not found: {0}")]
    NotFound(String),

    /// The share was already claimed
    #[error("Share has already been claimed")]
    AlreadyClaimed,

    /// An end-to-end share was opened without the recipient's derived keypair
    #[error("End-to-end share requires the recipient's derived keypair")]
    DerivedKeyRequired,

    // ========================================================================
    // Packing & Wire Errors (300-399)
    // ========================================================================

    /// Manifest offsets are inconsistent with the buffer
    #[error("Manifest mismatch: {0}")]
    ManifestMismatch(String),

    /// Malformed hex, base64 or envelope framing
    #[error("Invalid encoding: {0}")]
    InvalidEncoding(String),

    /// Not a `0x`-prefixed 20-byte hex address
    #[error("Invalid address format: {0}")]
    InvalidAddress(String),

    /// Encrypted payload exceeds the configured limit
    #[error("Payload too large: {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge {
        /// Actual payload size
        size: u64,
        /// Configured maximum
        limit: u64,
    },

    /// A share must contain at least one file
    #[error("No files provided")]
    EmptyShare,

    // ========================================================================
    // Storage Errors (400-499)
    // ========================================================================

    /// Failed to read from storage
    #[error("Failed to read from storage: {0}")]
    StorageReadError(String),

    /// Failed to write to storage
    #[error("Failed to write to storage: {0}")]
    StorageWriteError(String),

    /// Blob reference does not resolve
    #[error("Blob not found: {0}")]
    BlobNotFound(String),

    /// Database error
    #[error("Database error: {0}")]
    DatabaseError(String),

    // ========================================================================
    // Internal Errors (900-999)
    // ========================================================================

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),

    /// A configuration value is out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Numeric error code
    ///
    /// - 100-199: Crypto
    /// - 200-299: Claim
    /// - 300-399: Packing & wire
    /// - 400-499: Storage
    /// - 900-999: Internal
    pub fn code(&self) -> i32 {
        match self {
            // Crypto (100-199)
            Error::InvalidPublicKey(_) => 100,
            Error::InvalidKey(_) => 101,
            Error::AuthenticationFailure => 102,
            Error::EncryptionFailed(_) => 103,
            Error::KeyDerivationFailed(_) => 104,
            Error::InvalidSignature(_) => 105,

            // Claim (200-299)
            Error::SignatureMismatch => 200,
            Error::WrongRecipient => 201,
            Error::Expired => 202,
            Error::NotFound(_) => 203,
            Error::AlreadyClaimed => 204,
            Error::DerivedKeyRequired => 205,

            // Packing & wire (300-399)
            Error::ManifestMismatch(_) => 300,
            Error::InvalidEncoding(_) => 301,
            Error::InvalidAddress(_) => 302,
            Error::PayloadTooLarge { .. } => 303,
            Error::EmptyShare => 304,

            // Storage (400-499)
            Error::StorageReadError(_) => 400,
            Error::StorageWriteError(_) => 401,
            Error::BlobNotFound(_) => 402,
            Error::DatabaseError(_) => 403,

            // Internal (900-999)
            Error::Serialization(_) => 900,
            Error::Internal(_) => 901,
            Error::InvalidConfig(_) => 902,
        }
    }

    /// Whether this error came out of the claim authenticator's state checks
    pub fn is_claim_rejection(&self) -> bool {
        matches!(
            self,
            Error::SignatureMismatch
                | Error::WrongRecipient
                | Error::Expired
                | Error::NotFound(_)
                | Error::AlreadyClaimed
                | Error::InvalidSignature(_)
        )
    }

    /// Whether the caller can fix this by changing its input
    pub fn requires_user_action(&self) -> bool {
        matches!(
            self,
            Error::InvalidAddress(_)
                | Error::EmptyShare
                | Error::PayloadTooLarge { .. }
                | Error::DerivedKeyRequired
                | Error::InvalidConfig(_)
        )
    }
}

// ============================================================================
// ERROR CONVERSIONS
// ============================================================================

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::StorageReadError(err.to_string())
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::DatabaseError(err.to_string())
    }
}

impl From<hex::FromHexError> for Error {
    fn from(err: hex::FromHexError) -> Self {
        Error::InvalidEncoding(format!("hex: {}", err))
    }
}

impl From<base64::DecodeError> for Error {
    fn from(err: base64::DecodeError) -> Self {
        Error::InvalidEncoding(format!("base64: {}", err))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::InvalidPublicKey("x".into()).code(), 100);
        assert_eq!(Error::AuthenticationFailure.code(), 102);
        assert_eq!(Error::SignatureMismatch.code(), 200);
        assert_eq!(Error::WrongRecipient.code(), 201);
        assert_eq!(Error::ManifestMismatch("x".into()).code(), 300);
        assert_eq!(Error::StorageReadError("x".into()).code(), 400);
        assert_eq!(Error::DatabaseError("x".into()).code(), 403);
        assert_eq!(Error::Internal("x".into()).code(), 901);
        assert_eq!(Error::InvalidConfig("x".into()).code(), 902);
    }

    #[test]
    fn test_claim_rejections() {
        assert!(Error::WrongRecipient.is_claim_rejection());
        assert!(Error::AlreadyClaimed.is_claim_rejection());
        assert!(Error::NotFound("abc".into()).is_claim_rejection());
        assert!(!Error::AuthenticationFailure.is_claim_rejection());
        assert!(!Error::ManifestMismatch("x".into()).is_claim_rejection());
    }

    #[test]
    fn test_payload_too_large_message() {
        let err = Error::PayloadTooLarge { size: 200, limit: 100 };
        assert!(err.to_string().contains("200"));
        assert!(err.requires_user_action());
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = io.into();
        assert_eq!(err.code(), 400);
    }

    #[test]
    fn test_rusqlite_error_conversion() {
        let err: Error = rusqlite::Error::QueryReturnedNoRows.into();
        assert_eq!(err.code(), 403);
        assert!(!err.requires_user_action());
    }
}
