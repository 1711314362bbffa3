//! # Shares
//!
//! Records kept for each share and the views handed out of the service.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        SHARE LIFECYCLE                                  │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │   create_share                                                         │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  ┌────────────┐  valid claim   ┌────────────┐                         │
//! │  │ Unclaimed  │ ─────────────► │  Claimed   │  (terminal)              │
//! │  └────────────┘                └────────────┘                         │
//! │        │                                                                │
//! │        │ expires_at < now                                               │
//! │        ▼                                                                │
//! │  ┌────────────┐                                                        │
//! │  │  Expired   │ ──► purge_expired                                      │
//! │  └────────────┘                                                        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::crypto::{Address, EncryptionPublicKey};
use crate::files::FileManifest;
use crate::protocol::{EncryptionEnvelope, EncryptionMode};
use crate::storage::BlobRef;

/// Everything stored for one share
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareRecord {
    /// Share identifier (UUID v4)
    pub id: Uuid,
    /// Sender's wallet address
    pub sender_address: Address,
    /// Sender display name (ENS)
    pub sender_name: Option<String>,
    /// Recipient's wallet address
    pub recipient_address: Address,
    /// Recipient display name (ENS)
    pub recipient_name: Option<String>,
    /// Where the encrypted blob lives
    pub blob: BlobRef,
    /// Encrypted blob size in bytes
    pub blob_size_bytes: u64,
    /// Layout of the packed plaintext
    pub file_manifest: FileManifest,
    /// Key material
    #[serde(flatten)]
    pub envelope: EncryptionEnvelope,
    /// When the recipient claimed the share
    pub claimed_at: Option<DateTime<Utc>>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Expiry time
    pub expires_at: DateTime<Utc>,
}

impl ShareRecord {
    /// Whether the share is past its expiry at `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Whether the share has been claimed
    pub fn is_claimed(&self) -> bool {
        self.claimed_at.is_some()
    }

    /// The envelope's mode
    pub fn mode(&self) -> EncryptionMode {
        self.envelope.mode()
    }

    /// Public view, without key material
    pub fn info(&self) -> ShareInfo {
        ShareInfo {
            id: self.id,
            sender_address: self.sender_address,
            sender_name: self.sender_name.clone(),
            recipient_address: self.recipient_address,
            recipient_name: self.recipient_name.clone(),
            file_manifest: self.file_manifest.clone(),
            encryption_mode: self.mode(),
            created_at: self.created_at,
            expires_at: self.expires_at,
            claimed: self.is_claimed(),
        }
    }
}

/// What anyone holding the link may see
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareInfo {
    /// Share identifier
    pub id: Uuid,
    /// Sender's wallet address
    pub sender_address: Address,
    /// Sender display name
    pub sender_name: Option<String>,
    /// Recipient's wallet address
    pub recipient_address: Address,
    /// Recipient display name
    pub recipient_name: Option<String>,
    /// File names, sizes and types
    pub file_manifest: FileManifest,
    /// Whether the recipient will need their derived key
    pub encryption_mode: EncryptionMode,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Expiry time
    pub expires_at: DateTime<Utc>,
    /// Whether the share has been claimed
    pub claimed: bool,
}

/// Materials released after a successful claim
#[derive(Debug, Clone)]
pub struct ClaimedShare {
    /// Share identifier
    pub share_id: Uuid,
    /// Where the encrypted blob lives
    pub blob: BlobRef,
    /// Key material
    pub envelope: EncryptionEnvelope,
    /// Layout of the packed plaintext
    pub file_manifest: FileManifest,
    /// When the claim was recorded
    pub claimed_at: DateTime<Utc>,
}

impl ClaimedShare {
    /// The envelope's mode
    pub fn mode(&self) -> EncryptionMode {
        self.envelope.mode()
    }
}

/// A recipient's registered derived public key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredPublicKey {
    /// Owning wallet address
    pub address: Address,
    /// Derived encryption public key
    pub public_key: EncryptionPublicKey,
    /// When the key was (last) registered
    pub created_at: DateTime<Utc>,
}

/// Returned to the sender when a share is created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareReceipt {
    /// Share identifier
    pub share_id: Uuid,
    /// Link to hand to the recipient
    pub share_link: String,
    /// Mode the share was sealed with
    pub mode: EncryptionMode,
    /// Expiry time
    pub expires_at: DateTime<Utc>,
}

// ============================================================================
// TESTS
// ============================================================================
