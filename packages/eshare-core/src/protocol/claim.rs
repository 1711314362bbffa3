//! # Claim Authentication
//!
//! Decides whether a claim request may receive a share's key material.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        CLAIM CHECKS (in order)                          │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  1. share exists                        else NotFound                  │
//! │  2. now <= expires_at                   else Expired                   │
//! │  3. signature recovers to a signer      else InvalidSignature          │
//! │  4. signer == claimed address           else SignatureMismatch         │
//! │  5. claimed address == recipient        else WrongRecipient            │
//! │  6. mark_claimed(id) made the change    else AlreadyClaimed            │
//! │                                                                         │
//! │  Checks 1-5 are pure and live here; 1 and 6 touch the share store and  │
//! │  run in the service.                                                    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The claim message embeds the share id and the claimant's address, so a
//! signature for one share (or one wallet) does not authorize another.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::crypto::{recover_address, Address, WalletSignature};
use crate::error::{Error, Result};
use crate::share::ShareRecord;

/// The message a recipient signs to claim a share
pub fn claim_message(share_id: &Uuid, address: &Address) -> String {
    format!("I am claiming share {} with wallet {}", share_id, address)
}

/// A recipient's request to claim a share
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimRequest {
    /// Share being claimed
    pub share_id: Uuid,
    /// Signature over [`claim_message`]
    pub signature: WalletSignature,
    /// Address the claimant says they control
    pub wallet_address: Address,
}

impl ClaimRequest {
    /// Build a request from its parts
    pub fn new(share_id: Uuid, wallet_address: Address, signature: WalletSignature) -> Self {
        Self {
            share_id,
            signature,
            wallet_address,
        }
    }

    /// The message this request's signature must cover
    pub fn message(&self) -> String {
        claim_message(&self.share_id, &self.wallet_address)
    }
}

/// Check that the signature was made by the claimed wallet over this claim
pub fn verify_claim_signature(request: &ClaimRequest) -> Result<()> {
    let signer = recover_address(&request.message(), &request.signature)?;
    if signer != request.wallet_address {
        return Err(Error::SignatureMismatch);
    }
    Ok(())
}

/// Run every pure claim check against a share
///
/// Does not consider `claimed_at`; the conditional store update decides
/// that, so two concurrent claims cannot both pass.
pub fn authenticate_claim(
    share: &ShareRecord,
    request: &ClaimRequest,
    now: DateTime<Utc>,
) -> Result<()> {
    if request.share_id != share.id {
        return Err(Error::NotFound(request.share_id.to_string()));
    }
    if share.is_expired(now) {
        return Err(Error::Expired);
    }

    verify_claim_signature(request)?;

    if request.wallet_address != share.recipient_address {
        return Err(Error::WrongRecipient);
    }

    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
