//! # Share Service
//!
//! Runs the share protocol against the storage collaborators.
//!
//! ## Flow
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         SHARE SERVICE                                   │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  SENDER                                                                │
//! │  ──────                                                                 │
//! │  create_share ──► KeyRegistry.get(recipient) ──► select mode           │
//! │               ──► seal_files ──► size check ──► BlobStore.put          │
//! │               ──► ShareStore.insert ──► ShareReceipt                   │
//! │                                                                         │
//! │  RECIPIENT                                                             │
//! │  ─────────                                                              │
//! │  register_public_key ──► validate ──► KeyRegistry.upsert               │
//! │  share_info          ──► public view (no key material)                 │
//! │  claim               ──► authenticate ──► ShareStore.mark_claimed      │
//! │                      ──► ClaimedShare (envelope released)              │
//! │  fetch_and_open      ──► BlobStore.get ──► open_files                  │
//! │                                                                         │
//! │  MAINTENANCE                                                           │
//! │  ───────────                                                            │
//! │  purge_expired ──► ShareStore.purge_expired ──► BlobStore.delete       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::config::ShareConfig;
use crate::crypto::{Address, DerivedKeyPair, EncryptionPublicKey};
use crate::error::{Error, Result};
use crate::files::SharedFile;
use crate::protocol::{
    authenticate_claim, open_files, seal_files, select_mode, ClaimRequest, EncryptionMode,
};
use crate::share::{ClaimedShare, RegisteredPublicKey, ShareInfo, ShareReceipt, ShareRecord};
use crate::storage::{BlobStore, KeyRegistry, ShareStore};

/// Input to [`ShareService::create_share`]
#[derive(Debug, Clone)]
pub struct CreateShare {
    /// Sender's wallet address (`0x` + 40 hex)
    pub sender: String,
    /// Recipient's wallet address (`0x` + 40 hex)
    pub recipient: String,
    /// Sender display name
    pub sender_name: Option<String>,
    /// Recipient display name
    pub recipient_name: Option<String>,
    /// Files to share, in order
    pub files: Vec<SharedFile>,
}

/// Share protocol over a blob store, share store and key registry
pub struct ShareService<B, S, R> {
    blobs: Arc<B>,
    shares: Arc<S>,
    keys: Arc<R>,
    config: ShareConfig,
}

impl<B, S, R> ShareService<B, S, R>
where
    B: BlobStore,
    S: ShareStore,
    R: KeyRegistry,
{
    /// Create a service over the given collaborators
    pub fn new(blobs: Arc<B>, shares: Arc<S>, keys: Arc<R>, config: ShareConfig) -> Self {
        Self {
            blobs,
            shares,
            keys,
            config,
        }
    }

    /// Active configuration
    pub fn config(&self) -> &ShareConfig {
        &self.config
    }

    // ========================================================================
    // KEY REGISTRATION
    // ========================================================================

    /// Register (or replace) the derived public key for an address
    ///
    /// The key must be `0x04` + 128 hex and a point on secp256k1.
    pub async fn register_public_key(
        &self,
        address: &str,
        public_key: &str,
    ) -> Result<RegisteredPublicKey> {
        let address: Address = address.parse()?;
        let public_key = EncryptionPublicKey::from_hex(public_key)?;

        let registered = RegisteredPublicKey {
            address,
            public_key,
            created_at: Utc::now(),
        };
        self.keys.upsert(registered.clone()).await?;

        tracing::info!(address = %address, "Registered derived public key");
        Ok(registered)
    }

    /// Look up the derived public key registered for an address
    pub async fn lookup_public_key(&self, address: &str) -> Result<Option<RegisteredPublicKey>> {
        let address: Address = address.parse()?;
        self.keys.get(&address).await
    }

    /// Which mode a share to `recipient` would use right now
    pub async fn protocol_for(&self, recipient: &str) -> Result<EncryptionMode> {
        let registered = self.lookup_public_key(recipient).await?;
        Ok(select_mode(registered.as_ref().map(|k| &k.public_key)))
    }

    // ========================================================================
    // SENDING
    // ========================================================================

    /// Seal files for a recipient and store the share
    pub async fn create_share(&self, request: CreateShare) -> Result<ShareReceipt> {
        if request.files.is_empty() {
            return Err(Error::EmptyShare);
        }
        let sender: Address = request.sender.parse()?;
        let recipient: Address = request.recipient.parse()?;

        let registered = self.keys.get(&recipient).await?;
        let sealed = seal_files(
            &request.files,
            registered.as_ref().map(|k| &k.public_key),
        )?;

        let size = sealed.ciphertext.len() as u64;
        if size > self.config.max_blob_bytes {
            return Err(Error::PayloadTooLarge {
                size,
                limit: self.config.max_blob_bytes,
            });
        }

        let now = Utc::now();
        let expires_at = now
            .checked_add_signed(self.config.share_ttl()?)
            .ok_or_else(|| {
                Error::InvalidConfig(format!(
                    "share TTL of {} seconds overflows the expiry time",
                    self.config.share_ttl_secs
                ))
            })?;

        let blob = self.blobs.put(sealed.ciphertext).await?;

        let record = ShareRecord {
            id: Uuid::new_v4(),
            sender_address: sender,
            sender_name: request.sender_name,
            recipient_address: recipient,
            recipient_name: request.recipient_name,
            blob,
            blob_size_bytes: size,
            file_manifest: sealed.manifest,
            envelope: sealed.envelope,
            claimed_at: None,
            created_at: now,
            expires_at,
        };
        let share_id = record.id;
        let mode = record.mode();

        if let Err(e) = self.shares.insert(record).await {
            if let Err(delete_err) = self.blobs.delete(&blob).await {
                tracing::warn!(
                    share_id = %share_id,
                    blob = %blob,
                    error = %delete_err,
                    "Failed to delete orphaned blob"
                );
            }
            return Err(e);
        }

        tracing::info!(
            share_id = %share_id,
            mode = %mode,
            recipient = %recipient,
            bytes = size,
            "Share created"
        );

        Ok(ShareReceipt {
            share_id,
            share_link: self.config.share_link(&share_id),
            mode,
            expires_at,
        })
    }

    // ========================================================================
    // RECEIVING
    // ========================================================================

    /// Public view of a share
    pub async fn share_info(&self, share_id: &Uuid) -> Result<ShareInfo> {
        let share = self.load(share_id).await?;
        if share.is_expired(Utc::now()) {
            return Err(Error::Expired);
        }
        Ok(share.info())
    }

    /// Authenticate a claim and release the share's materials
    pub async fn claim(&self, request: &ClaimRequest) -> Result<ClaimedShare> {
        let now = Utc::now();
        let share = self.load(&request.share_id).await?;

        if let Err(e) = authenticate_claim(&share, request, now) {
            tracing::warn!(
                share_id = %request.share_id,
                wallet = %request.wallet_address,
                code = e.code(),
                "Claim rejected: {}",
                e
            );
            return Err(e);
        }

        if !self.shares.mark_claimed(&share.id, now).await? {
            tracing::warn!(share_id = %share.id, "Claim rejected: already claimed");
            return Err(Error::AlreadyClaimed);
        }

        tracing::info!(
            share_id = %share.id,
            mode = %share.mode(),
            "Share claimed"
        );

        Ok(ClaimedShare {
            share_id: share.id,
            blob: share.blob,
            envelope: share.envelope,
            file_manifest: share.file_manifest,
            claimed_at: now,
        })
    }

    /// Fetch a claimed share's blob and decrypt it
    ///
    /// `derived` must be the recipient's derived keypair for e2e shares.
    pub async fn fetch_and_open(
        &self,
        claimed: &ClaimedShare,
        derived: Option<&DerivedKeyPair>,
    ) -> Result<Vec<SharedFile>> {
        if claimed.mode() == EncryptionMode::E2e && derived.is_none() {
            return Err(Error::DerivedKeyRequired);
        }

        let ciphertext = self.blobs.get(&claimed.blob).await?;
        let files = open_files(
            &ciphertext,
            &claimed.file_manifest,
            &claimed.envelope,
            derived,
        )?;

        tracing::debug!(
            share_id = %claimed.share_id,
            files = files.len(),
            "Share opened"
        );
        Ok(files)
    }

    // ========================================================================
    // MAINTENANCE
    // ========================================================================

    /// Delete expired shares and their blobs, returning how many were removed
    pub async fn purge_expired(&self) -> Result<usize> {
        let purged = self.shares.purge_expired(Utc::now()).await?;

        for share in &purged {
            if let Err(e) = self.blobs.delete(&share.blob).await {
                tracing::warn!(share_id = %share.id, error = %e, "Failed to delete blob");
            }
        }

        if !purged.is_empty() {
            tracing::info!(count = purged.len(), "Purged expired shares");
        }
        Ok(purged.len())
    }

    async fn load(&self, share_id: &Uuid) -> Result<ShareRecord> {
        self.shares
            .get(share_id)
            .await?
            .ok_or_else(|| Error::NotFound(share_id.to_string()))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{derivation_message, derive_keypair, WalletSigner};
    use crate::protocol::claim_message;
    use crate::storage::{MemoryBlobStore, MemoryKeyRegistry, MemoryShareStore};

    type MemoryService = ShareService<MemoryBlobStore, MemoryShareStore, MemoryKeyRegistry>;

    fn service(config: ShareConfig) -> (MemoryService, Arc<MemoryBlobStore>) {
        let blobs = Arc::new(MemoryBlobStore::new());
        let service = ShareService::new(
            blobs.clone(),
            Arc::new(MemoryShareStore::new()),
            Arc::new(MemoryKeyRegistry::new()),
            config,
        );
        (service, blobs)
    }

    fn create(sender: &WalletSigner, recipient: &WalletSigner) -> CreateShare {
        CreateShare {
            sender: sender.address().to_string(),
            recipient: recipient.address().to_string(),
            sender_name: None,
            recipient_name: Some("bob.eth".into()),
            files: vec![SharedFile::new("hello.txt", "text/plain", b"hi".to_vec())],
        }
    }

    fn claim_for(wallet: &WalletSigner, share_id: Uuid) -> ClaimRequest {
        let signature = wallet
            .sign_message(&claim_message(&share_id, &wallet.address()))
            .unwrap();
        ClaimRequest::new(share_id, wallet.address(), signature)
    }

    #[tokio::test]
    async fn test_register_rejects_bad_input() {
        let (service, _) = service(ShareConfig::default());
        let kp = DerivedKeyPair::from_secret_bytes(&[1u8; 32]).unwrap();

        let bad_address = service
            .register_public_key("0x1234", &kp.public_key().to_hex())
            .await;
        assert!(matches!(bad_address, Err(Error::InvalidAddress(_))));

        let off_curve = format!("0x04{}", "11".repeat(64));
        let bad_key = service
            .register_public_key("0x1111111111111111111111111111111111111111", &off_curve)
            .await;
        assert!(matches!(bad_key, Err(Error::InvalidPublicKey(_))));
    }

    #[tokio::test]
    async fn test_lookup_is_case_insensitive() {
        let (service, _) = service(ShareConfig::default());
        let kp = DerivedKeyPair::from_secret_bytes(&[1u8; 32]).unwrap();

        service
            .register_public_key("0xABCDEF0123456789ABCDEF0123456789ABCDEF01", &kp.public_key().to_hex())
            .await
            .unwrap();

        let found = service
            .lookup_public_key("0xabcdef0123456789abcdef0123456789abcdef01")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&found.public_key, kp.public_key());
    }

    #[tokio::test]
    async fn test_create_share_receipt() {
        let (service, blobs) = service(ShareConfig::default());
        let alice = WalletSigner::generate();
        let bob = WalletSigner::generate();

        let receipt = service.create_share(create(&alice, &bob)).await.unwrap();
        assert_eq!(receipt.mode, EncryptionMode::Legacy);
        assert_eq!(
            receipt.share_link,
            format!("http://localhost:3000/s/{}", receipt.share_id)
        );
        assert_eq!(blobs.len(), 1);
    }

    #[tokio::test]
    async fn test_create_share_rejects_empty_and_bad_address() {
        let (service, _) = service(ShareConfig::default());
        let alice = WalletSigner::generate();
        let bob = WalletSigner::generate();

        let mut empty = create(&alice, &bob);
        empty.files.clear();
        assert!(matches!(service.create_share(empty).await, Err(Error::EmptyShare)));

        let mut bad = create(&alice, &bob);
        bad.recipient = "bob.eth".into();
        assert!(matches!(
            service.create_share(bad).await,
            Err(Error::InvalidAddress(_))
        ));
    }

    #[tokio::test]
    async fn test_payload_too_large() {
        let (service, blobs) = service(ShareConfig {
            max_blob_bytes: 64,
            ..ShareConfig::default()
        });
        let alice = WalletSigner::generate();
        let bob = WalletSigner::generate();

        let mut request = create(&alice, &bob);
        request.files = vec![SharedFile::new("big.bin", "application/octet-stream", vec![0u8; 100])];

        let result = service.create_share(request).await;
        assert!(matches!(
            result,
            Err(Error::PayloadTooLarge { size: 116, limit: 64 })
        ));
        assert!(blobs.is_empty());
    }

    #[tokio::test]
    async fn test_out_of_range_ttl_is_an_error() {
        let alice = WalletSigner::generate();
        let bob = WalletSigner::generate();

        for share_ttl_secs in [i64::MAX, i64::MAX / 1000] {
            let (service, blobs) = service(ShareConfig {
                share_ttl_secs,
                ..ShareConfig::default()
            });
            let result = service.create_share(create(&alice, &bob)).await;
            assert!(matches!(result, Err(Error::InvalidConfig(_))));
            assert!(blobs.is_empty());
        }
    }

    struct RejectingShareStore;

    #[async_trait::async_trait]
    impl ShareStore for RejectingShareStore {
        async fn insert(&self, _share: ShareRecord) -> Result<()> {
            Err(Error::StorageWriteError("disk full".into()))
        }

        async fn get(&self, _id: &Uuid) -> Result<Option<ShareRecord>> {
            Ok(None)
        }

        async fn mark_claimed(&self, id: &Uuid, _at: chrono::DateTime<Utc>) -> Result<bool> {
            Err(Error::NotFound(id.to_string()))
        }

        async fn purge_expired(&self, _now: chrono::DateTime<Utc>) -> Result<Vec<ShareRecord>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_failed_insert_removes_blob() {
        let blobs = Arc::new(MemoryBlobStore::new());
        let service = ShareService::new(
            blobs.clone(),
            Arc::new(RejectingShareStore),
            Arc::new(MemoryKeyRegistry::new()),
            ShareConfig::default(),
        );
        let alice = WalletSigner::generate();
        let bob = WalletSigner::generate();

        let result = service.create_share(create(&alice, &bob)).await;
        assert!(matches!(result, Err(Error::StorageWriteError(_))));
        assert!(blobs.is_empty());
    }

    #[tokio::test]
    async fn test_share_info_and_expiry() {
        let (service, _) = service(ShareConfig::default());
        let alice = WalletSigner::generate();
        let bob = WalletSigner::generate();
        let receipt = service.create_share(create(&alice, &bob)).await.unwrap();

        let info = service.share_info(&receipt.share_id).await.unwrap();
        assert_eq!(info.recipient_address, bob.address());
        assert_eq!(info.recipient_name.as_deref(), Some("bob.eth"));
        assert!(!info.claimed);

        assert!(matches!(
            service.share_info(&Uuid::new_v4()).await,
            Err(Error::NotFound(_))
        ));

        let (expired_service, _) = service_with_expired();
        let receipt = expired_service.create_share(create(&alice, &bob)).await.unwrap();
        assert!(matches!(
            expired_service.share_info(&receipt.share_id).await,
            Err(Error::Expired)
        ));
    }

    fn service_with_expired() -> (MemoryService, Arc<MemoryBlobStore>) {
        service(ShareConfig {
            share_ttl_secs: -1,
            ..ShareConfig::default()
        })
    }

    #[tokio::test]
    async fn test_claim_then_open_e2e() {
        let (service, _) = service(ShareConfig::default());
        let alice = WalletSigner::generate();
        let bob = WalletSigner::generate();

        let derivation_sig = bob
            .sign_message(&derivation_message(&bob.address()))
            .unwrap();
        let bob_keys = derive_keypair(&derivation_sig).unwrap();
        service
            .register_public_key(&bob.address().to_string(), &bob_keys.public_key().to_hex())
            .await
            .unwrap();

        let receipt = service.create_share(create(&alice, &bob)).await.unwrap();
        assert_eq!(receipt.mode, EncryptionMode::E2e);

        let claimed = service.claim(&claim_for(&bob, receipt.share_id)).await.unwrap();
        assert!(matches!(
            service.fetch_and_open(&claimed, None).await,
            Err(Error::DerivedKeyRequired)
        ));

        let files = service.fetch_and_open(&claimed, Some(&bob_keys)).await.unwrap();
        assert_eq!(files[0].data, b"hi");
    }

    #[tokio::test]
    async fn test_second_claim_rejected() {
        let (service, _) = service(ShareConfig::default());
        let alice = WalletSigner::generate();
        let bob = WalletSigner::generate();
        let receipt = service.create_share(create(&alice, &bob)).await.unwrap();

        service.claim(&claim_for(&bob, receipt.share_id)).await.unwrap();
        assert!(matches!(
            service.claim(&claim_for(&bob, receipt.share_id)).await,
            Err(Error::AlreadyClaimed)
        ));
    }

    #[tokio::test]
    async fn test_purge_removes_blobs() {
        let (service, blobs) = service_with_expired();
        let alice = WalletSigner::generate();
        let bob = WalletSigner::generate();
        let receipt = service.create_share(create(&alice, &bob)).await.unwrap();

        assert_eq!(service.purge_expired().await.unwrap(), 1);
        assert!(blobs.is_empty());
        assert!(matches!(
            service.share_info(&receipt.share_id).await,
            Err(Error::NotFound(_))
        ));
    }
}
