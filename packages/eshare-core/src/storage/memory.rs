//! In-memory stores.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use super::{BlobRef, BlobStore, KeyRegistry, ShareStore};
use crate::crypto::Address;
use crate::error::{Error, Result};
use crate::share::{RegisteredPublicKey, ShareRecord};

/// Blobs held in a map
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<BlobRef, Vec<u8>>>,
}

impl MemoryBlobStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs
    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    /// Whether no blobs are stored
    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, bytes: Vec<u8>) -> Result<BlobRef> {
        let blob = BlobRef::new();
        self.blobs.write().insert(blob, bytes);
        Ok(blob)
    }

    async fn get(&self, blob: &BlobRef) -> Result<Vec<u8>> {
        self.blobs
            .read()
            .get(blob)
            .cloned()
            .ok_or_else(|| Error::BlobNotFound(blob.to_string()))
    }

    async fn delete(&self, blob: &BlobRef) -> Result<()> {
        self.blobs.write().remove(blob);
        Ok(())
    }
}

/// Share records held in a map
#[derive(Debug, Default)]
pub struct MemoryShareStore {
    shares: RwLock<HashMap<Uuid, ShareRecord>>,
}

impl MemoryShareStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ShareStore for MemoryShareStore {
    async fn insert(&self, share: ShareRecord) -> Result<()> {
        let mut shares = self.shares.write();
        if shares.contains_key(&share.id) {
            return Err(Error::StorageWriteError(format!(
                "share {} already exists",
                share.id
            )));
        }
        shares.insert(share.id, share);
        Ok(())
    }

    async fn get(&self, id: &Uuid) -> Result<Option<ShareRecord>> {
        Ok(self.shares.read().get(id).cloned())
    }

    async fn mark_claimed(&self, id: &Uuid, at: DateTime<Utc>) -> Result<bool> {
        let mut shares = self.shares.write();
        let share = shares
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;

        if share.claimed_at.is_some() {
            return Ok(false);
        }
        share.claimed_at = Some(at);
        Ok(true)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<Vec<ShareRecord>> {
        let mut shares = self.shares.write();
        let expired: Vec<Uuid> = shares
            .values()
            .filter(|s| s.is_expired(now))
            .map(|s| s.id)
            .collect();

        Ok(expired
            .iter()
            .filter_map(|id| shares.remove(id))
            .collect())
    }
}

/// Registered keys held in a map
#[derive(Debug, Default)]
pub struct MemoryKeyRegistry {
    keys: RwLock<HashMap<Address, RegisteredPublicKey>>,
}

impl MemoryKeyRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyRegistry for MemoryKeyRegistry {
    async fn upsert(&self, key: RegisteredPublicKey) -> Result<()> {
        self.keys.write().insert(key.address, key);
        Ok(())
    }

    async fn get(&self, address: &Address) -> Result<Option<RegisteredPublicKey>> {
        Ok(self.keys.read().get(address).cloned())
    }
}

// ============================================================================
// TESTS
// ============================================================================
