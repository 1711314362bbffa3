//! # Storage Module
//!
//! Collaborator interfaces for blobs, share records and registered keys, plus
//! two bundled implementations.
//!
//! ## Storage Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         STORAGE SYSTEM                                  │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  BlobStore                                                      │   │
//! │  │  ─────────                                                       │   │
//! │  │  put(bytes) → BlobRef, get(ref) → bytes (byte-exact)           │   │
//! │  │  Only ever sees ciphertext.                                    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  ShareStore                                                     │   │
//! │  │  ──────────                                                      │   │
//! │  │  insert, get, mark_claimed (conditional), purge_expired        │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  KeyRegistry                                                    │   │
//! │  │  ───────────                                                     │   │
//! │  │  upsert (last write wins), get(address)                        │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  Implementations:                                                      │
//! │  • memory: RwLock<HashMap> per collection (tests, embedding)           │
//! │  • sqlite: records in SQLite, blobs as files                           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::crypto::Address;
use crate::error::Result;
use crate::share::{RegisteredPublicKey, ShareRecord};

mod memory;
mod schema;
mod sqlite;

pub use memory::{MemoryBlobStore, MemoryKeyRegistry, MemoryShareStore};
pub use sqlite::SqliteStore;

/// Opaque handle to a stored blob
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobRef(Uuid);

impl BlobRef {
    /// A fresh random reference
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing identifier
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Underlying identifier
    pub fn id(&self) -> &Uuid {
        &self.0
    }
}

impl Default for BlobRef {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BlobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stores encrypted blobs
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes and return a reference to them
    async fn put(&self, bytes: Vec<u8>) -> Result<BlobRef>;

    /// Fetch exactly the bytes that were stored
    async fn get(&self, blob: &BlobRef) -> Result<Vec<u8>>;

    /// Remove a blob; missing blobs are not an error
    async fn delete(&self, blob: &BlobRef) -> Result<()>;
}

/// Stores share records
#[async_trait]
pub trait ShareStore: Send + Sync {
    /// Insert a new share
    async fn insert(&self, share: ShareRecord) -> Result<()>;

    /// Look up a share by id
    async fn get(&self, id: &Uuid) -> Result<Option<ShareRecord>>;

    /// Set `claimed_at` if and only if it is still unset
    ///
    /// Returns `true` when this call made the transition, `false` when the
    /// share was already claimed. Fails with `NotFound` for unknown ids.
    /// Implementations must make the check and the write one atomic step.
    async fn mark_claimed(&self, id: &Uuid, at: DateTime<Utc>) -> Result<bool>;

    /// Delete every share whose expiry is before `now`, returning them
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<Vec<ShareRecord>>;
}

/// Stores one registered public key per address
#[async_trait]
pub trait KeyRegistry: Send + Sync {
    /// Insert or replace the key for `key.address`
    async fn upsert(&self, key: RegisteredPublicKey) -> Result<()>;

    /// Look up the key registered for an address
    async fn get(&self, address: &Address) -> Result<Option<RegisteredPublicKey>>;
}
