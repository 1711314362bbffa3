//! SQLite-backed store for single-node deployments.
//!
//! Layout under the data directory:
//!
//! ```text
//! {DATA_DIR}/
//! ├── eshare.db                shares and registered keys
//! └── blobs/{uuid}.encrypted   ciphertext, byte-exact
//! ```
//!
//! Several processes may open the same directory. SQLite serializes their
//! writes, and the claim transition is a single conditional `UPDATE`, so a
//! share is released at most once across every handle.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use uuid::Uuid;

use super::schema;
use super::{BlobRef, BlobStore, KeyRegistry, ShareStore};
use crate::crypto::{Address, EncryptionPublicKey};
use crate::error::{Error, Result};
use crate::protocol::{EncryptionEnvelope, EnvelopeRecord};
use crate::share::{RegisteredPublicKey, ShareRecord};

const DATABASE_FILE: &str = "eshare.db";
const BLOBS_DIR: &str = "blobs";
const BLOB_EXTENSION: &str = "encrypted";

/// How long a writer waits for another process's lock before failing
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SHARE_COLUMNS: &str = "id, sender_address, sender_name, recipient_address, recipient_name, \
     blob_id, blob_size_bytes, file_manifest, encryption_mode, encrypted_key, iv, \
     ephemeral_public_key, claimed_at, created_at, expires_at";

/// Blob store, share store and key registry in one directory
pub struct SqliteStore {
    root: PathBuf,
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) a store rooted at `dir`
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let root = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(root.join(BLOBS_DIR))
            .await
            .map_err(|e| Error::StorageWriteError(format!("{}: {}", root.display(), e)))?;

        let db_path = root.join(DATABASE_FILE);
        let conn = Connection::open(&db_path)
            .map_err(|e| Error::DatabaseError(format!("Failed to open database: {}", e)))?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;

        let store = Self {
            root,
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;

        tracing::info!(path = %db_path.display(), journal_mode = %mode, "Opened share database");
        Ok(store)
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(schema::CREATE_TABLES)
            .map_err(|e| Error::DatabaseError(format!("Failed to create tables: {}", e)))?;
        conn.execute(
            "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
            params![schema::SCHEMA_VERSION],
        )?;

        let version: i32 = conn.query_row(
            "SELECT MAX(version) FROM schema_version",
            [],
            |row| row.get(0),
        )?;
        if version > schema::SCHEMA_VERSION {
            return Err(Error::DatabaseError(format!(
                "database schema version {} is newer than supported version {}",
                version,
                schema::SCHEMA_VERSION
            )));
        }

        tracing::debug!(version, "Database schema ready");
        Ok(())
    }

    fn blob_path(&self, blob: &BlobRef) -> PathBuf {
        self.root
            .join(BLOBS_DIR)
            .join(format!("{}.{}", blob, BLOB_EXTENSION))
    }

    // ========================================================================
    // SHARE OPERATIONS
    // ========================================================================

    fn insert_share(&self, share: &ShareRecord) -> Result<()> {
        let envelope = EnvelopeRecord::from(&share.envelope);
        let manifest = serde_json::to_string(&share.file_manifest)?;
        let size = i64::try_from(share.blob_size_bytes).map_err(|_| {
            Error::StorageWriteError(format!("blob size {} out of range", share.blob_size_bytes))
        })?;

        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO shares (
                id, sender_address, sender_name, recipient_address, recipient_name,
                blob_id, blob_size_bytes, file_manifest, encryption_mode, encrypted_key, iv,
                ephemeral_public_key, claimed_at, created_at, expires_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                share.id.to_string(),
                share.sender_address.to_string(),
                share.sender_name,
                share.recipient_address.to_string(),
                share.recipient_name,
                share.blob.to_string(),
                size,
                manifest,
                envelope.encryption_mode.to_string(),
                envelope.encrypted_key,
                envelope.iv,
                envelope.ephemeral_public_key,
                share.claimed_at.map(|t| t.timestamp_millis()),
                share.created_at.timestamp_millis(),
                share.expires_at.timestamp_millis(),
            ],
        )?;
        Ok(())
    }

    fn get_share(&self, id: &Uuid) -> Result<Option<ShareRecord>> {
        let row = {
            let conn = self.conn.lock();
            conn.query_row(
                &format!("SELECT {} FROM shares WHERE id = ?1", SHARE_COLUMNS),
                params![id.to_string()],
                ShareRow::read,
            )
            .optional()?
        };
        row.map(ShareRecord::try_from).transpose()
    }

    fn claim_share(&self, id: &Uuid, at: DateTime<Utc>) -> Result<bool> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE shares SET claimed_at = ?1 WHERE id = ?2 AND claimed_at IS NULL",
            params![at.timestamp_millis(), id.to_string()],
        )?;
        if changed == 1 {
            return Ok(true);
        }

        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM shares WHERE id = ?1)",
            params![id.to_string()],
            |row| row.get(0),
        )?;
        if exists {
            Ok(false)
        } else {
            Err(Error::NotFound(id.to_string()))
        }
    }

    fn take_expired(&self, now: DateTime<Utc>) -> Result<Vec<ShareRecord>> {
        let now_ms = now.timestamp_millis();

        let rows = {
            let mut conn = self.conn.lock();
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let mut stmt = tx.prepare(&format!(
                "SELECT {} FROM shares WHERE expires_at < ?1",
                SHARE_COLUMNS
            ))?;
            let rows = stmt
                .query_map(params![now_ms], ShareRow::read)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            drop(stmt);
            tx.execute("DELETE FROM shares WHERE expires_at < ?1", params![now_ms])?;
            tx.commit()?;
            rows
        };

        rows.into_iter().map(ShareRecord::try_from).collect()
    }

    // ========================================================================
    // KEY OPERATIONS
    // ========================================================================

    fn upsert_key(&self, key: &RegisteredPublicKey) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO registered_keys (address, public_key, created_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(address) DO UPDATE SET
                public_key = excluded.public_key,
                created_at = excluded.created_at",
            params![
                key.address.to_string(),
                key.public_key.to_hex(),
                key.created_at.timestamp_millis(),
            ],
        )?;
        Ok(())
    }

    fn get_key(&self, address: &Address) -> Result<Option<RegisteredPublicKey>> {
        let row = {
            let conn = self.conn.lock();
            conn.query_row(
                "SELECT public_key, created_at FROM registered_keys WHERE address = ?1",
                params![address.to_string()],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
            )
            .optional()?
        };

        match row {
            Some((public_key, created_at)) => Ok(Some(RegisteredPublicKey {
                address: *address,
                public_key: EncryptionPublicKey::from_hex(&public_key)?,
                created_at: from_millis(created_at)?,
            })),
            None => Ok(None),
        }
    }
}

/// A `shares` row before its columns are validated
struct ShareRow {
    id: String,
    sender_address: String,
    sender_name: Option<String>,
    recipient_address: String,
    recipient_name: Option<String>,
    blob_id: String,
    blob_size_bytes: i64,
    file_manifest: String,
    encryption_mode: String,
    encrypted_key: Option<String>,
    iv: String,
    ephemeral_public_key: Option<String>,
    claimed_at: Option<i64>,
    created_at: i64,
    expires_at: i64,
}

impl ShareRow {
    fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(ShareRow {
            id: row.get(0)?,
            sender_address: row.get(1)?,
            sender_name: row.get(2)?,
            recipient_address: row.get(3)?,
            recipient_name: row.get(4)?,
            blob_id: row.get(5)?,
            blob_size_bytes: row.get(6)?,
            file_manifest: row.get(7)?,
            encryption_mode: row.get(8)?,
            encrypted_key: row.get(9)?,
            iv: row.get(10)?,
            ephemeral_public_key: row.get(11)?,
            claimed_at: row.get(12)?,
            created_at: row.get(13)?,
            expires_at: row.get(14)?,
        })
    }
}

impl TryFrom<ShareRow> for ShareRecord {
    type Error = Error;

    fn try_from(row: ShareRow) -> Result<Self> {
        let envelope = EncryptionEnvelope::try_from(EnvelopeRecord {
            encryption_mode: row.encryption_mode.parse()?,
            encrypted_key: row.encrypted_key,
            iv: row.iv,
            ephemeral_public_key: row.ephemeral_public_key,
        })?;

        Ok(ShareRecord {
            id: parse_uuid(&row.id)?,
            sender_address: row.sender_address.parse()?,
            sender_name: row.sender_name,
            recipient_address: row.recipient_address.parse()?,
            recipient_name: row.recipient_name,
            blob: BlobRef::from_uuid(parse_uuid(&row.blob_id)?),
            blob_size_bytes: u64::try_from(row.blob_size_bytes).map_err(|_| {
                Error::StorageReadError(format!("negative blob size {}", row.blob_size_bytes))
            })?,
            file_manifest: serde_json::from_str(&row.file_manifest)?,
            envelope,
            claimed_at: row.claimed_at.map(from_millis).transpose()?,
            created_at: from_millis(row.created_at)?,
            expires_at: from_millis(row.expires_at)?,
        })
    }
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| Error::StorageReadError(format!("bad uuid {}: {}", s, e)))
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| Error::StorageReadError(format!("timestamp {} out of range", ms)))
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp_path = path.with_extension("tmp");

    if let Err(e) = tokio::fs::write(&tmp_path, bytes).await {
        tracing::error!(error = %e, path = %tmp_path.display(), "Failed to write temp file");
        return Err(Error::StorageWriteError(format!("{}: {}", tmp_path.display(), e)));
    }

    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        tracing::error!(error = %e, path = %path.display(), "Failed to rename temp file");
        if let Err(e) = tokio::fs::remove_file(&tmp_path).await {
            tracing::warn!(error = %e, path = %tmp_path.display(), "Failed to remove temp file");
        }
        return Err(Error::StorageWriteError(format!("{}: {}", path.display(), e)));
    }

    Ok(())
}

#[async_trait]
impl BlobStore for SqliteStore {
    async fn put(&self, bytes: Vec<u8>) -> Result<BlobRef> {
        let blob = BlobRef::new();
        write_atomic(&self.blob_path(&blob), &bytes).await?;
        tracing::debug!(blob = %blob, bytes = bytes.len(), "Blob stored");
        Ok(blob)
    }

    async fn get(&self, blob: &BlobRef) -> Result<Vec<u8>> {
        match tokio::fs::read(self.blob_path(blob)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(Error::BlobNotFound(blob.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, blob: &BlobRef) -> Result<()> {
        match tokio::fs::remove_file(self.blob_path(blob)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::StorageWriteError(e.to_string())),
        }
    }
}

#[async_trait]
impl ShareStore for SqliteStore {
    async fn insert(&self, share: ShareRecord) -> Result<()> {
        self.insert_share(&share)
    }

    async fn get(&self, id: &Uuid) -> Result<Option<ShareRecord>> {
        self.get_share(id)
    }

    async fn mark_claimed(&self, id: &Uuid, at: DateTime<Utc>) -> Result<bool> {
        self.claim_share(id, at)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<Vec<ShareRecord>> {
        self.take_expired(now)
    }
}

#[async_trait]
impl KeyRegistry for SqliteStore {
    async fn upsert(&self, key: RegisteredPublicKey) -> Result<()> {
        self.upsert_key(&key)
    }

    async fn get(&self, address: &Address) -> Result<Option<RegisteredPublicKey>> {
        self.get_key(address)
    }
}

// ============================================================================
// TESTS
// ============================================================================
