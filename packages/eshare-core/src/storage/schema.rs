//! # Database Schema
//!
//! SQL schema for the share and key tables.
//!
//! ## Schema Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         DATABASE SCHEMA                                 │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌──────────────────────┐              ┌──────────────────────┐        │
//! │  │        shares        │              │   registered_keys    │        │
//! │  ├──────────────────────┤              ├──────────────────────┤        │
//! │  │ id                   │              │ address              │        │
//! │  │ sender_address       │              │ public_key           │        │
//! │  │ sender_name          │              │ created_at           │        │
//! │  │ recipient_address    │─ ─ ─ ─ ─ ─ ─►└──────────────────────┘        │
//! │  │ recipient_name       │                                              │
//! │  │ blob_id              │──► blobs/<blob_id>.encrypted                 │
//! │  │ blob_size_bytes      │                                              │
//! │  │ file_manifest (JSON) │                                              │
//! │  │ encryption_mode      │                                              │
//! │  │ encrypted_key        │  legacy only                                 │
//! │  │ iv                   │                                              │
//! │  │ ephemeral_public_key │  e2e only                                    │
//! │  │ claimed_at           │  NULL until claimed                          │
//! │  │ created_at           │                                              │
//! │  │ expires_at           │                                              │
//! │  └──────────────────────┘                                              │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Timestamps are Unix milliseconds. Addresses are stored lowercased.

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// SQL to create all tables
pub const CREATE_TABLES: &str = r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY
);

-- Shares table
-- One row per share; key material columns follow the envelope record
CREATE TABLE IF NOT EXISTS shares (
    id TEXT PRIMARY KEY,
    sender_address TEXT NOT NULL,
    sender_name TEXT,
    recipient_address TEXT NOT NULL,
    recipient_name TEXT,
    blob_id TEXT NOT NULL,
    blob_size_bytes INTEGER NOT NULL,
    -- FileManifest as JSON
    file_manifest TEXT NOT NULL,
    -- 'legacy' or 'e2e'
    encryption_mode TEXT NOT NULL,
    encrypted_key TEXT,
    iv TEXT NOT NULL,
    ephemeral_public_key TEXT,
    claimed_at INTEGER,
    created_at INTEGER NOT NULL,
    expires_at INTEGER NOT NULL,
    CONSTRAINT mode_material CHECK (
        (encryption_mode = 'legacy' AND encrypted_key IS NOT NULL AND ephemeral_public_key IS NULL)
        OR (encryption_mode = 'e2e' AND encrypted_key IS NULL AND ephemeral_public_key IS NOT NULL)
    )
);
CREATE INDEX IF NOT EXISTS idx_shares_expires_at ON shares(expires_at);

-- Registered keys table
-- One derived public key per address, last write wins
CREATE TABLE IF NOT EXISTS registered_keys (
    address TEXT PRIMARY KEY,
    public_key TEXT NOT NULL,
    created_at INTEGER NOT NULL
);
"#;
