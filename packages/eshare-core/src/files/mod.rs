//! # File Packing
//!
//! Concatenates the files of a share into one buffer, described by a
//! manifest of `{name, size, type, offset}` entries.
//!
//! ## Layout
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         PACKED BUFFER                                   │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  offset 0            offset 10   offset 10                 offset 510  │
//! │  │                   │           │                         │           │
//! │  ▼                   ▼           ▼                         ▼           │
//! │  ┌───────────────────┬┬──────────────────────────────────────┐         │
//! │  │  a.txt (10 bytes) ││  c.bin (500 bytes)                   │         │
//! │  └───────────────────┴┴──────────────────────────────────────┘         │
//! │                      ▲                                                  │
//! │                      └── b.txt (0 bytes)                                │
//! │                                                                         │
//! │  Manifest:                                                             │
//! │  {"files": [{"name","size","type","offset"}, ...], "totalSize": 510}  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The manifest is stored next to the ciphertext, never inside it.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One file's slot in the packed buffer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Original filename
    pub name: String,
    /// Size in bytes
    pub size: u64,
    /// MIME type as reported by the sender
    #[serde(rename = "type")]
    pub mime_type: String,
    /// Byte offset in the packed buffer
    pub offset: u64,
}

/// Describes how a set of files was packed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileManifest {
    /// Entries in packing order
    pub files: Vec<ManifestEntry>,
    /// Sum of all entry sizes; equals the packed buffer length
    pub total_size: u64,
}

/// A single file with its contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedFile {
    /// Filename
    pub name: String,
    /// MIME type
    pub mime_type: String,
    /// Raw bytes
    pub data: Vec<u8>,
}

impl SharedFile {
    /// Create a new file
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data,
        }
    }
}

impl FileManifest {
    /// Number of files described
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the manifest describes no files
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Check the manifest against a buffer of `buffer_len` bytes
    ///
    /// Entries must be contiguous starting at zero, stay inside the buffer,
    /// and `total_size` must equal both the sum of sizes and `buffer_len`.
    pub fn validate(&self, buffer_len: u64) -> Result<()> {
        if self.total_size != buffer_len {
            return Err(Error::ManifestMismatch(format!(
                "totalSize is {} but buffer holds {} bytes",
                self.total_size, buffer_len
            )));
        }

        let mut expected_offset = 0u64;
        for (i, entry) in self.files.iter().enumerate() {
            if entry.offset != expected_offset {
                return Err(Error::ManifestMismatch(format!(
                    "entry {} ({}) starts at {}, expected {}",
                    i, entry.name, entry.offset, expected_offset
                )));
            }
            let end = entry.offset.checked_add(entry.size).ok_or_else(|| {
                Error::ManifestMismatch(format!("entry {} ({}) overflows", i, entry.name))
            })?;
            if end > buffer_len {
                return Err(Error::ManifestMismatch(format!(
                    "entry {} ({}) ends at {} beyond buffer of {} bytes",
                    i, entry.name, end, buffer_len
                )));
            }
            expected_offset = end;
        }

        if expected_offset != self.total_size {
            return Err(Error::ManifestMismatch(format!(
                "entries cover {} bytes but totalSize is {}",
                expected_offset, self.total_size
            )));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Packing
// ---------------------------------------------------------------------------

/// Concatenate files in input order and build their manifest
///
/// Deterministic: the same file list always gives the same buffer and
/// manifest. No size limit is applied here.
pub fn pack(files: &[SharedFile]) -> (Vec<u8>, FileManifest) {
    let total: usize = files.iter().map(|f| f.data.len()).sum();
    let mut buffer = Vec::with_capacity(total);
    let mut entries = Vec::with_capacity(files.len());

    for file in files {
        entries.push(ManifestEntry {
            name: file.name.clone(),
            size: file.data.len() as u64,
            mime_type: file.mime_type.clone(),
            offset: buffer.len() as u64,
        });
        buffer.extend_from_slice(&file.data);
    }

    let manifest = FileManifest {
        files: entries,
        total_size: buffer.len() as u64,
    };

    (buffer, manifest)
}

// ---------------------------------------------------------------------------
// Unpacking
// ---------------------------------------------------------------------------

/// Split a packed buffer back into files
///
/// The manifest is validated before any slicing, so an inconsistent manifest
/// yields `ManifestMismatch` rather than a panic or partial output.
pub fn unpack(buffer: &[u8], manifest: &FileManifest) -> Result<Vec<SharedFile>> {
    manifest.validate(buffer.len() as u64)?;

    manifest
        .files
        .iter()
        .map(|entry| {
            let start = usize::try_from(entry.offset)
                .map_err(|_| Error::ManifestMismatch(format!("offset of {} too large", entry.name)))?;
            let size = usize::try_from(entry.size)
                .map_err(|_| Error::ManifestMismatch(format!("size of {} too large", entry.name)))?;
            let data = start
                .checked_add(size)
                .and_then(|end| buffer.get(start..end))
                .ok_or_else(|| Error::ManifestMismatch(format!("{} out of bounds", entry.name)))?;

            Ok(SharedFile {
                name: entry.name.clone(),
                mime_type: entry.mime_type.clone(),
                data: data.to_vec(),
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_files() -> Vec<SharedFile> {
        vec![
            SharedFile::new("a.txt", "text/plain", vec![1u8; 10]),
            SharedFile::new("b.txt", "text/plain", Vec::new()),
            SharedFile::new("c.bin", "application/octet-stream", vec![3u8; 500]),
        ]
    }

    #[test]
    fn test_pack_offsets() {
        let (buffer, manifest) = pack(&sample_files());

        assert_eq!(buffer.len(), 510);
        assert_eq!(manifest.total_size, 510);
        let offsets: Vec<u64> = manifest.files.iter().map(|e| e.offset).collect();
        assert_eq!(offsets, vec![0, 10, 10]);
    }

    #[test]
    fn test_pack_unpack_round_trip() {
        let files = sample_files();
        let (buffer, manifest) = pack(&files);

        let unpacked = unpack(&buffer, &manifest).unwrap();
        assert_eq!(unpacked, files);
    }

    #[test]
    fn test_pack_is_deterministic() {
        let (b1, m1) = pack(&sample_files());
        let (b2, m2) = pack(&sample_files());
        assert_eq!(b1, b2);
        assert_eq!(m1, m2);
    }

    #[test]
    fn test_pack_empty_list() {
        let (buffer, manifest) = pack(&[]);
        assert!(buffer.is_empty());
        assert!(manifest.is_empty());
        assert!(unpack(&buffer, &manifest).unwrap().is_empty());
    }

    #[test]
    fn test_manifest_json_shape() {
        let (_, manifest) = pack(&sample_files()[..1]);
        let json = serde_json::to_value(&manifest).unwrap();

        assert_eq!(json["totalSize"], 10);
        assert_eq!(json["files"][0]["name"], "a.txt");
        assert_eq!(json["files"][0]["type"], "text/plain");
        assert_eq!(json["files"][0]["offset"], 0);

        let restored: FileManifest = serde_json::from_value(json).unwrap();
        assert_eq!(restored, manifest);
    }

    #[test]
    fn test_truncated_buffer_rejected() {
        let (buffer, manifest) = pack(&sample_files());

        let result = unpack(&buffer[..400], &manifest);
        assert!(matches!(result, Err(Error::ManifestMismatch(_))));
    }

    #[test]
    fn test_entry_beyond_buffer_rejected() {
        let (buffer, mut manifest) = pack(&sample_files());
        manifest.files[2].size = 10_000;

        assert!(matches!(
            unpack(&buffer, &manifest),
            Err(Error::ManifestMismatch(_))
        ));
    }

    #[test]
    fn test_overflowing_entry_rejected() {
        let (buffer, mut manifest) = pack(&sample_files());
        manifest.files[2].size = u64::MAX;

        assert!(matches!(
            unpack(&buffer, &manifest),
            Err(Error::ManifestMismatch(_))
        ));
    }

    #[test]
    fn test_gap_between_entries_rejected() {
        let (buffer, mut manifest) = pack(&sample_files());
        manifest.files[2].offset = 12;
        manifest.files[2].size = 498;

        let err = unpack(&buffer, &manifest).unwrap_err();
        assert!(err.to_string().contains("expected 10"), "Error: {}", err);
    }
}
