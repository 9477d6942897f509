//! Store file format and crash-safe writes.
//!
//! Layout: 8-byte magic, u16 LE format version, then two length-prefixed
//! MessagePack frames. The first frame is the [`PersistedStoreMetadata`] header,
//! the second holds the records, so metadata can be read without decoding the
//! body.

use super::record::Record;
use super::store::RecordStore;
use crate::core::{Result, VaultError};
use crate::schema::{SchemaFingerprint, SchemaVersion};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

const STORE_MAGIC: &[u8; 8] = b"NVSTORE\0";
pub const STORE_FORMAT_VERSION: u16 = 1;
const MAX_FRAME_LEN: usize = 1 << 30;

// ============================================================================
// Metadata header
// ============================================================================

/// Identifies which schema version a store file currently conforms to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedStoreMetadata {
    pub schema_identifier: String,
    pub entity_fingerprints: SchemaFingerprint,
    pub written_at: DateTime<Utc>,
    pub record_count: usize,
}

impl PersistedStoreMetadata {
    pub fn for_store(store: &RecordStore) -> Self {
        Self {
            schema_identifier: store.schema().identifier.clone(),
            entity_fingerprints: store.schema().fingerprint(),
            written_at: Utc::now(),
            record_count: store.len(),
        }
    }

    pub fn matches(&self, schema: &SchemaVersion) -> bool {
        self.entity_fingerprints == schema.fingerprint()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoreBody {
    records: Vec<Record>,
}

// ============================================================================
// Store file
// ============================================================================

/// One addressable store location on disk.
#[derive(Debug, Clone)]
pub struct StoreFile {
    path: PathBuf,
}

impl StoreFile {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Reads only the header frame.
    pub fn read_metadata(&self) -> Result<PersistedStoreMetadata> {
        let mut reader = self.open()?;
        self.read_preamble(&mut reader)?;
        let header = self.read_frame(&mut reader, "header")?;
        rmp_serde::from_slice(&header)
            .map_err(|e| self.unreadable(format!("corrupt header: {}", e)))
    }

    /// Reads the whole file and rebuilds a [`RecordStore`] bound to `schema`.
    ///
    /// Fails with `StoreUnreadable` when the file was written under a different layout.
    pub fn load(&self, schema: &SchemaVersion) -> Result<RecordStore> {
        let mut reader = self.open()?;
        self.read_preamble(&mut reader)?;
        let header = self.read_frame(&mut reader, "header")?;
        let metadata: PersistedStoreMetadata = rmp_serde::from_slice(&header)
            .map_err(|e| self.unreadable(format!("corrupt header: {}", e)))?;
        if !metadata.matches(schema) {
            return Err(self.unreadable(format!(
                "written under schema '{}', expected '{}'",
                metadata.schema_identifier, schema.identifier
            )));
        }

        let body = self.read_frame(&mut reader, "body")?;
        let body: StoreBody = rmp_serde::from_slice(&body)
            .map_err(|e| self.unreadable(format!("corrupt body: {}", e)))?;
        if body.records.len() != metadata.record_count {
            return Err(self.unreadable(format!(
                "header declares {} records, body holds {}",
                metadata.record_count,
                body.records.len()
            )));
        }

        RecordStore::from_records(schema.clone(), body.records)
            .map_err(|e| self.unreadable(e.to_string()))
    }

    /// Writes `store` next to the target path and renames it into place, so the
    /// target is either the old file or the complete new one.
    pub fn save(&self, store: &RecordStore) -> Result<PersistedStoreMetadata> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent)
            .map_err(|e| VaultError::IoError(format!("Failed to create store directory: {}", e)))?;

        let metadata = PersistedStoreMetadata::for_store(store);
        let header = rmp_serde::to_vec_named(&metadata)
            .map_err(|e| VaultError::Serialization(format!("Failed to serialize header: {}", e)))?;
        let body = StoreBody {
            records: store.records().cloned().collect(),
        };
        let body = rmp_serde::to_vec_named(&body)
            .map_err(|e| VaultError::Serialization(format!("Failed to serialize records: {}", e)))?;

        let temp = NamedTempFile::new_in(&parent)
            .map_err(|e| VaultError::IoError(format!("Failed to create temp file: {}", e)))?;
        {
            let mut writer = BufWriter::new(temp.as_file());
            writer.write_all(STORE_MAGIC)?;
            writer.write_all(&STORE_FORMAT_VERSION.to_le_bytes())?;
            write_frame(&mut writer, &header)?;
            write_frame(&mut writer, &body)?;
            writer
                .flush()
                .map_err(|e| VaultError::IoError(format!("Failed to flush store: {}", e)))?;
        }
        temp.as_file()
            .sync_all()
            .map_err(|e| VaultError::IoError(format!("Failed to sync store: {}", e)))?;
        temp.persist(&self.path).map_err(|e| {
            VaultError::IoError(format!("Failed to move store into place: {}", e.error))
        })?;

        Ok(metadata)
    }

    pub fn remove(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path).map_err(|e| {
                VaultError::IoError(format!("Failed to delete '{}': {}", self.path.display(), e))
            })?;
        }
        Ok(())
    }

    fn open(&self) -> Result<BufReader<File>> {
        let file = File::open(&self.path).map_err(|e| self.unreadable(e))?;
        Ok(BufReader::new(file))
    }

    fn read_preamble(&self, reader: &mut impl Read) -> Result<()> {
        let mut magic = [0u8; 8];
        reader
            .read_exact(&mut magic)
            .map_err(|_| self.unreadable("file too short for a store header"))?;
        if &magic != STORE_MAGIC {
            return Err(self.unreadable("unrecognized format tag"));
        }

        let mut version = [0u8; 2];
        reader
            .read_exact(&mut version)
            .map_err(|_| self.unreadable("missing format version"))?;
        let version = u16::from_le_bytes(version);
        if version != STORE_FORMAT_VERSION {
            return Err(self.unreadable(format!("unsupported format version {}", version)));
        }
        Ok(())
    }

    fn read_frame(&self, reader: &mut impl Read, what: &str) -> Result<Vec<u8>> {
        let mut len_bytes = [0u8; 4];
        reader
            .read_exact(&mut len_bytes)
            .map_err(|e| self.unreadable(format!("failed to read {} length: {}", what, e)))?;
        let len = u32::from_le_bytes(len_bytes) as usize;
        if len > MAX_FRAME_LEN {
            return Err(self.unreadable(format!("{} frame of {} bytes is implausible", what, len)));
        }
        // Allocation follows the bytes present, not the declared length.
        let mut data = Vec::new();
        reader
            .by_ref()
            .take(len as u64)
            .read_to_end(&mut data)
            .map_err(|e| self.unreadable(format!("failed to read {}: {}", what, e)))?;
        if data.len() != len {
            return Err(self.unreadable(format!(
                "truncated {}: expected {} bytes, found {}",
                what,
                len,
                data.len()
            )));
        }
        Ok(data)
    }

    fn unreadable(&self, reason: impl ToString) -> VaultError {
        VaultError::unreadable(&self.path, reason)
    }
}

fn write_frame(writer: &mut impl Write, data: &[u8]) -> Result<()> {
    let len = u32::try_from(data.len()).map_err(|_| {
        VaultError::Serialization(format!("frame of {} bytes is too large", data.len()))
    })?;
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(data)?;
    Ok(())
}
