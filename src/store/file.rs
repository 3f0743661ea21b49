//! File-backed state store.
//!
//! Each record lives in `<states>/<encoded id>.json`. Writes are staged as
//! `<encoded id>.json.<pid>.<seq>.tmp` beside the target and renamed into place,
//! so a reader (this process or a peer sharing the directory) never observes a
//! half-written record. Staging in the states directory keeps the rename on one
//! filesystem whatever the temp role points at; listing skips `.tmp` files.
//!
//! Identifiers are opaque, so they are encoded into filenames: ASCII letters,
//! digits, `-` and `_` are kept, every other byte becomes `%XX`. The encoded
//! form never contains `.` or a path separator.

use crate::config::StoragePaths;
use crate::error::StorageError;
use crate::store::StateStore;
use crate::types::{StateID, StateRecord};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

const RECORD_EXTENSION: &str = "json";

static TEMP_SEQUENCE: AtomicU64 = AtomicU64::new(0);

pub struct FileStateStore {
    paths: StoragePaths,
}

impl FileStateStore {
    pub fn new(paths: StoragePaths) -> Self {
        Self { paths }
    }

    /// Store using the default directory layout under `root`
    pub fn under(root: &Path) -> Self {
        Self::new(StoragePaths::under(root))
    }

    pub fn paths(&self) -> &StoragePaths {
        &self.paths
    }

    /// Location of the record file for `id`
    pub fn path_for(&self, id: &str) -> Result<PathBuf, StorageError> {
        if id.is_empty() {
            return Err(StorageError::InvalidId(id.to_string()));
        }
        Ok(self
            .paths
            .states
            .join(format!("{}.{}", encode_id(id), RECORD_EXTENSION)))
    }

    fn temp_path_for(&self, id: &str) -> PathBuf {
        let sequence = TEMP_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        self.paths.states.join(format!(
            "{}.{}.{}.{}.tmp",
            encode_id(id),
            RECORD_EXTENSION,
            std::process::id(),
            sequence
        ))
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn initialize_directories(&self) -> Result<(), StorageError> {
        for dir in self.paths.all() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| StorageError::io(dir, e))?;
        }
        debug!(states = %self.paths.states.display(), "Storage directories ready");
        Ok(())
    }

    async fn write_record(&self, record: &StateRecord) -> Result<(), StorageError> {
        let target = self.path_for(&record.id)?;
        let content = serde_json::to_vec_pretty(record)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        let temp = self.temp_path_for(&record.id);
        tokio::fs::write(&temp, &content)
            .await
            .map_err(|e| StorageError::io(&temp, e))?;
        if let Err(e) = tokio::fs::rename(&temp, &target).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(StorageError::io(&target, e));
        }

        debug!(
            state_id = %record.id,
            version = record.version,
            path = %target.display(),
            "Record persisted"
        );
        Ok(())
    }

    async fn read_record(&self, id: &str) -> Result<Option<StateRecord>, StorageError> {
        let path = self.path_for(id)?;
        let content = match tokio::fs::read(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::io(&path, e)),
        };

        let record: StateRecord =
            serde_json::from_slice(&content).map_err(|e| StorageError::Corrupt {
                id: id.to_string(),
                reason: e.to_string(),
            })?;
        if record.id != id {
            return Err(StorageError::Corrupt {
                id: id.to_string(),
                reason: format!("file holds record for {:?}", record.id),
            });
        }
        Ok(Some(record))
    }

    async fn list_ids(&self) -> Result<Vec<StateID>, StorageError> {
        let dir = &self.paths.states;
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::io(dir, e)),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StorageError::io(dir, e))?
        {
            let path = entry.path();
            if path.extension() != Some(std::ffi::OsStr::new(RECORD_EXTENSION)) {
                continue;
            }
            match path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(decode_id)
            {
                Some(id) => ids.push(id),
                None => warn!(path = %path.display(), "Skipping record with undecodable name"),
            }
        }

        ids.sort();
        Ok(ids)
    }

    async fn delete_record(&self, id: &str) -> Result<bool, StorageError> {
        let path = self.path_for(id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::io(&path, e)),
        }
    }
}

fn encode_id(id: &str) -> String {
    let mut encoded = String::with_capacity(id.len());
    for byte in id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{:02X}", byte));
        }
    }
    encoded
}

fn decode_id(encoded: &str) -> Option<StateID> {
    let bytes = encoded.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = encoded.get(i + 1..i + 3)?;
            decoded.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            decoded.push(bytes[i]);
            i += 1;
        }
    }
    if decoded.is_empty() {
        return None;
    }
    String::from_utf8(decoded).ok()
}
