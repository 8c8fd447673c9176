//! Per-document state: chapter pattern override, reading position and the
//! line count the position was taken against. One JSON file per document,
//! named by the SHA-256 of the canonical document path.

use crate::error::{ReaderError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

const RECORD_VERSION: u32 = 1;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter_pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_lines: Option<usize>,
}

/// Clones share one lock, so the progress thread and the session never
/// interleave a read-modify-write of the same record.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    dir: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl DocumentStore {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: state_dir.into().join("documents"),
            lock: Arc::new(Mutex::new(())),
        }
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// `~/.tome`, or `%USERPROFILE%\.tome` on Windows.
    pub fn default_location() -> Option<Self> {
        #[cfg(windows)]
        {
            if let Some(base) = std::env::var_os("USERPROFILE") {
                return Some(Self::new(PathBuf::from(base).join(".tome")));
            }
        }
        #[cfg(not(windows))]
        {
            if let Some(base) = std::env::var_os("HOME") {
                return Some(Self::new(PathBuf::from(base).join(".tome")));
            }
        }
        None
    }

    pub fn record_path(&self, document: &Path) -> PathBuf {
        let key = document_key(document);
        let digest = Sha256::digest(key.as_bytes());
        self.dir.join(format!("{digest:x}.json"))
    }

    /// Missing or unreadable records load as empty.
    pub fn load(&self, document: &Path) -> DocumentRecord {
        let _guard = self.guard();
        self.read_record(document)
    }

    fn read_record(&self, document: &Path) -> DocumentRecord {
        let file = self.record_path(document);
        let Ok(data) = fs::read(&file) else {
            return DocumentRecord::default();
        };
        match serde_json::from_slice::<DocumentRecord>(&data) {
            Ok(record) if record.version == RECORD_VERSION => record,
            Ok(record) => {
                tracing::debug!(
                    file = %file.display(),
                    version = record.version,
                    "ignoring document record with unknown version"
                );
                DocumentRecord::default()
            }
            Err(err) => {
                tracing::debug!(file = %file.display(), "ignoring unreadable document record: {err}");
                DocumentRecord::default()
            }
        }
    }

    pub fn save(&self, document: &Path, record: &DocumentRecord) -> Result<()> {
        let _guard = self.guard();
        self.write_record(document, record)
    }

    /// Writes a sibling temp file and renames it over the record, so a
    /// reader sees either the old or the new record in full.
    fn write_record(&self, document: &Path, record: &DocumentRecord) -> Result<()> {
        let file = self.record_path(document);
        fs::create_dir_all(&self.dir).map_err(|e| ReaderError::io(&self.dir, e))?;
        let mut record = record.clone();
        record.version = RECORD_VERSION;
        record.path = document_key(document);
        let data = serde_json::to_vec_pretty(&record).map_err(|source| ReaderError::Store {
            path: file.clone(),
            source,
        })?;
        let tmp = file.with_extension("json.tmp");
        fs::write(&tmp, data).map_err(|e| ReaderError::io(&tmp, e))?;
        fs::rename(&tmp, &file).map_err(|e| ReaderError::io(&file, e))
    }

    pub fn update(
        &self,
        document: &Path,
        change: impl FnOnce(&mut DocumentRecord),
    ) -> Result<DocumentRecord> {
        let _guard = self.guard();
        let mut record = self.read_record(document);
        change(&mut record);
        self.write_record(document, &record)?;
        Ok(record)
    }
}

fn document_key(document: &Path) -> String {
    document
        .canonicalize()
        .unwrap_or_else(|_| document.to_path_buf())
        .to_string_lossy()
        .to_string()
}
