//! Local persistence of trust material
//!
//! The persisted copy is the authority across restarts and may be updated by
//! another process; the manager reloads it when it is newer than memory.

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{TrustError, TrustResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSnapshot {
    pub version: String,
    pub last_check: DateTime<Utc>,
    pub payload: Vec<u8>,
}

#[async_trait]
pub trait TrustDataStore: Send + Sync {
    /// # Errors
    ///
    /// Returns [`TrustError::Storage`] or [`TrustError::Serialization`] when a
    /// persisted copy exists but cannot be read.
    async fn load(&self) -> TrustResult<Option<StoredSnapshot>>;

    /// Replace the persisted copy. A failure leaves the previous copy intact.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::Storage`] when the write fails.
    async fn save(&self, snapshot: &StoredSnapshot) -> TrustResult<()>;

    /// Record a successful check that found no newer version.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::Storage`] when the write fails.
    async fn mark_checked(&self, version: &str, last_check: DateTime<Utc>) -> TrustResult<()>;
}

/// On-disk document format
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredDocument {
    version: String,
    last_check: DateTime<Utc>,
    payload: String,
}

impl StoredDocument {
    fn from_snapshot(snapshot: &StoredSnapshot) -> Self {
        Self {
            version: snapshot.version.clone(),
            last_check: snapshot.last_check,
            payload: general_purpose::STANDARD.encode(&snapshot.payload),
        }
    }

    fn into_snapshot(self) -> TrustResult<StoredSnapshot> {
        let payload = general_purpose::STANDARD
            .decode(self.payload.as_bytes())
            .map_err(|e| TrustError::Serialization(format!("Invalid stored payload: {}", e)))?;
        Ok(StoredSnapshot {
            version: self.version,
            last_check: self.last_check,
            payload,
        })
    }
}

/// One JSON document per trust material under a cache directory
#[derive(Debug, Clone)]
pub struct FileTrustDataStore {
    path: PathBuf,
}

impl FileTrustDataStore {
    pub fn new(cache_dir: impl AsRef<Path>, material: &str) -> Self {
        Self {
            path: cache_dir.as_ref().join(format!("{}.json", material)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn write_atomically(&self, document: &StoredDocument) -> TrustResult<()> {
        let bytes = serde_json::to_vec(document)?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || persist_atomically(&path, &bytes))
            .await
            .map_err(|e| TrustError::Storage(format!("Store write task failed: {}", e)))?
    }

    async fn read_document(&self) -> TrustResult<Option<StoredDocument>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Write to a uniquely named sibling and rename it over `path`, so readers
/// and concurrent writers only ever see complete documents
fn persist_atomically(path: &Path, bytes: &[u8]) -> TrustResult<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".trust-")
        .suffix(".tmp")
        .tempfile_in(parent)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    // On failure the temp file is removed when the error drops it
    tmp.persist(path).map_err(|e| TrustError::from(e.error))?;
    Ok(())
}

#[async_trait]
impl TrustDataStore for FileTrustDataStore {
    async fn load(&self) -> TrustResult<Option<StoredSnapshot>> {
        self.read_document()
            .await?
            .map(StoredDocument::into_snapshot)
            .transpose()
    }

    async fn save(&self, snapshot: &StoredSnapshot) -> TrustResult<()> {
        self.write_atomically(&StoredDocument::from_snapshot(snapshot))
            .await
    }

    async fn mark_checked(&self, version: &str, last_check: DateTime<Utc>) -> TrustResult<()> {
        let Some(mut document) = self.read_document().await? else {
            return Err(TrustError::Storage(format!(
                "No persisted copy at {} to mark as checked",
                self.path.display()
            )));
        };
        if document.version != version {
            return Err(TrustError::Storage(format!(
                "Persisted version {} does not match checked version {}",
                document.version, version
            )));
        }
        document.last_check = last_check;
        self.write_atomically(&document).await
    }
}

/// Process-local store for tests and embedded use
#[derive(Debug, Default)]
pub struct InMemoryTrustDataStore {
    snapshot: Mutex<Option<StoredSnapshot>>,
}

impl InMemoryTrustDataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: StoredSnapshot) -> Self {
        Self {
            snapshot: Mutex::new(Some(snapshot)),
        }
    }

    /// Replace the stored copy, as another process sharing the cache would
    pub fn replace(&self, snapshot: StoredSnapshot) {
        *self.snapshot.lock() = Some(snapshot);
    }

    pub fn current(&self) -> Option<StoredSnapshot> {
        self.snapshot.lock().clone()
    }
}

#[async_trait]
impl TrustDataStore for InMemoryTrustDataStore {
    async fn load(&self) -> TrustResult<Option<StoredSnapshot>> {
        Ok(self.snapshot.lock().clone())
    }

    async fn save(&self, snapshot: &StoredSnapshot) -> TrustResult<()> {
        *self.snapshot.lock() = Some(snapshot.clone());
        Ok(())
    }

    async fn mark_checked(&self, version: &str, last_check: DateTime<Utc>) -> TrustResult<()> {
        let mut guard = self.snapshot.lock();
        match guard.as_mut() {
            Some(snapshot) if snapshot.version == version => {
                snapshot.last_check = last_check;
                Ok(())
            }
            _ => Err(TrustError::Storage(format!(
                "No stored copy with version {} to mark as checked",
                version
            ))),
        }
    }
}
