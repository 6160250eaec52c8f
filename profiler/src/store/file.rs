//! JSON-file durable store
//!
//! Layout under the data directory:
//!
//! ```text
//! content/<content-hash>.json      content record by hash
//! origins/<sha256(url)>.json       content record by origin URL
//! sessions/<session-id>.json
//! classifications/<session-id>.json
//! ```
//!
//! Files are written to a temporary sibling and renamed into place, so a
//! reader never sees a partial document.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{is_valid_session_id, DurableStore};
use crate::content::ContentHash;
use crate::error::{ProfilerError, Result};
use crate::model::{Classification, ContentRecord, Session};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocKind {
    Content,
    Origin,
    Session,
    Classification,
}

impl DocKind {
    fn subdir(&self) -> &'static str {
        match self {
            DocKind::Content => "content",
            DocKind::Origin => "origins",
            DocKind::Session => "sessions",
            DocKind::Classification => "classifications",
        }
    }
}

/// [`DurableStore`] persisting one JSON document per record
pub struct FileStore {
    base_dir: PathBuf,
    /// Serializes read-check-write sequences (session CAS, classification insert)
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        // Subdirectories are created lazily on first write
        Self {
            base_dir: base_dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn path_for(&self, kind: DocKind, id: &str) -> PathBuf {
        self.base_dir.join(kind.subdir()).join(format!("{}.json", id))
    }

    fn origin_id(url: &str) -> String {
        Sha256::digest(url.as_bytes())
            .iter()
            .map(|byte| format!("{:02x}", byte))
            .collect()
    }

    async fn read_doc<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>> {
        let bytes = match fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(ProfilerError::Persistence(format!(
                    "failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };
        let doc = serde_json::from_slice(&bytes).map_err(|e| {
            ProfilerError::Persistence(format!("corrupt document {}: {}", path.display(), e))
        })?;
        Ok(Some(doc))
    }

    async fn write_doc<T: Serialize>(&self, path: &Path, doc: &T) -> Result<()> {
        let dir = path
            .parent()
            .ok_or_else(|| ProfilerError::Persistence(format!("invalid path {}", path.display())))?;
        fs::create_dir_all(dir).await?;

        let content = serde_json::to_vec_pretty(doc)?;
        let tmp = dir.join(format!(".{}.tmp", Uuid::new_v4()));
        fs::write(&tmp, content).await?;
        if let Err(e) = fs::rename(&tmp, path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn read_record(&self, path: &Path) -> Result<Option<ContentRecord>> {
        match self.read_doc::<ContentRecord>(path).await? {
            Some(record) if record.is_expired() => {
                debug!("Content record {} expired, removing", path.display());
                if let Err(e) = fs::remove_file(path).await {
                    warn!("Failed to remove expired record {}: {}", path.display(), e);
                }
                Ok(None)
            }
            other => Ok(other),
        }
    }
}

#[async_trait]
impl DurableStore for FileStore {
    async fn get_by_url(&self, url: &str) -> Result<Option<ContentRecord>> {
        let path = self.path_for(DocKind::Origin, &Self::origin_id(url));
        self.read_record(&path).await
    }

    async fn get_by_hash(&self, hash: &ContentHash) -> Result<Option<ContentRecord>> {
        let path = self.path_for(DocKind::Content, hash.as_str());
        self.read_record(&path).await
    }

    async fn put(&self, record: &ContentRecord) -> Result<()> {
        let by_hash = self.path_for(DocKind::Content, record.content_hash.as_str());
        let by_origin = self.path_for(DocKind::Origin, &Self::origin_id(&record.url));
        self.write_doc(&by_hash, record).await?;
        self.write_doc(&by_origin, record).await?;
        debug!("Stored content record {} for {}", record.content_hash, record.url);
        Ok(())
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<Session>> {
        if !is_valid_session_id(session_id) {
            return Ok(None);
        }
        self.read_doc(&self.path_for(DocKind::Session, session_id))
            .await
    }

    async fn put_session(&self, session: &Session, expected_version: u64) -> Result<()> {
        if !is_valid_session_id(&session.session_id) {
            return Err(ProfilerError::InvalidInput(format!(
                "invalid session id '{}'",
                session.session_id
            )));
        }
        let path = self.path_for(DocKind::Session, &session.session_id);

        let _guard = self.write_lock.lock().await;
        let found = self
            .read_doc::<Session>(&path)
            .await?
            .map(|s| s.version)
            .unwrap_or(0);
        if found != expected_version {
            return Err(ProfilerError::SessionConflict {
                session_id: session.session_id.clone(),
                expected: expected_version,
                found,
            });
        }
        self.write_doc(&path, session).await
    }

    async fn get_classification(&self, session_id: &str) -> Result<Option<Classification>> {
        if !is_valid_session_id(session_id) {
            return Ok(None);
        }
        self.read_doc(&self.path_for(DocKind::Classification, session_id))
            .await
    }

    async fn put_classification(
        &self,
        classification: &Classification,
    ) -> Result<Classification> {
        if !is_valid_session_id(&classification.session_id) {
            return Err(ProfilerError::InvalidInput(format!(
                "invalid session id '{}'",
                classification.session_id
            )));
        }
        let path = self.path_for(DocKind::Classification, &classification.session_id);

        let _guard = self.write_lock.lock().await;
        if let Some(existing) = self.read_doc::<Classification>(&path).await? {
            return Ok(existing);
        }
        self.write_doc(&path, classification).await?;
        Ok(classification.clone())
    }
}
