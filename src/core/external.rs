//! External collaborator seams: attachment byte storage and AI analysis.
//!
//! Both sit outside the engine's transactional boundary. Attachment-store
//! failures surface to the caller unchanged; insight-provider failures are
//! absorbed by the report compiler (the analysis block is simply omitted).

use crate::core::error::QcError;
use crate::core::model::{Attachment, MediaKind};
use crate::core::time;
use serde_json::Value as JsonValue;
use std::fs;
use std::path::PathBuf;

pub trait AttachmentStore: Send + Sync {
    /// Stores the bytes and returns the attachment reference to record.
    fn upload(&self, bytes: &[u8], file_name: &str, kind: MediaKind)
    -> Result<Attachment, QcError>;
    fn delete(&self, attachment: &Attachment) -> Result<(), QcError>;
}

pub trait InsightProvider: Send + Sync {
    /// Blocking network call; the report compiler bounds it with a timeout.
    fn analyze(&self, payload: &JsonValue) -> Result<String, QcError>;
}

/// Provider used when no analysis backend is configured. The compiler treats
/// the error as "no analysis available" and proceeds.
pub struct NullInsightProvider;

impl InsightProvider for NullInsightProvider {
    fn analyze(&self, _payload: &JsonValue) -> Result<String, QcError> {
        Err(QcError::ExternalService(
            "no insight provider configured".to_string(),
        ))
    }
}

/// Fixed-text provider for deterministic runs and tests.
pub struct StaticInsightProvider {
    text: String,
}

impl StaticInsightProvider {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
        }
    }
}

impl InsightProvider for StaticInsightProvider {
    fn analyze(&self, _payload: &JsonValue) -> Result<String, QcError> {
        Ok(self.text.clone())
    }
}

/// Local-directory attachment store. Files land under `root/` with a ULID
/// prefix so repeated uploads of the same name never collide.
pub struct DirAttachmentStore {
    root: PathBuf,
}

impl DirAttachmentStore {
    pub fn new(root: PathBuf) -> Result<Self, QcError> {
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }
}

impl AttachmentStore for DirAttachmentStore {
    fn upload(
        &self,
        bytes: &[u8],
        file_name: &str,
        kind: MediaKind,
    ) -> Result<Attachment, QcError> {
        let id = time::new_event_id();
        let stored = self.root.join(format!("{}_{}", id, file_name));
        fs::write(&stored, bytes)
            .map_err(|e| QcError::ExternalService(format!("attachment write failed: {}", e)))?;
        Ok(Attachment {
            id,
            file_name: file_name.to_string(),
            storage_path: stored.to_string_lossy().to_string(),
            kind,
        })
    }

    fn delete(&self, attachment: &Attachment) -> Result<(), QcError> {
        fs::remove_file(&attachment.storage_path)
            .map_err(|e| QcError::ExternalService(format!("attachment delete failed: {}", e)))
    }
}
