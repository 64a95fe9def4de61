//! Backend wire types and errors

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::ingestion::TaskStatus;

// ============================================================================
// Records
// ============================================================================

/// Response to a successful upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReceipt {
    #[serde(deserialize_with = "id_string")]
    pub document_id: String,
    #[serde(deserialize_with = "id_string")]
    pub task_id: String,
}

/// Task status poll response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatusReport {
    #[serde(default, deserialize_with = "id_string_opt")]
    pub task_id: Option<String>,
    #[serde(deserialize_with = "task_status")]
    pub status: TaskStatus,
    /// Opaque detail, normally only present on failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Stored document record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentDescriptor {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    /// Storage path of the renderable file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// Absolute URL of the renderable file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl DocumentDescriptor {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            file: None,
            file_url: None,
            filename: None,
            uploaded_at: None,
            updated_at: None,
        }
    }

    /// Best reference to the renderable file
    pub fn file_ref(&self) -> Option<&str> {
        self.file_url.as_deref().or(self.file.as_deref())
    }

    pub fn display_name(&self) -> &str {
        if !self.title.is_empty() {
            &self.title
        } else {
            self.filename.as_deref().unwrap_or(&self.id)
        }
    }
}

/// Document listing, either a bare array or wrapped in `data`
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DocumentList {
    Bare(Vec<DocumentDescriptor>),
    Wrapped { data: Vec<DocumentDescriptor> },
}

impl DocumentList {
    pub fn into_vec(self) -> Vec<DocumentDescriptor> {
        match self {
            DocumentList::Bare(docs) | DocumentList::Wrapped { data: docs } => docs,
        }
    }
}

/// Acknowledgement of an applied edit batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyEditsReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// ============================================================================
// Errors
// ============================================================================

/// Errors at the collaborator boundary
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    /// Network failure or server unreachable
    #[error("Transport error: {0}")]
    Transport(String),

    /// Non-success HTTP status
    #[error("Backend returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body did not match the expected shape
    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Extraction requested before processing finished
    #[error("Document not ready: {0}")]
    NotReady(String),

    /// Request reached the backend but was refused in the response body
    #[error("Rejected by backend: {0}")]
    Rejected(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            BackendError::Decode(e.to_string())
        } else {
            BackendError::Transport(e.to_string())
        }
    }
}

// ============================================================================
// Serde helpers
// ============================================================================

/// Accept ids sent either as JSON strings or numbers
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(i64),
}

impl From<RawId> for String {
    fn from(id: RawId) -> Self {
        match id {
            RawId::Text(s) => s,
            RawId::Number(n) => n.to_string(),
        }
    }
}

fn id_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    RawId::deserialize(deserializer).map(String::from)
}

fn id_string_opt<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<RawId>::deserialize(deserializer)?.map(String::from))
}

fn task_status<'de, D: Deserializer<'de>>(deserializer: D) -> Result<TaskStatus, D::Error> {
    let raw = String::deserialize(deserializer)?;
    Ok(TaskStatus::from_wire(&raw))
}
