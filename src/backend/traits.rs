//! Collaborator contract for the document-processing backend

use async_trait::async_trait;

use super::types::{ApplyEditsReport, BackendError, DocumentDescriptor, TaskStatusReport, UploadReceipt};
use crate::diff::SavePayload;
use crate::model::ExtractionResult;

pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Remote document store and extraction service.
///
/// Every call is a single request; retries are never attempted here.
#[async_trait]
pub trait DocumentBackend: Send + Sync {
    /// Submit a file and start extraction
    async fn upload(&self, file_name: &str, bytes: Vec<u8>) -> BackendResult<UploadReceipt>;

    /// Current status of an extraction task
    async fn task_status(&self, task_id: &str) -> BackendResult<TaskStatusReport>;

    /// Finalized document record
    async fn fetch_document(&self, document_id: &str) -> BackendResult<DocumentDescriptor>;

    /// Extracted text tree of every page
    async fn extract_text(&self, document_id: &str) -> BackendResult<ExtractionResult>;

    /// Apply an edit batch, all or nothing
    async fn apply_edits(&self, document_id: &str, payload: &SavePayload) -> BackendResult<ApplyEditsReport>;

    async fn list_documents(&self) -> BackendResult<Vec<DocumentDescriptor>>;

    async fn delete_document(&self, document_id: &str) -> BackendResult<()>;
}
