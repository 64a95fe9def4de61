//! In-memory backend for tests and offline use
//!
//! Responses are scripted per task; every call is recorded so tests can
//! assert on what was sent.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::traits::{BackendResult, DocumentBackend};
use super::types::{ApplyEditsReport, BackendError, DocumentDescriptor, TaskStatusReport, UploadReceipt};
use crate::diff::SavePayload;
use crate::ingestion::TaskStatus;
use crate::model::ExtractionResult;

#[derive(Default)]
struct MockInner {
    receipts: VecDeque<UploadReceipt>,
    upload_error: Option<BackendError>,
    /// Scripted replies per task id; the last one repeats once the queue drains
    statuses: HashMap<String, VecDeque<BackendResult<TaskStatusReport>>>,
    status_delay: HashMap<String, Duration>,
    documents: HashMap<String, DocumentDescriptor>,
    extractions: HashMap<String, ExtractionResult>,
    apply_error: Option<BackendError>,
    // Recorded calls
    uploads: Vec<String>,
    polls: Vec<String>,
    applied: Vec<(String, SavePayload)>,
    deleted: Vec<String>,
}

#[derive(Default)]
pub struct MockBackend {
    inner: Mutex<MockInner>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the receipt returned by the next upload
    pub fn push_receipt(&self, document_id: &str, task_id: &str) -> &Self {
        self.inner.lock().receipts.push_back(UploadReceipt {
            document_id: document_id.to_string(),
            task_id: task_id.to_string(),
        });
        self
    }

    pub fn fail_uploads(&self, error: BackendError) -> &Self {
        self.inner.lock().upload_error = Some(error);
        self
    }

    /// Script the status sequence for a task
    pub fn script_statuses(&self, task_id: &str, statuses: impl IntoIterator<Item = TaskStatus>) -> &Self {
        let replies = statuses
            .into_iter()
            .map(|status| {
                Ok(TaskStatusReport {
                    task_id: Some(task_id.to_string()),
                    status,
                    error: None,
                })
            })
            .collect();
        self.inner.lock().statuses.insert(task_id.to_string(), replies);
        self
    }

    /// Append a raw reply (report or error) to a task's script
    pub fn push_status_reply(&self, task_id: &str, reply: BackendResult<TaskStatusReport>) -> &Self {
        self.inner
            .lock()
            .statuses
            .entry(task_id.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    /// Delay every status reply for a task
    pub fn delay_status(&self, task_id: &str, delay: Duration) -> &Self {
        self.inner.lock().status_delay.insert(task_id.to_string(), delay);
        self
    }

    pub fn insert_document(&self, document: DocumentDescriptor, extraction: ExtractionResult) -> &Self {
        let mut inner = self.inner.lock();
        inner.extractions.insert(document.id.clone(), extraction);
        inner.documents.insert(document.id.clone(), document);
        self
    }

    pub fn fail_apply(&self, error: BackendError) -> &Self {
        self.inner.lock().apply_error = Some(error);
        self
    }

    pub fn uploads(&self) -> Vec<String> {
        self.inner.lock().uploads.clone()
    }

    pub fn polls(&self) -> Vec<String> {
        self.inner.lock().polls.clone()
    }

    pub fn poll_count(&self, task_id: &str) -> usize {
        self.inner.lock().polls.iter().filter(|t| *t == task_id).count()
    }

    pub fn applied(&self) -> Vec<(String, SavePayload)> {
        self.inner.lock().applied.clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.inner.lock().deleted.clone()
    }

    fn next_status(&self, task_id: &str) -> BackendResult<TaskStatusReport> {
        let mut inner = self.inner.lock();
        let Some(queue) = inner.statuses.get_mut(task_id) else {
            return Ok(TaskStatusReport {
                task_id: Some(task_id.to_string()),
                status: TaskStatus::Pending,
                error: None,
            });
        };
        if queue.len() > 1 {
            queue.pop_front().unwrap_or_else(|| Err(BackendError::NotFound(task_id.to_string())))
        } else {
            queue
                .front()
                .cloned()
                .unwrap_or_else(|| Err(BackendError::NotFound(task_id.to_string())))
        }
    }
}

#[async_trait]
impl DocumentBackend for MockBackend {
    async fn upload(&self, file_name: &str, _bytes: Vec<u8>) -> BackendResult<UploadReceipt> {
        let mut inner = self.inner.lock();
        inner.uploads.push(file_name.to_string());
        if let Some(error) = inner.upload_error.clone() {
            return Err(error);
        }
        inner
            .receipts
            .pop_front()
            .ok_or_else(|| BackendError::Transport("no scripted upload receipt".to_string()))
    }

    async fn task_status(&self, task_id: &str) -> BackendResult<TaskStatusReport> {
        let delay = {
            let mut inner = self.inner.lock();
            inner.polls.push(task_id.to_string());
            inner.status_delay.get(task_id).copied()
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.next_status(task_id)
    }

    async fn fetch_document(&self, document_id: &str) -> BackendResult<DocumentDescriptor> {
        self.inner
            .lock()
            .documents
            .get(document_id)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(document_id.to_string()))
    }

    async fn extract_text(&self, document_id: &str) -> BackendResult<ExtractionResult> {
        self.inner
            .lock()
            .extractions
            .get(document_id)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(document_id.to_string()))
    }

    async fn apply_edits(&self, document_id: &str, payload: &SavePayload) -> BackendResult<ApplyEditsReport> {
        let mut inner = self.inner.lock();
        if let Some(error) = inner.apply_error.clone() {
            return Err(error);
        }
        inner.applied.push((document_id.to_string(), payload.clone()));
        Ok(ApplyEditsReport {
            status: Some("success".to_string()),
            message: None,
        })
    }

    async fn list_documents(&self) -> BackendResult<Vec<DocumentDescriptor>> {
        let mut docs: Vec<_> = self.inner.lock().documents.values().cloned().collect();
        docs.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(docs)
    }

    async fn delete_document(&self, document_id: &str) -> BackendResult<()> {
        let mut inner = self.inner.lock();
        inner
            .documents
            .remove(document_id)
            .ok_or_else(|| BackendError::NotFound(document_id.to_string()))?;
        inner.extractions.remove(document_id);
        inner.deleted.push(document_id.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_last_status_repeats() {
        let backend = MockBackend::new();
        backend.script_statuses("t1", [TaskStatus::Running, TaskStatus::Success]);

        assert_eq!(backend.task_status("t1").await.unwrap().status, TaskStatus::Running);
        assert_eq!(backend.task_status("t1").await.unwrap().status, TaskStatus::Success);
        assert_eq!(backend.task_status("t1").await.unwrap().status, TaskStatus::Success);
        assert_eq!(backend.poll_count("t1"), 3);
    }

    #[tokio::test]
    async fn test_delete_removes_document() {
        let backend = MockBackend::new();
        backend.insert_document(DocumentDescriptor::new("d1", "a"), ExtractionResult::default());
        assert_eq!(backend.list_documents().await.unwrap().len(), 1);

        backend.delete_document("d1").await.unwrap();
        assert!(backend.list_documents().await.unwrap().is_empty());
        assert!(matches!(
            backend.delete_document("d1").await,
            Err(BackendError::NotFound(_))
        ));
    }
}
