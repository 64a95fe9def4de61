//! REST client for the document-processing service
//!
//! Endpoints (relative to the configured base URL):
//!
//! - `POST   /pdf-documents/` multipart `file` + `title`
//! - `GET    /pdf-documents/`
//! - `GET    /pdf-documents/{task_id}/get_task_status/`
//! - `GET    /pdf-documents/{id}/`
//! - `DELETE /pdf-documents/{id}/`
//! - `GET    /pdf-documents/{id}/extract-text/`
//! - `POST   /pdf-documents/{id}/update-text/`
//!
//! The service answers some failures with a 200 and an `error` key in the
//! body; those are mapped to [`BackendError::NotReady`] or
//! [`BackendError::Rejected`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;

use super::traits::{BackendResult, DocumentBackend};
use super::types::{
    ApplyEditsReport, BackendError, DocumentDescriptor, DocumentList, TaskStatusReport, UploadReceipt,
};
use crate::diff::SavePayload;
use crate::model::ExtractionResult;

/// Keys the service uses to report a refused request in a 200 body
const ERROR_KEYS: [&str; 3] = ["error", "Error", "failed"];

pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Duration) -> BackendResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Transport(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/pdf-documents/{}", self.base_url, path)
    }

    fn document_url(&self, document_id: &str, suffix: &str) -> String {
        self.url(&format!("{}/{}", urlencoding::encode(document_id), suffix))
    }

    /// Reject non-success statuses, keeping the body for diagnostics
    async fn check(response: Response, resource: &str) -> BackendResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(BackendError::NotFound(resource.to_string()));
        }
        let body = response.text().await.unwrap_or_default();
        Err(BackendError::Status {
            status: status.as_u16(),
            body,
        })
    }

    async fn read_json<T: DeserializeOwned>(response: Response, resource: &str) -> BackendResult<T> {
        let response = Self::check(response, resource).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| BackendError::Decode(format!("{}: {}", resource, e)))
    }
}

/// Error message carried in a 200 body, if any
fn body_error(value: &serde_json::Value) -> Option<String> {
    let object = value.as_object()?;
    ERROR_KEYS.iter().find_map(|key| {
        object.get(*key).map(|v| match v {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    })
}

#[async_trait]
impl DocumentBackend for HttpBackend {
    async fn upload(&self, file_name: &str, bytes: Vec<u8>) -> BackendResult<UploadReceipt> {
        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str("application/pdf")?;
        let form = Form::new()
            .part("file", part)
            .text("title", file_name.to_string());

        tracing::debug!(file_name, "Uploading document");
        let response = self.client.post(self.url("")).multipart(form).send().await?;
        let value: serde_json::Value = Self::read_json(response, "upload").await?;
        if let Some(error) = body_error(&value) {
            return Err(BackendError::Rejected(error));
        }
        serde_json::from_value(value).map_err(|e| BackendError::Decode(format!("upload: {}", e)))
    }

    async fn task_status(&self, task_id: &str) -> BackendResult<TaskStatusReport> {
        let url = self.document_url(task_id, "get_task_status/");
        let response = self.client.get(url).send().await?;
        Self::read_json(response, task_id).await
    }

    async fn fetch_document(&self, document_id: &str) -> BackendResult<DocumentDescriptor> {
        let response = self
            .client
            .get(self.document_url(document_id, ""))
            .send()
            .await?;
        Self::read_json(response, document_id).await
    }

    async fn extract_text(&self, document_id: &str) -> BackendResult<ExtractionResult> {
        let response = self
            .client
            .get(self.document_url(document_id, "extract-text/"))
            .send()
            .await?;
        let value: serde_json::Value = Self::read_json(response, document_id).await?;
        if value.get("pages").is_none() {
            if let Some(error) = body_error(&value) {
                return Err(BackendError::NotReady(error));
            }
        }
        serde_json::from_value(value).map_err(|e| BackendError::Decode(format!("{}: {}", document_id, e)))
    }

    async fn apply_edits(&self, document_id: &str, payload: &SavePayload) -> BackendResult<ApplyEditsReport> {
        let response = self
            .client
            .post(self.document_url(document_id, "update-text/"))
            .json(payload)
            .send()
            .await?;
        let value: serde_json::Value = Self::read_json(response, document_id).await?;
        if let Some(error) = body_error(&value) {
            return Err(BackendError::Rejected(error));
        }
        Ok(serde_json::from_value(value).unwrap_or_default())
    }

    async fn list_documents(&self) -> BackendResult<Vec<DocumentDescriptor>> {
        let response = self.client.get(self.url("")).send().await?;
        let list: DocumentList = Self::read_json(response, "documents").await?;
        Ok(list.into_vec())
    }

    async fn delete_document(&self, document_id: &str) -> BackendResult<()> {
        let response = self
            .client
            .delete(self.document_url(document_id, ""))
            .send()
            .await?;
        Self::check(response, document_id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_urls() {
        let backend = HttpBackend::with_client(Client::new(), "http://127.0.0.1:8000/");
        assert_eq!(backend.url(""), "http://127.0.0.1:8000/pdf-documents/");
        assert_eq!(
            backend.document_url("abc-1", "get_task_status/"),
            "http://127.0.0.1:8000/pdf-documents/abc-1/get_task_status/"
        );
        assert_eq!(
            backend.document_url("a b", ""),
            "http://127.0.0.1:8000/pdf-documents/a%20b/"
        );
    }

    #[test]
    fn test_body_error() {
        assert_eq!(
            body_error(&json!({"error": "Analysis not completed", "status": "PENDING"})),
            Some("Analysis not completed".to_string())
        );
        assert_eq!(body_error(&json!({"message": "PDF updated."})), None);
        assert_eq!(body_error(&json!([1, 2])), None);
    }
}
