//! REST client against an in-process fake of the document service

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};

use pdf_overlay_editor::backend::{BackendError, DocumentBackend, HttpBackend};
use pdf_overlay_editor::coords::BoundingBox;
use pdf_overlay_editor::diff::{EditRecord, SavePayload, TextModification};
use pdf_overlay_editor::ingestion::TaskStatus;

#[derive(Default)]
struct FakeService {
    uploads: Vec<(String, String, usize)>,
    extract_calls: usize,
    updates: Vec<Value>,
    deleted: Vec<String>,
}

type Shared = Arc<Mutex<FakeService>>;

async fn upload(State(state): State<Shared>, mut multipart: Multipart) -> Json<Value> {
    let mut file_name = String::new();
    let mut title = String::new();
    let mut size = 0;
    while let Ok(Some(field)) = multipart.next_field().await {
        match field.name() {
            Some("file") => {
                file_name = field.file_name().unwrap_or_default().to_string();
                size = field.bytes().await.map(|b| b.len()).unwrap_or(0);
            }
            Some("title") => title = field.text().await.unwrap_or_default(),
            _ => {}
        }
    }
    state.lock().uploads.push((file_name, title, size));
    Json(json!({"document_id": 12, "task_id": "c0ffee"}))
}

async fn list() -> Json<Value> {
    Json(json!({
        "success": true,
        "data": [
            {"id": 12, "title": "report.pdf", "file": "/media/report.pdf"},
            {"id": 13, "title": "notes.pdf"}
        ]
    }))
}

async fn task_status(Path(task_id): Path<String>) -> Json<Value> {
    match task_id.as_str() {
        "c0ffee" => Json(json!({"task_id": "c0ffee", "status": "STARTED"})),
        "dead" => Json(json!({"task_id": "dead", "status": "FAILURE", "error": "corrupt xref"})),
        _ => Json(json!({"task_id": task_id, "status": "SUCCESS"})),
    }
}

async fn document(Path(id): Path<String>) -> Response {
    if id == "12" {
        Json(json!({"id": 12, "title": "report.pdf", "file_url": "http://files/report.pdf"})).into_response()
    } else {
        (StatusCode::NOT_FOUND, Json(json!({"detail": "Not found."}))).into_response()
    }
}

async fn delete_document(State(state): State<Shared>, Path(id): Path<String>) -> StatusCode {
    state.lock().deleted.push(id);
    StatusCode::NO_CONTENT
}

async fn extract_text(State(state): State<Shared>) -> Json<Value> {
    let calls = {
        let mut state = state.lock();
        state.extract_calls += 1;
        state.extract_calls
    };
    if calls == 1 {
        return Json(json!({"error": "Analysis not completed", "status": "PENDING"}));
    }
    Json(json!({
        "title": "report.pdf",
        "totalPages": 1,
        "pages": [{"page": 1, "blocks": [{"type": 0, "lines": [{"spans": [
            {"text": "Hello", "font": "Helvetica", "size": 11.0, "color": 255, "bbox": [10, 20, 60, 34]}
        ]}]}]}]
    }))
}

async fn update_text(State(state): State<Shared>, Path(id): Path<String>, Json(body): Json<Value>) -> Response {
    if id == "99" {
        return Json(json!({"failed": "font not embeddable"})).into_response();
    }
    state.lock().updates.push(body);
    Json(json!({"message": "PDF updated."})).into_response()
}

async fn spawn_service() -> (HttpBackend, Shared) {
    let state: Shared = Arc::default();
    let app = Router::new()
        .route("/pdf-documents/", get(list).post(upload))
        .route("/pdf-documents/:id/", get(document).delete(delete_document))
        .route("/pdf-documents/:id/get_task_status/", get(task_status))
        .route("/pdf-documents/:id/extract-text/", get(extract_text))
        .route("/pdf-documents/:id/update-text/", post(update_text))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let backend = HttpBackend::new(&format!("http://{}/", addr), Duration::from_secs(5)).unwrap();
    (backend, state)
}

#[tokio::test]
async fn test_upload_sends_multipart_and_reads_numeric_id() {
    let (backend, state) = spawn_service().await;

    let receipt = backend.upload("report.pdf", b"%PDF-1.7 body".to_vec()).await.unwrap();
    assert_eq!(receipt.document_id, "12");
    assert_eq!(receipt.task_id, "c0ffee");

    let uploads = state.lock().uploads.clone();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0], ("report.pdf".to_string(), "report.pdf".to_string(), 13));
}

#[tokio::test]
async fn test_task_status_maps_wire_states() {
    let (backend, _) = spawn_service().await;

    let running = backend.task_status("c0ffee").await.unwrap();
    assert_eq!(running.status, TaskStatus::Running);

    let failed = backend.task_status("dead").await.unwrap();
    assert_eq!(failed.status, TaskStatus::Failure);
    assert_eq!(failed.error.as_deref(), Some("corrupt xref"));

    let done = backend.task_status("other").await.unwrap();
    assert_eq!(done.status, TaskStatus::Success);
}

#[tokio::test]
async fn test_documents() {
    let (backend, state) = spawn_service().await;

    let docs = backend.list_documents().await.unwrap();
    assert_eq!(docs.len(), 2);
    assert_eq!(docs[0].id, "12");
    assert_eq!(docs[1].title, "notes.pdf");

    let doc = backend.fetch_document("12").await.unwrap();
    assert_eq!(doc.file_ref(), Some("http://files/report.pdf"));
    assert!(matches!(
        backend.fetch_document("404").await,
        Err(BackendError::NotFound(_))
    ));

    backend.delete_document("13").await.unwrap();
    assert_eq!(state.lock().deleted, vec!["13".to_string()]);
}

#[tokio::test]
async fn test_extract_text_not_ready_then_ready() {
    let (backend, _) = spawn_service().await;

    assert!(matches!(
        backend.extract_text("12").await,
        Err(BackendError::NotReady(msg)) if msg == "Analysis not completed"
    ));

    let extraction = backend.extract_text("12").await.unwrap();
    assert_eq!(extraction.page_count(), Some(1));
    let pages = extraction.to_pages();
    let span = pages[0].spans().next().unwrap();
    assert_eq!(span.text, "Hello");
    assert_eq!(span.bbox, BoundingBox::new(10.0, 20.0, 60.0, 34.0));
    assert_eq!(span.style.color.to_hex(), "#0000ff");
}

#[tokio::test]
async fn test_apply_edits_posts_payload() {
    let (backend, state) = spawn_service().await;
    let payload: SavePayload = [EditRecord::Modification(TextModification {
        page: 1,
        old_text: "Hello".to_string(),
        new_text: "World".to_string(),
        bbox: BoundingBox::new(10.0, 20.0, 60.0, 34.0),
        x: None,
        y: None,
    })]
    .into_iter()
    .collect();

    let report = backend.apply_edits("12", &payload).await.unwrap();
    assert_eq!(report.message.as_deref(), Some("PDF updated."));
    assert_eq!(
        state.lock().updates[0],
        json!({
            "edits": [{"page": 1, "oldText": "Hello", "newText": "World", "bbox": [10.0, 20.0, 60.0, 34.0]}],
            "newTexts": []
        })
    );

    assert!(matches!(
        backend.apply_edits("99", &payload).await,
        Err(BackendError::Rejected(msg)) if msg == "font not embeddable"
    ));
}

#[tokio::test]
async fn test_unreachable_service_is_transport_error() {
    let backend = HttpBackend::new("http://127.0.0.1:1", Duration::from_secs(2)).unwrap();
    assert!(matches!(
        backend.list_documents().await,
        Err(BackendError::Transport(_))
    ));
}
