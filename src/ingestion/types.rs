//! Ingestion state and task types

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backend::{BackendError, DocumentDescriptor};

// ============================================================================
// Constants
// ============================================================================

/// Delay between task status polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Wall-clock ceiling measured from entry into `Processing`
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(300);

// ============================================================================
// Task status
// ============================================================================

/// Extraction task status as reported by the worker queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    Running,
    Success,
    Failure,
}

impl TaskStatus {
    /// Map a worker-queue state name.
    ///
    /// Unknown names are treated as still pending; the polling ceiling
    /// bounds how long that can last.
    pub fn from_wire(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "SUCCESS" => TaskStatus::Success,
            "FAILURE" | "REVOKED" => TaskStatus::Failure,
            "STARTED" | "RETRY" | "RUNNING" | "PROGRESS" => TaskStatus::Running,
            _ => TaskStatus::Pending,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Success | TaskStatus::Failure)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::Running => "RUNNING",
            TaskStatus::Success => "SUCCESS",
            TaskStatus::Failure => "FAILURE",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An extraction job tracked from upload to a terminal status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionTask {
    pub task_id: String,
    pub document_id: String,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
}

impl IngestionTask {
    pub fn new(task_id: impl Into<String>, document_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            document_id: document_id.into(),
            status: TaskStatus::Pending,
            created_at: Utc::now(),
        }
    }
}

// ============================================================================
// State machine
// ============================================================================

/// Why a document ended up in `Failed`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    /// Upload or poll could not reach the backend
    Transport(String),
    /// The extraction task reported failure
    Processing(Option<String>),
    /// The polling ceiling elapsed
    TimedOut { seconds: u64 },
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Transport(e) => write!(f, "backend unreachable: {}", e),
            FailureReason::Processing(Some(detail)) => write!(f, "processing failed: {}", detail),
            FailureReason::Processing(None) => f.write_str("processing failed"),
            FailureReason::TimedOut { seconds } => {
                write!(f, "processing did not finish within {} seconds", seconds)
            }
        }
    }
}

/// Document lifecycle
#[derive(Debug, Clone, PartialEq)]
pub enum IngestionState {
    /// Nothing uploaded yet
    Idle,
    Uploading { file_name: String },
    Processing(IngestionTask),
    Ready(DocumentDescriptor),
    Failed(FailureReason),
}

impl IngestionState {
    pub fn name(&self) -> &'static str {
        match self {
            IngestionState::Idle => "idle",
            IngestionState::Uploading { .. } => "uploading",
            IngestionState::Processing(_) => "processing",
            IngestionState::Ready(_) => "ready",
            IngestionState::Failed(_) => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, IngestionState::Ready(_) | IngestionState::Failed(_))
    }

    /// Whether moving from `self` to `next` is a legal transition.
    ///
    /// A new upload or a reset to `Idle` may happen from any state;
    /// everything else follows `Uploading → Processing → Ready | Failed`,
    /// with `Uploading → Failed` for a rejected upload.
    pub fn can_transition_to(&self, next: &IngestionState) -> bool {
        use IngestionState::*;
        match (self, next) {
            (_, Uploading { .. }) | (_, Idle) => true,
            (Uploading { .. }, Processing(_)) => true,
            (Uploading { .. }, Failed(_)) => true,
            (Processing(_), Processing(_)) => true,
            (Processing(_), Ready(_)) => true,
            (Processing(_), Failed(_)) => true,
            _ => false,
        }
    }

    pub fn task(&self) -> Option<&IngestionTask> {
        match self {
            IngestionState::Processing(task) => Some(task),
            _ => None,
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, Error, PartialEq)]
pub enum IngestionError {
    /// File rejected before upload
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Processing failed: {}", .0.as_deref().unwrap_or("no detail"))]
    ProcessingFailed(Option<String>),

    #[error("Processing timed out after {0} seconds")]
    TimedOut(u64),

    /// Superseded by a newer upload or document switch
    #[error("Ingestion cancelled")]
    Cancelled,

    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition { from: &'static str, to: &'static str },
}

impl From<BackendError> for IngestionError {
    fn from(e: BackendError) -> Self {
        IngestionError::Transport(e.to_string())
    }
}

impl From<FailureReason> for IngestionError {
    fn from(reason: FailureReason) -> Self {
        match reason {
            FailureReason::Transport(e) => IngestionError::Transport(e),
            FailureReason::Processing(detail) => IngestionError::ProcessingFailed(detail),
            FailureReason::TimedOut { seconds } => IngestionError::TimedOut(seconds),
        }
    }
}
