//! Crate-level error type
//!
//! Each concern keeps its own error enum; [`EditorError`] wraps them for
//! callers that drive the whole editor.

use thiserror::Error;

use crate::backend::BackendError;
use crate::ingestion::IngestionError;
use crate::render::RenderError;
use crate::session::SessionError;

#[derive(Debug, Error)]
pub enum EditorError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Ingestion(#[from] IngestionError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EditorError>;
