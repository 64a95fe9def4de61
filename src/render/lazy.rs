//! Lazily opened renderer
//!
//! The underlying renderer is opened on first use. Concurrent first calls
//! share a single open; a failed open is not cached, so the next call retries.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;

use super::{PageRenderer, RenderError, RenderedPage, RendererFactory};

pub struct LazyRenderer {
    file_ref: String,
    factory: Arc<dyn RendererFactory>,
    cell: OnceCell<Arc<dyn PageRenderer>>,
}

impl LazyRenderer {
    pub fn new(file_ref: impl Into<String>, factory: Arc<dyn RendererFactory>) -> Self {
        Self {
            file_ref: file_ref.into(),
            factory,
            cell: OnceCell::new(),
        }
    }

    pub fn file_ref(&self) -> &str {
        &self.file_ref
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }

    async fn renderer(&self) -> Result<&Arc<dyn PageRenderer>, RenderError> {
        self.cell
            .get_or_try_init(|| async {
                tracing::debug!(file = %self.file_ref, "Opening renderer");
                self.factory.open(&self.file_ref).await
            })
            .await
    }
}

#[async_trait]
impl PageRenderer for LazyRenderer {
    async fn page_count(&self) -> Result<u32, RenderError> {
        self.renderer().await?.page_count().await
    }

    async fn render_page(&self, page: u32, scale: f64) -> Result<RenderedPage, RenderError> {
        self.renderer().await?.render_page(page, scale).await
    }
}
