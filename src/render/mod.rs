//! Page rendering adapter
//!
//! The editor never rasterizes pages itself; it asks a [`PageRenderer`] for
//! a bitmap of one page at one scale and draws the overlay on top.
//!
//! - `lazy`: renderer opened on first use, shared by concurrent callers
//! - `cache`: LRU of rendered pages keyed by file, page and scale
//! - `mupdf`: MuPDF rasterizer (feature `mupdf`)

use std::sync::Arc;

use async_trait::async_trait;
use image::{Rgba, RgbaImage};
use thiserror::Error;

pub mod cache;
pub mod lazy;
#[cfg(feature = "mupdf")]
pub mod mupdf;

pub use cache::{CachedRenderer, RenderKey, DEFAULT_RENDER_CACHE_SIZE};
pub use lazy::LazyRenderer;

use crate::backend::DocumentDescriptor;

/// US Letter in points, used when a renderer has no page geometry
pub const LETTER_WIDTH: f64 = 612.0;
pub const LETTER_HEIGHT: f64 = 792.0;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum RenderError {
    #[error("Page {page} out of range (document has {count} pages)")]
    PageOutOfRange { page: u32, count: u32 },

    #[error("Failed to open document: {0}")]
    Open(String),

    #[error("Failed to render page: {0}")]
    Render(String),

    #[error("Image error: {0}")]
    Image(String),

    /// Renderable file could not be fetched
    #[error("Failed to fetch file: {0}")]
    Fetch(String),
}

/// A rasterized page
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// 1-based page number
    pub page: u32,
    pub scale: f64,
    /// Pixel width at `scale`
    pub width: u32,
    /// Pixel height at `scale`
    pub height: u32,
    pub image: Arc<RgbaImage>,
}

/// Rasterizes pages of one document
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn page_count(&self) -> Result<u32, RenderError>;

    /// Render a 1-based page at `scale`
    async fn render_page(&self, page: u32, scale: f64) -> Result<RenderedPage, RenderError>;
}

/// Opens a renderer for a file reference (path or URL)
#[async_trait]
pub trait RendererFactory: Send + Sync {
    async fn open(&self, file_ref: &str) -> Result<Arc<dyn PageRenderer>, RenderError>;
}

/// Blank pages of a fixed natural size.
///
/// Stands in for a real rasterizer when none is compiled in; the overlay
/// still lines up because only the page geometry matters to it.
#[derive(Debug, Clone)]
pub struct BlankRenderer {
    page_count: u32,
    width: f64,
    height: f64,
}

impl BlankRenderer {
    pub fn new(page_count: u32, width: f64, height: f64) -> Self {
        Self {
            page_count,
            width,
            height,
        }
    }

    pub fn letter(page_count: u32) -> Self {
        Self::new(page_count, LETTER_WIDTH, LETTER_HEIGHT)
    }
}

#[async_trait]
impl PageRenderer for BlankRenderer {
    async fn page_count(&self) -> Result<u32, RenderError> {
        Ok(self.page_count)
    }

    async fn render_page(&self, page: u32, scale: f64) -> Result<RenderedPage, RenderError> {
        check_page(page, self.page_count)?;
        let width = (self.width * scale).round().max(1.0) as u32;
        let height = (self.height * scale).round().max(1.0) as u32;
        Ok(RenderedPage {
            page,
            scale,
            width,
            height,
            image: Arc::new(RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]))),
        })
    }
}

/// Hands out [`BlankRenderer`]s whatever the file
#[derive(Debug, Clone)]
pub struct BlankFactory {
    page_count: u32,
}

impl BlankFactory {
    pub fn new(page_count: u32) -> Self {
        Self { page_count }
    }
}

#[async_trait]
impl RendererFactory for BlankFactory {
    async fn open(&self, _file_ref: &str) -> Result<Arc<dyn PageRenderer>, RenderError> {
        Ok(Arc::new(BlankRenderer::letter(self.page_count)))
    }
}

/// Renderer for a document's file: opened on first use, pages cached
pub fn open_for(
    document: &DocumentDescriptor,
    factory: Arc<dyn RendererFactory>,
    cache_size: usize,
) -> Result<CachedRenderer<LazyRenderer>, RenderError> {
    let file_ref = document
        .file_ref()
        .ok_or_else(|| RenderError::Open(format!("document {} has no renderable file", document.id)))?;
    Ok(CachedRenderer::new(
        LazyRenderer::new(file_ref, factory),
        file_ref,
        cache_size,
    ))
}

/// MuPDF when compiled in
#[cfg(feature = "mupdf")]
pub fn default_factory(_fallback_pages: u32) -> Arc<dyn RendererFactory> {
    Arc::new(mupdf::MupdfFactory::new(reqwest::Client::new()))
}

/// Blank pages of `fallback_pages` count otherwise
#[cfg(not(feature = "mupdf"))]
pub fn default_factory(fallback_pages: u32) -> Arc<dyn RendererFactory> {
    Arc::new(BlankFactory::new(fallback_pages))
}

pub(crate) fn check_page(page: u32, count: u32) -> Result<(), RenderError> {
    if page == 0 || page > count {
        return Err(RenderError::PageOutOfRange { page, count });
    }
    Ok(())
}
