//! MuPDF page rasterizer
//!
//! MuPDF documents are not `Send`, so the file bytes are kept and a fresh
//! document is opened inside `spawn_blocking` for every operation.

use std::sync::Arc;

use async_trait::async_trait;
use image::RgbaImage;
use mupdf::{Colorspace, Document, Matrix, Pixmap};

use super::{check_page, PageRenderer, RenderError, RenderedPage, RendererFactory};

const PDF_MIME: &str = "application/pdf";

impl From<mupdf::Error> for RenderError {
    fn from(err: mupdf::Error) -> Self {
        RenderError::Render(err.to_string())
    }
}

pub struct MupdfRenderer {
    data: Arc<Vec<u8>>,
    page_count: u32,
}

impl MupdfRenderer {
    /// Open from PDF bytes, validating that MuPDF can parse them
    pub async fn from_bytes(data: Vec<u8>) -> Result<Self, RenderError> {
        let data = Arc::new(data);
        let bytes = data.clone();
        let page_count = tokio::task::spawn_blocking(move || {
            let doc = Document::from_bytes(&bytes, PDF_MIME).map_err(|e| RenderError::Open(e.to_string()))?;
            Ok::<_, RenderError>(doc.page_count()?.max(0) as u32)
        })
        .await
        .map_err(|e| RenderError::Open(e.to_string()))??;

        Ok(Self { data, page_count })
    }
}

#[async_trait]
impl PageRenderer for MupdfRenderer {
    async fn page_count(&self) -> Result<u32, RenderError> {
        Ok(self.page_count)
    }

    async fn render_page(&self, page: u32, scale: f64) -> Result<RenderedPage, RenderError> {
        check_page(page, self.page_count)?;
        let data = self.data.clone();
        let factor = scale as f32;

        let image = tokio::task::spawn_blocking(move || {
            let doc = Document::from_bytes(&data, PDF_MIME)?;
            let mupdf_page = doc.load_page(page as i32 - 1)?;
            let matrix = Matrix::new_scale(factor, factor);
            let colorspace = Colorspace::device_rgb();
            let pixmap = mupdf_page.to_pixmap(&matrix, &colorspace, true, true)?;
            pixmap_to_rgba(&pixmap)
        })
        .await
        .map_err(|e| RenderError::Render(e.to_string()))??;

        let (width, height) = image.dimensions();
        Ok(RenderedPage {
            page,
            scale,
            width,
            height,
            image: Arc::new(image),
        })
    }
}

fn pixmap_to_rgba(pixmap: &Pixmap) -> Result<RgbaImage, RenderError> {
    let width = pixmap.width() as u32;
    let height = pixmap.height() as u32;
    let samples = pixmap.samples();
    let n = pixmap.n() as usize;

    let mut rgba = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height as usize {
        for x in 0..width as usize {
            let offset = (y * width as usize + x) * n;
            let r = samples.get(offset).copied().unwrap_or(0);
            let g = samples.get(offset + 1).copied().unwrap_or(0);
            let b = samples.get(offset + 2).copied().unwrap_or(0);
            let a = if n >= 4 {
                samples.get(offset + 3).copied().unwrap_or(255)
            } else {
                255
            };
            rgba.extend_from_slice(&[r, g, b, a]);
        }
    }

    RgbaImage::from_raw(width, height, rgba)
        .ok_or_else(|| RenderError::Image("Failed to create image buffer".to_string()))
}

/// Opens MuPDF renderers from local paths or HTTP(S) URLs
pub struct MupdfFactory {
    client: reqwest::Client,
}

impl MupdfFactory {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn load(&self, file_ref: &str) -> Result<Vec<u8>, RenderError> {
        if file_ref.starts_with("http://") || file_ref.starts_with("https://") {
            let response = self
                .client
                .get(file_ref)
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| RenderError::Fetch(e.to_string()))?;
            let bytes = response.bytes().await.map_err(|e| RenderError::Fetch(e.to_string()))?;
            Ok(bytes.to_vec())
        } else {
            tokio::fs::read(file_ref)
                .await
                .map_err(|e| RenderError::Fetch(format!("{}: {}", file_ref, e)))
        }
    }
}

#[async_trait]
impl RendererFactory for MupdfFactory {
    async fn open(&self, file_ref: &str) -> Result<Arc<dyn PageRenderer>, RenderError> {
        let data = self.load(file_ref).await?;
        tracing::info!(file = %file_ref, bytes = data.len(), "Opening document with MuPDF");
        Ok(Arc::new(MupdfRenderer::from_bytes(data).await?))
    }
}
