//! Rendered page cache with LRU eviction
//!
//! Re-rendering the same page at the same zoom is the common case when the
//! user edits text, so rendered bitmaps are kept until evicted.

use std::num::NonZeroUsize;

use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;

use super::{PageRenderer, RenderError, RenderedPage};

/// Default number of cached pages
pub const DEFAULT_RENDER_CACHE_SIZE: usize = 32;

/// Cache key for a rendered page
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct RenderKey {
    pub file_ref: String,
    /// 1-based page
    pub page: u32,
    /// Scale factor (multiplied by 100 for integer hashing)
    pub scale: u32,
}

impl RenderKey {
    pub fn new(file_ref: &str, page: u32, scale: f64) -> Self {
        Self {
            file_ref: file_ref.to_string(),
            page,
            scale: (scale * 100.0).round() as u32,
        }
    }
}

pub struct CachedRenderer<R> {
    inner: R,
    file_ref: String,
    cache: Mutex<LruCache<RenderKey, RenderedPage>>,
}

impl<R: PageRenderer> CachedRenderer<R> {
    pub fn new(inner: R, file_ref: impl Into<String>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            file_ref: file_ref.into(),
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.lock().is_empty()
    }

    pub fn clear(&self) {
        self.cache.lock().clear();
    }
}

#[async_trait]
impl<R: PageRenderer> PageRenderer for CachedRenderer<R> {
    async fn page_count(&self) -> Result<u32, RenderError> {
        self.inner.page_count().await
    }

    async fn render_page(&self, page: u32, scale: f64) -> Result<RenderedPage, RenderError> {
        let key = RenderKey::new(&self.file_ref, page, scale);
        if let Some(hit) = self.cache.lock().get(&key) {
            return Ok(hit.clone());
        }

        tracing::debug!(file = %self.file_ref, page, scale, "Render cache miss");
        let rendered = self.inner.render_page(page, scale).await?;
        self.cache.lock().put(key, rendered.clone());
        Ok(rendered)
    }
}
