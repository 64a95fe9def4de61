//! Editing session for one open document
//!
//! The session exclusively owns the overlay state, its history, the
//! selection and the viewport. Every committed mutation is followed
//! synchronously by a history snapshot; drags only snapshot on release.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::backend::{BackendError, DocumentBackend, DocumentDescriptor};
use crate::config::{Config, SaveBaseline};
use crate::coords::{self, BoundingBox, Point, Viewport};
use crate::diff::{compute_diff, SavePayload};
use crate::error::Result;
use crate::history::{History, DEFAULT_HISTORY_LIMIT};
use crate::model::{ElementId, ElementRef, ExtractionResult, FreeTextCommit, OverlayState};
use crate::render::{self, PageRenderer, RenderError, RenderedPage, RendererFactory, DEFAULT_RENDER_CACHE_SIZE};
use crate::selection::{new_text_style, PointerOutcome, Selection, ToolMode, DEFAULT_HIT_TOLERANCE};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("Page {page} out of range (document has {count} pages)")]
    PageOutOfRange { page: u32, count: u32 },

    #[error("No element selected")]
    NoSelection,

    #[error("Element not found: {0}")]
    ElementNotFound(ElementId),

    #[error("No renderer attached")]
    NoRenderer,
}

pub type SessionResult<T> = std::result::Result<T, SessionError>;

/// Tunables taken from [`Config`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionOptions {
    pub history_limit: usize,
    pub hit_tolerance: f64,
    pub save_baseline: SaveBaseline,
    /// Rendered pages kept per document
    pub render_cache: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            hit_tolerance: DEFAULT_HIT_TOLERANCE,
            save_baseline: SaveBaseline::Reset,
            render_cache: DEFAULT_RENDER_CACHE_SIZE,
        }
    }
}

impl From<&Config> for SessionOptions {
    fn from(config: &Config) -> Self {
        Self {
            history_limit: config.editor.history_limit,
            hit_tolerance: config.editor.hit_tolerance,
            save_baseline: config.editor.save_baseline,
            render_cache: config.editor.render_cache,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayKind {
    Span,
    FreeText,
}

/// One overlay element projected into display space for a painter
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayItem {
    pub id: ElementId,
    pub kind: DisplayKind,
    /// Box in display pixels
    pub rect: BoundingBox,
    pub text: String,
    pub font_family: String,
    /// Font size in display pixels
    pub font_px: f64,
    /// `#rrggbb`
    pub fill: String,
    /// Text baseline (display y of the box bottom)
    pub baseline: f64,
    pub selected: bool,
    /// Free text still being typed
    pub editing: bool,
}

pub struct EditorSession {
    backend: Arc<dyn DocumentBackend>,
    document: DocumentDescriptor,
    overlay: OverlayState,
    history: History,
    selection: Selection,
    viewport: Viewport,
    /// 1-based
    current_page: u32,
    page_count: Option<u32>,
    renderer: Option<Arc<dyn PageRenderer>>,
    options: SessionOptions,
}

impl EditorSession {
    /// Extract the document's text and start editing it
    pub async fn open(
        backend: Arc<dyn DocumentBackend>,
        document: DocumentDescriptor,
        options: SessionOptions,
    ) -> SessionResult<Self> {
        let extraction = backend.extract_text(&document.id).await?;
        Ok(Self::from_extraction(backend, document, &extraction, options))
    }

    /// Fetch a document record by id, then open it
    pub async fn open_document(
        backend: Arc<dyn DocumentBackend>,
        document_id: &str,
        options: SessionOptions,
    ) -> Result<Self> {
        let document = backend.fetch_document(document_id).await?;
        Ok(Self::open(backend, document, options).await?)
    }

    /// Start editing from an extraction already at hand
    pub fn from_extraction(
        backend: Arc<dyn DocumentBackend>,
        document: DocumentDescriptor,
        extraction: &ExtractionResult,
        options: SessionOptions,
    ) -> Self {
        let mut overlay = OverlayState::new();
        let spans = overlay.load(extraction);
        let mut history = History::new(options.history_limit);
        history.push(&overlay);
        tracing::info!(
            document_id = %document.id,
            pages = extraction.pages.len(),
            spans,
            "Opened editing session"
        );

        Self {
            backend,
            document,
            overlay,
            history,
            selection: Selection::new(options.hit_tolerance),
            viewport: Viewport::default(),
            current_page: 1,
            page_count: extraction.page_count(),
            renderer: None,
            options,
        }
    }

    /// Discard all local state and load the document's text again
    pub async fn reload(&mut self) -> SessionResult<()> {
        let extraction = self.backend.extract_text(&self.document.id).await?;
        self.overlay.clear();
        self.overlay.load(&extraction);
        self.history.reset(&self.overlay);
        self.selection.clear();
        if let Some(count) = extraction.page_count() {
            self.page_count = Some(count);
        }
        self.current_page = self.current_page.min(self.page_count.unwrap_or(1)).max(1);
        tracing::info!(document_id = %self.document.id, "Reloaded document");
        Ok(())
    }

    pub fn attach_renderer(&mut self, renderer: Arc<dyn PageRenderer>) {
        self.renderer = Some(renderer);
    }

    /// Attach a renderer for the document's own file. The file is opened on
    /// the first render; pages are cached per `render_cache`.
    pub fn attach_file_renderer(&mut self, factory: Arc<dyn RendererFactory>) -> SessionResult<()> {
        let renderer = render::open_for(&self.document, factory, self.options.render_cache)?;
        self.attach_renderer(Arc::new(renderer));
        Ok(())
    }

    /// Delete the open document on the backend, closing the session.
    ///
    /// On failure the session is handed back untouched.
    pub async fn delete_document(self) -> std::result::Result<(), (Self, SessionError)> {
        match self.backend.delete_document(&self.document.id).await {
            Ok(()) => {
                tracing::info!(document_id = %self.document.id, "Deleted document, session closed");
                Ok(())
            }
            Err(e) => Err((self, e.into())),
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn document(&self) -> &DocumentDescriptor {
        &self.document
    }

    pub fn overlay(&self) -> &OverlayState {
        &self.overlay
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn page_count(&self) -> Option<u32> {
        self.page_count
    }

    pub fn scale(&self) -> f64 {
        self.viewport.scale()
    }

    pub fn zoom_percent(&self) -> u32 {
        self.viewport.zoom_percent()
    }

    pub fn tool(&self) -> ToolMode {
        self.selection.mode()
    }

    pub fn selected(&self) -> Option<ElementId> {
        self.selection.selected()
    }

    pub fn selected_element(&self) -> Option<ElementRef<'_>> {
        self.selection.selected().and_then(|id| self.overlay.element(id))
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Records a save would send right now
    pub fn pending_changes(&self) -> SavePayload {
        compute_diff(&self.overlay)
    }

    // ========================================================================
    // Navigation & zoom
    // ========================================================================

    /// Change page; clears the selection. Returns whether the page changed.
    pub fn go_to_page(&mut self, page: u32) -> SessionResult<bool> {
        let count = self.page_count.unwrap_or(page.max(1));
        if page == 0 || page > count {
            return Err(SessionError::PageOutOfRange { page, count });
        }
        if page == self.current_page {
            return Ok(false);
        }
        self.current_page = page;
        self.selection.clear();
        tracing::debug!(page, "Changed page");
        Ok(true)
    }

    pub fn next_page(&mut self) -> bool {
        self.go_to_page(self.current_page + 1).unwrap_or(false)
    }

    pub fn previous_page(&mut self) -> bool {
        self.current_page > 1 && self.go_to_page(self.current_page - 1).unwrap_or(false)
    }

    pub fn zoom_in(&mut self) -> bool {
        self.viewport.zoom_in()
    }

    pub fn zoom_out(&mut self) -> bool {
        self.viewport.zoom_out()
    }

    pub fn set_scale(&mut self, scale: f64) -> bool {
        self.viewport.set_scale(scale)
    }

    pub fn set_tool(&mut self, mode: ToolMode) {
        self.selection.set_mode(mode);
    }

    // ========================================================================
    // Pointer input (display space)
    // ========================================================================

    pub fn pointer_down(&mut self, pointer: Point) -> PointerOutcome {
        let outcome = self.selection.pointer_down(
            &mut self.overlay,
            self.current_page,
            pointer,
            self.viewport.scale(),
        );
        tracing::trace!(?outcome, "Pointer down");
        if let PointerOutcome::Created(_) = outcome {
            self.snapshot();
        }
        outcome
    }

    pub fn pointer_move(&mut self, pointer: Point) -> bool {
        self.selection
            .pointer_move(&mut self.overlay, pointer, self.viewport.scale())
    }

    /// End a drag; the settled position is snapshotted once
    pub fn pointer_up(&mut self) -> bool {
        match self.selection.pointer_up() {
            Some(end) if end.moved => {
                self.snapshot();
                true
            }
            _ => false,
        }
    }

    // ========================================================================
    // Editing
    // ========================================================================

    /// Replace the text of any element
    pub fn edit_text(&mut self, id: ElementId, text: impl Into<String>) -> SessionResult<()> {
        if !self.overlay.set_text(id, text) {
            return Err(SessionError::ElementNotFound(id));
        }
        self.snapshot();
        Ok(())
    }

    pub fn edit_selected_text(&mut self, text: impl Into<String>) -> SessionResult<()> {
        let id = self.selection.selected().ok_or(SessionError::NoSelection)?;
        self.edit_text(id, text)
    }

    /// Replace a span's text by tree position
    pub fn update_span_text(
        &mut self,
        page: u32,
        block: usize,
        line: usize,
        span: usize,
        text: impl Into<String>,
    ) -> bool {
        let updated = self.overlay.update_span_text(page, block, line, span, text);
        if updated {
            self.snapshot();
        }
        updated
    }

    /// Create free text at a document-space position and select it
    pub fn add_free_text(&mut self, page: u32, position: Point) -> ElementId {
        let id = self.overlay.add_free_text(page, position, new_text_style());
        self.selection.select(id);
        self.snapshot();
        id
    }

    /// Move an element to a document-space position
    pub fn move_element(&mut self, id: ElementId, position: Point) -> SessionResult<()> {
        if !self.overlay.move_element(id, position) {
            return Err(SessionError::ElementNotFound(id));
        }
        self.snapshot();
        Ok(())
    }

    /// Leave edit focus on the selected free text
    pub fn commit_edit(&mut self) -> FreeTextCommit {
        let Some(id) = self.selection.selected() else {
            return FreeTextCommit::NotFound;
        };
        let outcome = self.overlay.commit_free_text(id);
        match outcome {
            FreeTextCommit::Kept => self.snapshot(),
            FreeTextCommit::Discarded => {
                self.selection.clear();
                // Untouched since creation: forget the creation step instead
                if !self.history.rewind_to(&self.overlay) {
                    self.snapshot();
                }
            }
            FreeTextCommit::NotFound => {}
        }
        outcome
    }

    pub fn delete_free_text(&mut self, id: ElementId) -> bool {
        if self.overlay.remove_free_text(id).is_none() {
            return false;
        }
        if self.selection.selected() == Some(id) {
            self.selection.clear();
        }
        self.snapshot();
        true
    }

    /// Delete the selected element if it is free text
    pub fn delete_selected(&mut self) -> bool {
        match self.selection.selected() {
            Some(id) if self.overlay.free_text(id).is_some() => self.delete_free_text(id),
            _ => false,
        }
    }

    // ========================================================================
    // History
    // ========================================================================

    fn snapshot(&mut self) {
        self.history.push(&self.overlay);
    }

    pub fn undo(&mut self) -> bool {
        match self.history.undo() {
            Some(state) => {
                self.restore(state);
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        match self.history.redo() {
            Some(state) => {
                self.restore(state);
                true
            }
            None => false,
        }
    }

    fn restore(&mut self, state: OverlayState) {
        self.overlay = state;
        self.selection.pointer_up();
        self.selection.retain_valid(&self.overlay);
    }

    // ========================================================================
    // Save
    // ========================================================================

    /// Submit every pending change as one batch.
    ///
    /// Nothing is sent when there are no changes. On failure the local state
    /// is left exactly as it was.
    pub async fn save(&mut self) -> SessionResult<SavePayload> {
        let payload = compute_diff(&self.overlay);
        if payload.is_empty() {
            tracing::info!(document_id = %self.document.id, "Nothing to save");
            return Ok(payload);
        }

        tracing::info!(
            document_id = %self.document.id,
            edits = payload.edits.len(),
            new_texts = payload.new_texts.len(),
            "Saving edits"
        );
        self.backend.apply_edits(&self.document.id, &payload).await?;

        if self.options.save_baseline == SaveBaseline::Reset {
            self.overlay.rebase();
            self.selection.retain_valid(&self.overlay);
            self.history.reset(&self.overlay);
        }
        Ok(payload)
    }

    // ========================================================================
    // Rendering
    // ========================================================================

    /// Overlay of the current page in display space, in paint order
    pub fn display_list(&self) -> Vec<DisplayItem> {
        let scale = self.viewport.scale();
        let selected = self.selection.selected();
        self.overlay
            .elements_on_page(self.current_page)
            .into_iter()
            .map(|element| {
                let rect = coords::rect_to_display(&element.bbox(), scale);
                let style = element.style();
                let (kind, editing) = match element {
                    ElementRef::Span { .. } => (DisplayKind::Span, false),
                    ElementRef::FreeText(free) => (DisplayKind::FreeText, free.editing),
                };
                DisplayItem {
                    id: element.id(),
                    kind,
                    rect,
                    text: element.text().to_string(),
                    font_family: style.font_family.clone(),
                    font_px: style.font_size * scale,
                    fill: style.color.to_hex(),
                    baseline: rect.y1,
                    selected: selected == Some(element.id()),
                    editing,
                }
            })
            .collect()
    }

    /// Render the current page at the current scale
    pub async fn render_current_page(&mut self) -> SessionResult<RenderedPage> {
        let renderer = self.renderer.clone().ok_or(SessionError::NoRenderer)?;
        if self.page_count.is_none() {
            self.page_count = Some(renderer.page_count().await?);
        }
        Ok(renderer
            .render_page(self.current_page, self.viewport.scale())
            .await?)
    }
}
