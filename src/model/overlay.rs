//! Editable overlay state
//!
//! [`OverlayState`] owns every extracted page tree and every free text
//! element of the open document. Mutations only touch text and position;
//! the tree shape fixed at load time is never restructured.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::extraction::ExtractionResult;
use super::types::{Block, ElementId, ElementRef, FreeTextElement, Line, PageText, Span, TextStyle};
use crate::coords::Point;

/// Outcome of leaving edit focus on a free text element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreeTextCommit {
    /// Content present; element stays and will be saved
    Kept,
    /// Content was blank; element removed
    Discarded,
    /// No free text with that id
    NotFound,
}

/// All editable state of one document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverlayState {
    pages: BTreeMap<u32, PageText>,
    free_texts: Vec<FreeTextElement>,
}

impl OverlayState {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// Replace the trees of every page present in `result`.
    ///
    /// Pages not mentioned keep their current tree. Returns the number of
    /// spans loaded.
    pub fn load(&mut self, result: &ExtractionResult) -> usize {
        let mut loaded = 0;
        for page in result.to_pages() {
            loaded += page.spans().count();
            self.free_texts.retain(|t| t.page != page.page);
            self.pages.insert(page.page, page);
        }
        tracing::debug!(pages = result.pages.len(), spans = loaded, "Loaded extraction into overlay");
        loaded
    }

    pub fn page(&self, page: u32) -> Option<&PageText> {
        self.pages.get(&page)
    }

    pub fn page_numbers(&self) -> impl Iterator<Item = u32> + '_ {
        self.pages.keys().copied()
    }

    pub fn pages(&self) -> impl Iterator<Item = &PageText> {
        self.pages.values()
    }

    pub fn free_texts(&self) -> &[FreeTextElement] {
        &self.free_texts
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    pub fn span(&self, id: ElementId) -> Option<(u32, &Span)> {
        self.pages
            .values()
            .find_map(|p| p.spans().find(|s| s.id == id).map(|s| (p.page, s)))
    }

    fn span_mut(&mut self, id: ElementId) -> Option<&mut Span> {
        self.pages
            .values_mut()
            .find_map(|p| p.spans_mut().find(|s| s.id == id))
    }

    pub fn free_text(&self, id: ElementId) -> Option<&FreeTextElement> {
        self.free_texts.iter().find(|t| t.id == id)
    }

    fn free_text_mut(&mut self, id: ElementId) -> Option<&mut FreeTextElement> {
        self.free_texts.iter_mut().find(|t| t.id == id)
    }

    /// Span by tree position on a page
    pub fn span_at(&self, page: u32, block: usize, line: usize, span: usize) -> Option<&Span> {
        self.pages
            .get(&page)?
            .blocks
            .get(block)?
            .lines
            .get(line)?
            .spans
            .get(span)
    }

    pub fn element(&self, id: ElementId) -> Option<ElementRef<'_>> {
        if let Some((page, span)) = self.span(id) {
            return Some(ElementRef::Span { page, span });
        }
        self.free_text(id).map(ElementRef::FreeText)
    }

    /// Elements of a page in paint order: spans first, free text on top
    pub fn elements_on_page(&self, page: u32) -> Vec<ElementRef<'_>> {
        let spans = self
            .pages
            .get(&page)
            .into_iter()
            .flat_map(|p| p.spans())
            .map(move |span| ElementRef::Span { page, span });
        let texts = self
            .free_texts
            .iter()
            .filter(move |t| t.page == page)
            .map(ElementRef::FreeText);
        spans.chain(texts).collect()
    }

    /// Every element of every page
    pub fn elements(&self) -> impl Iterator<Item = ElementRef<'_>> {
        let spans = self
            .pages
            .values()
            .flat_map(|p| p.spans().map(move |span| ElementRef::Span { page: p.page, span }));
        spans.chain(self.free_texts.iter().map(ElementRef::FreeText))
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    /// Replace the text of a span addressed by tree position.
    ///
    /// Only `text` changes; box, style and baseline are left alone. Returns
    /// `false` for an out-of-range address.
    pub fn update_span_text(
        &mut self,
        page: u32,
        block: usize,
        line: usize,
        span: usize,
        text: impl Into<String>,
    ) -> bool {
        let target = self
            .pages
            .get_mut(&page)
            .and_then(|p| p.blocks.get_mut(block))
            .and_then(|b| b.lines.get_mut(line))
            .and_then(|l| l.spans.get_mut(span));
        match target {
            Some(s) => {
                s.text = text.into();
                true
            }
            None => false,
        }
    }

    /// Replace the text of any element by id
    pub fn set_text(&mut self, id: ElementId, text: impl Into<String>) -> bool {
        let text = text.into();
        if let Some(span) = self.span_mut(id) {
            span.text = text;
            return true;
        }
        if let Some(free) = self.free_text_mut(id) {
            free.content = text;
            return true;
        }
        false
    }

    /// Create an empty free text element with edit focus
    pub fn add_free_text(&mut self, page: u32, position: Point, style: TextStyle) -> ElementId {
        let element = FreeTextElement::new(page, position, style);
        let id = element.id;
        self.free_texts.push(element);
        id
    }

    pub fn remove_free_text(&mut self, id: ElementId) -> Option<FreeTextElement> {
        let index = self.free_texts.iter().position(|t| t.id == id)?;
        Some(self.free_texts.remove(index))
    }

    /// Move an element so its anchor sits at `position` (document space)
    pub fn move_element(&mut self, id: ElementId, position: Point) -> bool {
        if let Some(span) = self.span_mut(id) {
            span.bbox = span.bbox.moved_to(position);
            return true;
        }
        if let Some(free) = self.free_text_mut(id) {
            free.position = position;
            return true;
        }
        false
    }

    /// Leave edit focus: blank free text is discarded, anything else is kept
    pub fn commit_free_text(&mut self, id: ElementId) -> FreeTextCommit {
        let Some(free) = self.free_text_mut(id) else {
            return FreeTextCommit::NotFound;
        };
        if free.has_content() {
            free.editing = false;
            FreeTextCommit::Kept
        } else {
            self.remove_free_text(id);
            FreeTextCommit::Discarded
        }
    }

    // ========================================================================
    // Baseline
    // ========================================================================

    /// Make the current state the diff baseline.
    ///
    /// Spans adopt their current text and box; saved free text becomes an
    /// ordinary span of its page, keeping its id. Blank free text is dropped.
    pub fn rebase(&mut self) {
        for page in self.pages.values_mut() {
            for span in page.spans_mut() {
                span.rebase();
            }
        }

        for free in std::mem::take(&mut self.free_texts) {
            if !free.has_content() {
                continue;
            }
            let bbox = free.bbox();
            let mut span = Span::new(bbox, free.content.clone(), free.style.clone());
            span.id = free.id;
            let page = self.pages.entry(free.page).or_insert_with(|| PageText {
                page: free.page,
                blocks: Vec::new(),
            });
            page.blocks.push(Block {
                id: ElementId::new(),
                bbox,
                lines: vec![Line {
                    id: ElementId::new(),
                    bbox,
                    spans: vec![span],
                }],
            });
        }
    }

    /// Drop everything (document switch)
    pub fn clear(&mut self) {
        self.pages.clear();
        self.free_texts.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::BoundingBox;
    use crate::model::Color;

    fn extraction() -> ExtractionResult {
        serde_json::from_str(
            r#"{"totalPages": 2, "pages": [
                {"page": 1, "blocks": [{"bbox": [0, 0, 200, 40], "lines": [
                    {"bbox": [0, 0, 200, 20], "spans": [
                        {"text": "Hello", "font": "Arial", "size": 12, "color": 0, "bbox": [0, 0, 50, 20]},
                        {"text": "there", "font": "Arial", "size": 12, "color": 255, "bbox": [55, 0, 100, 20]}
                    ]}
                ]}]},
                {"page": 2, "blocks": [{"lines": [{"spans": [{"text": "Two", "bbox": [10, 10, 40, 30]}]}]}]}
            ]}"#,
        )
        .unwrap()
    }

    fn style() -> TextStyle {
        TextStyle::new("Arial", 14.0, Color::BLACK)
    }

    #[test]
    fn test_load_twice_gives_fresh_baseline() {
        let mut overlay = OverlayState::new();
        overlay.load(&extraction());
        assert!(overlay.update_span_text(1, 0, 0, 0, "Changed"));

        overlay.load(&extraction());
        for element in overlay.elements() {
            if let ElementRef::Span { span, .. } = element {
                assert_eq!(span.text, span.original_text);
            }
        }
        assert_eq!(overlay.span_at(1, 0, 0, 0).unwrap().text, "Hello");
    }

    #[test]
    fn test_update_span_text_keeps_metadata() {
        let mut overlay = OverlayState::new();
        overlay.load(&extraction());
        let before = overlay.span_at(1, 0, 0, 1).unwrap().clone();

        assert!(overlay.update_span_text(1, 0, 0, 1, "world"));
        let after = overlay.span_at(1, 0, 0, 1).unwrap();
        assert_eq!(after.text, "world");
        assert_eq!(after.original_text, "there");
        assert_eq!(after.bbox, before.bbox);
        assert_eq!(after.style, before.style);
        assert_eq!(after.id, before.id);
    }

    #[test]
    fn test_out_of_range_update_is_rejected() {
        let mut overlay = OverlayState::new();
        overlay.load(&extraction());
        assert!(!overlay.update_span_text(1, 0, 0, 9, "x"));
        assert!(!overlay.update_span_text(1, 3, 0, 0, "x"));
        assert!(!overlay.update_span_text(9, 0, 0, 0, "x"));
    }

    #[test]
    fn test_move_span_keeps_size_and_baseline() {
        let mut overlay = OverlayState::new();
        overlay.load(&extraction());
        let id = overlay.span_at(2, 0, 0, 0).unwrap().id;

        assert!(overlay.move_element(id, Point::new(100.0, 100.0)));
        let (_, span) = overlay.span(id).unwrap();
        assert_eq!(span.bbox, BoundingBox::new(100.0, 100.0, 130.0, 120.0));
        assert_eq!(span.original_bbox, BoundingBox::new(10.0, 10.0, 40.0, 30.0));
    }

    #[test]
    fn test_free_text_lifecycle() {
        let mut overlay = OverlayState::new();
        let kept = overlay.add_free_text(1, Point::new(5.0, 5.0), style());
        let blank = overlay.add_free_text(1, Point::new(50.0, 5.0), style());

        assert!(overlay.set_text(kept, "Note"));
        assert_eq!(overlay.commit_free_text(kept), FreeTextCommit::Kept);
        assert!(!overlay.free_text(kept).unwrap().editing);

        assert_eq!(overlay.commit_free_text(blank), FreeTextCommit::Discarded);
        assert!(overlay.free_text(blank).is_none());
        assert_eq!(overlay.commit_free_text(blank), FreeTextCommit::NotFound);

        assert!(overlay.remove_free_text(kept).is_some());
        assert!(overlay.free_texts().is_empty());
    }

    #[test]
    fn test_rebase_folds_free_text_into_page() {
        let mut overlay = OverlayState::new();
        overlay.load(&extraction());
        overlay.update_span_text(1, 0, 0, 0, "World");
        let note = overlay.add_free_text(2, Point::new(100.0, 200.0), style());
        overlay.set_text(note, "Note");
        overlay.add_free_text(2, Point::new(1.0, 1.0), style());

        overlay.rebase();

        assert!(overlay.free_texts().is_empty());
        let first = overlay.span_at(1, 0, 0, 0).unwrap();
        assert_eq!(first.original_text, "World");
        let (page, folded) = overlay.span(note).unwrap();
        assert_eq!(page, 2);
        assert_eq!(folded.original_text, "Note");
        assert_eq!(folded.bbox.origin(), Point::new(100.0, 200.0));
    }

    #[test]
    fn test_elements_on_page_paint_order() {
        let mut overlay = OverlayState::new();
        overlay.load(&extraction());
        let note = overlay.add_free_text(1, Point::new(0.0, 0.0), style());

        let elements = overlay.elements_on_page(1);
        assert_eq!(elements.len(), 3);
        assert_eq!(elements.last().unwrap().id(), note);
        assert!(overlay.elements_on_page(3).is_empty());
    }
}
