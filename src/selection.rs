//! Hit-testing, selection and drag handling
//!
//! Pointer events arrive in display space. Hit-testing happens in document
//! space with a fixed margin so small text stays clickable at any zoom.

use serde::{Deserialize, Serialize};

use crate::coords::{self, Point};
use crate::model::{Color, ElementId, OverlayState, TextStyle};

/// Default hit margin in document units
pub const DEFAULT_HIT_TOLERANCE: f64 = 3.0;
/// Style given to text created with the add-text tool
pub const NEW_TEXT_FONT_FAMILY: &str = "Arial";
pub const NEW_TEXT_FONT_SIZE: f64 = 14.0;

/// Active pointer tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolMode {
    #[default]
    Select,
    AddText,
}

/// What a pointer press did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerOutcome {
    /// An element was selected and a drag armed
    Selected(ElementId),
    /// The selected element was pressed again; drag armed
    DragArmed(ElementId),
    /// Press outside the selected element cleared it
    Deselected,
    /// Nothing under the pointer
    Missed,
    /// Add-text tool created a new element
    Created(ElementId),
}

/// Result of releasing a drag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DragEnd {
    pub id: ElementId,
    /// Whether the element ended somewhere other than where it started
    pub moved: bool,
}

#[derive(Debug, Clone, Copy)]
struct DragState {
    id: ElementId,
    /// Pointer minus element anchor, in display space, at press time
    offset: Point,
    start: Point,
    last: Point,
}

/// Style for add-text elements
pub fn new_text_style() -> TextStyle {
    TextStyle::new(NEW_TEXT_FONT_FAMILY, NEW_TEXT_FONT_SIZE, Color::BLACK)
}

/// Topmost element on `page` whose box, grown by `tolerance`, contains `point`
pub fn hit_test(overlay: &OverlayState, page: u32, point: Point, tolerance: f64) -> Option<ElementId> {
    overlay
        .elements_on_page(page)
        .into_iter()
        .rev()
        .find(|e| e.bbox().contains(point, tolerance))
        .map(|e| e.id())
}

#[derive(Debug, Clone)]
pub struct Selection {
    mode: ToolMode,
    selected: Option<ElementId>,
    drag: Option<DragState>,
    tolerance: f64,
}

impl Selection {
    pub fn new(tolerance: f64) -> Self {
        Self {
            mode: ToolMode::Select,
            selected: None,
            drag: None,
            tolerance: tolerance.max(0.0),
        }
    }

    pub fn mode(&self) -> ToolMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: ToolMode) {
        self.mode = mode;
        self.drag = None;
    }

    pub fn selected(&self) -> Option<ElementId> {
        self.selected
    }

    pub fn select(&mut self, id: ElementId) {
        self.selected = Some(id);
    }

    pub fn clear(&mut self) {
        self.selected = None;
        self.drag = None;
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Drop the selection if its element no longer exists (after undo/redo)
    pub fn retain_valid(&mut self, overlay: &OverlayState) {
        if let Some(id) = self.selected {
            if overlay.element(id).is_none() {
                self.clear();
            }
        }
    }

    /// Handle a pointer press at `pointer` (display space) on `page`
    pub fn pointer_down(
        &mut self,
        overlay: &mut OverlayState,
        page: u32,
        pointer: Point,
        scale: f64,
    ) -> PointerOutcome {
        let doc = coords::to_document(pointer, scale);
        self.drag = None;

        if self.mode == ToolMode::AddText {
            let id = overlay.add_free_text(page, doc, new_text_style());
            self.selected = Some(id);
            return PointerOutcome::Created(id);
        }

        if let Some(current) = self.selected {
            let hit = overlay
                .element(current)
                .filter(|e| e.page() == page)
                .map(|e| e.bbox().contains(doc, self.tolerance));
            match hit {
                Some(true) => {
                    self.arm_drag(overlay, current, pointer, scale);
                    return PointerOutcome::DragArmed(current);
                }
                _ => {
                    self.selected = None;
                    return PointerOutcome::Deselected;
                }
            }
        }

        match hit_test(overlay, page, doc, self.tolerance) {
            Some(id) => {
                self.selected = Some(id);
                self.arm_drag(overlay, id, pointer, scale);
                PointerOutcome::Selected(id)
            }
            None => PointerOutcome::Missed,
        }
    }

    fn arm_drag(&mut self, overlay: &OverlayState, id: ElementId, pointer: Point, scale: f64) {
        let Some(element) = overlay.element(id) else {
            return;
        };
        let anchor = element.anchor();
        self.drag = Some(DragState {
            id,
            offset: pointer.offset_from(coords::to_display(anchor, scale)),
            start: anchor,
            last: anchor,
        });
    }

    /// Apply a pointer move to an active drag. Returns whether the model changed.
    pub fn pointer_move(&mut self, overlay: &mut OverlayState, pointer: Point, scale: f64) -> bool {
        let Some(drag) = self.drag.as_mut() else {
            return false;
        };
        let position = coords::to_document(pointer.offset_from(drag.offset), scale);
        if position == drag.last {
            return false;
        }
        if !overlay.move_element(drag.id, position) {
            self.drag = None;
            return false;
        }
        drag.last = position;
        true
    }

    /// End the drag. The caller snapshots history when `moved` is set.
    pub fn pointer_up(&mut self) -> Option<DragEnd> {
        self.drag.take().map(|d| DragEnd {
            id: d.id,
            moved: d.last != d.start,
        })
    }
}

impl Default for Selection {
    fn default() -> Self {
        Self::new(DEFAULT_HIT_TOLERANCE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ExtractionResult;

    fn overlay() -> OverlayState {
        let result: ExtractionResult = serde_json::from_str(
            r#"{"pages": [{"page": 1, "blocks": [{"lines": [{"spans": [
                {"text": "Hello", "bbox": [0, 0, 50, 20]},
                {"text": "Over", "bbox": [40, 0, 90, 20]}
            ]}]}]}]}"#,
        )
        .unwrap();
        let mut overlay = OverlayState::new();
        overlay.load(&result);
        overlay
    }

    fn span_id(overlay: &OverlayState, index: usize) -> ElementId {
        overlay.span_at(1, 0, 0, index).unwrap().id
    }

    #[test]
    fn test_hit_prefers_topmost() {
        let overlay = overlay();
        // Both spans overlap at x=45; the later one paints on top
        let hit = hit_test(&overlay, 1, Point::new(45.0, 10.0), 0.0);
        assert_eq!(hit, Some(span_id(&overlay, 1)));
        let hit = hit_test(&overlay, 1, Point::new(10.0, 10.0), 0.0);
        assert_eq!(hit, Some(span_id(&overlay, 0)));
        assert_eq!(hit_test(&overlay, 1, Point::new(300.0, 300.0), 3.0), None);
        assert_eq!(hit_test(&overlay, 2, Point::new(10.0, 10.0), 3.0), None);
    }

    #[test]
    fn test_tolerance_is_in_document_space() {
        let mut overlay = overlay();
        let mut selection = Selection::new(3.0);
        // (92, 10) in document space is 2 units right of the box; at 2x zoom
        // that is display (184, 20)
        let outcome = selection.pointer_down(&mut overlay, 1, Point::new(184.0, 20.0), 2.0);
        assert_eq!(outcome, PointerOutcome::Selected(span_id(&overlay, 1)));
    }

    #[test]
    fn test_click_outside_selected_deselects() {
        let mut overlay = overlay();
        let mut selection = Selection::default();
        let first = selection.pointer_down(&mut overlay, 1, Point::new(10.0, 10.0), 1.0);
        assert!(matches!(first, PointerOutcome::Selected(_)));
        selection.pointer_up();

        let second = selection.pointer_down(&mut overlay, 1, Point::new(500.0, 500.0), 1.0);
        assert_eq!(second, PointerOutcome::Deselected);
        assert_eq!(selection.selected(), None);

        let third = selection.pointer_down(&mut overlay, 1, Point::new(500.0, 500.0), 1.0);
        assert_eq!(third, PointerOutcome::Missed);
    }

    #[test]
    fn test_add_text_mode_creates_at_document_position() {
        let mut overlay = overlay();
        let mut selection = Selection::default();
        selection.set_mode(ToolMode::AddText);

        let outcome = selection.pointer_down(&mut overlay, 1, Point::new(150.0, 300.0), 1.5);
        let PointerOutcome::Created(id) = outcome else {
            panic!("expected creation, got {outcome:?}");
        };
        let created = overlay.free_text(id).unwrap();
        assert_eq!(created.position, Point::new(100.0, 200.0));
        assert_eq!(created.style.font_size, NEW_TEXT_FONT_SIZE);
        assert_eq!(selection.selected(), Some(id));
    }

    #[test]
    fn test_drag_moves_by_pointer_delta() {
        let mut overlay = overlay();
        let mut selection = Selection::default();
        let id = span_id(&overlay, 0);

        // Press at document (10, 10) while zoomed 2x
        selection.pointer_down(&mut overlay, 1, Point::new(20.0, 20.0), 2.0);
        assert!(selection.is_dragging());
        assert!(selection.pointer_move(&mut overlay, Point::new(60.0, 40.0), 2.0));
        assert!(selection.pointer_move(&mut overlay, Point::new(220.0, 120.0), 2.0));

        let (_, span) = overlay.span(id).unwrap();
        assert_eq!(span.bbox.origin(), Point::new(100.0, 50.0));
        assert_eq!(span.bbox.width(), 50.0);

        let end = selection.pointer_up().unwrap();
        assert_eq!(end, DragEnd { id, moved: true });
        assert!(!selection.pointer_move(&mut overlay, Point::new(0.0, 0.0), 2.0));
    }

    #[test]
    fn test_press_without_move_is_not_a_move() {
        let mut overlay = overlay();
        let mut selection = Selection::default();
        selection.pointer_down(&mut overlay, 1, Point::new(10.0, 10.0), 1.0);
        let end = selection.pointer_up().unwrap();
        assert!(!end.moved);
    }

    #[test]
    fn test_retain_valid_clears_missing() {
        let mut overlay = overlay();
        let mut selection = Selection::default();
        selection.set_mode(ToolMode::AddText);
        let PointerOutcome::Created(id) = selection.pointer_down(&mut overlay, 1, Point::new(1.0, 1.0), 1.0)
        else {
            panic!("expected creation");
        };
        overlay.remove_free_text(id);
        selection.retain_valid(&overlay);
        assert_eq!(selection.selected(), None);
    }
}
