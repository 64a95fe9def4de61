//! Overlay element types
//!
//! The editable text of a document is a strict containment tree
//! (page → block → line → span) plus free-standing user text. Every element
//! carries a synthetic id assigned at creation so edits never change identity.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::coords::{BoundingBox, Point};

// ============================================================================
// Identity & style
// ============================================================================

/// Stable identifier for any overlay element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementId(Uuid);

impl ElementId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ElementId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ElementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Packed 0xRRGGBB colour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Color(pub u32);

impl Color {
    pub const BLACK: Color = Color(0);

    /// `#rrggbb`, zero padded
    pub fn to_hex(self) -> String {
        format!("#{:06x}", self.0 & 0x00ff_ffff)
    }

    /// Parse `#rgb`, `#rrggbb` or `rrggbb`
    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.trim().trim_start_matches('#');
        match digits.len() {
            6 => u32::from_str_radix(digits, 16).ok().map(Color),
            3 => {
                let expanded: String = digits.chars().flat_map(|c| [c, c]).collect();
                u32::from_str_radix(&expanded, 16).ok().map(Color)
            }
            _ => None,
        }
    }
}

/// Typeface settings shared by spans and free text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextStyle {
    /// Font family name as reported by the extractor
    pub font_family: String,
    /// Font size in document units
    pub font_size: f64,
    pub color: Color,
}

impl TextStyle {
    pub fn new(font_family: impl Into<String>, font_size: f64, color: Color) -> Self {
        Self {
            font_family: font_family.into(),
            font_size,
            color,
        }
    }
}

// ============================================================================
// Extracted tree
// ============================================================================

/// Atomic editable text run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Span {
    pub id: ElementId,
    /// Current box; moves with drags
    pub bbox: BoundingBox,
    /// Box at load time, sent back so the backend can find the old text
    pub original_bbox: BoundingBox,
    pub text: String,
    /// Text at load time
    pub original_text: String,
    pub style: TextStyle,
}

impl Span {
    pub fn new(bbox: BoundingBox, text: impl Into<String>, style: TextStyle) -> Self {
        let text = text.into();
        Self {
            id: ElementId::new(),
            bbox,
            original_bbox: bbox,
            original_text: text.clone(),
            text,
            style,
        }
    }

    pub fn is_text_modified(&self) -> bool {
        self.text != self.original_text
    }

    pub fn is_moved(&self) -> bool {
        self.bbox != self.original_bbox
    }

    /// Make the current state the new baseline
    pub fn rebase(&mut self) {
        self.original_text = self.text.clone();
        self.original_bbox = self.bbox;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub id: ElementId,
    pub bbox: BoundingBox,
    pub spans: Vec<Span>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: ElementId,
    pub bbox: BoundingBox,
    pub lines: Vec<Line>,
}

/// Extracted text of one page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageText {
    /// 1-based page number
    pub page: u32,
    pub blocks: Vec<Block>,
}

impl PageText {
    pub fn spans(&self) -> impl Iterator<Item = &Span> {
        self.blocks
            .iter()
            .flat_map(|b| b.lines.iter())
            .flat_map(|l| l.spans.iter())
    }

    pub fn spans_mut(&mut self) -> impl Iterator<Item = &mut Span> {
        self.blocks
            .iter_mut()
            .flat_map(|b| b.lines.iter_mut())
            .flat_map(|l| l.spans.iter_mut())
    }
}

// ============================================================================
// Free text
// ============================================================================

/// Average glyph advance relative to font size, used for free text hit boxes
const GLYPH_ADVANCE: f64 = 0.6;
/// Line height relative to font size
const LINE_HEIGHT: f64 = 1.2;
/// Free text stays clickable even with no content
const MIN_FREE_TEXT_WIDTH: f64 = 20.0;

/// User-created text not present in the extraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FreeTextElement {
    pub id: ElementId,
    /// 1-based page number
    pub page: u32,
    /// Top-left anchor in document space
    pub position: Point,
    pub content: String,
    pub style: TextStyle,
    /// Still has edit focus
    pub editing: bool,
}

impl FreeTextElement {
    pub fn new(page: u32, position: Point, style: TextStyle) -> Self {
        Self {
            id: ElementId::new(),
            page,
            position,
            content: String::new(),
            style,
            editing: true,
        }
    }

    /// Whether this element would be transmitted on save
    pub fn has_content(&self) -> bool {
        !self.content.trim().is_empty()
    }

    /// Approximate box derived from font metrics
    pub fn bbox(&self) -> BoundingBox {
        let longest = self
            .content
            .lines()
            .map(|l| l.chars().count())
            .max()
            .unwrap_or(0);
        let line_count = self.content.lines().count().max(1);
        let width = (longest as f64 * self.style.font_size * GLYPH_ADVANCE).max(MIN_FREE_TEXT_WIDTH);
        let height = line_count as f64 * self.style.font_size * LINE_HEIGHT;
        BoundingBox::from_origin(self.position, width, height)
    }
}

// ============================================================================
// Unified element view
// ============================================================================

/// Borrowed view over any editable element.
///
/// Hit-testing, rendering and diffing all match on this exhaustively.
#[derive(Debug, Clone, Copy)]
pub enum ElementRef<'a> {
    Span { page: u32, span: &'a Span },
    FreeText(&'a FreeTextElement),
}

impl<'a> ElementRef<'a> {
    pub fn id(&self) -> ElementId {
        match self {
            ElementRef::Span { span, .. } => span.id,
            ElementRef::FreeText(t) => t.id,
        }
    }

    pub fn page(&self) -> u32 {
        match self {
            ElementRef::Span { page, .. } => *page,
            ElementRef::FreeText(t) => t.page,
        }
    }

    pub fn bbox(&self) -> BoundingBox {
        match self {
            ElementRef::Span { span, .. } => span.bbox,
            ElementRef::FreeText(t) => t.bbox(),
        }
    }

    pub fn text(&self) -> &'a str {
        match self {
            ElementRef::Span { span, .. } => &span.text,
            ElementRef::FreeText(t) => &t.content,
        }
    }

    pub fn style(&self) -> &'a TextStyle {
        match self {
            ElementRef::Span { span, .. } => &span.style,
            ElementRef::FreeText(t) => &t.style,
        }
    }

    /// Drag anchor (top-left corner) in document space
    pub fn anchor(&self) -> Point {
        match self {
            ElementRef::Span { span, .. } => span.bbox.origin(),
            ElementRef::FreeText(t) => t.position,
        }
    }
}
