//! Text element model
//!
//! - `types`: element types (spans, free text, ids, styles)
//! - `extraction`: tolerant extraction wire format and normalization
//! - `overlay`: the editable state and its mutations

pub mod extraction;
pub mod overlay;
pub mod types;

pub use extraction::{ExtractedPage, ExtractionResult, PageContent};
pub use overlay::{FreeTextCommit, OverlayState};
pub use types::{
    Block, Color, ElementId, ElementRef, FreeTextElement, Line, PageText, Span, TextStyle,
};
