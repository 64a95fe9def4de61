//! Diff & save payload
//!
//! Reduces the overlay state to the minimal set of records the backend
//! needs: one modification per span whose text or position differs from its
//! baseline, and one insertion per non-blank free text element.

use serde::{Deserialize, Serialize};

use crate::coords::BoundingBox;
use crate::model::{ElementRef, OverlayState};

/// Change to an extracted span
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextModification {
    pub page: u32,
    /// Load-time text, used by the backend to locate the run
    pub old_text: String,
    pub new_text: String,
    /// Load-time box
    pub bbox: BoundingBox,
    /// New position, only present when the span was moved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
}

/// Newly added text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextInsertion {
    pub page: u32,
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub font_size: f64,
    pub font_family: String,
    /// `#rrggbb`
    pub color: String,
}

/// One unit of change
#[derive(Debug, Clone, PartialEq)]
pub enum EditRecord {
    Modification(TextModification),
    Insertion(TextInsertion),
}

/// Batch submitted to the apply-edits endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavePayload {
    pub edits: Vec<TextModification>,
    pub new_texts: Vec<TextInsertion>,
}

impl SavePayload {
    pub fn is_empty(&self) -> bool {
        self.edits.is_empty() && self.new_texts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.edits.len() + self.new_texts.len()
    }

    /// Records in submission order: modifications first
    pub fn records(&self) -> impl Iterator<Item = EditRecord> + '_ {
        self.edits
            .iter()
            .cloned()
            .map(EditRecord::Modification)
            .chain(self.new_texts.iter().cloned().map(EditRecord::Insertion))
    }
}

impl FromIterator<EditRecord> for SavePayload {
    fn from_iter<I: IntoIterator<Item = EditRecord>>(iter: I) -> Self {
        let mut payload = SavePayload::default();
        for record in iter {
            match record {
                EditRecord::Modification(m) => payload.edits.push(m),
                EditRecord::Insertion(i) => payload.new_texts.push(i),
            }
        }
        payload
    }
}

/// Record for a single element, or `None` when it has nothing to save
pub fn record_for(element: ElementRef<'_>) -> Option<EditRecord> {
    match element {
        ElementRef::Span { page, span } => {
            let moved = span.is_moved();
            if !span.is_text_modified() && !moved {
                return None;
            }
            let position = moved.then(|| span.bbox.origin());
            Some(EditRecord::Modification(TextModification {
                page,
                old_text: span.original_text.clone(),
                new_text: span.text.clone(),
                bbox: span.original_bbox,
                x: position.map(|p| p.x),
                y: position.map(|p| p.y),
            }))
        }
        ElementRef::FreeText(free) => {
            if !free.has_content() {
                return None;
            }
            Some(EditRecord::Insertion(TextInsertion {
                page: free.page,
                text: free.content.clone(),
                x: free.position.x,
                y: free.position.y,
                font_size: free.style.font_size,
                font_family: free.style.font_family.clone(),
                color: free.style.color.to_hex(),
            }))
        }
    }
}

/// Walk every loaded page and every free text element
pub fn compute_diff(overlay: &OverlayState) -> SavePayload {
    overlay.elements().filter_map(record_for).collect()
}
