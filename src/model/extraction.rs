//! Extraction result wire types
//!
//! The extractor reports each page either as a block/line/span tree or, in
//! older deployments, as a flat word list. Both are accepted here and
//! normalized into [`PageText`]. Every nested collection is optional: absent
//! or `null` arrays are read as empty, never as an error.

use serde::{Deserialize, Serialize};

use super::types::{Block, Color, Line, PageText, Span, TextStyle};
use crate::coords::BoundingBox;

/// Font used when the extractor does not name one
pub const DEFAULT_FONT_FAMILY: &str = "Arial";
/// Size used when the extractor does not report one
pub const DEFAULT_FONT_SIZE: f64 = 12.0;
/// Box size given to a flat-list word (no extents are reported for words)
pub const WORD_BOX_WIDTH: f64 = 50.0;
pub const WORD_BOX_HEIGHT: f64 = 20.0;

/// Full extract-text response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub pages: Vec<ExtractedPage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_pages: Option<u32>,
    /// Set by the backend when extraction is not available yet
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedPage {
    #[serde(default)]
    pub page: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocks: Option<Vec<RawBlock>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub words: Option<Vec<RawWord>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawBlock {
    /// 0 = text, anything else (images) is skipped
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lines: Option<Vec<RawLine>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawLine {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spans: Option<Vec<RawSpan>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawSpan {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<Vec<f64>>,
}

/// Word entry of the flat extraction variant
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawWord {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
}

/// The two shapes a page can arrive in
#[derive(Debug, Clone)]
pub enum PageContent<'a> {
    Tree(&'a [RawBlock]),
    Words(&'a [RawWord]),
}

impl ExtractedPage {
    pub fn content(&self) -> PageContent<'_> {
        match (&self.blocks, &self.words) {
            (Some(blocks), _) => PageContent::Tree(blocks),
            (None, Some(words)) => PageContent::Words(words),
            (None, None) => PageContent::Tree(&[]),
        }
    }

    /// Build the editable tree for this page with fresh ids and baselines
    pub fn to_page_text(&self) -> PageText {
        let blocks = match self.content() {
            PageContent::Tree(blocks) => blocks
                .iter()
                .filter(|b| b.kind.unwrap_or(0) == 0)
                .map(convert_block)
                .collect(),
            PageContent::Words(words) => words.iter().map(convert_word).collect(),
        };
        PageText {
            page: self.page,
            blocks,
        }
    }
}

impl ExtractionResult {
    /// Page count as reported, falling back to the highest page seen
    pub fn page_count(&self) -> Option<u32> {
        self.total_pages
            .or_else(|| self.pages.iter().map(|p| p.page).max())
            .filter(|n| *n > 0)
    }

    pub fn to_pages(&self) -> Vec<PageText> {
        self.pages.iter().map(ExtractedPage::to_page_text).collect()
    }
}

fn to_bbox(raw: &Option<Vec<f64>>) -> Option<BoundingBox> {
    match raw.as_deref() {
        Some([x0, y0, x1, y1, ..]) => Some(BoundingBox::new(*x0, *y0, *x1, *y1)),
        _ => None,
    }
}

fn convert_block(raw: &RawBlock) -> Block {
    let bbox = to_bbox(&raw.bbox);
    let lines = raw
        .lines
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(|l| convert_line(l, bbox))
        .collect();
    Block {
        id: Default::default(),
        bbox: bbox.unwrap_or_default(),
        lines,
    }
}

fn convert_line(raw: &RawLine, block_bbox: Option<BoundingBox>) -> Line {
    let bbox = to_bbox(&raw.bbox).or(block_bbox);
    let spans = raw
        .spans
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(|s| convert_span(s, bbox))
        .collect();
    Line {
        id: Default::default(),
        bbox: bbox.unwrap_or_default(),
        spans,
    }
}

fn convert_span(raw: &RawSpan, line_bbox: Option<BoundingBox>) -> Span {
    let bbox = to_bbox(&raw.bbox).or(line_bbox).unwrap_or_default();
    let style = TextStyle::new(
        raw.font
            .clone()
            .filter(|f| !f.is_empty())
            .unwrap_or_else(|| DEFAULT_FONT_FAMILY.to_string()),
        raw.size.unwrap_or(DEFAULT_FONT_SIZE),
        Color(raw.color.unwrap_or(0)),
    );
    Span::new(bbox, raw.text.clone().unwrap_or_default(), style)
}

/// A flat word is a degenerate block holding one line with one span
fn convert_word(raw: &RawWord) -> Block {
    let x = raw.x.unwrap_or(0.0);
    let y = raw.y.unwrap_or(0.0);
    let bbox = BoundingBox::new(x, y, x + WORD_BOX_WIDTH, y + WORD_BOX_HEIGHT);
    let style = TextStyle::new(DEFAULT_FONT_FAMILY, DEFAULT_FONT_SIZE, Color::BLACK);
    let span = Span::new(bbox, raw.text.clone().unwrap_or_default(), style);
    Block {
        id: Default::default(),
        bbox,
        lines: vec![Line {
            id: Default::default(),
            bbox,
            spans: vec![span],
        }],
    }
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_block_tree() {
        let json = r#"{
            "id": 7,
            "title": "doc.pdf",
            "totalPages": 2,
            "pages": [{
                "page": 1,
                "blocks": [{
                    "bbox": [0, 0, 100, 40],
                    "lines": [{
                        "bbox": [0, 0, 100, 20],
                        "spans": [{"text": "Hello", "font": "Arial", "size": 12, "color": 0, "bbox": [0, 0, 50, 20]}]
                    }]
                }]
            }]
        }"#;
        let result: ExtractionResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.page_count(), Some(2));

        let pages = result.to_pages();
        let span = pages[0].spans().next().unwrap();
        assert_eq!(span.text, "Hello");
        assert_eq!(span.original_text, "Hello");
        assert_eq!(span.bbox, BoundingBox::new(0.0, 0.0, 50.0, 20.0));
        assert_eq!(span.style.font_family, "Arial");
    }

    #[test]
    fn test_missing_collections_are_empty() {
        let json = r#"{
            "pages": [
                {"page": 1},
                {"page": 2, "blocks": null},
                {"page": 3, "blocks": [{"bbox": [0, 0, 1, 1]}, {"lines": [{"spans": null}, {}]}]}
            ]
        }"#;
        let result: ExtractionResult = serde_json::from_str(json).unwrap();
        let pages = result.to_pages();
        assert_eq!(pages.len(), 3);
        assert!(pages[0].blocks.is_empty());
        assert!(pages[1].blocks.is_empty());
        assert_eq!(pages[2].blocks.len(), 2);
        assert_eq!(pages[2].spans().count(), 0);
        assert_eq!(result.page_count(), Some(3));
    }

    #[test]
    fn test_span_without_bbox_inherits_line_box() {
        let json = r#"{"pages": [{"page": 1, "blocks": [{"lines": [
            {"bbox": [10, 10, 90, 30], "spans": [{"text": "x", "bbox": [1, 2]}]}
        ]}]}]}"#;
        let result: ExtractionResult = serde_json::from_str(json).unwrap();
        let pages = result.to_pages();
        let span = pages[0].spans().next().unwrap();
        assert_eq!(span.bbox, BoundingBox::new(10.0, 10.0, 90.0, 30.0));
        assert_eq!(span.style.font_size, DEFAULT_FONT_SIZE);
    }

    #[test]
    fn test_image_blocks_are_skipped() {
        let json = r#"{"pages": [{"page": 1, "blocks": [
            {"type": 1, "bbox": [0, 0, 10, 10]},
            {"type": 0, "lines": [{"spans": [{"text": "kept", "bbox": [0, 0, 5, 5]}]}]}
        ]}]}"#;
        let result: ExtractionResult = serde_json::from_str(json).unwrap();
        let pages = result.to_pages();
        assert_eq!(pages[0].blocks.len(), 1);
        assert_eq!(pages[0].spans().next().unwrap().text, "kept");
    }

    #[test]
    fn test_flat_words_become_single_span_blocks() {
        let json = r#"{"pages": [{"page": 1, "words": [
            {"text": "alpha", "x": 10, "y": 20},
            {"y": 5}
        ]}]}"#;
        let result: ExtractionResult = serde_json::from_str(json).unwrap();
        let pages = result.to_pages();
        assert_eq!(pages[0].blocks.len(), 2);

        let spans: Vec<_> = pages[0].spans().collect();
        assert_eq!(spans[0].text, "alpha");
        assert_eq!(spans[0].bbox, BoundingBox::new(10.0, 20.0, 60.0, 40.0));
        assert_eq!(spans[1].text, "");
        assert_eq!(spans[1].bbox.origin().y, 5.0);
    }
}
