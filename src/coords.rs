//! Coordinate mapping between document space and display space
//!
//! Document space is the native unit system of the extracted page (PDF points,
//! origin top-left as reported by the extractor). Display space is pixels of
//! the rendered page at the active zoom. Positions are only ever stored in
//! document space; display coordinates are derived on demand.

use serde::{Deserialize, Serialize};

/// Smallest supported zoom factor
pub const MIN_SCALE: f64 = 0.5;
/// Largest supported zoom factor
pub const MAX_SCALE: f64 = 3.0;
/// Zoom step used by `zoom_in` / `zoom_out`
pub const SCALE_STEP: f64 = 0.25;

/// A 2D point
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Component-wise subtraction
    pub fn offset_from(&self, other: Point) -> Point {
        Point::new(self.x - other.x, self.y - other.y)
    }
}

/// Axis-aligned rectangle stored as left/top/right/bottom.
///
/// Serialized as a 4-element array, which is how the extractor and the
/// backend exchange bounding boxes.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoundingBox {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl BoundingBox {
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Box anchored at `origin` with the given size
    pub fn from_origin(origin: Point, width: f64, height: f64) -> Self {
        Self::new(origin.x, origin.y, origin.x + width, origin.y + height)
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    /// Top-left corner, used as the drag anchor
    pub fn origin(&self) -> Point {
        Point::new(self.x0, self.y0)
    }

    /// Same size, moved so the top-left corner sits at `origin`
    pub fn moved_to(&self, origin: Point) -> Self {
        Self::from_origin(origin, self.width(), self.height())
    }

    /// Containment test with a margin added on every side
    pub fn contains(&self, point: Point, margin: f64) -> bool {
        point.x >= self.x0 - margin
            && point.x <= self.x1 + margin
            && point.y >= self.y0 - margin
            && point.y <= self.y1 + margin
    }

    /// Whether `other` lies entirely inside this box
    pub fn encloses(&self, other: &BoundingBox) -> bool {
        other.x0 >= self.x0 && other.y0 >= self.y0 && other.x1 <= self.x1 && other.y1 <= self.y1
    }
}

impl From<[f64; 4]> for BoundingBox {
    fn from(v: [f64; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.x0, b.y0, b.x1, b.y1]
    }
}

/// Clamp a scale into the supported zoom range.
///
/// Non-finite input falls back to 1.0 so a scale can never be zero or negative.
pub fn clamp_scale(scale: f64) -> f64 {
    if !scale.is_finite() {
        return 1.0;
    }
    scale.clamp(MIN_SCALE, MAX_SCALE)
}

/// Document space → display space
pub fn to_display(point: Point, scale: f64) -> Point {
    Point::new(point.x * scale, point.y * scale)
}

/// Display space → document space
pub fn to_document(point: Point, scale: f64) -> Point {
    Point::new(point.x / scale, point.y / scale)
}

/// Project a document-space box into display space
pub fn rect_to_display(rect: &BoundingBox, scale: f64) -> BoundingBox {
    BoundingBox::new(rect.x0 * scale, rect.y0 * scale, rect.x1 * scale, rect.y1 * scale)
}

/// Current zoom factor and page of the editing viewport
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    scale: f64,
}

impl Viewport {
    pub fn new(scale: f64) -> Self {
        Self {
            scale: clamp_scale(scale),
        }
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Set an arbitrary scale; returns whether it actually changed
    pub fn set_scale(&mut self, scale: f64) -> bool {
        let next = clamp_scale(scale);
        let changed = (next - self.scale).abs() > f64::EPSILON;
        self.scale = next;
        changed
    }

    pub fn zoom_in(&mut self) -> bool {
        self.set_scale(self.scale + SCALE_STEP)
    }

    pub fn zoom_out(&mut self) -> bool {
        self.set_scale(self.scale - SCALE_STEP)
    }

    /// Zoom level as a rounded percentage (e.g. 125)
    pub fn zoom_percent(&self) -> u32 {
        (self.scale * 100.0).round() as u32
    }

    pub fn to_display(&self, point: Point) -> Point {
        to_display(point, self.scale)
    }

    pub fn to_document(&self, point: Point) -> Point {
        to_document(point, self.scale)
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1.0)
    }
}
