//! Axis-aligned box geometry used by the spatial stages.

use serde::{Deserialize, Serialize};

use super::Vertex;

/// Axis-aligned bounding box in image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BBox {
    /// Create a box from two corners in any order.
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
        }
    }

    /// Bounding rectangle of an OCR polygon.
    ///
    /// Returns `None` for polygons with fewer than three points, non-finite
    /// coordinates, or an enclosed area below `min_area`.
    pub fn from_vertices(vertices: &[Vertex], min_area: f32) -> Option<Self> {
        if vertices.len() < 3 {
            return None;
        }
        if vertices.iter().any(|v| !v.x.is_finite() || !v.y.is_finite()) {
            return None;
        }

        // Shoelace formula
        let mut twice_area = 0.0f32;
        for (i, a) in vertices.iter().enumerate() {
            let b = &vertices[(i + 1) % vertices.len()];
            twice_area += a.x * b.y - b.x * a.y;
        }
        if (twice_area / 2.0).abs() < min_area {
            return None;
        }

        let min_x = vertices.iter().map(|v| v.x).fold(f32::INFINITY, f32::min);
        let max_x = vertices.iter().map(|v| v.x).fold(f32::NEG_INFINITY, f32::max);
        let min_y = vertices.iter().map(|v| v.y).fold(f32::INFINITY, f32::min);
        let max_y = vertices.iter().map(|v| v.y).fold(f32::NEG_INFINITY, f32::max);

        if max_x <= min_x || max_y <= min_y {
            return None;
        }

        Some(Self::new(min_x, min_y, max_x, max_y))
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    pub fn center(&self) -> (f32, f32) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    /// Smallest box containing both boxes.
    pub fn union(&self, other: &BBox) -> BBox {
        BBox {
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
            x2: self.x2.max(other.x2),
            y2: self.y2.max(other.y2),
        }
    }

    /// Length of the shared vertical interval (0 when disjoint).
    pub fn vertical_overlap(&self, other: &BBox) -> f32 {
        (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0)
    }

    /// Length of the shared horizontal interval (0 when disjoint).
    pub fn horizontal_overlap(&self, other: &BBox) -> f32 {
        (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0)
    }

    /// Signed horizontal gap: positive when the boxes are apart, negative
    /// when their x-intervals overlap.
    pub fn horizontal_gap(&self, other: &BBox) -> f32 {
        self.x1.max(other.x1) - self.x2.min(other.x2)
    }

    /// Signed vertical gap, same convention as [`BBox::horizontal_gap`].
    pub fn vertical_gap(&self, other: &BBox) -> f32 {
        self.y1.max(other.y1) - self.y2.min(other.y2)
    }

    /// Whether the vertical overlap exceeds `fraction` of the shorter height.
    pub fn shares_row(&self, other: &BBox, fraction: f32) -> bool {
        let shorter = self.height().min(other.height());
        shorter > 0.0 && self.vertical_overlap(other) > fraction * shorter
    }

    /// Euclidean distance between box centers.
    pub fn center_distance(&self, other: &BBox) -> f32 {
        let (ax, ay) = self.center();
        let (bx, by) = other.center();
        ((ax - bx).powi(2) + (ay - by).powi(2)).sqrt()
    }

    /// Euclidean distance between the closest edges (0 when overlapping).
    pub fn edge_distance(&self, other: &BBox) -> f32 {
        let dx = self.horizontal_gap(other).max(0.0);
        let dy = self.vertical_gap(other).max(0.0);
        (dx * dx + dy * dy).sqrt()
    }

    /// Horizontal slice covering characters `start..end` of a `total`-char
    /// string laid out evenly across this box.
    pub fn char_slice(&self, start: usize, end: usize, total: usize) -> BBox {
        if total == 0 {
            return *self;
        }
        let step = self.width() / total as f32;
        BBox {
            x1: self.x1 + step * start as f32,
            y1: self.y1,
            x2: self.x1 + step * end.min(total) as f32,
            y2: self.y2,
        }
    }
}
