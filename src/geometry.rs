//! Point and bounding-box primitives
//!
//! All coordinates are PDF user space: origin at the bottom-left of the page,
//! Y grows upward. A box's `top` is therefore never less than its `bottom`.

use serde::Serialize;

/// A point on the page
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point
    pub fn distance(&self, other: &Point) -> f32 {
        ((other.x - self.x).powi(2) + (other.y - self.y).powi(2)).sqrt()
    }
}

/// Axis-aligned bounding box (bottom-up Y axis)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
}

impl BoundingBox {
    pub fn new(left: f32, right: f32, top: f32, bottom: f32) -> Self {
        Self {
            left,
            right,
            top,
            bottom,
        }
    }

    pub fn height(&self) -> f32 {
        self.top - self.bottom
    }

    /// Visually top-left corner
    pub fn top_left(&self) -> Point {
        Point::new(self.left, self.top)
    }

    /// Whether the point lies inside the box, edges included
    pub fn contains(&self, pt: Point) -> bool {
        pt.x >= self.left && pt.x <= self.right && pt.y >= self.bottom && pt.y <= self.top
    }

    /// Smallest box covering both boxes
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            left: self.left.min(other.left),
            right: self.right.max(other.right),
            top: self.top.max(other.top),
            bottom: self.bottom.min(other.bottom),
        }
    }

    /// Whether the horizontal extents of the two boxes overlap
    pub fn overlaps_horizontally(&self, other: &BoundingBox) -> bool {
        self.left <= other.right && other.left <= self.right
    }

    /// Whether this box lies entirely below `other`'s bottom edge
    pub fn is_below(&self, other: &BoundingBox) -> bool {
        self.top < other.bottom && self.bottom < other.bottom
    }
}
