//! Axis-aligned bounding boxes.

use std::fmt;

use approx::{AbsDiffEq, RelativeEq};

/// An axis-aligned rectangle in corner representation.
///
/// Boxes always satisfy `x1 <= x2` and `y1 <= y2`. Zero-sized boxes are allowed.
#[derive(Clone, Copy, PartialEq)]
pub struct BoundingBox {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
}

impl BoundingBox {
    /// Creates a box extending outwards from a center point.
    ///
    /// This is the representation YOLO-style detectors output. A negative `width` or `height` is
    /// treated as its absolute value, so the corner order invariant holds for any network output.
    #[inline]
    pub fn from_center(x_center: f32, y_center: f32, width: f32, height: f32) -> Self {
        let (half_w, half_h) = (width.abs() * 0.5, height.abs() * 0.5);
        Self {
            x1: x_center - half_w,
            y1: y_center - half_h,
            x2: x_center + half_w,
            y2: y_center + half_h,
        }
    }

    /// Creates a box from its top-left and bottom-right corners.
    ///
    /// # Panics
    ///
    /// Panics if `x1 > x2` or `y1 > y2`.
    pub fn from_corners(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        assert!(x1 <= x2, "x1={}, x2={}", x1, x2);
        assert!(y1 <= y2, "y1={}, y2={}", y1, y2);
        Self { x1, y1, x2, y2 }
    }

    #[inline]
    pub fn x1(&self) -> f32 {
        self.x1
    }

    #[inline]
    pub fn y1(&self) -> f32 {
        self.y1
    }

    #[inline]
    pub fn x2(&self) -> f32 {
        self.x2
    }

    #[inline]
    pub fn y2(&self) -> f32 {
        self.y2
    }

    /// Returns the corners as `[x1, y1, x2, y2]`.
    #[inline]
    pub fn to_array(&self) -> [f32; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    #[inline]
    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    #[inline]
    pub fn center(&self) -> (f32, f32) {
        ((self.x1 + self.x2) * 0.5, (self.y1 + self.y2) * 0.5)
    }

    /// Multiplies every X coordinate by `scale_x` and every Y coordinate by `scale_y`.
    ///
    /// Both factors must be non-negative, otherwise the corner order would flip.
    #[must_use]
    pub fn scale(&self, scale_x: f32, scale_y: f32) -> Self {
        debug_assert!(scale_x >= 0.0 && scale_y >= 0.0);
        Self {
            x1: self.x1 * scale_x,
            y1: self.y1 * scale_y,
            x2: self.x2 * scale_x,
            y2: self.y2 * scale_y,
        }
    }

    #[must_use]
    pub fn move_by(&self, dx: f32, dy: f32) -> Self {
        Self {
            x1: self.x1 + dx,
            y1: self.y1 + dy,
            x2: self.x2 + dx,
            y2: self.y2 + dy,
        }
    }

    /// Computes the area covered by both `self` and `other`.
    ///
    /// Non-overlapping boxes have an intersection area of 0.
    pub fn intersection_area(&self, other: &Self) -> f32 {
        let w = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let h = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        w * h
    }

    pub fn union_area(&self, other: &Self) -> f32 {
        self.area() + other.area() - self.intersection_area(other)
    }

    /// Computes the Intersection over Union (IoU) of `self` and `other`.
    ///
    /// Returns 0.0 if the union is empty (both boxes have zero area).
    pub fn iou(&self, other: &Self) -> f32 {
        let union = self.union_area(other);
        if union > 0.0 {
            self.intersection_area(other) / union
        } else {
            0.0
        }
    }
}

impl fmt::Debug for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BoundingBox ({},{})-({},{})",
            self.x1, self.y1, self.x2, self.y2
        )
    }
}

impl AbsDiffEq for BoundingBox {
    type Epsilon = f32;

    fn default_epsilon() -> f32 {
        f32::default_epsilon()
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: f32) -> bool {
        self.to_array()
            .iter()
            .zip(other.to_array())
            .all(|(a, b)| a.abs_diff_eq(&b, epsilon))
    }
}

impl RelativeEq for BoundingBox {
    fn default_max_relative() -> f32 {
        f32::default_max_relative()
    }

    fn relative_eq(&self, other: &Self, epsilon: f32, max_relative: f32) -> bool {
        self.to_array()
            .iter()
            .zip(other.to_array())
            .all(|(a, b)| a.relative_eq(&b, epsilon, max_relative))
    }
}
