//! Decoding of raw object detector output.
//!
//! A YOLO-style detector emits a fixed number of candidate boxes per image, most of which are
//! background noise or duplicates of each other. The submodules turn that output into a short list
//! of distinct, confident candidates:
//!
//! - [`candidate`] reads one [`ScoredCandidate`] per row of the raw tensor,
//! - [`filter`] drops candidates below the confidence threshold,
//! - [`nms`] removes duplicate detections of the same object.
//!
//! The surviving candidates are then mapped back into the submitted photo by
//! [`crate::rescale`] and turned into [`Detection`]s.

pub mod candidate;
pub mod filter;
pub mod nms;

use plog_geom::BoundingBox;

/// A detector candidate with its most likely class resolved.
///
/// Coordinates are in the network's input space (`[0, input_size]`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredCandidate {
    center_x: f32,
    center_y: f32,
    width: f32,
    height: f32,
    class_id: usize,
    confidence: f32,
}

impl ScoredCandidate {
    pub fn new(
        center_x: f32,
        center_y: f32,
        width: f32,
        height: f32,
        class_id: usize,
        confidence: f32,
    ) -> Self {
        Self {
            center_x,
            center_y,
            width,
            height,
            class_id,
            confidence,
        }
    }

    pub fn center(&self) -> (f32, f32) {
        (self.center_x, self.center_y)
    }

    pub fn size(&self) -> (f32, f32) {
        (self.width, self.height)
    }

    pub fn class_id(&self) -> usize {
        self.class_id
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    /// Returns the candidate's box in corner representation.
    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_center(self.center_x, self.center_y, self.width, self.height)
    }
}

/// A detected litter item.
///
/// The bounding box is in pixel coordinates of the original (pre-resize) image.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    category: String,
    class_id: usize,
    confidence: f32,
    bbox: BoundingBox,
}

impl Detection {
    pub fn new(category: String, class_id: usize, confidence: f32, bbox: BoundingBox) -> Self {
        Self {
            category,
            class_id,
            confidence,
            bbox,
        }
    }

    /// Returns the category name from the label table.
    pub fn category(&self) -> &str {
        &self.category
    }

    /// Returns the raw class index the network assigned.
    pub fn class_id(&self) -> usize {
        self.class_id
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn bounding_box(&self) -> BoundingBox {
        self.bbox
    }
}
