//! Geometry primitives for object detection.
//!
//! Boxes produced by a detector live in two coordinate systems: the square input space of the
//! neural network, and the pixel space of the photo that was submitted. [`BoundingBox`] is used
//! for both; [`BoundingBox::scale`] and [`BoundingBox::move_by`] convert between them.

pub mod num;
pub mod rect;

pub use rect::BoundingBox;
