//! Mapping of boxes from network input space back into the submitted image.
//!
//! The detector sees a square `input_size`×`input_size` image. How a box in that square maps back
//! to the original photo depends on how the photo was resized:
//!
//! - **stretch**: the photo is resized to the square without preserving its aspect ratio. Each
//!   axis is scaled independently.
//! - **letterbox**: the photo is scaled uniformly to fit the square and centered, the remaining
//!   space is padded. The padding has to be removed before scaling.

use plog_geom::BoundingBox;

/// The default side length of the detector's square input.
pub const DEFAULT_INPUT_SIZE: u32 = 640;

/// Maps boxes from network input space to original image pixels.
///
/// A box is mapped by first moving it by `(-pad_x, -pad_y)` and then scaling each axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rescaler {
    scale_x: f32,
    scale_y: f32,
    pad_x: f32,
    pad_y: f32,
}

impl Rescaler {
    /// A rescaler that leaves boxes unchanged.
    pub const IDENTITY: Self = Self {
        scale_x: 1.0,
        scale_y: 1.0,
        pad_x: 0.0,
        pad_y: 0.0,
    };

    /// Creates a rescaler for an image that was stretched to `input_size`×`input_size`.
    pub fn stretch(input_size: u32, original_width: u32, original_height: u32) -> Self {
        Self {
            scale_x: original_width as f32 / input_size as f32,
            scale_y: original_height as f32 / input_size as f32,
            pad_x: 0.0,
            pad_y: 0.0,
        }
    }

    /// Creates a rescaler for an image that was letterboxed into `input_size`×`input_size`.
    ///
    /// # Panics
    ///
    /// Panics if `input_size` is 0.
    pub fn letterbox(input_size: u32, original_width: u32, original_height: u32) -> Self {
        Self::from(Letterbox::new(input_size, original_width, original_height))
    }

    pub fn scale_x(&self) -> f32 {
        self.scale_x
    }

    pub fn scale_y(&self) -> f32 {
        self.scale_y
    }

    /// Returns the padding removed before scaling, in input space pixels.
    pub fn padding(&self) -> (f32, f32) {
        (self.pad_x, self.pad_y)
    }

    /// Maps `rect` from input space to original image space.
    pub fn apply(&self, rect: BoundingBox) -> BoundingBox {
        rect.move_by(-self.pad_x, -self.pad_y)
            .scale(self.scale_x, self.scale_y)
    }
}

impl Default for Rescaler {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Geometry of a letterbox resize.
///
/// The preprocessor uses this to place the image, the [`Rescaler`] to undo the placement, so both
/// always agree on rounding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    /// Uniform factor from original pixels to input pixels.
    pub scale: f32,
    pub width: u32,
    pub height: u32,
    pub pad_x: u32,
    pub pad_y: u32,
}

impl Letterbox {
    /// Computes where an `original_width`×`original_height` image lands in the square input.
    ///
    /// # Panics
    ///
    /// Panics if `input_size` is 0.
    pub fn new(input_size: u32, original_width: u32, original_height: u32) -> Self {
        assert!(input_size > 0, "letterbox input size must be non-zero");
        let scale = f32::min(
            input_size as f32 / original_width as f32,
            input_size as f32 / original_height as f32,
        );
        let width = ((original_width as f32 * scale).round() as u32).clamp(1, input_size);
        let height = ((original_height as f32 * scale).round() as u32).clamp(1, input_size);
        Self {
            scale,
            width,
            height,
            pad_x: (input_size - width) / 2,
            pad_y: (input_size - height) / 2,
        }
    }
}

impl From<Letterbox> for Rescaler {
    fn from(lb: Letterbox) -> Self {
        Self {
            scale_x: 1.0 / lb.scale,
            scale_y: 1.0 / lb.scale,
            pad_x: lb.pad_x as f32,
            pad_y: lb.pad_y as f32,
        }
    }
}
