//! Image preprocessing for the litter detector.
//!
//! Turns an encoded photo into the `[1, 3, size, size]` tensor YOLO-style detectors take: RGB
//! channel planes with samples scaled to `[0, 1]`.

use anyhow::Context;
use image::{imageops, imageops::FilterType, Rgb, RgbImage};
use ndarray::Array4;

use crate::rescale::{Letterbox, Rescaler};

/// Gray value used to pad letterboxed images.
const PAD_VALUE: u8 = 114;

/// How an image is fit into the detector's square input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResizeMode {
    /// Resize to the square without preserving the aspect ratio.
    #[default]
    Stretch,

    /// Scale uniformly to fit, center, and pad the remaining space.
    Letterbox,
}

/// A preprocessed image, ready for inference.
#[derive(Debug, Clone)]
pub struct Preprocessed {
    /// `[1, 3, size, size]` input tensor.
    pub tensor: Array4<f32>,
    pub original_width: u32,
    pub original_height: u32,
    /// Maps detector boxes back into the original image.
    pub rescaler: Rescaler,
}

/// Decodes an encoded image (JPEG or PNG) and preprocesses it.
pub fn preprocess(data: &[u8], input_size: u32, mode: ResizeMode) -> anyhow::Result<Preprocessed> {
    let image = image::load_from_memory(data)
        .context("failed to decode image")?
        .to_rgb8();
    preprocess_image(&image, input_size, mode)
}

/// Preprocesses an already decoded image.
pub fn preprocess_image(
    image: &RgbImage,
    input_size: u32,
    mode: ResizeMode,
) -> anyhow::Result<Preprocessed> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        anyhow::bail!("cannot preprocess an empty {width}x{height} image");
    }
    if input_size == 0 {
        anyhow::bail!("detector input size must be non-zero");
    }

    let (canvas, rescaler) = match mode {
        ResizeMode::Stretch => (
            imageops::resize(image, input_size, input_size, FilterType::Triangle),
            Rescaler::stretch(input_size, width, height),
        ),
        ResizeMode::Letterbox => {
            let lb = Letterbox::new(input_size, width, height);
            let resized = imageops::resize(image, lb.width, lb.height, FilterType::Triangle);
            let mut canvas = RgbImage::from_pixel(input_size, input_size, Rgb([PAD_VALUE; 3]));
            imageops::overlay(&mut canvas, &resized, lb.pad_x.into(), lb.pad_y.into());
            (canvas, Rescaler::from(lb))
        }
    };
    log::trace!(
        "preprocessed {}x{} image to {}x{} ({:?})",
        width,
        height,
        input_size,
        input_size,
        mode
    );

    let size = input_size as usize;
    let tensor = Array4::from_shape_fn((1, 3, size, size), |(_, c, y, x)| {
        f32::from(canvas.get_pixel(x as u32, y as u32)[c]) / 255.0
    });

    Ok(Preprocessed {
        tensor,
        original_width: width,
        original_height: height,
        rescaler,
    })
}
