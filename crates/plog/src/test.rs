//! Shared fixtures for unit tests.

use std::sync::Arc;

use crate::{config::DecoderConfig, pipeline::Decoder};

pub fn litter_decoder() -> Decoder {
    Decoder::new(Arc::new(DecoderConfig::litter()))
}

/// Encodes a solid-color image as PNG.
pub fn png(width: u32, height: u32) -> Vec<u8> {
    let image = image::RgbImage::from_pixel(width, height, image::Rgb([200, 30, 30]));
    let mut buf = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(image)
        .write_to(&mut buf, image::ImageOutputFormat::Png)
        .unwrap();
    buf.into_inner()
}
