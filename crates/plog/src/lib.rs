//! Litter detection post-processing.
//!
//! Turns the raw output of a YOLO-style litter detector into a [`DetectionSummary`]: the number
//! of items per litter category, and the points they are worth.
//!
//! The core of the crate is the [`Decoder`], which extracts candidates from the raw tensor,
//! filters them by confidence, runs non-maximum suppression, maps class ids to category names and
//! rescales boxes to the original image. [`classifier::Classifier`] wraps the decoder together with
//! image preprocessing and an inference [`classifier::Engine`].
//!
//! # Coordinates
//!
//! Detector outputs are in input-tensor pixel space (`640x640` by default). Decoded
//! [`Detection`](detection::Detection)s are in the pixel space of the original photo, with Y
//! pointing down.
//!
//! # Environment Variables
//!
//! [`DecoderConfig::from_env`] reads the following variables:
//!
//! * `PLOG_LABELS`: Path to a label file with one category name per line, indexed by class id.
//!   Defaults to the built-in 18 litter categories.
//! * `PLOG_POINTS`: Path to a points file with one `<category> <points>` entry per line.
//!   Defaults to the built-in litter point table.
//! * `PLOG_INPUT_SIZE`: Side length of the square detector input. Defaults to 640.

use log::LevelFilter;

pub mod category;
pub mod classifier;
pub mod config;
pub mod detection;
pub mod error;
pub mod pipeline;
pub mod preprocess;
pub mod rescale;
pub mod timer;

#[cfg(test)]
mod test;

pub use category::DetectionSummary;
pub use config::DecoderConfig;
pub use error::DecodeError;
pub use pipeline::{decode_detections, Decoder, Thresholds};
pub use plog_geom::BoundingBox;

/// macro-use only, not part of public API.
#[doc(hidden)]
pub fn init_logger(calling_crate: &'static str) {
    let log_level = if cfg!(debug_assertions) {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter(Some(calling_crate), log_level)
        .filter(Some(env!("CARGO_PKG_NAME")), log_level)
        .parse_default_env()
        .try_init()
        .ok();
}

/// Initializes logging to *stderr*.
///
/// If `cfg!(debug_assertions)` is enabled, the calling crate and plog will log at *debug* level.
/// Otherwise, they will log at *info* level. `RUST_LOG` overrides both.
///
/// If a global logger is already registered, this macro will do nothing.
#[macro_export]
macro_rules! init_logger {
    () => {
        $crate::init_logger(env!("CARGO_CRATE_NAME"))
    };
}
