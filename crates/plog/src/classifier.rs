//! End-to-end classification of litter photos.
//!
//! A [`Classifier`] runs an encoded photo through the preprocessor, an inference [`Engine`] and the
//! [`Decoder`]. The engine is the only stateful part and is locked for the duration of a single
//! inference; preprocessing and decoding of concurrent requests run in parallel.

use std::sync::Mutex;

use anyhow::anyhow;
use ndarray::{Array3, ArrayView4};

use crate::{
    category::DetectionSummary,
    detection::candidate::unbatch,
    error::DecodeError,
    pipeline::{Decoder, Thresholds},
    preprocess::{preprocess, ResizeMode},
    timer::Timer,
};

/// A neural network runtime executing the litter detection model.
///
/// Inference runtimes are frequently not re-entrant, so `infer` takes `&mut self` and the
/// [`Classifier`] serializes calls.
pub trait Engine: Send {
    /// Runs the model on a `[1, 3, H, W]` input tensor.
    ///
    /// Returns the raw `[1][..][..]` output in the layout the [`Decoder`] was configured with.
    fn infer(&mut self, input: ArrayView4<'_, f32>) -> anyhow::Result<Array3<f32>>;
}

impl<F> Engine for F
where
    F: FnMut(ArrayView4<'_, f32>) -> anyhow::Result<Array3<f32>> + Send,
{
    fn infer(&mut self, input: ArrayView4<'_, f32>) -> anyhow::Result<Array3<f32>> {
        self(input)
    }
}

/// Classifies litter in encoded photos.
pub struct Classifier {
    engine: Mutex<Box<dyn Engine>>,
    decoder: Decoder,
    resize: ResizeMode,
    t_preprocess: Timer,
    t_infer: Timer,
    t_decode: Timer,
}

impl Classifier {
    pub fn new<E: Engine + 'static>(engine: E, decoder: Decoder) -> Self {
        Self {
            engine: Mutex::new(Box::new(engine)),
            decoder,
            resize: ResizeMode::default(),
            t_preprocess: Timer::new("preprocess"),
            t_infer: Timer::new("infer"),
            t_decode: Timer::new("decode"),
        }
    }

    /// Sets how photos are fit into the detector input. Defaults to [`ResizeMode::Stretch`].
    pub fn set_resize_mode(&mut self, resize: ResizeMode) {
        self.resize = resize;
    }

    pub fn decoder(&self) -> &Decoder {
        &self.decoder
    }

    /// Classifies the litter in an encoded (JPEG or PNG) photo.
    ///
    /// Errors from decoding the raw output are [`DecodeError`]s and can be recovered with
    /// [`anyhow::Error::downcast_ref`].
    pub fn classify(&self, image: &[u8], thresholds: Thresholds) -> anyhow::Result<DetectionSummary> {
        let input = self.t_preprocess.time(|| {
            preprocess(image, self.decoder.config().input_size(), self.resize)
        })?;

        let output = self.t_infer.time(|| -> anyhow::Result<_> {
            let mut engine = self
                .engine
                .lock()
                .map_err(|_| anyhow!("inference engine poisoned by an earlier panic"))?;
            engine.infer(input.tensor.view())
        })?;

        let summary = self.t_decode.time(|| -> Result<_, DecodeError> {
            let raw = unbatch(output.view())?;
            let detections = self.decoder.decode_with(raw, input.rescaler, thresholds)?;
            Ok(self.decoder.summarize(&detections))
        })?;

        log::debug!(
            "classified {}x{} image: {} items, {} points",
            input.original_width,
            input.original_height,
            summary.total_items(),
            summary.total_score()
        );
        Ok(summary)
    }

    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        [&self.t_preprocess, &self.t_infer, &self.t_decode].into_iter()
    }
}
