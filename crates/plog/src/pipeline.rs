//! The detection decoding pipeline.
//!
//! ```text
//! raw tensor -> extract -> confidence filter -> NMS -> rescale -> categorize -> summary
//! ```
//!
//! Decoding is a pure function of the tensor, the thresholds and the [`DecoderConfig`], so a single
//! [`Decoder`] can be shared between any number of threads.

use std::sync::Arc;

use ndarray::ArrayView2;

use crate::{
    category::DetectionSummary,
    config::DecoderConfig,
    detection::{
        candidate::{self, TensorLayout},
        filter,
        nms::NonMaxSuppression,
        Detection,
    },
    error::DecodeError,
    rescale::Rescaler,
};

/// Per-call thresholds.
///
/// There is no default confidence threshold: useful values depend on the model and on whether
/// false positives or missed items are worse for the caller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    /// Candidates need a confidence strictly above this to be kept.
    pub confidence: f32,
    /// Candidates overlapping a more confident one with at least this IoU are removed.
    pub iou: f32,
}

impl Thresholds {
    pub const DEFAULT_IOU: f32 = NonMaxSuppression::DEFAULT_IOU_THRESH;

    /// Creates thresholds with the given confidence threshold and [`Self::DEFAULT_IOU`].
    pub fn new(confidence: f32) -> Self {
        Self {
            confidence,
            iou: Self::DEFAULT_IOU,
        }
    }

    pub fn with_iou(self, iou: f32) -> Self {
        Self { iou, ..self }
    }

    fn validate(&self) -> Result<(), DecodeError> {
        for (name, value) in [
            ("confidence_threshold", self.confidence),
            ("iou_threshold", self.iou),
        ] {
            if !(value > 0.0 && value < 1.0) {
                return Err(DecodeError::invalid(
                    name,
                    format!("{value} is not in the open interval (0, 1)"),
                ));
            }
        }
        Ok(())
    }
}

/// Decodes raw detector output into litter detections.
#[derive(Debug, Clone)]
pub struct Decoder {
    config: Arc<DecoderConfig>,
    layout: TensorLayout,
}

impl Decoder {
    /// Creates a decoder for tensors in [`TensorLayout::CandidateMajor`] layout.
    pub fn new(config: Arc<DecoderConfig>) -> Self {
        Self {
            config,
            layout: TensorLayout::default(),
        }
    }

    pub fn with_layout(self, layout: TensorLayout) -> Self {
        Self { layout, ..self }
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    pub fn layout(&self) -> TensorLayout {
        self.layout
    }

    fn pipeline(&self) -> Pipeline<'_> {
        Pipeline {
            config: &self.config,
            layout: self.layout,
        }
    }

    /// Decodes the output of a detector that was fed a stretched (not letterboxed) image.
    ///
    /// Returned detections are ordered by descending confidence and have their boxes in pixel
    /// coordinates of the `original_width`×`original_height` image.
    pub fn decode(
        &self,
        raw: ArrayView2<'_, f32>,
        original_width: u32,
        original_height: u32,
        thresholds: Thresholds,
    ) -> Result<Vec<Detection>, DecodeError> {
        self.pipeline()
            .decode(raw, original_width, original_height, thresholds)
    }

    /// Decodes detector output, mapping boxes back to the original image with `rescaler`.
    pub fn decode_with(
        &self,
        raw: ArrayView2<'_, f32>,
        rescaler: Rescaler,
        thresholds: Thresholds,
    ) -> Result<Vec<Detection>, DecodeError> {
        self.pipeline().decode_with(raw, rescaler, thresholds)
    }

    /// Aggregates `detections` into per-category counts and a total score.
    pub fn summarize(&self, detections: &[Detection]) -> DetectionSummary {
        self.pipeline().summarize(detections)
    }

    /// Decodes and summarizes in one step. See [`Decoder::decode`].
    pub fn decode_detections(
        &self,
        raw: ArrayView2<'_, f32>,
        original_width: u32,
        original_height: u32,
        thresholds: Thresholds,
    ) -> Result<DetectionSummary, DecodeError> {
        self.pipeline()
            .decode_detections(raw, original_width, original_height, thresholds)
    }
}

/// The decoding steps, borrowing the configuration they run with.
#[derive(Clone, Copy)]
struct Pipeline<'a> {
    config: &'a DecoderConfig,
    layout: TensorLayout,
}

impl Pipeline<'_> {
    fn decode(
        &self,
        raw: ArrayView2<'_, f32>,
        original_width: u32,
        original_height: u32,
        thresholds: Thresholds,
    ) -> Result<Vec<Detection>, DecodeError> {
        if original_width == 0 || original_height == 0 {
            return Err(DecodeError::invalid(
                "original_size",
                format!("image dimensions {original_width}x{original_height} must be non-zero"),
            ));
        }
        let rescaler = Rescaler::stretch(self.config.input_size(), original_width, original_height);
        self.decode_with(raw, rescaler, thresholds)
    }

    fn decode_with(
        &self,
        raw: ArrayView2<'_, f32>,
        rescaler: Rescaler,
        thresholds: Thresholds,
    ) -> Result<Vec<Detection>, DecodeError> {
        thresholds.validate()?;

        let candidates = candidate::extract(raw, self.layout)?;
        let num_candidates = candidates.len();
        let candidates = filter::retain_confident(candidates, thresholds.confidence);
        if candidates.is_empty() {
            log::debug!(
                "no candidate out of {} above confidence {}",
                num_candidates,
                thresholds.confidence
            );
            return Ok(Vec::new());
        }

        let mut nms = NonMaxSuppression::new();
        nms.set_iou_thresh(thresholds.iou);
        nms.set_scope(self.config.scope());
        let kept = nms.process(candidates);

        let labels = self.config.labels();
        let detections = kept
            .into_iter()
            .map(|cand| {
                let category = labels.resolve(cand.class_id())?;
                Ok(Detection::new(
                    category.to_string(),
                    cand.class_id(),
                    cand.confidence(),
                    rescaler.apply(cand.bounding_box()),
                ))
            })
            .collect::<Result<Vec<_>, DecodeError>>()?;

        log::debug!(
            "decoded {} detections from {} candidates",
            detections.len(),
            num_candidates
        );
        Ok(detections)
    }

    fn summarize(&self, detections: &[Detection]) -> DetectionSummary {
        DetectionSummary::from_detections(detections, self.config.merges(), self.config.scores())
    }

    fn decode_detections(
        &self,
        raw: ArrayView2<'_, f32>,
        original_width: u32,
        original_height: u32,
        thresholds: Thresholds,
    ) -> Result<DetectionSummary, DecodeError> {
        let detections = self.decode(raw, original_width, original_height, thresholds)?;
        Ok(self.summarize(&detections))
    }
}

/// Decodes a candidate-major detector output tensor into a [`DetectionSummary`].
///
/// Equivalent to [`Decoder::decode_detections`] for callers that do not keep a [`Decoder`] around.
/// `config` is borrowed for the duration of the call and never copied.
pub fn decode_detections(
    config: &DecoderConfig,
    raw: ArrayView2<'_, f32>,
    original_width: u32,
    original_height: u32,
    confidence_threshold: f32,
    iou_threshold: f32,
) -> Result<DetectionSummary, DecodeError> {
    let pipeline = Pipeline {
        config,
        layout: TensorLayout::CandidateMajor,
    };
    pipeline.decode_detections(
        raw,
        original_width,
        original_height,
        Thresholds::new(confidence_threshold).with_iou(iou_threshold),
    )
}
