//! Candidate extraction.
//!
//! YOLO-style detectors output one row of attributes per candidate: the box as
//! `[center_x, center_y, width, height]`, followed by the class scores. Single-class models have
//! exactly one score per row, multi-class models one score per class.

use ndarray::{s, ArrayView1, ArrayView2, ArrayView3, Axis};

use crate::error::DecodeError;

use super::ScoredCandidate;

/// Number of box attributes preceding the scores in every row.
pub const BOX_ATTRIBUTES: usize = 4;

/// Memory layout of a 2-dimensional detector output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TensorLayout {
    /// `[num_candidates][4 + num_classes]`, one row per candidate.
    #[default]
    CandidateMajor,

    /// `[4 + num_classes][num_candidates]`, one row per attribute.
    ///
    /// This is what YOLOv8 ONNX exports produce. The tensor is read transposed, without copying.
    AttributeMajor,
}

/// Removes the batch axis from a `[1][..][..]` model output.
pub fn unbatch(output: ArrayView3<'_, f32>) -> Result<ArrayView2<'_, f32>, DecodeError> {
    match output.len_of(Axis(0)) {
        1 => Ok(output.index_axis_move(Axis(0), 0)),
        n => Err(DecodeError::malformed(format!(
            "expected an output batch of 1 image, got {n}"
        ))),
    }
}

/// Reads one [`ScoredCandidate`] per candidate row of `raw`, preserving order.
///
/// For multi-class rows, the candidate's class is the one with the highest score; equal scores
/// resolve to the lowest class index.
pub fn extract(
    raw: ArrayView2<'_, f32>,
    layout: TensorLayout,
) -> Result<Vec<ScoredCandidate>, DecodeError> {
    let rows = match layout {
        TensorLayout::CandidateMajor => raw,
        TensorLayout::AttributeMajor => raw.reversed_axes(),
    };

    let (num_candidates, row_len) = rows.dim();
    if num_candidates == 0 {
        return Err(DecodeError::malformed("tensor contains no candidates"));
    }
    if row_len <= BOX_ATTRIBUTES {
        return Err(DecodeError::malformed(format!(
            "candidates have {row_len} attributes, at least {} are required",
            BOX_ATTRIBUTES + 1
        )));
    }

    let candidates = rows
        .outer_iter()
        .map(|row| {
            let (class_id, confidence) = best_class(row.slice(s![BOX_ATTRIBUTES..]));
            ScoredCandidate::new(row[0], row[1], row[2], row[3], class_id, confidence)
        })
        .collect::<Vec<_>>();

    log::trace!(
        "extracted {} candidates with {} classes",
        candidates.len(),
        row_len - BOX_ATTRIBUTES
    );
    Ok(candidates)
}

fn best_class(scores: ArrayView1<'_, f32>) -> (usize, f32) {
    let mut best = (0, scores[0]);
    for (class_id, &score) in scores.iter().enumerate().skip(1) {
        // strict comparison keeps the first of several equal maxima
        if score > best.1 {
            best = (class_id, score);
        }
    }
    best
}
