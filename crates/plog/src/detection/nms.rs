//! Non-Maximum Suppression.
//!
//! Grid-based detectors like YOLO predict every object from several neighbouring grid cells and
//! anchors, so a single bottle typically shows up as a cluster of overlapping candidates.
//! Non-Maximum Suppression (NMS) keeps the most confident candidate of each cluster and removes
//! the others.
//!
//! Whether candidates of *different* classes may suppress each other is selected with
//! [`SuppressionScope`]. Comparing across classes removes double-classifications of one object
//! (eg. a bottle that is also scored as "Other plastic"), but can also remove a real object that
//! happens to overlap an object of another category.

use std::cmp::Reverse;

use plog_geom::{num::TotalF32, BoundingBox};

use super::ScoredCandidate;

/// Which candidates are compared with each other during suppression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum SuppressionScope {
    /// Only candidates with the same class can suppress each other.
    #[default]
    PerClass,

    /// Any candidate can suppress any other, regardless of class.
    CrossClass,
}

/// A greedy non-maximum suppression algorithm.
#[derive(Debug, Clone)]
pub struct NonMaxSuppression {
    iou_thresh: f32,
    scope: SuppressionScope,
}

impl NonMaxSuppression {
    /// The default intersection-over-union threshold at which two candidates are considered
    /// duplicates.
    pub const DEFAULT_IOU_THRESH: f32 = 0.5;

    /// Creates a suppressor using [`Self::DEFAULT_IOU_THRESH`] and [`SuppressionScope::PerClass`].
    pub fn new() -> Self {
        Self {
            iou_thresh: Self::DEFAULT_IOU_THRESH,
            scope: SuppressionScope::default(),
        }
    }

    /// Sets the intersection-over-union threshold. Candidates overlapping a kept candidate with an
    /// IoU of at least `iou_thresh` are removed.
    pub fn set_iou_thresh(&mut self, iou_thresh: f32) {
        self.iou_thresh = iou_thresh;
    }

    pub fn iou_thresh(&self) -> f32 {
        self.iou_thresh
    }

    pub fn set_scope(&mut self, scope: SuppressionScope) {
        self.scope = scope;
    }

    pub fn scope(&self) -> SuppressionScope {
        self.scope
    }

    /// Performs non-maximum suppression on `candidates`.
    ///
    /// The kept candidates are returned by descending confidence. Equal confidences keep their
    /// input order, which makes the result fully deterministic.
    pub fn process(&self, candidates: Vec<ScoredCandidate>) -> Vec<ScoredCandidate> {
        let before = candidates.len();
        let mut remaining = candidates
            .into_iter()
            .enumerate()
            .map(|(index, candidate)| Ranked {
                index,
                rect: candidate.bounding_box(),
                candidate,
            })
            .collect::<Vec<_>>();

        // Sort by ascending confidence, process highest confidence first by starting at the back.
        // Among equal confidences the earliest input sits at the back.
        remaining.sort_unstable_by_key(|r| (TotalF32(r.candidate.confidence()), Reverse(r.index)));

        let mut kept = Vec::new();
        while let Some(seed) = remaining.pop() {
            remaining.retain(|other| {
                if self.scope == SuppressionScope::PerClass
                    && other.candidate.class_id() != seed.candidate.class_id()
                {
                    return true;
                }
                seed.rect.iou(&other.rect) < self.iou_thresh
            });
            kept.push(seed.candidate);
        }

        log::trace!(
            "NMS ({:?}, iou>={}) kept {}/{} candidates",
            self.scope,
            self.iou_thresh,
            kept.len(),
            before
        );
        kept
    }
}

impl Default for NonMaxSuppression {
    fn default() -> Self {
        Self::new()
    }
}

struct Ranked {
    index: usize,
    rect: BoundingBox,
    candidate: ScoredCandidate,
}
