//! Confidence thresholding.

use super::ScoredCandidate;

/// Keeps the candidates whose confidence is strictly greater than `threshold`.
///
/// Order is preserved. Candidates with a NaN confidence never pass.
pub fn retain_confident(
    mut candidates: Vec<ScoredCandidate>,
    threshold: f32,
) -> Vec<ScoredCandidate> {
    let before = candidates.len();
    candidates.retain(|cand| cand.confidence() > threshold);
    log::trace!(
        "{}/{} candidates above confidence {}",
        candidates.len(),
        before,
        threshold
    );
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_confidences(confidences: &[f32]) -> Vec<ScoredCandidate> {
        confidences
            .iter()
            .enumerate()
            .map(|(i, &c)| ScoredCandidate::new(i as f32, 0.0, 1.0, 1.0, 0, c))
            .collect()
    }

    #[test]
    fn threshold_is_exclusive() {
        let kept = retain_confident(with_confidences(&[0.5, 0.50001, 0.49, 0.9]), 0.5);
        let confidences = kept.iter().map(|c| c.confidence()).collect::<Vec<_>>();
        assert_eq!(confidences, [0.50001, 0.9]);
    }

    #[test]
    fn preserves_order() {
        let kept = retain_confident(with_confidences(&[0.9, 0.1, 0.8, 0.7]), 0.5);
        let xs = kept.iter().map(|c| c.center().0).collect::<Vec<_>>();
        assert_eq!(xs, [0.0, 2.0, 3.0]);
    }

    #[test]
    fn drops_nan() {
        let kept = retain_confident(with_confidences(&[f32::NAN, 0.6]), 0.1);
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn never_grows() {
        let mut rng = fastrand::Rng::with_seed(3);
        for _ in 0..100 {
            let confidences = (0..rng.usize(0..40)).map(|_| rng.f32()).collect::<Vec<_>>();
            let threshold = rng.f32();
            let kept = retain_confident(with_confidences(&confidences), threshold);
            assert!(kept.len() <= confidences.len());
            assert!(kept.iter().all(|c| c.confidence() > threshold));
        }
    }
}
