use std::{collections::BTreeMap, fs, path::PathBuf, sync::Arc};

use approx::assert_abs_diff_eq;
use ndarray::Array2;
use plog::{
    category::{LabelTable, ScoringTable},
    detection::{candidate::TensorLayout, nms::SuppressionScope},
    BoundingBox, DecodeError, Decoder, DecoderConfig, DetectionSummary, Thresholds,
};
use rayon::prelude::*;

const NUM_CLASSES: usize = 18;
const BOTTLE_CAP: usize = 1;
const BOTTLE: usize = 2;
const CAN: usize = 4;
const CUP: usize = 7;

fn row(cx: f32, cy: f32, w: f32, h: f32, class_id: usize, confidence: f32) -> Vec<f32> {
    let mut row = vec![cx, cy, w, h];
    row.extend((0..NUM_CLASSES).map(|i| if i == class_id { confidence } else { 0.0 }));
    row
}

fn tensor(rows: &[Vec<f32>]) -> Array2<f32> {
    let width = rows.first().map_or(4 + NUM_CLASSES, Vec::len);
    Array2::from_shape_vec((rows.len(), width), rows.concat()).unwrap()
}

/// Horizontal offset between two 50x50 boxes that makes them overlap with the given IoU.
fn offset_for_iou(iou: f32) -> f32 {
    50.0 * (1.0 - iou) / (1.0 + iou)
}

fn decoder() -> Decoder {
    Decoder::new(Arc::new(DecoderConfig::litter()))
}

fn temp_file(contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "plog-test-{}-{}",
        std::process::id(),
        fastrand::u64(..)
    ));
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn single_box_in_input_space() {
    let raw = tensor(&[vec![100.0, 100.0, 50.0, 50.0, 0.9]]);
    let config = DecoderConfig::new(LabelTable::new(["Aluminium foil"]))
        .with_scores(ScoringTable::litter());
    let decoder = Decoder::new(Arc::new(config));

    let detections = decoder
        .decode(raw.view(), 640, 640, Thresholds::new(0.1))
        .unwrap();
    assert_eq!(detections.len(), 1);
    assert_eq!(detections[0].category(), "Aluminium foil");
    assert_eq!(detections[0].class_id(), 0);
    assert_abs_diff_eq!(
        detections[0].bounding_box(),
        BoundingBox::from_corners(75.0, 75.0, 125.0, 125.0),
        epsilon = 1e-4
    );

    let summary = decoder.summarize(&detections);
    assert_eq!(summary.count("Aluminium foil"), 1);
    assert_eq!(summary.total_score(), 2);

    // without a points table every item is worth the default weight
    let plain = Decoder::new(Arc::new(DecoderConfig::new(LabelTable::new(["Aluminium foil"]))))
        .decode_detections(raw.view(), 640, 640, Thresholds::new(0.1))
        .unwrap();
    assert_eq!(plain.total_score(), u64::from(ScoringTable::DEFAULT_WEIGHT));
}

#[test]
fn strongly_overlapping_duplicate_is_suppressed() {
    let d = offset_for_iou(0.8);
    let raw = tensor(&[
        row(300.0, 300.0, 50.0, 50.0, CAN, 0.6),
        row(300.0 + d, 300.0, 50.0, 50.0, CAN, 0.9),
    ]);
    let detections = decoder()
        .decode(raw.view(), 640, 640, Thresholds::new(0.5))
        .unwrap();
    assert_eq!(detections.len(), 1);
    assert_eq!(detections[0].confidence(), 0.9);
}

#[test]
fn weakly_overlapping_boxes_are_kept() {
    let d = offset_for_iou(0.3);
    let raw = tensor(&[
        row(300.0, 300.0, 50.0, 50.0, CAN, 0.9),
        row(300.0 + d, 300.0, 50.0, 50.0, CAN, 0.6),
    ]);
    let summary = decoder()
        .decode_detections(raw.view(), 640, 640, Thresholds::new(0.5))
        .unwrap();
    assert_eq!(summary.count("Can"), 2);
    assert_eq!(summary.total_score(), 8);
}

#[test]
fn bottle_caps_count_as_bottles() {
    let raw = tensor(&[
        row(100.0, 100.0, 40.0, 80.0, BOTTLE, 0.9),
        row(400.0, 400.0, 10.0, 10.0, BOTTLE_CAP, 0.8),
        // duplicates of both items, removed before the cap is merged into the bottles
        row(102.0, 101.0, 40.0, 80.0, BOTTLE, 0.7),
        row(400.5, 400.0, 10.0, 10.0, BOTTLE_CAP, 0.6),
    ]);
    let detections = decoder()
        .decode(raw.view(), 640, 640, Thresholds::new(0.5))
        .unwrap();
    assert_eq!(
        detections.iter().map(|d| d.category()).collect::<Vec<_>>(),
        ["Bottle", "Bottle cap"]
    );

    let summary = decoder()
        .decode_detections(raw.view(), 640, 640, Thresholds::new(0.5))
        .unwrap();

    let expected = BTreeMap::from([("Bottle".to_string(), 2)]);
    assert_eq!(summary.category_counts(), &expected);
    assert_eq!(summary.total_score(), 10);
}

#[test]
fn empty_tensor_is_malformed() {
    let raw = Array2::<f32>::zeros((0, 4 + NUM_CLASSES));
    let err = decoder()
        .decode(raw.view(), 640, 640, Thresholds::new(0.5))
        .unwrap_err();
    assert!(matches!(err, DecodeError::MalformedTensor(_)), "{err}");
}

#[test]
fn nothing_confident_is_an_empty_summary() {
    let raw = tensor(&[row(100.0, 100.0, 40.0, 40.0, CUP, 0.3)]);
    let summary = decoder()
        .decode_detections(raw.view(), 640, 640, Thresholds::new(0.5))
        .unwrap();
    assert_eq!(summary, DetectionSummary::empty());
}

#[test]
fn boxes_are_stretched_to_the_photo() {
    let raw = tensor(&[row(320.0, 320.0, 50.0, 50.0, CUP, 0.9)]);
    let detections = decoder()
        .decode(raw.view(), 1280, 960, Thresholds::new(0.5))
        .unwrap();
    assert_abs_diff_eq!(
        detections[0].bounding_box(),
        BoundingBox::from_corners(590.0, 442.5, 690.0, 517.5),
        epsilon = 1e-3
    );
}

#[test]
fn invalid_parameters() {
    let raw = tensor(&[row(100.0, 100.0, 40.0, 40.0, CUP, 0.9)]);
    let decoder = decoder();

    for (width, height, thresholds) in [
        (0, 480, Thresholds::new(0.5)),
        (640, 0, Thresholds::new(0.5)),
        (640, 480, Thresholds::new(0.0)),
        (640, 480, Thresholds::new(1.0)),
        (640, 480, Thresholds::new(0.5).with_iou(1.5)),
        (640, 480, Thresholds::new(f32::NAN)),
    ] {
        let err = decoder
            .decode(raw.view(), width, height, thresholds)
            .unwrap_err();
        assert!(
            matches!(err, DecodeError::InvalidParameter { .. }),
            "{width}x{height} {thresholds:?}: {err}"
        );
    }
}

#[test]
fn unknown_class_id() {
    let config = DecoderConfig::new(LabelTable::new(["only"]));
    let raw = tensor(&[vec![100.0, 100.0, 40.0, 40.0, 0.1, 0.2, 0.9]]);
    let err = Decoder::new(Arc::new(config))
        .decode(raw.view(), 640, 640, Thresholds::new(0.5))
        .unwrap_err();
    assert_eq!(
        err,
        DecodeError::UnknownClassId {
            class_id: 2,
            num_labels: 1
        }
    );
}

#[test]
fn suppression_scope() {
    let d = offset_for_iou(0.8);
    let raw = tensor(&[
        row(300.0, 300.0, 50.0, 50.0, CAN, 0.9),
        row(300.0 + d, 300.0, 50.0, 50.0, CUP, 0.8),
    ]);

    let per_class = decoder()
        .decode(raw.view(), 640, 640, Thresholds::new(0.5))
        .unwrap();
    assert_eq!(per_class.len(), 2);

    let config = DecoderConfig::litter().with_scope(SuppressionScope::CrossClass);
    let cross_class = Decoder::new(Arc::new(config))
        .decode(raw.view(), 640, 640, Thresholds::new(0.5))
        .unwrap();
    assert_eq!(cross_class.len(), 1);
    assert_eq!(cross_class[0].category(), "Can");
}

fn random_tensor(rng: &mut fastrand::Rng, num_candidates: usize) -> Array2<f32> {
    let rows = (0..num_candidates)
        .map(|_| {
            let mut row = vec![
                rng.f32() * 640.0,
                rng.f32() * 640.0,
                10.0 + rng.f32() * 200.0,
                10.0 + rng.f32() * 200.0,
            ];
            row.extend((0..NUM_CLASSES).map(|_| rng.f32()));
            row
        })
        .collect::<Vec<_>>();
    tensor(&rows)
}

#[test]
fn random_tensors() {
    let mut rng = fastrand::Rng::with_seed(0x6c69_7474_6572);
    let decoder = decoder();
    let scores = ScoringTable::litter();
    for _ in 0..50 {
        let num_candidates = rng.usize(1..200);
        let raw = random_tensor(&mut rng, num_candidates);
        let thresholds =
            Thresholds::new(0.1 + rng.f32() * 0.85).with_iou(0.2 + rng.f32() * 0.6);
        let detections = decoder.decode(raw.view(), 640, 640, thresholds).unwrap();

        assert!(detections.len() <= raw.nrows());
        assert!(detections
            .windows(2)
            .all(|w| w[0].confidence() >= w[1].confidence()));
        for (i, a) in detections.iter().enumerate() {
            assert!(a.confidence() > thresholds.confidence);
            for b in &detections[i + 1..] {
                if a.class_id() == b.class_id() {
                    assert!(a.bounding_box().iou(&b.bounding_box()) < thresholds.iou);
                }
            }
        }

        let summary = decoder.summarize(&detections);
        assert_eq!(summary.total_items(), detections.len());
        let expected_score = summary
            .category_counts()
            .iter()
            .map(|(category, &n)| n as u64 * u64::from(scores.weight(category)))
            .sum::<u64>();
        assert_eq!(summary.total_score(), expected_score);
    }
}

#[test]
fn attribute_major_matches_candidate_major() {
    let raw = random_tensor(&mut fastrand::Rng::with_seed(100), 100);
    let transposed = raw.t().to_owned();
    let thresholds = Thresholds::new(0.6);

    let by_row = decoder().decode(raw.view(), 800, 600, thresholds).unwrap();
    let by_column = decoder()
        .with_layout(TensorLayout::AttributeMajor)
        .decode(transposed.view(), 800, 600, thresholds)
        .unwrap();
    assert_eq!(by_row, by_column);
}

#[test]
fn concurrent_decoding_is_deterministic() {
    let decoder = decoder();
    let raw = random_tensor(&mut fastrand::Rng::with_seed(300), 300);
    let thresholds = Thresholds::new(0.7);
    let expected = decoder
        .decode_detections(raw.view(), 1920, 1080, thresholds)
        .unwrap();

    let results = (0..64)
        .into_par_iter()
        .map(|_| {
            decoder
                .decode_detections(raw.view(), 1920, 1080, thresholds)
                .unwrap()
        })
        .collect::<Vec<_>>();
    assert!(results.iter().all(|summary| *summary == expected));
}

#[test]
fn free_function_uses_given_config() {
    let raw = tensor(&[row(100.0, 100.0, 40.0, 40.0, CUP, 0.9)]);
    let summary =
        plog::decode_detections(&DecoderConfig::litter(), raw.view(), 640, 480, 0.5, 0.5).unwrap();
    assert_eq!(summary.count("Cup"), 1);
    assert_eq!(summary.total_score(), 3);
}

#[test]
fn tables_from_files() {
    let labels = temp_file("Bottle\n\nPlastic bag - wrapper \nCan\n");
    let points = temp_file("# custom points\nBottle 10\nPlastic bag - wrapper 7\n");

    let config = DecoderConfig::new(LabelTable::load(&labels).unwrap())
        .with_scores(ScoringTable::load(&points).unwrap());
    let raw = Array2::from_shape_vec(
        (3, 7),
        vec![
            100.0, 100.0, 40.0, 40.0, 0.9, 0.0, 0.0, //
            300.0, 300.0, 40.0, 40.0, 0.0, 0.8, 0.0, //
            500.0, 500.0, 40.0, 40.0, 0.0, 0.0, 0.7, //
        ],
    )
    .unwrap();
    let summary = Decoder::new(Arc::new(config))
        .decode_detections(raw.view(), 640, 640, Thresholds::new(0.5))
        .unwrap();

    fs::remove_file(labels).unwrap();
    fs::remove_file(points).unwrap();

    assert_eq!(summary.count("Plastic bag - wrapper"), 1);
    assert_eq!(summary.count("Can"), 1);
    // Can is not in the points file and falls back to the default weight.
    assert_eq!(summary.total_score(), 10 + 7 + u64::from(ScoringTable::DEFAULT_WEIGHT));
}

#[test]
fn empty_label_file_is_rejected() {
    let labels = temp_file("\n  \n");
    let result = LabelTable::load(&labels);
    fs::remove_file(labels).unwrap();
    assert!(result.is_err());
}
