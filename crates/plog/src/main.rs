//! Decodes a raw litter detector output tensor stored as JSON and prints the litter summary.

use std::{fs, path::PathBuf, sync::Arc};

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use ndarray::Array2;
use plog::{
    category::{LabelTable, ScoringTable},
    detection::{candidate::TensorLayout, nms::SuppressionScope, Detection},
    Decoder, DecoderConfig, Thresholds,
};
use serde::Deserialize;
use serde_json::json;

/// Decode raw litter detector output into per-category counts and points.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON file holding the raw output, either `[[f32]]` or `[[[f32]]]` with a batch size of 1
    #[arg(long, value_name = "FILE")]
    tensor: PathBuf,

    /// Width of the original photo in pixels
    #[arg(long)]
    width: u32,

    /// Height of the original photo in pixels
    #[arg(long)]
    height: u32,

    /// Minimum confidence for a candidate to be kept (exclusive)
    #[arg(long, default_value_t = 0.5, value_name = "THRESHOLD")]
    confidence: f32,

    /// IoU at or above which overlapping candidates are suppressed
    #[arg(long, default_value_t = Thresholds::DEFAULT_IOU, value_name = "THRESHOLD")]
    iou: f32,

    /// Memory layout of the output tensor
    #[arg(long, value_enum, default_value_t = Layout::Candidate)]
    layout: Layout,

    /// Suppress overlapping boxes even if they belong to different categories
    #[arg(long)]
    cross_class: bool,

    /// Label file overriding the built-in litter categories
    #[arg(long, value_name = "FILE")]
    labels: Option<PathBuf>,

    /// Points file overriding the built-in point system
    #[arg(long, value_name = "FILE")]
    points: Option<PathBuf>,

    /// Also print every individual detection
    #[arg(long)]
    detections: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum Layout {
    /// One row of `[cx, cy, w, h, scores...]` per candidate
    Candidate,
    /// One row per attribute, one column per candidate
    Attribute,
}

impl From<Layout> for TensorLayout {
    fn from(layout: Layout) -> Self {
        match layout {
            Layout::Candidate => TensorLayout::CandidateMajor,
            Layout::Attribute => TensorLayout::AttributeMajor,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TensorFile {
    Rows(Vec<Vec<f32>>),
    Batched(Vec<Vec<Vec<f32>>>),
}

impl TensorFile {
    fn into_array(self) -> anyhow::Result<Array2<f32>> {
        let rows = match self {
            TensorFile::Rows(rows) => rows,
            TensorFile::Batched(mut batch) => {
                if batch.len() != 1 {
                    bail!("expected a batch size of 1, got {}", batch.len());
                }
                batch.remove(0)
            }
        };

        let width = rows.first().map_or(0, Vec::len);
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, row)| row.len() != width) {
            bail!("row {i} has {} values, expected {width}", row.len());
        }
        let height = rows.len();
        let data = rows.into_iter().flatten().collect::<Vec<_>>();
        Ok(Array2::from_shape_vec((height, width), data)?)
    }
}

/// Parses a tensor file into the candidate rows of a single image.
fn parse_tensor(text: &str) -> anyhow::Result<Array2<f32>> {
    serde_json::from_str::<TensorFile>(text)
        .context("expected a 2D or 3D array of numbers")?
        .into_array()
}

fn detection_json(det: &Detection) -> serde_json::Value {
    let bbox = det.bounding_box();
    json!({
        "category": det.category(),
        "class_id": det.class_id(),
        "confidence": det.confidence(),
        "bbox": bbox.to_array(),
    })
}

fn main() -> anyhow::Result<()> {
    plog::init_logger!();

    let args = Args::parse();

    let mut config = DecoderConfig::from_env()?;
    if let Some(path) = &args.labels {
        config = config.with_labels(LabelTable::load(path)?);
    }
    if let Some(path) = &args.points {
        config = config.with_scores(ScoringTable::load(path)?);
    }
    if args.cross_class {
        config = config.with_scope(SuppressionScope::CrossClass);
    }
    log::debug!("{:?}", config);

    let text = fs::read_to_string(&args.tensor)
        .with_context(|| format!("failed to read '{}'", args.tensor.display()))?;
    let tensor = parse_tensor(&text)
        .with_context(|| format!("failed to load tensor from '{}'", args.tensor.display()))?;
    log::info!("loaded {:?} tensor from '{}'", tensor.shape(), args.tensor.display());

    let decoder = Decoder::new(Arc::new(config)).with_layout(args.layout.into());
    let thresholds = Thresholds::new(args.confidence).with_iou(args.iou);
    let detections = decoder.decode(tensor.view(), args.width, args.height, thresholds)?;
    let summary = decoder.summarize(&detections);

    let mut out = json!({
        "points": summary.total_score(),
        "litters": summary.category_counts(),
    });
    if args.detections {
        out["detections"] = detections.iter().map(detection_json).collect();
    }
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
