//! Category resolution, synonym merging and scoring.
//!
//! The detector only knows class indices. The [`LabelTable`] turns them into category names, the
//! [`MergeTable`] folds sub-part categories into the object they belong to (a bottle cap lying next
//! to its bottle is one piece of litter, not two), and the [`ScoringTable`] assigns the points a
//! user earns per item.

use std::{
    collections::{BTreeMap, HashMap},
    fs,
    path::Path,
};

use anyhow::{anyhow, Context};
use itertools::Itertools;

use crate::{detection::Detection, error::DecodeError};

/// Labels of the litter detection model, indexed by class id.
const LITTER_LABELS: &[&str] = &[
    "Aluminium foil",
    "Bottle cap",
    "Bottle",
    "Broken glass",
    "Can",
    "Carton",
    "Cigarette",
    "Cup",
    "Lid",
    "Other litter",
    "Other plastic",
    "Paper",
    "Plastic bag - wrapper",
    "Plastic container",
    "Pop tab",
    "Straw",
    "Styrofoam piece",
    "Unlabeled litter",
];

const LITTER_POINTS: &[(&str, u32)] = &[
    ("Aluminium foil", 2),
    ("Bottle cap", 3),
    ("Bottle", 5),
    ("Broken glass", 4),
    ("Can", 4),
    ("Carton", 3),
    ("Cigarette", 6),
    ("Cup", 3),
    ("Lid", 2),
    ("Other litter", 1),
    ("Other plastic", 4),
    ("Paper", 2),
    ("Plastic bag - wrapper", 5),
    ("Plastic container", 5),
    ("Pop tab", 2),
    ("Straw", 4),
    ("Styrofoam piece", 5),
    ("Unlabeled litter", 1),
];

const LITTER_MERGES: &[(&str, &str)] = &[("Bottle cap", "Bottle")];

/// Ordered category names, indexed by class id.
///
/// Names are stored with surrounding whitespace removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelTable {
    labels: Vec<String>,
}

impl LabelTable {
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            labels: labels
                .into_iter()
                .map(|label| label.as_ref().trim().to_string())
                .collect(),
        }
    }

    /// Returns the labels of the bundled litter detection model.
    pub fn litter() -> Self {
        Self::new(LITTER_LABELS)
    }

    /// Parses a label file: one label per line, blank lines are skipped.
    pub fn parse(text: &str) -> Self {
        Self::new(text.lines().filter(|line| !line.trim().is_empty()))
    }

    /// Loads a label file from disk. See [`LabelTable::parse`] for the format.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read label table '{}'", path.display()))?;
        let table = Self::parse(&text);
        if table.is_empty() {
            anyhow::bail!("label table '{}' contains no labels", path.display());
        }
        log::debug!("loaded {} labels from '{}'", table.len(), path.display());
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn get(&self, class_id: usize) -> Option<&str> {
        self.labels.get(class_id).map(String::as_str)
    }

    /// Returns the label for `class_id`, or [`DecodeError::UnknownClassId`] if there is none.
    pub fn resolve(&self, class_id: usize) -> Result<&str, DecodeError> {
        self.get(class_id).ok_or(DecodeError::UnknownClassId {
            class_id,
            num_labels: self.len(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }
}

/// A fixed list of `(child, parent)` category pairs.
///
/// Counts of a child category are added to its parent and the child is removed. Pairs are applied
/// in the order they were given, so a child may itself be the parent of an earlier pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeTable {
    pairs: Vec<(String, String)>,
}

impl MergeTable {
    pub fn new<I, C, P>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (C, P)>,
        C: Into<String>,
        P: Into<String>,
    {
        Self {
            pairs: pairs
                .into_iter()
                .map(|(child, parent)| (child.into(), parent.into()))
                .collect(),
        }
    }

    /// A merge table that merges nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns the merges used with the bundled litter model ("Bottle cap" counts as "Bottle").
    pub fn litter() -> Self {
        Self::new(LITTER_MERGES.iter().copied())
    }

    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(c, p)| (c.as_str(), p.as_str()))
    }

    /// Folds child counts into their parents.
    pub fn fold(&self, counts: &mut BTreeMap<String, usize>) {
        for (child, parent) in &self.pairs {
            if child == parent {
                continue;
            }
            if let Some(n) = counts.remove(child) {
                *counts.entry(parent.clone()).or_default() += n;
            }
        }
    }
}

/// Points awarded per item of each category.
///
/// Categories missing from the table are worth [`ScoringTable::DEFAULT_WEIGHT`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScoringTable {
    weights: HashMap<String, u32>,
}

impl ScoringTable {
    pub const DEFAULT_WEIGHT: u32 = 1;

    pub fn new<I, S>(weights: I) -> Self
    where
        I: IntoIterator<Item = (S, u32)>,
        S: Into<String>,
    {
        Self {
            weights: weights
                .into_iter()
                .map(|(category, weight)| (category.into(), weight))
                .collect(),
        }
    }

    /// Returns the point system used with the bundled litter model.
    pub fn litter() -> Self {
        Self::new(LITTER_POINTS.iter().copied())
    }

    /// Parses a points file.
    ///
    /// Every non-empty line that does not start with `#` has the form `<category> <points>`. The
    /// category may contain spaces; the points are the last whitespace-separated token.
    pub fn parse(text: &str) -> anyhow::Result<Self> {
        let mut weights = HashMap::new();
        for (i, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (category, points) = line
                .rsplit_once(char::is_whitespace)
                .map(|(c, p)| (c.trim(), p))
                .filter(|(c, _)| !c.is_empty())
                .ok_or_else(|| anyhow!("line {}: expected `<category> <points>`", i + 1))?;
            let points = points
                .parse::<u32>()
                .with_context(|| format!("line {}: invalid points '{}'", i + 1, points))?;
            weights.insert(category.to_string(), points);
        }
        Ok(Self { weights })
    }

    /// Loads a points file from disk. See [`ScoringTable::parse`] for the format.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read points table '{}'", path.display()))?;
        let table = Self::parse(&text)
            .with_context(|| format!("failed to parse points table '{}'", path.display()))?;
        log::debug!(
            "loaded {} point values from '{}'",
            table.weights.len(),
            path.display()
        );
        Ok(table)
    }

    pub fn weight(&self, category: &str) -> u32 {
        self.weights
            .get(category)
            .copied()
            .unwrap_or(Self::DEFAULT_WEIGHT)
    }
}

/// Per-image result: how many items of each category were found, and what they are worth.
///
/// `total_score` always equals the sum of `count * weight` over all categories.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetectionSummary {
    category_counts: BTreeMap<String, usize>,
    total_score: u64,
}

impl DetectionSummary {
    /// A summary of an image without litter.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Tallies `detections` by category, applies `merges` and scores the result.
    pub fn from_detections<'a, I>(detections: I, merges: &MergeTable, scores: &ScoringTable) -> Self
    where
        I: IntoIterator<Item = &'a Detection>,
    {
        let mut category_counts = detections
            .into_iter()
            .map(Detection::category)
            .counts()
            .into_iter()
            .map(|(category, n)| (category.to_string(), n))
            .collect::<BTreeMap<_, _>>();
        merges.fold(&mut category_counts);

        let total_score = category_counts
            .iter()
            .map(|(category, &n)| n as u64 * u64::from(scores.weight(category)))
            .sum();

        Self {
            category_counts,
            total_score,
        }
    }

    /// Returns the number of items per category, ordered by category name.
    pub fn category_counts(&self) -> &BTreeMap<String, usize> {
        &self.category_counts
    }

    pub fn count(&self, category: &str) -> usize {
        self.category_counts.get(category).copied().unwrap_or(0)
    }

    /// Returns the total number of litter items.
    pub fn total_items(&self) -> usize {
        self.category_counts.values().sum()
    }

    pub fn total_score(&self) -> u64 {
        self.total_score
    }

    pub fn is_empty(&self) -> bool {
        self.category_counts.is_empty()
    }
}
