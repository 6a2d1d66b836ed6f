//! Decoder configuration.
//!
//! Everything the decoder needs besides the tensor itself is loaded once at startup and shared
//! read-only between requests.

use std::env::{self, VarError};

use anyhow::Context;

use crate::{
    category::{LabelTable, MergeTable, ScoringTable},
    detection::nms::SuppressionScope,
    rescale::DEFAULT_INPUT_SIZE,
};

/// Path of a label file to use instead of the bundled litter labels.
pub const LABELS_VAR: &str = "PLOG_LABELS";
/// Path of a points file to use instead of the bundled point system.
pub const POINTS_VAR: &str = "PLOG_POINTS";
/// Side length of the detector's square input.
pub const INPUT_SIZE_VAR: &str = "PLOG_INPUT_SIZE";

/// Immutable configuration shared by all decode calls.
#[derive(Debug, Clone, PartialEq)]
pub struct DecoderConfig {
    labels: LabelTable,
    merges: MergeTable,
    scores: ScoringTable,
    input_size: u32,
    scope: SuppressionScope,
}

impl DecoderConfig {
    /// Creates a configuration for a model with the given labels.
    ///
    /// No categories are merged and every category is worth 1 point.
    pub fn new(labels: LabelTable) -> Self {
        Self {
            labels,
            merges: MergeTable::empty(),
            scores: ScoringTable::default(),
            input_size: DEFAULT_INPUT_SIZE,
            scope: SuppressionScope::default(),
        }
    }

    /// Returns the configuration of the bundled litter model.
    pub fn litter() -> Self {
        Self {
            merges: MergeTable::litter(),
            scores: ScoringTable::litter(),
            ..Self::new(LabelTable::litter())
        }
    }

    /// Builds the litter configuration, overriding parts of it from environment variables.
    ///
    /// See [`LABELS_VAR`], [`POINTS_VAR`] and [`INPUT_SIZE_VAR`].
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::litter();

        if let Some(path) = var(LABELS_VAR)? {
            config.labels = LabelTable::load(&path)?;
        }
        if let Some(path) = var(POINTS_VAR)? {
            config.scores = ScoringTable::load(&path)?;
        }
        if let Some(size) = var(INPUT_SIZE_VAR)? {
            let size = size
                .parse()
                .with_context(|| format!("{INPUT_SIZE_VAR}={size} is not a valid input size"))?;
            config = config.with_input_size(size)?;
        }

        log::debug!(
            "decoder config: {} labels, input size {}, {:?} suppression",
            config.labels.len(),
            config.input_size,
            config.scope
        );
        Ok(config)
    }

    pub fn with_labels(mut self, labels: LabelTable) -> Self {
        self.labels = labels;
        self
    }

    pub fn with_merges(mut self, merges: MergeTable) -> Self {
        self.merges = merges;
        self
    }

    pub fn with_scores(mut self, scores: ScoringTable) -> Self {
        self.scores = scores;
        self
    }

    /// Sets the side length of the detector's square input. Must be non-zero.
    pub fn with_input_size(mut self, input_size: u32) -> anyhow::Result<Self> {
        if input_size == 0 {
            anyhow::bail!("detector input size must be non-zero");
        }
        self.input_size = input_size;
        Ok(self)
    }

    pub fn with_scope(mut self, scope: SuppressionScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    pub fn merges(&self) -> &MergeTable {
        &self.merges
    }

    pub fn scores(&self) -> &ScoringTable {
        &self.scores
    }

    pub fn input_size(&self) -> u32 {
        self.input_size
    }

    pub fn scope(&self) -> SuppressionScope {
        self.scope
    }
}

/// Reads an environment variable. A set but non-UTF-8 value is an error, not a missing variable.
fn var(name: &str) -> anyhow::Result<Option<String>> {
    present(name, env::var(name))
}

fn present(name: &str, value: Result<String, VarError>) -> anyhow::Result<Option<String>> {
    match value {
        Ok(value) => Ok(Some(value)),
        Err(VarError::NotPresent) => Ok(None),
        Err(e @ VarError::NotUnicode(_)) => {
            Err(e).with_context(|| format!("failed to read environment variable {name}"))
        }
    }
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self::litter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn litter_defaults() {
        let config = DecoderConfig::default();
        assert_eq!(config.labels().len(), 18);
        assert_eq!(config.input_size(), 640);
        assert_eq!(config.scope(), SuppressionScope::PerClass);
        assert_eq!(config.scores().weight("Cigarette"), 6);
        assert_eq!(
            config.merges().pairs().collect::<Vec<_>>(),
            [("Bottle cap", "Bottle")]
        );
    }

    #[test]
    fn rejects_zero_input_size() {
        assert!(DecoderConfig::litter().with_input_size(0).is_err());
        assert_eq!(
            DecoderConfig::litter()
                .with_input_size(320)
                .unwrap()
                .input_size(),
            320
        );
    }

    #[test]
    fn non_unicode_variable_is_an_error() {
        use std::ffi::OsString;

        assert_eq!(
            present(LABELS_VAR, Ok("labels.txt".into())).unwrap(),
            Some("labels.txt".to_string())
        );
        assert_eq!(present(LABELS_VAR, Err(VarError::NotPresent)).unwrap(), None);

        let err = present(
            LABELS_VAR,
            Err(VarError::NotUnicode(OsString::from("labels.txt"))),
        )
        .unwrap_err();
        assert!(err.to_string().contains(LABELS_VAR), "{err}");
    }

    #[test]
    fn custom_model_scores_one_point_each() {
        let config = DecoderConfig::new(LabelTable::new(["person"]));
        assert_eq!(config.scores().weight("person"), 1);
        assert_eq!(config.merges().pairs().count(), 0);
    }
}
