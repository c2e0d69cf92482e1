//! Evaluation configuration.
//!
//! [`EvalArgs`] is the configuration bag the evaluator is built from. The CLI
//! fills it from command-line flags; embedders use [`EvalArgs::builder`].

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::dataset::DatasetSplit;
use crate::error::{Error, Result};

/// Environment variable holding the number of participating processes.
pub const WORLD_SIZE_ENV: &str = "WORLD_SIZE";

/// Environment variable holding this process's rank.
pub const RANK_ENV: &str = "RANK";

/// Configuration for one evaluation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalArgs {
    /// Dataset name (e.g. `citys`, `pascal_voc`, `ade20k`, `folder`).
    pub dataset: String,

    /// Model name registered in the model zoo.
    pub model: String,

    /// Backbone name, used to locate weights.
    pub backbone: String,

    /// Build the auxiliary head.
    pub aux: bool,

    /// Enable horizontal flip test-time augmentation.
    pub flip: bool,

    /// Directory receiving the evaluation log file.
    pub log_dir: PathBuf,

    /// Root directory of the datasets.
    pub data_root: PathBuf,

    /// Root directory of pretrained weights.
    pub model_root: PathBuf,

    /// Split to evaluate.
    pub split: DatasetSplit,

    /// Input scales for multi-scale evaluation.
    pub scales: Vec<f64>,

    /// Base short side in pixels; scales multiply this when set.
    pub base_size: Option<u32>,

    /// Class count for datasets that can't infer it (`folder`).
    pub num_class: Option<usize>,

    /// Shuffle sample order.
    pub shuffle: bool,

    /// Seed for the shuffling sampler.
    pub seed: u64,

    /// Directory for JSON/CSV reports, if any.
    pub report_dir: Option<PathBuf>,
}

impl EvalArgs {
    /// Create a new configuration builder.
    #[must_use]
    pub fn builder() -> EvalArgsBuilder {
        EvalArgsBuilder::default()
    }

    /// Run identifier: `{model}_{backbone}_{dataset}`.
    #[must_use]
    pub fn run_name(&self) -> String {
        format!("{}_{}_{}", self.model, self.backbone, self.dataset)
    }

    /// Name of the log file written under [`EvalArgs::log_dir`].
    #[must_use]
    pub fn log_filename(&self) -> String {
        format!("{}_log.txt", self.run_name())
    }
}

/// Builder for [`EvalArgs`].
#[derive(Debug, Default)]
pub struct EvalArgsBuilder {
    dataset: Option<String>,
    model: Option<String>,
    backbone: Option<String>,
    aux: bool,
    flip: bool,
    log_dir: Option<PathBuf>,
    data_root: Option<PathBuf>,
    model_root: Option<PathBuf>,
    split: Option<DatasetSplit>,
    scales: Option<Vec<f64>>,
    base_size: Option<u32>,
    num_class: Option<usize>,
    shuffle: bool,
    seed: u64,
    report_dir: Option<PathBuf>,
}

impl EvalArgsBuilder {
    /// Set the dataset name.
    #[must_use]
    pub fn dataset(mut self, name: &str) -> Self {
        self.dataset = Some(name.to_string());
        self
    }

    /// Set the model name.
    #[must_use]
    pub fn model(mut self, name: &str) -> Self {
        self.model = Some(name.to_string());
        self
    }

    /// Set the backbone name.
    #[must_use]
    pub fn backbone(mut self, name: &str) -> Self {
        self.backbone = Some(name.to_string());
        self
    }

    /// Enable or disable the auxiliary head.
    #[must_use]
    pub fn aux(mut self, aux: bool) -> Self {
        self.aux = aux;
        self
    }

    /// Enable or disable flip augmentation.
    #[must_use]
    pub fn flip(mut self, flip: bool) -> Self {
        self.flip = flip;
        self
    }

    /// Set the log directory.
    #[must_use]
    pub fn log_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(path.into());
        self
    }

    /// Set the dataset root.
    #[must_use]
    pub fn data_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_root = Some(path.into());
        self
    }

    /// Set the weights root.
    #[must_use]
    pub fn model_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.model_root = Some(path.into());
        self
    }

    /// Set the split.
    #[must_use]
    pub fn split(mut self, split: DatasetSplit) -> Self {
        self.split = Some(split);
        self
    }

    /// Set the multi-scale list.
    #[must_use]
    pub fn scales(mut self, scales: Vec<f64>) -> Self {
        self.scales = Some(scales);
        self
    }

    /// Set the base short side.
    #[must_use]
    pub fn base_size(mut self, size: u32) -> Self {
        self.base_size = Some(size);
        self
    }

    /// Set the class count for datasets that need it.
    #[must_use]
    pub fn num_class(mut self, n: usize) -> Self {
        self.num_class = Some(n);
        self
    }

    /// Shuffle samples with the given seed.
    #[must_use]
    pub fn shuffle(mut self, seed: u64) -> Self {
        self.shuffle = true;
        self.seed = seed;
        self
    }

    /// Set the report directory.
    #[must_use]
    pub fn report_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.report_dir = Some(path.into());
        self
    }

    /// Build the configuration.
    ///
    /// `dataset` and `model` are required; scales must be finite and positive.
    pub fn build(self) -> Result<EvalArgs> {
        let dataset = self
            .dataset
            .ok_or_else(|| Error::Config("dataset is required".to_string()))?;
        let model = self
            .model
            .ok_or_else(|| Error::Config("model is required".to_string()))?;
        let scales = self.scales.unwrap_or_else(|| vec![1.0]);
        validate_scales(&scales)?;

        Ok(EvalArgs {
            dataset,
            model,
            backbone: self.backbone.unwrap_or_else(|| "resnet50".to_string()),
            aux: self.aux,
            flip: self.flip,
            log_dir: self.log_dir.unwrap_or_else(|| PathBuf::from("runs/logs")),
            data_root: self.data_root.unwrap_or_else(|| PathBuf::from("datasets")),
            model_root: self.model_root.unwrap_or_else(|| PathBuf::from("models")),
            split: self.split.unwrap_or_default(),
            scales,
            base_size: self.base_size,
            num_class: self.num_class,
            shuffle: self.shuffle,
            seed: self.seed,
            report_dir: self.report_dir,
        })
    }
}

/// Check that a scale list is non-empty and every scale is finite and positive.
pub fn validate_scales(scales: &[f64]) -> Result<()> {
    if scales.is_empty() {
        return Err(Error::Config("at least one scale is required".to_string()));
    }
    if let Some(bad) = scales.iter().find(|s| !s.is_finite() || **s <= 0.0) {
        return Err(Error::Config(format!("invalid scale: {bad}")));
    }
    Ok(())
}

/// Number of participating processes from `WORLD_SIZE` (default 1).
pub fn world_size() -> Result<usize> {
    parse_env_count(WORLD_SIZE_ENV, std::env::var(WORLD_SIZE_ENV).ok().as_deref(), 1)
}

/// This process's rank from `RANK` (default 0).
pub fn rank() -> Result<usize> {
    parse_env_count(RANK_ENV, std::env::var(RANK_ENV).ok().as_deref(), 0)
}

fn parse_env_count(name: &str, value: Option<&str>, default: usize) -> Result<usize> {
    match value.map(str::trim) {
        None | Some("") => Ok(default),
        Some(v) => v
            .parse()
            .map_err(|_| Error::Config(format!("{name} must be a non-negative integer, got {v:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let args = EvalArgs::builder()
            .dataset("citys")
            .model("linear")
            .build()
            .unwrap();
        assert_eq!(args.backbone, "resnet50");
        assert_eq!(args.split, DatasetSplit::Val);
        assert_eq!(args.scales, vec![1.0]);
        assert!(!args.flip);
        assert!(!args.aux);
        assert!(!args.shuffle);
    }

    #[test]
    fn test_builder_requires_dataset() {
        let err = EvalArgs::builder().model("linear").build().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_builder_rejects_bad_scales() {
        let err = EvalArgs::builder()
            .dataset("citys")
            .model("linear")
            .scales(vec![1.0, -0.5])
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("-0.5"));

        assert!(validate_scales(&[]).is_err());
        assert!(validate_scales(&[f64::NAN]).is_err());
    }

    #[test]
    fn test_log_filename() {
        let args = EvalArgs::builder()
            .dataset("citys")
            .model("fdlnet")
            .backbone("resnet101")
            .build()
            .unwrap();
        assert_eq!(args.log_filename(), "fdlnet_resnet101_citys_log.txt");
    }

    #[test]
    fn test_parse_env_count() {
        assert_eq!(parse_env_count("WORLD_SIZE", None, 1).unwrap(), 1);
        assert_eq!(parse_env_count("WORLD_SIZE", Some(""), 1).unwrap(), 1);
        assert_eq!(parse_env_count("WORLD_SIZE", Some(" 4 "), 1).unwrap(), 4);
        assert!(parse_env_count("WORLD_SIZE", Some("four"), 1).is_err());
    }
}
