//! Segmentation models.
//!
//! Models plug into the evaluator through the [`SegmentationModel`] trait and
//! are built by name through a [`ModelZoo`]. External crates register their
//! own factories; the zoo ships a [`LinearHead`] model that reads JSON
//! weights.
//!
//! ```rust,ignore
//! use seg_eval::model::{ModelConfig, ModelZoo};
//!
//! let mut zoo = ModelZoo::with_defaults();
//! zoo.register("my-net", Box::new(|config: &ModelConfig| -> Result<Box<dyn SegmentationModel>> {
//!     Ok(Box::new(MyNet::load(config)?))
//! }));
//!
//! let model = zoo.build(&ModelConfig::new("my-net", "citys", "resnet50", 19))?;
//! ```

pub mod linear;
pub mod zoo;

use std::path::PathBuf;

use ndarray::Array4;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use linear::{LinearHead, LinearWeights};
pub use zoo::{ModelFactory, ModelZoo, get_segmentation_model};

/// Output of a forward pass.
#[derive(Debug, Clone)]
pub struct ModelOutput {
    /// Primary logits, `N x num_class x h x w`.
    pub out: Array4<f32>,
    /// Auxiliary head logits, when the model was built with one.
    pub aux: Option<Array4<f32>>,
}

/// A segmentation network in inference mode.
pub trait SegmentationModel: Send + Sync {
    /// Model identifier.
    fn name(&self) -> &str;

    /// Number of output classes.
    fn num_class(&self) -> usize;

    /// Run the network on a `N x 3 x H x W` normalized batch.
    ///
    /// The output may be at a lower resolution than the input.
    fn forward(&self, input: &Array4<f32>) -> Result<ModelOutput>;
}

/// Normalization layer applied after convolutions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormLayer {
    /// Batch normalization using running statistics.
    #[default]
    BatchNorm2d,
    /// No normalization.
    Identity,
}

/// Everything a model factory needs to build a model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model name.
    pub model: String,
    /// Dataset the weights were trained on.
    pub dataset: String,
    /// Backbone name.
    pub backbone: String,
    /// Directory holding weights files.
    pub root: PathBuf,
    /// Build the auxiliary head.
    pub aux: bool,
    /// Load pretrained weights for the whole model.
    pub pretrained: bool,
    /// Load pretrained weights for the backbone only.
    pub pretrained_base: bool,
    /// Normalization layer type.
    pub norm_layer: NormLayer,
    /// Number of output classes.
    pub num_class: usize,
}

impl ModelConfig {
    /// Inference defaults: pretrained, no aux head, batch norm, weights under `models/`.
    #[must_use]
    pub fn new(model: &str, dataset: &str, backbone: &str, num_class: usize) -> Self {
        Self {
            model: model.to_string(),
            dataset: dataset.to_string(),
            backbone: backbone.to_string(),
            root: PathBuf::from("models"),
            aux: false,
            pretrained: true,
            pretrained_base: false,
            norm_layer: NormLayer::BatchNorm2d,
            num_class,
        }
    }

    /// Set the weights directory.
    #[must_use]
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Enable or disable the auxiliary head.
    #[must_use]
    pub fn with_aux(mut self, aux: bool) -> Self {
        self.aux = aux;
        self
    }

    /// Enable or disable loading pretrained weights.
    #[must_use]
    pub fn with_pretrained(mut self, pretrained: bool) -> Self {
        self.pretrained = pretrained;
        self
    }

    /// Set the normalization layer.
    #[must_use]
    pub fn with_norm_layer(mut self, norm_layer: NormLayer) -> Self {
        self.norm_layer = norm_layer;
        self
    }

    /// Weights file: `{root}/{model}_{backbone}_{dataset}.json`.
    #[must_use]
    pub fn weights_path(&self) -> PathBuf {
        self.root
            .join(format!("{}_{}_{}.json", self.model, self.backbone, self.dataset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_config_defaults() {
        let config = ModelConfig::new("linear", "citys", "resnet50", 19);
        assert!(config.pretrained);
        assert!(!config.pretrained_base);
        assert!(!config.aux);
        assert_eq!(config.norm_layer, NormLayer::BatchNorm2d);
    }

    #[test]
    fn test_weights_path() {
        let config = ModelConfig::new("fdlnet", "citys", "resnet101", 19).with_root("/w");
        assert_eq!(
            config.weights_path(),
            PathBuf::from("/w/fdlnet_resnet101_citys.json")
        );
    }
}
