//! Name-keyed model factories.

use std::collections::BTreeMap;

use super::{LinearHead, ModelConfig, SegmentationModel};
use crate::error::{Error, Result};

/// Factory callback building a model from its configuration.
pub type ModelFactory =
    Box<dyn Fn(&ModelConfig) -> Result<Box<dyn SegmentationModel>> + Send + Sync>;

/// Registry of model factories.
#[derive(Default)]
pub struct ModelZoo {
    factories: BTreeMap<String, ModelFactory>,
}

impl ModelZoo {
    /// Empty zoo.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Zoo with the built-in models registered.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut zoo = Self::new();
        zoo.register(
            "linear",
            Box::new(|config: &ModelConfig| -> Result<Box<dyn SegmentationModel>> {
                Ok(Box::new(LinearHead::from_config(config)?))
            }),
        );
        zoo
    }

    /// Register (or replace) a factory under `name`.
    pub fn register(&mut self, name: &str, factory: ModelFactory) -> &mut Self {
        self.factories.insert(name.to_ascii_lowercase(), factory);
        self
    }

    /// Registered model names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    /// Build the model named in `config`.
    pub fn build(&self, config: &ModelConfig) -> Result<Box<dyn SegmentationModel>> {
        let factory = self
            .factories
            .get(&config.model.to_ascii_lowercase())
            .ok_or_else(|| Error::UnknownModel(config.model.clone()))?;

        let model = factory(config)?;
        if model.num_class() != config.num_class {
            return Err(Error::Model {
                model: config.model.clone(),
                message: format!(
                    "model predicts {} classes but {} were requested",
                    model.num_class(),
                    config.num_class
                ),
            });
        }

        tracing::info!(
            model = %config.model,
            backbone = %config.backbone,
            aux = config.aux,
            pretrained = config.pretrained,
            "model built"
        );
        Ok(model)
    }
}

/// Build a model from the default zoo.
pub fn get_segmentation_model(config: &ModelConfig) -> Result<Box<dyn SegmentationModel>> {
    ModelZoo::with_defaults().build(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelOutput;
    use ndarray::Array4;

    struct Fixed(usize);

    impl SegmentationModel for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn num_class(&self) -> usize {
            self.0
        }

        fn forward(&self, input: &Array4<f32>) -> Result<ModelOutput> {
            let (n, _, h, w) = input.dim();
            Ok(ModelOutput {
                out: Array4::zeros((n, self.0, h, w)),
                aux: None,
            })
        }
    }

    #[test]
    fn test_register_and_build() {
        let mut zoo = ModelZoo::new();
        zoo.register(
            "Fixed",
            Box::new(|c: &ModelConfig| -> Result<Box<dyn SegmentationModel>> {
                Ok(Box::new(Fixed(c.num_class)))
            }),
        );
        assert_eq!(zoo.names(), vec!["fixed"]);

        let model = zoo
            .build(&ModelConfig::new("FIXED", "citys", "none", 4))
            .unwrap();
        assert_eq!(model.num_class(), 4);
    }

    #[test]
    fn test_unknown_model() {
        let zoo = ModelZoo::with_defaults();
        let err = zoo
            .build(&ModelConfig::new("psp", "citys", "resnet50", 19))
            .err()
            .unwrap();
        assert!(matches!(err, Error::UnknownModel(name) if name == "psp"));
    }

    #[test]
    fn test_class_count_mismatch() {
        let mut zoo = ModelZoo::new();
        zoo.register(
            "fixed",
            Box::new(|_: &ModelConfig| -> Result<Box<dyn SegmentationModel>> {
                Ok(Box::new(Fixed(3)))
            }),
        );
        let err = zoo
            .build(&ModelConfig::new("fixed", "citys", "none", 19))
            .err()
            .unwrap();
        assert!(matches!(err, Error::Model { .. }));
    }

    #[test]
    fn test_defaults_include_linear() {
        assert!(ModelZoo::with_defaults().names().contains(&"linear"));
    }
}
