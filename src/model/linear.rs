//! Per-pixel linear classifier.
//!
//! A 1x1 convolution over the normalized input, optionally preceded by
//! average pooling (`output_stride`) and followed by batch normalization of
//! the logits. It is the smallest model that exercises the full evaluation
//! path (low-resolution output, resize, aux head) and serves as a baseline.
//!
//! Weights are JSON:
//!
//! ```json
//! {
//!   "in_channels": 3,
//!   "num_class": 2,
//!   "output_stride": 8,
//!   "weight": [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
//!   "bias": [0.0, 0.0],
//!   "norm": { "gamma": [1, 1], "beta": [0, 0], "running_mean": [0, 0], "running_var": [1, 1] },
//!   "aux": { "weight": [[...], [...]], "bias": [0.0, 0.0] }
//! }
//! ```

use std::path::Path;

use ndarray::{Array4, ArrayView4, s};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::{ModelConfig, ModelOutput, NormLayer, SegmentationModel};
use crate::error::{Error, Result};

fn default_stride() -> usize {
    1
}

fn default_eps() -> f32 {
    1e-5
}

/// Batch-norm parameters (inference mode).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchNormParams {
    /// Scale.
    pub gamma: Vec<f32>,
    /// Shift.
    pub beta: Vec<f32>,
    /// Running mean.
    pub running_mean: Vec<f32>,
    /// Running variance.
    pub running_var: Vec<f32>,
    /// Variance epsilon.
    #[serde(default = "default_eps")]
    pub eps: f32,
}

/// A 1x1 convolution: `num_class x in_channels` weights plus bias.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeadWeights {
    /// Weight matrix, one row per class.
    pub weight: Vec<Vec<f32>>,
    /// Bias per class.
    pub bias: Vec<f32>,
}

/// Serialized weights of a [`LinearHead`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearWeights {
    /// Input channel count.
    pub in_channels: usize,
    /// Output class count.
    pub num_class: usize,
    /// Downsampling factor of the output.
    #[serde(default = "default_stride")]
    pub output_stride: usize,
    /// Main classifier weights.
    pub weight: Vec<Vec<f32>>,
    /// Main classifier bias.
    pub bias: Vec<f32>,
    /// Batch norm applied to the main logits.
    #[serde(default)]
    pub norm: Option<BatchNormParams>,
    /// Auxiliary classifier.
    #[serde(default)]
    pub aux: Option<HeadWeights>,
}

impl LinearWeights {
    /// Read weights from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| Error::ModelWeights {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let weights: Self = serde_json::from_str(&data).map_err(|e| Error::ModelWeights {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        weights.validate().map_err(|reason| Error::ModelWeights {
            path: path.to_path_buf(),
            reason,
        })?;
        Ok(weights)
    }

    /// Write weights as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Deterministic uniform initialization in `[-1/sqrt(in), 1/sqrt(in))`.
    #[must_use]
    pub fn init(
        in_channels: usize,
        num_class: usize,
        output_stride: usize,
        aux: bool,
        seed: u64,
    ) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let bound = 1.0 / (in_channels.max(1) as f32).sqrt();
        let head = |rng: &mut StdRng| HeadWeights {
            weight: (0..num_class)
                .map(|_| (0..in_channels).map(|_| rng.random_range(-bound..bound)).collect())
                .collect(),
            bias: vec![0.0; num_class],
        };
        let main = head(&mut rng);
        let aux = aux.then(|| head(&mut rng));
        Self {
            in_channels,
            num_class,
            output_stride: output_stride.max(1),
            weight: main.weight,
            bias: main.bias,
            norm: None,
            aux,
        }
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.output_stride == 0 {
            return Err("output_stride must be at least 1".to_string());
        }
        check_head(&self.weight, &self.bias, self.num_class, self.in_channels, "main")?;
        if let Some(aux) = &self.aux {
            check_head(&aux.weight, &aux.bias, self.num_class, self.in_channels, "aux")?;
        }
        if let Some(norm) = &self.norm {
            for (name, v) in [
                ("gamma", &norm.gamma),
                ("beta", &norm.beta),
                ("running_mean", &norm.running_mean),
                ("running_var", &norm.running_var),
            ] {
                if v.len() != self.num_class {
                    return Err(format!(
                        "norm.{name} has {} entries, expected {}",
                        v.len(),
                        self.num_class
                    ));
                }
            }
            if norm.running_var.iter().any(|&v| v + norm.eps <= 0.0) {
                return Err("norm.running_var + eps must be positive".to_string());
            }
        }
        Ok(())
    }
}

fn check_head(
    weight: &[Vec<f32>],
    bias: &[f32],
    num_class: usize,
    in_channels: usize,
    head: &str,
) -> std::result::Result<(), String> {
    if weight.len() != num_class || bias.len() != num_class {
        return Err(format!(
            "{head} head has {} weight rows and {} biases, expected {num_class}",
            weight.len(),
            bias.len()
        ));
    }
    if let Some(row) = weight.iter().find(|row| row.len() != in_channels) {
        return Err(format!(
            "{head} head row has {} inputs, expected {in_channels}",
            row.len()
        ));
    }
    Ok(())
}

/// Per-pixel linear segmentation model.
#[derive(Debug, Clone)]
pub struct LinearHead {
    name: String,
    weights: LinearWeights,
    norm_layer: NormLayer,
    aux: bool,
}

impl LinearHead {
    /// Wrap already-loaded weights.
    #[must_use]
    pub fn new(name: &str, weights: LinearWeights, norm_layer: NormLayer, aux: bool) -> Self {
        Self {
            name: name.to_string(),
            weights,
            norm_layer,
            aux,
        }
    }

    /// Build from a zoo configuration.
    ///
    /// With `pretrained` the weights come from [`ModelConfig::weights_path`];
    /// otherwise they are initialized deterministically for 3-channel input.
    pub fn from_config(config: &ModelConfig) -> Result<Self> {
        let weights = if config.pretrained {
            let path = config.weights_path();
            let weights = LinearWeights::load(&path)?;
            if weights.num_class != config.num_class {
                return Err(Error::ModelWeights {
                    path,
                    reason: format!(
                        "weights have {} classes, dataset has {}",
                        weights.num_class, config.num_class
                    ),
                });
            }
            if config.aux && weights.aux.is_none() {
                return Err(Error::ModelWeights {
                    path,
                    reason: "aux head requested but weights have none".to_string(),
                });
            }
            tracing::info!(path = %path.display(), "loaded pretrained weights");
            weights
        } else {
            LinearWeights::init(3, config.num_class, 8, config.aux, 0)
        };

        Ok(Self::new(&config.model, weights, config.norm_layer, config.aux))
    }

    /// The model's weights.
    #[must_use]
    pub fn weights(&self) -> &LinearWeights {
        &self.weights
    }

    fn classify(
        &self,
        pooled: ArrayView4<'_, f32>,
        weight: &[Vec<f32>],
        bias: &[f32],
        normalize: bool,
    ) -> Array4<f32> {
        let (n, _, h, w) = pooled.dim();
        let num_class = self.weights.num_class;
        let mut logits = Array4::<f32>::zeros((n, num_class, h, w));

        for b in 0..n {
            for (k, (row, &b_k)) in weight.iter().zip(bias).enumerate() {
                let mut plane = logits.slice_mut(s![b, k, .., ..]);
                plane.fill(b_k);
                for (c, &wc) in row.iter().enumerate() {
                    plane.scaled_add(wc, &pooled.slice(s![b, c, .., ..]));
                }
            }
        }

        if normalize && self.norm_layer == NormLayer::BatchNorm2d {
            if let Some(norm) = &self.weights.norm {
                for k in 0..num_class {
                    let scale = norm.gamma[k] / (norm.running_var[k] + norm.eps).sqrt();
                    let shift = norm.beta[k] - norm.running_mean[k] * scale;
                    logits
                        .slice_mut(s![.., k, .., ..])
                        .mapv_inplace(|v| v * scale + shift);
                }
            }
        }

        logits
    }
}

/// Average-pool by `stride`; the last block absorbs any remainder.
fn avg_pool(input: &Array4<f32>, stride: usize) -> Array4<f32> {
    if stride <= 1 {
        return input.clone();
    }
    let (n, c, h, w) = input.dim();
    let (oh, ow) = ((h / stride).max(1), (w / stride).max(1));
    let mut out = Array4::<f32>::zeros((n, c, oh, ow));

    let bounds = |o: usize, len: usize, out_len: usize| {
        let start = (o * stride).min(len);
        let end = if o + 1 == out_len { len } else { ((o + 1) * stride).min(len) };
        (start, end)
    };

    for oy in 0..oh {
        let (y0, y1) = bounds(oy, h, oh);
        for ox in 0..ow {
            let (x0, x1) = bounds(ox, w, ow);
            let block = input.slice(s![.., .., y0..y1, x0..x1]);
            let area = ((y1 - y0) * (x1 - x0)).max(1) as f32;
            for b in 0..n {
                for ch in 0..c {
                    out[[b, ch, oy, ox]] = block.slice(s![b, ch, .., ..]).sum() / area;
                }
            }
        }
    }
    out
}

impl SegmentationModel for LinearHead {
    fn name(&self) -> &str {
        &self.name
    }

    fn num_class(&self) -> usize {
        self.weights.num_class
    }

    fn forward(&self, input: &Array4<f32>) -> Result<ModelOutput> {
        let (n, c, h, w) = input.dim();
        if c != self.weights.in_channels {
            return Err(Error::ShapeMismatch {
                context: "linear head input",
                expected: vec![n, self.weights.in_channels, h, w],
                actual: vec![n, c, h, w],
            });
        }

        let pooled = avg_pool(input, self.weights.output_stride);
        let out = self.classify(pooled.view(), &self.weights.weight, &self.weights.bias, true);
        let aux = match (&self.weights.aux, self.aux) {
            (Some(head), true) => Some(self.classify(pooled.view(), &head.weight, &head.bias, false)),
            _ => None,
        };

        Ok(ModelOutput { out, aux })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array;

    fn identity_weights(stride: usize) -> LinearWeights {
        LinearWeights {
            in_channels: 3,
            num_class: 2,
            output_stride: stride,
            weight: vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]],
            bias: vec![0.0, 0.5],
            norm: None,
            aux: None,
        }
    }

    #[test]
    fn test_forward_computes_linear_logits() {
        let model = LinearHead::new("linear", identity_weights(1), NormLayer::BatchNorm2d, false);
        let input = Array::from_shape_fn((1, 3, 2, 2), |(_, c, y, x)| (c * 10 + y * 2 + x) as f32);
        let out = model.forward(&input).unwrap();
        assert_eq!(out.out.dim(), (1, 2, 2, 2));
        assert!(out.aux.is_none());
        assert_eq!(out.out[[0, 0, 1, 1]], 3.0);
        assert_eq!(out.out[[0, 1, 0, 1]], 11.5);
    }

    #[test]
    fn test_output_stride_downsamples() {
        let model = LinearHead::new("linear", identity_weights(4), NormLayer::Identity, false);
        let input = Array4::<f32>::ones((1, 3, 9, 16));
        let out = model.forward(&input).unwrap();
        assert_eq!(out.out.dim(), (1, 2, 2, 4));
        assert!((out.out[[0, 0, 1, 3]] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_batch_norm_applies_running_stats() {
        let mut weights = identity_weights(1);
        weights.norm = Some(BatchNormParams {
            gamma: vec![2.0, 1.0],
            beta: vec![1.0, 0.0],
            running_mean: vec![1.0, 0.0],
            running_var: vec![4.0, 1.0],
            eps: 0.0,
        });
        let input = Array4::<f32>::from_elem((1, 3, 1, 1), 5.0);

        let bn = LinearHead::new("linear", weights.clone(), NormLayer::BatchNorm2d, false);
        let out = bn.forward(&input).unwrap().out;
        // (5 - 1) / 2 * 2 + 1 = 5
        assert!((out[[0, 0, 0, 0]] - 5.0).abs() < 1e-6);

        let plain = LinearHead::new("linear", weights, NormLayer::Identity, false);
        assert_eq!(plain.forward(&input).unwrap().out[[0, 0, 0, 0]], 5.0);
    }

    #[test]
    fn test_aux_head_only_when_enabled() {
        let weights = LinearWeights::init(3, 4, 2, true, 7);
        let input = Array4::<f32>::zeros((1, 3, 8, 8));

        let with_aux = LinearHead::new("linear", weights.clone(), NormLayer::BatchNorm2d, true);
        let out = with_aux.forward(&input).unwrap();
        assert_eq!(out.aux.as_ref().map(|a| a.dim()), Some((1, 4, 4, 4)));

        let without = LinearHead::new("linear", weights, NormLayer::BatchNorm2d, false);
        assert!(without.forward(&input).unwrap().aux.is_none());
    }

    #[test]
    fn test_rejects_wrong_channel_count() {
        let model = LinearHead::new("linear", identity_weights(1), NormLayer::BatchNorm2d, false);
        let err = model.forward(&Array4::zeros((1, 4, 2, 2))).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }));
    }

    #[test]
    fn test_init_is_deterministic() {
        assert_eq!(LinearWeights::init(3, 5, 8, true, 1), LinearWeights::init(3, 5, 8, true, 1));
        assert!(LinearWeights::init(3, 5, 8, false, 1).validate().is_ok());
    }

    #[test]
    fn test_load_validates_shapes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        let mut weights = identity_weights(1);
        weights.bias.push(1.0);
        weights.save(&path).unwrap();

        let err = LinearWeights::load(&path).unwrap_err();
        assert!(matches!(err, Error::ModelWeights { .. }));
    }

    #[test]
    fn test_from_config_loads_pretrained() {
        let dir = tempfile::tempdir().unwrap();
        let config = ModelConfig::new("linear", "folder", "none", 2).with_root(dir.path());
        identity_weights(2).save(&config.weights_path()).unwrap();

        let model = LinearHead::from_config(&config).unwrap();
        assert_eq!(model.weights().output_stride, 2);

        let err = LinearHead::from_config(&config.clone().with_aux(true)).unwrap_err();
        assert!(err.to_string().contains("aux"));
    }
}
