//! Input transform pipeline: to-tensor conversion followed by normalization.

use imgref::ImgVec;
use ndarray::Array3;
use rgb::RGB8;
use serde::{Deserialize, Serialize};

/// ImageNet channel means (RGB, in `[0, 1]` units).
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// ImageNet channel standard deviations (RGB, in `[0, 1]` units).
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Converts 8-bit RGB images into normalized `CHW` float tensors.
///
/// Each channel value becomes `(v / 255 - mean[c]) / std[c]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputTransform {
    /// Per-channel mean subtracted after scaling to `[0, 1]`.
    pub mean: [f32; 3],
    /// Per-channel divisor applied after mean subtraction.
    pub std: [f32; 3],
}

impl Default for InputTransform {
    fn default() -> Self {
        Self::imagenet()
    }
}

impl InputTransform {
    /// Transform with ImageNet statistics.
    #[must_use]
    pub fn imagenet() -> Self {
        Self {
            mean: IMAGENET_MEAN,
            std: IMAGENET_STD,
        }
    }

    /// Only scale to `[0, 1]` without normalization.
    #[must_use]
    pub fn identity() -> Self {
        Self {
            mean: [0.0; 3],
            std: [1.0; 3],
        }
    }

    /// Apply to-tensor and normalization, producing a `3 x H x W` tensor.
    #[must_use]
    pub fn apply(&self, image: &ImgVec<RGB8>) -> Array3<f32> {
        let (width, height) = (image.width(), image.height());
        let mut tensor = Array3::<f32>::zeros((3, height, width));
        for (y, row) in image.rows().enumerate() {
            for (x, px) in row.iter().enumerate() {
                for (c, v) in [px.r, px.g, px.b].into_iter().enumerate() {
                    tensor[[c, y, x]] = (f32::from(v) / 255.0 - self.mean[c]) / self.std[c];
                }
            }
        }
        tensor
    }
}
