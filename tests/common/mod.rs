//! Shared fixtures: an on-disk folder dataset and linear weights.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use image::{GrayImage, Luma, Rgb, RgbImage};
use ndarray::Array4;
use seg_eval::{LinearWeights, ModelOutput, Result, SegmentationModel};

pub const WIDTH: u32 = 16;
pub const HEIGHT: u32 = 8;

/// Write `count` image/mask pairs under `root/{images,masks}/val`.
///
/// Each image is black on the left half and red on the right half; the mask
/// labels the halves 0 and 1, with the top-left pixel ignored.
pub fn write_folder_dataset(root: &Path, count: usize) {
    let images = root.join("images").join("val");
    let masks = root.join("masks").join("val");
    std::fs::create_dir_all(&images).unwrap();
    std::fs::create_dir_all(&masks).unwrap();

    for i in 0..count {
        let image = RgbImage::from_fn(WIDTH, HEIGHT, |x, _| {
            if x < WIDTH / 2 { Rgb([0, 0, 0]) } else { Rgb([255, 0, 0]) }
        });
        let mask = GrayImage::from_fn(WIDTH, HEIGHT, |x, y| {
            if x == 0 && y == 0 {
                Luma([255])
            } else {
                Luma([u8::from(x >= WIDTH / 2)])
            }
        });
        image.save(images.join(format!("{i:03}.png"))).unwrap();
        mask.save(masks.join(format!("{i:03}.png"))).unwrap();
    }
}

/// Two-class weights that threshold the normalized red channel.
pub fn red_threshold_weights() -> LinearWeights {
    LinearWeights {
        in_channels: 3,
        num_class: 2,
        output_stride: 1,
        weight: vec![vec![-1.0, 0.0, 0.0], vec![1.0, 0.0, 0.0]],
        bias: vec![0.0, 0.0],
        norm: None,
        aux: None,
    }
}

/// Constant-output model that counts forward calls.
pub struct CountingModel {
    pub calls: Arc<AtomicUsize>,
    pub num_class: usize,
}

impl CountingModel {
    pub fn new(num_class: usize) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                calls: Arc::clone(&calls),
                num_class,
            },
            calls,
        )
    }
}

impl SegmentationModel for CountingModel {
    fn name(&self) -> &str {
        "counting"
    }

    fn num_class(&self) -> usize {
        self.num_class
    }

    fn forward(&self, input: &Array4<f32>) -> Result<ModelOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (n, _, h, w) = input.dim();
        // Quarter resolution, like a strided backbone.
        let out = Array4::from_shape_fn((n, self.num_class, (h / 4).max(1), (w / 4).max(1)), |(_, k, _, x)| {
            (k + x) as f32
        });
        Ok(ModelOutput { out, aux: None })
    }
}
