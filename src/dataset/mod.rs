//! Validation datasets for semantic segmentation.
//!
//! A dataset is an indexed sequence of [`Sample`]s: a list of normalized
//! image tensors (one per input scale), the ground-truth label map, and file
//! information. Datasets are opened by name through
//! [`get_segmentation_dataset`]:
//!
//! | Name | Layout | Classes |
//! |------|--------|---------|
//! | `citys`, `cityscapes` | `leftImg8bit/` + `gtFine/` | 19 |
//! | `pascal_voc`, `voc` | `VOC2012/JPEGImages` + `SegmentationClass` | 21 |
//! | `ade20k`, `ade` | `ADEChallengeData2016/images` + `annotations` | 150 |
//! | `folder` | `images/<split>` + `masks/<split>` | configured |
//!
//! Label maps use [`IGNORE_LABEL`] for pixels excluded from scoring.

mod ade20k;
mod cityscapes;
mod folder;
mod image_io;
pub mod loader;
mod pascal_voc;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use ndarray::{Array2, Array3};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::transform::InputTransform;

pub use loader::{DataLoader, Sampler, make_data_sampler};

/// Label value for pixels that are excluded from all statistics.
pub const IGNORE_LABEL: i64 = -1;

/// Multi-scale sizes are rounded to a multiple of this.
pub const SIZE_ALIGNMENT: u32 = 8;

/// Dataset split.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetSplit {
    /// Training split.
    Train,
    /// Validation split.
    #[default]
    Val,
    /// Test split.
    Test,
}

impl DatasetSplit {
    /// Lowercase name as used in directory layouts.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Train => "train",
            Self::Val => "val",
            Self::Test => "test",
        }
    }
}

impl fmt::Display for DatasetSplit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatasetSplit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "train" | "training" => Ok(Self::Train),
            "val" | "validation" => Ok(Self::Val),
            "test" => Ok(Self::Test),
            other => Err(Error::Config(format!("unknown split: {other}"))),
        }
    }
}

/// How input images are prepared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetMode {
    /// One image at original resolution.
    Val,
    /// One image per configured scale.
    #[default]
    MsVal,
}

/// Options shared by all datasets.
#[derive(Debug, Clone)]
pub struct DatasetOptions {
    /// Split to load.
    pub split: DatasetSplit,
    /// Image preparation mode.
    pub mode: DatasetMode,
    /// Input transform applied to every image.
    pub transform: InputTransform,
    /// Scales for [`DatasetMode::MsVal`].
    pub scales: Vec<f64>,
    /// Base short side; defaults to each image's own short side.
    pub base_size: Option<u32>,
    /// Class count for datasets that can't infer it.
    pub num_class: Option<usize>,
}

impl Default for DatasetOptions {
    fn default() -> Self {
        Self {
            split: DatasetSplit::Val,
            mode: DatasetMode::MsVal,
            transform: InputTransform::imagenet(),
            scales: vec![1.0],
            base_size: None,
            num_class: None,
        }
    }
}

/// Per-sample file information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleInfo {
    /// Image file name (without directories).
    pub filename: String,
    /// Original image width.
    pub width: usize,
    /// Original image height.
    pub height: usize,
}

/// One validation sample.
#[derive(Debug, Clone)]
pub struct Sample {
    /// Normalized `3 x H x W` image tensors, one per scale.
    pub img_data: Vec<Array3<f32>>,
    /// Ground-truth class index per pixel (`H x W`), [`IGNORE_LABEL`] excluded.
    pub seg_label: Array2<i64>,
    /// File information.
    pub info: SampleInfo,
}

/// An indexed segmentation dataset.
pub trait SegmentationDataset: Send + Sync {
    /// Dataset identifier.
    fn name(&self) -> &str;

    /// Number of samples.
    fn len(&self) -> usize;

    /// Whether the dataset has no samples.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of segmentation classes.
    fn num_class(&self) -> usize;

    /// Human-readable class names, `num_class` long.
    fn class_names(&self) -> Vec<String> {
        (0..self.num_class()).map(|k| format!("class_{k}")).collect()
    }

    /// Load the sample at `index`.
    fn get(&self, index: usize) -> Result<Sample>;
}

/// Open a dataset by name.
///
/// `root` is the dataset directory (for example the directory holding
/// `leftImg8bit/` and `gtFine/` for Cityscapes).
pub fn get_segmentation_dataset(
    name: &str,
    root: &Path,
    options: DatasetOptions,
) -> Result<Box<dyn SegmentationDataset>> {
    if !root.exists() {
        return Err(Error::dataset(
            name,
            format!("root does not exist: {}", root.display()),
        ));
    }

    let dataset = match name.to_ascii_lowercase().as_str() {
        "citys" | "cityscapes" => cityscapes::open(root, options)?,
        "pascal_voc" | "voc" => pascal_voc::open(root, options)?,
        "ade20k" | "ade" => ade20k::open(root, options)?,
        "folder" => folder::open(root, options)?,
        other => return Err(Error::UnknownDataset(other.to_string())),
    };

    tracing::debug!(
        dataset = dataset.name(),
        samples = dataset.len(),
        classes = dataset.num_class(),
        "dataset opened"
    );
    Ok(Box::new(dataset))
}

/// Names accepted by [`get_segmentation_dataset`].
#[must_use]
pub fn dataset_names() -> &'static [&'static str] {
    &["citys", "pascal_voc", "ade20k", "folder"]
}

/// How raw label files decode into class indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LabelEncoding {
    /// Cityscapes `labelIds` mapped to train ids.
    CityscapesLabelIds,
    /// Pascal VOC palette colors (or already-indexed grayscale).
    VocPalette,
    /// ADE20K: 0 is unlabeled, others shift down by one.
    ShiftedByOne,
    /// Grayscale class index, one value reserved for ignore.
    Gray {
        /// Raw value mapped to [`IGNORE_LABEL`].
        ignore: u8,
    },
}

/// Image/label file pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SamplePaths {
    pub image: PathBuf,
    pub label: PathBuf,
}

/// Dataset backed by a list of image/label file pairs.
pub(crate) struct PairedDataset {
    name: String,
    pairs: Vec<SamplePaths>,
    class_names: Vec<String>,
    encoding: LabelEncoding,
    options: DatasetOptions,
}

impl PairedDataset {
    pub(crate) fn new(
        name: &str,
        pairs: Vec<SamplePaths>,
        class_names: Vec<String>,
        encoding: LabelEncoding,
        options: DatasetOptions,
    ) -> Result<Self> {
        if pairs.is_empty() {
            return Err(Error::dataset(
                name,
                format!("no samples found for split {}", options.split),
            ));
        }
        Ok(Self {
            name: name.to_string(),
            pairs,
            class_names,
            encoding,
            options,
        })
    }
}

impl SegmentationDataset for PairedDataset {
    fn name(&self) -> &str {
        &self.name
    }

    fn len(&self) -> usize {
        self.pairs.len()
    }

    fn num_class(&self) -> usize {
        self.class_names.len()
    }

    fn class_names(&self) -> Vec<String> {
        self.class_names.clone()
    }

    fn get(&self, index: usize) -> Result<Sample> {
        let paths = self.pairs.get(index).ok_or_else(|| {
            Error::dataset(
                &self.name,
                format!("index {index} out of range ({} samples)", self.pairs.len()),
            )
        })?;

        let image = image_io::load_rgb(&paths.image)?;
        let (width, height) = (image.width() as usize, image.height() as usize);
        let seg_label = image_io::load_label(&paths.label, self.encoding)?;
        if seg_label.dim() != (height, width) {
            return Err(Error::ShapeMismatch {
                context: "label size",
                expected: vec![height, width],
                actual: vec![seg_label.nrows(), seg_label.ncols()],
            });
        }

        let img_data = match self.options.mode {
            DatasetMode::Val => vec![self.options.transform.apply(&image_io::to_imgvec(&image))],
            DatasetMode::MsVal => self
                .options
                .scales
                .iter()
                .map(|&scale| {
                    let (w, h) =
                        scaled_size(width as u32, height as u32, self.options.base_size, scale);
                    let resized = image_io::resize(&image, w, h);
                    self.options.transform.apply(&image_io::to_imgvec(&resized))
                })
                .collect(),
        };

        let filename = paths
            .image
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();

        Ok(Sample {
            img_data,
            seg_label,
            info: SampleInfo {
                filename,
                width,
                height,
            },
        })
    }
}

/// Size of an image resized for one input scale.
///
/// The short side becomes `base_size * scale` (or the image's own short side
/// times `scale`), rounded to a multiple of [`SIZE_ALIGNMENT`]; the long side
/// keeps the aspect ratio.
#[must_use]
pub fn scaled_size(width: u32, height: u32, base_size: Option<u32>, scale: f64) -> (u32, u32) {
    let short = width.min(height).max(1);
    let long = width.max(height);
    let base = f64::from(base_size.unwrap_or(short));

    let align = f64::from(SIZE_ALIGNMENT);
    let new_short = ((base * scale / align).round() * align).max(align) as u32;
    let new_long = ((f64::from(long) * f64::from(new_short) / f64::from(short)).round() as u32).max(1);

    if width <= height {
        (new_short, new_long)
    } else {
        (new_long, new_short)
    }
}

/// Return `root/sub` for the first existing `sub`, else `root`.
pub(crate) fn resolve_base(root: &Path, candidates: &[&str]) -> PathBuf {
    candidates
        .iter()
        .map(|sub| root.join(sub))
        .find(|p| p.is_dir())
        .unwrap_or_else(|| root.to_path_buf())
}

/// Sorted regular files in `dir` whose extension is one of `extensions`.
pub(crate) fn list_files(dir: &Path, extensions: &[&str]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| extensions.contains(&e.to_ascii_lowercase().as_str()));
        if path.is_file() && matches {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
