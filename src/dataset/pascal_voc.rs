//! Pascal VOC 2012 segmentation.
//!
//! Layout under the dataset root (a `VOCdevkit/` or `VOC2012/` prefix is
//! also accepted):
//!
//! ```text
//! ImageSets/Segmentation/<split>.txt
//! JPEGImages/<id>.jpg
//! SegmentationClass/<id>.png
//! ```
//!
//! Class masks are palette PNGs; colors are mapped back to class indices and
//! the boundary color is ignored. Grayscale masks are read as indices.

use std::path::{Path, PathBuf};

use super::{DatasetOptions, IGNORE_LABEL, LabelEncoding, PairedDataset, SamplePaths};
use crate::error::{Error, Result};

const NAME: &str = "pascal_voc";

pub(crate) const CLASS_NAMES: [&str; 21] = [
    "background", "aeroplane", "bicycle", "bird", "boat", "bottle", "bus", "car", "cat",
    "chair", "cow", "diningtable", "dog", "horse", "motorbike", "person", "pottedplant",
    "sheep", "sofa", "train", "tvmonitor",
];

/// Palette color of VOC class `index`.
pub(crate) fn palette_color(index: u8) -> [u8; 3] {
    let mut rgb = [0u8; 3];
    let mut c = index;
    for j in 0..8 {
        for (channel, value) in rgb.iter_mut().enumerate() {
            *value |= ((c >> channel) & 1) << (7 - j);
        }
        c >>= 3;
    }
    rgb
}

/// Class index for a palette color; unknown colors (boundary) are ignored.
pub(crate) fn palette_index(rgb: [u8; 3]) -> i64 {
    (0..CLASS_NAMES.len() as u8)
        .find(|&k| palette_color(k) == rgb)
        .map_or(IGNORE_LABEL, i64::from)
}

fn resolve_voc_base(root: &Path) -> PathBuf {
    [root.join("VOCdevkit/VOC2012"), root.join("VOC2012")]
        .into_iter()
        .find(|p| p.is_dir())
        .unwrap_or_else(|| root.to_path_buf())
}

pub(crate) fn open(root: &Path, options: DatasetOptions) -> Result<PairedDataset> {
    let base = resolve_voc_base(root);
    let list = base
        .join("ImageSets/Segmentation")
        .join(format!("{}.txt", options.split));

    let ids = std::fs::read_to_string(&list).map_err(|e| {
        Error::dataset(NAME, format!("cannot read split list {}: {e}", list.display()))
    })?;

    let mut pairs = Vec::new();
    for id in ids.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let image = base.join("JPEGImages").join(format!("{id}.jpg"));
        let label = base.join("SegmentationClass").join(format!("{id}.png"));
        if !image.is_file() || !label.is_file() {
            return Err(Error::dataset(
                NAME,
                format!("missing image or mask for id {id} under {}", base.display()),
            ));
        }
        pairs.push(SamplePaths { image, label });
    }

    tracing::info!(split = %options.split, samples = pairs.len(), "Found Pascal VOC images");
    PairedDataset::new(
        NAME,
        pairs,
        CLASS_NAMES.iter().map(|s| s.to_string()).collect(),
        LabelEncoding::VocPalette,
        options,
    )
}
