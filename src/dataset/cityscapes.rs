//! Cityscapes fine annotations.
//!
//! Layout under the dataset root:
//!
//! ```text
//! leftImg8bit/<split>/<city>/<frame>_leftImg8bit.png
//! gtFine/<split>/<city>/<frame>_gtFine_labelIds.png
//! ```

use std::path::Path;

use super::{
    DatasetOptions, IGNORE_LABEL, LabelEncoding, PairedDataset, SamplePaths, list_files,
    resolve_base,
};
use crate::error::{Error, Result};

const NAME: &str = "citys";

const IMAGE_SUFFIX: &str = "_leftImg8bit.png";
const LABEL_SUFFIX: &str = "_gtFine_labelIds.png";

/// The 19 evaluated classes, in train-id order.
pub(crate) const CLASS_NAMES: [&str; 19] = [
    "road", "sidewalk", "building", "wall", "fence", "pole", "traffic light", "traffic sign",
    "vegetation", "terrain", "sky", "person", "rider", "car", "truck", "bus", "train",
    "motorcycle", "bicycle",
];

/// `(label_id, train_id)` for every evaluated label id.
const LABEL_TO_TRAIN: [(u8, i64); 19] = [
    (7, 0),
    (8, 1),
    (11, 2),
    (12, 3),
    (13, 4),
    (17, 5),
    (19, 6),
    (20, 7),
    (21, 8),
    (22, 9),
    (23, 10),
    (24, 11),
    (25, 12),
    (26, 13),
    (27, 14),
    (28, 15),
    (31, 16),
    (32, 17),
    (33, 18),
];

/// Map a raw Cityscapes label id to its train id.
pub(crate) fn train_id(label_id: u8) -> i64 {
    LABEL_TO_TRAIN
        .iter()
        .find(|(id, _)| *id == label_id)
        .map_or(IGNORE_LABEL, |&(_, train)| train)
}

pub(crate) fn open(root: &Path, options: DatasetOptions) -> Result<PairedDataset> {
    let base = resolve_base(root, &["citys", "cityscapes"]);
    let split = options.split.as_str();
    let image_dir = base.join("leftImg8bit").join(split);
    let label_dir = base.join("gtFine").join(split);

    if !image_dir.is_dir() {
        return Err(Error::dataset(
            NAME,
            format!("missing image directory: {}", image_dir.display()),
        ));
    }

    let mut cities: Vec<_> = std::fs::read_dir(&image_dir)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.is_dir())
        .collect();
    cities.sort();

    let mut pairs = Vec::new();
    for city_dir in cities {
        let Some(city) = city_dir.file_name() else {
            continue;
        };
        for image in list_files(&city_dir, &["png"])? {
            let Some(frame) = image
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_suffix(IMAGE_SUFFIX))
            else {
                continue;
            };
            let label = label_dir.join(city).join(format!("{frame}{LABEL_SUFFIX}"));
            if !label.is_file() {
                return Err(Error::dataset(
                    NAME,
                    format!("missing label for {}: {}", image.display(), label.display()),
                ));
            }
            pairs.push(SamplePaths { image, label });
        }
    }

    tracing::info!(split, samples = pairs.len(), "Found Cityscapes images");
    PairedDataset::new(
        NAME,
        pairs,
        CLASS_NAMES.iter().map(|s| s.to_string()).collect(),
        LabelEncoding::CityscapesLabelIds,
        options,
    )
}
