//! ADE20K scene parsing (MIT SceneParsing benchmark).
//!
//! Layout under the dataset root:
//!
//! ```text
//! ADEChallengeData2016/images/<training|validation>/*.jpg
//! ADEChallengeData2016/annotations/<training|validation>/*.png
//! ```
//!
//! Annotation value 0 is "other" and is ignored; classes are shifted down by one.

use std::path::Path;

use super::{
    DatasetOptions, DatasetSplit, LabelEncoding, PairedDataset, SamplePaths, list_files,
    resolve_base,
};
use crate::error::{Error, Result};

const NAME: &str = "ade20k";

pub(crate) const CLASS_NAMES: [&str; 150] = [
    "wall", "building", "sky", "floor", "tree", "ceiling", "road", "bed", "windowpane", "grass",
    "cabinet", "sidewalk", "person", "earth", "door", "table", "mountain", "plant", "curtain",
    "chair", "car", "water", "painting", "sofa", "shelf", "house", "sea", "mirror", "rug",
    "field", "armchair", "seat", "fence", "desk", "rock", "wardrobe", "lamp", "bathtub",
    "railing", "cushion", "base", "box", "column", "signboard", "chest of drawers", "counter",
    "sand", "sink", "skyscraper", "fireplace", "refrigerator", "grandstand", "path", "stairs",
    "runway", "case", "pool table", "pillow", "screen door", "stairway", "river", "bridge",
    "bookcase", "blind", "coffee table", "toilet", "flower", "book", "hill", "bench",
    "countertop", "stove", "palm", "kitchen island", "computer", "swivel chair", "boat", "bar",
    "arcade machine", "hovel", "bus", "towel", "light", "truck", "tower", "chandelier",
    "awning", "streetlight", "booth", "television receiver", "airplane", "dirt track",
    "apparel", "pole", "land", "bannister", "escalator", "ottoman", "bottle", "buffet",
    "poster", "stage", "van", "ship", "fountain", "conveyer belt", "canopy", "washer",
    "plaything", "swimming pool", "stool", "barrel", "basket", "waterfall", "tent", "bag",
    "minibike", "cradle", "oven", "ball", "food", "step", "tank", "trade name", "microwave",
    "pot", "animal", "bicycle", "lake", "dishwasher", "screen", "blanket", "sculpture", "hood",
    "sconce", "vase", "traffic light", "tray", "ashcan", "fan", "pier", "crt screen", "plate",
    "monitor", "bulletin board", "shower", "radiator", "glass", "clock", "flag",
];

pub(crate) fn open(root: &Path, options: DatasetOptions) -> Result<PairedDataset> {
    let base = resolve_base(root, &["ADEChallengeData2016", "ADE20K"]);
    let split_dir = match options.split {
        DatasetSplit::Train => "training",
        DatasetSplit::Val | DatasetSplit::Test => "validation",
    };
    let image_dir = base.join("images").join(split_dir);
    let label_dir = base.join("annotations").join(split_dir);

    if !image_dir.is_dir() {
        return Err(Error::dataset(
            NAME,
            format!("missing image directory: {}", image_dir.display()),
        ));
    }

    let mut pairs = Vec::new();
    for image in list_files(&image_dir, &["jpg", "jpeg"])? {
        let Some(stem) = image.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let label = label_dir.join(format!("{stem}.png"));
        if !label.is_file() {
            return Err(Error::dataset(
                NAME,
                format!("missing label for {}: {}", image.display(), label.display()),
            ));
        }
        pairs.push(SamplePaths { image, label });
    }

    tracing::info!(split = split_dir, samples = pairs.len(), "Found ADE20K images");
    PairedDataset::new(
        NAME,
        pairs,
        CLASS_NAMES.iter().map(|s| s.to_string()).collect(),
        LabelEncoding::ShiftedByOne,
        options,
    )
}
