//! Generic folder dataset.
//!
//! ```text
//! images/<split>/<stem>.{png,jpg,jpeg}
//! masks/<split>/<stem>.png
//! ```
//!
//! Masks are grayscale class indices with 255 as ignore. The class count must
//! be configured since it can't be inferred from the files.

use std::path::Path;

use super::{DatasetOptions, LabelEncoding, PairedDataset, SamplePaths, list_files};
use crate::error::{Error, Result};

const NAME: &str = "folder";

pub(crate) fn open(root: &Path, options: DatasetOptions) -> Result<PairedDataset> {
    let num_class = options
        .num_class
        .filter(|&n| n > 0)
        .ok_or_else(|| Error::dataset(NAME, "num_class must be set for folder datasets"))?;

    let split = options.split.as_str();
    let image_dir = root.join("images").join(split);
    let mask_dir = root.join("masks").join(split);
    if !image_dir.is_dir() {
        return Err(Error::dataset(
            NAME,
            format!("missing image directory: {}", image_dir.display()),
        ));
    }

    let mut pairs = Vec::new();
    for image in list_files(&image_dir, &["png", "jpg", "jpeg"])? {
        let Some(stem) = image.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let label = mask_dir.join(format!("{stem}.png"));
        if !label.is_file() {
            return Err(Error::dataset(
                NAME,
                format!("missing label for {}: {}", image.display(), label.display()),
            ));
        }
        pairs.push(SamplePaths { image, label });
    }

    PairedDataset::new(
        NAME,
        pairs,
        (0..num_class).map(|k| format!("class_{k}")).collect(),
        LabelEncoding::Gray { ignore: 255 },
        options,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{IGNORE_LABEL, SegmentationDataset};
    use image::{GrayImage, Luma, RgbImage};

    fn write_pair(root: &Path, stem: &str, mask: Option<u8>) {
        let images = root.join("images/val");
        let masks = root.join("masks/val");
        std::fs::create_dir_all(&images).unwrap();
        std::fs::create_dir_all(&masks).unwrap();
        RgbImage::new(4, 2).save(images.join(format!("{stem}.png"))).unwrap();
        if let Some(value) = mask {
            GrayImage::from_pixel(4, 2, Luma([value]))
                .save(masks.join(format!("{stem}.png")))
                .unwrap();
        }
    }

    fn options() -> DatasetOptions {
        DatasetOptions {
            num_class: Some(3),
            ..DatasetOptions::default()
        }
    }

    #[test]
    fn test_open_pairs_images_with_masks() {
        let dir = tempfile::tempdir().unwrap();
        write_pair(dir.path(), "b", Some(255));
        write_pair(dir.path(), "a", Some(2));

        let ds = open(dir.path(), options()).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.num_class(), 3);

        let first = ds.get(0).unwrap();
        assert_eq!(first.info.filename, "a.png");
        assert_eq!(first.seg_label[[1, 3]], 2);
        assert_eq!(ds.get(1).unwrap().seg_label[[0, 0]], IGNORE_LABEL);
    }

    #[test]
    fn test_missing_mask_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        write_pair(dir.path(), "a", Some(0));
        write_pair(dir.path(), "b", None);

        let err = open(dir.path(), options()).err().unwrap();
        assert!(matches!(err, Error::Dataset { .. }), "{err}");
    }

    #[test]
    fn test_num_class_required() {
        let dir = tempfile::tempdir().unwrap();
        write_pair(dir.path(), "a", Some(0));
        assert!(open(dir.path(), DatasetOptions::default()).is_err());
    }
}
