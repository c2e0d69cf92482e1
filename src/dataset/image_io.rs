//! Image and label file decoding.

use std::path::Path;

use image::imageops::{self, FilterType};
use image::{ColorType, DynamicImage, RgbImage};
use imgref::ImgVec;
use ndarray::Array2;
use rgb::RGB8;

use super::{IGNORE_LABEL, LabelEncoding, cityscapes, pascal_voc};
use crate::error::{Error, Result};

fn open(path: &Path) -> Result<DynamicImage> {
    image::open(path).map_err(|e| Error::ImageLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Decode an image as 8-bit RGB.
pub(crate) fn load_rgb(path: &Path) -> Result<RgbImage> {
    Ok(open(path)?.to_rgb8())
}

/// Decode a label file into class indices.
pub(crate) fn load_label(path: &Path, encoding: LabelEncoding) -> Result<Array2<i64>> {
    let img = open(path)?;

    if encoding == LabelEncoding::VocPalette && img.color() != ColorType::L8 {
        let rgb = img.to_rgb8();
        let (w, h) = (rgb.width() as usize, rgb.height() as usize);
        let labels = rgb
            .pixels()
            .map(|p| pascal_voc::palette_index([p[0], p[1], p[2]]))
            .collect();
        return into_array(labels, h, w, path);
    }

    let luma = img.to_luma8();
    let (w, h) = (luma.width() as usize, luma.height() as usize);
    let labels = luma
        .pixels()
        .map(|p| decode_gray(p[0], encoding))
        .collect();
    into_array(labels, h, w, path)
}

fn decode_gray(raw: u8, encoding: LabelEncoding) -> i64 {
    match encoding {
        LabelEncoding::CityscapesLabelIds => cityscapes::train_id(raw),
        LabelEncoding::ShiftedByOne => {
            if raw == 0 {
                IGNORE_LABEL
            } else {
                i64::from(raw) - 1
            }
        }
        LabelEncoding::VocPalette if raw == 255 => IGNORE_LABEL,
        LabelEncoding::Gray { ignore } if raw == ignore => IGNORE_LABEL,
        LabelEncoding::VocPalette | LabelEncoding::Gray { .. } => i64::from(raw),
    }
}

fn into_array(labels: Vec<i64>, h: usize, w: usize, path: &Path) -> Result<Array2<i64>> {
    Array2::from_shape_vec((h, w), labels).map_err(|e| Error::ImageLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Bilinear resize to `width x height`.
pub(crate) fn resize(image: &RgbImage, width: u32, height: u32) -> RgbImage {
    if image.dimensions() == (width, height) {
        return image.clone();
    }
    imageops::resize(image, width, height, FilterType::Triangle)
}

/// Convert to the `imgref` representation used by the input transform.
pub(crate) fn to_imgvec(image: &RgbImage) -> ImgVec<RGB8> {
    let pixels = image.pixels().map(|p| RGB8::new(p[0], p[1], p[2])).collect();
    ImgVec::new(pixels, image.width() as usize, image.height() as usize)
}
