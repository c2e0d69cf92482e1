//! Tensor operations used by the evaluation loop.
//!
//! All tensors use `NCHW` layout (`batch, channel, height, width`) and `f32`
//! elements. These are the few numeric primitives the evaluator needs:
//!
//! - [`interpolate_bilinear`]: resize logits to the label size (aligned corners)
//! - [`softmax_channels`]: per-pixel softmax over the class axis
//! - [`flip_width`]: horizontal mirror for flip test-time augmentation
//! - [`argmax_channels`]: per-pixel predicted class

use ndarray::{Array3, Array4, ArrayView3, ArrayView4, Axis, s};

/// Bilinearly resize a `NCHW` tensor to `size = (height, width)`.
///
/// Uses the aligned-corners convention: the corner pixels of the input and
/// output grids coincide, so `src = dst * (in - 1) / (out - 1)`.
#[must_use]
pub fn interpolate_bilinear(input: ArrayView4<'_, f32>, size: (usize, usize)) -> Array4<f32> {
    let (n, c, in_h, in_w) = input.dim();
    let (out_h, out_w) = size;
    let mut out = Array4::<f32>::zeros((n, c, out_h, out_w));

    if in_h == 0 || in_w == 0 || out_h == 0 || out_w == 0 {
        return out;
    }
    if (in_h, in_w) == (out_h, out_w) {
        out.assign(&input);
        return out;
    }

    let ys = axis_taps(in_h, out_h);
    let xs = axis_taps(in_w, out_w);

    for b in 0..n {
        for ch in 0..c {
            let plane = input.slice(s![b, ch, .., ..]);
            let mut dst = out.slice_mut(s![b, ch, .., ..]);
            for (oy, &(y0, y1, wy)) in ys.iter().enumerate() {
                for (ox, &(x0, x1, wx)) in xs.iter().enumerate() {
                    let top = plane[[y0, x0]] * (1.0 - wx) + plane[[y0, x1]] * wx;
                    let bottom = plane[[y1, x0]] * (1.0 - wx) + plane[[y1, x1]] * wx;
                    dst[[oy, ox]] = top * (1.0 - wy) + bottom * wy;
                }
            }
        }
    }

    out
}

/// Source taps `(lo, hi, weight_of_hi)` for each output coordinate.
fn axis_taps(in_len: usize, out_len: usize) -> Vec<(usize, usize, f32)> {
    let scale = if out_len > 1 {
        (in_len - 1) as f32 / (out_len - 1) as f32
    } else {
        0.0
    };
    (0..out_len)
        .map(|o| {
            let src = o as f32 * scale;
            let lo = (src.floor() as usize).min(in_len - 1);
            let hi = (lo + 1).min(in_len - 1);
            (lo, hi, src - lo as f32)
        })
        .collect()
}

/// Softmax over the channel axis of a `NCHW` tensor.
///
/// A pixel whose logits are all `-inf` gets a uniform distribution.
#[must_use]
pub fn softmax_channels(input: ArrayView4<'_, f32>) -> Array4<f32> {
    let mut out = input.to_owned();
    for mut lane in out.lanes_mut(Axis(1)) {
        let max = lane.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        if max == f32::NEG_INFINITY {
            let uniform = 1.0 / lane.len() as f32;
            lane.fill(uniform);
            continue;
        }
        let mut sum = 0.0f32;
        for v in &mut lane {
            *v = (*v - max).exp();
            sum += *v;
        }
        if sum > 0.0 {
            lane.mapv_inplace(|v| v / sum);
        }
    }
    out
}

/// Mirror a `NCHW` tensor along its width axis.
#[must_use]
pub fn flip_width(input: ArrayView4<'_, f32>) -> Array4<f32> {
    input.slice(s![.., .., .., ..;-1]).to_owned()
}

/// Per-pixel index of the largest channel, shape `(N, H, W)`.
///
/// Ties resolve to the lowest class index.
#[must_use]
pub fn argmax_channels(input: ArrayView4<'_, f32>) -> Array3<usize> {
    input.map_axis(Axis(1), |lane| {
        let mut best = 0usize;
        let mut best_val = f32::NEG_INFINITY;
        for (i, &v) in lane.iter().enumerate() {
            if v > best_val {
                best = i;
                best_val = v;
            }
        }
        best
    })
}

/// Add a leading batch axis to a `CHW` image tensor.
#[must_use]
pub fn batch_of_one(image: ArrayView3<'_, f32>) -> Array4<f32> {
    image.to_owned().insert_axis(Axis(0))
}
