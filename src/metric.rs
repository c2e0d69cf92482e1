//! Pixel accuracy and Intersection-over-Union accumulation.
//!
//! [`SegmentationMetric`] accumulates, across every update:
//!
//! - correctly classified labeled pixels and total labeled pixels
//! - per-class intersection and union areas
//!
//! Pixels whose target is negative (ignore) or outside `0..num_class` are
//! excluded from every count. Predictions are the per-pixel argmax of the
//! score tensor.

use ndarray::{ArrayView3, ArrayView4};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ops::argmax_channels;

/// Guards the divisions against empty denominators.
const EPS: f64 = f64::EPSILON;

/// Aggregate results of a [`SegmentationMetric`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricValues {
    /// Correct labeled pixels / labeled pixels.
    pub pix_acc: f64,
    /// IoU per class, `num_class` entries.
    pub iou: Vec<f64>,
    /// Mean of [`MetricValues::iou`].
    pub miou: f64,
}

impl MetricValues {
    /// `(class_index, iou)` pairs.
    pub fn iter_iou(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.iou.iter().copied().enumerate()
    }
}

#[derive(Debug, Clone)]
struct PixelCounts {
    correct: u64,
    labeled: u64,
    area_inter: Vec<u64>,
    area_pred: Vec<u64>,
    area_label: Vec<u64>,
}

impl PixelCounts {
    fn new(num_class: usize) -> Self {
        Self {
            correct: 0,
            labeled: 0,
            area_inter: vec![0; num_class],
            area_pred: vec![0; num_class],
            area_label: vec![0; num_class],
        }
    }

    fn merge(mut self, other: Self) -> Self {
        self.correct += other.correct;
        self.labeled += other.labeled;
        for (a, b) in [
            (&mut self.area_inter, &other.area_inter),
            (&mut self.area_pred, &other.area_pred),
            (&mut self.area_label, &other.area_label),
        ] {
            a.iter_mut().zip(b).for_each(|(x, y)| *x += y);
        }
        self
    }
}

/// Confusion-based segmentation metric.
#[derive(Debug, Clone)]
pub struct SegmentationMetric {
    num_class: usize,
    total_correct: u64,
    total_label: u64,
    total_inter: Vec<u64>,
    total_union: Vec<u64>,
}

impl SegmentationMetric {
    /// Create an empty metric for `num_class` classes.
    #[must_use]
    pub fn new(num_class: usize) -> Self {
        Self {
            num_class,
            total_correct: 0,
            total_label: 0,
            total_inter: vec![0; num_class],
            total_union: vec![0; num_class],
        }
    }

    /// Number of classes.
    #[must_use]
    pub fn num_class(&self) -> usize {
        self.num_class
    }

    /// Clear all accumulated counts.
    pub fn reset(&mut self) {
        self.total_correct = 0;
        self.total_label = 0;
        self.total_inter.fill(0);
        self.total_union.fill(0);
    }

    /// Accumulate one batch.
    ///
    /// * `scores` - `N x num_class x H x W` class evidence (logits or probabilities).
    /// * `target` - `N x H x W` ground-truth class indices.
    pub fn update(&mut self, scores: ArrayView4<'_, f32>, target: ArrayView3<'_, i64>) -> Result<()> {
        let (n, c, h, w) = scores.dim();
        if c != self.num_class {
            return Err(Error::ShapeMismatch {
                context: "metric scores",
                expected: vec![n, self.num_class, h, w],
                actual: vec![n, c, h, w],
            });
        }
        if target.dim() != (n, h, w) {
            let (tn, th, tw) = target.dim();
            return Err(Error::ShapeMismatch {
                context: "metric target",
                expected: vec![n, h, w],
                actual: vec![tn, th, tw],
            });
        }
        if w == 0 {
            return Ok(());
        }

        let pred: Vec<usize> = argmax_channels(scores).iter().copied().collect();
        let label: Vec<i64> = target.iter().copied().collect();
        let num_class = self.num_class;

        let counts = pred
            .par_chunks(w)
            .zip(label.par_chunks(w))
            .fold(
                || PixelCounts::new(num_class),
                |mut acc, (p_row, t_row)| {
                    for (&p, &t) in p_row.iter().zip(t_row) {
                        let Some(t) = usize::try_from(t).ok().filter(|&t| t < num_class) else {
                            continue;
                        };
                        acc.labeled += 1;
                        acc.area_label[t] += 1;
                        acc.area_pred[p] += 1;
                        if p == t {
                            acc.correct += 1;
                            acc.area_inter[t] += 1;
                        }
                    }
                    acc
                },
            )
            .reduce(|| PixelCounts::new(num_class), PixelCounts::merge);

        self.total_correct += counts.correct;
        self.total_label += counts.labeled;
        for k in 0..num_class {
            self.total_inter[k] += counts.area_inter[k];
            self.total_union[k] += counts.area_pred[k] + counts.area_label[k] - counts.area_inter[k];
        }
        Ok(())
    }

    /// Pixel accuracy, per-class IoU and mean IoU.
    #[must_use]
    pub fn get(&self) -> MetricValues {
        let pix_acc = self.total_correct as f64 / (EPS + self.total_label as f64);
        let iou: Vec<f64> = self
            .total_inter
            .iter()
            .zip(&self.total_union)
            .map(|(&i, &u)| i as f64 / (EPS + u as f64))
            .collect();
        let miou = if iou.is_empty() {
            0.0
        } else {
            iou.iter().sum::<f64>() / iou.len() as f64
        };
        MetricValues { pix_acc, iou, miou }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array, Array3, Array4};

    /// One-hot scores from a class map.
    fn one_hot(classes: &Array3<usize>, num_class: usize) -> Array4<f32> {
        let (n, h, w) = classes.dim();
        Array::from_shape_fn((n, num_class, h, w), |(b, k, y, x)| {
            if classes[[b, y, x]] == k { 1.0 } else { 0.0 }
        })
    }

    #[test]
    fn test_perfect_prediction() {
        let classes = Array::from_shape_vec((1, 2, 2), vec![0, 1, 2, 1]).unwrap();
        let target = classes.mapv(|c| c as i64);
        let mut metric = SegmentationMetric::new(3);
        metric.update(one_hot(&classes, 3).view(), target.view()).unwrap();

        let v = metric.get();
        assert!((v.pix_acc - 1.0).abs() < 1e-9);
        assert_eq!(v.iou.len(), 3);
        assert!(v.iou.iter().all(|&i| (i - 1.0).abs() < 1e-9));
        assert!((v.miou - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_known_confusion() {
        // pred:   0 0 1 1
        // target: 0 1 1 -1
        let pred = Array::from_shape_vec((1, 1, 4), vec![0, 0, 1, 1]).unwrap();
        let target = Array::from_shape_vec((1, 1, 4), vec![0i64, 1, 1, -1]).unwrap();
        let mut metric = SegmentationMetric::new(2);
        metric.update(one_hot(&pred, 2).view(), target.view()).unwrap();

        let v = metric.get();
        // 2 correct out of 3 labeled
        assert!((v.pix_acc - 2.0 / 3.0).abs() < 1e-9);
        // class 0: inter 1, union 2; class 1: inter 1, union 2
        assert!((v.iou[0] - 0.5).abs() < 1e-9);
        assert!((v.iou[1] - 0.5).abs() < 1e-9);
        assert!((v.miou - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_accumulates_and_resets() {
        let pred = Array::from_shape_vec((1, 1, 2), vec![0, 1]).unwrap();
        let good = Array::from_shape_vec((1, 1, 2), vec![0i64, 1]).unwrap();
        let bad = Array::from_shape_vec((1, 1, 2), vec![1i64, 0]).unwrap();
        let scores = one_hot(&pred, 2);

        let mut metric = SegmentationMetric::new(2);
        metric.update(scores.view(), good.view()).unwrap();
        metric.update(scores.view(), bad.view()).unwrap();
        assert!((metric.get().pix_acc - 0.5).abs() < 1e-9);

        metric.reset();
        let v = metric.get();
        assert_eq!(v.pix_acc, 0.0);
        assert_eq!(v.miou, 0.0);
    }

    #[test]
    fn test_all_ignored_gives_zero() {
        let pred = Array::from_shape_vec((1, 1, 2), vec![0, 1]).unwrap();
        let target = Array::from_shape_vec((1, 1, 2), vec![-1i64, 7]).unwrap();
        let mut metric = SegmentationMetric::new(2);
        metric.update(one_hot(&pred, 2).view(), target.view()).unwrap();
        let v = metric.get();
        assert_eq!(v.pix_acc, 0.0);
        assert_eq!(v.iou, vec![0.0, 0.0]);
    }

    #[test]
    fn test_values_in_unit_interval() {
        let pred = Array::from_shape_fn((2, 8, 8), |(b, y, x)| (b + y * x) % 4);
        let target = Array::from_shape_fn((2, 8, 8), |(_, y, x)| ((y + x) % 5) as i64 - 1);
        let mut metric = SegmentationMetric::new(4);
        metric.update(one_hot(&pred, 4).view(), target.view()).unwrap();
        let v = metric.get();
        assert!((0.0..=1.0).contains(&v.pix_acc));
        assert!((0.0..=1.0).contains(&v.miou));
        assert!(v.iou.iter().all(|i| (0.0..=1.0).contains(i)));
    }

    #[test]
    fn test_shape_mismatch() {
        let mut metric = SegmentationMetric::new(3);
        let scores = Array4::<f32>::zeros((1, 2, 2, 2));
        let target = Array3::<i64>::zeros((1, 2, 2));
        assert!(metric.update(scores.view(), target.view()).is_err());

        let scores = Array4::<f32>::zeros((1, 3, 2, 2));
        let target = Array3::<i64>::zeros((1, 3, 2));
        assert!(metric.update(scores.view(), target.view()).is_err());
    }
}
