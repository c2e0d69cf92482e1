//! The validation loop.

use std::time::Instant;

use ndarray::{Array4, Axis};
use tracing::{debug, info, warn};

use crate::config::EvalArgs;
use crate::dataset::{
    DataLoader, DatasetMode, DatasetOptions, Sample, SegmentationDataset,
    get_segmentation_dataset, make_data_sampler,
};
use crate::error::{Error, Result};
use crate::eval::report::EvalReport;
use crate::metric::SegmentationMetric;
use crate::model::{ModelConfig, ModelZoo, NormLayer, SegmentationModel};
use crate::ops::{batch_of_one, flip_width, interpolate_bilinear, softmax_channels};
use crate::transform::InputTransform;

/// Runs a model over a validation dataset and scores it.
///
/// # Example
///
/// ```rust,ignore
/// use seg_eval::{EvalArgs, Evaluator};
///
/// let args = EvalArgs::builder()
///     .dataset("citys")
///     .model("linear")
///     .data_root("./datasets/citys")
///     .flip(true)
///     .build()?;
///
/// let mut evaluator = Evaluator::new(args)?;
/// let report = evaluator.eval()?;
/// println!("mIoU: {:.4}", report.miou);
/// ```
pub struct Evaluator {
    args: EvalArgs,
    loader: DataLoader,
    model: Box<dyn SegmentationModel>,
    metric: SegmentationMetric,
    class_names: Vec<String>,
}

impl Evaluator {
    /// Build the dataset, loader and model described by `args`, using the
    /// default model zoo.
    pub fn new(args: EvalArgs) -> Result<Self> {
        Self::with_zoo(args, &ModelZoo::with_defaults())
    }

    /// Like [`Evaluator::new`] with a caller-provided model zoo.
    pub fn with_zoo(args: EvalArgs, zoo: &ModelZoo) -> Result<Self> {
        let options = DatasetOptions {
            split: args.split,
            mode: DatasetMode::MsVal,
            transform: InputTransform::imagenet(),
            scales: args.scales.clone(),
            base_size: args.base_size,
            num_class: args.num_class,
        };
        let dataset = get_segmentation_dataset(&args.dataset, &args.data_root, options)?;

        let model_config = ModelConfig {
            model: args.model.clone(),
            dataset: args.dataset.clone(),
            backbone: args.backbone.clone(),
            root: args.model_root.clone(),
            aux: args.aux,
            pretrained: true,
            pretrained_base: false,
            norm_layer: NormLayer::BatchNorm2d,
            num_class: dataset.num_class(),
        };
        let model = zoo.build(&model_config)?;

        Self::from_parts(args, dataset, model)
    }

    /// Assemble an evaluator from an already-built dataset and model.
    pub fn from_parts(
        args: EvalArgs,
        dataset: Box<dyn SegmentationDataset>,
        model: Box<dyn SegmentationModel>,
    ) -> Result<Self> {
        let num_class = dataset.num_class();
        if model.num_class() != num_class {
            return Err(Error::Model {
                model: model.name().to_string(),
                message: format!(
                    "model predicts {} classes, dataset {} has {num_class}",
                    model.num_class(),
                    dataset.name()
                ),
            });
        }

        let class_names = dataset.class_names();
        let sampler = make_data_sampler(args.shuffle, args.seed);
        Ok(Self {
            args,
            loader: DataLoader::new(dataset, sampler),
            model,
            metric: SegmentationMetric::new(num_class),
            class_names,
        })
    }

    /// Number of classes scored.
    #[must_use]
    pub fn num_class(&self) -> usize {
        self.metric.num_class()
    }

    /// Number of samples one pass visits.
    #[must_use]
    pub fn len(&self) -> usize {
        self.loader.len()
    }

    /// Whether the dataset is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.loader.is_empty()
    }

    /// Run one pass over the dataset and log the results.
    pub fn eval(&mut self) -> Result<EvalReport> {
        self.metric.reset();
        info!("Start validation, Total sample: {}", self.loader.len());

        let started = Instant::now();
        let mut sample_count = 0usize;
        let mut forward_passes = 0usize;

        for (i, sample) in self.loader.iter().enumerate() {
            let sample = sample?;
            debug!(index = i, filename = %sample.info.filename, scales = sample.img_data.len(), "evaluating");

            let (scores, passes) = self.predict(&sample)?;
            let target = sample.seg_label.view().insert_axis(Axis(0));
            self.metric.update(scores.view(), target)?;

            forward_passes += passes;
            sample_count += 1;
        }

        if sample_count == 0 {
            warn!("no samples were evaluated");
        }

        let values = self.metric.get();
        info!(
            "Sample: {}, Validation pixAcc: {:.3}, mIoU: {:.6}",
            sample_count, values.pix_acc, values.miou
        );
        for (k, iou) in values.iter_iou() {
            info!("{}: {}", k, iou);
        }

        Ok(EvalReport {
            name: self.args.run_name(),
            dataset: self.args.dataset.clone(),
            model: self.args.model.clone(),
            backbone: self.args.backbone.clone(),
            split: self.args.split,
            flip: self.args.flip,
            scales: self.args.scales.clone(),
            sample_count,
            forward_passes,
            pix_acc: values.pix_acc,
            miou: values.miou,
            classes: EvalReport::class_results(&values, &self.class_names),
            elapsed: started.elapsed(),
            timestamp: chrono::Utc::now(),
        })
    }

    /// Accumulated class probabilities at label resolution, plus the number
    /// of forward passes it took.
    fn predict(&self, sample: &Sample) -> Result<(Array4<f32>, usize)> {
        let size = sample.seg_label.dim();
        let mut scores = Array4::<f32>::zeros((1, self.num_class(), size.0, size.1));
        let mut passes = 0;

        for image in &sample.img_data {
            let input = batch_of_one(image.view());
            self.accumulate(&input, size, false, &mut scores)?;
            passes += 1;

            if self.args.flip {
                let mirrored = flip_width(input.view());
                self.accumulate(&mirrored, size, true, &mut scores)?;
                passes += 1;
            }
        }

        Ok((scores, passes))
    }

    /// Forward `input`, resize to `size`, and add the softmax to `scores`.
    ///
    /// When `mirrored`, the logits are flipped back before resizing.
    fn accumulate(
        &self,
        input: &Array4<f32>,
        size: (usize, usize),
        mirrored: bool,
        scores: &mut Array4<f32>,
    ) -> Result<()> {
        let logits = self.model.forward(input)?.out;
        let (n, c, h, w) = logits.dim();
        if n != 1 || c != self.num_class() {
            return Err(Error::ShapeMismatch {
                context: "model output",
                expected: vec![1, self.num_class(), h, w],
                actual: vec![n, c, h, w],
            });
        }

        let logits = if mirrored { flip_width(logits.view()) } else { logits };
        let logits = interpolate_bilinear(logits.view(), size);
        *scores += &softmax_channels(logits.view());
        Ok(())
    }
}
