//! # seg-eval
//!
//! Semantic segmentation evaluation library.
//!
//! Models plug in through the [`SegmentationModel`] trait; this library
//! handles dataset loading, multi-scale and flip test-time augmentation,
//! pixel accuracy / mIoU accumulation and report generation.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use seg_eval::{EvalArgs, Evaluator, logging};
//!
//! let args = EvalArgs::builder()
//!     .dataset("citys")
//!     .model("linear")
//!     .backbone("resnet50")
//!     .scales(vec![0.75, 1.0, 1.25])
//!     .flip(true)
//!     .build()?;
//!
//! logging::setup_logger(&args.log_dir, 0, &args.log_filename(), true)?;
//!
//! let mut evaluator = Evaluator::new(args)?;
//! let report = evaluator.eval()?;
//! ```
//!
//! ## Modules
//!
//! - [`error`]: Error types for the library
//! - [`config`]: Evaluation configuration and process environment
//! - [`logging`]: Console and file logging
//! - [`dataset`]: Segmentation datasets and the data loader
//! - [`model`]: Model trait, model zoo and the built-in linear head
//! - [`transform`]: Input normalization
//! - [`ops`]: Tensor operations (resize, softmax, flip, argmax)
//! - [`metric`]: Pixel accuracy and IoU
//! - [`eval`]: The evaluator and its report

pub mod config;
pub mod dataset;
pub mod error;
pub mod eval;
pub mod logging;
pub mod metric;
pub mod model;
pub mod ops;
pub mod transform;

// Re-export commonly used types
pub use config::{EvalArgs, EvalArgsBuilder};
pub use dataset::{
    DataLoader, DatasetMode, DatasetOptions, DatasetSplit, IGNORE_LABEL, Sample, SampleInfo,
    SegmentationDataset, get_segmentation_dataset,
};
pub use error::{Error, Result};
pub use eval::{ClassResult, EvalReport, Evaluator};
pub use metric::{MetricValues, SegmentationMetric};
pub use model::{
    LinearHead, LinearWeights, ModelConfig, ModelOutput, ModelZoo, NormLayer, SegmentationModel,
    get_segmentation_model,
};
pub use transform::InputTransform;
