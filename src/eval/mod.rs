//! Evaluation loop and report generation.
//!
//! - [`evaluator::Evaluator`]: runs a model over a validation split
//! - [`report`]: report types for evaluation results

pub mod evaluator;
pub mod report;

pub use evaluator::Evaluator;
pub use report::{ClassResult, EvalReport};
