//! Error types for seg-eval operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for seg-eval operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during segmentation evaluation.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Failed to load an image or label file.
    #[error("Image load failed: {path}: {reason}")]
    ImageLoad {
        /// Path to the image that failed to load.
        path: PathBuf,
        /// Reason for the failure.
        reason: String,
    },

    /// Dataset layout or content problem.
    #[error("Dataset error ({dataset}): {message}")]
    Dataset {
        /// Dataset identifier.
        dataset: String,
        /// Error message.
        message: String,
    },

    /// No dataset is registered under the requested name.
    #[error("Unknown dataset: {0}")]
    UnknownDataset(String),

    /// No model is registered under the requested name.
    #[error("Unknown model: {0}")]
    UnknownModel(String),

    /// Model weights could not be loaded or are inconsistent.
    #[error("Model weights error: {path}: {reason}")]
    ModelWeights {
        /// Path of the weights file.
        path: PathBuf,
        /// Reason for the failure.
        reason: String,
    },

    /// Error raised by a model during its forward pass.
    #[error("Model error ({model}): {message}")]
    Model {
        /// Model identifier.
        model: String,
        /// Error message from the model.
        message: String,
    },

    /// Tensor shapes don't line up.
    #[error("Shape mismatch in {context}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        /// Operation that detected the mismatch.
        context: &'static str,
        /// Expected shape.
        expected: Vec<usize>,
        /// Actual shape.
        actual: Vec<usize>,
    },

    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Logger could not be installed.
    #[error("Logging setup failed: {0}")]
    Logging(String),

    /// I/O error wrapper.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl Error {
    /// Build a [`Error::Dataset`] for the named dataset.
    pub(crate) fn dataset(dataset: &str, message: impl Into<String>) -> Self {
        Self::Dataset {
            dataset: dataset.to_string(),
            message: message.into(),
        }
    }
}
