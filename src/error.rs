//! Error types shared by the preprocessing, model and detection layers.

use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

use crate::tensor::TensorShape;

/// Cloneable so a background failure can be kept on the session and still
/// be handed back with its original variant.
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// The model artifact is missing, unreadable or structurally invalid.
    #[error("failed to load model from {path}: {reason}")]
    ModelLoad { path: PathBuf, reason: String },

    /// Inference was requested while no model is loaded.
    #[error("model unavailable: {reason}")]
    ModelUnavailable { reason: String },

    /// The source image is absent, zero-area or cannot be decoded.
    #[error("invalid image: {0}")]
    InvalidImage(String),

    /// The input tensor does not match the model's declared input shape.
    #[error("tensor shape mismatch: model expects {expected}, got {actual}")]
    ShapeMismatch { expected: TensorShape, actual: TensorShape },

    /// The forward pass failed or produced an unusable result.
    #[error("inference failed: {0}")]
    Inference(String),

    /// The score left [0, 1] and the score policy rejects that.
    #[error("score {0} is outside [0, 1]")]
    ScoreOutOfRange(f32),

    /// A detection is already running for this session.
    #[error("a detection is already in progress")]
    Busy,

    /// The pending detection was cancelled before it delivered a result.
    #[error("detection cancelled")]
    Cancelled,

    /// A result was requested but no detection was ever started.
    #[error("no detection has been started")]
    NotStarted,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[source] Arc<std::io::Error>),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(Arc::new(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::InvalidImage(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
