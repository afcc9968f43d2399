pub mod math;
pub mod activation;
pub mod layers;
pub mod model;
pub mod tensor;
pub mod detect;
pub mod session;
pub mod config;
pub mod error;
pub mod logging;

// Convenience re-exports
pub use math::matrix::Matrix;
pub use activation::activation::ActivationFunction;
pub use layers::dense::DenseLayer;
pub use model::{InferenceModel, ModelArtifact, ModelBody, ModelMetadata, ModelState};
pub use tensor::{InputTensor, PreprocessConfig, Preprocessor, ResampleFilter, ResizeStrategy, TensorShape};
pub use detect::{Detection, DetectionTask, Detector, Invoker, ScorePolicy};
pub use session::{CheckSession, DetectionStatus, ImageSource};
pub use config::Config;
pub use error::{Error, Result};
