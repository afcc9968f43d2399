pub mod artifact;
pub mod metadata;
pub mod state;

pub use artifact::{ModelArtifact, ModelBody, FORMAT_VERSION};
pub use metadata::ModelMetadata;
pub use state::ModelState;

use crate::error::Result;
use crate::tensor::TensorShape;

/// A loaded model that maps one input tensor to its outputs.
///
/// Implementations are immutable once loaded and may be shared between
/// threads and reused for any number of sequential forward passes.
pub trait InferenceModel: Send + Sync {
    /// Shape of the single input tensor the model accepts.
    fn input_shape(&self) -> TensorShape;

    /// One forward pass over a flat channel-last input.
    fn forward(&self, input: &[f32]) -> Result<Vec<f32>>;

    fn describe(&self) -> String {
        format!("model on {}", self.input_shape())
    }
}
