//! On-disk model artifacts.
//!
//! An artifact is a single JSON file holding the declared input shape, the
//! parameters and optional metadata. It is read into memory in one go and
//! validated before it can be used for inference.

use std::path::Path;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::activation::activation::ActivationFunction;
use crate::error::{Error, Result};
use crate::layers::dense::DenseLayer;
use crate::model::metadata::ModelMetadata;
use crate::model::InferenceModel;
use crate::tensor::TensorShape;

/// Artifact format understood by this build.
pub const FORMAT_VERSION: u32 = 1;

/// Parameters of a model, tagged by runtime kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelBody {
    /// Feed-forward stack of dense layers; the last layer must have one neuron.
    Dense { layers: Vec<DenseLayer> },
    /// Returns `value` for every input. Used to calibrate the surrounding
    /// pipeline and as a stand-in while no trained weights are available.
    Constant { value: f32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format_version: u32,
    /// Shape of the single input tensor the model accepts.
    pub input: TensorShape,
    #[serde(default)]
    pub metadata: Option<ModelMetadata>,
    #[serde(flatten)]
    pub body: ModelBody,
}

impl ModelArtifact {
    pub fn constant(value: f32, input: TensorShape) -> ModelArtifact {
        ModelArtifact {
            format_version: FORMAT_VERSION,
            input,
            metadata: None,
            body: ModelBody::Constant { value },
        }
    }

    pub fn dense(input: TensorShape, layers: Vec<DenseLayer>) -> ModelArtifact {
        ModelArtifact {
            format_version: FORMAT_VERSION,
            input,
            metadata: None,
            body: ModelBody::Dense { layers },
        }
    }

    /// A randomly initialized `input → hidden (ReLU) → 1 (Sigmoid)` network.
    ///
    /// Its scores are meaningless; it exists to exercise the pipeline end to
    /// end before real weights are exported.
    pub fn untrained<R: Rng + ?Sized>(input: TensorShape, hidden: usize, rng: &mut R) -> ModelArtifact {
        let layers = vec![
            DenseLayer::new(hidden, input.len(), ActivationFunction::ReLU, rng),
            DenseLayer::new(1, hidden, ActivationFunction::Sigmoid, rng),
        ];
        let mut artifact = ModelArtifact::dense(input, layers);
        artifact.metadata = Some(ModelMetadata {
            description: Some("untrained dense network (random weights)".into()),
            output_label: Some("disease".into()),
            source: None,
        });
        artifact
    }

    pub fn with_metadata(mut self, metadata: ModelMetadata) -> ModelArtifact {
        self.metadata = Some(metadata);
        self
    }

    /// Reads the whole artifact file into memory, then parses and validates it.
    pub fn load(path: &Path) -> Result<ModelArtifact> {
        let bytes = std::fs::read(path).map_err(|e| Error::ModelLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        ModelArtifact::from_bytes(&bytes).map_err(|reason| Error::ModelLoad {
            path: path.to_path_buf(),
            reason,
        })
    }

    /// Parses and validates an artifact already held in memory.
    pub fn from_bytes(bytes: &[u8]) -> std::result::Result<ModelArtifact, String> {
        let artifact: ModelArtifact = serde_json::from_slice(bytes).map_err(|e| e.to_string())?;
        artifact.validate()?;
        Ok(artifact)
    }

    /// Serializes the artifact to a pretty-printed JSON file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)
            .map_err(|e| Error::from(std::io::Error::new(std::io::ErrorKind::Other, e)))
    }

    /// Structural checks: version, input shape, layer chaining, scalar output.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.format_version != FORMAT_VERSION {
            return Err(format!(
                "unsupported format version {} (expected {})",
                self.format_version, FORMAT_VERSION
            ));
        }
        if self.input.is_empty() {
            return Err(format!("declared input shape {} is empty", self.input));
        }
        let input_len = self
            .input
            .checked_len()
            .ok_or_else(|| format!("declared input shape {} is too large", self.input))?;

        let layers = match &self.body {
            ModelBody::Constant { .. } => return Ok(()),
            ModelBody::Dense { layers } => layers,
        };
        if layers.is_empty() {
            return Err("dense model has no layers".into());
        }

        let mut expected_inputs = input_len;
        for (i, layer) in layers.iter().enumerate() {
            layer.validate().map_err(|e| format!("layer {}: {}", i, e))?;
            if layer.input_size != expected_inputs {
                return Err(format!(
                    "layer {} takes {} inputs but receives {}",
                    i, layer.input_size, expected_inputs
                ));
            }
            expected_inputs = layer.size;
        }
        if expected_inputs != 1 {
            return Err(format!(
                "last layer has {} neurons; a single confidence output is required",
                expected_inputs
            ));
        }
        Ok(())
    }

    /// One-line human readable summary of the parameters.
    pub fn summary(&self) -> String {
        match &self.body {
            ModelBody::Constant { value } => format!("constant model ({}) on {}", value, self.input),
            ModelBody::Dense { layers } => {
                let sizes: Vec<String> = layers.iter().map(|l| l.size.to_string()).collect();
                format!("dense model {} -> [{}]", self.input, sizes.join(", "))
            }
        }
    }
}

impl InferenceModel for ModelArtifact {
    fn input_shape(&self) -> TensorShape {
        self.input
    }

    fn forward(&self, input: &[f32]) -> Result<Vec<f32>> {
        match &self.body {
            ModelBody::Constant { value } => Ok(vec![*value]),
            ModelBody::Dense { layers } => {
                let mut current = input.to_vec();
                for layer in layers {
                    current = layer.forward(&current).map_err(Error::Inference)?;
                }
                Ok(current)
            }
        }
    }

    fn describe(&self) -> String {
        match self.metadata.as_ref().and_then(|m| m.description.as_deref()) {
            Some(description) => format!("{} ({})", description, self.summary()),
            None => self.summary(),
        }
    }
}
