use std::fmt;
use std::path::Path;
use std::sync::Arc;

use tracing::{error, info};

use crate::error::{Error, Result};
use crate::model::artifact::ModelArtifact;
use crate::model::InferenceModel;

/// Whether a session currently holds a usable model.
#[derive(Clone)]
pub enum ModelState {
    /// No model: loading failed, nothing was loaded yet, or it was released.
    Unloaded { reason: String },
    Loaded(Arc<dyn InferenceModel>),
}

impl ModelState {
    /// Loads the artifact at `path`. A failure is logged and yields
    /// `Unloaded`; it never aborts the caller.
    pub fn load(path: &Path) -> ModelState {
        match ModelArtifact::load(path) {
            Ok(artifact) => {
                info!(path = %path.display(), model = %artifact.describe(), "model loaded");
                ModelState::Loaded(Arc::new(artifact))
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "error loading model");
                ModelState::Unloaded { reason: e.to_string() }
            }
        }
    }

    pub fn loaded<M: InferenceModel + 'static>(model: M) -> ModelState {
        ModelState::Loaded(Arc::new(model))
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, ModelState::Loaded(_))
    }

    /// The loaded model, or `ModelUnavailable` with the reason it is missing.
    pub fn model(&self) -> Result<&Arc<dyn InferenceModel>> {
        match self {
            ModelState::Loaded(model) => Ok(model),
            ModelState::Unloaded { reason } => Err(Error::ModelUnavailable { reason: reason.clone() }),
        }
    }

    /// Drops this handle to the model.
    pub fn release(&mut self, reason: &str) {
        *self = ModelState::Unloaded { reason: reason.to_owned() };
    }
}

impl fmt::Debug for ModelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelState::Unloaded { reason } => f.debug_struct("Unloaded").field("reason", reason).finish(),
            ModelState::Loaded(model) => f.debug_tuple("Loaded").field(&model.describe()).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::TensorShape;
    use tempfile::TempDir;

    #[test]
    fn missing_artifact_leaves_state_unloaded() {
        let dir = TempDir::new().unwrap();
        let state = ModelState::load(&dir.path().join("plant_disease_model.json"));
        assert!(!state.is_loaded());
        assert!(matches!(state.model(), Err(Error::ModelUnavailable { .. })));
    }

    #[test]
    fn corrupt_artifact_leaves_state_unloaded() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, b"\x00\x01not json").unwrap();
        assert!(!ModelState::load(&path).is_loaded());
    }

    #[test]
    fn oversized_declared_shape_leaves_state_unloaded() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(
            &path,
            br#"{"format_version":1,"input":{"height":4000000000,"width":4000000000,"channels":4000000000},"kind":"constant","value":0.5}"#,
        )
        .unwrap();
        assert!(!ModelState::load(&path).is_loaded());
    }

    #[test]
    fn valid_artifact_loads() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.json");
        ModelArtifact::constant(0.3, TensorShape::default()).save_json(&path).unwrap();
        let state = ModelState::load(&path);
        assert!(state.is_loaded());
        assert_eq!(state.model().unwrap().input_shape(), TensorShape::default());
    }

    #[test]
    fn release_unloads() {
        let mut state = ModelState::loaded(ModelArtifact::constant(0.3, TensorShape::default()));
        state.release("session closed");
        match state.model() {
            Err(Error::ModelUnavailable { reason }) => assert_eq!(reason, "session closed"),
            other => panic!("unexpected {:?}", other.map(|m| m.describe())),
        }
    }
}
