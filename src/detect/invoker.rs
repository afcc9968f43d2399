use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};
use crate::model::ModelState;
use crate::tensor::InputTensor;

/// What to do with a finite score outside [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScorePolicy {
    /// Report the score unchanged and log a warning.
    #[default]
    Passthrough,
    /// Fail with `ScoreOutOfRange`.
    Reject,
}

impl FromStr for ScorePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "passthrough" => Ok(ScorePolicy::Passthrough),
            "reject" => Ok(ScorePolicy::Reject),
            other => Err(format!("unknown score policy '{}' (expected passthrough or reject)", other)),
        }
    }
}

impl fmt::Display for ScorePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ScorePolicy::Passthrough => "passthrough",
            ScorePolicy::Reject => "reject",
        })
    }
}

/// Runs exactly one forward pass and extracts the scalar confidence.
#[derive(Debug, Clone, Copy, Default)]
pub struct Invoker {
    policy: ScorePolicy,
}

impl Invoker {
    pub fn new(policy: ScorePolicy) -> Invoker {
        Invoker { policy }
    }

    pub fn policy(&self) -> ScorePolicy {
        self.policy
    }

    pub fn invoke(&self, state: &ModelState, tensor: &InputTensor) -> Result<f32> {
        let model = state.model()?;

        let expected = model.input_shape();
        if tensor.shape() != expected {
            return Err(Error::ShapeMismatch { expected, actual: tensor.shape() });
        }

        let output = model.forward(tensor.as_slice())?;
        let score = match output.as_slice() {
            [score] => *score,
            other => {
                return Err(Error::Inference(format!(
                    "model produced {} outputs, expected a single score",
                    other.len()
                )))
            }
        };

        if !score.is_finite() {
            return Err(Error::Inference(format!("model produced a non-finite score ({})", score)));
        }
        if !(0.0..=1.0).contains(&score) {
            match self.policy {
                ScorePolicy::Passthrough => warn!(score, "score outside [0, 1]"),
                ScorePolicy::Reject => return Err(Error::ScoreOutOfRange(score)),
            }
        }
        Ok(score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{InferenceModel, ModelArtifact};
    use crate::tensor::TensorShape;

    struct Fixed(Vec<f32>);

    impl InferenceModel for Fixed {
        fn input_shape(&self) -> TensorShape {
            TensorShape::new(1, 1, 3)
        }

        fn forward(&self, _input: &[f32]) -> Result<Vec<f32>> {
            Ok(self.0.clone())
        }
    }

    fn tensor(shape: TensorShape) -> InputTensor {
        InputTensor::from_vec(shape, vec![0.5; shape.len()]).unwrap()
    }

    #[test]
    fn returns_the_single_output() {
        let state = ModelState::loaded(Fixed(vec![0.25]));
        let score = Invoker::default().invoke(&state, &tensor(TensorShape::new(1, 1, 3))).unwrap();
        assert_eq!(score, 0.25);
    }

    #[test]
    fn unloaded_model_is_an_explicit_error() {
        let state = ModelState::Unloaded { reason: "missing artifact".into() };
        let err = Invoker::default().invoke(&state, &tensor(TensorShape::default())).unwrap_err();
        assert!(matches!(err, Error::ModelUnavailable { .. }));
    }

    #[test]
    fn shape_mismatch_is_detected_before_running() {
        let state = ModelState::loaded(ModelArtifact::constant(0.5, TensorShape::default()));
        let err = Invoker::default().invoke(&state, &tensor(TensorShape::new(2, 2, 3))).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }));
    }

    #[test]
    fn multiple_outputs_are_an_inference_error() {
        let state = ModelState::loaded(Fixed(vec![0.1, 0.9]));
        let err = Invoker::default().invoke(&state, &tensor(TensorShape::new(1, 1, 3))).unwrap_err();
        assert!(matches!(err, Error::Inference(_)));
    }

    #[test]
    fn nan_is_an_inference_error() {
        let state = ModelState::loaded(Fixed(vec![f32::NAN]));
        let err = Invoker::default().invoke(&state, &tensor(TensorShape::new(1, 1, 3))).unwrap_err();
        assert!(matches!(err, Error::Inference(_)));
    }

    #[test]
    fn out_of_range_follows_policy() {
        let state = ModelState::loaded(Fixed(vec![1.7]));
        let input = tensor(TensorShape::new(1, 1, 3));
        assert_eq!(Invoker::new(ScorePolicy::Passthrough).invoke(&state, &input).unwrap(), 1.7);
        assert!(matches!(
            Invoker::new(ScorePolicy::Reject).invoke(&state, &input),
            Err(Error::ScoreOutOfRange(_))
        ));
    }
}
