use serde::{Serialize, Deserialize};
use std::f32::consts::{E, PI};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ActivationFunction {
    Sigmoid,
    ReLU,
    Identity,
    /// Vector-valued; applied over the whole layer output.
    Softmax,
    Tanh,
    LeakyReLU { alpha: f32 },
    Elu { alpha: f32 },
    Gelu,
    Swish,
}

impl ActivationFunction {
    /// Applies the activation to a full pre-activation vector.
    pub fn apply(&self, z: Vec<f32>) -> Vec<f32> {
        match self {
            ActivationFunction::Softmax => softmax(z),
            _ => z.into_iter().map(|x| self.function(x)).collect(),
        }
    }

    /// Element-wise activation. `Softmax` is only meaningful through `apply`;
    /// here it is the identity.
    fn function(&self, x: f32) -> f32 {
        match self {
            ActivationFunction::Sigmoid => 1.0 / (1.0 + E.powf(-x)),
            ActivationFunction::ReLU => if x > 0.0 { x } else { 0.0 },
            ActivationFunction::Identity | ActivationFunction::Softmax => x,
            ActivationFunction::Tanh => x.tanh(),
            ActivationFunction::LeakyReLU { alpha } => if x > 0.0 { x } else { alpha * x },
            ActivationFunction::Elu { alpha } => {
                if x > 0.0 { x } else { alpha * (E.powf(x) - 1.0) }
            }
            ActivationFunction::Gelu => {
                let c = (2.0_f32 / PI).sqrt();
                0.5 * x * (1.0 + (c * (x + 0.044715 * x.powi(3))).tanh())
            }
            ActivationFunction::Swish => x / (1.0 + E.powf(-x)),
        }
    }

    /// Whether He initialization suits this activation (Xavier otherwise).
    pub fn prefers_he_init(&self) -> bool {
        matches!(
            self,
            ActivationFunction::ReLU
                | ActivationFunction::LeakyReLU { .. }
                | ActivationFunction::Elu { .. }
                | ActivationFunction::Gelu
                | ActivationFunction::Swish
        )
    }
}

/// Numerically stable softmax (max-shifted).
fn softmax(z: Vec<f32>) -> Vec<f32> {
    let max = z.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = z.iter().map(|&x| (x - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}
