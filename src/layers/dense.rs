use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::{math::matrix::Matrix, activation::activation::ActivationFunction};

/// Fully connected layer: `a = f(x · W + b)`.
///
/// `weights` is `input_size × size`, `biases` has `size` entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseLayer {
    pub size: usize,
    pub input_size: usize,
    pub weights: Matrix,
    pub biases: Vec<f32>,
    pub activator: ActivationFunction,
}

impl DenseLayer {
    /// A freshly initialized layer (He or Xavier by activation, zero biases).
    pub fn new<R: Rng + ?Sized>(
        size: usize,
        input_size: usize,
        activation: ActivationFunction,
        rng: &mut R,
    ) -> DenseLayer {
        let weights = if activation.prefers_he_init() {
            Matrix::he(input_size, size, rng)
        } else {
            Matrix::xavier(input_size, size, rng)
        };
        DenseLayer {
            size,
            input_size,
            weights,
            biases: vec![0.0; size],
            activator: activation,
        }
    }

    /// Checks that the stored parameters agree with the declared sizes.
    pub fn validate(&self) -> Result<(), String> {
        if self.weights.rows != self.input_size || self.weights.cols != self.size {
            return Err(format!(
                "weights are {}x{}, expected {}x{}",
                self.weights.rows, self.weights.cols, self.input_size, self.size
            ));
        }
        let expected = self.weights.rows.checked_mul(self.weights.cols).ok_or_else(|| {
            format!("weights of {}x{} are too large", self.weights.rows, self.weights.cols)
        })?;
        if self.weights.data.len() != expected {
            return Err(format!(
                "weights hold {} values, expected {}",
                self.weights.data.len(),
                expected
            ));
        }
        if self.biases.len() != self.size {
            return Err(format!("{} biases for {} neurons", self.biases.len(), self.size));
        }
        Ok(())
    }

    /// Forward pass. Does not mutate the layer, so a loaded model can be
    /// shared across threads.
    pub fn forward(&self, input: &[f32]) -> Result<Vec<f32>, String> {
        let mut z = self.weights.left_mul(input).ok_or_else(|| {
            format!("layer expects {} inputs, got {}", self.input_size, input.len())
        })?;
        for (v, b) in z.iter_mut().zip(&self.biases) {
            *v += b;
        }
        Ok(self.activator.apply(z))
    }
}
