use rand::Rng;
use serde::{Serialize, Deserialize};
use std::f32::consts::PI;

/// Dense row-major `f32` matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<f32>,
}

impl Matrix {
    /// Wraps `data`; returns `None` unless it holds exactly `rows * cols` values.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f32>) -> Option<Matrix> {
        if rows.checked_mul(cols) != Some(data.len()) {
            return None;
        }
        Some(Matrix { rows, cols, data })
    }

    /// Samples a single value from N(0, 1) using the Box-Muller transform.
    fn sample_standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f32 {
        // Both samples in (0, 1] to avoid log(0).
        let u1: f32 = 1.0 - rng.gen::<f32>();
        let u2: f32 = 1.0 - rng.gen::<f32>();
        (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
    }

    fn normal<R: Rng + ?Sized>(rows: usize, cols: usize, std_dev: f32, rng: &mut R) -> Matrix {
        let data = (0..rows * cols)
            .map(|_| Matrix::sample_standard_normal(rng) * std_dev)
            .collect();
        Matrix { rows, cols, data }
    }

    /// He initialization: N(0, sqrt(2 / rows)). `rows` is the fan-in.
    ///
    /// Use before ReLU-family layers.
    pub fn he<R: Rng + ?Sized>(rows: usize, cols: usize, rng: &mut R) -> Matrix {
        Matrix::normal(rows, cols, (2.0 / rows as f32).sqrt(), rng)
    }

    /// Xavier (Glorot) initialization: N(0, sqrt(1 / rows)). `rows` is the fan-in.
    ///
    /// Use before Sigmoid/Tanh/Identity layers.
    pub fn xavier<R: Rng + ?Sized>(rows: usize, cols: usize, rng: &mut R) -> Matrix {
        Matrix::normal(rows, cols, (1.0 / rows as f32).sqrt(), rng)
    }

    /// Row vector times matrix: `input (1 × rows) · self (rows × cols)`.
    ///
    /// Returns `None` when `input.len() != self.rows`.
    pub fn left_mul(&self, input: &[f32]) -> Option<Vec<f32>> {
        if input.len() != self.rows {
            return None;
        }
        let mut out = vec![0.0f32; self.cols];
        for (k, &x) in input.iter().enumerate() {
            if x == 0.0 {
                continue;
            }
            let row = &self.data[k * self.cols..(k + 1) * self.cols];
            for (acc, &w) in out.iter_mut().zip(row) {
                *acc += x * w;
            }
        }
        Some(out)
    }
}
