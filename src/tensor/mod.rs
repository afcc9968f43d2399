pub mod preprocess;

pub use preprocess::{Preprocessor, PreprocessConfig, ResampleFilter, ResizeStrategy};

use std::fmt;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Side length of the square model input.
pub const INPUT_SIDE: u32 = 224;
/// Color channels in the model input (R, G, B).
pub const INPUT_CHANNELS: u32 = 3;

/// Height × width × channels of a channel-last tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensorShape {
    pub height: u32,
    pub width: u32,
    pub channels: u32,
}

impl TensorShape {
    pub const fn new(height: u32, width: u32, channels: u32) -> Self {
        TensorShape { height, width, channels }
    }

    /// Number of scalar elements, or `None` if that overflows `usize`.
    pub fn checked_len(&self) -> Option<usize> {
        (self.height as usize)
            .checked_mul(self.width as usize)?
            .checked_mul(self.channels as usize)
    }

    /// Number of scalar elements. Saturates at `usize::MAX`; shapes that
    /// large are rejected wherever they enter (`checked_len`).
    pub fn len(&self) -> usize {
        self.checked_len().unwrap_or(usize::MAX)
    }

    pub fn is_empty(&self) -> bool {
        self.height == 0 || self.width == 0 || self.channels == 0
    }
}

impl Default for TensorShape {
    fn default() -> Self {
        TensorShape::new(INPUT_SIDE, INPUT_SIDE, INPUT_CHANNELS)
    }
}

impl fmt::Display for TensorShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.height, self.width, self.channels)
    }
}

/// A channel-last (HWC) `f32` tensor, rows top to bottom, columns left to
/// right, channels interleaved per pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct InputTensor {
    shape: TensorShape,
    data: Vec<f32>,
}

impl InputTensor {
    /// Wraps `data`, which must hold exactly `shape.len()` values.
    pub fn from_vec(shape: TensorShape, data: Vec<f32>) -> Result<InputTensor> {
        if data.len() != shape.len() {
            return Err(Error::InvalidImage(format!(
                "tensor {} needs {} values, got {}",
                shape,
                shape.len(),
                data.len()
            )));
        }
        Ok(InputTensor { shape, data })
    }

    pub fn shape(&self) -> TensorShape {
        self.shape
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }

    /// The channel values of the pixel at (`row`, `col`).
    pub fn pixel(&self, row: u32, col: u32) -> Option<&[f32]> {
        if row >= self.shape.height || col >= self.shape.width {
            return None;
        }
        let c = self.shape.channels as usize;
        let start = (row as usize * self.shape.width as usize + col as usize) * c;
        self.data.get(start..start + c)
    }

    /// Raw byte view in host-native endianness, as handed to an in-process
    /// runtime. Not a portable format.
    pub fn to_ne_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.data.len() * 4);
        for v in &self.data {
            bytes.extend_from_slice(&v.to_ne_bytes());
        }
        bytes
    }
}
