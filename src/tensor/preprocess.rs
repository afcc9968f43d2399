//! Image to input-tensor preprocessing.
//!
//! Decodes (if needed) and resizes an image to the model's input size, then
//! flattens it channel-last as R, G, B, R, G, B, ... normalized to [0, 1].

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, Rgb, RgbImage};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::tensor::{InputTensor, TensorShape, INPUT_CHANNELS};

/// How a non-square or differently sized image is brought to the target size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResizeStrategy {
    /// Scale each axis independently; aspect ratio is not preserved.
    #[default]
    Stretch,
    /// Scale to cover the target, then crop the center.
    CenterCrop,
    /// Scale to fit inside the target, then center on a black canvas.
    Pad,
}

impl FromStr for ResizeStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "stretch" => Ok(ResizeStrategy::Stretch),
            "center-crop" => Ok(ResizeStrategy::CenterCrop),
            "pad" => Ok(ResizeStrategy::Pad),
            other => Err(format!(
                "unknown resize strategy '{}' (expected stretch, center-crop or pad)",
                other
            )),
        }
    }
}

impl fmt::Display for ResizeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResizeStrategy::Stretch => "stretch",
            ResizeStrategy::CenterCrop => "center-crop",
            ResizeStrategy::Pad => "pad",
        };
        f.write_str(name)
    }
}

/// Smoothing resampling filters. Nearest-neighbour is deliberately absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResampleFilter {
    /// Bilinear.
    #[default]
    Triangle,
    CatmullRom,
    Gaussian,
    Lanczos3,
}

impl ResampleFilter {
    fn filter_type(self) -> FilterType {
        match self {
            ResampleFilter::Triangle => FilterType::Triangle,
            ResampleFilter::CatmullRom => FilterType::CatmullRom,
            ResampleFilter::Gaussian => FilterType::Gaussian,
            ResampleFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

impl FromStr for ResampleFilter {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "triangle" | "bilinear" => Ok(ResampleFilter::Triangle),
            "catmull-rom" => Ok(ResampleFilter::CatmullRom),
            "gaussian" => Ok(ResampleFilter::Gaussian),
            "lanczos3" => Ok(ResampleFilter::Lanczos3),
            other => Err(format!(
                "unknown filter '{}' (expected triangle, catmull-rom, gaussian or lanczos3)",
                other
            )),
        }
    }
}

/// Preprocessing settings. Defaults reproduce a bilinear stretch to 224x224x3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    pub target: TensorShape,
    pub resize: ResizeStrategy,
    pub filter: ResampleFilter,
}

/// Turns images into model input tensors.
#[derive(Debug, Clone, Default)]
pub struct Preprocessor {
    config: PreprocessConfig,
}

impl Preprocessor {
    /// Only 3-channel targets with non-zero sides are accepted.
    pub fn new(config: PreprocessConfig) -> Result<Preprocessor> {
        let target = config.target;
        if target.channels != INPUT_CHANNELS {
            return Err(Error::Config(format!(
                "preprocessing produces RGB tensors; target {} has {} channels",
                target, target.channels
            )));
        }
        if target.height == 0 || target.width == 0 {
            return Err(Error::Config(format!("target shape {} has zero area", target)));
        }
        if target.checked_len().is_none() {
            return Err(Error::Config(format!("target shape {} is too large", target)));
        }
        Ok(Preprocessor { config })
    }

    pub fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    /// Resizes and normalizes a decoded image. The image itself is left as is.
    pub fn preprocess(&self, image: &DynamicImage) -> Result<InputTensor> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(Error::InvalidImage(format!(
                "image has zero area ({}x{})",
                width, height
            )));
        }

        let resized = self.resize(image);
        let target = self.config.target;

        let mut data = Vec::with_capacity(target.len());
        for y in 0..target.height {
            for x in 0..target.width {
                let pixel = resized.get_pixel(x, y);
                data.push(f32::from(pixel[0]) / 255.0);
                data.push(f32::from(pixel[1]) / 255.0);
                data.push(f32::from(pixel[2]) / 255.0);
            }
        }

        InputTensor::from_vec(target, data)
    }

    /// Decodes encoded image bytes (PNG/JPEG/BMP/GIF) and preprocesses them.
    pub fn preprocess_bytes(&self, bytes: &[u8]) -> Result<InputTensor> {
        let image = decode_image(bytes)?;
        self.preprocess(&image)
    }

    pub fn preprocess_path(&self, path: &Path) -> Result<InputTensor> {
        let image = image::open(path).map_err(|e| {
            Error::InvalidImage(format!("cannot read {}: {}", path.display(), e))
        })?;
        self.preprocess(&image)
    }

    fn resize(&self, image: &DynamicImage) -> RgbImage {
        // Alpha is dropped here, before any resampling.
        let rgb = image.to_rgb8();
        let (width, height) = (self.config.target.width, self.config.target.height);
        let filter = self.config.filter.filter_type();

        match self.config.resize {
            ResizeStrategy::Stretch => imageops::resize(&rgb, width, height, filter),
            ResizeStrategy::CenterCrop => {
                DynamicImage::ImageRgb8(rgb)
                    .resize_to_fill(width, height, filter)
                    .to_rgb8()
            }
            ResizeStrategy::Pad => pad_to_fit(&rgb, width, height, filter),
        }
    }
}

/// Decodes encoded image bytes into a raster.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
    if bytes.is_empty() {
        return Err(Error::InvalidImage("no image data".into()));
    }
    Ok(image::load_from_memory(bytes)?)
}

fn pad_to_fit(image: &RgbImage, width: u32, height: u32, filter: FilterType) -> RgbImage {
    let (src_w, src_h) = image.dimensions();
    let scale = (width as f64 / src_w as f64).min(height as f64 / src_h as f64);
    let fit_w = ((src_w as f64 * scale).round() as u32).clamp(1, width);
    let fit_h = ((src_h as f64 * scale).round() as u32).clamp(1, height);

    let fitted = imageops::resize(image, fit_w, fit_h, filter);
    let mut canvas = RgbImage::from_pixel(width, height, Rgb([0, 0, 0]));
    let x = ((width - fit_w) / 2) as i64;
    let y = ((height - fit_h) / 2) as i64;
    imageops::overlay(&mut canvas, &fitted, x, y);
    canvas
}
