use std::fmt;
use std::path::Path;
use std::time::Instant;

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Config;
use crate::detect::invoker::{Invoker, ScorePolicy};
use crate::error::Result;
use crate::model::ModelState;
use crate::tensor::{InputTensor, Preprocessor};

/// Outcome of one successful detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub score: f32,
    /// Wall-clock time for preprocessing plus inference.
    pub elapsed_ms: f64,
}

impl fmt::Display for Detection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Disease detected with confidence: {}", self.score)
    }
}

/// Preprocessor, model and invoker bundled for one screen.
///
/// Cloning is cheap: the model is shared, not copied.
#[derive(Debug, Clone)]
pub struct Detector {
    preprocessor: Preprocessor,
    model: ModelState,
    invoker: Invoker,
}

impl Detector {
    pub fn new(preprocessor: Preprocessor, model: ModelState, policy: ScorePolicy) -> Detector {
        Detector { preprocessor, model, invoker: Invoker::new(policy) }
    }

    /// Builds the preprocessor from `config` and loads its model artifact.
    ///
    /// Only an invalid preprocessing configuration is an error; a model that
    /// fails to load leaves the detector usable but unable to infer.
    pub fn from_config(config: &Config) -> Result<Detector> {
        let preprocessor = Preprocessor::new(config.preprocess)?;
        let model = ModelState::load(&config.model_path);
        Ok(Detector::new(preprocessor, model, config.score_policy))
    }

    pub fn model_state(&self) -> &ModelState {
        &self.model
    }

    pub fn preprocessor(&self) -> &Preprocessor {
        &self.preprocessor
    }

    pub fn preprocess(&self, image: &DynamicImage) -> Result<InputTensor> {
        self.preprocessor.preprocess(image)
    }

    pub fn infer(&self, tensor: &InputTensor) -> Result<f32> {
        self.invoker.invoke(&self.model, tensor)
    }

    pub fn detect(&self, image: &DynamicImage) -> Result<Detection> {
        let started = Instant::now();
        let tensor = self.preprocess(image)?;
        let score = self.infer(&tensor)?;
        Ok(finish(score, started))
    }

    pub fn detect_bytes(&self, bytes: &[u8]) -> Result<Detection> {
        let started = Instant::now();
        let tensor = self.preprocessor.preprocess_bytes(bytes)?;
        let score = self.infer(&tensor)?;
        Ok(finish(score, started))
    }

    pub fn detect_path(&self, path: &Path) -> Result<Detection> {
        let started = Instant::now();
        let tensor = self.preprocessor.preprocess_path(path)?;
        let score = self.infer(&tensor)?;
        Ok(finish(score, started))
    }

    pub fn release_model(&mut self, reason: &str) {
        self.model.release(reason);
    }
}

pub(crate) fn finish(score: f32, started: Instant) -> Detection {
    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
    debug!(score, elapsed_ms, "detection finished");
    Detection { score, elapsed_ms }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::model::ModelArtifact;
    use crate::tensor::TensorShape;
    use image::{ImageBuffer, Rgb};

    fn constant_detector(value: f32) -> Detector {
        Detector::new(
            Preprocessor::default(),
            ModelState::loaded(ModelArtifact::constant(value, TensorShape::default())),
            ScorePolicy::Passthrough,
        )
    }

    #[test]
    fn constant_model_ignores_image_content() {
        let detector = constant_detector(0.42);
        let dark = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(8, 8, Rgb([0, 0, 0])));
        let noisy = DynamicImage::ImageRgb8(ImageBuffer::from_fn(300, 90, |x, y| {
            Rgb([(x * 13 % 256) as u8, (y * 29 % 256) as u8, 77])
        }));
        assert_eq!(detector.detect(&dark).unwrap().score, 0.42);
        assert_eq!(detector.detect(&noisy).unwrap().score, 0.42);
    }

    #[test]
    fn result_text_matches_screen_format() {
        let detection = Detection { score: 0.87, elapsed_ms: 3.0 };
        assert_eq!(detection.to_string(), "Disease detected with confidence: 0.87");
    }

    #[test]
    fn released_detector_refuses_to_infer() {
        let mut detector = constant_detector(0.5);
        detector.release_model("screen closed");
        let img = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(4, 4, Rgb([9, 9, 9])));
        assert!(matches!(detector.detect(&img), Err(Error::ModelUnavailable { .. })));
    }

    #[test]
    fn garbage_bytes_fail_as_invalid_image() {
        let detector = constant_detector(0.5);
        assert!(matches!(detector.detect_bytes(b"GIF89a?"), Err(Error::InvalidImage(_))));
    }
}
