use std::io::Cursor;

use approx::assert_relative_eq;
use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};

use leafscan::{
    CheckSession, Config, Detector, Error, ImageSource, ModelArtifact, PreprocessConfig, Preprocessor,
    ScorePolicy, TensorShape,
};

fn white_photo() -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(640, 480, Rgb([255, 255, 255])))
}

fn png_bytes(image: &DynamicImage) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, ImageOutputFormat::Png).unwrap();
    buf.into_inner()
}

fn config_with_constant_model(dir: &tempfile::TempDir, value: f32) -> Config {
    let path = dir.path().join("plant_disease_model.json");
    ModelArtifact::constant(value, TensorShape::default()).save_json(&path).unwrap();
    Config { model_path: path, ..Config::default() }
}

#[test]
fn white_photo_becomes_all_ones() {
    let pre = Preprocessor::new(PreprocessConfig::default()).unwrap();
    let tensor = pre.preprocess_bytes(&png_bytes(&white_photo())).unwrap();

    assert_eq!(tensor.len(), 150_528);
    assert_eq!(tensor.shape(), TensorShape::new(224, 224, 3));
    assert!(tensor.as_slice().iter().all(|&v| v == 1.0));
}

#[test]
fn photo_on_disk_is_scored_by_saved_model() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_with_constant_model(&dir, 0.87);
    let photo = dir.path().join("leaf.png");
    white_photo().save(&photo).unwrap();

    let detector = Detector::from_config(&config).unwrap();
    let detection = detector.detect_path(&photo).unwrap();

    assert_relative_eq!(detection.score, 0.87);
    assert_eq!(detection.to_string(), "Disease detected with confidence: 0.87");
}

#[test]
fn session_runs_detection_in_background() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_with_constant_model(&dir, 0.87);

    let mut session = CheckSession::open(&config).unwrap();
    session.set_image_bytes(ImageSource::Gallery, &png_bytes(&white_photo())).unwrap();
    session.start_detection().unwrap();
    let detection = session.wait().unwrap();

    assert_relative_eq!(detection.score, 0.87);
    assert_eq!(
        session.result_text().as_deref(),
        Some("Disease detected with confidence: 0.87")
    );

    session.close();
    assert!(session.image().is_none());
    assert!(!session.detector().model_state().is_loaded());
}

#[test]
fn missing_model_is_reported_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config { model_path: dir.path().join("absent.json"), ..Config::default() };

    let mut session = CheckSession::open(&config).unwrap();
    session.set_image(ImageSource::Camera, white_photo()).unwrap();

    assert!(matches!(session.start_detection(), Err(Error::ModelUnavailable { .. })));
    assert!(!session.is_running());
}

#[test]
fn out_of_range_score_follows_policy() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_with_constant_model(&dir, 1.5);

    let lenient = Detector::from_config(&config).unwrap();
    assert_relative_eq!(lenient.detect(&white_photo()).unwrap().score, 1.5);

    config.score_policy = ScorePolicy::Reject;
    let strict = Detector::from_config(&config).unwrap();
    assert!(matches!(strict.detect(&white_photo()), Err(Error::ScoreOutOfRange(s)) if s == 1.5));
}
