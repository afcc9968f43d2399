//! State of one check screen: the model it owns, the selected photo and the
//! detection lifecycle. At most one detection runs per session.

use std::fmt;
use std::sync::Arc;

use image::{DynamicImage, GenericImageView};
use tracing::info;

use crate::config::Config;
use crate::detect::{Detection, DetectionTask, Detector};
use crate::error::{Error, Result};
use crate::tensor::preprocess::decode_image;

/// Where the selected photo came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource {
    Camera,
    Gallery,
    File,
}

impl fmt::Display for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ImageSource::Camera => "camera",
            ImageSource::Gallery => "gallery",
            ImageSource::File => "file",
        })
    }
}

#[derive(Debug, Clone)]
pub struct SelectedImage {
    pub source: ImageSource,
    pub image: Arc<DynamicImage>,
}

impl SelectedImage {
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

pub enum DetectionStatus {
    /// Nothing has been requested since the last image change.
    Idle,
    /// A detection is running in the background.
    Running(DetectionTask),
    /// Cancel was requested; the worker has not stopped yet.
    Cancelling(DetectionTask),
    Done(Detection),
    Failed(Error),
    Cancelled,
}

impl DetectionStatus {
    /// Whether a worker still owns the session's single detection slot.
    pub fn is_busy(&self) -> bool {
        matches!(self, DetectionStatus::Running(_) | DetectionStatus::Cancelling(_))
    }
}

impl fmt::Debug for DetectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectionStatus::Idle => f.write_str("Idle"),
            DetectionStatus::Running(_) => f.write_str("Running"),
            DetectionStatus::Cancelling(_) => f.write_str("Cancelling"),
            DetectionStatus::Done(d) => f.debug_tuple("Done").field(d).finish(),
            DetectionStatus::Failed(e) => f.debug_tuple("Failed").field(e).finish(),
            DetectionStatus::Cancelled => f.write_str("Cancelled"),
        }
    }
}

pub struct CheckSession {
    detector: Detector,
    image: Option<SelectedImage>,
    status: DetectionStatus,
}

impl CheckSession {
    /// Opens a session and loads its model. A model that fails to load is
    /// logged and leaves the session open without one.
    pub fn open(config: &Config) -> Result<CheckSession> {
        Ok(CheckSession::with_detector(Detector::from_config(config)?))
    }

    pub fn with_detector(detector: Detector) -> CheckSession {
        CheckSession { detector, image: None, status: DetectionStatus::Idle }
    }

    pub fn detector(&self) -> &Detector {
        &self.detector
    }

    pub fn image(&self) -> Option<&SelectedImage> {
        self.image.as_ref()
    }

    pub fn status(&self) -> &DetectionStatus {
        &self.status
    }

    pub fn is_running(&self) -> bool {
        matches!(self.status, DetectionStatus::Running(_))
    }

    /// True while a worker is running or still winding down after cancel.
    pub fn is_busy(&self) -> bool {
        self.status.is_busy()
    }

    /// Replaces the selected photo. A finished result belongs to the old
    /// photo and is cleared; a running detection keeps its own copy.
    pub fn set_image(&mut self, source: ImageSource, image: DynamicImage) -> Result<()> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(Error::InvalidImage(format!("image has zero area ({}x{})", width, height)));
        }
        info!(%source, width, height, "image selected");
        self.image = Some(SelectedImage { source, image: Arc::new(image) });
        if !self.is_busy() {
            self.status = DetectionStatus::Idle;
        }
        Ok(())
    }

    pub fn set_image_bytes(&mut self, source: ImageSource, bytes: &[u8]) -> Result<()> {
        let image = decode_image(bytes)?;
        self.set_image(source, image)
    }

    /// Starts a background detection on the selected photo.
    ///
    /// `Busy` while a previous worker is running or has not yet stopped
    /// after a cancel.
    pub fn start_detection(&mut self) -> Result<()> {
        self.poll();
        if self.is_busy() {
            return Err(Error::Busy);
        }
        let image = match &self.image {
            Some(selected) => selected.image.clone(),
            None => return Err(Error::InvalidImage("no image selected".into())),
        };
        self.detector.model_state().model()?;

        self.status = DetectionStatus::Running(DetectionTask::spawn(self.detector.clone(), image));
        Ok(())
    }

    /// Picks up a finished background result, if any.
    pub fn poll(&mut self) -> &DetectionStatus {
        let outcome = match &self.status {
            DetectionStatus::Running(task) => task.try_result(),
            DetectionStatus::Cancelling(task) => task.try_result().map(|_| Err(Error::Cancelled)),
            _ => None,
        };
        if let Some(outcome) = outcome {
            self.status = settle(outcome);
        }
        &self.status
    }

    /// Blocks until the current detection settles and returns its outcome.
    pub fn wait(&mut self) -> Result<Detection> {
        match std::mem::replace(&mut self.status, DetectionStatus::Idle) {
            DetectionStatus::Running(task) => self.status = settle(task.wait()),
            DetectionStatus::Cancelling(task) => {
                let _ = task.wait();
                self.status = DetectionStatus::Cancelled;
            }
            other => self.status = other,
        }
        match &self.status {
            DetectionStatus::Done(detection) => Ok(detection.clone()),
            DetectionStatus::Failed(error) => Err(error.clone()),
            DetectionStatus::Cancelled => Err(Error::Cancelled),
            DetectionStatus::Idle | DetectionStatus::Running(_) | DetectionStatus::Cancelling(_) => {
                Err(Error::NotStarted)
            }
        }
    }

    /// Cancels a running detection. Returns whether one was running.
    ///
    /// The session stays busy until the worker reaches its next checkpoint.
    pub fn cancel(&mut self) -> bool {
        match std::mem::replace(&mut self.status, DetectionStatus::Idle) {
            DetectionStatus::Running(task) => {
                task.cancel();
                self.status = DetectionStatus::Cancelling(task);
                self.poll();
                true
            }
            other => {
                self.status = other;
                false
            }
        }
    }

    /// Text for the result area of the screen.
    pub fn result_text(&self) -> Option<String> {
        match &self.status {
            DetectionStatus::Idle => None,
            DetectionStatus::Running(_) => Some("Detecting...".into()),
            DetectionStatus::Cancelling(_) => Some("Cancelling...".into()),
            DetectionStatus::Done(detection) => Some(detection.to_string()),
            DetectionStatus::Failed(error) => Some(format!("Detection failed: {}", error)),
            DetectionStatus::Cancelled => Some("Detection cancelled.".into()),
        }
    }

    /// Cancels pending work and releases the model. The session stays
    /// usable for display but can no longer detect.
    pub fn close(&mut self) {
        self.cancel();
        if self.detector.model_state().is_loaded() {
            info!("session closed, releasing model");
        }
        self.detector.release_model("session closed");
        self.image = None;
    }
}

impl Drop for CheckSession {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn settle(outcome: Result<Detection>) -> DetectionStatus {
    match outcome {
        Ok(detection) => DetectionStatus::Done(detection),
        Err(Error::Cancelled) => DetectionStatus::Cancelled,
        Err(e) => DetectionStatus::Failed(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::ScorePolicy;
    use crate::model::{InferenceModel, ModelArtifact, ModelState};
    use crate::tensor::{Preprocessor, TensorShape};
    use image::{ImageBuffer, Rgb};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{mpsc, Mutex};

    struct Slow {
        release: Mutex<mpsc::Receiver<()>>,
    }

    impl InferenceModel for Slow {
        fn input_shape(&self) -> TensorShape {
            TensorShape::default()
        }

        fn forward(&self, _input: &[f32]) -> Result<Vec<f32>> {
            let _ = self.release.lock().unwrap().recv();
            Ok(vec![0.9])
        }
    }

    /// Counts overlapping forward passes and holds each one until released.
    struct Counting {
        entered: Mutex<mpsc::Sender<()>>,
        release: Mutex<mpsc::Receiver<()>>,
        in_flight: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    impl InferenceModel for Counting {
        fn input_shape(&self) -> TensorShape {
            TensorShape::default()
        }

        fn forward(&self, _input: &[f32]) -> Result<Vec<f32>> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            let _ = self.entered.lock().unwrap().send(());
            let _ = self.release.lock().unwrap().recv();
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(vec![0.4])
        }
    }

    fn session_with(model: ModelState) -> CheckSession {
        CheckSession::with_detector(Detector::new(Preprocessor::default(), model, ScorePolicy::Passthrough))
    }

    fn leaf() -> DynamicImage {
        DynamicImage::ImageRgb8(ImageBuffer::from_pixel(64, 48, Rgb([30, 160, 40])))
    }

    #[test]
    fn detect_without_image_is_invalid_input() {
        let mut session = session_with(ModelState::loaded(ModelArtifact::constant(0.5, TensorShape::default())));
        assert!(matches!(session.start_detection(), Err(Error::InvalidImage(_))));
    }

    #[test]
    fn detect_without_model_fails_fast() {
        let mut session = session_with(ModelState::Unloaded { reason: "missing".into() });
        session.set_image(ImageSource::Gallery, leaf()).unwrap();
        assert!(matches!(session.start_detection(), Err(Error::ModelUnavailable { .. })));
        assert!(session.result_text().is_none());
    }

    #[test]
    fn detection_reports_result_text() {
        let mut session = session_with(ModelState::loaded(ModelArtifact::constant(0.25, TensorShape::default())));
        session.set_image(ImageSource::Camera, leaf()).unwrap();
        session.start_detection().unwrap();
        assert_eq!(session.wait().unwrap().score, 0.25);
        assert_eq!(session.result_text().unwrap(), "Disease detected with confidence: 0.25");
    }

    #[test]
    fn second_request_while_running_is_rejected() {
        let (release_tx, release_rx) = mpsc::channel();
        let mut session = session_with(ModelState::loaded(Slow { release: Mutex::new(release_rx) }));
        session.set_image(ImageSource::Gallery, leaf()).unwrap();

        session.start_detection().unwrap();
        assert!(matches!(session.start_detection(), Err(Error::Busy)));

        release_tx.send(()).unwrap();
        assert_eq!(session.wait().unwrap().score, 0.9);
        // Sequential reuse of the same model is fine.
        release_tx.send(()).unwrap();
        session.start_detection().unwrap();
        assert_eq!(session.wait().unwrap().score, 0.9);
    }

    #[test]
    fn cancel_marks_the_session_cancelled() {
        let (release_tx, release_rx) = mpsc::channel();
        let mut session = session_with(ModelState::loaded(Slow { release: Mutex::new(release_rx) }));
        session.set_image(ImageSource::Gallery, leaf()).unwrap();
        session.start_detection().unwrap();

        assert!(session.cancel());
        release_tx.send(()).unwrap();
        assert!(matches!(session.wait(), Err(Error::Cancelled)));
        assert_eq!(session.result_text().unwrap(), "Detection cancelled.");
    }

    #[test]
    fn cancelled_worker_blocks_restart_until_it_stops() {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let model = Counting {
            entered: Mutex::new(entered_tx),
            release: Mutex::new(release_rx),
            in_flight: in_flight.clone(),
            peak: peak.clone(),
        };
        let mut session = session_with(ModelState::loaded(model));
        session.set_image(ImageSource::Gallery, leaf()).unwrap();

        session.start_detection().unwrap();
        entered_rx.recv().unwrap();
        assert!(session.cancel());
        assert!(session.is_busy());
        assert!(matches!(session.start_detection(), Err(Error::Busy)));
        assert_eq!(session.result_text().unwrap(), "Cancelling...");

        release_tx.send(()).unwrap();
        assert!(matches!(session.wait(), Err(Error::Cancelled)));

        session.start_detection().unwrap();
        entered_rx.recv().unwrap();
        release_tx.send(()).unwrap();
        assert_eq!(session.wait().unwrap().score, 0.4);
        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert_eq!(in_flight.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn background_failure_keeps_its_error_kind() {
        let model = ModelArtifact::constant(0.5, TensorShape::new(1, 1, 3));
        let mut session = session_with(ModelState::loaded(model));
        session.set_image(ImageSource::Camera, leaf()).unwrap();
        session.start_detection().unwrap();

        assert!(matches!(session.wait(), Err(Error::ShapeMismatch { .. })));
        assert!(matches!(session.status(), DetectionStatus::Failed(Error::ShapeMismatch { .. })));
        // The failure can be read again.
        assert!(matches!(session.wait(), Err(Error::ShapeMismatch { .. })));
        assert!(session.result_text().unwrap().starts_with("Detection failed: tensor shape mismatch"));
    }

    #[test]
    fn wait_without_detection_is_not_started() {
        let mut session = session_with(ModelState::loaded(ModelArtifact::constant(0.5, TensorShape::default())));
        assert!(matches!(session.wait(), Err(Error::NotStarted)));
    }

    #[test]
    fn close_releases_the_model() {
        let mut session = session_with(ModelState::loaded(ModelArtifact::constant(0.5, TensorShape::default())));
        session.set_image(ImageSource::Gallery, leaf()).unwrap();
        session.close();
        assert!(!session.detector().model_state().is_loaded());
        assert!(session.image().is_none());
    }

    #[test]
    fn undecodable_upload_is_rejected() {
        let mut session = session_with(ModelState::Unloaded { reason: "n/a".into() });
        assert!(matches!(
            session.set_image_bytes(ImageSource::Camera, b"\x89PNG broken"),
            Err(Error::InvalidImage(_))
        ));
        assert!(session.image().is_none());
    }

    #[test]
    fn new_image_clears_finished_result() {
        let mut session = session_with(ModelState::loaded(ModelArtifact::constant(0.5, TensorShape::default())));
        session.set_image(ImageSource::Gallery, leaf()).unwrap();
        session.start_detection().unwrap();
        session.wait().unwrap();
        session.set_image(ImageSource::Camera, leaf()).unwrap();
        assert!(matches!(session.status(), DetectionStatus::Idle));
    }
}
