//! Background detection.
//!
//! A `DetectionTask` runs preprocessing and inference on its own thread and
//! delivers exactly one outcome through a channel. A shared flag cancels it;
//! the flag is checked before preprocessing, before inference and before the
//! result is sent, and a cancelled task reports `Error::Cancelled`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Instant;

use image::DynamicImage;
use tracing::{debug, info};

use crate::detect::detector::{finish, Detection, Detector};
use crate::error::{Error, Result};

pub struct DetectionTask {
    cancel_flag: Arc<AtomicBool>,
    result_rx: mpsc::Receiver<Result<Detection>>,
}

impl DetectionTask {
    pub fn spawn(detector: Detector, image: Arc<DynamicImage>) -> DetectionTask {
        let (tx, rx) = mpsc::channel();
        let cancel_flag = Arc::new(AtomicBool::new(false));

        let flag = cancel_flag.clone();
        let worker_tx = tx.clone();
        let spawned = thread::Builder::new()
            .name("leafscan-detect".into())
            .spawn(move || {
                let outcome = run(&detector, &image, &flag);
                // The receiver is gone once the session dropped the task.
                let _ = worker_tx.send(outcome);
            });

        if let Err(e) = spawned {
            let _ = tx.send(Err(Error::from(e)));
        }

        DetectionTask { cancel_flag, result_rx: rx }
    }

    /// Asks the worker to stop at its next checkpoint.
    pub fn cancel(&self) {
        info!("detection cancelled");
        self.cancel_flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_flag.load(Ordering::Relaxed)
    }

    /// Non-blocking: the outcome if the worker has finished.
    pub fn try_result(&self) -> Option<Result<Detection>> {
        match self.result_rx.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(mpsc::TryRecvError::Empty) => None,
            Err(mpsc::TryRecvError::Disconnected) => {
                Some(Err(Error::Inference("detection worker exited without a result".into())))
            }
        }
    }

    /// Blocks until the worker delivers its outcome.
    pub fn wait(self) -> Result<Detection> {
        self.result_rx
            .recv()
            .unwrap_or_else(|_| Err(Error::Inference("detection worker exited without a result".into())))
    }
}

fn run(detector: &Detector, image: &DynamicImage, cancel_flag: &AtomicBool) -> Result<Detection> {
    let checkpoint = || {
        if cancel_flag.load(Ordering::Relaxed) {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    };

    let started = Instant::now();
    checkpoint()?;
    let tensor = detector.preprocess(image)?;
    debug!(shape = %tensor.shape(), "image preprocessed");
    checkpoint()?;
    let score = detector.infer(&tensor)?;
    checkpoint()?;
    Ok(finish(score, started))
}
