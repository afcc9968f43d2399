pub mod detector;
pub mod invoker;
pub mod task;

pub use detector::{Detection, Detector};
pub use invoker::{Invoker, ScorePolicy};
pub use task::DetectionTask;
