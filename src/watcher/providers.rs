use image::{DynamicImage, GrayImage};
use std::sync::Arc;

use super::target::CaptureTarget;
use crate::error::WatchError;

/// Yields one frame of the target. Called from the blocking pool.
pub trait FrameSource: Send + Sync {
    fn capture(&self, target: &CaptureTarget) -> Result<DynamicImage, WatchError>;
}

/// Reads text out of a binarized frame. Called from the blocking pool.
pub trait TextRecognizer: Send + Sync {
    fn recognize(&self, image: &GrayImage) -> Result<String, WatchError>;
}

/// Fired once when a run completes.
pub trait DoneNotifier: Send + Sync {
    fn notify(&self);
}

/// The external collaborators a run needs, shareable across blocking tasks.
#[derive(Clone)]
pub struct Providers {
    pub frames: Arc<dyn FrameSource>,
    pub recognizer: Arc<dyn TextRecognizer>,
    pub notifier: Arc<dyn DoneNotifier>,
}
