use std::path::PathBuf;

use thiserror::Error;

use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;

/// Domain interface for face detection.
///
/// Implementations must not mutate the frame and must be safe to call
/// repeatedly; `&mut self` only allows reusing scratch buffers.
pub trait FaceDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<BoundingBox>, Box<dyn std::error::Error>>;
}

/// Detection weights could not be located or loaded.
///
/// Fatal for a session: no frame may be submitted for detection until a
/// detector has been constructed successfully.
#[derive(Error, Debug)]
pub enum ModelLoadError {
    #[error("model {name} not found in any search location")]
    NotFound { name: String },
    #[error("failed to resolve model: {0}")]
    Resolve(String),
    #[error("failed to load model from {path}: {message}")]
    Session { path: PathBuf, message: String },
}
