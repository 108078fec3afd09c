use thiserror::Error;

use crate::shared::frame::Frame;

/// Why a camera could not be opened or stopped delivering frames.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("camera permission denied")]
    PermissionDenied,
    #[error("no camera device found: {0}")]
    NoDevice(String),
    #[error("camera device is busy")]
    DeviceBusy,
    #[error("camera stream failed: {0}")]
    Stream(String),
}

/// A live camera stream.
///
/// `open` performs the platform consent flow and device acquisition.
/// `next_frame` blocks until the device delivers a frame; `Ok(None)` means
/// the stream ended (closed or revoked) and no further frames will arrive.
/// Dimensions are carried by each frame and may change between frames.
pub trait CaptureSource: Send {
    fn open(&mut self) -> Result<(), CaptureError>;

    fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError>;

    fn close(&mut self);
}
