use thiserror::Error;

use crate::shared::frame::{Frame, FrameSize};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncoderError {
    /// The requested codec/container is not available on this platform.
    #[error("encoder unsupported: {0}")]
    Unsupported(String),
    #[error("encoder failed: {0}")]
    Failed(String),
}

/// Incremental video encoder that emits container bytes as opaque chunks.
///
/// Concatenating every chunk returned by `encode` and `finish`, in the
/// order they were returned, yields a complete playable file.
pub trait ChunkEncoder: Send {
    fn open(&mut self, size: FrameSize, fps: u32) -> Result<(), EncoderError>;

    /// Encode one RGB frame sized as passed to `open`. May return zero chunks.
    fn encode(&mut self, frame: &Frame) -> Result<Vec<Vec<u8>>, EncoderError>;

    /// Flush buffered frames and close the container.
    fn finish(&mut self) -> Result<Vec<Vec<u8>>, EncoderError>;
}

/// Builds a fresh encoder for each recording.
pub type EncoderFactory = Box<dyn Fn() -> Box<dyn ChunkEncoder> + Send>;
