use std::sync::{Arc, Mutex, MutexGuard};

use crate::render::surface::{StrokeStyle, Surface};
use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::{Frame, FrameSize};

/// Capture surface handle shared with the recorder.
pub type SharedSurface = Arc<Mutex<Surface>>;

/// Locks a shared surface, recovering from a poisoned mutex.
///
/// A panic while drawing leaves at worst a half-drawn frame, which the
/// next clear discards.
pub fn lock_surface(surface: &SharedSurface) -> MutexGuard<'_, Surface> {
    surface.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// The two drawing targets: the display overlay (boxes only, shown above
/// the live video) and the capture surface (frame plus boxes).
///
/// Both always share the same dimensions.
pub struct RenderTargets {
    display: Surface,
    capture: SharedSurface,
    style: StrokeStyle,
}

impl RenderTargets {
    pub fn new(size: FrameSize, style: StrokeStyle) -> Self {
        Self {
            display: Surface::new(size),
            capture: Arc::new(Mutex::new(Surface::new(size))),
            style,
        }
    }

    pub fn size(&self) -> FrameSize {
        self.display.size()
    }

    pub fn display(&self) -> &Surface {
        &self.display
    }

    pub fn capture(&self) -> SharedSurface {
        Arc::clone(&self.capture)
    }

    /// Resizes both targets. Must happen between draws, never during one.
    pub fn resize(&mut self, size: FrameSize) {
        if self.size() == size {
            return;
        }
        log::debug!("Resizing render targets {} -> {size}", self.size());
        self.display.resize(size);
        lock_surface(&self.capture).resize(size);
    }

    /// Redraws both targets for one detection result.
    ///
    /// `boxes` must already be in render-target coordinates.
    pub fn draw(&mut self, frame: &Frame, boxes: &[BoundingBox]) {
        self.display.clear();
        for bbox in boxes {
            self.display.stroke_rect(bbox, self.style);
        }

        let mut capture = lock_surface(&self.capture);
        capture.clear();
        capture.blit(frame);
        for bbox in boxes {
            capture.stroke_rect(bbox, self.style);
        }
    }
}
