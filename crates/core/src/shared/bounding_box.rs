use crate::shared::frame::FrameSize;

/// Axis-aligned face rectangle in pixel coordinates.
///
/// Carries no identity: boxes are produced per detection call and discarded
/// after the tick that draws them.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Maps the box from `from` pixel space into `to` pixel space.
    ///
    /// A degenerate source size leaves coordinates unscaled.
    pub fn scaled(&self, from: FrameSize, to: FrameSize) -> BoundingBox {
        if from.is_empty() {
            return *self;
        }
        let sx = to.width as f32 / from.width as f32;
        let sy = to.height as f32 / from.height as f32;
        BoundingBox {
            x: self.x * sx,
            y: self.y * sy,
            width: self.width * sx,
            height: self.height * sy,
        }
    }

    /// Intersects the box with `[0, W] x [0, H]`.
    ///
    /// Boxes entirely outside collapse to zero size on the nearest edge.
    /// NaN coordinates collapse to the origin.
    pub fn clamped(&self, bounds: FrameSize) -> BoundingBox {
        let w = bounds.width as f32;
        let h = bounds.height as f32;
        let x0 = self.x.max(0.0).min(w);
        let y0 = self.y.max(0.0).min(h);
        let x1 = self.right().max(0.0).min(w).max(x0);
        let y1 = self.bottom().max(0.0).min(h).max(y0);
        BoundingBox {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
        }
    }

    pub fn is_within(&self, bounds: FrameSize) -> bool {
        self.x >= 0.0
            && self.y >= 0.0
            && self.width >= 0.0
            && self.height >= 0.0
            && self.right() <= bounds.width as f32
            && self.bottom() <= bounds.height as f32
    }
}

/// Scales detection boxes onto a render target, clamping to its bounds.
pub fn fit_to_surface(
    boxes: &[BoundingBox],
    detected_at: FrameSize,
    surface: FrameSize,
) -> Vec<BoundingBox> {
    boxes
        .iter()
        .map(|b| b.scaled(detected_at, surface).clamped(surface))
        .collect()
}
