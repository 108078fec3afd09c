use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::{Frame, FrameSize};

/// RGBA color, non-premultiplied.
pub type Rgba = [u8; 4];

/// Outline styling for detection boxes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StrokeStyle {
    pub color: Rgba,
    pub line_width: u32,
}

impl Default for StrokeStyle {
    fn default() -> Self {
        Self {
            color: crate::shared::constants::BOX_COLOR,
            line_width: crate::shared::constants::BOX_LINE_WIDTH,
        }
    }
}

/// A drawable RGBA raster.
///
/// All drawing is clipped to the surface; nothing here can index out of
/// bounds regardless of input coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct Surface {
    size: FrameSize,
    pixels: Vec<u8>,
}

impl Surface {
    pub fn new(size: FrameSize) -> Self {
        Self {
            size,
            pixels: vec![0; size.pixel_count() * 4],
        }
    }

    pub fn size(&self) -> FrameSize {
        self.size
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Reallocates to `size`. Contents are cleared.
    pub fn resize(&mut self, size: FrameSize) {
        self.size = size;
        self.pixels = vec![0; size.pixel_count() * 4];
    }

    /// Fully transparent.
    pub fn clear(&mut self) {
        self.pixels.fill(0);
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        if x >= self.size.width || y >= self.size.height {
            return None;
        }
        let i = (y as usize * self.size.width as usize + x as usize) * 4;
        Some([
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ])
    }

    /// Draws an RGB frame over the whole surface, nearest-neighbour scaled.
    pub fn blit(&mut self, frame: &Frame) {
        if self.size.is_empty() || frame.is_empty() {
            return;
        }
        let channels = frame.channels() as usize;
        let (sw, sh) = (frame.width() as usize, frame.height() as usize);
        let (dw, dh) = (self.size.width as usize, self.size.height as usize);
        let src = frame.data();

        for dy in 0..dh {
            let sy = dy * sh / dh;
            let src_row = sy * sw * channels;
            let dst_row = dy * dw * 4;
            for dx in 0..dw {
                let sx = dx * sw / dw;
                let s = src_row + sx * channels;
                let d = dst_row + dx * 4;
                self.pixels[d..d + 3].copy_from_slice(&src[s..s + 3]);
                self.pixels[d + 3] = 0xff;
            }
        }
    }

    /// Strokes the outline of `bbox` inward from its edges.
    pub fn stroke_rect(&mut self, bbox: &BoundingBox, style: StrokeStyle) {
        if self.size.is_empty() || style.line_width == 0 {
            return;
        }
        let clipped = bbox.clamped(self.size);
        let x0 = clipped.x.floor() as i64;
        let y0 = clipped.y.floor() as i64;
        let x1 = clipped.right().ceil() as i64;
        let y1 = clipped.bottom().ceil() as i64;
        if x1 <= x0 || y1 <= y0 {
            return;
        }
        let lw = style.line_width as i64;

        self.fill_rect(x0, y0, x1, (y0 + lw).min(y1), style.color);
        self.fill_rect(x0, (y1 - lw).max(y0), x1, y1, style.color);
        self.fill_rect(x0, y0, (x0 + lw).min(x1), y1, style.color);
        self.fill_rect((x1 - lw).max(x0), y0, x1, y1, style.color);
    }

    /// Fills the half-open rectangle `[x0, x1) × [y0, y1)`, clipped.
    fn fill_rect(&mut self, x0: i64, y0: i64, x1: i64, y1: i64, color: Rgba) {
        let w = self.size.width as i64;
        let h = self.size.height as i64;
        let (x0, x1) = (x0.clamp(0, w) as usize, x1.clamp(0, w) as usize);
        let (y0, y1) = (y0.clamp(0, h) as usize, y1.clamp(0, h) as usize);
        let stride = self.size.width as usize * 4;
        for y in y0..y1 {
            for x in x0..x1 {
                let i = y * stride + x * 4;
                self.pixels[i..i + 4].copy_from_slice(&color);
            }
        }
    }

    /// Samples the surface into an RGB frame of `size`, dropping alpha.
    pub fn to_rgb_frame(&self, size: FrameSize, index: usize) -> Frame {
        let mut data = vec![0u8; size.pixel_count() * 3];
        if !self.size.is_empty() {
            let (sw, sh) = (self.size.width as usize, self.size.height as usize);
            let (dw, dh) = (size.width as usize, size.height as usize);
            for dy in 0..dh {
                let sy = dy * sh / dh;
                for dx in 0..dw {
                    let sx = dx * sw / dw;
                    let s = (sy * sw + sx) * 4;
                    let d = (dy * dw + dx) * 3;
                    data[d..d + 3].copy_from_slice(&self.pixels[s..s + 3]);
                }
            }
        }
        Frame::new(data, size.width, size.height, 3, index)
    }

    /// Paints every non-transparent pixel of `layer` over this surface.
    /// Sizes must match; otherwise nothing is drawn.
    pub fn overlay(&mut self, layer: &Surface) {
        if layer.size != self.size {
            return;
        }
        for (dst, src) in self.pixels.chunks_exact_mut(4).zip(layer.pixels.chunks_exact(4)) {
            if src[3] != 0 {
                dst.copy_from_slice(src);
            }
        }
    }

    /// Counts pixels exactly matching `color`.
    pub fn count_pixels(&self, color: Rgba) -> usize {
        self.pixels.chunks_exact(4).filter(|p| *p == color).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const GREEN: Rgba = [0x00, 0xff, 0x88, 0xff];

    fn style(line_width: u32) -> StrokeStyle {
        StrokeStyle {
            color: GREEN,
            line_width,
        }
    }

    #[test]
    fn test_new_surface_is_transparent() {
        let surface = Surface::new(FrameSize::new(4, 3));
        assert_eq!(surface.pixels().len(), 4 * 3 * 4);
        assert!(surface.pixels().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_blit_same_size_copies_pixels() {
        let frame = Frame::new(
            vec![10, 20, 30, 40, 50, 60, 70, 80, 90, 100, 110, 120],
            2,
            2,
            3,
            0,
        );
        let mut surface = Surface::new(FrameSize::new(2, 2));
        surface.blit(&frame);
        assert_eq!(surface.pixel(0, 0), Some([10, 20, 30, 255]));
        assert_eq!(surface.pixel(1, 1), Some([100, 110, 120, 255]));
    }

    #[test]
    fn test_blit_upscales_nearest_neighbour() {
        let frame = Frame::new(vec![255, 0, 0, 0, 0, 255], 2, 1, 3, 0);
        let mut surface = Surface::new(FrameSize::new(4, 2));
        surface.blit(&frame);
        assert_eq!(surface.pixel(1, 1), Some([255, 0, 0, 255]));
        assert_eq!(surface.pixel(2, 0), Some([0, 0, 255, 255]));
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut surface = Surface::new(FrameSize::new(8, 8));
        surface.blit(&Frame::filled(FrameSize::new(8, 8), [1, 2, 3], 0));
        surface.clear();
        assert!(surface.pixels().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_stroke_rect_draws_outline_only() {
        let mut surface = Surface::new(FrameSize::new(20, 20));
        surface.stroke_rect(&BoundingBox::new(5.0, 5.0, 10.0, 10.0), style(2));

        assert_eq!(surface.pixel(5, 5), Some(GREEN));
        assert_eq!(surface.pixel(14, 14), Some(GREEN));
        assert_eq!(surface.pixel(6, 10), Some(GREEN));
        assert_eq!(surface.pixel(10, 10), Some([0, 0, 0, 0]));
        assert_eq!(surface.pixel(4, 4), Some([0, 0, 0, 0]));
        // 10x10 box minus its 6x6 interior.
        assert_eq!(surface.count_pixels(GREEN), 100 - 36);
    }

    #[rstest]
    #[case::overhanging(BoundingBox::new(-10.0, -10.0, 50.0, 50.0))]
    #[case::outside(BoundingBox::new(100.0, 100.0, 5.0, 5.0))]
    #[case::nan(BoundingBox::new(f32::NAN, 1.0, 5.0, 5.0))]
    fn test_stroke_rect_never_panics(#[case] bbox: BoundingBox) {
        let mut surface = Surface::new(FrameSize::new(16, 16));
        surface.stroke_rect(&bbox, style(3));
    }

    #[test]
    fn test_zero_line_width_draws_nothing() {
        let mut surface = Surface::new(FrameSize::new(16, 16));
        surface.stroke_rect(&BoundingBox::new(2.0, 2.0, 8.0, 8.0), style(0));
        assert_eq!(surface.count_pixels(GREEN), 0);
    }

    #[test]
    fn test_resize_changes_size_and_clears() {
        let mut surface = Surface::new(FrameSize::new(640, 480));
        surface.blit(&Frame::filled(FrameSize::new(2, 2), [9, 9, 9], 0));
        surface.resize(FrameSize::new(1280, 720));
        assert_eq!(surface.size(), FrameSize::new(1280, 720));
        assert_eq!(surface.pixels().len(), 1280 * 720 * 4);
        assert_eq!(surface.pixel(0, 0), Some([0, 0, 0, 0]));
    }

    #[test]
    fn test_to_rgb_frame_drops_alpha_and_resamples() {
        let mut surface = Surface::new(FrameSize::new(4, 4));
        surface.blit(&Frame::filled(FrameSize::new(4, 4), [7, 8, 9], 0));
        let frame = surface.to_rgb_frame(FrameSize::new(2, 2), 5);
        assert_eq!(frame.size(), FrameSize::new(2, 2));
        assert_eq!(frame.index(), 5);
        assert_eq!(frame.data(), &[7, 8, 9, 7, 8, 9, 7, 8, 9, 7, 8, 9]);
    }

    #[test]
    fn test_overlay_keeps_base_under_transparent_pixels() {
        let size = FrameSize::new(16, 16);
        let mut base = Surface::new(size);
        base.blit(&Frame::filled(size, [5, 5, 5], 0));
        let mut layer = Surface::new(size);
        layer.stroke_rect(&BoundingBox::new(0.0, 0.0, 4.0, 4.0), style(1));

        base.overlay(&layer);
        assert_eq!(base.pixel(0, 0), Some(GREEN));
        assert_eq!(base.pixel(8, 8), Some([5, 5, 5, 255]));
    }

    #[test]
    fn test_empty_surface_ignores_drawing() {
        let mut surface = Surface::new(FrameSize::new(0, 0));
        surface.blit(&Frame::filled(FrameSize::new(2, 2), [1, 1, 1], 0));
        surface.stroke_rect(&BoundingBox::new(0.0, 0.0, 1.0, 1.0), style(1));
        assert!(surface.pixels().is_empty());
    }
}
