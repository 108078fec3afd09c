use std::time::Instant;

use crate::detection::domain::face_detector::FaceDetector;
use crate::pipeline::infrastructure::capture_feed::{CaptureFeed, FeedEvent};
use crate::pipeline::infrastructure::detection_slot::{DetectionOutcome, DetectionSlot};
use crate::pipeline::session_logger::SessionLogger;
use crate::render::render_targets::{RenderTargets, SharedSurface};
use crate::render::surface::{StrokeStyle, Surface};
use crate::shared::bounding_box::fit_to_surface;
use crate::shared::frame::{Frame, FrameSize};
use crate::shared::ui_state::UiStateHandle;
use crate::video::domain::capture_source::{CaptureError, CaptureSource};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    /// Camera open, waiting for its first frame.
    Starting,
    Running,
    Stopped,
}

/// What happened during one tick.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoopEvent {
    Running(FrameSize),
    Resized(FrameSize),
    Drawn { faces: usize },
    Ended,
    Failed(CaptureError),
}

/// Pulls camera frames through the detector and draws the results.
///
/// Driven externally: call [`tick`](Self::tick) once per display refresh.
/// At most one detection is outstanding; frames that arrive meanwhile are
/// dropped, never queued.
pub struct AnnotationLoop {
    state: LoopState,
    source: Option<Box<dyn CaptureSource>>,
    feed: Option<CaptureFeed>,
    slot: DetectionSlot,
    targets: RenderTargets,
    ui: UiStateHandle,
    logger: Box<dyn SessionLogger>,
    last_frame: Option<Frame>,
    drawn_frames: usize,
    dropped_frames: usize,
}

impl AnnotationLoop {
    pub fn new(
        detector: Box<dyn FaceDetector>,
        source: Box<dyn CaptureSource>,
        style: StrokeStyle,
        ui: UiStateHandle,
        logger: Box<dyn SessionLogger>,
    ) -> Self {
        Self {
            state: LoopState::Idle,
            source: Some(source),
            feed: None,
            slot: DetectionSlot::spawn(detector),
            targets: RenderTargets::new(FrameSize::new(0, 0), style),
            ui,
            logger,
            last_frame: None,
            drawn_frames: 0,
            dropped_frames: 0,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn display(&self) -> &Surface {
        self.targets.display()
    }

    pub fn capture_surface(&self) -> SharedSurface {
        self.targets.capture()
    }

    pub fn target_size(&self) -> FrameSize {
        self.targets.size()
    }

    /// The frame behind the most recent draw.
    pub fn last_frame(&self) -> Option<&Frame> {
        self.last_frame.as_ref()
    }

    pub fn dropped_frames(&self) -> usize {
        self.dropped_frames
    }

    /// Opens the camera. On failure the loop stays idle and loading.
    pub fn start(&mut self) -> Result<(), CaptureError> {
        if self.state != LoopState::Idle {
            log::debug!("Annotation loop already started ({:?})", self.state);
            return Ok(());
        }
        self.ui.set_loading(true);

        let Some(mut source) = self.source.take() else {
            return Err(CaptureError::NoDevice("capture source already consumed".into()));
        };
        if let Err(e) = source.open() {
            log::error!("Failed to open camera: {e}");
            self.source = Some(source);
            return Err(e);
        }

        self.feed = Some(CaptureFeed::spawn(source));
        self.state = LoopState::Starting;
        self.logger.info("Camera opened, waiting for first frame");
        Ok(())
    }

    /// Advances the loop by one display refresh.
    pub fn tick(&mut self) -> Vec<LoopEvent> {
        let mut events = Vec::new();
        let feed_events = match (&self.state, &self.feed) {
            (LoopState::Starting | LoopState::Running, Some(feed)) => feed.poll_events(),
            _ => return events,
        };

        for event in feed_events {
            match event {
                FeedEvent::Ready(size) => {
                    self.targets.resize(size);
                    if self.state == LoopState::Starting {
                        self.state = LoopState::Running;
                        self.ui.set_loading(false);
                        self.logger.info(&format!("Camera streaming at {size}"));
                        events.push(LoopEvent::Running(size));
                    }
                }
                FeedEvent::Resized(size) => {
                    self.targets.resize(size);
                    events.push(LoopEvent::Resized(size));
                }
                FeedEvent::Ended => {
                    self.logger.info("Camera stream ended");
                    self.stop();
                    events.push(LoopEvent::Ended);
                    return events;
                }
                FeedEvent::Failed(e) => {
                    log::error!("Camera failed: {e}");
                    self.stop();
                    events.push(LoopEvent::Failed(e));
                    return events;
                }
            }
        }

        if self.state != LoopState::Running {
            return events;
        }

        if let Some(outcome) = self.slot.try_take() {
            if let Some(faces) = self.draw(outcome) {
                events.push(LoopEvent::Drawn { faces });
            }
        }

        let Some(feed) = self.feed.as_ref() else {
            return events;
        };
        if let Some(frame) = feed.take_latest() {
            if !self.slot.submit(frame) {
                self.dropped_frames += 1;
            }
        }

        events
    }

    fn draw(&mut self, outcome: DetectionOutcome) -> Option<usize> {
        self.logger.timing("detect", outcome.elapsed_ms);

        let boxes = match outcome.boxes {
            Ok(boxes) => boxes,
            Err(e) => {
                log::warn!("Detection failed on frame {}: {e}", outcome.frame.index());
                return None;
            }
        };

        let start = Instant::now();
        let scaled = fit_to_surface(&boxes, outcome.frame.size(), self.targets.size());
        self.targets.draw(&outcome.frame, &scaled);
        self.ui.set_face_count(scaled.len());
        self.logger
            .timing("draw", start.elapsed().as_secs_f64() * 1000.0);

        self.drawn_frames += 1;
        self.logger.metric("faces", scaled.len() as f64);
        self.logger
            .metric("dropped_frames", self.dropped_frames as f64);
        self.logger.tick(self.drawn_frames, scaled.len());

        self.last_frame = Some(outcome.frame);
        Some(scaled.len())
    }

    /// Closes the camera and detection worker. Safe to call repeatedly.
    pub fn stop(&mut self) {
        if matches!(self.state, LoopState::Stopped) {
            return;
        }
        if let Some(mut feed) = self.feed.take() {
            feed.stop();
        }
        self.slot.shutdown();
        if self.state != LoopState::Idle {
            self.logger.summary();
        }
        self.state = LoopState::Stopped;
    }
}

impl Drop for AnnotationLoop {
    fn drop(&mut self) {
        self.stop();
    }
}
