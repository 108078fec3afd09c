use std::thread::JoinHandle;
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender, TryRecvError};

use crate::detection::domain::face_detector::FaceDetector;
use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;

/// A finished detection, paired with the frame it ran on.
pub struct DetectionOutcome {
    pub frame: Frame,
    pub boxes: Result<Vec<BoundingBox>, String>,
    pub elapsed_ms: f64,
}

/// Runs the detector on a worker thread, one frame at a time.
///
/// `submit` refuses new work while a detection is in flight, so callers
/// drop frames instead of queueing them.
pub struct DetectionSlot {
    request_tx: Option<Sender<Frame>>,
    result_rx: Receiver<DetectionOutcome>,
    in_flight: bool,
    handle: Option<JoinHandle<()>>,
}

impl DetectionSlot {
    pub fn spawn(mut detector: Box<dyn FaceDetector>) -> Self {
        let (request_tx, request_rx) = crossbeam_channel::bounded::<Frame>(1);
        let (result_tx, result_rx) = crossbeam_channel::bounded::<DetectionOutcome>(1);

        let handle = std::thread::spawn(move || {
            for frame in request_rx {
                let start = Instant::now();
                let boxes = detector.detect(&frame).map_err(|e| e.to_string());
                let outcome = DetectionOutcome {
                    frame,
                    boxes,
                    elapsed_ms: start.elapsed().as_secs_f64() * 1000.0,
                };
                if result_tx.send(outcome).is_err() {
                    break;
                }
            }
        });

        Self {
            request_tx: Some(request_tx),
            result_rx,
            in_flight: false,
            handle: Some(handle),
        }
    }

    pub fn is_idle(&self) -> bool {
        !self.in_flight
    }

    /// Hands `frame` to the worker. Returns `false` (dropping the frame)
    /// while a previous detection is outstanding or after shutdown.
    pub fn submit(&mut self, frame: Frame) -> bool {
        if self.in_flight {
            return false;
        }
        let Some(tx) = self.request_tx.as_ref() else {
            return false;
        };
        if tx.try_send(frame).is_err() {
            return false;
        }
        self.in_flight = true;
        true
    }

    /// Returns the outstanding detection if it has finished.
    pub fn try_take(&mut self) -> Option<DetectionOutcome> {
        if !self.in_flight {
            return None;
        }
        match self.result_rx.try_recv() {
            Ok(outcome) => {
                self.in_flight = false;
                Some(outcome)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                log::error!("Detection worker exited unexpectedly");
                self.in_flight = false;
                None
            }
        }
    }

    /// Closes the request channel and joins the worker after its current frame.
    pub fn shutdown(&mut self) {
        self.request_tx = None;
        // The result channel holds one outcome, so the worker never blocks on send here.
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Detection worker panicked");
            }
        }
        self.in_flight = false;
    }
}

impl Drop for DetectionSlot {
    fn drop(&mut self) {
        self.shutdown();
    }
}
