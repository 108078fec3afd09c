use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crossbeam_channel::Receiver;

use crate::shared::frame::{Frame, FrameSize};
use crate::video::domain::capture_source::{CaptureError, CaptureSource};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FeedEvent {
    /// First frame arrived at this size.
    Ready(FrameSize),
    /// Native capture size changed.
    Resized(FrameSize),
    Ended,
    Failed(CaptureError),
}

/// Reads an opened capture source on a dedicated thread.
///
/// Only the most recent frame is kept; a frame that is not taken before
/// the next one arrives is overwritten.
pub struct CaptureFeed {
    latest: Arc<Mutex<Option<Frame>>>,
    events: Receiver<FeedEvent>,
    cancelled: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl CaptureFeed {
    /// `source` must already be open. It is closed when the feed stops.
    pub fn spawn(mut source: Box<dyn CaptureSource>) -> Self {
        let latest = Arc::new(Mutex::new(None));
        let cancelled = Arc::new(AtomicBool::new(false));
        let (event_tx, events) = crossbeam_channel::unbounded();

        let slot = Arc::clone(&latest);
        let cancel = Arc::clone(&cancelled);
        let handle = std::thread::spawn(move || {
            let mut current: Option<FrameSize> = None;

            while !cancel.load(Ordering::Relaxed) {
                let event = match source.next_frame() {
                    Ok(Some(frame)) => {
                        let size = frame.size();
                        let event = match current {
                            None => Some(FeedEvent::Ready(size)),
                            Some(previous) if previous != size => Some(FeedEvent::Resized(size)),
                            Some(_) => None,
                        };
                        current = Some(size);
                        // Announce a new size before the frame that carries it.
                        if let Some(event) = event {
                            let _ = event_tx.send(event);
                        }
                        *slot.lock().unwrap_or_else(|p| p.into_inner()) = Some(frame);
                        continue;
                    }
                    Ok(None) => FeedEvent::Ended,
                    Err(e) => FeedEvent::Failed(e),
                };
                let _ = event_tx.send(event);
                break;
            }

            source.close();
        });

        Self {
            latest,
            events,
            cancelled,
            handle: Some(handle),
        }
    }

    /// Removes and returns the newest frame, if one arrived since the last call.
    pub fn take_latest(&self) -> Option<Frame> {
        self.latest.lock().unwrap_or_else(|p| p.into_inner()).take()
    }

    pub fn poll_events(&self) -> Vec<FeedEvent> {
        self.events.try_iter().collect()
    }

    /// Cancels the reader and waits for it to close the source.
    pub fn stop(&mut self) {
        self.cancelled.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Capture reader thread panicked");
            }
        }
    }
}

impl Drop for CaptureFeed {
    fn drop(&mut self) {
        self.stop();
    }
}
