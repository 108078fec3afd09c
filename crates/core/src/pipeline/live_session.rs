use std::path::PathBuf;
use std::time::{Duration, Instant};

use crossbeam_channel::{select, Receiver, Sender};
use thiserror::Error;

use crate::detection::domain::face_detector::{FaceDetector, ModelLoadError};
use crate::pipeline::annotation_loop::{AnnotationLoop, LoopEvent};
use crate::pipeline::session_logger::SessionLogger;
use crate::recording::download_sink::DownloadSink;
use crate::recording::recorder::{Recorder, RecorderConfig, RecorderError};
use crate::render::surface::{StrokeStyle, Surface};
use crate::shared::constants::DISPLAY_REFRESH_HZ;
use crate::shared::frame::{Frame, FrameSize};
use crate::shared::ui_state::{UiState, UiStateHandle};
use crate::video::domain::capture_source::{CaptureError, CaptureSource};
use crate::video::domain::chunk_encoder::EncoderFactory;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Model(#[from] ModelLoadError),
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Recorder(#[from] RecorderError),
}

#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Annotation loop cadence.
    pub tick_hz: u32,
    pub style: StrokeStyle,
    pub recorder: RecorderConfig,
    /// End the session on its own after this long.
    pub max_duration: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_hz: DISPLAY_REFRESH_HZ,
            style: StrokeStyle::default(),
            recorder: RecorderConfig::default(),
            max_duration: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionCommand {
    StartRecording,
    StopRecording,
    Shutdown,
}

/// The latest annotated frame and the overlay drawn for it.
#[derive(Clone, Debug)]
pub struct FrameSnapshot {
    pub video: Frame,
    pub overlay: Surface,
    pub ui: UiState,
}

impl FrameSnapshot {
    /// The video frame with the overlay painted on top, at overlay size.
    pub fn composited(&self) -> Surface {
        let mut surface = Surface::new(self.overlay.size());
        surface.blit(&self.video);
        surface.overlay(&self.overlay);
        surface
    }
}

#[derive(Clone, Debug)]
pub enum SessionEvent {
    Running(FrameSize),
    Frame(Box<FrameSnapshot>),
    RecordingStarted,
    RecordingSaved(PathBuf),
    RecordingFailed(String),
    Ended,
}

/// One camera, one annotation loop and one recorder, driven by commands.
pub struct LiveSession {
    config: SessionConfig,
    annotation: AnnotationLoop,
    recorder: Recorder,
    ui: UiStateHandle,
}

impl LiveSession {
    pub fn new(
        config: SessionConfig,
        detector: Box<dyn FaceDetector>,
        source: Box<dyn CaptureSource>,
        encoder_factory: EncoderFactory,
        sink: Box<dyn DownloadSink>,
        logger: Box<dyn SessionLogger>,
    ) -> Self {
        let ui = UiStateHandle::new();
        let annotation = AnnotationLoop::new(detector, source, config.style, ui.clone(), logger);
        let recorder = Recorder::new(
            config.recorder,
            annotation.capture_surface(),
            encoder_factory,
            sink,
            ui.clone(),
        );
        Self {
            config,
            annotation,
            recorder,
            ui,
        }
    }

    pub fn ui_state(&self) -> UiStateHandle {
        self.ui.clone()
    }

    /// Runs until `Shutdown`, the command channel closing, the camera
    /// ending, or `max_duration` elapsing.
    ///
    /// Only a camera that cannot be opened or fails mid-stream is an error;
    /// recording problems are reported as events and the session goes on.
    pub fn run(
        mut self,
        commands: Receiver<SessionCommand>,
        events: Sender<SessionEvent>,
    ) -> Result<(), SessionError> {
        self.annotation.start()?;

        let period = Duration::from_secs_f64(1.0 / f64::from(self.config.tick_hz.max(1)));
        let ticker = crossbeam_channel::tick(period);
        let deadline = self.config.max_duration.map(|d| Instant::now() + d);

        let outcome = loop {
            select! {
                recv(commands) -> command => match command {
                    Ok(SessionCommand::StartRecording) => self.start_recording(&events),
                    Ok(SessionCommand::StopRecording) => self.stop_recording(&events),
                    Ok(SessionCommand::Shutdown) | Err(_) => break Ok(()),
                },
                recv(ticker) -> _ => {
                    if let Some(result) = self.tick(&events) {
                        break result;
                    }
                    if deadline.is_some_and(|d| Instant::now() >= d) {
                        log::info!("Session duration reached");
                        break Ok(());
                    }
                }
            }
        };

        // A recording outliving its camera is finalized, not discarded.
        self.stop_recording(&events);
        self.annotation.stop();
        let _ = events.send(SessionEvent::Ended);
        outcome
    }

    /// Returns `Some` once the session should end.
    fn tick(&mut self, events: &Sender<SessionEvent>) -> Option<Result<(), SessionError>> {
        for event in self.annotation.tick() {
            match event {
                LoopEvent::Running(size) => {
                    let _ = events.send(SessionEvent::Running(size));
                }
                LoopEvent::Resized(size) => log::info!("Camera resized to {size}"),
                LoopEvent::Drawn { .. } => {
                    if let Some(snapshot) = self.snapshot() {
                        let _ = events.send(SessionEvent::Frame(Box::new(snapshot)));
                    }
                }
                LoopEvent::Ended => return Some(Ok(())),
                LoopEvent::Failed(e) => return Some(Err(e.into())),
            }
        }
        if let Some(result) = self.recorder.poll_finished() {
            self.report_stopped(result, events);
        }
        None
    }

    fn snapshot(&self) -> Option<FrameSnapshot> {
        Some(FrameSnapshot {
            video: self.annotation.last_frame()?.clone(),
            overlay: self.annotation.display().clone(),
            ui: self.ui.snapshot(),
        })
    }

    fn start_recording(&mut self, events: &Sender<SessionEvent>) {
        let event = match self.recorder.start() {
            Ok(()) => SessionEvent::RecordingStarted,
            Err(e) => {
                log::warn!("Could not start recording: {e}");
                SessionEvent::RecordingFailed(e.to_string())
            }
        };
        let _ = events.send(event);
    }

    fn stop_recording(&mut self, events: &Sender<SessionEvent>) {
        let result = self.recorder.stop();
        self.report_stopped(result, events);
    }

    fn report_stopped(
        &self,
        result: Result<Option<PathBuf>, RecorderError>,
        events: &Sender<SessionEvent>,
    ) {
        match result {
            Ok(Some(path)) => {
                let _ = events.send(SessionEvent::RecordingSaved(path));
            }
            Ok(None) => {}
            Err(e) => {
                log::error!("Recording failed: {e}");
                let _ = events.send(SessionEvent::RecordingFailed(e.to_string()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::annotation_loop::tests::{two_faces, FakeCamera};
    use crate::pipeline::session_logger::NullSessionLogger;
    use crate::recording::download_sink::DirectoryDownloadSink;
    use crate::video::domain::chunk_encoder::{ChunkEncoder, EncoderError};
    use tempfile::TempDir;

    struct CountingEncoder;

    impl ChunkEncoder for CountingEncoder {
        fn open(&mut self, _size: FrameSize, _fps: u32) -> Result<(), EncoderError> {
            Ok(())
        }

        fn encode(&mut self, _frame: &Frame) -> Result<Vec<Vec<u8>>, EncoderError> {
            Ok(vec![b"f".to_vec()])
        }

        fn finish(&mut self) -> Result<Vec<Vec<u8>>, EncoderError> {
            Ok(vec![b"end".to_vec()])
        }
    }

    /// Fails from its third frame on.
    struct FlakyEncoder {
        encoded: usize,
    }

    impl ChunkEncoder for FlakyEncoder {
        fn open(&mut self, _size: FrameSize, _fps: u32) -> Result<(), EncoderError> {
            Ok(())
        }

        fn encode(&mut self, _frame: &Frame) -> Result<Vec<Vec<u8>>, EncoderError> {
            self.encoded += 1;
            if self.encoded > 2 {
                return Err(EncoderError::Failed("encoder stalled".into()));
            }
            Ok(vec![b"f".to_vec()])
        }

        fn finish(&mut self) -> Result<Vec<Vec<u8>>, EncoderError> {
            Ok(Vec::new())
        }
    }

    fn session(camera: FakeCamera, out: &TempDir) -> LiveSession {
        session_with(
            camera,
            out,
            Box::new(|| Box::new(CountingEncoder) as Box<dyn ChunkEncoder>),
        )
    }

    fn session_with(camera: FakeCamera, out: &TempDir, encoders: EncoderFactory) -> LiveSession {
        LiveSession::new(
            SessionConfig {
                recorder: RecorderConfig { fps: 100 },
                ..SessionConfig::default()
            },
            Box::new(two_faces()),
            Box::new(camera),
            encoders,
            Box::new(DirectoryDownloadSink::new(out.path())),
            Box::new(NullSessionLogger),
        )
    }

    fn next_matching(
        events: &Receiver<SessionEvent>,
        predicate: impl Fn(&SessionEvent) -> bool,
    ) -> SessionEvent {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let event = events
                .recv_timeout(remaining)
                .expect("session went quiet");
            if predicate(&event) {
                return event;
            }
        }
    }

    #[test]
    fn test_record_and_save_while_streaming() {
        let out = TempDir::new().unwrap();
        let live = session(FakeCamera::streaming(FrameSize::new(160, 120)), &out);
        let (command_tx, command_rx) = crossbeam_channel::unbounded();
        let (event_tx, event_rx) = crossbeam_channel::unbounded();
        let handle = std::thread::spawn(move || live.run(command_rx, event_tx));

        next_matching(&event_rx, |e| matches!(e, SessionEvent::Running(_)));
        match next_matching(&event_rx, |e| matches!(e, SessionEvent::Frame(_))) {
            SessionEvent::Frame(snapshot) => {
                assert_eq!(snapshot.ui.face_count, 2);
                assert_eq!(snapshot.overlay.size(), snapshot.video.size());
                let composite = snapshot.composited();
                assert_eq!(composite.pixel(0, 0), Some([40, 40, 40, 255]));
                // 0.1 * 160, 0.1 * 120
                assert_eq!(composite.pixel(16, 12), Some(StrokeStyle::default().color));
            }
            other => panic!("unexpected {other:?}"),
        }

        command_tx.send(SessionCommand::StartRecording).unwrap();
        next_matching(&event_rx, |e| matches!(e, SessionEvent::RecordingStarted));
        std::thread::sleep(Duration::from_millis(100));
        command_tx.send(SessionCommand::StopRecording).unwrap();

        let path = match next_matching(&event_rx, |e| matches!(e, SessionEvent::RecordingSaved(_)))
        {
            SessionEvent::RecordingSaved(path) => path,
            _ => unreachable!(),
        };
        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.ends_with(b"end"));
        assert!(bytes[..bytes.len() - 3].iter().all(|&b| b == b'f'));

        command_tx.send(SessionCommand::Shutdown).unwrap();
        next_matching(&event_rx, |e| matches!(e, SessionEvent::Ended));
        handle.join().unwrap().unwrap();
    }

    #[test]
    fn test_camera_end_finalizes_recording() {
        let out = TempDir::new().unwrap();
        let mut camera = FakeCamera::streaming(FrameSize::new(64, 48));
        camera.limit = Some(150);
        let live = session(camera, &out);
        let (command_tx, command_rx) = crossbeam_channel::unbounded();
        let (event_tx, event_rx) = crossbeam_channel::unbounded();
        let handle = std::thread::spawn(move || live.run(command_rx, event_tx));

        next_matching(&event_rx, |e| matches!(e, SessionEvent::Running(_)));
        command_tx.send(SessionCommand::StartRecording).unwrap();
        next_matching(&event_rx, |e| matches!(e, SessionEvent::RecordingStarted));

        let saved = next_matching(&event_rx, |e| {
            matches!(e, SessionEvent::RecordingSaved(_) | SessionEvent::Ended)
        });
        assert!(matches!(saved, SessionEvent::RecordingSaved(_)));
        next_matching(&event_rx, |e| matches!(e, SessionEvent::Ended));
        handle.join().unwrap().unwrap();
        assert_eq!(std::fs::read_dir(out.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_encoder_failure_is_reported_while_streaming() {
        let out = TempDir::new().unwrap();
        let live = session_with(
            FakeCamera::streaming(FrameSize::new(64, 48)),
            &out,
            Box::new(|| Box::new(FlakyEncoder { encoded: 0 }) as Box<dyn ChunkEncoder>),
        );
        let ui = live.ui_state();
        let (command_tx, command_rx) = crossbeam_channel::unbounded();
        let (event_tx, event_rx) = crossbeam_channel::unbounded();
        let handle = std::thread::spawn(move || live.run(command_rx, event_tx));

        next_matching(&event_rx, |e| matches!(e, SessionEvent::Running(_)));
        command_tx.send(SessionCommand::StartRecording).unwrap();
        next_matching(&event_rx, |e| matches!(e, SessionEvent::RecordingStarted));

        match next_matching(&event_rx, |e| {
            matches!(e, SessionEvent::RecordingFailed(_) | SessionEvent::RecordingSaved(_))
        }) {
            SessionEvent::RecordingFailed(message) => assert!(message.contains("encoder stalled")),
            other => panic!("unexpected {other:?}"),
        }
        assert!(!ui.snapshot().recording);

        // Detection keeps going after the recording is gone.
        next_matching(&event_rx, |e| matches!(e, SessionEvent::Frame(_)));

        command_tx.send(SessionCommand::Shutdown).unwrap();
        next_matching(&event_rx, |e| matches!(e, SessionEvent::Ended));
        handle.join().unwrap().unwrap();
        assert_eq!(std::fs::read_dir(out.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_permission_denied_fails_session() {
        let out = TempDir::new().unwrap();
        let mut camera = FakeCamera::streaming(FrameSize::new(64, 48));
        camera.open_error = Some(CaptureError::PermissionDenied);
        let live = session(camera, &out);
        let ui = live.ui_state();
        let (_command_tx, command_rx) = crossbeam_channel::unbounded();
        let (event_tx, event_rx) = crossbeam_channel::unbounded();

        let err = live.run(command_rx, event_tx).unwrap_err();
        assert!(matches!(
            err,
            SessionError::Capture(CaptureError::PermissionDenied)
        ));
        assert!(ui.snapshot().loading);
        assert!(event_rx.try_recv().is_err());
    }

    #[test]
    fn test_recording_before_first_frame_is_reported() {
        let out = TempDir::new().unwrap();
        let mut camera = FakeCamera::streaming(FrameSize::new(64, 48));
        camera.limit = Some(0);
        let live = session(camera, &out);
        let (command_tx, command_rx) = crossbeam_channel::unbounded();
        let (event_tx, event_rx) = crossbeam_channel::unbounded();
        command_tx.send(SessionCommand::StartRecording).unwrap();

        live.run(command_rx, event_tx).unwrap();
        let events: Vec<_> = event_rx.try_iter().collect();
        assert!(matches!(events.first(), Some(SessionEvent::RecordingFailed(_))));
        assert!(matches!(events.last(), Some(SessionEvent::Ended)));
    }

    #[test]
    fn test_max_duration_ends_session() {
        let out = TempDir::new().unwrap();
        let mut live = session(FakeCamera::streaming(FrameSize::new(64, 48)), &out);
        live.config.max_duration = Some(Duration::from_millis(100));
        let (_command_tx, command_rx) = crossbeam_channel::unbounded();
        let (event_tx, event_rx) = crossbeam_channel::unbounded();

        live.run(command_rx, event_tx).unwrap();
        assert!(matches!(event_rx.try_iter().last(), Some(SessionEvent::Ended)));
    }
}
