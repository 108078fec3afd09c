use std::path::PathBuf;
use std::thread;

use crossbeam_channel::{Receiver, Sender};

use facetrack_core::detection::infrastructure::model_resolver::{ModelLocation, ProgressFn};
use facetrack_core::detection::infrastructure::onnx_blazeface_detector::OnnxBlazefaceDetector;
use facetrack_core::pipeline::live_session::{
    LiveSession, SessionCommand, SessionConfig, SessionEvent,
};
use facetrack_core::pipeline::session_logger::NullSessionLogger;
use facetrack_core::recording::download_sink::{DirectoryDownloadSink, DownloadSink};
use facetrack_core::shared::constants::BLAZEFACE_MODEL_NAME;
use facetrack_core::video::domain::chunk_encoder::ChunkEncoder;
use facetrack_core::video::infrastructure::ffmpeg_camera_source::{
    CameraConfig, FfmpegCameraSource,
};
use facetrack_core::video::infrastructure::ffmpeg_webm_encoder::{FfmpegWebmEncoder, WebmCodec};

/// Messages sent from the worker thread to the UI.
#[derive(Debug, Clone)]
pub enum WorkerMessage {
    DownloadProgress(u64, u64),
    Session(SessionEvent),
    /// The session could not start or the camera failed. Terminal.
    Error(String),
}

/// Parameters for a live session.
pub struct SessionParams {
    pub confidence: f64,
    pub camera: CameraConfig,
    pub codec: WebmCodec,
    /// `None` saves to the user's Downloads folder.
    pub output_dir: Option<PathBuf>,
}

/// UI-side end of a running session.
pub struct SessionHandle {
    messages: Receiver<WorkerMessage>,
    commands: Sender<SessionCommand>,
}

impl SessionHandle {
    /// Everything the worker sent since the last call, oldest first.
    pub fn drain(&self) -> Vec<WorkerMessage> {
        self.messages.try_iter().collect()
    }

    pub fn start_recording(&self) {
        let _ = self.commands.send(SessionCommand::StartRecording);
    }

    pub fn stop_recording(&self) {
        let _ = self.commands.send(SessionCommand::StopRecording);
    }

    pub fn shutdown(&self) {
        let _ = self.commands.send(SessionCommand::Shutdown);
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

pub fn spawn(params: SessionParams) -> SessionHandle {
    spawn_session(move |progress| build_session(params, progress))
}

/// Runs the session produced by `build` on its own thread.
fn spawn_session<F>(build: F) -> SessionHandle
where
    F: FnOnce(ProgressFn) -> Result<LiveSession, Box<dyn std::error::Error>> + Send + 'static,
{
    let (tx, rx) = crossbeam_channel::unbounded::<WorkerMessage>();
    let (command_tx, command_rx) = crossbeam_channel::unbounded::<SessionCommand>();

    thread::spawn(move || {
        if let Err(e) = run_session(&tx, command_rx, build) {
            log::error!("Live session failed: {e}");
            let _ = tx.send(WorkerMessage::Error(e.to_string()));
        }
    });

    SessionHandle {
        messages: rx,
        commands: command_tx,
    }
}

fn run_session<F>(
    tx: &Sender<WorkerMessage>,
    commands: Receiver<SessionCommand>,
    build: F,
) -> Result<(), Box<dyn std::error::Error>>
where
    F: FnOnce(ProgressFn) -> Result<LiveSession, Box<dyn std::error::Error>>,
{
    let progress_tx = tx.clone();
    let progress: ProgressFn = Box::new(move |downloaded, total| {
        let _ = progress_tx.send(WorkerMessage::DownloadProgress(downloaded, total));
    });
    let session = build(progress)?;

    let (event_tx, event_rx) = crossbeam_channel::unbounded::<SessionEvent>();
    let forward_tx = tx.clone();
    let forwarder = thread::spawn(move || {
        for event in event_rx {
            if forward_tx.send(WorkerMessage::Session(event)).is_err() {
                break;
            }
        }
    });

    let result = session.run(commands, event_tx);
    // The session dropped its sender, so the forwarder is finishing.
    let _ = forwarder.join();
    result.map_err(Into::into)
}

fn build_session(
    params: SessionParams,
    progress: ProgressFn,
) -> Result<LiveSession, Box<dyn std::error::Error>> {
    let location = ModelLocation::new(BLAZEFACE_MODEL_NAME);
    let detector = OnnxBlazefaceDetector::initialize(&location, params.confidence, Some(progress))?;

    let sink: Box<dyn DownloadSink> = match params.output_dir {
        Some(dir) => Box::new(DirectoryDownloadSink::new(dir)),
        None => Box::new(DirectoryDownloadSink::user_downloads()),
    };
    let codec = params.codec;

    Ok(LiveSession::new(
        SessionConfig::default(),
        Box::new(detector),
        Box::new(FfmpegCameraSource::new(params.camera)),
        Box::new(move || Box::new(FfmpegWebmEncoder::new(codec)) as Box<dyn ChunkEncoder>),
        sink,
        Box::new(session_logger()),
    ))
}

/// The UI shows progress itself; `log` output still reports failures.
fn session_logger() -> NullSessionLogger {
    NullSessionLogger
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    use facetrack_core::detection::domain::face_detector::FaceDetector;
    use facetrack_core::shared::bounding_box::BoundingBox;
    use facetrack_core::shared::frame::{Frame, FrameSize};
    use facetrack_core::video::domain::capture_source::{CaptureError, CaptureSource};
    use facetrack_core::video::domain::chunk_encoder::EncoderError;

    struct NoFaces;

    impl FaceDetector for NoFaces {
        fn detect(
            &mut self,
            _frame: &Frame,
        ) -> Result<Vec<BoundingBox>, Box<dyn std::error::Error>> {
            Ok(Vec::new())
        }
    }

    /// Delivers `frames` gray frames, then ends. `denied` fails `open`.
    struct ShortCamera {
        frames: usize,
        denied: bool,
    }

    impl CaptureSource for ShortCamera {
        fn open(&mut self) -> Result<(), CaptureError> {
            if self.denied {
                return Err(CaptureError::PermissionDenied);
            }
            Ok(())
        }

        fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
            if self.frames == 0 {
                return Ok(None);
            }
            self.frames -= 1;
            std::thread::sleep(Duration::from_millis(5));
            Ok(Some(Frame::filled(FrameSize::new(32, 24), [90, 90, 90], 0)))
        }

        fn close(&mut self) {}
    }

    struct NeverUsedEncoder;

    impl ChunkEncoder for NeverUsedEncoder {
        fn open(&mut self, _size: FrameSize, _fps: u32) -> Result<(), EncoderError> {
            Err(EncoderError::Unsupported("test encoder".into()))
        }

        fn encode(&mut self, _frame: &Frame) -> Result<Vec<Vec<u8>>, EncoderError> {
            Ok(Vec::new())
        }

        fn finish(&mut self) -> Result<Vec<Vec<u8>>, EncoderError> {
            Ok(Vec::new())
        }
    }

    fn fake_session(camera: ShortCamera, dir: PathBuf) -> LiveSession {
        LiveSession::new(
            SessionConfig::default(),
            Box::new(NoFaces),
            Box::new(camera),
            Box::new(|| Box::new(NeverUsedEncoder) as Box<dyn ChunkEncoder>),
            Box::new(DirectoryDownloadSink::new(dir)),
            Box::new(session_logger()),
        )
    }

    fn collect_until_done(handle: &SessionHandle) -> Vec<WorkerMessage> {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut seen = Vec::new();
        while Instant::now() < deadline {
            for message in handle.drain() {
                let done = matches!(
                    message,
                    WorkerMessage::Error(_) | WorkerMessage::Session(SessionEvent::Ended)
                );
                seen.push(message);
                if done {
                    return seen;
                }
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        seen
    }

    #[test]
    fn test_forwards_session_events_until_camera_ends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_path_buf();
        let handle = spawn_session(move |_| {
            Ok(fake_session(
                ShortCamera {
                    frames: 20,
                    denied: false,
                },
                path,
            ))
        });

        let seen = collect_until_done(&handle);
        assert!(seen
            .iter()
            .any(|m| matches!(m, WorkerMessage::Session(SessionEvent::Running(_)))));
        assert!(matches!(
            seen.last(),
            Some(WorkerMessage::Session(SessionEvent::Ended))
        ));
    }

    #[test]
    fn test_denied_camera_reports_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_path_buf();
        let handle = spawn_session(move |_| {
            Ok(fake_session(
                ShortCamera {
                    frames: 0,
                    denied: true,
                },
                path,
            ))
        });

        match collect_until_done(&handle).last() {
            Some(WorkerMessage::Error(message)) => assert!(message.contains("permission")),
            other => panic!("expected an error, got {other:?}"),
        }
    }

    #[test]
    fn test_build_failure_reports_error_and_progress() {
        let handle = spawn_session(|progress| {
            progress(512, 1024);
            Err("model unavailable".into())
        });

        let seen = collect_until_done(&handle);
        assert!(matches!(
            seen.first(),
            Some(WorkerMessage::DownloadProgress(512, 1024))
        ));
        assert!(matches!(seen.last(), Some(WorkerMessage::Error(m)) if m == "model unavailable"));
    }
}
