use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::Parser;
use crossbeam_channel::{never, select, Receiver};

use facetrack_core::detection::domain::face_detector::FaceDetector;
use facetrack_core::detection::infrastructure::model_resolver::ModelLocation;
use facetrack_core::detection::infrastructure::onnx_blazeface_detector::{
    OnnxBlazefaceDetector, DEFAULT_CONFIDENCE,
};
use facetrack_core::pipeline::live_session::{
    FrameSnapshot, LiveSession, SessionCommand, SessionConfig, SessionEvent,
};
use facetrack_core::pipeline::session_logger::StdoutSessionLogger;
use facetrack_core::recording::download_sink::{DirectoryDownloadSink, DownloadSink};
use facetrack_core::render::snapshot_writer;
use facetrack_core::shared::constants::BLAZEFACE_MODEL_NAME;
use facetrack_core::video::domain::chunk_encoder::{ChunkEncoder, EncoderFactory};
use facetrack_core::video::infrastructure::ffmpeg_camera_source::{
    CameraConfig, FfmpegCameraSource,
};
use facetrack_core::video::infrastructure::ffmpeg_webm_encoder::{FfmpegWebmEncoder, WebmCodec};

/// Live camera face detection with optional WebM recording.
#[derive(Parser)]
#[command(name = "facetrack")]
struct Cli {
    /// Camera device (e.g. /dev/video0, 0, "video=Integrated Camera").
    #[arg(long)]
    device: Option<String>,

    /// libavdevice input format (v4l2, avfoundation, dshow).
    #[arg(long)]
    input_format: Option<String>,

    /// Explicit path to the BlazeFace ONNX model.
    #[arg(long)]
    model: Option<PathBuf>,

    /// URL to download the model from when it is not found locally.
    #[arg(long)]
    model_url: Option<String>,

    /// Face detection confidence threshold (0.0-1.0).
    #[arg(long, default_value_t = DEFAULT_CONFIDENCE)]
    confidence: f64,

    /// Record this many seconds once the camera is streaming.
    #[arg(long)]
    record_seconds: Option<u64>,

    /// Stop the session after this many seconds.
    #[arg(long)]
    duration: Option<u64>,

    /// Directory for recordings (default: the user's Downloads folder).
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Recording codec: vp9 or vp8.
    #[arg(long, default_value = "vp9")]
    codec: WebmCodec,

    /// Save the last annotated frame as a PNG when the session ends.
    #[arg(long)]
    snapshot: Option<PathBuf>,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let detector = build_detector(&cli)?;
    let source = Box::new(FfmpegCameraSource::new(camera_config(&cli)));
    let sink: Box<dyn DownloadSink> = match cli.output_dir {
        Some(ref dir) => Box::new(DirectoryDownloadSink::new(dir)),
        None => Box::new(DirectoryDownloadSink::user_downloads()),
    };

    let config = SessionConfig {
        max_duration: cli.duration.map(Duration::from_secs),
        ..SessionConfig::default()
    };
    let session = LiveSession::new(
        config,
        detector,
        source,
        encoder_factory(cli.codec),
        sink,
        Box::new(StdoutSessionLogger::default()),
    );

    let (command_tx, command_rx) = crossbeam_channel::unbounded();
    let (event_tx, event_rx) = crossbeam_channel::unbounded();
    let handle = std::thread::spawn(move || session.run(command_rx, event_tx));

    let mut plan = RecordingPlan::new(cli.record_seconds.map(Duration::from_secs), cli.duration);
    let mut stop_timer: Receiver<std::time::Instant> = never();
    let mut last_snapshot: Option<Box<FrameSnapshot>> = None;

    loop {
        select! {
            recv(event_rx) -> event => {
                let Ok(event) = event else { break };
                match plan.on_event(&event) {
                    Reaction::Continue => {}
                    Reaction::Record(duration) => {
                        let _ = command_tx.send(SessionCommand::StartRecording);
                        stop_timer = crossbeam_channel::after(duration);
                    }
                    Reaction::Shutdown => {
                        stop_timer = never();
                        let _ = command_tx.send(SessionCommand::Shutdown);
                    }
                    Reaction::Exit => break,
                }
                if let SessionEvent::Frame(snapshot) = event {
                    last_snapshot = Some(snapshot);
                }
            },
            recv(stop_timer) -> _ => {
                stop_timer = never();
                let _ = command_tx.send(SessionCommand::StopRecording);
            }
        }
    }

    handle
        .join()
        .map_err(|_| "session thread panicked")??;

    if let (Some(path), Some(snapshot)) = (cli.snapshot.as_deref(), last_snapshot) {
        snapshot_writer::write_png(path, &snapshot.composited())?;
        log::info!("Snapshot written to {}", path.display());
    }

    match plan.failure {
        Some(message) => Err(format!("Recording failed: {message}").into()),
        None => Ok(()),
    }
}

/// What the main loop should do after a session event.
#[derive(Debug, PartialEq, Eq)]
enum Reaction {
    Continue,
    /// Start recording now and stop after the given time.
    Record(Duration),
    Shutdown,
    Exit,
}

/// Drives the `--record-seconds` / `--duration` combination.
struct RecordingPlan {
    record_for: Option<Duration>,
    /// Without `--duration` the session lives only as long as the recording.
    shutdown_after_recording: bool,
    failure: Option<String>,
}

impl RecordingPlan {
    fn new(record_for: Option<Duration>, duration: Option<u64>) -> Self {
        Self {
            record_for,
            shutdown_after_recording: record_for.is_some() && duration.is_none(),
            failure: None,
        }
    }

    fn on_event(&mut self, event: &SessionEvent) -> Reaction {
        match event {
            SessionEvent::Running(size) => {
                log::info!("Camera running at {size}");
                self.record_for.map_or(Reaction::Continue, Reaction::Record)
            }
            SessionEvent::Frame(_) => Reaction::Continue,
            SessionEvent::RecordingStarted => {
                eprintln!("Recording...");
                Reaction::Continue
            }
            SessionEvent::RecordingSaved(path) => {
                eprintln!("Recording saved to {}", path.display());
                self.after_recording()
            }
            SessionEvent::RecordingFailed(message) => {
                eprintln!("Recording failed: {message}");
                if self.record_for.is_none() {
                    return Reaction::Continue;
                }
                self.failure = Some(message.clone());
                self.after_recording()
            }
            SessionEvent::Ended => Reaction::Exit,
        }
    }

    fn after_recording(&self) -> Reaction {
        if self.shutdown_after_recording {
            Reaction::Shutdown
        } else {
            Reaction::Continue
        }
    }
}

fn build_detector(cli: &Cli) -> Result<Box<dyn FaceDetector>, Box<dyn std::error::Error>> {
    log::info!("Resolving model: {BLAZEFACE_MODEL_NAME}");
    let location = ModelLocation::new(BLAZEFACE_MODEL_NAME)
        .with_explicit(cli.model.clone())
        .with_url(cli.model_url.clone());
    let detector = OnnxBlazefaceDetector::initialize(
        &location,
        cli.confidence,
        Some(Box::new(download_progress)),
    )?;
    Ok(Box::new(detector))
}

fn camera_config(cli: &Cli) -> CameraConfig {
    let defaults = CameraConfig::default();
    CameraConfig {
        input_format: cli.input_format.clone().unwrap_or(defaults.input_format),
        device: cli.device.clone().unwrap_or(defaults.device),
        ..defaults
    }
}

fn encoder_factory(codec: WebmCodec) -> EncoderFactory {
    Box::new(move || Box::new(FfmpegWebmEncoder::new(codec)) as Box<dyn ChunkEncoder>)
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !(0.0..=1.0).contains(&cli.confidence) {
        return Err(format!(
            "Confidence must be between 0.0 and 1.0, got {}",
            cli.confidence
        )
        .into());
    }
    if let Some(ref model) = cli.model {
        if !model.is_file() {
            return Err(format!("Model file not found: {}", model.display()).into());
        }
    }
    if cli.record_seconds == Some(0) {
        return Err("--record-seconds must be at least 1".into());
    }
    if let (Some(record), Some(duration)) = (cli.record_seconds, cli.duration) {
        if record > duration {
            return Err(format!(
                "--record-seconds ({record}) cannot exceed --duration ({duration})"
            )
            .into());
        }
    }
    if let Some(ref path) = cli.snapshot {
        let is_png = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("png"));
        if !is_png {
            return Err(format!("Snapshot must be a .png file, got {}", path.display()).into());
        }
    }
    Ok(())
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading face detection model... {pct}%");
    } else {
        eprint!("\rDownloading face detection model... {downloaded} bytes");
    }
}
