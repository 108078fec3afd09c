use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crossbeam_channel::{select, Sender};
use thiserror::Error;

use crate::recording::download_sink::{recording_file_name, DownloadSink};
use crate::recording::recording_session::RecordingSession;
use crate::render::render_targets::{lock_surface, SharedSurface};
use crate::shared::constants::RECORDING_FPS;
use crate::shared::ui_state::UiStateHandle;
use crate::video::domain::chunk_encoder::{EncoderError, EncoderFactory};

/// Failures local to one recording attempt; detection keeps running.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecorderError {
    #[error("recording is not supported: {0}")]
    Unsupported(String),
    #[error("a recording is already in progress")]
    AlreadyRecording,
    #[error("encoder error: {0}")]
    Encoder(String),
    #[error("could not deliver recording: {0}")]
    Delivery(String),
}

impl From<EncoderError> for RecorderError {
    fn from(e: EncoderError) -> Self {
        match e {
            EncoderError::Unsupported(reason) => RecorderError::Unsupported(reason),
            EncoderError::Failed(reason) => RecorderError::Encoder(reason),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecorderState {
    Inactive,
    Active,
    Finalizing,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecorderConfig {
    /// Capture surface sample rate.
    pub fps: u32,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self { fps: RECORDING_FPS }
    }
}

struct Sampler {
    stop_tx: Sender<()>,
    handle: JoinHandle<Result<(), EncoderError>>,
}

/// Records the capture surface into a single video file.
///
/// While active, a sampler thread reads the capture surface at a fixed
/// rate and feeds the encoder; emitted chunks are appended to the current
/// [`RecordingSession`] in arrival order. Stopping flushes the encoder,
/// concatenates the chunks and hands the blob to the download sink.
pub struct Recorder {
    state: RecorderState,
    config: RecorderConfig,
    capture: SharedSurface,
    encoder_factory: EncoderFactory,
    sink: Box<dyn DownloadSink>,
    session: Arc<Mutex<RecordingSession>>,
    sampler: Option<Sampler>,
    ui: UiStateHandle,
}

impl Recorder {
    pub fn new(
        config: RecorderConfig,
        capture: SharedSurface,
        encoder_factory: EncoderFactory,
        sink: Box<dyn DownloadSink>,
        ui: UiStateHandle,
    ) -> Self {
        Self {
            state: RecorderState::Inactive,
            config,
            capture,
            encoder_factory,
            sink,
            session: Arc::new(Mutex::new(RecordingSession::new())),
            sampler: None,
            ui,
        }
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == RecorderState::Active
    }

    /// Chunks buffered for the current recording.
    pub fn chunk_count(&self) -> usize {
        lock_session(&self.session).chunk_count()
    }

    pub fn start(&mut self) -> Result<(), RecorderError> {
        if self.state != RecorderState::Inactive {
            return Err(RecorderError::AlreadyRecording);
        }

        let size = lock_surface(&self.capture).size();
        if size.is_empty() {
            return Err(RecorderError::Encoder(format!(
                "capture surface is {size}, nothing to record"
            )));
        }

        let mut encoder = (self.encoder_factory)();
        encoder.open(size, self.config.fps)?;

        *lock_session(&self.session) = RecordingSession::new();

        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        let capture = Arc::clone(&self.capture);
        let session = Arc::clone(&self.session);
        let period = Duration::from_secs_f64(1.0 / f64::from(self.config.fps.max(1)));

        let handle = std::thread::spawn(move || {
            let ticker = crossbeam_channel::tick(period);
            let mut index = 0usize;
            let mut failure = None;

            loop {
                select! {
                    recv(stop_rx) -> _ => break,
                    recv(ticker) -> _ => {
                        // Resampled to the size the encoder was opened with.
                        let frame = lock_surface(&capture).to_rgb_frame(size, index);
                        index += 1;
                        match encoder.encode(&frame) {
                            Ok(chunks) => lock_session(&session).extend(chunks),
                            Err(e) => {
                                log::warn!("Recording encoder failed at frame {index}: {e}");
                                failure = Some(e);
                                break;
                            }
                        }
                    }
                }
            }

            let tail = encoder.finish()?;
            lock_session(&session).extend(tail);
            log::debug!("Recording sampler stopped after {index} frames");
            failure.map_or(Ok(()), Err)
        });

        self.sampler = Some(Sampler { stop_tx, handle });
        self.state = RecorderState::Active;
        self.ui.set_recording(true);
        log::info!("Recording started at {size}");
        Ok(())
    }

    /// Finalizes a recording whose sampler exited on its own, which happens
    /// only when the encoder fails. `None` while sampling or inactive.
    pub fn poll_finished(&mut self) -> Option<Result<Option<PathBuf>, RecorderError>> {
        let exited = self
            .sampler
            .as_ref()
            .is_some_and(|sampler| sampler.handle.is_finished());
        exited.then(|| self.stop())
    }

    /// Finishes the current recording and saves it.
    ///
    /// Returns `Ok(None)` when nothing was being recorded.
    pub fn stop(&mut self) -> Result<Option<PathBuf>, RecorderError> {
        let Some(sampler) = self.sampler.take() else {
            return Ok(None);
        };
        self.state = RecorderState::Finalizing;

        let _ = sampler.stop_tx.send(());
        let sampled = match sampler.handle.join() {
            Ok(result) => result.map_err(RecorderError::from),
            Err(_) => Err(RecorderError::Encoder("recording sampler panicked".into())),
        };

        let blob = lock_session(&self.session).finalize();
        self.state = RecorderState::Inactive;
        self.ui.set_recording(false);
        sampled?;

        let file_name = recording_file_name(unix_millis());
        let path = self
            .sink
            .deliver(&file_name, &blob)
            .map_err(|e| RecorderError::Delivery(e.to_string()))?;
        Ok(Some(path))
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        if let Some(sampler) = self.sampler.take() {
            log::warn!("Recorder dropped while active; discarding recording");
            let _ = sampler.stop_tx.send(());
            let _ = sampler.handle.join();
        }
    }
}

fn lock_session(session: &Mutex<RecordingSession>) -> MutexGuard<'_, RecordingSession> {
    session.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}
