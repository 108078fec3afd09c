use std::path::PathBuf;
use std::time::Duration;

use iced::widget::{button, column, container, image, row, scrollable, text};
use iced::{window, Element, Length, Subscription, Task, Theme};

use facetrack_core::pipeline::live_session::{FrameSnapshot, SessionEvent};
use facetrack_core::shared::constants::DISPLAY_REFRESH_HZ;
use facetrack_core::shared::frame::Frame;
use facetrack_core::shared::ui_state::UiState;

use crate::settings::{Appearance, RecordingCodec, Settings};
use crate::tabs;
use crate::theme;
use crate::workers::session_worker::{self, SessionHandle, SessionParams, WorkerMessage};

// ---------------------------------------------------------------------------
// Tab enum
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Live,
    Settings,
    Appearance,
    About,
}

impl Tab {
    const ALL: &[Tab] = &[Tab::Live, Tab::Settings, Tab::Appearance, Tab::About];

    fn label(self) -> &'static str {
        match self {
            Tab::Live => "Live",
            Tab::Settings => "Settings",
            Tab::Appearance => "Appearance",
            Tab::About => "About",
        }
    }
}

// ---------------------------------------------------------------------------
// Session state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum SessionStatus {
    /// Model resolving or camera opening. Carries download progress.
    Starting(Option<(u64, u64)>),
    Running,
    Ended,
    Failed(String),
}

impl SessionStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, SessionStatus::Running)
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, SessionStatus::Ended | SessionStatus::Failed(_))
    }
}

/// What the live tab shows: the latest video frame and the overlay drawn
/// for it, as separate image layers.
#[derive(Default)]
pub struct LiveView {
    pub video: Option<image::Handle>,
    pub overlay: Option<image::Handle>,
    pub ui: UiState,
    pub last_recording: Option<PathBuf>,
    pub recording_error: Option<String>,
}

impl LiveView {
    fn show(&mut self, snapshot: &FrameSnapshot) {
        let video = &snapshot.video;
        self.video = Some(image::Handle::from_rgba(
            video.width(),
            video.height(),
            rgba_pixels(video),
        ));
        let size = snapshot.overlay.size();
        self.overlay = Some(image::Handle::from_rgba(
            size.width,
            size.height,
            snapshot.overlay.pixels().to_vec(),
        ));
        self.ui = snapshot.ui.clone();
    }
}

/// Expands an RGB frame to opaque RGBA.
pub fn rgba_pixels(frame: &Frame) -> Vec<u8> {
    let channels = frame.channels() as usize;
    if channels == 4 {
        return frame.data().to_vec();
    }
    let mut out = Vec::with_capacity(frame.data().len() / channels.max(1) * 4);
    for px in frame.data().chunks_exact(channels.max(1)) {
        match px {
            [r, g, b, ..] => out.extend_from_slice(&[*r, *g, *b, 0xff]),
            [v, ..] => out.extend_from_slice(&[*v, *v, *v, 0xff]),
            [] => {}
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum Message {
    TabSelected(Tab),
    PollSession,
    ToggleRecording,
    RecordHovered(bool),
    OpenRecording,
    RestartSession,
    ConfidenceChanged(u32),
    CodecChanged(RecordingCodec),
    DeviceChanged(String),
    InputFormatChanged(String),
    SelectOutputDir,
    OutputDirSelected(Option<PathBuf>),
    RestoreDefaults,
    AppearanceChanged(Appearance),
    HighContrastChanged(bool),
    FontScaleChanged(f32),
    PollSystemTheme,
    CloseRequested(window::Id),
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

pub struct App {
    active_tab: Tab,
    pub settings: Settings,
    session: Option<SessionHandle>,
    pub status: SessionStatus,
    pub live: LiveView,
    pub record_hovered: bool,
    /// Set once the window asked to close while a session was running.
    closing: Option<window::Id>,
}

impl App {
    pub fn new() -> (Self, Task<Message>) {
        let mut app = Self {
            active_tab: Tab::Live,
            settings: Settings::load(),
            session: None,
            status: SessionStatus::Starting(None),
            live: LiveView::default(),
            record_hovered: false,
            closing: None,
        };
        app.start_session();
        (app, Task::none())
    }

    fn start_session(&mut self) {
        let params = SessionParams {
            confidence: self.settings.confidence_threshold(),
            camera: self.settings.camera_config(),
            codec: self.settings.codec.webm(),
            output_dir: self.settings.output_dir.clone(),
        };
        log::info!(
            "Starting session on {} ({})",
            params.camera.device,
            params.camera.input_format
        );
        self.live = LiveView {
            last_recording: self.live.last_recording.take(),
            ..LiveView::default()
        };
        self.status = SessionStatus::Starting(None);
        self.session = Some(session_worker::spawn(params));
    }

    pub fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::TabSelected(tab) => {
                self.active_tab = tab;
            }
            Message::PollSession => return self.poll_session(),
            Message::ToggleRecording => {
                if let Some(ref session) = self.session {
                    if self.live.ui.recording {
                        session.stop_recording();
                    } else if self.status.is_running() {
                        self.live.recording_error = None;
                        session.start_recording();
                    }
                }
            }
            Message::RecordHovered(hovered) => {
                self.record_hovered = hovered;
            }
            Message::OpenRecording => {
                if let Some(ref path) = self.live.last_recording {
                    if let Err(e) = open::that(path) {
                        log::warn!("Could not open {}: {e}", path.display());
                    }
                }
            }
            Message::RestartSession => {
                if let Some(session) = self.session.take() {
                    session.shutdown();
                }
                self.start_session();
            }
            Message::ConfidenceChanged(val) => {
                self.settings.confidence = val;
                self.settings.save();
            }
            Message::CodecChanged(codec) => {
                self.settings.codec = codec;
                self.settings.save();
            }
            Message::DeviceChanged(device) => {
                self.settings.device = device;
                self.settings.save();
            }
            Message::InputFormatChanged(format) => {
                self.settings.input_format = format;
                self.settings.save();
            }
            Message::SelectOutputDir => {
                let start_dir = self.settings.output_dir.clone();
                return Task::perform(
                    async move {
                        let mut dialog =
                            rfd::AsyncFileDialog::new().set_title("Save recordings to");
                        if let Some(dir) = start_dir {
                            dialog = dialog.set_directory(dir);
                        }
                        dialog.pick_folder().await.map(|h| h.path().to_path_buf())
                    },
                    Message::OutputDirSelected,
                );
            }
            Message::OutputDirSelected(Some(dir)) => {
                self.settings.output_dir = Some(dir);
                self.settings.save();
            }
            Message::OutputDirSelected(None) => {}
            Message::RestoreDefaults => {
                self.settings.restore_session_defaults();
                self.settings.save();
            }
            Message::AppearanceChanged(appearance) => {
                self.settings.appearance = appearance;
                self.settings.save();
            }
            Message::HighContrastChanged(enabled) => {
                self.settings.high_contrast = enabled;
                self.settings.save();
            }
            Message::FontScaleChanged(scale) => {
                self.settings.font_scale = scale;
                self.settings.save();
            }
            Message::PollSystemTheme => {
                // Theme is resolved fresh in theme() on every render,
                // so just requesting a redraw is enough.
            }
            Message::CloseRequested(id) => match self.session {
                Some(ref session) if !self.status.is_finished() => {
                    // Let an active recording finalize before the window goes.
                    session.shutdown();
                    self.closing = Some(id);
                }
                _ => return window::close(id),
            },
        }
        Task::none()
    }

    fn poll_session(&mut self) -> Task<Message> {
        let Some(ref session) = self.session else {
            return Task::none();
        };

        // Only the newest frame is worth uploading.
        let mut latest: Option<Box<FrameSnapshot>> = None;
        for message in session.drain() {
            match message {
                WorkerMessage::DownloadProgress(done, total) => {
                    self.status = SessionStatus::Starting(Some((done, total)));
                }
                WorkerMessage::Session(SessionEvent::Running(size)) => {
                    log::info!("Camera running at {size}");
                    self.status = SessionStatus::Running;
                }
                WorkerMessage::Session(SessionEvent::Frame(snapshot)) => latest = Some(snapshot),
                WorkerMessage::Session(SessionEvent::RecordingStarted) => {
                    self.live.ui.recording = true;
                }
                WorkerMessage::Session(SessionEvent::RecordingSaved(path)) => {
                    log::info!("Recording saved to {}", path.display());
                    self.live.ui.recording = false;
                    self.live.last_recording = Some(path);
                }
                WorkerMessage::Session(SessionEvent::RecordingFailed(message)) => {
                    self.live.ui.recording = false;
                    self.live.recording_error = Some(message);
                }
                WorkerMessage::Session(SessionEvent::Ended) => {
                    if !matches!(self.status, SessionStatus::Failed(_)) {
                        self.status = SessionStatus::Ended;
                    }
                    self.live.ui.recording = false;
                }
                WorkerMessage::Error(message) => {
                    self.status = SessionStatus::Failed(message);
                    self.live.ui.recording = false;
                }
            }
        }
        if let Some(snapshot) = latest {
            self.live.show(&snapshot);
        }

        match self.closing {
            Some(id) if self.status.is_finished() => window::close(id),
            _ => Task::none(),
        }
    }

    pub fn view(&self) -> Element<'_, Message> {
        let fs = self.settings.font_scale;

        // Tab bar
        let tab_bar = row(Tab::ALL
            .iter()
            .map(|&tab| {
                let label = text(tab.label()).size(scaled(13.0, fs));
                let btn = button(label)
                    .on_press(Message::TabSelected(tab))
                    .padding([6, 14]);
                if tab == self.active_tab {
                    btn.style(button::primary).into()
                } else {
                    btn.style(button::text).into()
                }
            })
            .collect::<Vec<_>>())
        .spacing(2);

        // Tab content
        let content: Element<'_, Message> = match self.active_tab {
            Tab::Live => {
                tabs::live_tab::view(fs, &self.status, &self.live, self.record_hovered)
            }
            Tab::Settings => scrollable(tabs::settings_tab::view(&self.settings))
                .height(Length::Fill)
                .into(),
            Tab::Appearance => scrollable(tabs::appearance_tab::view(&self.settings))
                .height(Length::Fill)
                .into(),
            Tab::About => scrollable(tabs::about_tab::view(fs))
                .height(Length::Fill)
                .into(),
        };

        let tab_content = container(content).padding(16).height(Length::Fill);

        column![tab_bar, tab_content]
            .spacing(0)
            .height(Length::Fill)
            .into()
    }

    pub fn theme(&self) -> Theme {
        theme::resolve_theme(self.settings.appearance, self.settings.high_contrast)
    }

    pub fn subscription(&self) -> Subscription<Message> {
        let mut subscriptions = vec![window::close_requests().map(Message::CloseRequested)];
        if self.session.is_some() && !self.status.is_finished() {
            let refresh = Duration::from_millis(1000 / u64::from(DISPLAY_REFRESH_HZ));
            subscriptions.push(iced::time::every(refresh).map(|_| Message::PollSession));
        }
        if self.settings.appearance == Appearance::System {
            subscriptions
                .push(iced::time::every(Duration::from_secs(2)).map(|_| Message::PollSystemTheme));
        }
        Subscription::batch(subscriptions)
    }
}

/// Scale a base font size by the user's font_scale setting.
pub fn scaled(base: f32, font_scale: f32) -> f32 {
    (base * font_scale).round()
}

#[cfg(test)]
mod tests {
    use super::*;
    use facetrack_core::shared::frame::FrameSize;

    #[test]
    fn test_rgba_pixels_adds_opaque_alpha() {
        let frame = Frame::new(vec![1, 2, 3, 4, 5, 6], 2, 1, 3, 0);
        assert_eq!(rgba_pixels(&frame), vec![1, 2, 3, 255, 4, 5, 6, 255]);
    }

    #[test]
    fn test_rgba_pixels_expands_gray() {
        let frame = Frame::new(vec![9, 200], 2, 1, 1, 0);
        assert_eq!(rgba_pixels(&frame), vec![9, 9, 9, 255, 200, 200, 200, 255]);
    }

    #[test]
    fn test_rgba_pixels_length_matches_frame() {
        let frame = Frame::filled(FrameSize::new(64, 48), [10, 20, 30], 0);
        assert_eq!(rgba_pixels(&frame).len(), 64 * 48 * 4);
    }

    #[test]
    fn test_session_status_flags() {
        assert!(SessionStatus::Running.is_running());
        assert!(!SessionStatus::Starting(None).is_finished());
        assert!(SessionStatus::Ended.is_finished());
        assert!(SessionStatus::Failed("camera permission denied".into()).is_finished());
    }

    #[test]
    fn test_scaled_rounds() {
        assert_eq!(scaled(13.0, 1.0), 13.0);
        assert_eq!(scaled(13.0, 1.25), 16.0);
    }
}
