use iced::border::Border;
use iced::widget::{button, column, container, image, row, stack, text, Space};
use iced::{Alignment, Color, ContentFit, Element, Length, Theme};

use crate::app::{scaled, LiveView, Message, SessionStatus};
use crate::theme::{muted_color, video_backdrop};
use crate::widgets::record_button;

pub fn view<'a>(
    fs: f32,
    status: &SessionStatus,
    live: &LiveView,
    record_hovered: bool,
) -> Element<'a, Message> {
    let video_pane = video_pane(fs, status, live);

    let on_record = status.is_running().then_some(Message::ToggleRecording);
    let record = record_button::record_button(
        live.ui.recording,
        scaled(14.0, fs),
        on_record,
        record_hovered,
        Message::RecordHovered,
    );

    let mut controls = row![face_badge(fs, live), Space::new().width(Length::Fill), record]
        .spacing(12)
        .align_y(Alignment::Center);

    if status.is_finished() {
        controls = controls.push(
            button(text("Restart camera").size(scaled(13.0, fs)))
                .on_press(Message::RestartSession)
                .style(button::secondary)
                .padding([8, 16]),
        );
    }

    let mut content = column![video_pane, Space::new().height(12), controls].spacing(0);

    if let Some(ref error) = live.recording_error {
        content = content.push(Space::new().height(8)).push(
            text(format!("Recording failed: {error}"))
                .size(scaled(13.0, fs))
                .style(text::danger),
        );
    }

    if let Some(ref path) = live.last_recording {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        content = content.push(Space::new().height(8)).push(
            row![
                text(format!("Saved {name}")).size(scaled(13.0, fs)),
                button(text("Open").size(scaled(13.0, fs)))
                    .on_press(Message::OpenRecording)
                    .style(button::text),
            ]
            .spacing(8)
            .align_y(Alignment::Center),
        );
    }

    content.height(Length::Fill).into()
}

/// The video frame with the detection overlay layered on top. Both layers
/// are letterboxed the same way, so boxes stay aligned with faces.
fn video_pane<'a>(fs: f32, status: &SessionStatus, live: &LiveView) -> Element<'a, Message> {
    let inner: Element<'a, Message> = match (&live.video, &live.overlay) {
        (Some(video), Some(overlay)) => stack![
            image(video.clone())
                .content_fit(ContentFit::Contain)
                .width(Length::Fill)
                .height(Length::Fill),
            image(overlay.clone())
                .content_fit(ContentFit::Contain)
                .width(Length::Fill)
                .height(Length::Fill),
        ]
        .into(),
        _ => placeholder(fs, status),
    };

    container(inner)
        .width(Length::Fill)
        .height(Length::Fill)
        .center_x(Length::Fill)
        .center_y(Length::Fill)
        .style(|theme: &Theme| container::Style {
            background: Some(iced::Background::Color(video_backdrop(theme))),
            border: Border {
                radius: 12.0.into(),
                ..Border::default()
            },
            ..container::Style::default()
        })
        .into()
}

fn placeholder<'a>(fs: f32, status: &SessionStatus) -> Element<'a, Message> {
    let (headline, detail) = status_lines(status);
    let mut lines = column![text(headline).size(scaled(17.0, fs))].align_x(Alignment::Center);
    if let Some(detail) = detail {
        lines = lines.push(Space::new().height(6)).push(
            text(detail)
                .size(scaled(13.0, fs))
                .style(|theme: &Theme| text::Style {
                    color: Some(muted_color(theme)),
                }),
        );
    }
    lines.into()
}

/// Headline and optional detail for the empty video pane.
pub fn status_lines(status: &SessionStatus) -> (String, Option<String>) {
    match status {
        SessionStatus::Starting(Some((done, total))) if *total > 0 => (
            "Downloading face detection model...".into(),
            Some(format!("{}%", done * 100 / total)),
        ),
        SessionStatus::Starting(Some((done, _))) => (
            "Downloading face detection model...".into(),
            Some(format!("{} KB", done / 1024)),
        ),
        SessionStatus::Starting(None) => ("Loading...".into(), None),
        SessionStatus::Running => ("Waiting for the first frame...".into(), None),
        SessionStatus::Ended => (
            "Camera stopped".into(),
            Some("The camera stream ended.".into()),
        ),
        SessionStatus::Failed(message) => ("Camera unavailable".into(), Some(message.clone())),
    }
}

fn face_badge<'a>(fs: f32, live: &LiveView) -> Element<'a, Message> {
    let count = live.ui.face_count;
    container(text(live.ui.face_label()).size(scaled(13.0, fs)))
        .padding([6, 12])
        .style(move |theme: &Theme| {
            let palette = theme.extended_palette();
            let accent = if count > 0 {
                palette.primary.base.color
            } else {
                palette.background.base.text
            };
            container::Style {
                background: Some(iced::Background::Color(Color { a: 0.12, ..accent })),
                border: Border {
                    radius: 100.0.into(),
                    ..Border::default()
                },
                text_color: Some(accent),
                ..container::Style::default()
            }
        })
        .into()
}
