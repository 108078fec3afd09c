use iced::widget::{column, text, Space};
use iced::Element;

use crate::app::{scaled, Message};

pub fn view(fs: f32) -> Element<'static, Message> {
    let version = env!("CARGO_PKG_VERSION");

    column![
        text("FaceTrack").size(scaled(22.0, fs)),
        Space::new().height(4),
        text(format!("Version {version}")).size(scaled(13.0, fs)),
        Space::new().height(12),
        text(
            "Shows your camera with a box around every detected face, and can \
             record the annotated video as a WebM file."
        )
        .size(scaled(13.0, fs)),
        Space::new().height(20),
        text("Privacy").size(scaled(16.0, fs)),
        Space::new().height(8),
        text(
            "Face detection runs on this computer. Camera frames are never \
             uploaded. The only network request is the one-time download of \
             the detection model."
        )
        .size(scaled(13.0, fs)),
        Space::new().height(8),
        text("Recordings are written only to the folder chosen in Settings.")
            .size(scaled(13.0, fs)),
    ]
    .spacing(0)
    .into()
}
