use iced::widget::{button, column, pick_list, row, slider, text, text_input, Space};
use iced::{Alignment, Element};

use crate::app::{scaled, Message};
use crate::settings::{RecordingCodec, Settings};

pub fn view<'a>(settings: &Settings) -> Element<'a, Message> {
    let fs = settings.font_scale;
    let output_label = match settings.output_dir {
        Some(ref dir) => dir.display().to_string(),
        None => "Downloads folder".to_string(),
    };

    column![
        text("Detection").size(scaled(16.0, fs)),
        Space::new().height(8),
        row![
            text("Confidence").size(scaled(13.0, fs)),
            slider(10..=95, settings.confidence, Message::ConfidenceChanged),
            text(format!("{}%", settings.confidence)).size(scaled(13.0, fs)),
        ]
        .spacing(12)
        .align_y(Alignment::Center),
        Space::new().height(20),
        text("Camera").size(scaled(16.0, fs)),
        Space::new().height(8),
        row![
            text("Device").size(scaled(13.0, fs)),
            text_input("Platform default", &settings.device)
                .on_input(Message::DeviceChanged)
                .size(scaled(13.0, fs)),
        ]
        .spacing(12)
        .align_y(Alignment::Center),
        Space::new().height(8),
        row![
            text("Input format").size(scaled(13.0, fs)),
            text_input("Platform default", &settings.input_format)
                .on_input(Message::InputFormatChanged)
                .size(scaled(13.0, fs)),
        ]
        .spacing(12)
        .align_y(Alignment::Center),
        Space::new().height(20),
        text("Recording").size(scaled(16.0, fs)),
        Space::new().height(8),
        row![
            text("Codec").size(scaled(13.0, fs)),
            pick_list(RecordingCodec::ALL, Some(settings.codec), Message::CodecChanged)
                .text_size(scaled(13.0, fs)),
        ]
        .spacing(12)
        .align_y(Alignment::Center),
        Space::new().height(8),
        row![
            text("Save to").size(scaled(13.0, fs)),
            text(output_label).size(scaled(13.0, fs)),
            button(text("Choose...").size(scaled(13.0, fs)))
                .on_press(Message::SelectOutputDir)
                .style(button::secondary)
                .padding([6, 12]),
        ]
        .spacing(12)
        .align_y(Alignment::Center),
        Space::new().height(20),
        text("Changes take effect when the camera restarts.").size(scaled(12.0, fs)),
        Space::new().height(12),
        row![
            button(text("Restart camera").size(scaled(13.0, fs)))
                .on_press(Message::RestartSession)
                .padding([8, 16]),
            button(text("Restore defaults").size(scaled(13.0, fs)))
                .on_press(Message::RestoreDefaults)
                .style(button::secondary)
                .padding([8, 16]),
        ]
        .spacing(12),
    ]
    .spacing(0)
    .into()
}
