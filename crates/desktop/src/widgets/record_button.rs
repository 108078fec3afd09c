use std::time::Duration;

use iced::border::Border;
use iced::widget::{button, container, mouse_area, row, text};
use iced::{Alignment, Color, Element, Padding, Shadow, Theme, Vector};
use iced_anim::transition::Easing;
use iced_anim::AnimationBuilder;

const HOVER_DARKEN: f32 = 0.05;
const FLOAT_HEIGHT: f32 = 1.0;
const CORNER_RADIUS: f32 = 10.0;
const SHADOW_BLUR_BASE: f32 = 10.0;
const SHADOW_BLUR_HOVER: f32 = 15.0;
const SHADOW_OFFSET_Y: f32 = 3.0;
const SHADOW_ALPHA_BASE: f32 = 0.25;
const SHADOW_ALPHA_HOVER: f32 = 0.35;
const ANIMATION_DURATION: Duration = Duration::from_millis(200);

pub const START_LABEL: &str = "Start recording";
pub const STOP_LABEL: &str = "Stop recording";

pub fn label(recording: bool) -> &'static str {
    if recording {
        STOP_LABEL
    } else {
        START_LABEL
    }
}

/// The record toggle. Primary colored while idle, danger colored while
/// recording. `on_press` of `None` renders it disabled.
pub fn record_button<'a, Message: Clone + 'a>(
    recording: bool,
    text_size: f32,
    on_press: Option<Message>,
    hovered: bool,
    on_hover: impl Fn(bool) -> Message + 'a,
) -> Element<'a, Message> {
    let target = if hovered && on_press.is_some() {
        1.0_f32
    } else {
        0.0
    };

    let animated: Element<'a, Message> = AnimationBuilder::new(target, move |t: f32| {
        build_button(recording, text_size, on_press.clone(), t.clamp(0.0, 1.0))
    })
    .animates_layout(true)
    .animation(Easing::EASE_OUT.with_duration(ANIMATION_DURATION))
    .into();

    mouse_area(animated)
        .on_enter(on_hover(true))
        .on_exit(on_hover(false))
        .into()
}

fn build_button<'a, Message: Clone + 'a>(
    recording: bool,
    text_size: f32,
    on_press: Option<Message>,
    hover_amount: f32,
) -> Element<'a, Message> {
    let dot = if recording { "\u{25A0}" } else { "\u{25CF}" };
    let content = row![
        text(dot).size(text_size),
        text(label(recording)).size(text_size).color(Color::WHITE),
    ]
    .spacing(8)
    .align_y(Alignment::Center);

    let enabled = on_press.is_some();
    let btn = button(content)
        .on_press_maybe(on_press)
        .padding([10, 24])
        .style(move |theme: &Theme, status: button::Status| {
            let palette = theme.extended_palette();
            let base = if recording {
                palette.danger.base.color
            } else {
                palette.primary.base.color
            };
            let amount = if status == button::Status::Pressed {
                1.0
            } else {
                hover_amount
            };
            styled(base, amount, enabled)
        });

    let rise = hover_amount * FLOAT_HEIGHT;
    container(btn)
        .padding(Padding {
            top: FLOAT_HEIGHT - rise,
            bottom: rise,
            ..Padding::ZERO
        })
        .into()
}

fn styled(base: Color, hover_amount: f32, enabled: bool) -> button::Style {
    let t = hover_amount;
    let background = if enabled {
        darken(base, t)
    } else {
        Color { a: 0.4, ..base }
    };
    button::Style {
        background: Some(background.into()),
        text_color: Color::WHITE,
        border: Border {
            radius: CORNER_RADIUS.into(),
            ..Border::default()
        },
        shadow: Shadow {
            color: Color::from_rgba(
                base.r,
                base.g,
                base.b,
                if enabled {
                    lerp(SHADOW_ALPHA_BASE, SHADOW_ALPHA_HOVER, t)
                } else {
                    0.0
                },
            ),
            offset: Vector::new(0.0, SHADOW_OFFSET_Y),
            blur_radius: lerp(SHADOW_BLUR_BASE, SHADOW_BLUR_HOVER, t),
        },
        ..button::Style::default()
    }
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

fn darken(color: Color, amount: f32) -> Color {
    let shift = HOVER_DARKEN * amount;
    Color {
        r: (color.r - shift).max(0.0),
        g: (color.g - shift).max(0.0),
        b: (color.b - shift).max(0.0),
        a: 1.0,
    }
}
