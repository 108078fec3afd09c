mod app;
mod platform;
mod settings;
mod tabs;
mod theme;
mod widgets;
mod workers;

use app::App;

fn main() -> iced::Result {
    env_logger::init();

    iced::application(App::new, App::update, App::view)
        .title("FaceTrack")
        .theme(App::theme)
        .subscription(App::subscription)
        .window(iced::window::Settings {
            size: iced::Size::new(900.0, 680.0),
            min_size: Some(iced::Size::new(480.0, 420.0)),
            // Closing waits for an active recording to be saved.
            exit_on_close_request: false,
            ..Default::default()
        })
        .run()
}
