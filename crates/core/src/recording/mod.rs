pub mod download_sink;
pub mod recorder;
pub mod recording_session;
