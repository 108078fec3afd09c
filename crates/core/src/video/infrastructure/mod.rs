pub mod ffmpeg_camera_source;
pub mod ffmpeg_webm_encoder;
