pub const BLAZEFACE_MODEL_NAME: &str = "blazeface.onnx";

/// Relative directory searched for model weights before any cache lookup.
pub const MODELS_DIR: &str = "models";

/// Directory name used under the platform config/cache/data roots.
pub const APP_DIR_NAME: &str = "FaceTrack";

/// Annotation loop cadence when no display refresh rate is known.
pub const DISPLAY_REFRESH_HZ: u32 = 60;

/// Capture surface sample rate while recording.
pub const RECORDING_FPS: u32 = 30;

pub const RECORDING_FILE_PREFIX: &str = "face-recording";
pub const RECORDING_EXTENSION: &str = "webm";

/// Box outline colour (`#00ff88`, opaque).
pub const BOX_COLOR: [u8; 4] = [0x00, 0xff, 0x88, 0xff];
pub const BOX_LINE_WIDTH: u32 = 2;
