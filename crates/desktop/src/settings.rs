use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use facetrack_core::detection::infrastructure::onnx_blazeface_detector::DEFAULT_CONFIDENCE;
use facetrack_core::shared::constants::APP_DIR_NAME;
use facetrack_core::video::infrastructure::ffmpeg_camera_source::CameraConfig;
use facetrack_core::video::infrastructure::ffmpeg_webm_encoder::WebmCodec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingCodec {
    Vp9,
    Vp8,
}

impl RecordingCodec {
    pub const ALL: &[RecordingCodec] = &[RecordingCodec::Vp9, RecordingCodec::Vp8];

    pub fn webm(self) -> WebmCodec {
        match self {
            RecordingCodec::Vp9 => WebmCodec::Vp9,
            RecordingCodec::Vp8 => WebmCodec::Vp8,
        }
    }
}

impl std::fmt::Display for RecordingCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordingCodec::Vp9 => write!(f, "VP9"),
            RecordingCodec::Vp8 => write!(f, "VP8"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Appearance {
    System,
    Dark,
    Light,
}

impl Appearance {
    pub const ALL: &[Appearance] = &[Appearance::System, Appearance::Dark, Appearance::Light];
}

impl std::fmt::Display for Appearance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Appearance::System => write!(f, "System"),
            Appearance::Dark => write!(f, "Dark"),
            Appearance::Light => write!(f, "Light"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Detection threshold in percent.
    pub confidence: u32,
    #[serde(default = "default_codec")]
    pub codec: RecordingCodec,
    /// Camera device; empty means the platform default.
    #[serde(default)]
    pub device: String,
    /// libavdevice input format; empty means the platform default.
    #[serde(default)]
    pub input_format: String,
    /// Where recordings are saved; `None` is the Downloads folder.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    pub appearance: Appearance,
    pub high_contrast: bool,
    pub font_scale: f32,
}

fn default_codec() -> RecordingCodec {
    RecordingCodec::Vp9
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            confidence: (DEFAULT_CONFIDENCE * 100.0).round() as u32,
            codec: default_codec(),
            device: String::new(),
            input_format: String::new(),
            output_dir: None,
            appearance: Appearance::System,
            high_contrast: false,
            font_scale: 1.0,
        }
    }
}

impl Settings {
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join("settings.json"))
    }

    pub fn load() -> Self {
        Self::config_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    pub fn save(&self) {
        if let Some(path) = Self::config_path() {
            self.save_to(&path);
        }
    }

    /// Missing or unreadable files fall back to defaults.
    pub fn load_from(path: &Path) -> Self {
        fs::read_to_string(path)
            .ok()
            .and_then(|json| serde_json::from_str(&json).ok())
            .unwrap_or_default()
    }

    pub fn save_to(&self, path: &Path) {
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        match serde_json::to_string_pretty(self) {
            Ok(json) => {
                if let Err(e) = fs::write(path, json) {
                    log::warn!("Could not save settings to {}: {e}", path.display());
                }
            }
            Err(e) => log::warn!("Could not serialize settings: {e}"),
        }
    }

    pub fn confidence_threshold(&self) -> f64 {
        f64::from(self.confidence.min(100)) / 100.0
    }

    pub fn camera_config(&self) -> CameraConfig {
        let defaults = CameraConfig::default();
        CameraConfig {
            input_format: non_empty(&self.input_format).unwrap_or(defaults.input_format),
            device: non_empty(&self.device).unwrap_or(defaults.device),
            ..defaults
        }
    }

    /// Resets the session options, leaving appearance alone.
    pub fn restore_session_defaults(&mut self) {
        let defaults = Settings::default();
        self.confidence = defaults.confidence;
        self.codec = defaults.codec;
        self.device = defaults.device;
        self.input_format = defaults.input_format;
        self.output_dir = defaults.output_dir;
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
