//! BlazeFace face detector using ONNX Runtime via `ort`.
//!
//! A lightweight short-range detector producing boxes only (no landmarks,
//! no identities), fast enough to run on every display tick.
use std::path::Path;

use crate::detection::domain::face_detector::{FaceDetector, ModelLoadError};
use crate::detection::infrastructure::model_resolver::{self, ModelLocation, ModelResolveError};
use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;

/// BlazeFace model input resolution.
const INPUT_SIZE: u32 = 128;

/// Default confidence threshold.
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

/// NMS IoU threshold.
const NMS_IOU_THRESH: f64 = 0.3;

/// Number of BlazeFace anchors (short-range model).
const NUM_ANCHORS: usize = 896;

/// Values per anchor in the regressor output: box (4) + 6 keypoints (12).
const REGRESSOR_STRIDE: usize = 16;

/// BlazeFace face detector backed by an ONNX Runtime session.
///
/// The session is created once in [`OnnxBlazefaceDetector::load`] and reused
/// for every frame.
pub struct OnnxBlazefaceDetector {
    session: ort::session::Session,
    confidence: f64,
    anchors: Vec<[f32; 2]>,
}

impl OnnxBlazefaceDetector {
    /// Load a BlazeFace ONNX model from disk.
    pub fn load(model_path: &Path, confidence: f64) -> Result<Self, ModelLoadError> {
        let session = build_session(model_path).map_err(|e| ModelLoadError::Session {
            path: model_path.to_path_buf(),
            message: e.to_string(),
        })?;
        log::info!("Loaded face detection model from {}", model_path.display());
        Ok(Self {
            session,
            confidence,
            anchors: generate_anchors(),
        })
    }

    /// Resolve the model file (see [`model_resolver::resolve`]) and load it.
    pub fn initialize(
        location: &ModelLocation,
        confidence: f64,
        progress: Option<model_resolver::ProgressFn>,
    ) -> Result<Self, ModelLoadError> {
        let path = model_resolver::resolve(location, progress).map_err(|e| match e {
            ModelResolveError::NotFound { name, .. } => ModelLoadError::NotFound { name },
            other => ModelLoadError::Resolve(other.to_string()),
        })?;
        Self::load(&path, confidence)
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }
}

fn build_session(model_path: &Path) -> Result<ort::session::Session, Box<dyn std::error::Error>> {
    let builder = ort::session::Session::builder()?;
    let providers = preferred_execution_providers();
    let builder = if providers.is_empty() {
        builder
    } else {
        builder.with_execution_providers(providers)?
    };
    Ok(builder.commit_from_file(model_path)?)
}

/// Platform execution providers; ONNX Runtime falls back to CPU on its own.
fn preferred_execution_providers() -> Vec<ort::execution_providers::ExecutionProviderDispatch> {
    #[cfg(target_os = "macos")]
    {
        vec![ort::execution_providers::CoreMLExecutionProvider::default().build()]
    }
    #[cfg(target_os = "windows")]
    {
        vec![ort::execution_providers::DirectMLExecutionProvider::default().build()]
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        vec![]
    }
}

impl FaceDetector for OnnxBlazefaceDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<BoundingBox>, Box<dyn std::error::Error>> {
        if frame.is_empty() || frame.channels() < 3 {
            return Err("BlazeFace requires a non-empty RGB frame".into());
        }

        let input_tensor = preprocess(frame, INPUT_SIZE);
        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;

        // regressors: [1, 896, 16], classificators: [1, 896, 1]
        if outputs.len() < 2 {
            return Err(
                format!("BlazeFace model expected 2 outputs, got {}", outputs.len()).into(),
            );
        }

        let regressors = outputs[0].try_extract_array::<f32>()?;
        let scores = outputs[1].try_extract_array::<f32>()?;
        let reg_data = regressors.as_slice().ok_or("Cannot get regressor slice")?;
        let score_data = scores.as_slice().ok_or("Cannot get score slice")?;

        let mut raw = decode(
            reg_data,
            score_data,
            &self.anchors,
            self.confidence as f32,
            frame.width() as f32,
            frame.height() as f32,
        );
        let kept = nms(&mut raw, NMS_IOU_THRESH);

        Ok(kept.iter().map(RawDet::to_box).collect())
    }
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// Resize frame to `size × size` and normalize to [0,1] NCHW float32.
fn preprocess(frame: &Frame, size: u32) -> ndarray::Array4<f32> {
    let src = frame.as_ndarray();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;
    let s = size as usize;

    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, s, s));

    for y in 0..s {
        let src_y = (((y as f64 + 0.5) * src_h as f64 / s as f64) as usize).min(src_h - 1);
        for x in 0..s {
            let src_x = (((x as f64 + 0.5) * src_w as f64 / s as f64) as usize).min(src_w - 1);
            for c in 0..3 {
                tensor[[0, c, y, x]] = src[[src_y, src_x, c]] as f32 / 255.0;
            }
        }
    }

    tensor
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Generate BlazeFace anchors for the short-range model: a 16×16 grid with
/// 2 anchors per cell followed by an 8×8 grid with 6 anchors per cell.
fn generate_anchors() -> Vec<[f32; 2]> {
    let strides = [(8, 2), (16, 6)]; // (stride, anchors_per_cell)
    let mut anchors = Vec::with_capacity(NUM_ANCHORS);

    for &(stride, num) in &strides {
        let grid_size = INPUT_SIZE as usize / stride;
        for y in 0..grid_size {
            for x in 0..grid_size {
                let cx = (x as f32 + 0.5) / grid_size as f32;
                let cy = (y as f32 + 0.5) / grid_size as f32;
                for _ in 0..num {
                    anchors.push([cx, cy]);
                }
            }
        }
    }

    anchors
}

/// Turns raw model outputs into frame-space detections above `threshold`.
fn decode(
    reg_data: &[f32],
    score_data: &[f32],
    anchors: &[[f32; 2]],
    threshold: f32,
    fw: f32,
    fh: f32,
) -> Vec<RawDet> {
    let mut dets = Vec::new();
    let num_anchors = anchors.len().min(NUM_ANCHORS);

    for (i, &raw_score) in score_data.iter().enumerate().take(num_anchors) {
        let score = sigmoid(raw_score);
        if score < threshold {
            continue;
        }

        let offset = i * REGRESSOR_STRIDE;
        if offset + 4 > reg_data.len() {
            break;
        }

        let anchor = anchors[i];
        let cx = anchor[0] + reg_data[offset] / INPUT_SIZE as f32;
        let cy = anchor[1] + reg_data[offset + 1] / INPUT_SIZE as f32;
        let w = reg_data[offset + 2] / INPUT_SIZE as f32;
        let h = reg_data[offset + 3] / INPUT_SIZE as f32;

        dets.push(RawDet {
            x1: ((cx - w / 2.0) * fw).clamp(0.0, fw) as f64,
            y1: ((cy - h / 2.0) * fh).clamp(0.0, fh) as f64,
            x2: ((cx + w / 2.0) * fw).clamp(0.0, fw) as f64,
            y2: ((cy + h / 2.0) * fh).clamp(0.0, fh) as f64,
            score: score as f64,
        });
    }

    dets
}

#[derive(Clone, Debug)]
struct RawDet {
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
    score: f64,
}

impl RawDet {
    fn to_box(&self) -> BoundingBox {
        BoundingBox::new(
            self.x1 as f32,
            self.y1 as f32,
            (self.x2 - self.x1).max(0.0) as f32,
            (self.y2 - self.y1).max(0.0) as f32,
        )
    }

    fn iou(&self, other: &RawDet) -> f64 {
        let x1 = self.x1.max(other.x1);
        let y1 = self.y1.max(other.y1);
        let x2 = self.x2.min(other.x2);
        let y2 = self.y2.min(other.y2);

        let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        if inter == 0.0 {
            return 0.0;
        }
        let area_a = (self.x2 - self.x1) * (self.y2 - self.y1);
        let area_b = (other.x2 - other.x1) * (other.y2 - other.y1);
        inter / (area_a + area_b - inter)
    }
}

/// Greedy non-maximum suppression, highest score first.
fn nms(dets: &mut [RawDet], iou_thresh: f64) -> Vec<RawDet> {
    dets.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<RawDet> = Vec::new();
    for det in dets.iter() {
        if keep.iter().all(|k| k.iou(det) <= iou_thresh) {
            keep.push(det.clone());
        }
    }
    keep
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn det(x1: f64, y1: f64, x2: f64, y2: f64, score: f64) -> RawDet {
        RawDet {
            x1,
            y1,
            x2,
            y2,
            score,
        }
    }

    #[test]
    fn test_preprocess_shape() {
        let data = vec![128u8; 200 * 100 * 3];
        let frame = Frame::new(data, 200, 100, 3, 0);
        let tensor = preprocess(&frame, 128);
        assert_eq!(tensor.shape(), &[1, 3, 128, 128]);
    }

    #[test]
    fn test_preprocess_normalized() {
        let data = vec![255u8; 50 * 50 * 3];
        let frame = Frame::new(data, 50, 50, 3, 0);
        let tensor = preprocess(&frame, 128);
        assert!((tensor[[0, 0, 0, 0]] - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_generate_anchors_count() {
        // 16×16 × 2 + 8×8 × 6 = 512 + 384
        assert_eq!(generate_anchors().len(), NUM_ANCHORS);
    }

    #[test]
    fn test_anchors_in_unit_range() {
        for a in &generate_anchors() {
            assert!(a[0] > 0.0 && a[0] < 1.0);
            assert!(a[1] > 0.0 && a[1] < 1.0);
        }
    }

    #[test]
    fn test_sigmoid() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-6);
        assert!((sigmoid(10.0) - 1.0).abs() < 0.001);
        assert!(sigmoid(-10.0) < 0.001);
    }

    #[test]
    fn test_decode_filters_low_scores() {
        let anchors = vec![[0.5, 0.5], [0.25, 0.25]];
        let mut reg = vec![0.0f32; 2 * REGRESSOR_STRIDE];
        reg[2] = 64.0; // w = 0.5
        reg[3] = 64.0; // h = 0.5
        let scores = vec![5.0, -5.0];

        let dets = decode(&reg, &scores, &anchors, 0.5, 640.0, 480.0);
        assert_eq!(dets.len(), 1);
        assert_relative_eq!(dets[0].x1, 160.0);
        assert_relative_eq!(dets[0].x2, 480.0);
        assert_relative_eq!(dets[0].y1, 120.0);
        assert_relative_eq!(dets[0].y2, 360.0);
    }

    #[test]
    fn test_decode_clamps_to_frame() {
        let anchors = vec![[0.95, 0.05]];
        let mut reg = vec![0.0f32; REGRESSOR_STRIDE];
        reg[2] = 64.0;
        reg[3] = 64.0;
        let dets = decode(&reg, &[5.0], &anchors, 0.5, 100.0, 100.0);
        let b = dets[0].to_box();
        assert!(b.is_within(crate::shared::frame::FrameSize::new(100, 100)));
    }

    #[test]
    fn test_nms_suppresses_overlap() {
        let mut dets = vec![
            det(0.0, 0.0, 100.0, 100.0, 0.7),
            det(5.0, 5.0, 105.0, 105.0, 0.9),
        ];
        let kept = nms(&mut dets, 0.3);
        assert_eq!(kept.len(), 1);
        assert_relative_eq!(kept[0].score, 0.9);
    }

    #[test]
    fn test_nms_keeps_separate() {
        let mut dets = vec![
            det(0.0, 0.0, 50.0, 50.0, 0.9),
            det(200.0, 200.0, 250.0, 250.0, 0.8),
        ];
        assert_eq!(nms(&mut dets, 0.3).len(), 2);
    }

    #[test]
    fn test_load_missing_model_is_session_error() {
        let err = OnnxBlazefaceDetector::load(Path::new("/nonexistent/blazeface.onnx"), 0.5)
            .err()
            .unwrap();
        assert!(matches!(err, ModelLoadError::Session { .. }));
    }

    #[test]
    fn test_load_corrupt_model_is_session_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blazeface.onnx");
        std::fs::write(&path, b"definitely not a protobuf").unwrap();
        assert!(OnnxBlazefaceDetector::load(&path, 0.5).is_err());
    }
}
