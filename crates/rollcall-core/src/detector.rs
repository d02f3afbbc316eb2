//! SCRFD face detector via ONNX Runtime.
//!
//! Anchor-free decoding over three stride levels with NMS post-processing.
//! Only scores and boxes are decoded; the extractor works from the box crop,
//! so landmark outputs (when the model exports them) are ignored.

use crate::raster;
use crate::types::{FaceRegion, Frame};
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

const INPUT_SIZE: usize = 640;
const PIXEL_MEAN: f32 = 127.5;
const PIXEL_STD: f32 = 128.0;
const CONFIDENCE_THRESHOLD: f32 = 0.5;
const NMS_THRESHOLD: f32 = 0.4;
const STRIDES: [usize; 3] = [8, 16, 32];
const ANCHORS_PER_CELL: usize = 2;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("model file not found: {0} — download from insightface and place in the model dir")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Scale and padding applied by the letterbox resize, kept for de-mapping
/// detections back into frame coordinates.
struct Letterbox {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
}

/// SCRFD-based face detector.
pub struct FaceDetector {
    session: Session,
    /// (score_idx, bbox_idx) per stride [8, 16, 32], discovered by output
    /// name at load time with a positional fallback.
    output_indices: [(usize, usize); 3],
}

impl FaceDetector {
    /// Load the SCRFD ONNX model from the given path.
    pub fn load(model_path: &str) -> Result<Self, DetectorError> {
        if !Path::new(model_path).exists() {
            return Err(DetectorError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        let output_names: Vec<String> =
            session.outputs().iter().map(|o| o.name().to_string()).collect();

        tracing::info!(
            path = model_path,
            outputs = ?output_names,
            "loaded SCRFD model"
        );

        // Exports carry either 6 outputs (score/bbox per stride) or 9
        // (score/bbox/kps per stride); both lay scores first, then boxes.
        if output_names.len() < 6 {
            return Err(DetectorError::InferenceFailed(format!(
                "SCRFD model requires at least 6 outputs (3 strides × score/bbox), got {}",
                output_names.len()
            )));
        }

        let output_indices = discover_output_indices(&output_names);
        tracing::debug!(?output_indices, "SCRFD output tensor mapping");

        Ok(Self {
            session,
            output_indices,
        })
    }

    /// Detect faces in a frame, returning regions sorted by confidence.
    /// A frame with no faces yields an empty vector, never an error.
    pub fn detect(&mut self, frame: &Frame) -> Result<Vec<FaceRegion>, DetectorError> {
        let (input, letterbox) = preprocess(frame);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let mut detections = Vec::new();
        for (pos, &stride) in STRIDES.iter().enumerate() {
            let (score_idx, bbox_idx) = self.output_indices[pos];

            let (_, scores) = outputs[score_idx]
                .try_extract_tensor::<f32>()
                .map_err(|e| DetectorError::InferenceFailed(format!("scores stride {stride}: {e}")))?;
            let (_, boxes) = outputs[bbox_idx]
                .try_extract_tensor::<f32>()
                .map_err(|e| DetectorError::InferenceFailed(format!("boxes stride {stride}: {e}")))?;

            decode_stride(scores, boxes, stride, &letterbox, &mut detections);
        }

        let mut kept = nms(detections, NMS_THRESHOLD);
        kept.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(kept)
    }
}

/// Letterbox a frame into the square network input and normalize to NCHW.
fn preprocess(frame: &Frame) -> (Array4<f32>, Letterbox) {
    let (w, h) = (frame.width as usize, frame.height as usize);
    let scale = (INPUT_SIZE as f32 / w as f32).min(INPUT_SIZE as f32 / h as f32);
    let new_w = ((w as f32 * scale).round() as usize).max(1);
    let new_h = ((h as f32 * scale).round() as usize).max(1);
    let pad_x = (INPUT_SIZE - new_w) / 2;
    let pad_y = (INPUT_SIZE - new_h) / 2;

    let resized = raster::resize_bilinear(&frame.data, w, h, new_w, new_h);

    let mut tensor = Array4::<f32>::zeros((1, 3, INPUT_SIZE, INPUT_SIZE));
    for y in 0..INPUT_SIZE {
        for x in 0..INPUT_SIZE {
            let pixel = if y >= pad_y && y < pad_y + new_h && x >= pad_x && x < pad_x + new_w {
                resized[(y - pad_y) * new_w + (x - pad_x)] as f32
            } else {
                PIXEL_MEAN // padding normalizes to 0.0
            };
            let v = (pixel - PIXEL_MEAN) / PIXEL_STD;
            // Grayscale replicated across the three input channels
            tensor[[0, 0, y, x]] = v;
            tensor[[0, 1, y, x]] = v;
            tensor[[0, 2, y, x]] = v;
        }
    }

    (
        tensor,
        Letterbox {
            scale,
            pad_x: pad_x as f32,
            pad_y: pad_y as f32,
        },
    )
}

/// Map output tensors to (score, bbox) slots per stride.
///
/// Named exports use "score_8"/"bbox_8" etc.; numeric names fall back to the
/// standard positional layout (scores for all strides first, then boxes).
fn discover_output_indices(names: &[String]) -> [(usize, usize); 3] {
    let find = |prefix: &str, stride: usize| -> Option<usize> {
        let target = format!("{prefix}_{stride}");
        names.iter().position(|n| n == &target)
    };

    let named = STRIDES
        .iter()
        .all(|&s| find("score", s).is_some() && find("bbox", s).is_some());

    if named {
        std::array::from_fn(|i| {
            let s = STRIDES[i];
            (find("score", s).unwrap(), find("bbox", s).unwrap())
        })
    } else {
        tracing::info!(
            ?names,
            "SCRFD: output names not recognized, using positional mapping [0-2]=scores, [3-5]=boxes"
        );
        [(0, 3), (1, 4), (2, 5)]
    }
}

/// Decode one stride level into frame-space face regions.
fn decode_stride(
    scores: &[f32],
    boxes: &[f32],
    stride: usize,
    letterbox: &Letterbox,
    out: &mut Vec<FaceRegion>,
) {
    let grid = INPUT_SIZE / stride;
    let num_anchors = grid * grid * ANCHORS_PER_CELL;

    for idx in 0..num_anchors {
        let score = scores.get(idx).copied().unwrap_or(0.0);
        if score <= CONFIDENCE_THRESHOLD {
            continue;
        }

        let cell = idx / ANCHORS_PER_CELL;
        let anchor_cx = (cell % grid) as f32 * stride as f32;
        let anchor_cy = (cell / grid) as f32 * stride as f32;

        let off = idx * 4;
        if off + 3 >= boxes.len() {
            continue;
        }

        // Distances from the anchor center, in stride units
        let x1 = anchor_cx - boxes[off] * stride as f32;
        let y1 = anchor_cy - boxes[off + 1] * stride as f32;
        let x2 = anchor_cx + boxes[off + 2] * stride as f32;
        let y2 = anchor_cy + boxes[off + 3] * stride as f32;

        let fx1 = (x1 - letterbox.pad_x) / letterbox.scale;
        let fy1 = (y1 - letterbox.pad_y) / letterbox.scale;
        let fx2 = (x2 - letterbox.pad_x) / letterbox.scale;
        let fy2 = (y2 - letterbox.pad_y) / letterbox.scale;

        out.push(FaceRegion {
            x: fx1,
            y: fy1,
            width: fx2 - fx1,
            height: fy2 - fy1,
            confidence: score,
        });
    }
}

/// Non-maximum suppression by IoU, keeping highest-confidence regions.
fn nms(mut regions: Vec<FaceRegion>, iou_threshold: f32) -> Vec<FaceRegion> {
    regions.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<FaceRegion> = Vec::new();
    for region in regions {
        if keep.iter().all(|k| iou(k, &region) <= iou_threshold) {
            keep.push(region);
        }
    }
    keep
}

fn iou(a: &FaceRegion, b: &FaceRegion) -> f32 {
    let x1 = a.x.max(b.x);
    let y1 = a.y.max(b.y);
    let x2 = (a.x + a.width).min(b.x + b.width);
    let y2 = (a.y + a.height).min(b.y + b.height);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let union = a.width * a.height + b.width * b.height - inter;

    if union > 0.0 {
        inter / union
    } else {
        0.0
    }
}
