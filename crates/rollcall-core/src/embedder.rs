//! ArcFace signature extractor via ONNX Runtime.
//!
//! Produces 512-dimensional L2-normalized signatures from a face crop. The
//! crop is taken from the detector's bounding box with a fixed margin and
//! resized to the canonical 112x112 network input.

use crate::raster;
use crate::types::{FaceRegion, Frame, Signature};
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

const INPUT_SIZE: usize = 112;
const PIXEL_MEAN: f32 = 127.5;
const PIXEL_STD: f32 = 127.5; // ArcFace uses symmetric normalization
const SIGNATURE_DIM: usize = 512;
const MODEL_VERSION: &str = "w600k_r50";
/// Extra context kept around the detector box before resizing.
const CROP_MARGIN: f32 = 0.15;

#[derive(Error, Debug)]
pub enum ExtractorError {
    #[error("model file not found: {0} — download from insightface and place in the model dir")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("degenerate face region {0}x{1}")]
    EmptyRegion(u32, u32),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// ArcFace-based signature extractor.
pub struct SignatureExtractor {
    session: Session,
}

impl SignatureExtractor {
    /// Load the ArcFace ONNX model from the given path.
    pub fn load(model_path: &str) -> Result<Self, ExtractorError> {
        if !Path::new(model_path).exists() {
            return Err(ExtractorError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(path = model_path, "loaded ArcFace model");

        Ok(Self { session })
    }

    /// Extract a signature for one detected face region.
    pub fn extract(
        &mut self,
        frame: &Frame,
        face: &FaceRegion,
    ) -> Result<Signature, ExtractorError> {
        let input = preprocess(frame, face)?;

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| ExtractorError::InferenceFailed(format!("signature extraction: {e}")))?;

        if raw.len() != SIGNATURE_DIM {
            return Err(ExtractorError::InferenceFailed(format!(
                "expected {SIGNATURE_DIM}-dim signature, got {}",
                raw.len()
            )));
        }

        Ok(Signature {
            values: l2_normalize(raw),
            model_version: Some(MODEL_VERSION.to_string()),
        })
    }
}

/// Crop the face region (with margin) and build the NCHW input tensor.
fn preprocess(frame: &Frame, face: &FaceRegion) -> Result<Array4<f32>, ExtractorError> {
    let margin_x = face.width * CROP_MARGIN;
    let margin_y = face.height * CROP_MARGIN;

    let x = (face.x - margin_x).round() as i32;
    let y = (face.y - margin_y).round() as i32;
    let w = (face.width + 2.0 * margin_x).round().max(0.0) as usize;
    let h = (face.height + 2.0 * margin_y).round().max(0.0) as usize;

    if w == 0 || h == 0 {
        return Err(ExtractorError::EmptyRegion(w as u32, h as u32));
    }

    let cropped = raster::crop(
        &frame.data,
        frame.width as usize,
        frame.height as usize,
        x,
        y,
        w,
        h,
    );
    let resized = raster::resize_bilinear(&cropped, w, h, INPUT_SIZE, INPUT_SIZE);

    let mut tensor = Array4::<f32>::zeros((1, 3, INPUT_SIZE, INPUT_SIZE));
    for py in 0..INPUT_SIZE {
        for px in 0..INPUT_SIZE {
            let v = (resized[py * INPUT_SIZE + px] as f32 - PIXEL_MEAN) / PIXEL_STD;
            tensor[[0, 0, py, px]] = v;
            tensor[[0, 1, py, px]] = v;
            tensor[[0, 2, py, px]] = v;
        }
    }

    Ok(tensor)
}

fn l2_normalize(raw: &[f32]) -> Vec<f32> {
    let norm: f32 = raw.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        raw.iter().map(|x| x / norm).collect()
    } else {
        raw.to_vec()
    }
}
