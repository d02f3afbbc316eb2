//! rollcall-core — Face recognition and code reading for attendance capture.
//!
//! Uses SCRFD for face detection and ArcFace for signature extraction, both
//! running via ONNX Runtime for CPU inference, plus a QR/1-D barcode reader
//! for the enrollment fallback.

pub mod analyzer;
pub mod code;
pub mod detector;
pub mod embedder;
mod raster;
pub mod types;

pub use analyzer::{
    recognize, signature_for_enrollment, AnalyzerError, CaptureError, FaceAnalyzer, OnnxAnalyzer,
};
pub use code::read_code;
pub use types::{
    EnrolledSignature, FaceRegion, Frame, Identity, IdentityError, Matcher, NearestMatcher,
    Recognition, Signature,
};

use std::path::PathBuf;

/// Default directory for the ONNX model files.
pub fn default_model_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("rollcall/models")
}
