//! Frame analysis seam: detection plus signature extraction behind one trait.
//!
//! The ONNX-backed implementation is the production path; the trait exists so
//! the attendance engine and its tests can run without model files.

use crate::detector::{DetectorError, FaceDetector};
use crate::embedder::{ExtractorError, SignatureExtractor};
use crate::types::{EnrolledSignature, FaceRegion, Frame, Matcher, NearestMatcher, Recognition, Signature};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error(transparent)]
    Detector(#[from] DetectorError),
    #[error(transparent)]
    Extractor(#[from] ExtractorError),
}

/// Detection and signature extraction over a single frame.
pub trait FaceAnalyzer {
    /// Detect faces, highest confidence first. Zero faces is not an error.
    fn detect(&mut self, frame: &Frame) -> Result<Vec<FaceRegion>, AnalyzerError>;

    /// Extract the signature for one detected region.
    fn signature(&mut self, frame: &Frame, face: &FaceRegion) -> Result<Signature, AnalyzerError>;
}

/// Production analyzer: SCRFD detection + ArcFace extraction.
pub struct OnnxAnalyzer {
    detector: FaceDetector,
    extractor: SignatureExtractor,
}

impl OnnxAnalyzer {
    /// Load both models, failing fast if either file is missing.
    pub fn load(detector_path: &str, extractor_path: &str) -> Result<Self, AnalyzerError> {
        Ok(Self {
            detector: FaceDetector::load(detector_path)?,
            extractor: SignatureExtractor::load(extractor_path)?,
        })
    }
}

impl FaceAnalyzer for OnnxAnalyzer {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<FaceRegion>, AnalyzerError> {
        Ok(self.detector.detect(frame)?)
    }

    fn signature(&mut self, frame: &Frame, face: &FaceRegion) -> Result<Signature, AnalyzerError> {
        Ok(self.extractor.extract(frame, face)?)
    }
}

/// Resolve a frame against a gallery snapshot.
///
/// Every detected face is compared against every enrolled signature; the
/// nearest distance within `tolerance` wins across all of them. A frame with
/// zero faces resolves to `NotFound`, never an error.
pub fn recognize<A: FaceAnalyzer + ?Sized>(
    analyzer: &mut A,
    frame: &Frame,
    gallery: &[EnrolledSignature],
    tolerance: f32,
) -> Result<Recognition, AnalyzerError> {
    if gallery.is_empty() {
        return Ok(Recognition::NotFound);
    }

    let faces = analyzer.detect(frame)?;
    let matcher = NearestMatcher;
    let mut best = Recognition::NotFound;

    for face in &faces {
        let probe = analyzer.signature(frame, face)?;
        let result = matcher.resolve(&probe, gallery, tolerance);
        let closer = match (&best, &result) {
            (_, Recognition::NotFound) => false,
            (Recognition::NotFound, Recognition::Found { .. }) => true,
            (Recognition::Found { distance: a, .. }, Recognition::Found { distance: b, .. }) => {
                b < a
            }
        };
        if closer {
            best = result;
        }
    }

    Ok(best)
}

/// Why an enrollment capture was rejected.
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("no face detected in the frame")]
    NoFaceDetected,
    #[error("{0} faces detected — enrollment requires exactly one")]
    AmbiguousFace(usize),
    #[error(transparent)]
    Analyzer(#[from] AnalyzerError),
}

/// Extract the signature for enrollment.
///
/// Requires exactly one detected face; never guesses which of several faces
/// belongs to the scanned identity.
pub fn signature_for_enrollment<A: FaceAnalyzer + ?Sized>(
    analyzer: &mut A,
    frame: &Frame,
) -> Result<Signature, CaptureError> {
    let faces = analyzer.detect(frame)?;
    match faces.as_slice() {
        [] => Err(CaptureError::NoFaceDetected),
        [face] => Ok(analyzer.signature(frame, face)?),
        many => Err(CaptureError::AmbiguousFace(many.len())),
    }
}
