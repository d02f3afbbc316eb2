//! Machine-readable code reader for the enrollment fallback.
//!
//! Decodes a QR code first, then falls back to 1-D barcode symbologies on
//! the same frame. The payload is returned unmodified; validating it as a
//! storage-safe identity key is the caller's job.

use crate::types::Frame;
use rxing::BarcodeFormat;

/// Try to decode a code from a single frame.
///
/// Returns the first decoded payload, or `None` when the frame holds no
/// readable code. The scan-until-found loop (and operator cancellation)
/// lives with the caller, which feeds successive frames.
pub fn read_code(frame: &Frame) -> Option<String> {
    // 2-D first: QR is the primary enrollment medium.
    if let Ok(result) = rxing::helpers::detect_in_luma(
        frame.data.clone(),
        frame.width,
        frame.height,
        Some(BarcodeFormat::QR_CODE),
    ) {
        tracing::debug!(format = ?result.getBarcodeFormat(), "decoded 2-D code");
        return Some(result.getText().to_string());
    }

    // 1-D fallback: let the multi-format reader try the linear symbologies.
    match rxing::helpers::detect_in_luma(frame.data.clone(), frame.width, frame.height, None) {
        Ok(result) => {
            tracing::debug!(format = ?result.getBarcodeFormat(), "decoded code on fallback pass");
            Some(result.getText().to_string())
        }
        Err(_) => None,
    }
}
