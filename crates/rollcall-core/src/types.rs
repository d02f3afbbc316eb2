use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// 8-bit grayscale frame handed to the detector, extractor and code reader.
///
/// Frame acquisition (camera, file, test fixture) is the caller's concern;
/// everything in this crate consumes frames through this one type.
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl Frame {
    /// Build a frame from any decoded image by collapsing it to luma.
    pub fn from_image(img: &image::DynamicImage) -> Self {
        let luma = img.to_luma8();
        Self {
            width: luma.width(),
            height: luma.height(),
            data: luma.into_raw(),
        }
    }

    /// Load and decode an image file into a frame.
    pub fn from_path(path: &std::path::Path) -> Result<Self, image::ImageError> {
        Ok(Self::from_image(&image::open(path)?))
    }

    /// View the frame as a grayscale image buffer (for reference-image I/O).
    pub fn to_luma_image(&self) -> Option<image::GrayImage> {
        image::GrayImage::from_raw(self.width, self.height, self.data.clone())
    }
}

/// Bounding box for a detected face.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceRegion {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("empty identity key")]
    Empty,
    #[error("identity key contains unsupported character {0:?}")]
    UnsupportedChar(char),
}

/// A unique, URL-safe identity key (student roll number).
///
/// Keys double as remote-database path segments and reference-image file
/// names, so only ASCII alphanumerics, `-` and `_` are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Validate a raw payload (e.g. a scanned code) as an identity key.
    pub fn parse(raw: &str) -> Result<Self, IdentityError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(IdentityError::Empty);
        }
        if let Some(c) = trimmed
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            return Err(IdentityError::UnsupportedChar(c));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Face signature vector (512-dimensional, L2-normalized ArcFace embedding).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signature {
    pub values: Vec<f32>,
    /// Model version that produced this signature (e.g. "w600k_r50").
    pub model_version: Option<String>,
}

impl Signature {
    /// Euclidean distance between two signatures.
    ///
    /// For L2-normalized vectors this lands in [0, 2]; the match tolerance
    /// is documented as a scalar in [0, 1], lower = stricter.
    pub fn distance(&self, other: &Signature) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

/// One gallery entry: an identity bound to its enrolled signature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrolledSignature {
    pub identity: Identity,
    pub signature: Signature,
}

/// Outcome of resolving a probe signature against the gallery.
#[derive(Debug, Clone, PartialEq)]
pub enum Recognition {
    /// Nearest enrolled identity within tolerance, with its distance.
    Found { identity: Identity, distance: f32 },
    NotFound,
}

impl Recognition {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Recognition::Found { identity, .. } => Some(identity),
            Recognition::NotFound => None,
        }
    }
}

/// Strategy for resolving a probe signature against enrolled signatures.
pub trait Matcher {
    fn resolve(&self, probe: &Signature, gallery: &[EnrolledSignature], tolerance: f32)
        -> Recognition;
}

/// Distance-ranked matcher: the nearest enrolled signature within tolerance
/// wins. Ties (exactly equal distances) keep the earlier gallery entry, so
/// resolution is deterministic for a given snapshot order.
pub struct NearestMatcher;

impl Matcher for NearestMatcher {
    fn resolve(
        &self,
        probe: &Signature,
        gallery: &[EnrolledSignature],
        tolerance: f32,
    ) -> Recognition {
        let mut best: Option<(usize, f32)> = None;

        for (i, entry) in gallery.iter().enumerate() {
            let d = probe.distance(&entry.signature);
            let closer = match best {
                None => true,
                Some((_, best_d)) => d < best_d,
            };
            if closer {
                best = Some((i, d));
            }
        }

        match best {
            Some((idx, d)) if d <= tolerance => Recognition::Found {
                identity: gallery[idx].identity.clone(),
                distance: d,
            },
            _ => Recognition::NotFound,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(values: &[f32]) -> Signature {
        Signature {
            values: values.to_vec(),
            model_version: None,
        }
    }

    fn enrolled(id: &str, values: &[f32]) -> EnrolledSignature {
        EnrolledSignature {
            identity: Identity::parse(id).unwrap(),
            signature: sig(values),
        }
    }

    #[test]
    fn test_identity_accepts_url_safe_keys() {
        assert_eq!(Identity::parse("S101").unwrap().as_str(), "S101");
        assert_eq!(Identity::parse("  21CS042 ").unwrap().as_str(), "21CS042");
        assert!(Identity::parse("roll_no-7").is_ok());
    }

    #[test]
    fn test_identity_rejects_reserved_characters() {
        assert_eq!(Identity::parse(""), Err(IdentityError::Empty));
        assert_eq!(Identity::parse("   "), Err(IdentityError::Empty));
        assert_eq!(
            Identity::parse("a/b"),
            Err(IdentityError::UnsupportedChar('/'))
        );
        assert_eq!(
            Identity::parse("a.b"),
            Err(IdentityError::UnsupportedChar('.'))
        );
        assert_eq!(
            Identity::parse("a#b"),
            Err(IdentityError::UnsupportedChar('#'))
        );
    }

    #[test]
    fn test_distance_identical_is_zero() {
        let a = sig(&[1.0, 0.0, 0.0]);
        assert!(a.distance(&a) < 1e-6);
    }

    #[test]
    fn test_distance_orthogonal_unit_vectors() {
        let a = sig(&[1.0, 0.0]);
        let b = sig(&[0.0, 1.0]);
        assert!((a.distance(&b) - std::f32::consts::SQRT_2).abs() < 1e-6);
    }

    #[test]
    fn test_nearest_matcher_picks_closest_not_first() {
        // A first-match-wins scan would stop at "far"; the ranked matcher
        // must keep going and select "near".
        let probe = sig(&[1.0, 0.0, 0.0]);
        let gallery = vec![
            enrolled("far", &[0.7, 0.7, 0.0]),
            enrolled("near", &[0.99, 0.05, 0.0]),
        ];
        let result = NearestMatcher.resolve(&probe, &gallery, 0.5);
        assert_eq!(result.identity().map(Identity::as_str), Some("near"));
    }

    #[test]
    fn test_nearest_matcher_tie_keeps_earlier_entry() {
        let probe = sig(&[1.0, 0.0]);
        let gallery = vec![
            enrolled("first", &[0.0, 1.0]),
            enrolled("second", &[0.0, 1.0]),
        ];
        let result = NearestMatcher.resolve(&probe, &gallery, 2.0);
        assert_eq!(result.identity().map(Identity::as_str), Some("first"));
    }

    #[test]
    fn test_nearest_matcher_respects_tolerance() {
        let probe = sig(&[1.0, 0.0]);
        let gallery = vec![enrolled("only", &[0.0, 1.0])];
        // sqrt(2) ≈ 1.414 > 0.5 → no match
        assert_eq!(
            NearestMatcher.resolve(&probe, &gallery, 0.5),
            Recognition::NotFound
        );
        // but a generous tolerance accepts it
        assert!(matches!(
            NearestMatcher.resolve(&probe, &gallery, 1.5),
            Recognition::Found { .. }
        ));
    }

    #[test]
    fn test_nearest_matcher_empty_gallery() {
        let probe = sig(&[1.0, 0.0]);
        assert_eq!(
            NearestMatcher.resolve(&probe, &[], 0.5),
            Recognition::NotFound
        );
    }
}
