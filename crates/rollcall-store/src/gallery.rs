//! Signature gallery: the durable identity → signature mapping plus one
//! reference image per identity.
//!
//! Policy is first-registration-wins: re-enrolling an identity requires an
//! explicit `remove` first. Snapshots enumerate identities in lexicographic
//! order, which is the order the matcher uses for tie-breaks.

use crate::atomic::write_atomic;
use rollcall_core::{EnrolledSignature, Frame, Identity, Signature};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GalleryError {
    #[error("identity {0} is already enrolled")]
    DuplicateIdentity(Identity),
    #[error("frame dimensions do not match its pixel buffer")]
    InvalidFrame,
    #[error("gallery file corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error(transparent)]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub struct Gallery {
    path: PathBuf,
    faces_dir: PathBuf,
    entries: BTreeMap<Identity, Signature>,
}

impl Gallery {
    /// Open the gallery, loading the signature map if it exists and creating
    /// the reference-image directory.
    pub fn open(path: impl Into<PathBuf>, faces_dir: impl Into<PathBuf>) -> Result<Self, GalleryError> {
        let path = path.into();
        let faces_dir = faces_dir.into();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::create_dir_all(&faces_dir)?;

        let entries = if path.exists() {
            serde_json::from_slice(&fs::read(&path)?)?
        } else {
            BTreeMap::new()
        };

        tracing::debug!(path = %path.display(), enrolled = entries.len(), "gallery opened");

        Ok(Self {
            path,
            faces_dir,
            entries,
        })
    }

    /// Enroll an identity: persist its signature and write the reference
    /// image. Fails with `DuplicateIdentity` when the key is already bound.
    pub fn put(
        &mut self,
        identity: Identity,
        signature: Signature,
        frame: &Frame,
    ) -> Result<(), GalleryError> {
        if self.entries.contains_key(&identity) {
            return Err(GalleryError::DuplicateIdentity(identity));
        }

        let luma = frame.to_luma_image().ok_or(GalleryError::InvalidFrame)?;
        let image_path = self.reference_image_path(&identity);
        luma.save(&image_path)?;

        self.entries.insert(identity.clone(), signature);
        if let Err(e) = self.persist() {
            // Roll back so memory and disk stay consistent
            self.entries.remove(&identity);
            let _ = fs::remove_file(&image_path);
            return Err(e);
        }

        tracing::info!(identity = %identity, "identity enrolled");
        Ok(())
    }

    /// Remove an identity and its reference image. Idempotent: removing an
    /// absent identity is a silent no-op.
    pub fn remove(&mut self, identity: &Identity) -> Result<(), GalleryError> {
        if self.entries.remove(identity).is_some() {
            self.persist()?;
            tracing::info!(identity = %identity, "identity deregistered");
        }

        match fs::remove_file(self.reference_image_path(identity)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Snapshot of all enrolled signatures, in identity order. Reflects the
    /// last successful `put`/`remove` on this handle.
    pub fn snapshot(&self) -> Vec<EnrolledSignature> {
        self.entries
            .iter()
            .map(|(identity, signature)| EnrolledSignature {
                identity: identity.clone(),
                signature: signature.clone(),
            })
            .collect()
    }

    pub fn contains(&self, identity: &Identity) -> bool {
        self.entries.contains_key(identity)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn reference_image_path(&self, identity: &Identity) -> PathBuf {
        self.faces_dir.join(format!("{identity}.png"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<(), GalleryError> {
        let bytes = serde_json::to_vec_pretty(&self.entries)?;
        write_atomic(&self.path, &bytes)?;
        Ok(())
    }
}
