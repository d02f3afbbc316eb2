//! Attendance engine: one identity-resolution cycle at a time.
//!
//! A cycle resolves a captured frame to an identity (fast path), or falls
//! back to code-scan enrollment, then records the event in the ledger and
//! mirrors it to the remote database. The ledger is the source of truth:
//! attendance counts as recorded once the ledger accepts the mark, whatever
//! the remote outcome.

use chrono::{Local, NaiveDate, NaiveTime};
use rollcall_core::{
    analyzer::CaptureError, recognize, signature_for_enrollment, AnalyzerError, FaceAnalyzer,
    Frame, Identity, IdentityError, Recognition,
};
use rollcall_store::{ErrorLog, Gallery, GalleryError, Ledger, LedgerError, MarkOutcome};
use rollcall_sync::{PublishOutcome, RecordTransport, RemoteSync};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("no face detected in the frame")]
    NoFaceDetected,
    #[error("{0} faces detected — enrollment requires exactly one")]
    AmbiguousFace(usize),
    #[error("identity {0} is already enrolled")]
    DuplicateIdentity(Identity),
    #[error("scanned payload {raw:?} is not a valid identity key: {reason}")]
    InvalidCodePayload { raw: String, reason: IdentityError },
    #[error(transparent)]
    Analyzer(#[from] AnalyzerError),
    #[error("gallery: {0}")]
    Gallery(GalleryError),
    #[error("ledger persistence: {0}")]
    Persistence(#[from] LedgerError),
}

impl From<CaptureError> for EngineError {
    fn from(e: CaptureError) -> Self {
        match e {
            CaptureError::NoFaceDetected => EngineError::NoFaceDetected,
            CaptureError::AmbiguousFace(n) => EngineError::AmbiguousFace(n),
            CaptureError::Analyzer(e) => EngineError::Analyzer(e),
        }
    }
}

impl From<GalleryError> for EngineError {
    fn from(e: GalleryError) -> Self {
        match e {
            GalleryError::DuplicateIdentity(id) => EngineError::DuplicateIdentity(id),
            other => EngineError::Gallery(other),
        }
    }
}

/// Operator feedback seam. The daemon wires a speech engine in behind this;
/// the default just logs.
pub trait Announcer {
    fn announce(&self, message: &str);
}

pub struct LogAnnouncer;

impl Announcer for LogAnnouncer {
    fn announce(&self, message: &str) {
        tracing::info!(message, "announcement");
    }
}

/// One recorded attendance event, with the independent side-effect results.
#[derive(Debug)]
pub struct Attendance {
    pub identity: Identity,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub mark: MarkOutcome,
    /// Ledger flush result: a failure is surfaced here but never aborts the
    /// cycle, and the in-memory ledger keeps the mark for a later retry.
    pub ledger: Result<(), LedgerError>,
    /// Remote mirror outcome; `None` when publishing is disabled.
    pub remote: Option<PublishOutcome>,
}

/// Outcome of the recognition fast path.
#[derive(Debug)]
pub enum CycleOutcome {
    Marked(Attendance),
    /// No enrolled identity matched; the caller moves on to the code-scan
    /// enrollment fallback.
    Unrecognized,
}

/// Outcome of the operator-driven code scan: a payload, or a cancel signal.
/// Abandoning enrollment is a normal outcome, not a failure.
#[derive(Debug)]
pub enum ScanOutcome {
    Payload(String),
    Abandoned,
}

pub struct Engine<A: FaceAnalyzer, T: RecordTransport> {
    analyzer: A,
    gallery: Gallery,
    ledger: Ledger,
    remote: Option<RemoteSync<T>>,
    error_log: ErrorLog,
    announcer: Box<dyn Announcer + Send>,
    tolerance: f32,
}

impl<A: FaceAnalyzer, T: RecordTransport> Engine<A, T> {
    pub fn new(
        analyzer: A,
        gallery: Gallery,
        ledger: Ledger,
        remote: Option<RemoteSync<T>>,
        error_log: ErrorLog,
        announcer: Box<dyn Announcer + Send>,
        tolerance: f32,
    ) -> Self {
        Self {
            analyzer,
            gallery,
            ledger,
            remote,
            error_log,
            announcer,
            tolerance,
        }
    }

    /// Recognition fast path: resolve the frame against the gallery and mark
    /// attendance on a match.
    pub async fn attend(&mut self, frame: &Frame) -> Result<CycleOutcome, EngineError> {
        let snapshot = self.gallery.snapshot();
        match recognize(&mut self.analyzer, frame, &snapshot, self.tolerance)? {
            Recognition::Found { identity, distance } => {
                tracing::info!(identity = %identity, distance, "face recognized");
                Ok(CycleOutcome::Marked(self.mark_and_publish(identity).await))
            }
            Recognition::NotFound => Ok(CycleOutcome::Unrecognized),
        }
    }

    /// Enrollment fallback: bind the face in `frame` to the scanned payload,
    /// then mark attendance for the new identity.
    pub async fn enroll_and_attend(
        &mut self,
        frame: &Frame,
        payload: &str,
    ) -> Result<Attendance, EngineError> {
        let identity =
            Identity::parse(payload).map_err(|reason| EngineError::InvalidCodePayload {
                raw: payload.to_string(),
                reason,
            })?;
        self.enroll(frame, identity.clone())?;
        Ok(self.mark_and_publish(identity).await)
    }

    /// Enroll an identity from a frame containing exactly one face.
    /// On any failure the gallery and reference images are untouched.
    pub fn enroll(&mut self, frame: &Frame, identity: Identity) -> Result<(), EngineError> {
        let signature = signature_for_enrollment(&mut self.analyzer, frame)?;
        self.gallery.put(identity.clone(), signature, frame)?;
        self.announcer
            .announce(&format!("Face registered for {identity}"));
        Ok(())
    }

    /// Remove an enrolled identity and its reference image.
    pub fn deregister(&mut self, identity: &Identity) -> Result<(), EngineError> {
        self.gallery.remove(identity)?;
        Ok(())
    }

    /// Flush the ledger; called on orderly shutdown.
    pub fn flush(&self) -> Result<(), LedgerError> {
        self.ledger.flush()
    }

    pub fn gallery(&self) -> &Gallery {
        &self.gallery
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Record the event locally, then mirror it remotely. The two stores are
    /// deliberately not transactional: each failure is logged and reported
    /// independently, and neither rolls the other back.
    async fn mark_and_publish(&mut self, identity: Identity) -> Attendance {
        let now = Local::now().naive_local();
        let date = now.date();
        let time = now.time();

        let mark = self.ledger.mark_present(&identity, date, time);

        let ledger = self.ledger.flush();
        if let Err(e) = &ledger {
            tracing::error!(identity = %identity, error = %e, "ledger save failed");
            self.error_log
                .append(&format!("ledger save error for {identity}: {e}"));
        }

        let remote = match &self.remote {
            Some(sync) => {
                let outcome = sync.publish(&identity, date, time).await;
                for failure in outcome.failures() {
                    self.error_log
                        .append(&format!("error updating remote storage for {identity}: {failure}"));
                }
                Some(outcome)
            }
            None => None,
        };

        self.announcer
            .announce(&format!("Attendance marked for {identity}"));

        Attendance {
            identity,
            date,
            time,
            mark,
            ledger,
            remote,
        }
    }
}
