//! End-to-end attendance flow against stub analysis and an in-memory remote.

use async_trait::async_trait;
use rollcall_core::{
    analyzer::AnalyzerError, FaceAnalyzer, FaceRegion, Frame, Identity, Signature,
};
use rollcall_store::{ErrorLog, Gallery, Ledger, MarkOutcome, YearRule};
use rollcall_sync::{AttendanceRecord, RecordTransport, RemoteSync, RemoteWriteError};
use rollcalld::{CycleOutcome, Engine, EngineError, LogAnnouncer};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// Analyzer stub: the first frame byte is the face count, the next four
/// bytes seed the signature of every detected face. Two frames built from
/// the same seed are "the same subject".
struct StubAnalyzer;

impl FaceAnalyzer for StubAnalyzer {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<FaceRegion>, AnalyzerError> {
        let count = frame.data.first().copied().unwrap_or(0) as usize;
        Ok(vec![
            FaceRegion {
                x: 0.0,
                y: 0.0,
                width: 4.0,
                height: 1.0,
                confidence: 0.9,
            };
            count
        ])
    }

    fn signature(&mut self, frame: &Frame, _face: &FaceRegion) -> Result<Signature, AnalyzerError> {
        Ok(Signature {
            values: frame.data[1..5].iter().map(|&b| b as f32 / 255.0).collect(),
            model_version: None,
        })
    }
}

#[derive(Clone, Default)]
struct MemoryTransport {
    written: Arc<Mutex<HashMap<String, AttendanceRecord>>>,
    fail_paths: Arc<HashSet<String>>,
}

#[async_trait]
impl RecordTransport for MemoryTransport {
    async fn put(&self, path: &str, record: &AttendanceRecord) -> Result<(), RemoteWriteError> {
        if self.fail_paths.iter().any(|p| path.starts_with(p)) {
            return Err(RemoteWriteError::Status {
                path: path.to_string(),
                status: 503,
            });
        }
        self.written
            .lock()
            .unwrap()
            .insert(path.to_string(), record.clone());
        Ok(())
    }
}

fn face_frame(faces: u8, seed: [u8; 4]) -> Frame {
    let mut data = vec![faces];
    data.extend_from_slice(&seed);
    Frame {
        data,
        width: 5,
        height: 1,
    }
}

fn identity(s: &str) -> Identity {
    Identity::parse(s).unwrap()
}

fn engine_in(
    dir: &tempfile::TempDir,
    transport: MemoryTransport,
) -> Engine<StubAnalyzer, MemoryTransport> {
    let gallery = Gallery::open(dir.path().join("signatures.json"), dir.path().join("faces"))
        .unwrap();
    let ledger = Ledger::open(dir.path().join("attendance.csv"), YearRule::default()).unwrap();
    let error_log = ErrorLog::new(dir.path().join("error_log.txt"));
    Engine::new(
        StubAnalyzer,
        gallery,
        ledger,
        Some(RemoteSync::new(transport)),
        error_log,
        Box::new(LogAnnouncer),
        0.1,
    )
}

#[tokio::test]
async fn test_full_attendance_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let transport = MemoryTransport::default();
    let mut engine = engine_in(&dir, transport.clone());

    let subject = face_frame(1, [10, 20, 30, 40]);

    // Empty gallery: the subject is unrecognized
    assert!(matches!(
        engine.attend(&subject).await.unwrap(),
        CycleOutcome::Unrecognized
    ));

    // Enrollment fallback with a scanned code, then first mark of the day
    let attendance = engine.enroll_and_attend(&subject, "S101").await.unwrap();
    assert_eq!(attendance.identity, identity("S101"));
    assert_eq!(attendance.mark, MarkOutcome::Recorded);
    assert!(attendance.ledger.is_ok());
    assert!(attendance.remote.as_ref().unwrap().fully_synced());

    // Ledger has one row with the time in today's column
    let row = engine.ledger().row(&identity("S101")).unwrap();
    let recorded = row.time_for(attendance.date).unwrap().to_string();
    assert_eq!(recorded, attendance.time.format("%H:%M:%S").to_string());
    assert_eq!(engine.ledger().columns(), &[attendance.date]);

    // Both remote addresses hold the same record
    let date_key = attendance.date.format("%Y-%m-%d");
    let written = transport.written.lock().unwrap();
    let by_date = written.get(&format!("attendance/{date_key}/S101")).unwrap();
    let by_id = written
        .get(&format!("attendance/students/S101/{date_key}"))
        .unwrap();
    assert_eq!(by_date, by_id);
    assert_eq!(by_date.status, "present");
    drop(written);

    // A held-out frame of the same subject now resolves on the fast path,
    // and the repeat mark is an idempotent no-op keeping the first time.
    let held_out = face_frame(1, [10, 20, 30, 40]);
    match engine.attend(&held_out).await.unwrap() {
        CycleOutcome::Marked(second) => {
            assert_eq!(second.mark, MarkOutcome::AlreadyMarked);
            let row = engine.ledger().row(&identity("S101")).unwrap();
            assert_eq!(row.time_for(second.date).unwrap(), recorded);
        }
        other => panic!("expected fast-path mark, got {other:?}"),
    }

    // A different subject stays unrecognized
    let stranger = face_frame(1, [200, 200, 200, 200]);
    assert!(matches!(
        engine.attend(&stranger).await.unwrap(),
        CycleOutcome::Unrecognized
    ));

    // Deregistering removes the binding: same face, no longer recognized
    engine.deregister(&identity("S101")).unwrap();
    assert!(matches!(
        engine.attend(&subject).await.unwrap(),
        CycleOutcome::Unrecognized
    ));
}

#[tokio::test]
async fn test_enrollment_rejects_zero_and_multiple_faces() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = engine_in(&dir, MemoryTransport::default());

    let err = engine
        .enroll(&face_frame(0, [1, 2, 3, 4]), identity("S101"))
        .unwrap_err();
    assert!(matches!(err, EngineError::NoFaceDetected));

    let err = engine
        .enroll(&face_frame(2, [1, 2, 3, 4]), identity("S101"))
        .unwrap_err();
    assert!(matches!(err, EngineError::AmbiguousFace(2)));

    // Neither attempt touched the gallery or wrote a reference image
    assert!(engine.gallery().is_empty());
    assert!(!engine
        .gallery()
        .reference_image_path(&identity("S101"))
        .exists());
}

#[tokio::test]
async fn test_enroll_duplicate_identity_propagates() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = engine_in(&dir, MemoryTransport::default());

    engine
        .enroll(&face_frame(1, [1, 2, 3, 4]), identity("S101"))
        .unwrap();
    let err = engine
        .enroll(&face_frame(1, [9, 9, 9, 9]), identity("S101"))
        .unwrap_err();
    assert!(matches!(err, EngineError::DuplicateIdentity(_)));
    assert_eq!(engine.gallery().len(), 1);
}

#[tokio::test]
async fn test_invalid_code_payload_rejected_before_any_mutation() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = engine_in(&dir, MemoryTransport::default());

    let err = engine
        .enroll_and_attend(&face_frame(1, [1, 2, 3, 4]), "bad/key")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidCodePayload { .. }));
    assert!(engine.gallery().is_empty());
    assert!(engine.ledger().rows().is_empty());
}

#[tokio::test]
async fn test_remote_failure_never_blocks_attendance() {
    let dir = tempfile::tempdir().unwrap();
    let transport = MemoryTransport {
        // Every date-indexed write fails; identity-indexed writes succeed
        fail_paths: Arc::new(HashSet::from(["attendance/2".to_string()])),
        ..Default::default()
    };
    let mut engine = engine_in(&dir, transport.clone());

    let attendance = engine
        .enroll_and_attend(&face_frame(1, [1, 2, 3, 4]), "S101")
        .await
        .unwrap();

    // Local mark succeeded and is durable
    assert_eq!(attendance.mark, MarkOutcome::Recorded);
    assert!(attendance.ledger.is_ok());

    // One address failed, the other was still written
    let remote = attendance.remote.as_ref().unwrap();
    assert!(remote.by_date.is_err());
    assert!(remote.by_identity.is_ok());
    assert_eq!(transport.written.lock().unwrap().len(), 1);

    // The failure landed in the error log
    let log = std::fs::read_to_string(dir.path().join("error_log.txt")).unwrap();
    assert!(log.contains("error updating remote storage for S101"));
}
